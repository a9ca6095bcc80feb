//! Shared conflict-resolution helpers used by every entity merge module:
//! picking a winner among disagreeing per-dashboard variants and,
//! when they disagree, recording a `ConflictRecord`.

use std::collections::HashMap;

use dm_model::{ConflictKind, ConflictRecord};

/// One dashboard's view of a field's value.
#[derive(Debug, Clone)]
pub struct Variant {
    pub dashboard_id: i64,
    pub value: String,
}

/// Most-common-wins with first-seen tiebreak, for categorical fields.
/// Returns the resolved value and, when variants disagreed, a conflict
/// record naming every distinct value seen.
pub fn resolve_categorical(kind: ConflictKind, subject_key: &str, variants: &[Variant]) -> (String, Option<ConflictRecord>) {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for variant in variants {
        if !order.contains(&variant.value.as_str()) {
            order.push(variant.value.as_str());
        }
        *counts.entry(variant.value.as_str()).or_insert(0) += 1;
    }

    let Some(&first) = order.first() else {
        return (String::new(), None);
    };

    if order.len() < 2 {
        return (first.to_string(), None);
    }

    // First-seen tiebreak: only a strictly higher count replaces the
    // current winner, so an earlier value keeps the win on ties.
    let mut winner = first;
    let mut winner_count = counts[first];
    for &candidate in &order[1..] {
        let count = counts[candidate];
        if count > winner_count {
            winner = candidate;
            winner_count = count;
        }
    }

    let mut sources: Vec<i64> = variants.iter().map(|v| v.dashboard_id).collect();
    sources.sort_unstable();
    sources.dedup();
    let values = order.iter().map(|v| v.to_string()).collect();

    let record = ConflictRecord {
        kind,
        subject_key: subject_key.to_string(),
        sources,
        values,
        resolution: winner.to_string(),
    };
    (winner.to_string(), Some(record))
}

/// Builds a conflict record for one field out of an LLM `merge_*` call's
/// raw per-dashboard variants and its `merged` output, but only when the
/// field's values actually disagree across ≥2 sources: a conflict record
/// always references ≥2 distinct sources and ≥2 distinct values.
pub fn field_conflict(
    kind: ConflictKind,
    subject_key: &str,
    field: &str,
    variants: &[(i64, serde_json::Value)],
    merged: &serde_json::Value,
) -> Option<ConflictRecord> {
    let mut sources = Vec::with_capacity(variants.len());
    let mut values = Vec::with_capacity(variants.len());
    for (dashboard_id, variant) in variants {
        let value = variant.get(field).and_then(|v| v.as_str()).unwrap_or_default().to_string();
        sources.push(*dashboard_id);
        values.push(value);
    }

    let mut distinct_sources = sources.clone();
    distinct_sources.sort_unstable();
    distinct_sources.dedup();
    let mut distinct_values = values.clone();
    distinct_values.sort();
    distinct_values.dedup();
    if distinct_sources.len() < 2 || distinct_values.len() < 2 {
        return None;
    }

    let resolution = merged.get(field).and_then(|v| v.as_str()).unwrap_or_default().to_string();
    Some(ConflictRecord { kind, subject_key: subject_key.to_string(), sources, values, resolution })
}
