//! Term definitions merge: keyed by the term text, case-insensitive
//! and trimmed, so "Daily Active Users" and " daily active users" merge
//! into one row. `definition` is free text reconciled by the LLM when
//! variants disagree; `business_alias` collects every distinct spelling and
//! prior alias seen across sources.

use std::collections::BTreeMap;

use dm_llm::LlmGatewayHandle;
use dm_model::{ConflictKind, ConflictRecord, TermDefinition};
use serde_json::json;
use tracing::warn;

use crate::conflicts::{field_conflict, resolve_categorical, Variant};

pub struct TermVariant {
    pub dashboard_id: i64,
    pub term: TermDefinition,
}

pub struct TermMergeOutput {
    pub rows: Vec<TermDefinition>,
    pub conflicts: Vec<ConflictRecord>,
}

fn normalize_key(term: &str) -> String {
    term.trim().to_ascii_lowercase()
}

fn split_aliases(raw: &str) -> Vec<String> {
    raw.split(',').map(|part| part.trim().to_string()).filter(|part| !part.is_empty()).collect()
}

pub async fn merge(gateway: &LlmGatewayHandle, variants: Vec<TermVariant>) -> TermMergeOutput {
    let mut grouped: BTreeMap<String, Vec<TermVariant>> = BTreeMap::new();
    for variant in variants {
        grouped.entry(normalize_key(&variant.term.term)).or_default().push(variant);
    }

    let mut rows = Vec::with_capacity(grouped.len());
    let mut conflicts = Vec::new();

    for (key, term_variants) in grouped {
        let spelling_variants: Vec<Variant> = term_variants
            .iter()
            .map(|v| Variant { dashboard_id: v.dashboard_id, value: v.term.term.clone() })
            .collect();
        // Casing-only disagreement isn't a real business conflict, so the
        // canonical spelling is picked without recording one.
        let (term, _) = resolve_categorical(ConflictKind::TermDefinition, &key, &spelling_variants);

        let type_variants: Vec<Variant> = term_variants
            .iter()
            .map(|v| Variant { dashboard_id: v.dashboard_id, value: v.term.term_type.clone() })
            .collect();
        let (term_type, type_conflict) =
            resolve_categorical(ConflictKind::TermDefinition, &format!("{key}.type"), &type_variants);
        conflicts.extend(type_conflict);

        let definition_variants: Vec<serde_json::Value> =
            term_variants.iter().map(|v| json!({"definition": v.term.definition})).collect();
        let definition = if definition_variants.windows(2).all(|pair| pair[0] == pair[1]) {
            term_variants[0].term.definition.clone()
        } else {
            match dm_llm::prompts::merge_term(gateway, &definition_variants).await {
                Ok(output) => {
                    if output.conflicting_fields.iter().any(|f| f == "definition") {
                        let raw_variants: Vec<(i64, serde_json::Value)> = term_variants
                            .iter()
                            .zip(definition_variants.iter())
                            .map(|(v, raw)| (v.dashboard_id, raw.clone()))
                            .collect();
                        if let Some(conflict) = field_conflict(
                            ConflictKind::TermDefinition,
                            &format!("{key}.definition"),
                            "definition",
                            &raw_variants,
                            &output.merged,
                        ) {
                            conflicts.push(conflict);
                        }
                    }
                    output.merged.get("definition").and_then(|v| v.as_str()).unwrap_or_default().to_string()
                }
                Err(error) => {
                    warn!(term = %key, error = %error, "merge: merge_term failed, keeping first variant's definition");
                    term_variants[0].term.definition.clone()
                }
            }
        };

        let mut aliases: Vec<String> = Vec::new();
        for variant in &term_variants {
            if variant.term.term != term && !aliases.contains(&variant.term.term) {
                aliases.push(variant.term.term.clone());
            }
            for alias in split_aliases(&variant.term.business_alias) {
                if alias != term && !aliases.contains(&alias) {
                    aliases.push(alias);
                }
            }
        }
        let business_alias = aliases.join(", ");

        rows.push(TermDefinition { term, term_type, definition, business_alias });
    }

    TermMergeOutput { rows, conflicts }
}
