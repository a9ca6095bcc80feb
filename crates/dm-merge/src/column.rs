//! Column metadata merge: `variable_type` is categorical
//! (most-common-wins); `required_flag` is "any source says required wins"
//! regardless of majority, since a false negative elsewhere should never
//! silently override a dashboard that correctly flagged the column as
//! required; `column_description` is free text reconciled by the LLM.

use std::collections::BTreeMap;

use dm_llm::LlmGatewayHandle;
use dm_model::{ColumnMetadata, ConflictKind, ConflictRecord};
use serde_json::json;
use tracing::warn;

use crate::conflicts::{field_conflict, resolve_categorical, Variant};

pub struct ColumnVariant {
    pub dashboard_id: i64,
    pub metadata: ColumnMetadata,
}

pub struct ColumnMergeOutput {
    pub rows: Vec<ColumnMetadata>,
    pub conflicts: Vec<ConflictRecord>,
}

pub async fn merge(gateway: &LlmGatewayHandle, variants: Vec<ColumnVariant>) -> ColumnMergeOutput {
    let mut grouped: BTreeMap<(String, String), Vec<ColumnVariant>> = BTreeMap::new();
    for variant in variants {
        let key = (variant.metadata.table_name.clone(), variant.metadata.column_name.clone());
        grouped.entry(key).or_default().push(variant);
    }

    let mut rows = Vec::with_capacity(grouped.len());
    let mut conflicts = Vec::new();

    for ((table_name, column_name), column_variants) in grouped {
        let subject_key = format!("{table_name}.{column_name}");

        let datatype_variants: Vec<Variant> = column_variants
            .iter()
            .map(|v| Variant { dashboard_id: v.dashboard_id, value: v.metadata.variable_type.clone() })
            .collect();
        let (variable_type, datatype_conflict) =
            resolve_categorical(ConflictKind::ColumnDatatype, &subject_key, &datatype_variants);
        conflicts.extend(datatype_conflict);

        let required_flag = column_variants.iter().any(|v| v.metadata.required_flag);
        let required_variants: Vec<Variant> = column_variants
            .iter()
            .map(|v| Variant { dashboard_id: v.dashboard_id, value: v.metadata.required_flag.to_string() })
            .collect();
        if let (_, Some(mut conflict)) =
            resolve_categorical(ConflictKind::ColumnRequiredFlag, &subject_key, &required_variants)
        {
            // The any-source-wins rule can disagree with the plain
            // majority vote `resolve_categorical` picked; the conflict
            // record's resolution must reflect the rule actually applied.
            conflict.resolution = required_flag.to_string();
            conflicts.push(conflict);
        }

        let description_variants: Vec<serde_json::Value> = column_variants
            .iter()
            .map(|v| json!({"description": v.metadata.column_description}))
            .collect();

        let column_description = if description_variants.windows(2).all(|pair| pair[0] == pair[1]) {
            column_variants[0].metadata.column_description.clone()
        } else {
            match dm_llm::prompts::merge_column(gateway, &description_variants).await {
                Ok(output) => {
                    if output.conflicting_fields.iter().any(|f| f == "description") {
                        let raw_variants: Vec<(i64, serde_json::Value)> = column_variants
                            .iter()
                            .zip(description_variants.iter())
                            .map(|(v, raw)| (v.dashboard_id, raw.clone()))
                            .collect();
                        if let Some(conflict) = field_conflict(
                            ConflictKind::ColumnDescription,
                            &subject_key,
                            "description",
                            &raw_variants,
                            &output.merged,
                        ) {
                            conflicts.push(conflict);
                        }
                    }
                    output.merged.get("description").and_then(|v| v.as_str()).unwrap_or_default().to_string()
                }
                Err(error) => {
                    warn!(column = %subject_key, error = %error, "merge: merge_column failed, keeping first variant's description");
                    column_variants[0].metadata.column_description.clone()
                }
            }
        };

        rows.push(ColumnMetadata {
            table_name,
            column_name,
            variable_type,
            column_description,
            required_flag,
        });
    }

    ColumnMergeOutput { rows, conflicts }
}
