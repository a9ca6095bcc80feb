//! Table metadata merge: `refresh_frequency`, `vertical`, and
//! `partition_column` are categorical fields resolved by most-common-wins;
//! `table_description`, `remarks`, and `relationship_context` are free text
//! reconciled by the LLM whenever variants disagree.

use std::collections::BTreeMap;

use dm_llm::LlmGatewayHandle;
use dm_model::{ConflictKind, ConflictRecord, TableMetadata};
use serde_json::json;
use tracing::warn;

use crate::conflicts::{field_conflict, resolve_categorical, Variant};

pub struct TableVariant {
    pub dashboard_id: i64,
    pub metadata: TableMetadata,
}

pub struct TableMergeOutput {
    pub rows: Vec<TableMetadata>,
    pub conflicts: Vec<ConflictRecord>,
}

pub async fn merge(gateway: &LlmGatewayHandle, variants: Vec<TableVariant>) -> TableMergeOutput {
    let mut grouped: BTreeMap<String, Vec<TableVariant>> = BTreeMap::new();
    for variant in variants {
        grouped.entry(variant.metadata.table_name.clone()).or_default().push(variant);
    }

    let mut rows = Vec::with_capacity(grouped.len());
    let mut conflicts = Vec::new();

    for (table_name, table_variants) in grouped {
        let as_variants = |pick: fn(&TableMetadata) -> &str| -> Vec<Variant> {
            table_variants
                .iter()
                .map(|v| Variant { dashboard_id: v.dashboard_id, value: pick(&v.metadata).to_string() })
                .collect()
        };

        let (refresh_frequency, refresh_conflict) = resolve_categorical(
            ConflictKind::TableCategorical,
            &format!("{table_name}.refresh_frequency"),
            &as_variants(|m| &m.refresh_frequency),
        );
        let (vertical, vertical_conflict) = resolve_categorical(
            ConflictKind::TableCategorical,
            &format!("{table_name}.vertical"),
            &as_variants(|m| &m.vertical),
        );
        let (partition_column, partition_conflict) = resolve_categorical(
            ConflictKind::TableCategorical,
            &format!("{table_name}.partition_column"),
            &as_variants(|m| &m.partition_column),
        );
        conflicts.extend([refresh_conflict, vertical_conflict, partition_conflict].into_iter().flatten());

        let free_text_variants: Vec<serde_json::Value> = table_variants
            .iter()
            .map(|v| {
                json!({
                    "description": v.metadata.table_description,
                    "remarks": v.metadata.remarks,
                    "relationship_context": v.metadata.relationship_context,
                })
            })
            .collect();

        let (table_description, remarks, relationship_context) =
            if free_text_variants.windows(2).all(|pair| pair[0] == pair[1]) {
                let first = &table_variants[0].metadata;
                (first.table_description.clone(), first.remarks.clone(), first.relationship_context.clone())
            } else {
                match dm_llm::prompts::merge_table(gateway, &free_text_variants).await {
                    Ok(output) => {
                        let raw_variants: Vec<(i64, serde_json::Value)> = table_variants
                            .iter()
                            .zip(free_text_variants.iter())
                            .map(|(v, raw)| (v.dashboard_id, raw.clone()))
                            .collect();
                        for field in ["description", "remarks", "relationship_context"] {
                            if output.conflicting_fields.iter().any(|f| f == field) {
                                if let Some(conflict) = field_conflict(
                                    ConflictKind::TableFreeText,
                                    &format!("{table_name}.{field}"),
                                    field,
                                    &raw_variants,
                                    &output.merged,
                                ) {
                                    conflicts.push(conflict);
                                }
                            }
                        }
                        let get = |field: &str| {
                            output.merged.get(field).and_then(|v| v.as_str()).unwrap_or_default().to_string()
                        };
                        (get("description"), get("remarks"), get("relationship_context"))
                    }
                    Err(error) => {
                        warn!(table = %table_name, error = %error, "merge: merge_table failed, keeping first variant's free text");
                        let first = &table_variants[0].metadata;
                        (first.table_description.clone(), first.remarks.clone(), first.relationship_context.clone())
                    }
                }
            };

        rows.push(TableMetadata {
            table_name,
            table_description,
            refresh_frequency,
            vertical,
            partition_column,
            remarks,
            relationship_context,
        });
    }

    TableMergeOutput { rows, conflicts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_llm::{GatewayConfig, LlmGatewayHandle, ProviderKind};

    fn standalone_gateway() -> LlmGatewayHandle {
        LlmGatewayHandle::new_standalone(GatewayConfig {
            provider: ProviderKind::ProviderA,
            model: "model-x".to_string(),
            base_url: "https://unused.example.com".to_string(),
            api_key: "test-key".to_string(),
            max_tokens: 256,
            temperature: 0.0,
            request_timeout_ms: 1_000,
            max_retries: 1,
        })
        .expect("standalone gateway")
    }

    fn metadata(table_name: &str, refresh_frequency: &str, description: &str) -> TableMetadata {
        TableMetadata {
            table_name: table_name.to_string(),
            table_description: description.to_string(),
            refresh_frequency: refresh_frequency.to_string(),
            vertical: "sales".to_string(),
            partition_column: "dt".to_string(),
            remarks: "".to_string(),
            relationship_context: "".to_string(),
        }
    }

    #[tokio::test]
    async fn unanimous_tables_pass_through_without_an_llm_call_or_conflicts() {
        let variants = vec![
            TableVariant { dashboard_id: 1, metadata: metadata("hive.sales.orders", "daily", "orders table") },
            TableVariant { dashboard_id: 2, metadata: metadata("hive.sales.orders", "daily", "orders table") },
        ];
        let output = merge(&standalone_gateway(), variants).await;
        assert_eq!(output.rows.len(), 1);
        assert_eq!(output.rows[0].refresh_frequency, "daily");
        assert!(output.conflicts.is_empty());
    }

    #[tokio::test]
    async fn disagreeing_categorical_field_produces_a_well_formed_conflict() {
        let variants = vec![
            TableVariant { dashboard_id: 1, metadata: metadata("hive.sales.orders", "daily", "orders table") },
            TableVariant { dashboard_id: 2, metadata: metadata("hive.sales.orders", "weekly", "orders table") },
        ];
        let output = merge(&standalone_gateway(), variants).await;
        assert_eq!(output.rows.len(), 1);
        assert_eq!(output.conflicts.len(), 1);
        assert!(output.conflicts[0].is_well_formed());
        assert_eq!(output.conflicts[0].kind, ConflictKind::TableCategorical);
    }

    #[tokio::test]
    async fn distinct_tables_produce_independent_rows() {
        let variants = vec![
            TableVariant { dashboard_id: 1, metadata: metadata("hive.sales.orders", "daily", "orders table") },
            TableVariant { dashboard_id: 1, metadata: metadata("hive.sales.customers", "daily", "customers table") },
        ];
        let output = merge(&standalone_gateway(), variants).await;
        assert_eq!(output.rows.len(), 2);
    }
}
