//! Joining-conditions merge: rows are keyed by
//! `(min(table1,table2), max(table1,table2), normalized joining_condition)`.
//! Distinct patterns between the same two tables are all preserved as
//! separate rows (a table pair can be joined on more than one predicate);
//! only rows sharing the exact same key are merged, with disagreeing
//! remarks reconciled by the LLM.

use std::collections::BTreeMap;

use dm_llm::LlmGatewayHandle;
use dm_model::{ConflictKind, ConflictRecord, JoiningCondition, JoiningType};
use serde_json::json;
use tracing::warn;

use crate::conflicts::{field_conflict, resolve_categorical, Variant};

pub struct JoinVariant {
    pub dashboard_id: i64,
    pub condition: JoiningCondition,
}

pub struct JoinMergeOutput {
    pub rows: Vec<JoiningCondition>,
    pub conflicts: Vec<ConflictRecord>,
}

fn normalize_condition(condition: &str) -> String {
    condition.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}

fn canonical_pair(table1: &str, table2: &str) -> (String, String) {
    if table1 <= table2 {
        (table1.to_string(), table2.to_string())
    } else {
        (table2.to_string(), table1.to_string())
    }
}

fn joining_type_str(joining_type: JoiningType) -> String {
    joining_type.as_str().to_string()
}

fn parse_joining_type(value: &str) -> JoiningType {
    match value {
        "LEFT" => JoiningType::Left,
        "RIGHT" => JoiningType::Right,
        "FULL" => JoiningType::Full,
        _ => JoiningType::Inner,
    }
}

pub async fn merge(gateway: &LlmGatewayHandle, variants: Vec<JoinVariant>) -> JoinMergeOutput {
    let mut grouped: BTreeMap<(String, String, String), Vec<JoinVariant>> = BTreeMap::new();
    for variant in variants {
        let (table1, table2) = canonical_pair(&variant.condition.table1, &variant.condition.table2);
        let normalized = normalize_condition(&variant.condition.joining_condition);
        grouped.entry((table1, table2, normalized)).or_default().push(variant);
    }

    let mut rows = Vec::with_capacity(grouped.len());
    let mut conflicts = Vec::new();

    for ((table1, table2), group) in grouped.into_iter().map(|((t1, t2, _), group)| ((t1, t2), group)) {
        let subject_key = format!("{table1}|{table2}");
        let joining_condition = group[0].condition.joining_condition.clone();

        let type_variants: Vec<Variant> = group
            .iter()
            .map(|v| Variant { dashboard_id: v.dashboard_id, value: joining_type_str(v.condition.joining_type) })
            .collect();
        let (joining_type_resolved, type_conflict) =
            resolve_categorical(ConflictKind::JoiningRemarks, &format!("{subject_key}.joining_type"), &type_variants);
        conflicts.extend(type_conflict);

        let remarks_variants: Vec<serde_json::Value> =
            group.iter().map(|v| json!({"remarks": v.condition.remarks})).collect();

        let remarks = if remarks_variants.windows(2).all(|pair| pair[0] == pair[1]) {
            group[0].condition.remarks.clone()
        } else {
            match dm_llm::prompts::merge_join(gateway, &remarks_variants).await {
                Ok(output) => {
                    if output.conflicting_fields.iter().any(|f| f == "remarks") {
                        let raw_variants: Vec<(i64, serde_json::Value)> = group
                            .iter()
                            .zip(remarks_variants.iter())
                            .map(|(v, raw)| (v.dashboard_id, raw.clone()))
                            .collect();
                        if let Some(conflict) = field_conflict(
                            ConflictKind::JoiningRemarks,
                            &format!("{subject_key}.remarks"),
                            "remarks",
                            &raw_variants,
                            &output.merged,
                        ) {
                            conflicts.push(conflict);
                        }
                    }
                    output.merged.get("remarks").and_then(|v| v.as_str()).unwrap_or_default().to_string()
                }
                Err(error) => {
                    warn!(pair = %subject_key, error = %error, "merge: merge_join failed, keeping first variant's remarks");
                    group[0].condition.remarks.clone()
                }
            }
        };

        rows.push(JoiningCondition {
            table1,
            table2,
            joining_condition,
            joining_type: parse_joining_type(&joining_type_resolved),
            remarks,
        });
    }

    JoinMergeOutput { rows, conflicts }
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

    fn condition(t1: &str, t2: &str, predicate: &str, remarks: &str) -> JoiningCondition {
        JoiningCondition {
            table1: t1.to_string(),
            table2: t2.to_string(),
            joining_condition: predicate.to_string(),
            joining_type: JoiningType::Inner,
            remarks: remarks.to_string(),
        }
    }

    #[tokio::test]
    async fn table_order_is_canonicalized_regardless_of_source_order() {
        let variants = vec![
            JoinVariant { dashboard_id: 1, condition: condition("hive.sales.orders", "hive.sales.customers", "o.id = c.id", "") },
            JoinVariant { dashboard_id: 2, condition: condition("hive.sales.customers", "hive.sales.orders", "o.id = c.id", "") },
        ];
        let output = merge(&standalone_gateway(), variants).await;
        assert_eq!(output.rows.len(), 1);
        assert!(output.rows[0].table1 < output.rows[0].table2);
    }

    #[tokio::test]
    async fn distinct_predicates_between_the_same_tables_both_survive() {
        let variants = vec![
            JoinVariant { dashboard_id: 1, condition: condition("hive.sales.orders", "hive.sales.customers", "orders.customer_id = customers.id", "") },
            JoinVariant { dashboard_id: 1, condition: condition("hive.sales.orders", "hive.sales.customers", "orders.region_id = customers.region_id", "") },
        ];
        let output = merge(&standalone_gateway(), variants).await;
        assert_eq!(output.rows.len(), 2);
    }

    #[tokio::test]
    async fn whitespace_only_differences_in_the_predicate_collapse_to_one_row() {
        let variants = vec![
            JoinVariant { dashboard_id: 1, condition: condition("a", "b", "a.id  =   b.id", "") },
            JoinVariant { dashboard_id: 2, condition: condition("a", "b", "a.id = b.id", "") },
        ];
        let output = merge(&standalone_gateway(), variants).await;
        assert_eq!(output.rows.len(), 1);
    }
}
