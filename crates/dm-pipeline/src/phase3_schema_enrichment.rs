//! Phase 3 — Schema Enrichment: validates phase 2's
//! table set against the Table Validator and enriches each surviving
//! `TableColumnRow` with a datatype from the Schema Source Client's
//! `DESCRIBE` map.
//!
//! A dashboard's `TableColumnRow` set after phase 3 must contain only
//! validated tables, while the gate is conceptually placed between phase
//! 3 and phase 4. This runs the validator at the *start* of phase 3,
//! before enrichment, which satisfies both: the set phase 3 produces is
//! already gated, and phase 4 (below) still re-validates defensively.

use std::collections::BTreeSet;

use dm_model::TableColumnRow;
use dm_schema_source::SchemaSourceTransport;
use dm_validator::TableValidatorConfig;
use tracing::info;

pub struct EnrichmentOutcome {
    pub rows: Vec<TableColumnRow>,
    pub invalid_tables: BTreeSet<String>,
}

pub async fn run(
    transport: &SchemaSourceTransport,
    validator_config: &TableValidatorConfig,
    enable_table_validation: bool,
    enable_schema_enrichment: bool,
    rows: Vec<TableColumnRow>,
) -> EnrichmentOutcome {
    let candidate_tables: Vec<String> = rows
        .iter()
        .map(|row| row.table_name.clone())
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let (valid, invalid) = if enable_table_validation {
        let result = dm_validator::validate(transport, validator_config, &candidate_tables).await;
        info!(
            valid = result.valid.len(),
            invalid = result.invalid.len(),
            method = ?result.method,
            "phase 3: table validation complete"
        );
        (result.valid, result.invalid)
    } else {
        (candidate_tables.into_iter().collect(), BTreeSet::new())
    };

    let gated: Vec<TableColumnRow> = rows
        .into_iter()
        .filter(|row| row.table_name.is_empty() || valid.contains(&row.table_name))
        .collect();

    if !enable_schema_enrichment {
        return EnrichmentOutcome { rows: gated, invalid_tables: invalid };
    }

    let tables: Vec<String> = valid.into_iter().collect();
    let schemas = dm_schema_source::describe(transport, &tables).await;

    let enriched = gated
        .into_iter()
        .map(|mut row| {
            if let Some(schema) = schemas.get(&row.table_name) {
                if let Some(datatype) = schema.get(&row.column_name) {
                    row.datatype = Some(datatype.clone());
                }
            }
            row
        })
        .collect();

    EnrichmentOutcome { rows: enriched, invalid_tables: invalid }
}
