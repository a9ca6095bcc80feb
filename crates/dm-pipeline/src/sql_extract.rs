//! Rule-based fallback for phase 2's source-table/column extraction:
//! used when `ExtractionStrategy::RuleBasedOnly` is configured, or
//! when `Hybrid` falls back after an LLM call fails for a chart. Parses
//! with a generic SQL dialect and walks the statement manually rather than
//! through `sqlparser`'s optional visitor feature, so this crate only
//! depends on `sqlparser`'s always-available AST types.

use std::collections::BTreeSet;

use sqlparser::ast::{Expr, Query, SelectItem, SetExpr, Statement, TableFactor};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use dm_core::{is_cte_alias, normalize_table_name};
use dm_model::SourceOrDerived;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedColumn {
    pub table_name: String,
    pub column_name: String,
    pub alias: String,
    pub source_or_derived: SourceOrDerived,
    pub derived_logic: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleBasedExtraction {
    pub columns: Vec<ExtractedColumn>,
}

/// Best-effort fallback: unparsed SQL, or SQL this walker's limited AST
/// coverage doesn't recognize, yields an empty extraction rather than a
/// panic — callers treat that the same as "no SQL" for this chart.
pub fn extract_rule_based(sql: &str, default_catalog: &str) -> RuleBasedExtraction {
    let Ok(statements) = Parser::parse_sql(&GenericDialect {}, sql) else {
        return RuleBasedExtraction::default();
    };

    let mut tables = BTreeSet::new();
    let mut columns = BTreeSet::new();
    for statement in &statements {
        if let Statement::Query(query) = statement {
            walk_query(query, &mut tables, &mut columns);
        }
    }

    let tables: Vec<String> = tables
        .into_iter()
        .filter(|name| !is_cte_alias(sql, name))
        .map(|name| normalize_table_name(&name, default_catalog))
        .collect();

    if tables.is_empty() {
        return RuleBasedExtraction::default();
    }

    // A bare column reference can't be reliably attributed to one table
    // among several joined ones without catalog-aware resolution (the
    // LLM path has that context; this fallback does not), so every
    // extracted column is associated with every extracted table as a
    // SOURCE reference. This over-approximates rather than silently
    // drops a column.
    let mut extracted = Vec::new();
    for table in &tables {
        for column in &columns {
            extracted.push(ExtractedColumn {
                table_name: table.clone(),
                column_name: column.clone(),
                alias: column.clone(),
                source_or_derived: SourceOrDerived::Source,
                derived_logic: None,
            });
        }
    }

    RuleBasedExtraction { columns: extracted }
}

fn walk_query(query: &Query, tables: &mut BTreeSet<String>, columns: &mut BTreeSet<String>) {
    walk_set_expr(&query.body, tables, columns);
}

fn walk_set_expr(set_expr: &SetExpr, tables: &mut BTreeSet<String>, columns: &mut BTreeSet<String>) {
    match set_expr {
        SetExpr::Select(select) => {
            for table_with_joins in &select.from {
                collect_table_factor(&table_with_joins.relation, tables);
                for join in &table_with_joins.joins {
                    collect_table_factor(&join.relation, tables);
                }
            }
            for item in &select.projection {
                match item {
                    SelectItem::UnnamedExpr(expr) => collect_expr(expr, columns),
                    SelectItem::ExprWithAlias { expr, .. } => collect_expr(expr, columns),
                    SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(_, _) => {}
                }
            }
        }
        SetExpr::SetOperation { left, right, .. } => {
            walk_set_expr(left, tables, columns);
            walk_set_expr(right, tables, columns);
        }
        SetExpr::Query(query) => walk_query(query, tables, columns),
        _ => {}
    }
}

fn collect_table_factor(factor: &TableFactor, tables: &mut BTreeSet<String>) {
    match factor {
        TableFactor::Table { name, .. } => {
            tables.insert(name.to_string());
        }
        TableFactor::Derived { subquery, .. } => {
            let mut nested_columns = BTreeSet::new();
            walk_query(subquery, tables, &mut nested_columns);
        }
        _ => {}
    }
}

fn collect_expr(expr: &Expr, columns: &mut BTreeSet<String>) {
    match expr {
        Expr::Identifier(ident) => {
            columns.insert(ident.value.clone());
        }
        Expr::CompoundIdentifier(parts) => {
            if let Some(last) = parts.last() {
                columns.insert(last.value.clone());
            }
        }
        Expr::Cast { expr, .. } | Expr::UnaryOp { expr, .. } | Expr::Nested(expr) => {
            collect_expr(expr, columns);
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_expr(left, columns);
            collect_expr(right, columns);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_source_table_and_columns_from_simple_select() {
        let extraction = extract_rule_based("SELECT amount, customer_id FROM sales.orders", "hive");
        let tables: BTreeSet<_> = extraction.columns.iter().map(|c| c.table_name.clone()).collect();
        let columns: BTreeSet<_> = extraction.columns.iter().map(|c| c.column_name.clone()).collect();
        assert_eq!(tables, BTreeSet::from(["hive.sales.orders".to_string()]));
        assert!(columns.contains("amount"));
        assert!(columns.contains("customer_id"));
    }

    #[test]
    fn excludes_cte_alias_from_extracted_tables() {
        let sql = "WITH recent AS (SELECT * FROM sales.orders) SELECT amount FROM recent";
        let extraction = extract_rule_based(sql, "hive");
        let tables: BTreeSet<_> = extraction.columns.iter().map(|c| c.table_name.clone()).collect();
        assert!(!tables.contains("hive.default.recent"));
    }

    #[test]
    fn unparsable_sql_yields_empty_extraction() {
        let extraction = extract_rule_based("not even close to sql {{{", "hive");
        assert!(extraction.columns.is_empty());
    }

    #[test]
    fn joins_capture_both_table_sides() {
        let sql = "SELECT o.amount, c.name FROM sales.orders o JOIN sales.customers c ON o.customer_id = c.id";
        let extraction = extract_rule_based(sql, "hive");
        let tables: BTreeSet<_> = extraction.columns.iter().map(|c| c.table_name.clone()).collect();
        assert!(tables.contains("hive.sales.orders"));
        assert!(tables.contains("hive.sales.customers"));
    }
}
