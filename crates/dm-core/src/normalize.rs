/// Normalizes a table identifier to `catalog.schema.table`: dequoted,
/// lowercased schema/table, with `default_catalog` prepended when the
/// identifier has fewer than three dot-separated segments.
pub fn normalize_table_name(raw: &str, default_catalog: &str) -> String {
    let dequoted: String = raw
        .chars()
        .filter(|character| !matches!(character, '"' | '`' | '\''))
        .collect();
    let segments: Vec<&str> = dequoted.split('.').filter(|part| !part.is_empty()).collect();

    let (catalog, schema, table) = match segments.len() {
        0 => return String::new(),
        1 => (default_catalog.to_ascii_lowercase(), "default".to_string(), segments[0].to_ascii_lowercase()),
        2 => (
            default_catalog.to_ascii_lowercase(),
            segments[0].to_ascii_lowercase(),
            segments[1].to_ascii_lowercase(),
        ),
        _ => {
            let len = segments.len();
            (
                segments[len - 3].to_ascii_lowercase(),
                segments[len - 2].to_ascii_lowercase(),
                segments[len - 1].to_ascii_lowercase(),
            )
        }
    };

    format!("{catalog}.{schema}.{table}")
}

/// Returns true when `alias` is bound as a CTE name in `sql`, i.e. it
/// appears as the alias of a `WITH ... AS (...)` binding. Used by phase 2
/// to exclude CTE names from the extracted source-table set.
pub fn is_cte_alias(sql: &str, alias: &str) -> bool {
    let lower_sql = sql.to_ascii_lowercase();
    let lower_alias = alias.to_ascii_lowercase();
    let Some(with_pos) = lower_sql.find("with ") else {
        return false;
    };

    let after_with = &lower_sql[with_pos + "with ".len()..];
    let mut remaining = after_with;
    loop {
        let remaining_trimmed = remaining.trim_start();
        let Some(name_end) = remaining_trimmed.find(|c: char| c.is_whitespace() || c == '(') else {
            return false;
        };
        let candidate = remaining_trimmed[..name_end].trim();
        let tail = remaining_trimmed[name_end..].trim_start();
        let Some(tail) = tail.strip_prefix("as") else {
            return false;
        };
        let tail = tail.trim_start();
        let Some(tail) = tail.strip_prefix('(') else {
            return false;
        };

        if candidate == lower_alias {
            return true;
        }

        let Some((_, after_paren)) = split_at_matching_paren(tail) else {
            return false;
        };
        let after_paren = after_paren.trim_start();
        let Some(after_comma) = after_paren.strip_prefix(',') else {
            return false;
        };
        remaining = after_comma;
    }
}

fn split_at_matching_paren(input: &str) -> Option<(&str, &str)> {
    let mut depth = 1i32;
    for (index, character) in input.char_indices() {
        match character {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&input[..index], &input[index + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_table_name_with_default_catalog() {
        assert_eq!(
            normalize_table_name("Orders", "hive"),
            "hive.default.orders"
        );
    }

    #[test]
    fn normalizes_schema_qualified_name() {
        assert_eq!(
            normalize_table_name("Sales.Orders", "hive"),
            "hive.sales.orders"
        );
    }

    #[test]
    fn preserves_explicit_catalog_and_dequotes() {
        assert_eq!(
            normalize_table_name("\"hive\".\"Sales\".\"Orders\"", "default_cat"),
            "hive.sales.orders"
        );
    }

    #[test]
    fn detects_single_cte_alias() {
        let sql = "WITH recent_orders AS (SELECT * FROM orders) SELECT * FROM recent_orders";
        assert!(is_cte_alias(sql, "recent_orders"));
        assert!(!is_cte_alias(sql, "orders"));
    }

    #[test]
    fn detects_multiple_cte_aliases() {
        let sql = "WITH a AS (SELECT 1), b AS (SELECT * FROM a) SELECT * FROM b";
        assert!(is_cte_alias(sql, "a"));
        assert!(is_cte_alias(sql, "b"));
        assert!(!is_cte_alias(sql, "c"));
    }

    #[test]
    fn returns_false_when_no_with_clause_present() {
        assert!(!is_cte_alias("SELECT * FROM orders", "orders"));
    }
}
