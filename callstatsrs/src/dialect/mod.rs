//! SQL dialect abstractions for the warehouses a compiled query can target.
//!
//! Dialects only decide how a value reaches the SQL text: which placeholder
//! a bound parameter uses and how an inline literal is escaped. Fragment
//! tree walking lives in `sql_ast`.

use crate::query_builder::sanitize::{escape_string, format_timestamp};
use crate::sql_ast::SqlValue;

pub trait Dialect {
    fn name(&self) -> &'static str;
    fn placeholder(&self, _idx: usize) -> String {
        "?".to_string()
    }
    fn escape_string(&self, value: &str) -> String {
        escape_string(value)
    }
    fn render_literal(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(true) => "1".to_string(),
            SqlValue::Bool(false) => "0".to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) if f.is_finite() => f.to_string(),
            SqlValue::Float(_) => "NULL".to_string(),
            SqlValue::Text(s) => format!("'{}'", self.escape_string(s)),
            SqlValue::Timestamp(ts) => format!("'{}'", format_timestamp(ts)),
        }
    }
}

mod duckdb;
pub use duckdb::DuckDbDialect;

mod mysql;
pub use mysql::MySqlDialect;

mod postgres;
pub use postgres::PostgresDialect;

/// Look up a dialect by name (`duckdb`, `mysql`, `postgres`).
pub fn dialect_by_name(name: &str) -> Option<&'static (dyn Dialect + Send + Sync)> {
    match name.trim().to_ascii_lowercase().as_str() {
        "duckdb" => Some(&DuckDbDialect),
        "mysql" => Some(&MySqlDialect),
        "postgres" | "postgresql" => Some(&PostgresDialect),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_rules() {
        let d = DuckDbDialect;
        assert_eq!(d.render_literal(&SqlValue::Null), "NULL");
        assert_eq!(d.render_literal(&SqlValue::Bool(true)), "1");
        assert_eq!(d.render_literal(&SqlValue::Bool(false)), "0");
        assert_eq!(d.render_literal(&SqlValue::Int(-4)), "-4");
        assert_eq!(d.render_literal(&SqlValue::Float(2.5)), "2.5");
        assert_eq!(d.render_literal(&SqlValue::Float(f64::NAN)), "NULL");
        assert_eq!(
            d.render_literal(&SqlValue::Text("it's".to_string())),
            "'it''s'"
        );
        let ts = crate::models::parse_calendar_value("2025-04-01 08:05:09").unwrap();
        assert_eq!(
            d.render_literal(&SqlValue::Timestamp(ts)),
            "'2025-04-01 08:05:09'"
        );
    }

    #[test]
    fn mysql_escapes_backslashes() {
        assert_eq!(
            MySqlDialect.render_literal(&SqlValue::Text(r"a\' OR 1=1".to_string())),
            r"'a\\'' OR 1=1'"
        );
    }

    #[test]
    fn placeholders_per_dialect() {
        assert_eq!(DuckDbDialect.placeholder(3), "?");
        assert_eq!(MySqlDialect.placeholder(0), "?");
        assert_eq!(PostgresDialect.placeholder(0), "$1");
        assert_eq!(PostgresDialect.placeholder(4), "$5");
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(dialect_by_name("Postgres").map(|d| d.name()), Some("postgres"));
        assert!(dialect_by_name("oracle").is_none());
    }
}
