//! Identifier and value sanitizing.
//!
//! Identifiers cannot be bound as parameters, so every field, column and
//! table name must pass [`is_valid_identifier`] before it reaches SQL text.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CallstatsError, Result};

/// Statement and comment tokens refused in raw WHERE text. Keywords match as
/// whole words so columns such as `updated_at` stay usable.
static RAW_FILTER_DENYLIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(DROP|DELETE|UPDATE|INSERT|ALTER|CREATE|TRUNCATE|UNION|EXEC|EXECUTE|TRANSACTION|COMMIT|ROLLBACK|SAVEPOINT|GRANT|REVOKE)\b|--|/\*|\*/",
    )
    // Constant pattern; the denylist tests compile it on first use.
    .expect("raw filter denylist pattern is valid")
});

/// Accept only `[A-Za-z0-9_.]+`. Quoted or backtick names are rejected too.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Double single quotes for inclusion inside a `'...'` literal.
pub fn escape_string(value: &str) -> String {
    value.replace('\'', "''")
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Scan caller-supplied WHERE text for statement keywords and comment
/// markers. Fails on the first match.
pub fn check_raw_filter(text: &str) -> Result<()> {
    match RAW_FILTER_DENYLIST.find(text) {
        Some(hit) => Err(CallstatsError::UnsafeFilter(format!(
            "raw filter contains forbidden token {}",
            hit.as_str().to_ascii_uppercase()
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_allow_list() {
        for ok in ["inbound", "agent_name", "stats.queue", "Q1", "_x"] {
            assert!(is_valid_identifier(ok), "{ok} should pass");
        }
        for bad in ["", "agent name", "`queue`", "\"queue\"", "a;b", "x-1", "1=1", "a'b"] {
            assert!(!is_valid_identifier(bad), "{bad} should fail");
        }
    }

    #[test]
    fn escaped_string_splits_back_to_original() {
        for original in ["it's", "''", "plain", "a'b'c", "'leading", "trailing'"] {
            let escaped = escape_string(original);
            let restored = escaped.split("''").collect::<Vec<_>>().join("'");
            assert_eq!(restored, original);
            assert_eq!(escaped.matches('\'').count() % 2, 0);
        }
    }

    #[test]
    fn raw_filter_denylist() {
        let err = check_raw_filter("inbound > 5; DROP TABLE stats_daily").unwrap_err();
        assert!(matches!(err, CallstatsError::UnsafeFilter(ref msg) if msg.ends_with("DROP")));
        assert!(check_raw_filter("x = 1 union select 1").is_err());
        assert!(check_raw_filter("x = 1 -- comment").is_err());
        assert!(check_raw_filter("x = 1 /* c */").is_err());
        assert!(check_raw_filter("Rollback").is_err());
    }

    #[test]
    fn raw_filter_allows_columns_containing_keywords() {
        assert!(check_raw_filter("updated_at > '2025-01-01' AND created_by = 'ops'").is_ok());
        assert!(check_raw_filter("inbound > 10 OR abandoned < 2").is_ok());
    }
}
