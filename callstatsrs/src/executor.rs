#[cfg(feature = "duckdb")]
use duckdb::types::{TimeUnit, Value as DuckValue};
use serde::Serialize;
use serde_json::{Map, Value};

#[cfg(feature = "duckdb")]
use crate::query_builder::sanitize::format_timestamp;
#[cfg(feature = "duckdb")]
use crate::sql_ast::SqlValue;

#[derive(Debug, Clone, Serialize)]
pub struct ColumnMeta {
    pub name: String,
}

/// Rows returned unchanged to the caller; period labels are formatted by the
/// rendering layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Map<String, Value>>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(feature = "duckdb")]
pub(crate) fn sql_value_to_duck(value: &SqlValue) -> DuckValue {
    match value {
        SqlValue::Null => DuckValue::Null,
        SqlValue::Bool(b) => DuckValue::Boolean(*b),
        SqlValue::Int(i) => DuckValue::BigInt(*i),
        SqlValue::Float(f) => DuckValue::Double(*f),
        SqlValue::Text(s) => DuckValue::Text(s.clone()),
        // Passed as text so VARCHAR and TIMESTAMP columns both compare.
        SqlValue::Timestamp(ts) => DuckValue::Text(format_timestamp(ts)),
    }
}

#[cfg(feature = "duckdb")]
fn timestamp_to_json(unit: TimeUnit, value: i64) -> Value {
    let micros = match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    };
    match chrono::DateTime::from_timestamp_micros(micros) {
        Some(dt) => Value::String(format_timestamp(&dt.naive_utc())),
        None => Value::from(value),
    }
}

#[cfg(feature = "duckdb")]
pub(crate) fn duck_value_to_json(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::from(i),
        DuckValue::SmallInt(i) => Value::from(i),
        DuckValue::Int(i) => Value::from(i),
        DuckValue::BigInt(i) => Value::from(i),
        DuckValue::HugeInt(i) => Value::String(i.to_string()),
        DuckValue::UTinyInt(i) => Value::from(i),
        DuckValue::USmallInt(i) => Value::from(i),
        DuckValue::UInt(i) => Value::from(i),
        DuckValue::UBigInt(i) => Value::from(i),
        DuckValue::Float(f) => Value::from(f),
        DuckValue::Double(f) => Value::from(f),
        DuckValue::Decimal(d) => Value::String(d.to_string()),
        DuckValue::Timestamp(unit, t) => timestamp_to_json(unit, t),
        DuckValue::Text(s) => Value::String(s),
        DuckValue::Blob(bytes) => Value::String(hex::encode(bytes)),
        DuckValue::Date32(days) => {
            let offset = chrono::Duration::days(i64::from(days));
            let date = chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|epoch| epoch.checked_add_signed(offset));
            match date {
                Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
                None => Value::from(days),
            }
        }
        DuckValue::Time64(unit, t) => Value::String(format!("{t} ({unit:?})")),
        DuckValue::Interval {
            months,
            days,
            nanos,
        } => Value::String(format!("{months} months {days} days {nanos} nanos")),
        DuckValue::List(items) => {
            let values = items.into_iter().map(duck_value_to_json).collect();
            Value::Array(values)
        }
        DuckValue::Enum(s) => Value::String(s),
        DuckValue::Struct(fields) => {
            let mut map = Map::new();
            for (key, val) in fields.iter() {
                map.insert(key.clone(), duck_value_to_json(val.clone()));
            }
            Value::Object(map)
        }
        DuckValue::Array(items) => {
            let values = items.into_iter().map(duck_value_to_json).collect();
            Value::Array(values)
        }
        DuckValue::Map(entries) => {
            let pairs: Vec<Value> = entries
                .iter()
                .map(|(k, v)| {
                    Value::Array(vec![
                        duck_value_to_json(k.clone()),
                        duck_value_to_json(v.clone()),
                    ])
                })
                .collect();
            Value::Array(pairs)
        }
        DuckValue::Union(inner) => duck_value_to_json(*inner),
    }
}

#[cfg(all(test, feature = "duckdb"))]
mod tests {
    use super::*;
    use crate::models::parse_calendar_value;

    #[test]
    fn timestamps_bind_as_text() {
        let ts = parse_calendar_value("2025-04-01 08:15:00").unwrap();
        assert_eq!(
            sql_value_to_duck(&SqlValue::Timestamp(ts)),
            DuckValue::Text("2025-04-01 08:15:00".to_string())
        );
        assert_eq!(sql_value_to_duck(&SqlValue::Int(3)), DuckValue::BigInt(3));
    }

    #[test]
    fn warehouse_values_convert_to_json() {
        assert_eq!(duck_value_to_json(DuckValue::Date32(0)), Value::from("1970-01-01"));
        assert_eq!(
            duck_value_to_json(DuckValue::Timestamp(TimeUnit::Second, 86_400)),
            Value::from("1970-01-02 00:00:00")
        );
        assert_eq!(duck_value_to_json(DuckValue::Blob(vec![0xab, 0x01])), Value::from("ab01"));
    }
}
