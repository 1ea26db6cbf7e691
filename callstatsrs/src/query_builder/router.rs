//! Time-bucket table routing.
//!
//! Each granularity lives in its own pre-aggregated table. The route says
//! which table to read, which column carries the range filter, how range
//! bounds are formatted for that column, and how rows are ordered.

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::config::TableConfig;
use crate::error::{CallstatsError, Result};
use crate::models::TimeGranularity;
use crate::sql_ast::SqlValue;

use super::warnings::CompileWarning;

const SUB_DAILY_ORDER: &[&str] = &["year", "month", "day", "hour", "timeInterval"];
const HOURLY_ORDER: &[&str] = &["year", "month", "day", "hour"];
const DAILY_ORDER: &[&str] = &["timeInterval"];
const MONTHLY_ORDER: &[&str] = &["year", "month"];
const YEARLY_ORDER: &[&str] = &["year"];

/// Columns of the `(year, month, day, hour)` key carried by sub-daily tables.
const HOUR_KEY: &[&str] = &["year", "month", "day", "hour"];

/// Formatting of a range bound for the routed date column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundFormat {
    /// `YYYY-MM-DD HH:MM:SS`
    Timestamp,
    /// `YYYY-MM-DD HH:00:00`
    HourTimestamp,
    /// `YYYY-MM-DD`
    Date,
    /// `YYYY-MM`
    YearMonth,
    /// Bare integer year.
    Year,
}

impl BoundFormat {
    pub fn bound_value(self, at: &NaiveDateTime) -> SqlValue {
        match self {
            BoundFormat::Timestamp => SqlValue::Timestamp(*at),
            BoundFormat::HourTimestamp => {
                SqlValue::Timestamp(at.date().and_hms_opt(at.hour(), 0, 0).unwrap_or(*at))
            }
            BoundFormat::Date => SqlValue::Text(at.format("%Y-%m-%d").to_string()),
            BoundFormat::YearMonth => SqlValue::Text(at.format("%Y-%m").to_string()),
            BoundFormat::Year => SqlValue::Int(i64::from(at.year())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRoute {
    pub granularity: TimeGranularity,
    pub table: String,
    pub date_column: &'static str,
    pub bound_format: BoundFormat,
    pub order_by: &'static [&'static str],
    /// Composite key layered onto range filters; empty when not used.
    pub composite_key: &'static [&'static str],
}

impl TableRoute {
    /// Values of the composite key columns at `at`, in key order.
    pub fn composite_values(&self, at: &NaiveDateTime) -> Vec<(&'static str, i64)> {
        self.composite_key
            .iter()
            .map(|column| {
                let value = match *column {
                    "year" => i64::from(at.year()),
                    "month" => i64::from(at.month()),
                    "day" => i64::from(at.day()),
                    _ => i64::from(at.hour()),
                };
                (*column, value)
            })
            .collect()
    }
}

pub fn route(granularity: TimeGranularity, tables: &TableConfig) -> TableRoute {
    let (date_column, bound_format, order_by, composite_key) = match granularity {
        TimeGranularity::Min15 | TimeGranularity::Min30 => (
            "timeInterval",
            BoundFormat::Timestamp,
            SUB_DAILY_ORDER,
            HOUR_KEY,
        ),
        TimeGranularity::Hourly => (
            "timeInterval",
            BoundFormat::HourTimestamp,
            HOURLY_ORDER,
            HOUR_KEY,
        ),
        TimeGranularity::Daily => ("timeInterval", BoundFormat::Date, DAILY_ORDER, &[][..]),
        TimeGranularity::Monthly => ("yearMonth", BoundFormat::YearMonth, MONTHLY_ORDER, &[][..]),
        TimeGranularity::Yearly => ("year", BoundFormat::Year, YEARLY_ORDER, &[][..]),
    };

    TableRoute {
        granularity,
        table: tables.table_for(granularity).to_string(),
        date_column,
        bound_format,
        order_by,
        composite_key,
    }
}

/// Resolve the request's interval token.
///
/// A missing token means daily. An unknown token falls back to daily with a
/// warning, or fails when `strict` is set.
pub fn resolve_granularity(
    token: Option<&str>,
    strict: bool,
) -> Result<(TimeGranularity, Option<CompileWarning>)> {
    let token = token.map(str::trim).filter(|t| !t.is_empty());
    let Some(token) = token else {
        return Ok((TimeGranularity::Daily, None));
    };
    match TimeGranularity::parse(token) {
        Some(granularity) => Ok((granularity, None)),
        None if strict => Err(CallstatsError::Validation(format!(
            "unknown time interval {token:?}"
        ))),
        None => Ok((
            TimeGranularity::Daily,
            Some(CompileWarning::UnknownGranularity {
                token: token.to_string(),
            }),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_calendar_value;

    #[test]
    fn every_granularity_routes_to_a_configured_table() {
        let tables = TableConfig::default();
        let known = [
            "stats_15min",
            "stats_30min",
            "stats_hourly",
            "stats_daily",
            "stats_monthly",
            "stats_yearly",
        ];
        for granularity in TimeGranularity::ALL {
            let route = route(granularity, &tables);
            assert!(known.contains(&route.table.as_str()), "{}", route.table);
            assert!(!route.order_by.is_empty());
        }
    }

    #[test]
    fn monthly_uses_year_month_key() {
        let route = route(TimeGranularity::Monthly, &TableConfig::default());
        assert_eq!(route.date_column, "yearMonth");
        assert_eq!(route.order_by, &["year", "month"]);
        let at = parse_calendar_value("2025-04-17").unwrap();
        assert_eq!(
            route.bound_format.bound_value(&at),
            SqlValue::Text("2025-04".to_string())
        );
    }

    #[test]
    fn yearly_bound_is_an_integer() {
        let route = route(TimeGranularity::Yearly, &TableConfig::default());
        let at = parse_calendar_value("2024-12-31 23:59:00").unwrap();
        assert_eq!(route.date_column, "year");
        assert_eq!(route.bound_format.bound_value(&at), SqlValue::Int(2024));
    }

    #[test]
    fn hourly_bound_truncates_to_the_hour() {
        let route = route(TimeGranularity::Hourly, &TableConfig::default());
        let at = parse_calendar_value("2025-04-01 08:45:12").unwrap();
        assert_eq!(
            route.bound_format.bound_value(&at),
            SqlValue::Timestamp(parse_calendar_value("2025-04-01 08:00:00").unwrap())
        );
        assert_eq!(
            route.composite_values(&at),
            vec![("year", 2025), ("month", 4), ("day", 1), ("hour", 8)]
        );
    }

    #[test]
    fn daily_has_no_composite_key() {
        let route = route(TimeGranularity::Daily, &TableConfig::default());
        assert!(route.composite_key.is_empty());
        assert_eq!(route.order_by, &["timeInterval"]);
    }

    #[test]
    fn unknown_granularity_falls_back_to_daily() {
        let (granularity, warning) = resolve_granularity(Some("weekly"), false).unwrap();
        assert_eq!(granularity, TimeGranularity::Daily);
        assert_eq!(
            warning,
            Some(CompileWarning::UnknownGranularity {
                token: "weekly".to_string()
            })
        );
        assert!(resolve_granularity(Some("weekly"), true).is_err());
    }

    #[test]
    fn missing_granularity_is_daily_without_warning() {
        assert_eq!(
            resolve_granularity(None, true).unwrap(),
            (TimeGranularity::Daily, None)
        );
        assert_eq!(
            resolve_granularity(Some("  "), false).unwrap(),
            (TimeGranularity::Daily, None)
        );
    }
}
