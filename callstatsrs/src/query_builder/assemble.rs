//! Builds the SELECT for a routed section query.

use crate::models::{DateRange, DimensionFilters, LogicalOperator};
use crate::sql_ast::{ComparisonOp, SelectQuery, SqlExpr, SqlValue};

use super::router::TableRoute;
use super::sanitize::{format_timestamp, is_valid_identifier};
use super::warnings::CompileWarning;

/// Inputs of the assembler once routing and translation are done.
pub(crate) struct AssemblyInput<'a> {
    pub route: &'a TableRoute,
    pub columns: &'a [String],
    pub date_range: DateRange,
    pub dimensions: &'a DimensionFilters,
    pub advanced: Option<SqlExpr>,
    pub group_by: Option<&'a str>,
}

pub(crate) fn assemble(
    input: AssemblyInput<'_>,
    warnings: &mut Vec<CompileWarning>,
) -> SelectQuery {
    let route = input.route;
    let mut filters = date_range_filters(route, &input.date_range, warnings);

    for (column, values) in input.dimensions.restrictions() {
        filters.push(SqlExpr::InList {
            column: column.to_string(),
            values: values.iter().cloned().map(SqlValue::Text).collect(),
        });
    }

    if let Some(advanced) = input.advanced {
        filters.push(SqlExpr::Nested(Box::new(advanced)));
    }

    SelectQuery {
        columns: projection(input.columns, warnings),
        from: route.table.clone(),
        filters,
        group_by: group_key(input.group_by, warnings),
        order_by: route.order_by.iter().map(|c| c.to_string()).collect(),
    }
}

fn projection(columns: &[String], warnings: &mut Vec<CompileWarning>) -> Vec<String> {
    let mut kept = Vec::with_capacity(columns.len());
    for column in columns {
        let column = column.trim();
        if column == "*" || is_valid_identifier(column) {
            kept.push(column.to_string());
        } else {
            warnings.push(CompileWarning::InvalidIdentifier {
                context: "column".to_string(),
                name: column.to_string(),
            });
        }
    }
    if kept.is_empty() {
        kept.push("*".to_string());
    }
    kept
}

fn group_key(group_by: Option<&str>, warnings: &mut Vec<CompileWarning>) -> Option<String> {
    let key = group_by.map(str::trim).filter(|k| !k.is_empty())?;
    if is_valid_identifier(key) {
        Some(key.to_string())
    } else {
        warnings.push(CompileWarning::InvalidIdentifier {
            context: "group by".to_string(),
            name: key.to_string(),
        });
        None
    }
}

fn date_range_filters(
    route: &TableRoute,
    range: &DateRange,
    warnings: &mut Vec<CompileWarning>,
) -> Vec<SqlExpr> {
    if let (Some(start), Some(end)) = (range.start, range.end) {
        if range.is_inverted() {
            warnings.push(CompileWarning::InvertedDateRange {
                start: format_timestamp(&start),
                end: format_timestamp(&end),
            });
        }
    }

    let column = route.date_column.to_string();
    let format = route.bound_format;
    let mut filters = Vec::new();
    match (range.start, range.end) {
        (Some(start), Some(end)) => filters.push(SqlExpr::Between {
            column,
            low: format.bound_value(&start),
            high: format.bound_value(&end),
            negated: false,
        }),
        (Some(start), None) => filters.push(SqlExpr::Compare {
            column,
            op: ComparisonOp::Gte,
            value: format.bound_value(&start),
        }),
        (None, Some(end)) => filters.push(SqlExpr::Compare {
            column,
            op: ComparisonOp::Lte,
            value: format.bound_value(&end),
        }),
        (None, None) => return filters,
    }

    if !route.composite_key.is_empty() {
        if let Some(start) = range.start {
            filters.push(composite_bound(&route.composite_values(&start), Bound::Lower));
        }
        if let Some(end) = range.end {
            filters.push(composite_bound(&route.composite_values(&end), Bound::Upper));
        }
    }
    filters
}

#[derive(Clone, Copy)]
enum Bound {
    Lower,
    Upper,
}

/// Lexicographic comparison over `(year, month, day, hour)`, spelled out as
/// `(k1 > v1 OR (k1 = v1 AND (...)))` with an inclusive test on the last key.
fn composite_bound(keys: &[(&str, i64)], bound: Bound) -> SqlExpr {
    let (strict, inclusive) = match bound {
        Bound::Lower => (ComparisonOp::Gt, ComparisonOp::Gte),
        Bound::Upper => (ComparisonOp::Lt, ComparisonOp::Lte),
    };
    let compare = |column: &str, op: ComparisonOp, value: i64| SqlExpr::Compare {
        column: column.to_string(),
        op,
        value: SqlValue::Int(value),
    };

    let Some((&(column, value), rest)) = keys.split_first() else {
        return SqlExpr::Raw("1=1".to_string());
    };
    if rest.is_empty() {
        return compare(column, inclusive, value);
    }
    let tie = SqlExpr::Nested(Box::new(SqlExpr::Chain(vec![
        (LogicalOperator::And, compare(column, ComparisonOp::Eq, value)),
        (LogicalOperator::And, composite_bound(rest, bound)),
    ])));
    SqlExpr::Nested(Box::new(SqlExpr::Chain(vec![
        (LogicalOperator::And, compare(column, strict, value)),
        (LogicalOperator::Or, tie),
    ])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use crate::dialect::DuckDbDialect;
    use crate::models::{parse_calendar_value, TimeGranularity};
    use crate::query_builder::router::route;
    use crate::sql_ast::{LiteralMode, SqlRenderer};

    fn render(query: &SelectQuery) -> String {
        SqlRenderer::new(&DuckDbDialect)
            .with_mode(LiteralMode::Inline)
            .render_select(query)
            .sql
    }

    fn range(start: Option<&str>, end: Option<&str>) -> DateRange {
        DateRange {
            start: start.and_then(parse_calendar_value),
            end: end.and_then(parse_calendar_value),
        }
    }

    fn star() -> Vec<String> {
        vec!["*".to_string()]
    }

    #[test]
    fn empty_request_has_no_dangling_and() {
        let route = route(TimeGranularity::Daily, &TableConfig::default());
        let mut warnings = Vec::new();
        let query = assemble(
            AssemblyInput {
                route: &route,
                columns: &star(),
                date_range: DateRange::default(),
                dimensions: &DimensionFilters::default(),
                advanced: None,
                group_by: None,
            },
            &mut warnings,
        );
        assert_eq!(
            render(&query),
            "SELECT * FROM stats_daily WHERE 1=1 ORDER BY timeInterval"
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn sub_daily_range_layers_composite_bounds() {
        let route = route(TimeGranularity::Min15, &TableConfig::default());
        let mut warnings = Vec::new();
        let filters = date_range_filters(
            &route,
            &range(Some("2025-04-01 08:15:00"), Some("2025-04-02 17:45:00")),
            &mut warnings,
        );
        let renderer = SqlRenderer::new(&DuckDbDialect).with_mode(LiteralMode::Inline);
        let rendered: Vec<String> = filters.iter().map(|f| renderer.render_expr(f).sql).collect();
        assert_eq!(
            rendered,
            vec![
                "timeInterval BETWEEN '2025-04-01 08:15:00' AND '2025-04-02 17:45:00'".to_string(),
                "(year > 2025 OR (year = 2025 AND (month > 4 OR (month = 4 AND (day > 1 OR (day = 1 AND hour >= 8))))))".to_string(),
                "(year < 2025 OR (year = 2025 AND (month < 4 OR (month = 4 AND (day < 2 OR (day = 2 AND hour <= 17))))))".to_string(),
            ]
        );
    }

    #[test]
    fn open_ended_ranges_use_single_comparisons() {
        let monthly = route(TimeGranularity::Monthly, &TableConfig::default());
        let yearly = route(TimeGranularity::Yearly, &TableConfig::default());
        let renderer = SqlRenderer::new(&DuckDbDialect).with_mode(LiteralMode::Inline);
        let mut warnings = Vec::new();

        let from = date_range_filters(&monthly, &range(Some("2025-02-10"), None), &mut warnings);
        assert_eq!(from.len(), 1);
        assert_eq!(renderer.render_expr(&from[0]).sql, "yearMonth >= '2025-02'");

        let until = date_range_filters(&yearly, &range(None, Some("2024-06-30")), &mut warnings);
        assert_eq!(until.len(), 1);
        assert_eq!(renderer.render_expr(&until[0]).sql, "year <= 2024");
        assert!(warnings.is_empty());
    }

    #[test]
    fn inverted_range_is_kept_with_warning() {
        let route = route(TimeGranularity::Daily, &TableConfig::default());
        let mut warnings = Vec::new();
        let filters = date_range_filters(
            &route,
            &range(Some("2025-04-07"), Some("2025-04-01")),
            &mut warnings,
        );
        assert_eq!(filters.len(), 1);
        assert_eq!(
            warnings,
            vec![CompileWarning::InvertedDateRange {
                start: "2025-04-07 00:00:00".to_string(),
                end: "2025-04-01 00:00:00".to_string(),
            }]
        );
    }

    #[test]
    fn invalid_projection_and_group_key_are_dropped() {
        let route = route(TimeGranularity::Hourly, &TableConfig::default());
        let mut warnings = Vec::new();
        let columns = vec!["queue".to_string(), "count(*)".to_string()];
        let dimensions = DimensionFilters {
            queues: vec![],
            channels: vec!["chat".to_string(), "it's".to_string()],
        };
        let query = assemble(
            AssemblyInput {
                route: &route,
                columns: &columns,
                date_range: DateRange::default(),
                dimensions: &dimensions,
                advanced: Some(SqlExpr::Raw("inbound > 0 OR abandoned > 0".to_string())),
                group_by: Some("queue; --"),
            },
            &mut warnings,
        );
        assert_eq!(
            render(&query),
            "SELECT queue FROM stats_hourly WHERE 1=1 AND channel IN ('chat', 'it''s') \
             AND (inbound > 0 OR abandoned > 0) ORDER BY year, month, day, hour"
        );
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn all_invalid_columns_fall_back_to_star() {
        let mut warnings = Vec::new();
        let columns = vec!["a b".to_string()];
        assert_eq!(projection(&columns, &mut warnings), vec!["*"]);
        assert_eq!(warnings.len(), 1);
    }
}
