use serde::Serialize;

use crate::backends::BackendConnection;
use crate::config::{CallstatsConfig, CompilerConfig, TableConfig};
use crate::dialect::Dialect;
use crate::error::{CallstatsError, Result};
use crate::models::{AdvancedFilter, SectionQuery, TimeGranularity};
use crate::sql_ast::{LiteralMode, SqlExpr, SqlRenderer, SqlValue};

mod assemble;
pub mod router;
pub mod sanitize;
mod translate;
pub mod warnings;

pub use router::{route, TableRoute};
pub use warnings::CompileWarning;

use assemble::{assemble, AssemblyInput};
use translate::Translator;

/// Output of one compile: SQL plus everything the caller needs to run and
/// explain it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    /// Values for the placeholders in `sql`, in order. Empty in inline mode.
    pub params: Vec<SqlValue>,
    pub table: String,
    pub granularity: TimeGranularity,
    /// The advanced filter alone, with values inlined. For display only.
    pub filter_sql: Option<String>,
    pub warnings: Vec<CompileWarning>,
}

impl CompiledQuery {
    /// True when something was dropped and the result may be wider than asked.
    pub fn is_degraded(&self) -> bool {
        self.warnings.iter().any(CompileWarning::widens_filter)
    }
}

pub struct SqlBuilder {
    compiler: CompilerConfig,
    tables: TableConfig,
}

impl Default for SqlBuilder {
    fn default() -> Self {
        Self {
            compiler: CompilerConfig::default(),
            tables: TableConfig::default(),
        }
    }
}

impl SqlBuilder {
    pub fn new(compiler: CompilerConfig, tables: TableConfig) -> Result<Self> {
        for granularity in TimeGranularity::ALL {
            let table = tables.table_for(granularity);
            if !sanitize::is_valid_identifier(table) {
                return Err(CallstatsError::Config(format!(
                    "table {table:?} for {granularity} is not a valid identifier"
                )));
            }
        }
        Ok(Self { compiler, tables })
    }

    pub fn from_config(config: &CallstatsConfig) -> Result<Self> {
        Self::new(config.compiler.clone(), config.tables.clone())
    }

    /// Build SQL for a dialect using the configured literal mode.
    pub fn build_with_dialect(
        &self,
        request: &SectionQuery,
        dialect: &dyn Dialect,
    ) -> Result<CompiledQuery> {
        self.build_with_mode(request, dialect, self.compiler.literal_mode)
    }

    /// Build SQL for the dialect of the connection that will run it.
    pub fn build_for_connection(
        &self,
        request: &SectionQuery,
        connection: &dyn BackendConnection,
    ) -> Result<CompiledQuery> {
        self.build_with_dialect(request, connection.dialect())
    }

    pub fn build_with_mode(
        &self,
        request: &SectionQuery,
        dialect: &dyn Dialect,
        mode: LiteralMode,
    ) -> Result<CompiledQuery> {
        let mut warnings = Vec::new();

        let (granularity, fallback) = router::resolve_granularity(
            request.time_interval.as_deref(),
            self.compiler.strict_granularity,
        )?;
        warnings.extend(fallback);
        let route = router::route(granularity, &self.tables);

        let advanced = self.advanced_filter(request.advanced_filters.as_ref(), &mut warnings)?;
        let filter_sql = advanced.as_ref().map(|expr| {
            SqlRenderer::new(dialect)
                .with_mode(LiteralMode::Inline)
                .render_expr(expr)
                .sql
        });

        let query = assemble(
            AssemblyInput {
                route: &route,
                columns: &request.columns,
                date_range: request.date_range(),
                dimensions: &request.filters,
                advanced,
                group_by: request.group_by.as_deref(),
            },
            &mut warnings,
        );
        let rendered = SqlRenderer::new(dialect).with_mode(mode).render_select(&query);

        for warning in &warnings {
            tracing::warn!(table = %route.table, warning = %warning, "section query degraded");
        }
        tracing::debug!(
            table = %route.table,
            granularity = %granularity,
            dialect = dialect.name(),
            params = rendered.params.len(),
            warnings = warnings.len(),
            "compiled section query"
        );
        tracing::trace!(sql = %rendered.sql, "section query sql");

        Ok(CompiledQuery {
            sql: rendered.sql,
            params: rendered.params,
            table: route.table,
            granularity,
            filter_sql,
            warnings,
        })
    }

    fn advanced_filter(
        &self,
        filter: Option<&AdvancedFilter>,
        warnings: &mut Vec<CompileWarning>,
    ) -> Result<Option<SqlExpr>> {
        match filter {
            None => Ok(None),
            Some(AdvancedFilter::Raw(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(None);
                }
                // Unsafe text fails even when raw filters are disabled.
                sanitize::check_raw_filter(text)?;
                if !self.compiler.allow_raw_filters {
                    return Err(CallstatsError::Validation(
                        "raw WHERE filters are disabled; send a filter tree".to_string(),
                    ));
                }
                Ok(Some(SqlExpr::Raw(text.to_string())))
            }
            Some(AdvancedFilter::Tree(tree)) => {
                let mut translator = Translator::new(self.compiler.max_group_depth);
                let expr = translator.translate_tree(tree);
                warnings.extend(translator.into_warnings());
                Ok(expr)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{DuckDbDialect, PostgresDialect};
    use crate::models::{parse_calendar_value, Condition, FilterTree};
    use serde_json::json;

    #[test]
    fn bound_mode_collects_params_in_order() {
        let request = SectionQuery::new(TimeGranularity::Daily)
            .with_date_range(
                parse_calendar_value("2025-04-01"),
                parse_calendar_value("2025-04-07"),
            )
            .with_queues(["Sales"])
            .with_filter_tree(FilterTree::new(
                vec![Condition::new("inbound", ">", json!(10))],
                vec![],
            ));
        let compiled = SqlBuilder::default()
            .build_with_dialect(&request, &PostgresDialect)
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM stats_daily WHERE 1=1 AND timeInterval BETWEEN $1 AND $2 \
             AND queue IN ($3) AND (inbound > $4) ORDER BY timeInterval"
        );
        assert_eq!(
            compiled.params,
            vec![
                SqlValue::Text("2025-04-01".to_string()),
                SqlValue::Text("2025-04-07".to_string()),
                SqlValue::Text("Sales".to_string()),
                SqlValue::Int(10),
            ]
        );
        assert_eq!(compiled.filter_sql.as_deref(), Some("inbound > 10"));
    }

    #[test]
    fn raw_filters_are_opt_in() {
        let request = SectionQuery::new(TimeGranularity::Hourly).with_raw_filter("inbound > 10");
        let err = SqlBuilder::default()
            .build_with_dialect(&request, &DuckDbDialect)
            .unwrap_err();
        assert!(matches!(err, CallstatsError::Validation(_)));

        let compiler = CompilerConfig {
            allow_raw_filters: true,
            ..CompilerConfig::default()
        };
        let builder = SqlBuilder::new(compiler, TableConfig::default()).unwrap();
        let compiled = builder.build_with_dialect(&request, &DuckDbDialect).unwrap();
        assert!(compiled.sql.contains("AND (inbound > 10)"));
    }

    #[test]
    fn unsafe_raw_filter_fails_before_the_opt_in_check() {
        let request = SectionQuery::new(TimeGranularity::Daily)
            .with_raw_filter("1=1; DROP TABLE stats_daily");
        let err = SqlBuilder::default()
            .build_with_dialect(&request, &DuckDbDialect)
            .unwrap_err();
        assert!(matches!(err, CallstatsError::UnsafeFilter(_)));
    }

    #[test]
    fn strict_granularity_rejects_unknown_tokens() {
        let mut request = SectionQuery::default();
        request.time_interval = Some("fortnightly".to_string());

        let lenient = SqlBuilder::default()
            .build_with_dialect(&request, &DuckDbDialect)
            .unwrap();
        assert_eq!(lenient.table, "stats_daily");
        assert!(!lenient.is_degraded());
        assert_eq!(lenient.warnings.len(), 1);

        let strict = SqlBuilder::new(
            CompilerConfig {
                strict_granularity: true,
                ..CompilerConfig::default()
            },
            TableConfig::default(),
        )
        .unwrap();
        assert!(strict.build_with_dialect(&request, &DuckDbDialect).is_err());
    }

    #[test]
    fn invalid_table_names_are_rejected() {
        let tables = TableConfig {
            daily: "stats daily".to_string(),
            ..TableConfig::default()
        };
        assert!(matches!(
            SqlBuilder::new(CompilerConfig::default(), tables),
            Err(CallstatsError::Config(_))
        ));
    }
}
