pub mod backends;
pub mod config;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod models;
pub mod query_builder;
pub mod registry;
pub mod runtime;
pub mod sql_ast;

use crate::error::Result;

/// Compile a section query with default settings for DuckDB.
pub fn compile(request: &SectionQuery) -> Result<CompiledQuery> {
    SqlBuilder::default().build_with_dialect(request, &dialect::DuckDbDialect)
}

#[cfg(feature = "duckdb")]
pub use backends::DuckDbConnection;
pub use backends::BackendConnection;
pub use config::CallstatsConfig;
pub use error::CallstatsError;
pub use executor::QueryResult;
pub use models::{
    AdvancedFilter, Condition, ConditionGroup, ConditionOperator, FilterNode, FilterTree,
    LogicalOperator, SectionQuery, TimeGranularity,
};
pub use query_builder::{CompileWarning, CompiledQuery, SqlBuilder};
pub use registry::{SectionDefinition, SectionRegistry};
pub use runtime::{run_named_section, run_section_query, SectionResult};
