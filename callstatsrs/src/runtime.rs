use serde::Serialize;

use crate::backends::BackendConnection;
use crate::error::{CallstatsError, Result};
use crate::executor::QueryResult;
use crate::models::SectionQuery;
use crate::query_builder::{CompiledQuery, SqlBuilder};
use crate::registry::SectionRegistry;

/// Rows of one section together with the query that produced them.
#[derive(Debug, Clone, Serialize)]
pub struct SectionResult {
    pub compiled: CompiledQuery,
    pub result: QueryResult,
}

/// Compile for the connection's dialect and run it.
pub async fn run_section_query(
    builder: &SqlBuilder,
    connection: &dyn BackendConnection,
    request: &SectionQuery,
) -> Result<SectionResult> {
    let compiled = builder.build_for_connection(request, connection)?;
    let result = connection.execute(&compiled).await.map_err(|e| match e {
        CallstatsError::Execution(_) => e,
        other => CallstatsError::Execution(format!("query on {} failed: {other}", compiled.table)),
    })?;
    Ok(SectionResult { compiled, result })
}

pub async fn run_named_section(
    registry: &SectionRegistry,
    name: &str,
    builder: &SqlBuilder,
    connection: &dyn BackendConnection,
) -> Result<SectionResult> {
    let section = registry
        .get(name)
        .ok_or_else(|| CallstatsError::Validation(format!("unknown section {name}")))?;
    run_section_query(builder, connection, &section.query).await
}
