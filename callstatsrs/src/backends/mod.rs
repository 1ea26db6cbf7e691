//! Warehouse backends that run compiled section queries.

use async_trait::async_trait;

use crate::dialect::Dialect;
use crate::error::Result;
use crate::executor::QueryResult;
use crate::query_builder::CompiledQuery;

/// Unified interface for warehouse backends.
///
/// Execution runs to completion once dispatched; there is no cancellation.
#[async_trait]
pub trait BackendConnection: Send + Sync {
    fn dialect(&self) -> &(dyn Dialect + Send + Sync);
    async fn execute(&self, query: &CompiledQuery) -> Result<QueryResult>;
}

#[cfg(feature = "duckdb")]
mod duckdb;
#[cfg(feature = "duckdb")]
pub use duckdb::DuckDbConnection;
