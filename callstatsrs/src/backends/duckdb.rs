//! DuckDB backend implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

use crate::config::WarehouseConfig;
use crate::dialect::DuckDbDialect;
use crate::error::{CallstatsError, Result};
use crate::executor::{duck_value_to_json, sql_value_to_duck, ColumnMeta, QueryResult};
use crate::query_builder::CompiledQuery;

use super::BackendConnection;

const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// DuckDB connection implementing the unified backend trait.
///
/// Pooled connections are clones of one base connection, so they share a
/// single database instance. This is what keeps `:memory:` warehouses
/// visible to every pooled connection.
#[derive(Clone)]
pub struct DuckDbConnection {
    database_path: PathBuf,
    dialect: DuckDbDialect,
    limiter: Arc<Semaphore>,
    pool: Arc<Mutex<Vec<duckdb::Connection>>>,
    base: Arc<Mutex<Option<duckdb::Connection>>>,
}

impl DuckDbConnection {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        tracing::info!(
            path = %path.display(),
            max_concurrency = DEFAULT_MAX_CONCURRENCY,
            "creating DuckDB connection"
        );
        Self {
            database_path: path,
            dialect: DuckDbDialect,
            limiter: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
            pool: Arc::new(Mutex::new(Vec::new())),
            base: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_config(config: &WarehouseConfig) -> Self {
        Self::new(&config.path).with_max_concurrency(config.max_concurrency)
    }

    /// Configure maximum concurrent executions.
    pub fn with_max_concurrency(mut self, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        tracing::debug!(max_concurrency = max_in_flight, "configuring DuckDB concurrency");
        self.limiter = Arc::new(Semaphore::new(max_in_flight));
        self
    }

    /// Use `conn` as the base connection, e.g. one already holding an
    /// in-memory database. Connections opened later are clones of it.
    pub async fn seed_connection(&self, conn: duckdb::Connection) -> Result<()> {
        let pooled = conn
            .try_clone()
            .map_err(|e| CallstatsError::Execution(format!("clone duckdb connection: {e}")))?;
        *self.base.lock().await = Some(conn);
        let mut pool = self.pool.lock().await;
        pool.clear();
        pool.push(pooled);
        Ok(())
    }

    async fn acquire_slot(&self) -> Result<SemaphorePermit<'_>> {
        if self.limiter.available_permits() == 0 {
            tracing::debug!("all DuckDB slots in use, waiting for permit");
        }
        self.limiter
            .acquire()
            .await
            .map_err(|e| CallstatsError::Execution(format!("limiter closed: {e}")))
    }

    async fn checkout_connection(&self) -> Result<duckdb::Connection> {
        let mut guard = self.pool.lock().await;
        if let Some(conn) = guard.pop() {
            let pool_size = guard.len();
            drop(guard);
            tracing::trace!(pool_remaining = pool_size, "reusing pooled DuckDB connection");
            return Ok(conn);
        }
        drop(guard);
        self.open_connection().await
    }

    async fn open_connection(&self) -> Result<duckdb::Connection> {
        let mut base = self.base.lock().await;
        if base.is_none() {
            tracing::debug!(path = %self.database_path.display(), "opening DuckDB database");
            let conn = if self.database_path.as_os_str() == ":memory:" {
                duckdb::Connection::open_in_memory()
            } else {
                duckdb::Connection::open(self.database_path.clone())
            }
            .map_err(|e| CallstatsError::Execution(format!("open duckdb: {e}")))?;
            *base = Some(conn);
        }
        match base.as_ref() {
            Some(conn) => conn.try_clone().map_err(|e| {
                CallstatsError::Execution(format!("clone duckdb connection: {e}"))
            }),
            None => Err(CallstatsError::Execution("duckdb base connection missing".to_string())),
        }
    }
}

#[async_trait]
impl BackendConnection for DuckDbConnection {
    fn dialect(&self) -> &(dyn crate::dialect::Dialect + Send + Sync) {
        &self.dialect
    }

    async fn execute(&self, query: &CompiledQuery) -> Result<QueryResult> {
        let sql = query.sql.clone();
        let params: Vec<duckdb::types::Value> =
            query.params.iter().map(sql_value_to_duck).collect();
        let table = query.table.clone();
        let _permit = self.acquire_slot().await?;
        let conn = self.checkout_connection().await?;
        let pool = self.pool.clone();
        let result =
            tokio::task::spawn_blocking(move || -> (Result<QueryResult>, duckdb::Connection) {
                let start = Instant::now();
                let outcome = run_statement(&conn, &sql, params);
                if let Ok(result) = &outcome {
                    tracing::debug!(
                        table = table.as_str(),
                        rows = result.rows.len(),
                        columns = result.columns.len(),
                        ms = start.elapsed().as_millis(),
                        "duckdb execute"
                    );
                }
                (outcome, conn)
            })
            .await
            .map_err(|e| CallstatsError::Execution(format!("task join error: {e}")))?;

        // The connection goes back to the pool even when the statement failed.
        let (outcome, conn) = result;
        pool.lock().await.push(conn);
        outcome
    }
}

fn run_statement(
    conn: &duckdb::Connection,
    sql: &str,
    params: Vec<duckdb::types::Value>,
) -> Result<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows_iter = stmt.query(duckdb::params_from_iter(params))?;
    let stmt_ref = rows_iter
        .as_ref()
        .ok_or_else(|| CallstatsError::Execution("statement missing".to_string()))?;
    let mut column_names = Vec::new();
    for idx in 0..stmt_ref.column_count() {
        let name = stmt_ref
            .column_name(idx)
            .map_err(|e| CallstatsError::Execution(e.to_string()))?;
        column_names.push(name.to_string());
    }

    let mut rows = Vec::new();
    while let Some(row) = rows_iter.next()? {
        let mut map = serde_json::Map::new();
        for (idx, name) in column_names.iter().enumerate() {
            map.insert(name.clone(), duck_value_to_json(row.get_ref(idx)?.to_owned()));
        }
        rows.push(map);
    }

    let columns = column_names
        .into_iter()
        .map(|name| ColumnMeta { name })
        .collect();
    Ok(QueryResult { columns, rows })
}
