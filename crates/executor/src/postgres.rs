//! Postgres transaction executor
//!
//! Each call checks a connection out of a lazily connected pool, opens a
//! read-committed transaction, echoes the value with a single parameterized
//! `SELECT`, reads at most one row and commits. The whole round-trip is
//! bounded by the transaction timeout.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::trace;
use txchaos_core::{FailureKind, HarnessConfig, Reply, TransactionError, TransactionExecutor};

const ECHO_QUERY: &str = "SELECT $1::int4 AS id";
const READ_COMMITTED: &str = "SET TRANSACTION ISOLATION LEVEL READ COMMITTED";

/// Executes echo transactions against Postgres
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresExecutor {
    /// Build an executor without touching the network.
    ///
    /// Connections are opened on first use, so a database that is still
    /// starting up surfaces as connection failures during readiness polling
    /// rather than here.
    pub fn connect_lazy(
        url: &str,
        max_connections: u32,
        timeout: Duration,
    ) -> Result<Self, TransactionError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(timeout)
            .connect_lazy(url)
            .map_err(|err| map_sqlx_error("invalid connection string", err))?;
        Ok(Self { pool, timeout })
    }

    /// Build an executor from the harness config.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, TransactionError> {
        Self::connect_lazy(
            &config.database_url,
            config.max_connections,
            config.transaction_timeout(),
        )
    }

    /// Transaction timeout applied to every call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn round_trip(&self, value: i32) -> Result<Reply, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(READ_COMMITTED).execute(&mut *tx).await?;
        let row: Option<(i32,)> = sqlx::query_as(ECHO_QUERY)
            .bind(value)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(match row {
            Some((id,)) => Reply::Row(id),
            None => Reply::NoRow,
        })
    }
}

#[async_trait]
impl TransactionExecutor for PostgresExecutor {
    async fn execute(&self, value: i32) -> Result<Reply, TransactionError> {
        match tokio::time::timeout(self.timeout, self.round_trip(value)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(err)) => {
                let err = map_sqlx_error("echo transaction failed", err);
                trace!(target: "txchaos::executor", value, kind = %err.kind(), error = %err, "round-trip failed");
                Err(err)
            }
            // The dropped transaction is rolled back when its connection returns to the pool.
            Err(_) => Err(TransactionError::timeout(format!(
                "echo transaction exceeded {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

/// Failure kind for a Postgres SQLSTATE.
pub fn kind_for_sqlstate(code: &str) -> FailureKind {
    match code {
        // query_canceled, raised by statement_timeout
        "57014" => FailureKind::Timeout,
        // admin_shutdown, crash_shutdown, cannot_connect_now
        "57P01" | "57P02" | "57P03" => FailureKind::Connection,
        c if c.starts_with("08") => FailureKind::Connection,
        _ => FailureKind::Database,
    }
}

/// Failure kind for a driver error.
pub fn failure_kind(err: &sqlx::Error) -> FailureKind {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => FailureKind::Connection,
        sqlx::Error::Protocol(_) => FailureKind::Protocol,
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => kind_for_sqlstate(&code),
            None => FailureKind::Database,
        },
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::TypeNotFound { .. } => FailureKind::Decode,
        sqlx::Error::Configuration(_) | sqlx::Error::Tls(_) => FailureKind::Configuration,
        _ => FailureKind::Other,
    }
}

fn map_sqlx_error(context: &str, err: sqlx::Error) -> TransactionError {
    let kind = failure_kind(&err);
    TransactionError::with_source(kind, format!("{}: {}", context, err), err)
}
