//! Transactional execution of one bucket statement.
//!
//! Each bucket runs in its own transaction: begin, execute the compound
//! statement, commit. Any failure rolls back and surfaces as a single
//! [`BatchError`](sqlbatch_core::BatchError) naming the operation and entity
//! type. Nothing is retried.

use crate::synth::BatchStatement;
use sqlbatch_core::{Connection, Cx, Error, IsolationLevel, Outcome, TransactionOps};

/// Runs bucket statements against a connection.
#[derive(Debug)]
pub struct StatementExecutor<'c, C> {
    connection: &'c C,
    isolation: Option<IsolationLevel>,
}

impl<'c, C: Connection> StatementExecutor<'c, C> {
    /// Create an executor. `isolation` of `None` uses the connection default.
    pub fn new(connection: &'c C, isolation: Option<IsolationLevel>) -> Self {
        Self {
            connection,
            isolation,
        }
    }

    /// Execute `statement` in its own transaction, returning rows affected.
    #[tracing::instrument(
        level = "debug",
        skip(self, cx, statement),
        fields(
            operation = %statement.operation,
            entity_type = %statement.entity_type,
            entities = statement.entity_count
        )
    )]
    pub async fn execute(&self, cx: &Cx, statement: &BatchStatement) -> Outcome<u64, Error> {
        let wrap = |cause: Error| Error::batch(statement.operation, statement.entity_type, cause);

        let begun = match self.isolation {
            Some(level) => self.connection.begin_with(cx, level).await,
            None => self.connection.begin(cx).await,
        };
        let tx = match begun {
            Outcome::Ok(tx) => tx,
            Outcome::Err(e) => return Outcome::Err(wrap(e)),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        tracing::trace!(sql = %statement.sql, params = statement.params.len(), "Executing batch");
        let affected = match tx.execute(cx, &statement.sql, &statement.params).await {
            Outcome::Ok(n) => n,
            Outcome::Err(e) => {
                tracing::warn!(error = %e, table = statement.table, "Batch failed, rolling back");
                rollback(tx, cx).await;
                return Outcome::Err(wrap(e));
            }
            Outcome::Cancelled(r) => {
                tracing::warn!(table = statement.table, "Batch cancelled, rolling back");
                rollback(tx, cx).await;
                return Outcome::Cancelled(r);
            }
            Outcome::Panicked(p) => {
                tracing::warn!(table = statement.table, "Batch panicked, rolling back");
                rollback(tx, cx).await;
                return Outcome::Panicked(p);
            }
        };

        match tx.commit(cx).await {
            Outcome::Ok(()) => {
                tracing::debug!(affected, table = statement.table, "Batch committed");
                Outcome::Ok(affected)
            }
            Outcome::Err(e) => Outcome::Err(wrap(e)),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }
}

/// Roll back after a failure. Rollback errors are logged, not returned.
async fn rollback<T: TransactionOps>(tx: T, cx: &Cx) {
    match tx.rollback(cx).await {
        Outcome::Ok(()) => tracing::debug!("Rolled back"),
        Outcome::Err(e) => tracing::warn!(error = %e, "Rollback failed"),
        Outcome::Cancelled(_) => tracing::warn!("Rollback cancelled"),
        Outcome::Panicked(_) => tracing::warn!("Rollback panicked"),
    }
}
