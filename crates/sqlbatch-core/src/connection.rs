//! Connection and transaction traits the batch processor writes through.
//!
//! Drivers implement [`Connection`]; every bucket runs inside one
//! [`TransactionOps`] handle. Methods take the asupersync `Cx` and return
//! `Outcome` so cancellation reaches the driver.

use crate::dialect::Dialect;
use crate::value::Value;
use asupersync::{Cx, Outcome};
use std::future::Future;

/// Isolation level requested when a bucket transaction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Handle to a database that can run compound statements.
///
/// ```rust,ignore
/// let tx = conn.begin_with(&cx, IsolationLevel::Serializable).await?;
/// tx.execute(&cx, "UPDATE orders SET status=:p0 WHERE id=:p1;", &params).await?;
/// tx.commit(&cx).await?;
/// ```
pub trait Connection: Send + Sync {
    /// Transaction handle borrowed from this connection.
    type Tx<'conn>: TransactionOps
    where
        Self: 'conn;

    /// Dialect used for quoting, placeholders and sequence support.
    fn dialect(&self) -> Dialect;

    /// Open a transaction at the server's default isolation.
    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, crate::Error>> + Send;

    /// Open a transaction at `isolation`.
    fn begin_with(
        &self,
        cx: &Cx,
        isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, crate::Error>> + Send;
}

/// An open transaction. Finished by exactly one of `commit` or `rollback`.
pub trait TransactionOps: Send {
    /// Run `sql` inside the transaction; returns rows affected.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, crate::Error>> + Send;

    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), crate::Error>> + Send;

    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), crate::Error>> + Send;
}
