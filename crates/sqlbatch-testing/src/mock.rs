//! A connection that records every call and never touches a database.

use asupersync::PanicPayload;
use sqlbatch_core::{
    Connection, Cx, Dialect, Error, IsolationLevel, Outcome, QueryError, QueryErrorKind,
    TransactionOps, Value,
};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One recorded database interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Begin(Option<IsolationLevel>),
    Execute(String, Vec<Value>),
    Commit,
    Rollback,
}

/// Failure injected into the recording connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Opening a transaction fails.
    Begin,
    /// The Nth (1-based) execute fails with a unique violation.
    Execute(usize),
    /// The Nth (1-based) execute reports a panic.
    ExecutePanic(usize),
    /// Commit fails with a serialization error.
    Commit,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<Call>,
    executed: usize,
    fault: Option<Fault>,
}

#[derive(Debug, Clone)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
    dialect: Dialect,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn query_error(kind: QueryErrorKind, sqlstate: &str, message: &str) -> Error {
    let mut err = QueryError::new(kind, message);
    err.sqlstate = Some(sqlstate.to_string());
    Error::Query(err)
}

impl MockConnection {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            dialect,
        }
    }

    pub fn with_fault(self, fault: Fault) -> Self {
        lock(&self.state).fault = Some(fault);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.state).calls.clone()
    }

    /// Executed statements with their bound values, in order.
    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Execute(sql, params) => Some((sql, params)),
                _ => None,
            })
            .collect()
    }

    fn open(&self, isolation: Option<IsolationLevel>) -> Outcome<MockTransaction, Error> {
        let mut state = lock(&self.state);
        state.calls.push(Call::Begin(isolation));
        if state.fault == Some(Fault::Begin) {
            return Outcome::Err(query_error(
                QueryErrorKind::Disconnected,
                "08006",
                "server closed the connection unexpectedly",
            ));
        }
        Outcome::Ok(MockTransaction {
            state: Arc::clone(&self.state),
        })
    }
}

impl Connection for MockConnection {
    type Tx<'conn>
        = MockTransaction
    where
        Self: 'conn;

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn begin(&self, _cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        let outcome = self.open(None);
        async move { outcome }
    }

    fn begin_with(
        &self,
        _cx: &Cx,
        isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        let outcome = self.open(Some(isolation));
        async move { outcome }
    }
}

pub struct MockTransaction {
    state: Arc<Mutex<MockState>>,
}

impl MockTransaction {
    fn run(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<u64, Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }

        let mut state = lock(&self.state);
        state.executed += 1;
        state.calls.push(Call::Execute(sql.to_string(), params.to_vec()));
        match state.fault {
            Some(Fault::Execute(n)) if n == state.executed => Outcome::Err(query_error(
                QueryErrorKind::Constraint,
                "23505",
                "duplicate key value violates unique constraint \"orders_pkey\"",
            )),
            Some(Fault::ExecutePanic(n)) if n == state.executed => {
                Outcome::Panicked(PanicPayload::new("driver panicked mid-statement"))
            }
            _ => Outcome::Ok(sql.matches(';').count() as u64),
        }
    }

    fn finish(&self, call: Call) -> Outcome<(), Error> {
        let mut state = lock(&self.state);
        let failing = call == Call::Commit && state.fault == Some(Fault::Commit);
        state.calls.push(call);
        if failing {
            return Outcome::Err(query_error(
                QueryErrorKind::Serialization,
                "40001",
                "could not serialize access due to concurrent update",
            ));
        }
        Outcome::Ok(())
    }
}

impl TransactionOps for MockTransaction {
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let outcome = self.run(cx, sql, params);
        async move { outcome }
    }

    fn commit(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let outcome = self.finish(Call::Commit);
        async move { outcome }
    }

    fn rollback(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let outcome = self.finish(Call::Rollback);
        async move { outcome }
    }
}
