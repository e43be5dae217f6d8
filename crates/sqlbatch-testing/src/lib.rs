//! Test support for sqlbatch: mapped fixture entities, a connection that
//! records every call, and small helpers for unwrapping outcomes.

mod fixtures;
mod mock;

pub use fixtures::{Dirty, Order, PRIORITIES, Tag, registry};
pub use mock::{Call, Fault, MockConnection, MockTransaction};

use sqlbatch_core::{Entity, EntityRef, Error, Outcome};
use std::sync::{Arc, RwLock};

/// Fixed clock reading: 2026-01-01T00:00:00Z in microseconds.
pub const NOW: i64 = 1_767_225_600_000_000;

pub fn fixed_clock() -> i64 {
    NOW
}

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn expect_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        other => panic!("expected error, got {other:?}"),
    }
}

/// Share `entity`, keeping a typed handle for later inspection.
pub fn share<E: Entity + 'static>(entity: E) -> (Arc<RwLock<E>>, EntityRef) {
    let shared = Arc::new(RwLock::new(entity));
    let handle: EntityRef = shared.clone();
    (shared, handle)
}
