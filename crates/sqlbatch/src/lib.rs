//! Batched INSERT/UPDATE persistence for mapped entities.
//!
//! `sqlbatch` collects modified entities in memory and writes them with as
//! few database round trips as possible: one compound statement per
//! (operation, entity type) bucket, each bucket in its own transaction.
//!
//! # Flow
//!
//! 1. [`BatchProcessor::persist`] stages entities that report modifications,
//!    splitting them into insert and update buckets.
//! 2. [`BatchProcessor::commit`] runs pre hooks, stamps timestamps, resolves
//!    changed columns, synthesizes one SQL string per bucket, executes it
//!    transactionally and runs post hooks.
//!
//! # Example
//!
//! ```ignore
//! use sqlbatch::prelude::*;
//!
//! let mut registry = MappingRegistry::new();
//! registry.register::<Order>();
//!
//! let mut processor = BatchProcessor::new(conn, Arc::new(registry))
//!     .with_config(BatchConfig::new().isolation(IsolationLevel::Serializable));
//!
//! processor.persist(new_order);
//! processor.persist(paid_order);
//! let summary = processor.commit(&cx).await?;
//! assert_eq!(summary.statements, 2);
//! ```

pub mod config;
pub mod diff;
pub mod executor;
pub mod hooks;
pub mod processor;
pub mod synth;
pub mod tracker;

pub use config::{BatchConfig, InsertColumns, PlaceholderStyle};
pub use diff::{Binding, InsertSource, UpdateRow};
pub use executor::StatementExecutor;
pub use processor::{BatchProcessor, CommitSummary, system_clock};
pub use synth::{BatchStatement, SqlSynthesizer, Synthesized};
pub use tracker::{Bucket, ChangeTracker, PendingBatch, PendingCounts};

pub use sqlbatch_core::{
    BatchError, ColumnKind, ColumnMap, Connection, Cx, Dialect, Entity, EntityRef, EntityType,
    Error, IsolationLevel, KeyStrategy, LifecycleHooks, Mapped, MappingRegistry, Operation,
    Outcome, Result, SqlType, TableMap, TableMapProvider, Timestamps, TransactionOps, Value,
};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        BatchConfig, BatchProcessor, ColumnKind, ColumnMap, CommitSummary, Connection, Cx,
        Dialect, Entity, EntityRef, EntityType, Error, InsertColumns, IsolationLevel,
        KeyStrategy, LifecycleHooks, Mapped, MappingRegistry, Operation, Outcome,
        PlaceholderStyle, Result, SqlType, TableMap, TableMapProvider, Timestamps,
        TransactionOps, Value,
    };
}
