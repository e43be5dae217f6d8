//! Core types and traits for sqlbatch.
//!
//! This crate provides the abstractions the batch processor consumes from
//! the surrounding object-relational mapping layer:
//!
//! - `Entity` trait with dirty flags and opt-in `Timestamps` / `LifecycleHooks`
//! - `TableMap` / `ColumnMap` metadata and the `TableMapProvider` lookup
//! - `Connection` trait for transactional, dialect-aware execution
//! - `Value` for bound parameters and `Error` for every failure kind
//! - `Outcome` re-export from asupersync for cancel-correct operations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod mapping;
pub mod operation;
pub mod types;
pub mod value;

pub use connection::{Connection, IsolationLevel, TransactionOps};
pub use dialect::Dialect;
pub use entity::{Entity, EntityRef, EntityType, LifecycleHooks, Timestamps};
pub use error::{
    BatchError, Error, FieldValidationError, MetadataError, MetadataErrorKind, QueryError,
    QueryErrorKind, Result, ValidationError, ValidationErrorKind,
};
pub use mapping::{ColumnMap, KeyStrategy, Mapped, MappingRegistry, TableMap, TableMapProvider};
pub use operation::Operation;
pub use types::{ColumnKind, SqlType};
pub use value::Value;
