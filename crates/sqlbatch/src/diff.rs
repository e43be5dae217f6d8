//! Column diff resolution.
//!
//! Decides which columns an INSERT or UPDATE writes for one entity and
//! captures their raw values. Coercion happens later, in the synthesizer.

use crate::config::InsertColumns;
use sqlbatch_core::{
    ColumnMap, Dialect, Entity, Error, KeyStrategy, MetadataError, MetadataErrorKind, Result,
    SqlType, TableMap, Value,
};

/// A column paired with the raw value it will be bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding<'m> {
    /// Column metadata
    pub column: &'m ColumnMap,
    /// Raw, uncoerced value
    pub value: Value,
}

impl Binding<'_> {
    /// Type the value is bound as.
    pub fn bind_type(&self) -> SqlType {
        self.column.sql_type
    }
}

/// Where an INSERT column takes its value from.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource<'m> {
    /// A bound parameter.
    Bound(Binding<'m>),
    /// An inline SQL expression (sequence draw), not bound.
    Expression {
        /// Column metadata
        column: &'m ColumnMap,
        /// SQL emitted in place of a placeholder
        sql: String,
    },
}

impl<'m> InsertSource<'m> {
    /// The column this source fills.
    pub fn column(&self) -> &'m ColumnMap {
        match self {
            InsertSource::Bound(binding) => binding.column,
            InsertSource::Expression { column, .. } => column,
        }
    }
}

/// Resolved columns for one UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRow<'m> {
    /// Modified non-key columns, in column-map order.
    pub set: Vec<Binding<'m>>,
    /// Key columns bound to their loaded values.
    pub key: Vec<Binding<'m>>,
}

fn missing_value(table: &TableMap, column: &ColumnMap) -> Error {
    Error::Metadata(MetadataError::new(
        MetadataErrorKind::MissingColumnValue,
        format!(
            "entity provided no value for mapped column {}.{}",
            table.name(),
            column.name
        ),
    ))
}

fn current_value(table: &TableMap, entity: &dyn Entity, column: &ColumnMap) -> Result<Value> {
    entity
        .column_value(column.name)
        .ok_or_else(|| missing_value(table, column))
}

/// Resolve the columns written by an INSERT of `entity`.
///
/// Non-key columns follow `policy`. Key columns follow the table's key
/// strategy: client-supplied keys are bound when non-null, native keys are
/// omitted, and sequence keys become an inline draw on dialects with
/// sequences (omitted elsewhere).
pub fn resolve_insert<'m>(
    table: &'m TableMap,
    entity: &dyn Entity,
    dialect: Dialect,
    policy: InsertColumns,
) -> Result<Vec<InsertSource<'m>>> {
    let mut sources = Vec::with_capacity(table.columns().len());

    for column in table.columns() {
        if column.primary_key {
            match table.strategy() {
                KeyStrategy::ClientSupplied => {
                    let value = current_value(table, entity, column)?;
                    if !value.is_null() {
                        sources.push(InsertSource::Bound(Binding { column, value }));
                    }
                }
                KeyStrategy::Native => {}
                KeyStrategy::Sequence(name) => {
                    if dialect.supports_sequences() {
                        sources.push(InsertSource::Expression {
                            column,
                            sql: dialect.next_sequence_value(name),
                        });
                    }
                }
            }
            continue;
        }

        if policy == InsertColumns::Modified && !entity.is_column_modified(column.name) {
            continue;
        }
        let value = current_value(table, entity, column)?;
        sources.push(InsertSource::Bound(Binding { column, value }));
    }

    Ok(sources)
}

/// Resolve the SET and WHERE columns of an UPDATE of `entity`.
///
/// Returns `Ok(None)` when no non-key column is modified.
pub fn resolve_update<'m>(table: &'m TableMap, entity: &dyn Entity) -> Result<Option<UpdateRow<'m>>> {
    if !table.has_primary_key() {
        return Err(Error::Metadata(MetadataError::new(
            MetadataErrorKind::MissingPrimaryKey,
            format!("table {} has no primary key and cannot be updated", table.name()),
        )));
    }

    let mut set = Vec::new();
    for column in table.columns().iter().filter(|c| !c.primary_key) {
        if entity.is_column_modified(column.name) {
            let value = current_value(table, entity, column)?;
            set.push(Binding { column, value });
        }
    }
    if set.is_empty() {
        return Ok(None);
    }

    let key = table
        .primary_key_columns()
        .map(|column| {
            entity
                .original_value(column.name)
                .map(|value| Binding { column, value })
                .ok_or_else(|| missing_value(table, column))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(UpdateRow { set, key }))
}
