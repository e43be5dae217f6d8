//! Table and column metadata supplied by the mapping layer.
//!
//! A [`TableMap`] describes how one entity type is stored: table name,
//! ordered columns, how the primary key is generated, and whether
//! identifiers must be quoted. Maps are resolved per [`EntityType`] through a
//! [`TableMapProvider`]; [`MappingRegistry`] is the in-memory provider.

use crate::entity::EntityType;
use crate::error::{MetadataError, MetadataErrorKind, Result};
use crate::types::{ColumnKind, SqlType};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// How primary key values come into existence on insert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// No generation: the caller supplies the key, which is bound like any
    /// other column.
    #[default]
    ClientSupplied,
    /// The database fills the key (auto-increment, identity, column default).
    Native,
    /// The key is drawn from a named database sequence.
    Sequence(String),
}

/// Metadata about one mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    /// Database column name
    pub name: &'static str,
    /// Semantic type, drives coercion
    pub kind: ColumnKind,
    /// Type used when binding the value
    pub sql_type: SqlType,
    /// Whether this column is (part of) the primary key
    pub primary_key: bool,
}

impl ColumnMap {
    /// Create a plain, non-key column.
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            kind: ColumnKind::Plain,
            sql_type,
            primary_key: false,
        }
    }

    /// Set the semantic kind.
    pub const fn kind(mut self, kind: ColumnKind) -> Self {
        self.kind = kind;
        self
    }

    /// Mark as primary key column.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Shorthand for an enumerated column stored as an integer discriminant.
    pub const fn enumerated(name: &'static str, values: &'static [&'static str]) -> Self {
        Self::new(name, SqlType::Integer).kind(ColumnKind::Enum { values })
    }
}

/// Storage shape of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMap {
    name: &'static str,
    columns: Vec<ColumnMap>,
    key_strategy: KeyStrategy,
    quote_identifiers: bool,
}

impl TableMap {
    /// Create an empty table map.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            columns: Vec::new(),
            key_strategy: KeyStrategy::default(),
            quote_identifiers: false,
        }
    }

    /// Append a column. Column order is the order statements list them in.
    pub fn column(mut self, column: ColumnMap) -> Self {
        self.columns.push(column);
        self
    }

    /// Set the key generation strategy.
    pub fn key_strategy(mut self, strategy: KeyStrategy) -> Self {
        self.key_strategy = strategy;
        self
    }

    /// Draw keys from the named sequence.
    pub fn sequence(self, name: impl Into<String>) -> Self {
        self.key_strategy(KeyStrategy::Sequence(name.into()))
    }

    /// Enable or disable identifier quoting.
    pub fn quote_identifiers(mut self, enabled: bool) -> Self {
        self.quote_identifiers = enabled;
        self
    }

    /// Table name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// All columns in declaration order.
    pub fn columns(&self) -> &[ColumnMap] {
        &self.columns
    }

    /// Primary key columns in declaration order.
    pub fn primary_key_columns(&self) -> impl Iterator<Item = &ColumnMap> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    /// Whether any column is part of the primary key.
    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.primary_key)
    }

    /// Key generation strategy.
    pub fn strategy(&self) -> &KeyStrategy {
        &self.key_strategy
    }

    /// Whether identifiers must be quoted through the dialect.
    pub fn is_identifier_quoting_enabled(&self) -> bool {
        self.quote_identifiers
    }

    /// Check the map is safe to synthesize SQL from.
    ///
    /// Sequence names end up inside an inline SQL literal, so they are limited
    /// to (optionally schema-qualified) plain identifiers.
    pub fn validate(&self) -> Result<()> {
        if let KeyStrategy::Sequence(sequence) = &self.key_strategy {
            let safe = sequence_name_pattern().is_some_and(|pattern| pattern.is_match(sequence));
            if !safe {
                return Err(MetadataError::new(
                    MetadataErrorKind::InvalidSequenceName,
                    format!(
                        "sequence name '{}' for table {} is not a plain identifier",
                        sequence, self.name
                    ),
                )
                .into());
            }
        }
        Ok(())
    }
}

fn sequence_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*)?$").ok())
        .as_ref()
}

/// Entity types that can describe their own table map.
///
/// Lets a registry be filled with `registry.register::<Order>()`.
pub trait Mapped {
    /// Type tag shared by every instance.
    const ENTITY_TYPE: EntityType;

    /// Build the table map for this type.
    fn table_map() -> TableMap;
}

/// Resolves table maps for entity types.
pub trait TableMapProvider: Send + Sync {
    /// Table map for `entity_type`, or `None` if the type is not mapped.
    fn table_map(&self, entity_type: EntityType) -> Option<Arc<TableMap>>;
}

/// In-memory [`TableMapProvider`].
#[derive(Debug, Default, Clone)]
pub struct MappingRegistry {
    maps: HashMap<EntityType, Arc<TableMap>>,
}

impl MappingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a [`Mapped`] type.
    pub fn register<M: Mapped>(&mut self) -> &mut Self {
        self.insert(M::ENTITY_TYPE, M::table_map())
    }

    /// Register a table map under an explicit type tag.
    pub fn insert(&mut self, entity_type: EntityType, table_map: TableMap) -> &mut Self {
        tracing::debug!(
            entity_type = %entity_type,
            table = table_map.name(),
            columns = table_map.columns().len(),
            "Registering table map"
        );
        self.maps.insert(entity_type, Arc::new(table_map));
        self
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// Whether no types are registered.
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

impl TableMapProvider for MappingRegistry {
    fn table_map(&self, entity_type: EntityType) -> Option<Arc<TableMap>> {
        self.maps.get(&entity_type).cloned()
    }
}
