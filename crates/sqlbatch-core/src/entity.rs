//! Entity contract consumed by the batch processor.
//!
//! The mapping layer owns dirty tracking; the processor only asks an entity
//! whether it is new, whether it changed, which columns changed, and what
//! its column values are. Timestamp stamping and lifecycle hooks are opt-in
//! capabilities exposed through [`Entity::timestamps`] and [`Entity::hooks`].

use crate::value::Value;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Explicit type tag for a mapped entity type.
///
/// Used as the bucket key and for table map lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityType(&'static str);

impl EntityType {
    /// Create a type tag.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Shared handle to a staged entity.
///
/// The caller keeps ownership; the processor clones the handle while the
/// entity is staged and drops it when the commit cycle ends.
pub type EntityRef = Arc<RwLock<dyn Entity>>;

/// A mapped domain object corresponding to one database row.
pub trait Entity: Send + Sync {
    /// Type tag of this entity.
    fn entity_type(&self) -> EntityType;

    /// Whether the entity has never been persisted.
    fn is_new(&self) -> bool;

    /// Whether any column changed since load (or since creation).
    fn is_modified(&self) -> bool;

    /// Whether `column` changed since load.
    fn is_column_modified(&self, column: &str) -> bool;

    /// Current value of `column`, `None` if the entity does not map it.
    fn column_value(&self, column: &str) -> Option<Value>;

    /// Value `column` had when the entity was loaded.
    ///
    /// Update statements locate rows by the original primary key value.
    fn original_value(&self, column: &str) -> Option<Value> {
        self.column_value(column)
    }

    /// Timestamp capability, if this type carries created/updated stamps.
    fn timestamps(&mut self) -> Option<&mut dyn Timestamps> {
        None
    }

    /// Lifecycle hook capability, if this type wants hook callbacks.
    fn hooks(&mut self) -> Option<&mut dyn LifecycleHooks> {
        None
    }
}

/// Entities that carry creation/update timestamps.
///
/// Timestamps are microseconds since the Unix epoch. A type may carry only
/// one of the two stamps; the other method keeps its no-op default.
pub trait Timestamps {
    /// Set the created-at stamp. Only called for new entities.
    #[allow(unused_variables)]
    fn set_created_at(&mut self, micros: i64) {}

    /// Set the updated-at stamp.
    #[allow(unused_variables)]
    fn set_updated_at(&mut self, micros: i64) {}
}

/// Lifecycle callbacks around a batched write.
///
/// Pre hooks return `false` to request a veto. Whether a veto removes the
/// entity from the batch is decided by the processor configuration.
pub trait LifecycleHooks {
    /// Called for every staged entity before its statement is built.
    fn pre_save(&mut self) -> bool {
        true
    }

    /// Called after `pre_save` for entities in an insert bucket.
    fn pre_insert(&mut self) -> bool {
        true
    }

    /// Called after `pre_save` for entities in an update bucket.
    fn pre_update(&mut self) -> bool {
        true
    }

    /// Called after the insert bucket committed.
    fn post_insert(&mut self) {}

    /// Called after the update bucket committed.
    fn post_update(&mut self) {}

    /// Called last, after `post_insert` / `post_update`.
    fn post_save(&mut self) {}
}
