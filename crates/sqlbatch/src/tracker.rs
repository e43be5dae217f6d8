//! Staging of modified entities into insert and update buckets.
//!
//! Buckets are keyed by [`EntityType`] and keep first-staging order, so a
//! commit writes types in the order the caller first touched them.

use sqlbatch_core::{Entity, EntityRef, EntityType};
use std::sync::{PoisonError, RwLockReadGuard, RwLockWriteGuard};

/// Read-lock a staged entity, recovering from a poisoned lock.
pub(crate) fn read_entity(entity: &EntityRef) -> RwLockReadGuard<'_, dyn Entity + 'static> {
    entity.read().unwrap_or_else(PoisonError::into_inner)
}

/// Write-lock a staged entity, recovering from a poisoned lock.
pub(crate) fn write_entity(entity: &EntityRef) -> RwLockWriteGuard<'_, dyn Entity + 'static> {
    entity.write().unwrap_or_else(PoisonError::into_inner)
}

/// Staged entities of one type for one operation.
#[derive(Clone)]
pub struct Bucket {
    /// Type shared by every entity in the bucket.
    pub entity_type: EntityType,
    /// Entities in staging order. May contain the same handle twice.
    pub entities: Vec<EntityRef>,
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("entity_type", &self.entity_type)
            .field("entities", &self.entities.len())
            .finish()
    }
}

/// Counts of staged entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    /// Entities waiting to be inserted.
    pub inserts: usize,
    /// Entities waiting to be updated.
    pub updates: usize,
}

impl PendingCounts {
    /// Total number of staged entities.
    pub fn total(&self) -> usize {
        self.inserts + self.updates
    }
}

/// Drained contents of a [`ChangeTracker`].
#[derive(Debug, Default)]
pub struct PendingBatch {
    /// Insert buckets in first-staging order.
    pub inserts: Vec<Bucket>,
    /// Update buckets in first-staging order.
    pub updates: Vec<Bucket>,
}

impl PendingBatch {
    /// Whether nothing was staged.
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

/// Records which entities were staged for insert vs. update.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    inserts: Vec<Bucket>,
    updates: Vec<Bucket>,
}

impl ChangeTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an entity.
    ///
    /// Unmodified entities are ignored. New entities go to the insert bucket
    /// of their type, everything else to the update bucket. Staging the same
    /// handle twice queues it twice.
    pub fn persist(&mut self, entity: EntityRef) {
        let (entity_type, is_new) = {
            let guard = read_entity(&entity);
            if !guard.is_modified() {
                tracing::trace!(
                    entity_type = %guard.entity_type(),
                    "Skipping unmodified entity"
                );
                return;
            }
            (guard.entity_type(), guard.is_new())
        };

        let buckets = if is_new {
            &mut self.inserts
        } else {
            &mut self.updates
        };
        tracing::trace!(entity_type = %entity_type, new = is_new, "Staging entity");

        match buckets.iter_mut().find(|b| b.entity_type == entity_type) {
            Some(bucket) => bucket.entities.push(entity),
            None => buckets.push(Bucket {
                entity_type,
                entities: vec![entity],
            }),
        }
    }

    /// Counts of staged entities.
    pub fn counts(&self) -> PendingCounts {
        PendingCounts {
            inserts: self.inserts.iter().map(|b| b.entities.len()).sum(),
            updates: self.updates.iter().map(|b| b.entities.len()).sum(),
        }
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }

    /// Drain every bucket, leaving the tracker empty.
    pub fn take(&mut self) -> PendingBatch {
        PendingBatch {
            inserts: std::mem::take(&mut self.inserts),
            updates: std::mem::take(&mut self.updates),
        }
    }

    /// Drop everything staged.
    pub fn clear(&mut self) {
        self.inserts.clear();
        self.updates.clear();
    }
}
