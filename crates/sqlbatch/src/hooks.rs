//! Lifecycle hook pipeline.
//!
//! Pre hooks run per phase across the whole bucket (`pre_save` for every
//! entity, then `pre_insert` / `pre_update`), before SQL is built. Post hooks
//! run the same way after the bucket committed, only for entities that were
//! actually written.

use crate::tracker::write_entity;
use sqlbatch_core::{EntityRef, LifecycleHooks, Operation};

/// Entities surviving the pre hooks, and how many were vetoed out.
#[derive(Default)]
pub struct PreHookOutcome {
    /// Entities that continue to synthesis, in bucket order.
    pub kept: Vec<EntityRef>,
    /// Entities excluded by an honored veto.
    pub vetoed: usize,
}

impl std::fmt::Debug for PreHookOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreHookOutcome")
            .field("kept", &self.kept.len())
            .field("vetoed", &self.vetoed)
            .finish()
    }
}

fn call<R>(entity: &EntityRef, absent: R, f: impl FnOnce(&mut dyn LifecycleHooks) -> R) -> R {
    let mut guard = write_entity(entity);
    match guard.hooks() {
        Some(hooks) => f(hooks),
        None => absent,
    }
}

fn run_phase(
    entities: Vec<EntityRef>,
    phase: &'static str,
    honor_vetoes: bool,
    vetoed: &mut usize,
    hook: fn(&mut dyn LifecycleHooks) -> bool,
) -> Vec<EntityRef> {
    let mut kept = Vec::with_capacity(entities.len());
    for entity in entities {
        if call(&entity, true, hook) {
            kept.push(entity);
        } else if honor_vetoes {
            tracing::debug!(hook = phase, "Entity vetoed, excluded from batch");
            *vetoed += 1;
        } else {
            tracing::debug!(hook = phase, "Veto ignored");
            kept.push(entity);
        }
    }
    kept
}

/// Run `pre_save` then `pre_insert` / `pre_update` over a bucket.
pub fn run_pre_hooks(
    entities: Vec<EntityRef>,
    operation: Operation,
    honor_vetoes: bool,
) -> PreHookOutcome {
    let mut vetoed = 0;
    let kept = run_phase(entities, "pre_save", honor_vetoes, &mut vetoed, |h| {
        h.pre_save()
    });
    let kept = match operation {
        Operation::Insert => run_phase(kept, "pre_insert", honor_vetoes, &mut vetoed, |h| {
            h.pre_insert()
        }),
        Operation::Update => run_phase(kept, "pre_update", honor_vetoes, &mut vetoed, |h| {
            h.pre_update()
        }),
    };
    PreHookOutcome { kept, vetoed }
}

/// Run `post_insert` / `post_update` then `post_save` over written entities.
pub fn run_post_hooks<'a>(written: impl Iterator<Item = &'a EntityRef> + Clone, operation: Operation) {
    for entity in written.clone() {
        call(entity, (), |h| match operation {
            Operation::Insert => h.post_insert(),
            Operation::Update => h.post_update(),
        });
    }
    for entity in written {
        call(entity, (), |h| h.post_save());
    }
}
