//! The batch processor: stage entities, then flush them in one commit.

use crate::config::BatchConfig;
use crate::executor::StatementExecutor;
use crate::hooks;
use crate::synth::SqlSynthesizer;
use crate::tracker::{Bucket, ChangeTracker, PendingCounts};
use sqlbatch_core::{
    Connection, Cx, EntityRef, EntityType, Error, MetadataError, MetadataErrorKind, Operation,
    Outcome, Result, TableMap, TableMapProvider,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Counts reported by a successful [`BatchProcessor::commit`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Entities written by INSERT statements
    pub inserted: usize,
    /// Entities written by UPDATE statements
    pub updated: usize,
    /// Entities skipped with nothing to write
    pub skipped: usize,
    /// Entities excluded by an honored hook veto
    pub vetoed: usize,
    /// Compound statements executed (one per non-empty bucket)
    pub statements: usize,
}

impl CommitSummary {
    /// Whether the commit wrote nothing.
    pub fn is_empty(&self) -> bool {
        self.statements == 0
    }
}

/// Current time in microseconds since the Unix epoch.
pub fn system_clock() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
}

/// Stages modified entities and writes them as batched INSERT/UPDATE
/// statements, one transaction per (operation, entity type) bucket.
///
/// # Example
///
/// ```ignore
/// let mut registry = MappingRegistry::new();
/// registry.register::<Order>();
///
/// let mut processor = BatchProcessor::new(conn, Arc::new(registry));
/// processor.persist(order.clone());
/// processor.persist(other.clone());
/// let summary = processor.commit(&cx).await?;
/// ```
pub struct BatchProcessor<C: Connection> {
    connection: C,
    provider: Arc<dyn TableMapProvider>,
    table_maps: HashMap<EntityType, Arc<TableMap>>,
    tracker: ChangeTracker,
    config: BatchConfig,
    clock: fn() -> i64,
}

impl<C: Connection> BatchProcessor<C> {
    /// Create a processor writing through `connection`, resolving table maps
    /// from `provider`.
    pub fn new(connection: C, provider: Arc<dyn TableMapProvider>) -> Self {
        Self {
            connection,
            provider,
            table_maps: HashMap::new(),
            tracker: ChangeTracker::new(),
            config: BatchConfig::default(),
            clock: system_clock,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the timestamp clock (microseconds since the Unix epoch).
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Consume the processor, returning the connection. Staged entities are dropped.
    pub fn into_connection(self) -> C {
        self.connection
    }

    /// Stage an entity for the next commit. Unmodified entities are ignored.
    pub fn persist(&mut self, entity: EntityRef) {
        self.tracker.persist(entity);
    }

    /// Counts of staged entities.
    pub fn pending_counts(&self) -> PendingCounts {
        self.tracker.counts()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Drop everything staged without writing.
    pub fn clear(&mut self) {
        self.tracker.clear();
    }

    /// Table map for `entity_type`, resolved once and cached.
    pub fn table_map(&mut self, entity_type: EntityType) -> Result<Arc<TableMap>> {
        if let Some(map) = self.table_maps.get(&entity_type) {
            return Ok(Arc::clone(map));
        }

        let map = self.provider.table_map(entity_type).ok_or_else(|| {
            Error::Metadata(MetadataError::new(
                MetadataErrorKind::UnknownEntityType,
                format!("no table map registered for entity type {entity_type}"),
            ))
        })?;
        map.validate()?;

        tracing::debug!(entity_type = %entity_type, table = map.name(), "Resolved table map");
        self.table_maps.insert(entity_type, Arc::clone(&map));
        Ok(map)
    }

    /// Write everything staged: insert buckets first, then update buckets,
    /// each in its own transaction.
    ///
    /// Stops at the first failing bucket. Buckets committed before the
    /// failure stay committed. Staged state is cleared either way.
    #[tracing::instrument(level = "info", skip(self, cx))]
    pub async fn commit(&mut self, cx: &Cx) -> Outcome<CommitSummary, Error> {
        let counts = self.tracker.counts();
        let batch = self.tracker.take();
        if batch.is_empty() {
            tracing::debug!("Nothing staged");
            return Outcome::Ok(CommitSummary::default());
        }

        tracing::info!(
            inserts = counts.inserts,
            updates = counts.updates,
            "Committing batch"
        );
        let start = std::time::Instant::now();
        let mut summary = CommitSummary::default();

        let buckets = batch
            .inserts
            .into_iter()
            .map(|b| (Operation::Insert, b))
            .chain(batch.updates.into_iter().map(|b| (Operation::Update, b)));

        for (operation, bucket) in buckets {
            match self.flush_bucket(cx, operation, bucket, &mut summary).await {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis(),
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            statements = summary.statements,
            "Batch committed"
        );
        Outcome::Ok(summary)
    }

    #[tracing::instrument(
        level = "debug",
        skip(self, cx, bucket, summary),
        fields(entity_type = %bucket.entity_type, count = bucket.entities.len())
    )]
    async fn flush_bucket(
        &mut self,
        cx: &Cx,
        operation: Operation,
        bucket: Bucket,
        summary: &mut CommitSummary,
    ) -> Outcome<(), Error> {
        let entity_type = bucket.entity_type;
        let table = match self.table_map(entity_type) {
            Ok(table) => table,
            Err(e) => return Outcome::Err(e),
        };

        let pre = hooks::run_pre_hooks(bucket.entities, operation, self.config.honor_vetoes);
        summary.vetoed += pre.vetoed;

        let synth = SqlSynthesizer::new(self.connection.dialect(), &self.config);
        let now = (self.clock)();
        let built = match operation {
            Operation::Insert => synth.build_insert(entity_type, &table, &pre.kept, now),
            Operation::Update => synth.build_update(entity_type, &table, &pre.kept, now),
        };
        let built = match built {
            Ok(built) => built,
            Err(e) => return Outcome::Err(e),
        };
        summary.skipped += built.skipped;

        let Some(statement) = built.statement else {
            tracing::debug!("Nothing to write for bucket");
            return Outcome::Ok(());
        };

        let executor = StatementExecutor::new(&self.connection, self.config.isolation);
        match executor.execute(cx, &statement).await {
            Outcome::Ok(_) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }

        summary.statements += 1;
        match operation {
            Operation::Insert => summary.inserted += statement.entity_count,
            Operation::Update => summary.updated += statement.entity_count,
        }

        hooks::run_post_hooks(built.emitted.iter().map(|&i| &pre.kept[i]), operation);
        Outcome::Ok(())
    }
}

impl<C: Connection + std::fmt::Debug> std::fmt::Debug for BatchProcessor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("connection", &self.connection)
            .field("tracker", &self.tracker)
            .field("config", &self.config)
            .field("cached_table_maps", &self.table_maps.len())
            .finish_non_exhaustive()
    }
}
