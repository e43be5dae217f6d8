//! Batch processor configuration.

use sqlbatch_core::{Dialect, IsolationLevel};

/// How placeholders are spelled in synthesized SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderStyle {
    /// Named, zero-based: `:p0, :p1, ...`
    #[default]
    Named,
    /// The connection dialect's native placeholders (`$1`, `?1`, `?`).
    Dialect,
}

impl PlaceholderStyle {
    /// Render the placeholder for the zero-based parameter `index`.
    pub fn render(self, dialect: Dialect, index: usize) -> String {
        match self {
            PlaceholderStyle::Named => format!(":p{index}"),
            PlaceholderStyle::Dialect => dialect.placeholder(index + 1),
        }
    }
}

/// Which non-key columns an INSERT writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertColumns {
    /// Every non-key column.
    #[default]
    All,
    /// Only columns flagged modified; the database default fills the rest.
    Modified,
}

/// Configuration for a [`BatchProcessor`](crate::BatchProcessor).
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// Isolation level for each bucket transaction (`None` = connection default)
    pub isolation: Option<IsolationLevel>,
    /// Placeholder spelling
    pub placeholders: PlaceholderStyle,
    /// Column selection for INSERT statements
    pub insert_columns: InsertColumns,
    /// Drop entities whose pre hooks return `false` before building SQL
    pub honor_vetoes: bool,
}

impl BatchConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the isolation level used for every bucket transaction.
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    /// Set the placeholder style.
    pub fn placeholders(mut self, style: PlaceholderStyle) -> Self {
        self.placeholders = style;
        self
    }

    /// Set the INSERT column policy.
    pub fn insert_columns(mut self, policy: InsertColumns) -> Self {
        self.insert_columns = policy;
        self
    }

    /// Honor hook vetoes by excluding vetoed entities from the batch.
    pub fn honor_vetoes(mut self, enabled: bool) -> Self {
        self.honor_vetoes = enabled;
        self
    }
}
