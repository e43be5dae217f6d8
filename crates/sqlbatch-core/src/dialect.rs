//! SQL dialect (database adapter) behavior.
//!
//! The dialect is the only adapter knowledge the batch processor needs:
//! how to quote identifiers, what the native placeholder looks like, and
//! whether key sequences can be referenced inline.

/// SQL dialect of the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// PostgreSQL dialect (uses $1, $2 placeholders)
    #[default]
    Postgres,
    /// SQLite dialect (uses ?1, ?2 placeholders)
    Sqlite,
    /// MySQL dialect (uses ? placeholders)
    Mysql,
}

impl Dialect {
    /// Generate a native placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Quote an identifier for this dialect.
    ///
    /// Embedded quote characters are escaped by doubling them:
    /// - For Postgres/SQLite: `"` becomes `""`
    /// - For MySQL: `` ` `` becomes ``` `` ```
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                format!("\"{}\"", name.replace('"', "\"\""))
            }
            Dialect::Mysql => format!("`{}`", name.replace('`', "``")),
        }
    }

    /// Quote a possibly schema-qualified name one dotted part at a time.
    pub fn quote_qualified(self, name: &str) -> String {
        name.split('.')
            .map(|part| self.quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Whether sequence-backed keys are written as an inline `nextval` call.
    ///
    /// Only PostgreSQL needs the key value spelled out; the other dialects
    /// fill the key column from their native auto-increment.
    pub const fn supports_sequences(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Inline expression fetching the next value of `sequence`.
    pub fn next_sequence_value(self, sequence: &str) -> String {
        format!("(SELECT nextval('{sequence}'))")
    }
}
