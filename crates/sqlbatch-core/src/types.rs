//! SQL bind types and semantic column kinds.

/// Database-level data type used when binding a column's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    // Integer types
    SmallInt,
    Integer,
    BigInt,

    // Floating point / fixed precision
    Double,
    Decimal,

    // Boolean
    Boolean,

    // String types
    VarChar,
    Text,

    // Binary
    Blob,

    // Date/time types
    Date,
    Timestamp,

    // JSON
    Json,
}

/// Semantic type of a mapped column, as declared by the mapping layer.
///
/// Drives value coercion before binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnKind {
    /// Bound as-is.
    #[default]
    Plain,
    /// Enumerated column: values must be members of `values` and are stored
    /// as their zero-based position in the set.
    Enum {
        /// Allowed member names, in discriminant order.
        values: &'static [&'static str],
    },
    /// Large text column: arrays and JSON documents are stored as JSON text.
    LongText,
    /// Timestamp column.
    Timestamp,
}

impl ColumnKind {
    /// Position of `name` in the enumerated value set, if this is an enum column.
    pub fn enum_discriminant(&self, name: &str) -> Option<usize> {
        match self {
            ColumnKind::Enum { values } => values.iter().position(|v| *v == name),
            _ => None,
        }
    }
}
