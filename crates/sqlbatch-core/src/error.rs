//! Error types for batch persistence.

use crate::entity::EntityType;
use crate::operation::Operation;
use std::fmt;

/// The primary error type for all sqlbatch operations.
#[derive(Debug)]
pub enum Error {
    /// Driver-level statement errors
    Query(QueryError),
    /// A bucket's transactional execution failed (wraps the driver cause)
    Batch(BatchError),
    /// Value validation errors (e.g. enumerated value outside its set)
    Validation(ValidationError),
    /// Mapping metadata errors (unknown entity type, missing key, ...)
    Metadata(MetadataError),
    /// Serialization/deserialization errors
    Serde(String),
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub sqlstate: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Deadlock detected
    Deadlock,
    /// Serialization failure
    Serialization,
    /// Connection lost while the statement was running
    Disconnected,
    /// Statement timeout
    Timeout,
    /// Other database error
    Database,
}

/// A bucket failed to execute; the transaction for that bucket was rolled back.
///
/// Names the operation and entity type so the caller can tell which bucket of
/// a multi-bucket commit failed. The driver error is kept as the source.
#[derive(Debug)]
pub struct BatchError {
    pub operation: Operation,
    pub entity_type: EntityType,
    pub cause: Box<Error>,
}

#[derive(Debug)]
pub struct MetadataError {
    pub kind: MetadataErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataErrorKind {
    /// No table map is registered for the entity type
    UnknownEntityType,
    /// An entity did not provide a value for a mapped column
    MissingColumnValue,
    /// Update requested for a table without primary key columns
    MissingPrimaryKey,
    /// A sequence name is not safe to inline into SQL
    InvalidSequenceName,
}

/// Validation error for column values.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The errors grouped by column name
    pub errors: Vec<FieldValidationError>,
}

/// A single validation error for a column.
#[derive(Debug, Clone)]
pub struct FieldValidationError {
    /// The column that failed validation
    pub field: String,
    /// The kind of validation that failed
    pub kind: ValidationErrorKind,
    /// Human-readable error message
    pub message: String,
}

/// The type of validation constraint that was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Value is not a member of the column's enumerated value set
    EnumValue,
}

impl ValidationError {
    /// Create a new empty validation error container.
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Check if there are any validation errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add a field validation error.
    pub fn add(
        &mut self,
        field: impl Into<String>,
        kind: ValidationErrorKind,
        message: impl Into<String>,
    ) {
        self.errors.push(FieldValidationError {
            field: field.into(),
            kind,
            message: message.into(),
        });
    }

    /// Add an enumerated-value error.
    pub fn add_enum_value(&mut self, field: impl Into<String>, value: impl fmt::Display) {
        self.add(
            field,
            ValidationErrorKind::EnumValue,
            format!("Value \"{value}\" is not accepted in this enumerated column"),
        );
    }
}

impl Default for ValidationError {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataError {
    pub fn new(kind: MetadataErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Error {
    /// Wrap a bucket execution failure.
    pub fn batch(operation: Operation, entity_type: EntityType, cause: Error) -> Self {
        Error::Batch(BatchError {
            operation,
            entity_type,
            cause: Box::new(cause),
        })
    }

    /// Is this a retryable error (deadlock, serialization, timeouts)?
    ///
    /// Batch errors delegate to their cause. The processor itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Query(q) => matches!(
                q.kind,
                QueryErrorKind::Deadlock | QueryErrorKind::Serialization | QueryErrorKind::Timeout
            ),
            Error::Batch(b) => b.cause.is_retryable(),
            _ => false,
        }
    }

    /// Get SQLSTATE if available (e.g., "23505" for unique violation)
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sqlstate.as_deref(),
            Error::Batch(b) => b.cause.sqlstate(),
            _ => None,
        }
    }

    /// The failed bucket, if this is a wrapped execution error.
    pub fn as_batch(&self) -> Option<&BatchError> {
        match self {
            Error::Batch(b) => Some(b),
            _ => None,
        }
    }
}

impl QueryError {
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            sql: None,
            sqlstate: None,
            message: message.into(),
            source: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Query(e) => {
                if let Some(sqlstate) = &e.sqlstate {
                    write!(f, "Query error (SQLSTATE {}): {}", sqlstate, e.message)
                } else {
                    write!(f, "Query error: {}", e.message)
                }
            }
            Error::Batch(e) => write!(f, "{}", e),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Metadata(e) => write!(f, "Metadata error: {}", e.message),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Batch(e) => Some(e.cause.as_ref()),
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sqlstate) = &self.sqlstate {
            write!(f, "{} (SQLSTATE {})", self.message, sqlstate)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to execute {} statement for {}. Error: {}",
            self.operation, self.entity_type, self.cause
        )
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "validation passed")
        } else if self.errors.len() == 1 {
            let err = &self.errors[0];
            write!(f, "validation error on '{}': {}", err.field, err.message)
        } else {
            writeln!(f, "validation errors:")?;
            for err in &self.errors {
                writeln!(f, "  - {}: {}", err.field, err.message)?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<BatchError> for Error {
    fn from(err: BatchError) -> Self {
        Error::Batch(err)
    }
}

impl From<MetadataError> for Error {
    fn from(err: MetadataError) -> Self {
        Error::Metadata(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for sqlbatch operations.
pub type Result<T> = std::result::Result<T, Error>;
