//! SQL synthesis for one bucket.
//!
//! Every entity in a bucket becomes one `;`-terminated statement and the
//! statements are concatenated into a single compound SQL string. Placeholder
//! numbering runs across the whole compound statement.

use crate::config::{BatchConfig, InsertColumns, PlaceholderStyle};
use crate::diff::{self, InsertSource};
use crate::tracker::write_entity;
use sqlbatch_core::{
    ColumnKind, ColumnMap, Dialect, Entity, EntityRef, EntityType, Error, Operation, Result,
    TableMap, ValidationError, Value,
};

/// Compound statement for one bucket, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStatement {
    /// Insert or update
    pub operation: Operation,
    /// Entity type of the bucket
    pub entity_type: EntityType,
    /// Target table (unquoted)
    pub table: &'static str,
    /// Concatenated SQL
    pub sql: String,
    /// Bound values in placeholder order
    pub params: Vec<Value>,
    /// Number of per-entity statements in `sql`
    pub entity_count: usize,
}

/// Result of synthesizing one bucket.
#[derive(Debug, Default)]
pub struct Synthesized {
    /// `None` when every entity was skipped.
    pub statement: Option<BatchStatement>,
    /// Indices (into the input slice) of entities that got a statement.
    pub emitted: Vec<usize>,
    /// Entities skipped because they had nothing to write.
    pub skipped: usize,
}

/// Stamp `updated_at` (and `created_at` for new entities) with `now`.
///
/// Entities without the timestamp capability are left alone.
pub fn stamp_timestamps(entity: &mut dyn Entity, now: i64) {
    let is_new = entity.is_new();
    if let Some(stamps) = entity.timestamps() {
        if is_new {
            stamps.set_created_at(now);
        }
        stamps.set_updated_at(now);
    }
}

/// Coerce a raw column value into the value that gets bound.
pub fn coerce(column: &ColumnMap, value: Value) -> Result<Value> {
    match column.kind {
        ColumnKind::Enum { values } => coerce_enum(column, values, value),
        ColumnKind::LongText => coerce_long_text(value),
        ColumnKind::Plain | ColumnKind::Timestamp => Ok(value),
    }
}

fn coerce_enum(column: &ColumnMap, members: &[&str], value: Value) -> Result<Value> {
    let index = match &value {
        Value::Null => return Ok(Value::Null),
        Value::Text(name) => column.kind.enum_discriminant(name),
        other => other
            .as_i64()
            .and_then(|i| usize::try_from(i).ok())
            .filter(|i| *i < members.len()),
    };

    match index.and_then(|i| i32::try_from(i).ok()) {
        Some(discriminant) => Ok(Value::Int(discriminant)),
        None => {
            let shown = match value {
                Value::Text(name) => name,
                other => serde_json::to_string(&other)?,
            };
            let mut errors = ValidationError::new();
            errors.add_enum_value(column.name, shown);
            Err(Error::Validation(errors))
        }
    }
}

fn coerce_long_text(value: Value) -> Result<Value> {
    match value {
        Value::Array(_) => Ok(Value::Text(serde_json::to_string(&value)?)),
        Value::Json(doc) if doc.is_array() || doc.is_object() => {
            Ok(Value::Text(serde_json::to_string(&doc)?))
        }
        other => Ok(other),
    }
}

/// Parameter accumulator with global placeholder numbering.
struct Params {
    style: PlaceholderStyle,
    dialect: Dialect,
    values: Vec<Value>,
}

impl Params {
    fn bind(&mut self, column: &ColumnMap, raw: Value) -> Result<String> {
        let value = coerce(column, raw)?;
        let placeholder = self.style.render(self.dialect, self.values.len());
        self.values.push(value);
        Ok(placeholder)
    }
}

/// Builds compound INSERT / UPDATE statements for a bucket.
#[derive(Debug, Clone, Copy)]
pub struct SqlSynthesizer {
    dialect: Dialect,
    placeholders: PlaceholderStyle,
    insert_columns: InsertColumns,
}

impl SqlSynthesizer {
    /// Create a synthesizer for `dialect` using the processor config.
    pub fn new(dialect: Dialect, config: &BatchConfig) -> Self {
        Self {
            dialect,
            placeholders: config.placeholders,
            insert_columns: config.insert_columns,
        }
    }

    fn ident(&self, table: &TableMap, name: &str) -> String {
        if table.is_identifier_quoting_enabled() {
            self.dialect.quote_identifier(name)
        } else {
            name.to_string()
        }
    }

    fn table_ident(&self, table: &TableMap) -> String {
        if table.is_identifier_quoting_enabled() {
            self.dialect.quote_qualified(table.name())
        } else {
            table.name().to_string()
        }
    }

    fn params(&self) -> Params {
        Params {
            style: self.placeholders,
            dialect: self.dialect,
            values: Vec::new(),
        }
    }

    /// Build the compound INSERT for `entities`, stamping timestamps with `now`.
    #[tracing::instrument(level = "debug", skip(self, table, entities), fields(table = table.name(), count = entities.len()))]
    pub fn build_insert(
        &self,
        entity_type: EntityType,
        table: &TableMap,
        entities: &[EntityRef],
        now: i64,
    ) -> Result<Synthesized> {
        let table_ident = self.table_ident(table);
        let mut params = self.params();
        let mut sql = String::new();
        let mut emitted = Vec::with_capacity(entities.len());

        for (index, handle) in entities.iter().enumerate() {
            let mut entity = write_entity(handle);
            stamp_timestamps(&mut *entity, now);

            let sources = diff::resolve_insert(table, &*entity, self.dialect, self.insert_columns)?;
            if sources.is_empty() {
                sql.push_str(&self.default_values_insert(&table_ident));
                emitted.push(index);
                continue;
            }

            let mut columns = Vec::with_capacity(sources.len());
            let mut values = Vec::with_capacity(sources.len());
            for source in sources {
                columns.push(self.ident(table, source.column().name));
                match source {
                    InsertSource::Bound(binding) => {
                        values.push(params.bind(binding.column, binding.value)?);
                    }
                    InsertSource::Expression { sql, .. } => values.push(sql),
                }
            }

            sql.push_str(&format!(
                "INSERT INTO {} ({}) VALUES ({});",
                table_ident,
                columns.join(", "),
                values.join(", ")
            ));
            emitted.push(index);
        }

        Ok(self.finish(Operation::Insert, entity_type, table, sql, params, emitted, 0))
    }

    /// Build the compound UPDATE for `entities`, stamping timestamps with `now`.
    ///
    /// Entities with no modified non-key column are skipped.
    #[tracing::instrument(level = "debug", skip(self, table, entities), fields(table = table.name(), count = entities.len()))]
    pub fn build_update(
        &self,
        entity_type: EntityType,
        table: &TableMap,
        entities: &[EntityRef],
        now: i64,
    ) -> Result<Synthesized> {
        let table_ident = self.table_ident(table);
        let mut params = self.params();
        let mut sql = String::new();
        let mut emitted = Vec::with_capacity(entities.len());
        let mut skipped = 0;

        for (index, handle) in entities.iter().enumerate() {
            let mut entity = write_entity(handle);
            stamp_timestamps(&mut *entity, now);

            let Some(row) = diff::resolve_update(table, &*entity)? else {
                tracing::debug!(entity_type = %entity_type, "No modified columns, skipping entity");
                skipped += 1;
                continue;
            };

            let mut assignments = Vec::with_capacity(row.set.len());
            for binding in row.set {
                let placeholder = params.bind(binding.column, binding.value)?;
                assignments.push(format!("{}={}", self.ident(table, binding.column.name), placeholder));
            }
            let mut conditions = Vec::with_capacity(row.key.len());
            for binding in row.key {
                let placeholder = params.bind(binding.column, binding.value)?;
                conditions.push(format!("{}={}", self.ident(table, binding.column.name), placeholder));
            }

            sql.push_str(&format!(
                "UPDATE {} SET {} WHERE {};",
                table_ident,
                assignments.join(", "),
                conditions.join(" AND ")
            ));
            emitted.push(index);
        }

        Ok(self.finish(Operation::Update, entity_type, table, sql, params, emitted, skipped))
    }

    fn default_values_insert(&self, table_ident: &str) -> String {
        match self.dialect {
            Dialect::Mysql => format!("INSERT INTO {table_ident} () VALUES ();"),
            Dialect::Postgres | Dialect::Sqlite => {
                format!("INSERT INTO {table_ident} DEFAULT VALUES;")
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        operation: Operation,
        entity_type: EntityType,
        table: &TableMap,
        sql: String,
        params: Params,
        emitted: Vec<usize>,
        skipped: usize,
    ) -> Synthesized {
        let statement = (!emitted.is_empty()).then(|| {
            tracing::trace!(sql = %sql, params = params.values.len(), "Synthesized batch SQL");
            BatchStatement {
                operation,
                entity_type,
                table: table.name(),
                sql,
                params: params.values,
                entity_count: emitted.len(),
            }
        });
        Synthesized {
            statement,
            emitted,
            skipped,
        }
    }
}
