//! Mapped fixture entities.

use sqlbatch_core::{
    ColumnKind, ColumnMap, Entity, EntityRef, EntityType, LifecycleHooks, Mapped,
    MappingRegistry, SqlType, TableMap, Timestamps, Value,
};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

/// Columns changed since load.
#[derive(Debug, Clone, Default)]
pub struct Dirty(BTreeSet<&'static str>);

impl Dirty {
    pub fn mark(&mut self, column: &'static str) {
        self.0.insert(column);
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains(column)
    }

    pub fn any(&self) -> bool {
        !self.0.is_empty()
    }
}

pub const PRIORITIES: &[&str] = &["low", "normal", "high"];

/// Order row: enumerated priority, long-text notes, optional timestamps,
/// and hooks that record each call in `hook_log`. A hook named in `refuse`
/// vetoes.
#[derive(Debug, Clone, Default)]
pub struct Order {
    pub id: Option<i64>,
    pub persisted_id: Option<i64>,
    pub status: String,
    pub total: i64,
    pub priority: Value,
    pub notes: Value,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub dirty: Dirty,
    pub stamps: bool,
    pub hook_log: Vec<&'static str>,
    pub refuse: Option<&'static str>,
}

impl Order {
    pub fn new(status: &str, total: i64) -> Self {
        let mut order = Self {
            status: status.to_string(),
            total,
            priority: Value::from("normal"),
            ..Self::default()
        };
        for column in ["status", "total", "priority"] {
            order.dirty.mark(column);
        }
        order
    }

    pub fn from_row(id: i64, status: &str, total: i64) -> Self {
        Self {
            id: Some(id),
            persisted_id: Some(id),
            status: status.to_string(),
            total,
            priority: Value::from("normal"),
            ..Self::default()
        }
    }

    pub fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
        self.dirty.mark("status");
    }

    pub fn set_total(&mut self, total: i64) {
        self.total = total;
        self.dirty.mark("total");
    }

    pub fn set_priority(&mut self, priority: impl Into<Value>) {
        self.priority = priority.into();
        self.dirty.mark("priority");
    }

    pub fn set_notes(&mut self, notes: Value) {
        self.notes = notes;
        self.dirty.mark("notes");
    }

    pub fn with_stamps(mut self) -> Self {
        self.stamps = true;
        self
    }

    pub fn into_ref(self) -> EntityRef {
        Arc::new(RwLock::new(self))
    }

    fn log(&mut self, hook: &'static str) -> bool {
        self.hook_log.push(hook);
        self.refuse != Some(hook)
    }
}

impl Mapped for Order {
    const ENTITY_TYPE: EntityType = EntityType::new("Order");

    fn table_map() -> TableMap {
        TableMap::new("orders")
            .column(ColumnMap::new("id", SqlType::BigInt).primary_key(true))
            .column(ColumnMap::new("status", SqlType::VarChar))
            .column(ColumnMap::new("total", SqlType::BigInt))
            .column(ColumnMap::enumerated("priority", PRIORITIES))
            .column(ColumnMap::new("notes", SqlType::Text).kind(ColumnKind::LongText))
            .column(ColumnMap::new("created_at", SqlType::Timestamp).kind(ColumnKind::Timestamp))
            .column(ColumnMap::new("updated_at", SqlType::Timestamp).kind(ColumnKind::Timestamp))
    }
}

impl Entity for Order {
    fn entity_type(&self) -> EntityType {
        Self::ENTITY_TYPE
    }

    fn is_new(&self) -> bool {
        self.persisted_id.is_none()
    }

    fn is_modified(&self) -> bool {
        self.dirty.any()
    }

    fn is_column_modified(&self, column: &str) -> bool {
        self.dirty.contains(column)
    }

    fn column_value(&self, column: &str) -> Option<Value> {
        let value = match column {
            "id" => Value::from(self.id),
            "status" => Value::from(self.status.clone()),
            "total" => Value::BigInt(self.total),
            "priority" => self.priority.clone(),
            "notes" => self.notes.clone(),
            "created_at" => self.created_at.map_or(Value::Null, Value::Timestamp),
            "updated_at" => self.updated_at.map_or(Value::Null, Value::Timestamp),
            _ => return None,
        };
        Some(value)
    }

    fn original_value(&self, column: &str) -> Option<Value> {
        if column == "id" {
            return Some(Value::from(self.persisted_id));
        }
        self.column_value(column)
    }

    fn timestamps(&mut self) -> Option<&mut dyn Timestamps> {
        if self.stamps { Some(self) } else { None }
    }

    fn hooks(&mut self) -> Option<&mut dyn LifecycleHooks> {
        Some(self)
    }
}

impl Timestamps for Order {
    fn set_created_at(&mut self, micros: i64) {
        self.created_at = Some(micros);
        self.dirty.mark("created_at");
    }

    fn set_updated_at(&mut self, micros: i64) {
        self.updated_at = Some(micros);
        self.dirty.mark("updated_at");
    }
}

impl LifecycleHooks for Order {
    fn pre_save(&mut self) -> bool {
        self.log("pre_save")
    }

    fn pre_insert(&mut self) -> bool {
        self.log("pre_insert")
    }

    fn pre_update(&mut self) -> bool {
        self.log("pre_update")
    }

    fn post_insert(&mut self) {
        self.log("post_insert");
    }

    fn post_update(&mut self) {
        self.log("post_update");
    }

    fn post_save(&mut self) {
        self.log("post_save");
    }
}

/// Plain entity with no timestamps and no hooks.
#[derive(Debug, Clone, Default)]
pub struct Tag {
    pub id: Option<i64>,
    pub label: String,
    pub is_new: bool,
    pub dirty: Dirty,
}

impl Tag {
    pub fn new(label: &str) -> Self {
        let mut tag = Self {
            label: label.to_string(),
            is_new: true,
            ..Self::default()
        };
        tag.dirty.mark("label");
        tag
    }

    pub fn renamed(id: i64, label: &str) -> Self {
        let mut tag = Self {
            id: Some(id),
            label: label.to_string(),
            ..Self::default()
        };
        tag.dirty.mark("label");
        tag
    }

    pub fn into_ref(self) -> EntityRef {
        Arc::new(RwLock::new(self))
    }
}

impl Mapped for Tag {
    const ENTITY_TYPE: EntityType = EntityType::new("Tag");

    fn table_map() -> TableMap {
        TableMap::new("tags")
            .column(ColumnMap::new("id", SqlType::Integer).primary_key(true))
            .column(ColumnMap::new("label", SqlType::VarChar))
    }
}

impl Entity for Tag {
    fn entity_type(&self) -> EntityType {
        Self::ENTITY_TYPE
    }

    fn is_new(&self) -> bool {
        self.is_new
    }

    fn is_modified(&self) -> bool {
        self.dirty.any()
    }

    fn is_column_modified(&self, column: &str) -> bool {
        self.dirty.contains(column)
    }

    fn column_value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::from(self.id)),
            "label" => Some(Value::from(self.label.clone())),
            _ => None,
        }
    }
}

pub fn registry() -> Arc<MappingRegistry> {
    let mut registry = MappingRegistry::new();
    registry.register::<Order>().register::<Tag>();
    Arc::new(registry)
}
