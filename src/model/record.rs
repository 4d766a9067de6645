use super::Model;
use super::relations::Related;
use crate::connection::Session;
use crate::core::{OrmError, Result, Value, escape};
use crate::query::Query;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Never saved; the next save inserts
    New,
    /// Present in the table; the next save updates changed fields
    Persisted,
    /// Removed; no further saves or deletes
    Deleted,
}

/// One row of a model, with per-field change tracking.
///
/// Values set while building the record are not tracked. Every later
/// [`Record::set`] adds the field to the changed set, which drives the
/// SET clause of the next update and is cleared by each successful save.
#[derive(Clone)]
pub struct Record {
    model: Arc<Model>,
    values: HashMap<String, Value>,
    state: RecordState,
    changed: Vec<String>,
    /// Key of the stored row; differs from the key field after it is set
    stored_pk: Option<Value>,
}

impl Record {
    pub(crate) fn new(model: Arc<Model>) -> Self {
        let mut values = HashMap::new();
        values.insert(model.primary_key().to_string(), Value::Null);
        Self {
            model,
            values,
            state: RecordState::New,
            changed: Vec::new(),
            stored_pk: None,
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn is_new(&self) -> bool {
        self.state == RecordState::New
    }

    pub fn is_deleted(&self) -> bool {
        self.state == RecordState::Deleted
    }

    /// Current value, or `None` when the field was never assigned
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Current value, NULL when unassigned
    pub fn value(&self, field: &str) -> &Value {
        self.values.get(field).unwrap_or(&NULL)
    }

    /// Primary key, once assigned
    pub fn pk(&self) -> Option<&Value> {
        self.get(self.model.primary_key()).filter(|v| !v.is_null())
    }

    /// Assign a field and mark it changed
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        if !self.model.has_field(field) {
            return Err(self.model.unknown_field(field));
        }
        self.track(field.to_string(), value.into());
        Ok(())
    }

    /// Fields written since construction or the last successful save
    pub fn changed_fields(&self) -> &[String] {
        &self.changed
    }

    /// Field/value pairs in schema order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.model
            .fields()
            .iter()
            .map(|f| (f.as_str(), self.value(f)))
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields()
            .map(|(f, v)| (f.to_string(), serde_json::to_value(v).unwrap_or_default()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Apply defaults, validate, then insert or update through the model's
    /// database
    pub fn save(&mut self) -> Result<bool> {
        let db = self.model.database().clone();
        self.save_in(&db)
    }

    /// Same as [`Record::save`], issuing statements through `session`
    pub fn save_in(&mut self, session: &dyn Session) -> Result<bool> {
        self.ensure_not_deleted()?;
        self.apply_defaults();
        self.validate()?;

        if self.is_new() {
            self.insert(session)?;
        } else {
            self.update(session)?;
        }

        self.mark_persisted();
        self.changed.clear();
        Ok(true)
    }

    pub fn delete(&mut self) -> Result<bool> {
        let db = self.model.database().clone();
        self.delete_in(&db)
    }

    pub fn delete_in(&mut self, session: &dyn Session) -> Result<bool> {
        self.ensure_not_deleted()?;
        let pk = self.row_key().ok_or_else(|| {
            OrmError::InvalidArgument(format!(
                "Cannot delete a {} without a primary key",
                self.model.name()
            ))
        })?;

        let placeholder = session.database().placeholder();
        let sql = format!(
            "DELETE FROM {} WHERE {}={}",
            self.model.table_safe(),
            escape(self.model.primary_key()),
            placeholder
        );
        session.raw_sql(&sql, &[pk])?;

        self.state = RecordState::Deleted;
        Ok(true)
    }

    /// Run every declared validator; the first rejection is returned
    pub fn validate(&self) -> Result<()> {
        for (field, validator) in self.model.validations() {
            let value = self.value(field);
            if !validator.validate(value) {
                return Err(OrmError::Validation {
                    field: field.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Read a relation declared on the model
    pub fn related(&self, name: &str) -> Result<Related> {
        self.model.relation(name)?.load(self)
    }

    /// Single record behind a many-to-one relation
    pub fn parent(&self, name: &str) -> Result<Option<Record>> {
        match self.related(name)? {
            Related::One(record) => Ok(record),
            Related::Many(_) => Err(OrmError::Configuration(format!(
                "Relation '{}' is one-to-many",
                name
            ))),
        }
    }

    /// Lazy query behind a one-to-many relation
    pub fn children(&self, name: &str) -> Result<Query> {
        match self.related(name)? {
            Related::Many(query) => Ok(query),
            Related::One(_) => Err(OrmError::Configuration(format!(
                "Relation '{}' is many-to-one",
                name
            ))),
        }
    }

    pub(crate) fn assign(&mut self, field: String, value: Value) {
        self.values.insert(field, value);
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.state = RecordState::Persisted;
        self.stored_pk = self.pk().cloned();
    }

    /// Key that identifies the row in the table
    fn row_key(&self) -> Option<Value> {
        self.stored_pk.clone().or_else(|| self.pk().cloned())
    }

    fn track(&mut self, field: String, value: Value) {
        if !self.changed.contains(&field) {
            self.changed.push(field.clone());
        }
        self.values.insert(field, value);
    }

    fn ensure_not_deleted(&self) -> Result<()> {
        if self.is_deleted() {
            return Err(OrmError::RecordDeleted(self.model.name().to_string()));
        }
        Ok(())
    }

    fn apply_defaults(&mut self) {
        let model = Arc::clone(&self.model);
        for (field, default) in model.defaults() {
            if !self.value(field).is_truthy() {
                self.track(field.clone(), default.produce());
            }
        }
    }

    fn insert(&mut self, session: &dyn Session) -> Result<()> {
        let pk_field = self.model.primary_key();
        let auto_pk = self.pk().is_none();

        let fields: Vec<&String> = self
            .model
            .fields()
            .iter()
            .filter(|f| !auto_pk || f.as_str() != pk_field)
            .collect();

        let placeholder = session.database().placeholder();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.model.table_safe(),
            fields.iter().map(|f| escape(f)).collect::<Vec<_>>().join(", "),
            vec![placeholder; fields.len()].join(", ")
        );
        let values: Vec<Value> = fields.iter().map(|f| self.value(f).clone()).collect();

        let cursor = session.raw_sql(&sql, &values)?;

        if auto_pk {
            match cursor.last_insert_id {
                Some(id) => {
                    let pk_field = pk_field.to_string();
                    self.assign(pk_field, Value::Integer(id));
                }
                None => tracing::warn!(
                    model = %self.model.name(),
                    "driver reported no inserted id"
                ),
            }
        }
        Ok(())
    }

    fn update(&mut self, session: &dyn Session) -> Result<()> {
        if self.changed.is_empty() {
            tracing::trace!(model = %self.model.name(), "nothing changed, update skipped");
            return Ok(());
        }

        let placeholder = session.database().placeholder();
        let assignments: Vec<String> = self
            .changed
            .iter()
            .map(|f| format!("{}={}", escape(f), placeholder))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {}={}",
            self.model.table_safe(),
            assignments.join(", "),
            escape(self.model.primary_key()),
            placeholder
        );

        let mut values: Vec<Value> = self.changed.iter().map(|f| self.value(f).clone()).collect();
        values.push(self.row_key().unwrap_or_default());

        session.raw_sql(&sql, &values)?;
        Ok(())
    }
}

/// Same model and equal values in every field
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.model.name() == other.model.name()
            && self
                .model
                .fields()
                .iter()
                .all(|f| self.value(f) == other.value(f))
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(self.model.name());
        for (field, value) in self.fields() {
            out.field(field, value);
        }
        out.field("state", &self.state).finish()
    }
}
