//! Record types: schema discovery, registration and record construction.

pub mod record;
pub mod registry;
pub mod relations;

use crate::connection::Database;
use crate::core::{OrmError, Result, Value, escape};
use crate::query::Query;
use crate::validators::{Validator, ValidatorChain};
use record::Record;
use registry::ModelRegistry;
use relations::Relation;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Value applied to a field that is still unset (falsy) at save time
#[derive(Clone)]
pub enum DefaultValue {
    Constant(Value),
    Computed(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn produce(&self) -> Value {
        match self {
            Self::Constant(value) => value.clone(),
            Self::Computed(producer) => producer(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Declares a record type and registers it.
///
/// # Examples
///
/// ```
/// # use autumn::{Database, ModelBuilder, validators::Length};
/// # fn main() -> autumn::Result<()> {
/// let db = Database::open_in_memory()?;
/// db.raw_sql_script(
///     "CREATE TABLE author (id INTEGER PRIMARY KEY AUTOINCREMENT,
///                           first_name TEXT, last_name TEXT, bio TEXT)",
/// )?;
///
/// let writer = ModelBuilder::new("Writer")
///     .table("author")
///     .default_value("bio", "No bio available")
///     .validate("first_name", Length::default())
///     .register(&db)?;
///
/// assert_eq!(writer.table(), "author");
/// assert_eq!(writer.fields(), ["id", "first_name", "last_name", "bio"]);
/// # Ok(())
/// # }
/// ```
pub struct ModelBuilder {
    name: String,
    table: Option<String>,
    primary_key: Option<String>,
    defaults: Vec<(String, DefaultValue)>,
    validations: Vec<(String, Box<dyn Validator>)>,
    relations: Vec<(String, Relation)>,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            primary_key: None,
            defaults: Vec::new(),
            validations: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Table name; defaults to the lower-cased model name
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Primary key column; defaults to `id`
    pub fn primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = Some(field.into());
        self
    }

    pub fn default_value(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_default(field.into(), DefaultValue::Constant(value.into()))
    }

    /// Default computed by calling `producer` at save time
    pub fn default_with<F>(self, field: impl Into<String>, producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.with_default(field.into(), DefaultValue::Computed(Arc::new(producer)))
    }

    pub fn validate(mut self, field: impl Into<String>, validator: impl Validator + 'static) -> Self {
        let field = field.into();
        self.validations.retain(|(f, _)| *f != field);
        self.validations.push((field, Box::new(validator)));
        self
    }

    /// Several validators for one field, run in order as a chain
    pub fn validate_chain(self, field: impl Into<String>, validators: Vec<Box<dyn Validator>>) -> Self {
        self.validate(field, ValidatorChain::from(validators))
    }

    /// Many-to-one relation keyed by `<target table>_id` on this model
    pub fn foreign_key(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.with_relation(name.into(), Relation::many_to_one(target))
    }

    pub fn foreign_key_on(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        self.with_relation(name.into(), Relation::many_to_one(target).with_field(field))
    }

    /// One-to-many relation keyed by `<this table>_id` on the target model
    pub fn one_to_many(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.with_relation(name.into(), Relation::one_to_many(target))
    }

    pub fn one_to_many_on(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        self.with_relation(name.into(), Relation::one_to_many(target).with_field(field))
    }

    /// Probe the table and register in the process-wide registry
    pub fn register(self, db: &Database) -> Result<Arc<Model>> {
        self.register_in(ModelRegistry::global(), db)
    }

    /// Probe the table and register in `registry`.
    ///
    /// Idempotent per name: when the name is already registered the existing
    /// model is returned and no probe is issued.
    pub fn register_in(self, registry: &Arc<ModelRegistry>, db: &Database) -> Result<Arc<Model>> {
        if let Ok(existing) = registry.get(&self.name) {
            return Ok(existing);
        }

        let table = self.table.unwrap_or_else(|| self.name.to_lowercase());
        let table_safe = escape(&table);
        let primary_key = self.primary_key.unwrap_or_else(|| "id".to_string());

        let probe = db.raw_sql(&format!("SELECT * FROM {} LIMIT 1", table_safe), &[])?;
        let fields = probe.columns;
        if fields.is_empty() {
            return Err(OrmError::Configuration(format!(
                "Table '{}' reported no columns",
                table
            )));
        }

        let declared = self
            .defaults
            .iter()
            .map(|(f, _)| f)
            .chain(self.validations.iter().map(|(f, _)| f))
            .chain(std::iter::once(&primary_key));
        for field in declared {
            if !fields.contains(field) {
                return Err(OrmError::Configuration(format!(
                    "Model '{}' declares field '{}' missing from table '{}'",
                    self.name, field, table
                )));
            }
        }

        tracing::debug!(model = %self.name, table = %table, fields = fields.len(), "registered model");

        let model = Model {
            name: self.name,
            table,
            table_safe,
            primary_key,
            fields,
            defaults: self.defaults,
            validations: self.validations,
            relations: self.relations.into_iter().collect(),
            db: db.clone(),
            registry: Arc::downgrade(registry),
        };
        registry.insert_once(model)
    }

    fn with_default(mut self, field: String, value: DefaultValue) -> Self {
        self.defaults.retain(|(f, _)| *f != field);
        self.defaults.push((field, value));
        self
    }

    fn with_relation(mut self, name: String, relation: Relation) -> Self {
        self.relations.retain(|(n, _)| *n != name);
        self.relations.push((name, relation));
        self
    }
}

/// A registered record type.
///
/// The field list is discovered once from the table at registration and
/// is shared by every record of the type.
pub struct Model {
    name: String,
    table: String,
    table_safe: String,
    primary_key: String,
    fields: Vec<String>,
    defaults: Vec<(String, DefaultValue)>,
    validations: Vec<(String, Box<dyn Validator>)>,
    relations: HashMap<String, Relation>,
    db: Database,
    registry: Weak<ModelRegistry>,
}

impl Model {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Escaped table name as used in generated SQL
    pub fn table_safe(&self) -> &str {
        &self.table_safe
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn defaults(&self) -> &[(String, DefaultValue)] {
        &self.defaults
    }

    pub(crate) fn validations(&self) -> &[(String, Box<dyn Validator>)] {
        &self.validations
    }

    /// Empty unsaved record
    pub fn new_record(self: &Arc<Self>) -> Record {
        Record::new(Arc::clone(self))
    }

    /// Unsaved record with fields bound by name
    pub fn build<I, K, V>(self: &Arc<Self>, named: I) -> Result<Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.instantiate(Vec::<Value>::new(), named)
    }

    /// Unsaved record with values bound to fields in declared order
    pub fn build_positional<I, V>(self: &Arc<Self>, values: I) -> Result<Record>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.instantiate(values, Vec::<(&str, Value)>::new())
    }

    /// Positional values first, then named values, which may overwrite them.
    /// None of these assignments count as changes.
    pub fn instantiate<P, PV, N, K, V>(self: &Arc<Self>, positional: P, named: N) -> Result<Record>
    where
        P: IntoIterator<Item = PV>,
        PV: Into<Value>,
        N: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = self.new_record();

        for (i, value) in positional.into_iter().enumerate() {
            let field = self.fields.get(i).ok_or_else(|| {
                OrmError::InvalidArgument(format!(
                    "Model '{}' has {} fields, got more positional values",
                    self.name,
                    self.fields.len()
                ))
            })?;
            record.assign(field.clone(), value.into());
        }

        for (field, value) in named {
            let field = field.as_ref();
            if !self.has_field(field) {
                return Err(self.unknown_field(field));
            }
            record.assign(field.to_string(), value.into());
        }

        Ok(record)
    }

    /// Persisted record from a result row, values in schema order
    pub(crate) fn from_row(self: &Arc<Self>, row: Vec<Value>) -> Result<Record> {
        let mut record = self.build_positional(row)?;
        record.mark_persisted();
        Ok(record)
    }

    /// Record whose primary key equals `pk`
    pub fn get(self: &Arc<Self>, pk: impl Into<Value>) -> Result<Record> {
        let pk = pk.into();
        self.filter(self.primary_key.clone(), pk.clone())
            .first()?
            .ok_or_else(|| {
                OrmError::NotFound(format!("{} with {}={}", self.name, self.primary_key, pk))
            })
    }

    /// Unfiltered query over every record
    pub fn all(self: &Arc<Self>) -> Query {
        self.query()
    }

    pub fn query(self: &Arc<Self>) -> Query {
        Query::new(Arc::clone(self))
    }

    pub fn filter(self: &Arc<Self>, field: impl Into<String>, value: impl Into<Value>) -> Query {
        self.query().filter(field, value)
    }

    /// Query scoped by equality conditions
    pub fn find<I, K, V>(self: &Arc<Self>, conditions: I) -> Query
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.query().filter_all(conditions)
    }

    pub fn relation(&self, name: &str) -> Result<&Relation> {
        self.relations.get(name).ok_or_else(|| {
            OrmError::Configuration(format!("Model '{}' has no relation '{}'", self.name, name))
        })
    }

    /// The model a relation points at, resolved by name
    pub fn relation_target(&self, name: &str) -> Result<Arc<Model>> {
        self.relation(name)?.target(self)
    }

    /// Look up another model in the registry this one was registered in
    pub fn resolve(&self, name: &str) -> Result<Arc<Model>> {
        let registry = self.registry.upgrade().ok_or_else(|| {
            OrmError::Configuration(format!("Registry of model '{}' has been dropped", self.name))
        })?;
        registry.get(name)
    }

    pub(crate) fn unknown_field(&self, field: &str) -> OrmError {
        OrmError::UnknownField {
            model: self.name.clone(),
            field: field.to_string(),
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("fields", &self.fields)
            .field("defaults", &self.defaults)
            .field("validated", &self.validations.iter().map(|(f, _)| f).collect::<Vec<_>>())
            .field("relations", &self.relations)
            .finish()
    }
}
