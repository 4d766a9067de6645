//! Deferred SELECT over a model.
//!
//! A [`Query`] collects equality conditions, an ordering and a limit. Nothing
//! runs until the results are read; the first read compiles the statement,
//! executes it once and caches the records. Every later read is served from
//! that cache.
//!
//! ```
//! # use autumn::{Database, ModelBuilder, Direction};
//! # fn main() -> autumn::Result<()> {
//! # let db = Database::open_in_memory()?;
//! # db.raw_sql_script("CREATE TABLE user (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")?;
//! let user = ModelBuilder::new("User").register(&db)?;
//!
//! let mut adults = user
//!     .filter("age", 30)
//!     .filter("name", "John")
//!     .order_by("id", Direction::Desc);
//!
//! let (sql, values) = adults.to_sql();
//! assert_eq!(sql, "SELECT * FROM `user` WHERE `age`=? AND `name`=? ORDER BY `id` DESC");
//! assert_eq!(values.len(), 2);
//!
//! assert!(adults.slice(..10)?.is_empty()); // LIMIT 0, 10
//! # Ok(())
//! # }
//! ```

use crate::connection::Database;
use crate::core::{OrmError, Result, Value, escape};
use crate::model::Model;
use crate::model::record::Record;
use crate::model::registry::ModelRegistry;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(OrmError::InvalidArgument(format!(
                "Order direction must be ASC or DESC, got '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

#[derive(Clone)]
pub struct Query {
    model: Arc<Model>,
    db: Database,
    conditions: Vec<(String, Value)>,
    order: Option<(String, Direction)>,
    /// (offset, count)
    limit: Option<(usize, usize)>,
    cache: Option<Vec<Record>>,
}

impl Query {
    pub fn new(model: Arc<Model>) -> Self {
        let db = model.database().clone();
        Self {
            model,
            db,
            conditions: Vec::new(),
            order: None,
            limit: None,
            cache: None,
        }
    }

    /// Query over a model registered in the process-wide registry
    pub fn for_model(name: &str) -> Result<Self> {
        Self::for_model_in(ModelRegistry::global(), name)
    }

    pub fn for_model_in(registry: &ModelRegistry, name: &str) -> Result<Self> {
        let model = registry.get(name).map_err(|_| {
            OrmError::Configuration(format!(
                "Query objects must be created with a registered model, '{}' is unknown",
                name
            ))
        })?;
        Ok(Self::new(model))
    }

    /// Run against another database handle
    pub fn using(mut self, db: Database) -> Self {
        self.db = db;
        self.cache = None;
        self
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Add an equality condition; a repeated field keeps its position and
    /// takes the new value. Drops any cached result.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.conditions.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.conditions.push((field, value)),
        }
        self.cache = None;
        self
    }

    pub fn filter_all<I, K, V>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        conditions
            .into_iter()
            .fold(self, |query, (field, value)| query.filter(field, value))
    }

    /// Replace the ordering. Drops any cached result.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((field.into(), direction));
        self.cache = None;
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn limit(&self) -> Option<(usize, usize)> {
        self.limit
    }

    pub fn is_materialized(&self) -> bool {
        self.cache.is_some()
    }

    /// The SELECT statement and its bound values
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = format!("SELECT * FROM {}", self.model.table_safe());
        sql.push_str(&self.where_clause());

        if let Some((field, direction)) = &self.order {
            sql.push_str(&format!(" ORDER BY {} {}", escape(field), direction));
        }
        if let Some((offset, count)) = self.limit {
            sql.push_str(&format!(" LIMIT {}, {}", offset, count));
        }

        (sql, self.condition_values())
    }

    /// The COUNT statement; ordering and limit do not apply
    pub fn count_sql(&self) -> (String, Vec<Value>) {
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            self.model.table_safe(),
            self.where_clause()
        );
        (sql, self.condition_values())
    }

    /// Execute once and return the cached records
    pub fn fetch(&mut self) -> Result<&[Record]> {
        if self.cache.is_none() {
            let records = self.execute()?;
            self.cache = Some(records);
        }
        Ok(self.cache.as_deref().unwrap_or_default())
    }

    /// Record at `index`: `LIMIT index, 1` when not yet materialized
    pub fn get(&mut self, index: usize) -> Result<Option<Record>> {
        if let Some(cache) = &self.cache {
            return Ok(cache.get(index).cloned());
        }

        self.limit = Some((index, 1));
        Ok(self.fetch()?.first().cloned())
    }

    pub fn first(&mut self) -> Result<Option<Record>> {
        self.get(0)
    }

    /// Records in `range`.
    ///
    /// Unmaterialized: `..stop` limits to `0, stop`, `start..stop` to
    /// `start, stop - start`, and `..` reads everything. A start bound
    /// without a stop bound, or a stop before the start, is rejected.
    /// Materialized: slices the cache.
    pub fn slice<R: RangeBounds<usize>>(&mut self, range: R) -> Result<Vec<Record>> {
        let start = match range.start_bound() {
            Bound::Included(&s) => Some(s),
            Bound::Excluded(&s) => Some(s.checked_add(1).ok_or_else(bound_overflow)?),
            Bound::Unbounded => None,
        };
        let stop = match range.end_bound() {
            Bound::Included(&e) => Some(e.checked_add(1).ok_or_else(bound_overflow)?),
            Bound::Excluded(&e) => Some(e),
            Bound::Unbounded => None,
        };

        if let Some(cache) = &self.cache {
            let len = cache.len();
            let from = start.unwrap_or(0).min(len);
            let to = stop.unwrap_or(len).clamp(from, len);
            return Ok(cache[from..to].to_vec());
        }

        match (start, stop) {
            (Some(_), None) => {
                return Err(OrmError::InvalidArgument(
                    "Limit must be set when an offset is present".into(),
                ));
            }
            (Some(start), Some(stop)) => {
                if stop < start {
                    return Err(OrmError::InvalidArgument(
                        "Limit must be greater than or equal to offset".into(),
                    ));
                }
                self.limit = Some((start, stop - start));
            }
            (None, Some(stop)) => self.limit = Some((0, stop)),
            (None, None) => {}
        }

        Ok(self.fetch()?.to_vec())
    }

    /// Cached length when materialized, otherwise a `SELECT COUNT(*)`
    pub fn count(&mut self) -> Result<usize> {
        if let Some(cache) = &self.cache {
            return Ok(cache.len());
        }

        let (sql, values) = self.count_sql();
        let cursor = self.db.raw_sql(&sql, &values)?;
        cursor
            .scalar()
            .and_then(Value::as_i64)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| OrmError::Execution(format!("COUNT returned no number: {}", sql)))
    }

    pub fn len(&mut self) -> Result<usize> {
        Ok(self.fetch()?.len())
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.fetch()?.is_empty())
    }

    pub fn iter(&mut self) -> Result<std::slice::Iter<'_, Record>> {
        Ok(self.fetch()?.iter())
    }

    pub fn into_records(mut self) -> Result<Vec<Record>> {
        self.fetch()?;
        Ok(self.cache.unwrap_or_default())
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }
        let placeholder = self.db.placeholder();
        let terms: Vec<String> = self
            .conditions
            .iter()
            .map(|(field, _)| format!("{}={}", escape(field), placeholder))
            .collect();
        format!(" WHERE {}", terms.join(" AND "))
    }

    fn condition_values(&self) -> Vec<Value> {
        self.conditions.iter().map(|(_, v)| v.clone()).collect()
    }

    fn execute(&self) -> Result<Vec<Record>> {
        let (sql, values) = self.to_sql();
        let cursor = self.db.raw_sql(&sql, &values)?;

        let records = cursor
            .rows
            .into_iter()
            .map(|row| self.model.from_row(row))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(model = %self.model.name(), rows = records.len(), "query materialized");
        Ok(records)
    }
}

fn bound_overflow() -> OrmError {
    OrmError::InvalidArgument("Slice bound exceeds the largest index".into())
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("model", &self.model.name())
            .field("conditions", &self.conditions)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("materialized", &self.cache.as_ref().map(Vec::len))
            .finish()
    }
}
