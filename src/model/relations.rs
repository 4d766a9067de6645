use super::Model;
use super::record::Record;
use crate::core::Result;
use crate::query::Query;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// This record holds the key of a single target record
    ManyToOne,
    /// Target records hold this record's key
    OneToMany,
}

/// Relation to another model, declared by the target's registered name.
#[derive(Debug, Clone)]
pub struct Relation {
    kind: RelationKind,
    target: String,
    field: Option<String>,
}

/// Outcome of reading a relation from a record
#[derive(Debug)]
pub enum Related {
    One(Option<Record>),
    Many(Query),
}

impl Relation {
    pub fn many_to_one(target: impl Into<String>) -> Self {
        Self {
            kind: RelationKind::ManyToOne,
            target: target.into(),
            field: None,
        }
    }

    pub fn one_to_many(target: impl Into<String>) -> Self {
        Self {
            kind: RelationKind::OneToMany,
            target: target.into(),
            field: None,
        }
    }

    /// Explicit foreign-key column instead of the `<table>_id` convention
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn target_name(&self) -> &str {
        &self.target
    }

    pub fn target(&self, owner: &Model) -> Result<Arc<Model>> {
        owner.resolve(&self.target)
    }

    /// Foreign-key column: on the owner for many-to-one, on the target for
    /// one-to-many
    pub fn foreign_key(&self, owner: &Model, target: &Model) -> String {
        if let Some(field) = &self.field {
            return field.clone();
        }
        match self.kind {
            RelationKind::ManyToOne => format!("{}_id", target.table()),
            RelationKind::OneToMany => format!("{}_id", owner.table()),
        }
    }

    pub fn load(&self, record: &Record) -> Result<Related> {
        let owner = record.model();
        let target = self.target(owner)?;
        let field = self.foreign_key(owner, &target);

        match self.kind {
            RelationKind::ManyToOne => {
                let key = record.value(&field);
                if key.is_null() {
                    return Ok(Related::One(None));
                }
                let found = target
                    .filter(target.primary_key().to_string(), key.clone())
                    .first()?;
                Ok(Related::One(found))
            }
            RelationKind::OneToMany => {
                let key = record.value(owner.primary_key()).clone();
                Ok(Related::Many(target.filter(field, key)))
            }
        }
    }
}
