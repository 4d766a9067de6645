use super::Model;
use crate::core::{OrmError, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<ModelRegistry> = Arc::new(ModelRegistry::new());
}

/// Name-indexed map of registered models.
///
/// Each name is written once; relation descriptors resolve their targets
/// through it by name, so a relation may be declared before its target
/// model exists.
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<Model>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by `ModelBuilder::register`
    pub fn global() -> &'static Arc<ModelRegistry> {
        &GLOBAL_REGISTRY
    }

    pub fn get(&self, name: &str) -> Result<Arc<Model>> {
        self.models
            .read()?
            .get(name)
            .cloned()
            .ok_or_else(|| OrmError::Configuration(format!("Model '{}' is not registered", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models
            .read()
            .map(|models| models.contains_key(name))
            .unwrap_or(false)
    }

    pub fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.models.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    pub fn len(&self) -> usize {
        self.models.read().map(|models| models.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert unless the name is taken; the first registration wins
    pub(crate) fn insert_once(&self, model: Model) -> Result<Arc<Model>> {
        let mut models = self.models.write()?;
        let entry = models
            .entry(model.name().to_string())
            .or_insert_with(|| Arc::new(model));
        Ok(Arc::clone(entry))
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names().unwrap_or_default())
            .finish()
    }
}
