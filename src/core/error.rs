use super::value::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrmError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Improper value \"{value}\" for \"{field}\"")]
    Validation { field: String, value: Value },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Field '{field}' not found in model '{model}'")]
    UnknownField { model: String, field: String },

    #[error("Record of model '{0}' has been deleted")]
    RecordDeleted(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error(transparent)]
    Driver(#[from] rusqlite::Error),

    #[error("Lock error: {0}")]
    Lock(String),
}

impl OrmError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, OrmError>;

impl<T> From<std::sync::PoisonError<T>> for OrmError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
