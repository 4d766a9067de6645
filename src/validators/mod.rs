//! Value predicates used to gate record saves.
//!
//! Any `Fn(&Value) -> bool` is a validator; the types here are the reusable
//! building blocks. A [`ValidatorChain`] runs its members in order and stops
//! at the first rejection.

use crate::core::{OrmError, Result, Value};
use lazy_static::lazy_static;

pub trait Validator: Send + Sync {
    fn validate(&self, value: &Value) -> bool;
}

impl<F> Validator for F
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn validate(&self, value: &Value) -> bool {
        self(value)
    }
}

/// Ordered validators, failing on the first `false`
#[derive(Default)]
pub struct ValidatorChain {
    validators: Vec<Box<dyn Validator>>,
}

impl ValidatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl From<Vec<Box<dyn Validator>>> for ValidatorChain {
    fn from(validators: Vec<Box<dyn Validator>>) -> Self {
        Self { validators }
    }
}

impl Validator for ValidatorChain {
    fn validate(&self, value: &Value) -> bool {
        self.validators.iter().all(|v| v.validate(value))
    }
}

/// Text length bounds, measured in characters of the value's text form.
/// NULL counts as empty.
#[derive(Debug, Clone, Copy)]
pub struct Length {
    min: usize,
    max: Option<usize>,
}

impl Length {
    pub fn new(min: usize, max: Option<usize>) -> Result<Self> {
        if let Some(max) = max {
            if max < min {
                return Err(OrmError::InvalidArgument(
                    "max_length must be greater than or equal to min_length".into(),
                ));
            }
        }
        Ok(Self { min, max })
    }

    pub fn min(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn max(max: usize) -> Self {
        Self {
            min: 1,
            max: Some(max),
        }
    }
}

impl Default for Length {
    /// Non-empty
    fn default() -> Self {
        Self { min: 1, max: None }
    }
}

impl Validator for Length {
    fn validate(&self, value: &Value) -> bool {
        let len = match value {
            Value::Null => 0,
            Value::Text(s) => s.chars().count(),
            other => other.to_string().chars().count(),
        };
        len >= self.min && self.max.is_none_or(|max| len <= max)
    }
}

/// Numeric range; rejects anything that is not an integer or float.
#[derive(Debug, Clone, Copy, Default)]
pub struct Number {
    minimum: Option<f64>,
    maximum: Option<f64>,
}

impl Number {
    pub fn new(minimum: Option<f64>, maximum: Option<f64>) -> Result<Self> {
        if let (Some(min), Some(max)) = (minimum, maximum) {
            if max < min {
                return Err(OrmError::InvalidArgument(
                    "maximum must be greater than or equal to minimum".into(),
                ));
            }
        }
        Ok(Self { minimum, maximum })
    }

    pub fn at_least(minimum: f64) -> Self {
        Self {
            minimum: Some(minimum),
            maximum: None,
        }
    }
}

impl Validator for Number {
    fn validate(&self, value: &Value) -> bool {
        let Some(n) = value.as_f64() else {
            return false;
        };
        self.minimum.is_none_or(|min| n >= min) && self.maximum.is_none_or(|max| n <= max)
    }
}

/// Text matching a pattern anchored at the start of the value
#[derive(Debug, Clone)]
pub struct Regex {
    regex: regex::Regex,
}

impl Regex {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = regex::Regex::new(pattern)
            .map_err(|e| OrmError::InvalidArgument(format!("Invalid pattern: {}", e)))?;
        Ok(Self { regex })
    }
}

impl Validator for Regex {
    fn validate(&self, value: &Value) -> bool {
        value
            .as_str()
            .and_then(|s| self.regex.find(s))
            .is_some_and(|m| m.start() == 0)
    }
}

lazy_static! {
    static ref EMAIL_REGEX: regex::Regex = regex::Regex::new(
        r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.(?:[A-Z]{2}|com|org|net|gov|mil|biz|info|mobi|name|aero|jobs|museum)$"
    )
    .unwrap();
}

/// Plausible e-mail address
#[derive(Debug, Clone, Copy, Default)]
pub struct Email;

impl Validator for Email {
    fn validate(&self, value: &Value) -> bool {
        value.as_str().is_some_and(|s| EMAIL_REGEX.is_match(s))
    }
}
