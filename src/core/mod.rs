pub mod error;
pub mod escape;
pub mod value;

pub use error::{OrmError, Result};
pub use escape::escape;
pub use value::Value;
