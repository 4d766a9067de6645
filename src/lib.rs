// ============================================================================
// Autumn: minimal object-relational mapper
// ============================================================================

//! Maps table rows to records, builds parameterized SQL from equality
//! filters, and tracks field changes so updates only touch what changed.
//!
//! ```
//! use autumn::{Database, ModelBuilder, validators::Length};
//!
//! # fn main() -> autumn::Result<()> {
//! let db = Database::open_in_memory()?;
//! db.raw_sql_script(
//!     "CREATE TABLE author (id INTEGER PRIMARY KEY AUTOINCREMENT,
//!                           first_name TEXT NOT NULL, last_name TEXT NOT NULL, bio TEXT);
//!      CREATE TABLE books (id INTEGER PRIMARY KEY AUTOINCREMENT,
//!                          title TEXT, author_id INTEGER);",
//! )?;
//!
//! let author = ModelBuilder::new("Author")
//!     .default_value("bio", "No bio available")
//!     .validate("first_name", Length::default())
//!     .one_to_many("books", "Book")
//!     .register(&db)?;
//! let book = ModelBuilder::new("Book")
//!     .table("books")
//!     .foreign_key("author", "Author")
//!     .register(&db)?;
//!
//! let mut tom = author.build([("first_name", "Tom"), ("last_name", "Robbins")])?;
//! tom.save()?;
//!
//! let mut novel = book.build([("title", "Jitterbug Perfume")])?;
//! novel.set("author_id", tom.pk().cloned())?;
//! novel.save()?;
//!
//! assert_eq!(novel.parent("author")?.as_ref(), Some(&tom));
//! assert_eq!(tom.children("books")?.len()?, 1);
//! assert_eq!(author.all().count()?, 1);
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod core;
pub mod model;
pub mod query;
pub mod result;
pub mod validators;

// Re-export main types for convenience
pub use crate::core::{OrmError, Result, Value, escape};
pub use crate::result::{Cursor, Row};

pub use crate::connection::{
    Database, Executor, Session,
    config::DatabaseConfig,
    per_thread::PerThreadExecutor,
    recording::{RecordingExecutor, Statement},
    sqlite::SqliteExecutor,
    transaction::Transaction,
};

pub use crate::model::{
    DefaultValue, Model, ModelBuilder,
    record::{Record, RecordState},
    registry::ModelRegistry,
    relations::{Related, Relation, RelationKind},
};

pub use crate::query::{Direction, Query};
pub use crate::validators::{Validator, ValidatorChain};
