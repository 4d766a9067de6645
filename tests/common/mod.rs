#![allow(dead_code)]

use autumn::validators::Length;
use autumn::{
    Database, DatabaseConfig, Model, ModelBuilder, ModelRegistry, RecordingExecutor,
    SqliteExecutor, Validator, Value,
};
use std::sync::Arc;

pub const SCHEMA: &str = "
    CREATE TABLE author (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name VARCHAR(40) NOT NULL,
        last_name VARCHAR(40) NOT NULL,
        bio TEXT
    );
    CREATE TABLE books (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title VARCHAR(255),
        author_id INT(11),
        FOREIGN KEY (author_id) REFERENCES author(id)
    );";

pub struct Fixture {
    pub db: Database,
    pub registry: Arc<ModelRegistry>,
    pub author: Arc<Model>,
    pub book: Arc<Model>,
    pub log: Arc<RecordingExecutor<SqliteExecutor>>,
}

impl Fixture {
    /// SQL of every statement since the fixture was built (or last cleared)
    pub fn sql_log(&self) -> Vec<String> {
        self.log.sql_log()
    }

    pub fn last_sql(&self) -> String {
        self.log.last().map(|s| s.sql).unwrap_or_default()
    }

    pub fn add_author(&self, first: &str, last: &str) -> autumn::Record {
        let mut record = self
            .author
            .build([("first_name", first), ("last_name", last)])
            .unwrap();
        record.save().unwrap();
        record
    }

    pub fn add_book(&self, title: &str, author: &autumn::Record) -> autumn::Record {
        let mut record = self
            .book
            .build([
                ("title", Value::from(title)),
                ("author_id", author.value("id").clone()),
            ])
            .unwrap();
        record.save().unwrap();
        record
    }
}

/// Author/Book models over a fresh in-memory database with an isolated
/// registry and a statement log
pub fn fixture() -> Fixture {
    let log = Arc::new(RecordingExecutor::new(SqliteExecutor::open_in_memory().unwrap()));
    let db = Database::new(Arc::clone(&log), DatabaseConfig::in_memory());
    db.raw_sql_script(SCHEMA).unwrap();

    let registry = Arc::new(ModelRegistry::new());

    let author = ModelBuilder::new("Author")
        .default_value("bio", "No bio available")
        .validate("first_name", Length::default())
        .validate_chain(
            "last_name",
            vec![
                Box::new(Length::default()) as Box<dyn Validator>,
                Box::new(|v: &Value| v.as_str() != Some("BadGuy!")) as Box<dyn Validator>,
            ],
        )
        .one_to_many("books", "Book")
        .register_in(&registry, &db)
        .unwrap();

    let book = ModelBuilder::new("Book")
        .table("books")
        .foreign_key("author", "Author")
        .register_in(&registry, &db)
        .unwrap();

    log.clear();

    Fixture {
        db,
        registry,
        author,
        book,
        log,
    }
}
