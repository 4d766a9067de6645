//! Statement text as produced for a driver with a non-default placeholder.

use autumn::{
    Cursor, Database, DatabaseConfig, Executor, ModelBuilder, ModelRegistry, OrmError,
    RecordingExecutor, Value,
};
use std::sync::Arc;

/// Driver stand-in: knows one table and answers writes with a fixed row id
struct FormatStyleDriver;

impl Executor for FormatStyleDriver {
    fn execute(&self, sql: &str, _values: &[Value]) -> autumn::Result<Cursor> {
        if sql.starts_with("SELECT * FROM `user` LIMIT 1") {
            let columns = ["id", "name", "age"].map(String::from).to_vec();
            return Ok(Cursor::new(columns, Vec::new()));
        }
        if sql.starts_with("SELECT") {
            return Ok(Cursor::empty());
        }
        Ok(Cursor::empty()
            .with_last_insert_id(Some(9))
            .with_rows_affected(1))
    }

    fn execute_script(&self, _sql: &str) -> autumn::Result<Cursor> {
        Ok(Cursor::empty())
    }

    fn placeholder(&self) -> &'static str {
        "%s"
    }

    fn begin(&self) -> autumn::Result<()> {
        Ok(())
    }

    fn commit(&self) -> autumn::Result<()> {
        Ok(())
    }

    fn rollback(&self) -> autumn::Result<()> {
        Ok(())
    }
}

fn setup() -> (
    Arc<RecordingExecutor<FormatStyleDriver>>,
    Arc<autumn::Model>,
) {
    let log = Arc::new(RecordingExecutor::new(FormatStyleDriver));
    let db = Database::new(Arc::clone(&log), DatabaseConfig::default());
    let registry = Arc::new(ModelRegistry::new());
    let user = ModelBuilder::new("User")
        .register_in(&registry, &db)
        .expect("probe answered by the stub");
    log.clear();
    (log, user)
}

#[test]
fn test_placeholder_comes_from_driver() -> anyhow::Result<()> {
    let (log, user) = setup();

    let (sql, values) = user.filter("age", 30).filter("name", "John").to_sql();
    assert_eq!(sql, "SELECT * FROM `user` WHERE `age`=%s AND `name`=%s");
    assert_eq!(values, vec![Value::Integer(30), Value::from("John")]);

    let (sql, _) = user.filter("age", 30).count_sql();
    assert_eq!(sql, "SELECT COUNT(*) FROM `user` WHERE `age`=%s");

    assert!(log.statements().is_empty(), "compiling issues nothing");
    Ok(())
}

#[test]
fn test_write_statements() -> anyhow::Result<()> {
    let (log, user) = setup();

    let mut record = user.build([("name", Value::from("John")), ("age", Value::Integer(30))])?;
    record.save()?;
    assert_eq!(
        log.last().map(|s| s.sql),
        Some("INSERT INTO `user` (`name`, `age`) VALUES (%s, %s)".to_string())
    );
    assert_eq!(record.pk(), Some(&Value::Integer(9)));

    record.set("age", 31)?;
    record.save()?;
    let update = log.last().expect("update recorded");
    assert_eq!(update.sql, "UPDATE `user` SET `age`=%s WHERE `id`=%s");
    assert_eq!(update.values, vec![Value::Integer(31), Value::Integer(9)]);

    record.delete()?;
    let delete = log.last().expect("delete recorded");
    assert_eq!(delete.sql, "DELETE FROM `user` WHERE `id`=%s");
    assert_eq!(delete.values, vec![Value::Integer(9)]);
    Ok(())
}

#[test]
fn test_count_needs_a_number() {
    let (_log, user) = setup();

    let err = user.all().count().unwrap_err();
    assert!(matches!(err, OrmError::Execution(_)));
}
