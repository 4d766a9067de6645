mod common;

use autumn::{Direction, OrmError, Query, Value};
use common::{Fixture, fixture};

fn seeded() -> Fixture {
    let fx = fixture();
    fx.add_author("James", "Joyce");
    fx.add_author("Kurt", "Vonnegut");
    fx.add_author("Tom", "Robbins");
    fx.log.clear();
    fx
}

fn first_names(records: &[autumn::Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.value("first_name").to_string())
        .collect()
}

#[test]
fn test_query_is_lazy() -> anyhow::Result<()> {
    let fx = seeded();

    let mut query = fx
        .author
        .filter("last_name", "Robbins")
        .order_by("id", Direction::Desc);
    assert!(!query.is_materialized());
    assert!(fx.sql_log().is_empty(), "building a query issues nothing");

    assert_eq!(query.len()?, 1);
    assert!(query.is_materialized());
    assert_eq!(
        fx.sql_log(),
        ["SELECT * FROM `author` WHERE `last_name`=? ORDER BY `id` DESC"]
    );
    Ok(())
}

#[test]
fn test_filter_merge_keeps_first_position() -> anyhow::Result<()> {
    let fx = seeded();

    let query = fx
        .author
        .filter("first_name", "A")
        .filter("last_name", "B")
        .filter("first_name", "C");

    let (sql, values) = query.to_sql();
    assert_eq!(
        sql,
        "SELECT * FROM `author` WHERE `first_name`=? AND `last_name`=?"
    );
    assert_eq!(values, vec![Value::from("C"), Value::from("B")]);

    let found = fx
        .author
        .find([("first_name", "Kurt"), ("last_name", "Vonnegut")])
        .into_records()?;
    assert_eq!(first_names(&found), ["Kurt"]);
    Ok(())
}

#[test]
fn test_slice_limits() -> anyhow::Result<()> {
    let fx = seeded();

    let records = fx.author.all().slice(1..3)?;
    assert_eq!(first_names(&records), ["Kurt", "Tom"]);
    assert_eq!(fx.last_sql(), "SELECT * FROM `author` LIMIT 1, 2");

    let records = fx.author.all().slice(..2)?;
    assert_eq!(first_names(&records), ["James", "Kurt"]);
    assert_eq!(fx.last_sql(), "SELECT * FROM `author` LIMIT 0, 2");

    assert_eq!(fx.author.all().slice(..)?.len(), 3);
    assert_eq!(fx.last_sql(), "SELECT * FROM `author`");

    // Empty ranges are legal
    assert!(fx.author.all().slice(2..2)?.is_empty());
    assert_eq!(fx.last_sql(), "SELECT * FROM `author` LIMIT 2, 0");
    Ok(())
}

#[test]
fn test_slice_rejects_bad_ranges() -> anyhow::Result<()> {
    let fx = seeded();

    let err = fx.author.all().slice(1..).unwrap_err();
    assert!(matches!(err, OrmError::InvalidArgument(_)));

    let (start, stop) = (3, 1);
    let err = fx.author.all().slice(start..stop).unwrap_err();
    assert!(matches!(err, OrmError::InvalidArgument(_)));

    assert!(fx.sql_log().is_empty());
    Ok(())
}

#[test]
fn test_slice_bounds_at_usize_max() -> anyhow::Result<()> {
    let fx = seeded();

    let err = fx.author.all().slice(..=usize::MAX).unwrap_err();
    assert!(matches!(err, OrmError::InvalidArgument(_)));

    let mut cached = fx.author.all();
    cached.fetch()?;
    let err = cached
        .slice((std::ops::Bound::Excluded(usize::MAX), std::ops::Bound::Unbounded))
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidArgument(_)));

    // Largest inclusive bound that still fits
    assert_eq!(cached.slice(..=usize::MAX - 1)?.len(), 3);
    Ok(())
}

#[test]
fn test_index_access() -> anyhow::Result<()> {
    let fx = seeded();

    let tom = fx.author.all().get(2)?.expect("third author");
    assert_eq!(tom.value("first_name"), &Value::from("Tom"));
    assert_eq!(fx.last_sql(), "SELECT * FROM `author` LIMIT 2, 1");

    assert!(fx.author.all().get(10)?.is_none());
    assert!(fx.author.filter("first_name", "Nobody").first()?.is_none());
    Ok(())
}

#[test]
fn test_materialization_is_idempotent() -> anyhow::Result<()> {
    let fx = seeded();

    let mut query = fx.author.all();
    assert_eq!(query.len()?, 3);
    assert_eq!(fx.sql_log().len(), 1);

    // Changes to the table after the first read are not seen
    fx.add_author("Ursula", "Le Guin");
    let statements = fx.sql_log().len();

    assert_eq!(query.len()?, 3);
    assert_eq!(query.count()?, 3);
    assert_eq!(query.iter()?.count(), 3);
    assert_eq!(first_names(&query.slice(1..)?), ["Kurt", "Tom"]);
    assert_eq!(
        query.get(0)?.map(|r| r.value("first_name").clone()),
        Some(Value::from("James"))
    );
    assert!(query.get(7)?.is_none());
    assert_eq!(fx.sql_log().len(), statements, "served from the cache");

    // A fresh query sees the new row
    assert_eq!(fx.author.all().count()?, 4);
    Ok(())
}

#[test]
fn test_cached_slice_clamps() -> anyhow::Result<()> {
    let fx = seeded();

    let mut query = fx.author.all();
    query.fetch()?;

    assert_eq!(query.slice(2..10)?.len(), 1);
    assert!(query.slice(5..)?.is_empty());
    assert_eq!(query.slice(..)?.len(), 3);
    Ok(())
}

#[test]
fn test_count_without_materializing() -> anyhow::Result<()> {
    let fx = seeded();

    let mut query = fx.author.filter("last_name", "Robbins");
    assert_eq!(query.count()?, 1);
    assert!(!query.is_materialized());
    assert_eq!(
        fx.last_sql(),
        "SELECT COUNT(*) FROM `author` WHERE `last_name`=?"
    );

    // Ordering has no effect on a count
    let mut ordered = fx.author.all().order_by("first_name", Direction::Asc);
    assert_eq!(ordered.count()?, 3);
    assert_eq!(fx.last_sql(), "SELECT COUNT(*) FROM `author`");
    Ok(())
}

#[test]
fn test_order_by() -> anyhow::Result<()> {
    let fx = seeded();

    let desc: Direction = "desc".parse()?;
    let records = fx
        .author
        .all()
        .order_by("first_name", desc)
        .into_records()?;
    assert_eq!(first_names(&records), ["Tom", "Kurt", "James"]);

    // A later order_by replaces the earlier one
    let records = fx
        .author
        .all()
        .order_by("id", Direction::Desc)
        .order_by("last_name", Direction::Asc)
        .into_records()?;
    assert_eq!(first_names(&records), ["James", "Tom", "Kurt"]);
    assert_eq!(
        fx.last_sql(),
        "SELECT * FROM `author` ORDER BY `last_name` ASC"
    );
    Ok(())
}

#[test]
fn test_direction_parsing() {
    assert_eq!("ASC".parse::<Direction>().unwrap(), Direction::Asc);
    assert_eq!(" Desc ".parse::<Direction>().unwrap(), Direction::Desc);
    assert!(matches!(
        "DESC; DROP TABLE author".parse::<Direction>(),
        Err(OrmError::InvalidArgument(_))
    ));
    assert_eq!(Direction::Desc.to_string(), "DESC");
}

#[test]
fn test_filter_after_read_drops_cache() -> anyhow::Result<()> {
    let fx = seeded();

    let mut query = fx.author.all();
    assert_eq!(query.len()?, 3);

    let mut narrowed = query.filter("first_name", "Tom");
    assert!(!narrowed.is_materialized());
    assert_eq!(narrowed.len()?, 1);

    let mut reordered = narrowed.order_by("id", Direction::Asc);
    assert!(!reordered.is_materialized());
    assert_eq!(reordered.len()?, 1);
    Ok(())
}

#[test]
fn test_query_for_registered_name() -> anyhow::Result<()> {
    let fx = seeded();

    let mut query = Query::for_model_in(&fx.registry, "Author")?;
    assert_eq!(query.count()?, 3);

    let err = Query::for_model_in(&fx.registry, "Publisher").unwrap_err();
    assert!(matches!(err, OrmError::Configuration(_)));
    Ok(())
}

#[test]
fn test_identifiers_are_escaped() -> anyhow::Result<()> {
    let fx = seeded();

    let query = fx.author.filter("odd`name", 1);
    assert_eq!(
        query.to_sql().0,
        "SELECT * FROM `author` WHERE `odd``name`=?"
    );
    Ok(())
}

#[test]
fn test_failed_query_propagates_driver_error() -> anyhow::Result<()> {
    let fx = seeded();

    let err = fx.author.filter("no_such_column", 1).len().unwrap_err();
    assert!(matches!(err, OrmError::Driver(_)));
    Ok(())
}
