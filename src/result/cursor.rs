use crate::core::Value;
use std::collections::HashMap;

pub type Row = Vec<Value>;

/// Materialized outcome of one executed statement.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    /// Column names as reported by the driver, in select order
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Row id assigned by the most recent successful INSERT on the connection
    pub last_insert_id: Option<i64>,
    /// Rows changed by an INSERT/UPDATE/DELETE
    pub rows_affected: usize,
}

impl Cursor {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            last_insert_id: None,
            rows_affected: 0,
        }
    }

    pub fn with_last_insert_id(mut self, id: Option<i64>) -> Self {
        self.last_insert_id = id;
        self
    }

    pub fn with_rows_affected(mut self, count: usize) -> Self {
        self.rows_affected = count;
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn fetch_one(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// First column of the first row, if any.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Rows keyed by column name.
    pub fn into_maps(self) -> Vec<HashMap<String, Value>> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_and_maps() {
        let cursor = Cursor::new(
            vec!["id".into(), "name".into()],
            vec![vec![Value::Integer(1), Value::Text("Ann".into())]],
        );
        assert_eq!(cursor.scalar(), Some(&Value::Integer(1)));

        let maps = cursor.into_maps();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0]["name"], Value::Text("Ann".into()));
    }

    #[test]
    fn test_empty_cursor() {
        let cursor = Cursor::empty();
        assert!(cursor.is_empty());
        assert!(cursor.scalar().is_none());
        assert!(cursor.last_insert_id.is_none());
    }
}
