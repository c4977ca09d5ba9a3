//! Row cursors.
//!
//! Factories read rows through [`RowAccess`]; fetch iterators pull rows through
//! [`RowCursor`]. [`Rows`] is an in-memory cursor, the Postgres one lives in
//! [`crate::pg`].

use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use std::sync::Arc;

/// Ordered column names of one executed statement.
pub type RowShape = Arc<[String]>;

/// Build a [`RowShape`] from column names.
pub fn shape<I, S>(names: I) -> RowShape
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names
        .into_iter()
        .map(Into::into)
        .collect::<Vec<String>>()
        .into()
}

/// Positional access to the current row.
pub trait RowAccess {
    fn get_value(&self, index: usize) -> OrmResult<Value>;
}

/// A forward-only cursor over a result set.
pub trait RowCursor: RowAccess {
    fn column_names(&self) -> &RowShape;

    /// Move to the next row. Returns `false` once the rows are exhausted.
    fn advance(&mut self) -> OrmResult<bool>;
}

/// One in-memory row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    shape: RowShape,
    values: Vec<Value>,
}

impl Row {
    pub fn new(shape: RowShape, values: Vec<Value>) -> Self {
        Self { shape, values }
    }

    pub fn shape(&self) -> &RowShape {
        &self.shape
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Case-insensitive lookup by column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.shape
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|i| self.values.get(i))
    }
}

impl RowAccess for Row {
    fn get_value(&self, index: usize) -> OrmResult<Value> {
        value_at(&self.shape, &self.values, index)
    }
}

fn value_at(shape: &RowShape, values: &[Value], index: usize) -> OrmResult<Value> {
    values.get(index).cloned().ok_or_else(|| {
        OrmError::decode(
            shape.get(index).map(String::as_str).unwrap_or("?"),
            format!("column index {index} out of range ({} columns)", values.len()),
        )
    })
}

/// An in-memory cursor over rows sharing one shape.
#[derive(Debug, Clone)]
pub struct Rows {
    shape: RowShape,
    rows: std::vec::IntoIter<Vec<Value>>,
    current: Option<Vec<Value>>,
}

impl Rows {
    pub fn new(shape: RowShape, rows: Vec<Vec<Value>>) -> Self {
        Self {
            shape,
            rows: rows.into_iter(),
            current: None,
        }
    }
}

impl RowAccess for Rows {
    fn get_value(&self, index: usize) -> OrmResult<Value> {
        match &self.current {
            Some(values) => value_at(&self.shape, values, index),
            None => Err(OrmError::Other("cursor is not positioned on a row".into())),
        }
    }
}

impl RowCursor for Rows {
    fn column_names(&self) -> &RowShape {
        &self.shape
    }

    fn advance(&mut self) -> OrmResult<bool> {
        self.current = self.rows.next();
        Ok(self.current.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_walks_rows() {
        let mut rows = Rows::new(
            shape(["a", "b"]),
            vec![vec![Value::Int(1), Value::Null], vec![Value::Int(2), Value::Null]],
        );
        assert!(rows.get_value(0).is_err());
        assert!(rows.advance().unwrap());
        assert_eq!(rows.get_value(0).unwrap(), Value::Int(1));
        assert!(rows.advance().unwrap());
        assert_eq!(rows.get_value(0).unwrap(), Value::Int(2));
        assert!(!rows.advance().unwrap());
    }

    #[test]
    fn row_lookup_by_name() {
        let row = Row::new(shape(["Id", "Name"]), vec![Value::Int(1), Value::from("x")]);
        assert_eq!(row.get("name"), Some(&Value::from("x")));
        assert!(row.get_value(5).is_err());
    }
}
