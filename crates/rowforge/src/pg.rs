//! Postgres adapter: [`Value`] parameters and a [`RowCursor`] over
//! `tokio_postgres` rows.

use crate::error::{OrmError, OrmResult};
use crate::row::{RowAccess, RowCursor, RowShape, shape};
use crate::value::Value;
use bytes::BytesMut;
use std::error::Error;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};

type BoxError = Box<dyn Error + Sync + Send>;

fn is_textual(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    ) || matches!(ty.kind(), Kind::Enum(_))
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::INT8 => v.to_sql(ty, out),
                Type::OID => u32::try_from(*v)?.to_sql(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                _ if is_textual(ty) => v.to_string().as_str().to_sql(ty, out),
                _ => Err(format!("cannot encode an integer as {ty}").into()),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => v.to_sql(ty, out),
                _ => Err(format!("cannot encode a float as {ty}").into()),
            },
            Value::Text(v) => match *ty {
                Type::UUID => uuid::Uuid::parse_str(v)?.to_sql(ty, out),
                Type::JSON | Type::JSONB => {
                    serde_json::Value::String(v.clone()).to_sql(ty, out)
                }
                _ if is_textual(ty) => {
                    // Enum labels and text share the wire format.
                    out.extend_from_slice(v.as_bytes());
                    Ok(IsNull::No)
                }
                _ => Err(format!("cannot encode text as {ty}").into()),
            },
            Value::Bytes(v) => v.as_slice().to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::Date(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => match *ty {
                Type::TIMESTAMPTZ => v.and_utc().to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::TimestampTz(v) => match *ty {
                Type::TIMESTAMP => v.naive_utc().to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Json(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Borrow values as driver parameters.
pub(crate) fn params(values: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

/// Text of an enum or otherwise textual column, read without type checks.
struct RawText(String);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(Self(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(ty: &Type) -> bool {
        is_textual(ty)
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, index: usize, name: &str) -> OrmResult<Option<T>> {
    row.try_get::<_, Option<T>>(index)
        .map_err(|e| OrmError::decode(name, e.to_string()))
}

/// Decode column `index` of `row` into a [`Value`] based on its Postgres type.
pub fn decode_column(row: &Row, index: usize) -> OrmResult<Value> {
    let column = row
        .columns()
        .get(index)
        .ok_or_else(|| OrmError::decode("?", format!("column index {index} out of range")))?;
    let name = column.name();
    let ty = column.type_();

    let value = match *ty {
        Type::BOOL => get::<bool>(row, index, name)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, index, name)?.map(|v| Value::Int(v.into())),
        Type::INT4 => get::<i32>(row, index, name)?.map(|v| Value::Int(v.into())),
        Type::INT8 => get::<i64>(row, index, name)?.map(Value::Int),
        Type::OID => get::<u32>(row, index, name)?.map(|v| Value::Int(v.into())),
        Type::FLOAT4 => get::<f32>(row, index, name)?.map(|v| Value::Float(v.into())),
        Type::FLOAT8 => get::<f64>(row, index, name)?.map(Value::Float),
        Type::BYTEA => get::<Vec<u8>>(row, index, name)?.map(Value::Bytes),
        Type::UUID => get::<uuid::Uuid>(row, index, name)?.map(Value::Uuid),
        Type::DATE => get::<chrono::NaiveDate>(row, index, name)?.map(Value::Date),
        Type::TIMESTAMP => get::<chrono::NaiveDateTime>(row, index, name)?.map(Value::Timestamp),
        Type::TIMESTAMPTZ => get::<chrono::DateTime<chrono::Utc>>(row, index, name)?
            .map(Value::TimestampTz),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, index, name)?.map(Value::Json),
        _ if is_textual(ty) => get::<RawText>(row, index, name)?.map(|t| Value::Text(t.0)),
        _ => {
            return Err(OrmError::decode(
                name,
                format!("unsupported column type {ty}"),
            ));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

impl RowAccess for Row {
    fn get_value(&self, index: usize) -> OrmResult<Value> {
        decode_column(self, index)
    }
}

/// Cursor over rows fetched from Postgres.
pub struct PgRows {
    shape: RowShape,
    rows: std::vec::IntoIter<Row>,
    current: Option<Row>,
}

impl PgRows {
    /// `rows` all come from one statement; the shape is read from the first.
    pub fn new(rows: Vec<Row>) -> Self {
        let shape = row_shape(rows.first());
        Self {
            shape,
            rows: rows.into_iter(),
            current: None,
        }
    }
}

/// Column names of a Postgres row.
pub fn row_shape(row: Option<&Row>) -> RowShape {
    match row {
        Some(row) => shape(row.columns().iter().map(|c| c.name())),
        None => shape(Vec::<String>::new()),
    }
}

impl RowAccess for PgRows {
    fn get_value(&self, index: usize) -> OrmResult<Value> {
        match &self.current {
            Some(row) => decode_column(row, index),
            None => Err(OrmError::Other("cursor is not positioned on a row".into())),
        }
    }
}

impl RowCursor for PgRows {
    fn column_names(&self) -> &RowShape {
        &self.shape
    }

    fn advance(&mut self) -> OrmResult<bool> {
        self.current = self.rows.next();
        Ok(self.current.is_some())
    }
}
