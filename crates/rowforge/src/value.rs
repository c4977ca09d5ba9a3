//! Dynamic column values.
//!
//! [`Value`] is what flows between the templating engine, the row cursor and the
//! row factories. Conversion in and out of Rust types goes through [`ToValue`],
//! [`FromValue`] and [`ColumnType`].

use crate::error::{OrmError, OrmResult};
use crate::schema::ValueKind;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// A single database value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Uuid(_) => "uuid",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Json(_) => "json",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to a JSON value.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(v) => serde_json::Value::Bool(v),
            Value::Int(v) => serde_json::Value::from(v),
            Value::Float(v) => serde_json::Value::from(v),
            Value::Text(v) => serde_json::Value::String(v),
            Value::Bytes(v) => serde_json::Value::from(v),
            Value::Uuid(v) => serde_json::Value::String(v.to_string()),
            Value::Date(v) => serde_json::Value::String(v.to_string()),
            Value::Timestamp(v) => serde_json::Value::String(v.to_string()),
            Value::TimestampTz(v) => serde_json::Value::String(v.to_rfc3339()),
            Value::Json(v) => v,
        }
    }

    /// Convert a JSON value into the closest scalar variant.
    ///
    /// Arrays and objects stay as [`Value::Json`].
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(v) => Value::Bool(v),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Json(n.into())),
            },
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{v}"),
            Value::TimestampTz(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Json(v) => write!(f, "{v}"),
        }
    }
}

/// Conversion of a Rust value into a [`Value`].
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Conversion of a [`Value`] back into a Rust value.
///
/// Values reaching `from_value` from a row factory have already been coerced to
/// the member's [`ValueKind`], so implementations only handle the canonical
/// representation plus `Null`.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> OrmResult<Self>;
}

/// Static description of how a Rust type is stored in a column.
pub trait ColumnType {
    fn kind() -> ValueKind;

    fn nullable() -> bool {
        false
    }
}

fn mismatch(value: &Value, target: &str) -> OrmError {
    OrmError::decode(
        "",
        format!("cannot convert {} value to {}", value.type_name(), target),
    )
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> OrmResult<Self> {
        Ok(value)
    }
}

impl ColumnType for Value {
    fn kind() -> ValueKind {
        ValueKind::Any
    }

    fn nullable() -> bool {
        true
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ColumnType> ColumnType for Option<T> {
    fn kind() -> ValueKind {
        T::kind()
    }

    fn nullable() -> bool {
        true
    }
}

impl<T: ToValue> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.to_value()
    }
}

macro_rules! impl_int_value {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> OrmResult<Self> {
                    match value {
                        Value::Int(v) => <$ty>::try_from(v).map_err(|_| {
                            OrmError::decode(
                                "",
                                format!("value {} out of range for {}", v, stringify!($ty)),
                            )
                        }),
                        other => Err(mismatch(&other, stringify!($ty))),
                    }
                }
            }

            impl ColumnType for $ty {
                fn kind() -> ValueKind {
                    ValueKind::$kind
                }
            }

            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    value.to_value()
                }
            }
        )*
    };
}

impl_int_value!(
    i8 => I16,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => I16,
    u16 => I32,
    u32 => I64,
);

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Float(v) => Ok(v as f32),
            other => Err(mismatch(&other, "f32")),
        }
    }
}

impl ColumnType for f32 {
    fn kind() -> ValueKind {
        ValueKind::F32
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Float(v) => Ok(v),
            other => Err(mismatch(&other, "f64")),
        }
    }
}

impl ColumnType for f64 {
    fn kind() -> ValueKind {
        ValueKind::F64
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl ToValue for [u8] {
    fn to_value(&self) -> Value {
        Value::Bytes(self.to_vec())
    }
}

macro_rules! impl_simple_value {
    ($($ty:ty => $variant:ident / $kind:ident),* $(,)?) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> OrmResult<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(mismatch(&other, stringify!($ty))),
                    }
                }
            }

            impl ColumnType for $ty {
                fn kind() -> ValueKind {
                    ValueKind::$kind
                }
            }

            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_simple_value!(
    bool => Bool / Bool,
    String => Text / Text,
    Vec<u8> => Bytes / Bytes,
    Uuid => Uuid / Uuid,
    NaiveDate => Date / Date,
    NaiveDateTime => Timestamp / Timestamp,
    DateTime<Utc> => TimestampTz / TimestampTz,
    serde_json::Value => Json / Json,
);

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        value.to_value()
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}
