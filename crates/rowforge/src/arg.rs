//! Call-site arguments for SQL templates.

use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One raw argument passed alongside a SQL fragment.
///
/// Scalars fill positional slots, named bags expose their fields to `@name`
/// references, and sequences expand into one placeholder per element.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Scalar(Value),
    Named(NamedArgs),
    Sequence(Vec<Value>),
}

impl Arg {
    pub fn is_named(&self) -> bool {
        matches!(self, Arg::Named(_))
    }
}

/// An ordered bag of named arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedArgs {
    fields: Vec<(String, Arg)>,
}

impl NamedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing an existing field with the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Arg>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Look a field up by name. Exact matches win over case-insensitive ones.
    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| self.fields.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)))
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arg)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Build a bag from any value that serializes to a JSON object.
    ///
    /// JSON arrays become sequence arguments; nested objects are passed through as
    /// [`Value::Json`].
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> OrmResult<Self> {
        match serde_json::to_value(value)? {
            serde_json::Value::Object(map) => {
                let mut args = NamedArgs::new();
                for (name, field) in map {
                    let arg = match field {
                        serde_json::Value::Array(items) => {
                            Arg::Sequence(items.into_iter().map(Value::from_json).collect())
                        }
                        other => Arg::Scalar(Value::from_json(other)),
                    };
                    args.fields.push((name, arg));
                }
                Ok(args)
            }
            other => Err(OrmError::Serialization(format!(
                "named arguments must serialize to an object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Scalar(value)
    }
}

impl From<NamedArgs> for Arg {
    fn from(value: NamedArgs) -> Self {
        Arg::Named(value)
    }
}

impl From<Vec<Value>> for Arg {
    fn from(value: Vec<Value>) -> Self {
        Arg::Sequence(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Scalar(Value::from(value))
    }
}

impl From<Vec<&str>> for Arg {
    fn from(value: Vec<&str>) -> Self {
        Arg::Sequence(value.into_iter().map(Value::from).collect())
    }
}

impl From<&[&str]> for Arg {
    fn from(value: &[&str]) -> Self {
        Arg::Sequence(value.iter().copied().map(Value::from).collect())
    }
}

// `Vec<u8>` is a bytes scalar, so `u8` only gets the scalar impl.
impl From<u8> for Arg {
    fn from(value: u8) -> Self {
        Arg::Scalar(Value::from(value))
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Arg::Scalar(Value::Bytes(value))
    }
}

macro_rules! impl_arg_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Scalar(Value::from(value))
                }
            }

            impl From<Option<$ty>> for Arg {
                fn from(value: Option<$ty>) -> Self {
                    Arg::Scalar(Value::from(value))
                }
            }

            impl From<Vec<$ty>> for Arg {
                fn from(value: Vec<$ty>) -> Self {
                    Arg::Sequence(value.into_iter().map(Value::from).collect())
                }
            }

            impl From<&[$ty]> for Arg {
                fn from(value: &[$ty]) -> Self {
                    Arg::Sequence(value.iter().cloned().map(Value::from).collect())
                }
            }

            impl<const N: usize> From<[$ty; N]> for Arg {
                fn from(value: [$ty; N]) -> Self {
                    Arg::Sequence(value.into_iter().map(Value::from).collect())
                }
            }
        )*
    };
}

impl_arg_from!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u16,
    u32,
    f32,
    f64,
    String,
    Uuid,
    NaiveDate,
    NaiveDateTime,
    DateTime<Utc>,
    serde_json::Value,
);

/// Build a `Vec<Arg>` from heterogeneous values.
///
/// ```ignore
/// let args = rowforge::args![20, vec![1, 2, 3], "x"];
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Arg>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Arg::from($value)),+]
    };
}

/// Build a [`NamedArgs`] bag.
///
/// ```ignore
/// let bag = rowforge::named! { name: "n", ids: vec![1, 2] };
/// ```
#[macro_export]
macro_rules! named {
    ($($name:ident : $value:expr),* $(,)?) => {
        $crate::NamedArgs::new()$(.with(stringify!($name), $value))*
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_of_ints_is_sequence() {
        assert_eq!(
            Arg::from(vec![1, 2]),
            Arg::Sequence(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn vec_of_bytes_is_scalar() {
        assert_eq!(Arg::from(vec![1u8, 2]), Arg::Scalar(Value::Bytes(vec![1, 2])));
    }

    #[test]
    fn named_lookup_prefers_exact_case() {
        let bag = NamedArgs::new().with("Name", 1).with("name", 2);
        assert_eq!(bag.get("name"), Some(&Arg::Scalar(Value::Int(2))));
        assert_eq!(bag.get("NAME"), Some(&Arg::Scalar(Value::Int(1))));
        assert_eq!(bag.get("missing"), None);
    }

    #[test]
    fn from_serialize_maps_arrays_to_sequences() {
        #[derive(Serialize)]
        struct Filter {
            name: &'static str,
            ids: Vec<i32>,
        }

        let bag = NamedArgs::from_serialize(&Filter {
            name: "n",
            ids: vec![1, 2],
        })
        .unwrap();
        assert_eq!(bag.get("name"), Some(&Arg::Scalar(Value::Text("n".into()))));
        assert_eq!(
            bag.get("ids"),
            Some(&Arg::Sequence(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn from_serialize_rejects_non_objects() {
        assert!(NamedArgs::from_serialize(&5).is_err());
    }

    #[test]
    fn macros_build_args() {
        let args = crate::args![20, vec![1, 2, 3], "x"];
        assert_eq!(args.len(), 3);
        assert!(matches!(args[1], Arg::Sequence(ref v) if v.len() == 3));

        let bag = crate::named! { name: "n", password: "p" };
        assert_eq!(bag.len(), 2);
    }
}
