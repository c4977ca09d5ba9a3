//! Argument resolution for scanned placeholders.

use super::scanner::{Reference, Token};
use crate::arg::{Arg, NamedArgs};
use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use std::ops::Range;

/// Final arguments for one fragment plus the slots each token was given.
#[derive(Debug, Default, PartialEq)]
pub struct Resolved {
    pub args: Vec<Value>,
    /// One range per token, indexing into `args`.
    pub slots: Vec<Range<usize>>,
}

/// Resolve every token against `raw`, in token order.
///
/// Each reference takes fresh slots, so a repeated reference binds the value
/// twice. Sequences expand to one slot per element; an empty sequence binds a
/// single `NULL`. Raw arguments that no token references are dropped.
pub fn resolve(tokens: &[Token], raw: &[Arg]) -> OrmResult<Resolved> {
    let mut resolved = Resolved {
        args: Vec::with_capacity(tokens.len()),
        slots: Vec::with_capacity(tokens.len()),
    };

    for token in tokens {
        let arg = lookup(&token.reference, raw)?;
        let start = resolved.args.len();
        match arg {
            Arg::Scalar(value) => resolved.args.push(value.clone()),
            Arg::Sequence(values) if values.is_empty() => resolved.args.push(Value::Null),
            Arg::Sequence(values) => resolved.args.extend(values.iter().cloned()),
            Arg::Named(_) => {
                return Err(OrmError::validation(format!(
                    "placeholder {} refers to a named argument bag, not a value",
                    describe(&token.reference)
                )));
            }
        }
        resolved.slots.push(start..resolved.args.len());
    }

    Ok(resolved)
}

fn lookup<'a>(reference: &Reference, raw: &'a [Arg]) -> OrmResult<&'a Arg> {
    match reference {
        Reference::Index(index) => raw.get(*index).ok_or(OrmError::PlaceholderIndexOutOfRange {
            index: *index,
            count: raw.len(),
        }),
        Reference::Name(name) => raw
            .iter()
            .filter_map(|arg| match arg {
                Arg::Named(bag) => Some(bag),
                _ => None,
            })
            .find_map(|bag: &NamedArgs| bag.get(name))
            .ok_or_else(|| OrmError::UnknownArgumentName { name: name.clone() }),
    }
}

fn describe(reference: &Reference) -> String {
    match reference {
        Reference::Index(i) => format!("@{i}"),
        Reference::Name(n) => format!("@{n}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::scanner::scan;

    #[test]
    fn sequence_expands_in_usage_order() {
        let raw = crate::args![vec![1, 2], "x", vec![7]];
        let r = resolve(&scan("@2 @1 @0"), &raw).unwrap();
        assert_eq!(
            r.args,
            vec![
                Value::Int(7),
                Value::Text("x".into()),
                Value::Int(1),
                Value::Int(2)
            ]
        );
        assert_eq!(r.slots, vec![0..1, 1..2, 2..4]);
    }

    #[test]
    fn empty_sequence_binds_null() {
        let raw = vec![Arg::Sequence(Vec::new())];
        let r = resolve(&scan("IN (@0)"), &raw).unwrap();
        assert_eq!(r.args, vec![Value::Null]);
        assert_eq!(r.slots, vec![0..1]);
    }

    #[test]
    fn named_falls_through_bags_in_order() {
        let raw = vec![
            Arg::from(crate::named! { a: 1 }),
            Arg::from(crate::named! { a: 2, b: 3 }),
        ];
        let r = resolve(&scan("@b @a"), &raw).unwrap();
        assert_eq!(r.args, vec![Value::Int(3), Value::Int(1)]);
    }

    #[test]
    fn out_of_range_index() {
        let err = resolve(&scan("@3"), &crate::args![1]).unwrap_err();
        assert!(matches!(
            err,
            OrmError::PlaceholderIndexOutOfRange { index: 3, count: 1 }
        ));
    }

    #[test]
    fn unknown_name() {
        let raw = vec![Arg::from(crate::named! { a: 1 })];
        let err = resolve(&scan("@nope"), &raw).unwrap_err();
        assert!(matches!(err, OrmError::UnknownArgumentName { ref name } if name == "nope"));
    }

    #[test]
    fn positional_reference_to_bag_is_rejected() {
        let raw = vec![Arg::from(crate::named! { a: 1 })];
        assert!(matches!(
            resolve(&scan("@0"), &raw),
            Err(OrmError::Validation(_))
        ));
    }
}
