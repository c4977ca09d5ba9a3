//! Coercion of raw column values to a member's declared kind.

use crate::error::{OrmError, OrmResult};
use crate::schema::{EnumInfo, ValueKind};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Coerce `value` to `kind`.
///
/// `NULL` becomes `Value::Null` for nullable members and the kind's default
/// otherwise. Enums are resolved by case-insensitive variant name or by ordinal
/// and come out as `Value::Int(ordinal)`.
pub fn coerce(value: Value, kind: &ValueKind, nullable: bool) -> OrmResult<Value> {
    if value.is_null() {
        return Ok(if nullable {
            Value::Null
        } else {
            kind.default_value()
        });
    }

    match kind {
        ValueKind::Any => Ok(value),
        ValueKind::Bool => to_bool(value),
        ValueKind::I16 => to_int(value, i16::MIN.into(), i16::MAX.into(), kind),
        ValueKind::I32 => to_int(value, i32::MIN.into(), i32::MAX.into(), kind),
        ValueKind::I64 => to_int(value, i64::MIN, i64::MAX, kind),
        ValueKind::F32 | ValueKind::F64 => to_float(value, kind),
        ValueKind::Text => Ok(match value {
            Value::Text(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }),
        ValueKind::Bytes => match value {
            Value::Bytes(b) => Ok(Value::Bytes(b)),
            Value::Text(s) => Ok(Value::Bytes(s.into_bytes())),
            other => Err(unsupported(&other, kind)),
        },
        ValueKind::Uuid => match value {
            Value::Uuid(u) => Ok(Value::Uuid(u)),
            Value::Text(s) => uuid::Uuid::parse_str(s.trim())
                .map(Value::Uuid)
                .map_err(|e| parse_error(&s, kind, e)),
            Value::Bytes(b) => uuid::Uuid::from_slice(&b)
                .map(Value::Uuid)
                .map_err(|e| OrmError::decode("", format!("invalid uuid bytes: {e}"))),
            other => Err(unsupported(&other, kind)),
        },
        ValueKind::Date => match value {
            Value::Date(d) => Ok(Value::Date(d)),
            Value::Timestamp(ts) => Ok(Value::Date(ts.date())),
            Value::TimestampTz(ts) => Ok(Value::Date(ts.date_naive())),
            Value::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| parse_error(&s, kind, e)),
            other => Err(unsupported(&other, kind)),
        },
        ValueKind::Timestamp => match value {
            Value::Timestamp(ts) => Ok(Value::Timestamp(ts)),
            Value::TimestampTz(ts) => Ok(Value::Timestamp(ts.naive_utc())),
            Value::Date(d) => Ok(Value::Timestamp(d.and_time(NaiveTime::MIN))),
            Value::Text(s) => parse_naive_timestamp(&s)
                .map(Value::Timestamp)
                .ok_or_else(|| parse_error(&s, kind, "unrecognized format")),
            other => Err(unsupported(&other, kind)),
        },
        ValueKind::TimestampTz => match value {
            Value::TimestampTz(ts) => Ok(Value::TimestampTz(ts)),
            Value::Timestamp(ts) => Ok(Value::TimestampTz(ts.and_utc())),
            Value::Date(d) => Ok(Value::TimestampTz(d.and_time(NaiveTime::MIN).and_utc())),
            Value::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .map(|ts| Value::TimestampTz(ts.with_timezone(&Utc)))
                .or_else(|_| {
                    parse_naive_timestamp(&s)
                        .map(|ts| Value::TimestampTz(ts.and_utc()))
                        .ok_or_else(|| parse_error(&s, kind, "unrecognized format"))
                }),
            other => Err(unsupported(&other, kind)),
        },
        ValueKind::Json => match value {
            Value::Json(j) => Ok(Value::Json(j)),
            Value::Text(s) => serde_json::from_str(&s)
                .map(Value::Json)
                .map_err(|e| parse_error(&s, kind, e)),
            other => Ok(Value::Json(other.into_json())),
        },
        ValueKind::Enum(info) => to_enum(value, info),
    }
}

fn to_bool(value: Value) -> OrmResult<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(b)),
        Value::Int(i) => Ok(Value::Bool(i != 0)),
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" | "y" => Ok(Value::Bool(true)),
            "false" | "f" | "0" | "no" | "n" => Ok(Value::Bool(false)),
            _ => Err(parse_error(&s, &ValueKind::Bool, "not a boolean")),
        },
        other => Err(unsupported(&other, &ValueKind::Bool)),
    }
}

fn to_int(value: Value, min: i64, max: i64, kind: &ValueKind) -> OrmResult<Value> {
    let n = match value {
        Value::Int(i) => i,
        Value::Bool(b) => i64::from(b),
        Value::Float(f) => {
            // `max as f64` rounds up for i64, so compare against the next power of two.
            if f.fract() != 0.0 || !f.is_finite() || f < min as f64 || f >= max as f64 + 1.0 {
                return Err(OrmError::decode(
                    "",
                    format!("value {f} cannot be represented as {kind}"),
                ));
            }
            f as i64
        }
        Value::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| parse_error(&s, kind, e))?,
        other => return Err(unsupported(&other, kind)),
    };

    if n < min || n > max {
        return Err(OrmError::decode(
            "",
            format!("value {n} out of range for {kind}"),
        ));
    }
    Ok(Value::Int(n))
}

fn to_float(value: Value, kind: &ValueKind) -> OrmResult<Value> {
    match value {
        Value::Float(f) => Ok(Value::Float(f)),
        Value::Int(i) => Ok(Value::Float(i as f64)),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| parse_error(&s, kind, e)),
        other => Err(unsupported(&other, kind)),
    }
}

fn to_enum(value: Value, info: &EnumInfo) -> OrmResult<Value> {
    let found = match &value {
        Value::Text(s) => info
            .variants
            .iter()
            .position(|v| v.eq_ignore_ascii_case(s.trim())),
        Value::Int(i) => usize::try_from(*i).ok().filter(|i| *i < info.variants.len()),
        _ => None,
    };

    match found {
        Some(ordinal) => Ok(Value::Int(ordinal as i64)),
        None => Err(OrmError::enum_value_not_found(value.to_string(), info.name)),
    }
}

fn parse_naive_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn unsupported(value: &Value, kind: &ValueKind) -> OrmError {
    OrmError::decode(
        "",
        format!("cannot convert {} value to {}", value.type_name(), kind),
    )
}

fn parse_error(input: &str, kind: &ValueKind, err: impl std::fmt::Display) -> OrmError {
    OrmError::decode("", format!("cannot parse '{input}' as {kind}: {err}"))
}
