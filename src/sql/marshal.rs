//! HTTP input (query-string values or JSON tokens) reduced to typed parameter values.

use crate::config::QueryStringNullHandling;
use crate::pg_type::{DriverType, TypeDescriptor};
use crate::sql::params::{ArrayValue, ParamValue};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

static NUMERIC_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$|^(?i:nan|[+-]?infinity)$").expect("valid regex")
});

static MONEY_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\$?(\d{1,3}(,\d{3})+|\d+)(\.\d+)?$").expect("valid regex"));

#[derive(Error, Debug, PartialEq)]
pub enum MarshalError {
    #[error("{value:?} is not a valid {type_name}")]
    InvalidValue { type_name: String, value: String },
    #[error("array element {index}: {source}")]
    InvalidElement {
        index: usize,
        #[source]
        source: Box<MarshalError>,
    },
}

fn invalid(ty: &TypeDescriptor, value: &str) -> MarshalError {
    MarshalError::InvalidValue {
        type_name: ty.base.clone(),
        value: value.to_string(),
    }
}

/// Parse one textual value for a non-array descriptor.
/// Empty input is NULL for every category but text.
pub fn parse_text(raw: &str, ty: &TypeDescriptor) -> Result<ParamValue, MarshalError> {
    if raw.is_empty() && !ty.is_text() {
        return Ok(ParamValue::Null);
    }
    let bad = || invalid(ty, raw);
    Ok(match ty.driver {
        DriverType::Smallint => ParamValue::I16(raw.parse().map_err(|_| bad())?),
        DriverType::Integer => ParamValue::I32(raw.parse().map_err(|_| bad())?),
        DriverType::Bigint | DriverType::Oid => ParamValue::I64(raw.parse().map_err(|_| bad())?),
        DriverType::Real => ParamValue::F32(parse_float(raw).ok_or_else(bad)? as f32),
        DriverType::Double => ParamValue::F64(parse_float(raw).ok_or_else(bad)?),
        DriverType::Numeric if NUMERIC_LITERAL.is_match(raw) => ParamValue::Text(raw.to_string()),
        DriverType::Money if MONEY_LITERAL.is_match(raw) => ParamValue::Text(raw.to_string()),
        DriverType::Numeric | DriverType::Money => return Err(bad()),
        DriverType::Boolean => {
            if raw.eq_ignore_ascii_case("true") {
                ParamValue::Bool(true)
            } else if raw.eq_ignore_ascii_case("false") {
                ParamValue::Bool(false)
            } else {
                return Err(bad());
            }
        }
        DriverType::Date => ParamValue::Date(parse_date(raw).ok_or_else(bad)?),
        DriverType::Time => ParamValue::Time(parse_time(raw).ok_or_else(bad)?),
        DriverType::TimeTz => ParamValue::Text(parse_time_tz(raw).ok_or_else(bad)?),
        DriverType::Timestamp => ParamValue::Timestamp(parse_timestamp(raw).ok_or_else(bad)?),
        DriverType::TimestampTz => ParamValue::TimestampTz(parse_timestamp_tz(raw).ok_or_else(bad)?),
        DriverType::Uuid => ParamValue::Uuid(uuid::Uuid::parse_str(raw).map_err(|_| bad())?),
        _ => ParamValue::Text(raw.to_string()),
    })
}

/// All values supplied for one query-string key.
/// Scalars concatenate repeated values; arrays take one element per value.
pub fn from_query_values(
    values: &[String],
    ty: &TypeDescriptor,
    null_handling: QueryStringNullHandling,
) -> Result<ParamValue, MarshalError> {
    if ty.is_array {
        let element = ty.element();
        let mut items = Vec::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            if value.is_empty() || is_null(value, null_handling) {
                items.push(None);
                continue;
            }
            let parsed = parse_text(value, &element).map_err(|e| MarshalError::InvalidElement {
                index,
                source: Box::new(e),
            })?;
            items.push((!parsed.is_null()).then_some(parsed));
        }
        return Ok(ParamValue::Array(ArrayValue::from_elements(&element, items)));
    }
    let joined = values.concat();
    if is_null(&joined, null_handling) {
        return Ok(ParamValue::Null);
    }
    parse_text(&joined, ty)
}

fn is_null(value: &str, null_handling: QueryStringNullHandling) -> bool {
    match null_handling {
        QueryStringNullHandling::Ignore => false,
        QueryStringNullHandling::EmptyString => value.is_empty(),
        QueryStringNullHandling::NullLiteral => value.eq_ignore_ascii_case("null"),
    }
}

/// One JSON body value. Scalars never fail: a token that does not parse for the
/// declared type is passed through as text and left for the database to reject.
pub fn from_json(value: &Value, ty: &TypeDescriptor) -> Result<ParamValue, MarshalError> {
    if value.is_null() {
        return Ok(ParamValue::Null);
    }
    if ty.is_array {
        let Value::Array(elements) = value else {
            // an array literal such as "{1,2,3}"
            return Ok(ParamValue::Text(token_text(value)));
        };
        let element = ty.element();
        let mut items = Vec::with_capacity(elements.len());
        for (index, item) in elements.iter().enumerate() {
            if item.is_null() {
                items.push(None);
                continue;
            }
            let parsed = json_scalar(item, &element).map_err(|e| MarshalError::InvalidElement {
                index,
                source: Box::new(e),
            })?;
            items.push((!parsed.is_null()).then_some(parsed));
        }
        return Ok(ParamValue::Array(ArrayValue::from_elements(&element, items)));
    }
    Ok(json_scalar(value, ty).unwrap_or_else(|_| ParamValue::Text(token_text(value))))
}

fn json_scalar(value: &Value, ty: &TypeDescriptor) -> Result<ParamValue, MarshalError> {
    let native = match (value, ty.driver) {
        (Value::Number(n), DriverType::Smallint) => n.as_i64().and_then(|i| i16::try_from(i).ok()).map(ParamValue::I16),
        (Value::Number(n), DriverType::Integer) => n.as_i64().and_then(|i| i32::try_from(i).ok()).map(ParamValue::I32),
        (Value::Number(n), DriverType::Bigint | DriverType::Oid) => n.as_i64().map(ParamValue::I64),
        (Value::Number(n), DriverType::Real) => n.as_f64().map(|f| ParamValue::F32(f as f32)),
        (Value::Number(n), DriverType::Double) => n.as_f64().map(ParamValue::F64),
        (Value::Number(n), DriverType::Numeric | DriverType::Money) => Some(ParamValue::Text(n.to_string())),
        (Value::Bool(b), DriverType::Boolean) => Some(ParamValue::Bool(*b)),
        (Value::Array(_) | Value::Object(_), _) if ty.is_json() => Some(ParamValue::Text(value.to_string())),
        _ => None,
    };
    match native {
        Some(v) => Ok(v),
        None => parse_text(&token_text(value), ty),
    }
}

fn token_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_float(raw: &str) -> Option<f64> {
    match raw.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        "infinity" | "+infinity" => Some(f64::INFINITY),
        "-infinity" => Some(f64::NEG_INFINITY),
        _ if raw.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E')) => {
            raw.parse().ok()
        }
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw).map(|t| t.date()))
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

/// `HH:MM[:SS[.f]]` with an optional `Z` or `+HH[:MM]` offset, normalized to UTC.
fn parse_time_tz(raw: &str) -> Option<String> {
    let (time, offset) = if let Some(t) = raw.strip_suffix(['Z', 'z']) {
        (t, FixedOffset::east_opt(0)?)
    } else if let Some(at) = raw.rfind(['+', '-']) {
        (&raw[..at], parse_offset(&raw[at..])?)
    } else {
        (raw, FixedOffset::east_opt(0)?)
    };
    let local = parse_time(time.trim_end())?;
    let (utc, _) = local.overflowing_sub_signed(chrono::Duration::seconds(offset.local_minus_utc() as i64));
    Some(format!("{}+00", utc.format("%H:%M:%S%.f")))
}

fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let sign = if raw.starts_with('-') { -1 } else { 1 };
    let digits: String = raw[1..].chars().filter(|c| *c != ':').collect();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_with_offset(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%#z"))
        .ok()
}

/// Timestamp without time zone; an explicit offset is converted to UTC first.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    parse_naive(raw).or_else(|| parse_with_offset(raw).map(|t| t.naive_utc()))
}

/// Timestamp with time zone, normalized to UTC. Values without an offset are taken as UTC.
fn parse_timestamp_tz(raw: &str) -> Option<DateTime<Utc>> {
    parse_with_offset(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|| parse_naive(raw).map(|t| Utc.from_utc_datetime(&t)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ty(name: &str) -> TypeDescriptor {
        TypeDescriptor::parse(name)
    }

    fn qs(values: &[&str], name: &str) -> Result<ParamValue, MarshalError> {
        let values: Vec<String> = values.iter().map(|s| s.to_string()).collect();
        from_query_values(&values, &ty(name), QueryStringNullHandling::Ignore)
    }

    #[test]
    fn string_and_json_number_agree_for_integers() {
        assert_eq!(qs(&["123"], "integer"), Ok(ParamValue::I32(123)));
        assert_eq!(from_json(&json!(123), &ty("integer")), Ok(ParamValue::I32(123)));
        assert_eq!(from_json(&json!("123"), &ty("integer")), Ok(ParamValue::I32(123)));
        assert_eq!(from_json(&json!(7), &ty("int8")), Ok(ParamValue::I64(7)));
        assert_eq!(from_json(&json!(7), &ty("int2")), Ok(ParamValue::I16(7)));
    }

    #[test]
    fn repeated_query_values_build_arrays_with_null_slots() {
        assert_eq!(
            qs(&["1", "", "3"], "integer[]"),
            Ok(ParamValue::Array(ArrayValue::I32(vec![Some(1), None, Some(3)])))
        );
        assert_eq!(
            qs(&["a", "", "c"], "text[]"),
            Ok(ParamValue::Array(ArrayValue::Text(vec![Some("a".into()), None, Some("c".into())])))
        );
    }

    #[test]
    fn one_bad_element_fails_the_array() {
        let err = qs(&["1", "x", "3"], "integer[]").unwrap_err();
        assert!(matches!(err, MarshalError::InvalidElement { index: 1, .. }));
        assert!(from_json(&json!([1, "x"]), &ty("int4[]")).is_err());
    }

    #[test]
    fn json_arrays_bind_natively() {
        assert_eq!(
            from_json(&json!([true, null, false]), &ty("boolean[]")),
            Ok(ParamValue::Array(ArrayValue::Bool(vec![Some(true), None, Some(false)])))
        );
        assert_eq!(
            from_json(&json!("{1,2}"), &ty("integer[]")),
            Ok(ParamValue::Text("{1,2}".into()))
        );
    }

    #[test]
    fn empty_is_null_except_for_text() {
        assert_eq!(qs(&[""], "integer"), Ok(ParamValue::Null));
        assert_eq!(qs(&[""], "date"), Ok(ParamValue::Null));
        assert_eq!(qs(&[""], "text"), Ok(ParamValue::Text(String::new())));
        assert_eq!(from_json(&json!(""), &ty("uuid")), Ok(ParamValue::Null));
    }

    #[test]
    fn null_handling_options() {
        let t = ty("text");
        let values = vec![String::new()];
        assert_eq!(
            from_query_values(&values, &t, QueryStringNullHandling::EmptyString),
            Ok(ParamValue::Null)
        );
        let values = vec!["null".to_string()];
        assert_eq!(
            from_query_values(&values, &t, QueryStringNullHandling::NullLiteral),
            Ok(ParamValue::Null)
        );
        assert_eq!(
            from_query_values(&values, &t, QueryStringNullHandling::Ignore),
            Ok(ParamValue::Text("null".into()))
        );
    }

    #[test]
    fn repeated_scalar_values_concatenate() {
        assert_eq!(qs(&["12", "3"], "integer"), Ok(ParamValue::I32(123)));
        assert_eq!(qs(&["ab", "cd"], "text"), Ok(ParamValue::Text("abcd".into())));
    }

    #[test]
    fn strict_parsing() {
        assert!(qs(&[" 1"], "integer").is_err());
        assert!(qs(&["1,5"], "double precision").is_err());
        assert!(qs(&["70000"], "smallint").is_err());
        assert!(qs(&["yes"], "boolean").is_err());
        assert_eq!(qs(&["TRUE"], "boolean"), Ok(ParamValue::Bool(true)));
        assert_eq!(qs(&["1.5e3"], "numeric"), Ok(ParamValue::Text("1.5e3".into())));
        assert!(qs(&["1.5.3"], "numeric").is_err());
        assert_eq!(qs(&["$1,234.50"], "money"), Ok(ParamValue::Text("$1,234.50".into())));
        assert!(qs(&["not-a-uuid"], "uuid").is_err());
    }

    #[test]
    fn json_scalars_fall_back_to_raw_text() {
        assert_eq!(from_json(&json!("abc"), &ty("integer")), Ok(ParamValue::Text("abc".into())));
        assert_eq!(from_json(&json!(1.5), &ty("integer")), Ok(ParamValue::Text("1.5".into())));
        assert_eq!(from_json(&json!(5), &ty("text")), Ok(ParamValue::Text("5".into())));
        assert_eq!(
            from_json(&json!({"a": 1}), &ty("jsonb")),
            Ok(ParamValue::Text(r#"{"a":1}"#.into()))
        );
        assert_eq!(from_json(&json!(12.25), &ty("numeric")), Ok(ParamValue::Text("12.25".into())));
    }

    #[test]
    fn date_time_values() {
        assert_eq!(
            qs(&["2024-02-29"], "date"),
            Ok(ParamValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
        );
        assert!(qs(&["2023-02-29"], "date").is_err());
        assert_eq!(
            qs(&["13:45"], "time"),
            Ok(ParamValue::Time(NaiveTime::from_hms_opt(13, 45, 0).unwrap()))
        );
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap();
        assert_eq!(qs(&["2024-01-02T03:04:05"], "timestamp"), Ok(ParamValue::Timestamp(expected)));
        assert_eq!(qs(&["2024-01-02 03:04:05"], "timestamp"), Ok(ParamValue::Timestamp(expected)));
    }

    #[test]
    fn zoned_values_normalize_to_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 1, 4, 5).unwrap();
        assert_eq!(
            qs(&["2024-01-02T03:04:05+02:00"], "timestamptz"),
            Ok(ParamValue::TimestampTz(expected))
        );
        assert_eq!(
            qs(&["2024-01-02 01:04:05"], "timestamp with time zone"),
            Ok(ParamValue::TimestampTz(expected))
        );
        assert_eq!(qs(&["10:30:00+02"], "timetz"), Ok(ParamValue::Text("08:30:00+00".into())));
        assert_eq!(qs(&["01:00:00-05:30"], "timetz"), Ok(ParamValue::Text("06:30:00+00".into())));
        assert_eq!(qs(&["10:30:00Z"], "timetz"), Ok(ParamValue::Text("10:30:00+00".into())));
    }

    #[test]
    fn unknown_types_pass_raw_text() {
        assert_eq!(qs(&["happy"], "mood"), Ok(ParamValue::Text("happy".into())));
        assert_eq!(qs(&["192.168.0.1"], "inet"), Ok(ParamValue::Text("192.168.0.1".into())));
    }
}
