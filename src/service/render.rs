//! Result rows rendered by return shape.
//!
//! Function results arrive as PostgreSQL text and are written into the body as JSON
//! tokens, so numeric values keep every digit. Procedure OUT columns keep their declared
//! types; they are decoded to the same text form first, and a type with no decoder is an
//! error rather than a silent `null`.

use crate::catalog::ReturnShape;
use crate::config::TextResponseNullHandling;
use crate::error::AppError;
use crate::pg_type::{DriverType, TypeCategory, TypeDescriptor};
use crate::routing::Endpoint;
use crate::sql::array::{parse_array_literal, ArrayNode};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::types::{PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgRow, PgTypeKind, PgValueRef};
use sqlx::{Row, TypeInfo, ValueRef};
use std::net::IpAddr;
use std::sync::LazyLock;

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";

static JSON_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?(0|[1-9]\d*)(\.\d+)?([eE][+-]?\d+)?$").expect("valid regex"));

#[derive(Clone, Debug, PartialEq)]
pub enum RenderedBody {
    NoContent,
    Content { content_type: String, body: String },
}

/// Render fetched rows. Record shapes become JSON objects keyed by converted column
/// names in declaration order; bare scalars are returned as text.
pub fn render(
    endpoint: &Endpoint,
    rows: &[PgRow],
    null_handling: TextResponseNullHandling,
) -> Result<RenderedBody, AppError> {
    let routine = &endpoint.routine;
    let descriptor = &endpoint.descriptor;
    let content_type = |default: &str| descriptor.content_type.clone().unwrap_or_else(|| default.to_string());
    let body = match routine.shape {
        ReturnShape::Void => RenderedBody::NoContent,
        ReturnShape::Scalar => {
            let ty = &routine.return_descriptor;
            let cell = match rows.first() {
                Some(row) => read_cell(row, 0, &routine.name)?,
                None => Cell::Null,
            };
            match cell {
                Cell::Null => match null_handling {
                    TextResponseNullHandling::EmptyString => RenderedBody::Content {
                        content_type: content_type(TEXT_PLAIN),
                        body: String::new(),
                    },
                    TextResponseNullHandling::NullLiteral => RenderedBody::Content {
                        content_type: content_type(TEXT_PLAIN),
                        body: "null".into(),
                    },
                    TextResponseNullHandling::NoContent => RenderedBody::NoContent,
                },
                Cell::Text(text) if !ty.is_array && !ty.is_json() => RenderedBody::Content {
                    content_type: content_type(TEXT_PLAIN),
                    body: text,
                },
                Cell::Text(text) if !ty.is_array => RenderedBody::Content {
                    content_type: content_type(APPLICATION_JSON),
                    body: text,
                },
                cell => RenderedBody::Content {
                    content_type: content_type(APPLICATION_JSON),
                    body: cell_json(&cell, ty),
                },
            }
        }
        ReturnShape::SetOfScalar => {
            let ty = &routine.return_descriptor;
            let items = rows
                .iter()
                .map(|row| read_cell(row, 0, &routine.name).map(|cell| cell_json(&cell, ty)))
                .collect::<Result<Vec<_>, _>>()?;
            RenderedBody::Content {
                content_type: content_type(APPLICATION_JSON),
                body: format!("[{}]", items.join(",")),
            }
        }
        ReturnShape::Record => match rows.first() {
            Some(row) => RenderedBody::Content {
                content_type: content_type(APPLICATION_JSON),
                body: record_json(endpoint, row)?,
            },
            None => RenderedBody::NoContent,
        },
        ReturnShape::SetOfRecord => {
            let items = rows
                .iter()
                .map(|row| record_json(endpoint, row))
                .collect::<Result<Vec<_>, _>>()?;
            RenderedBody::Content {
                content_type: content_type(APPLICATION_JSON),
                body: format!("[{}]", items.join(",")),
            }
        }
    };
    Ok(body)
}

fn record_json(endpoint: &Endpoint, row: &PgRow) -> Result<String, AppError> {
    let mut fields = Vec::with_capacity(endpoint.routine.columns.len());
    for (i, (name, column)) in endpoint
        .descriptor
        .column_names
        .iter()
        .zip(&endpoint.routine.columns)
        .enumerate()
    {
        let cell = read_cell(row, i, &column.name)?;
        fields.push(format!("{}:{}", quoted(name), cell_json(&cell, &column.descriptor)));
    }
    Ok(format!("{{{}}}", fields.join(",")))
}

/// One result cell in PostgreSQL text form.
#[derive(Debug, PartialEq)]
enum Cell {
    Null,
    Text(String),
    /// One-dimensional array decoded element by element.
    Elements(Vec<Option<String>>),
}

fn read_cell(row: &PgRow, idx: usize, column: &str) -> Result<Cell, AppError> {
    match row.try_get::<Option<String>, _>(idx) {
        Ok(Some(s)) => Ok(Cell::Text(s)),
        Ok(None) => Ok(Cell::Null),
        Err(_) => typed_cell(row, idx, column),
    }
}

fn unsupported(column: &str, type_name: &str) -> AppError {
    tracing::error!(column, type_name, "result column has no decoder");
    AppError::Render {
        column: column.to_string(),
        type_name: type_name.to_string(),
    }
}

fn scalar<T>(value: Result<T, sqlx::Error>, f: impl Fn(T) -> String) -> Option<Cell> {
    value.ok().map(|v| Cell::Text(f(v)))
}

fn elements<T>(value: Result<Vec<Option<T>>, sqlx::Error>, f: impl Fn(T) -> String) -> Option<Cell> {
    value
        .ok()
        .map(|items| Cell::Elements(items.into_iter().map(|v| v.map(&f)).collect()))
}

/// Columns that were not cast to text (procedure OUT arguments), decoded by their
/// reported type into the text PostgreSQL would have printed.
fn typed_cell(row: &PgRow, idx: usize, column: &str) -> Result<Cell, AppError> {
    let raw = row.try_get_raw(idx).map_err(|e| unsupported(column, &e.to_string()))?;
    if raw.is_null() {
        return Ok(Cell::Null);
    }
    let type_info = raw.type_info().into_owned();
    let name = type_info.name().to_string();
    if let PgTypeKind::Enum(_) = type_info.kind() {
        return raw
            .as_str()
            .map(|s| Cell::Text(s.to_string()))
            .map_err(|_| unsupported(column, &name));
    }
    let cell = match name.as_str() {
        "INT2" => scalar(row.try_get::<i16, _>(idx), |v| v.to_string()),
        "INT4" => scalar(row.try_get::<i32, _>(idx), |v| v.to_string()),
        "INT8" => scalar(row.try_get::<i64, _>(idx), |v| v.to_string()),
        "FLOAT4" => scalar(row.try_get::<f32, _>(idx), |v| float_text(v.into(), v.to_string())),
        "FLOAT8" => scalar(row.try_get::<f64, _>(idx), |v| float_text(v, v.to_string())),
        "NUMERIC" => scalar(row.try_get::<Decimal, _>(idx), |v| v.to_string()).or_else(|| numeric_special(&raw)),
        "MONEY" => scalar(row.try_get::<PgMoney, _>(idx), money_text),
        "BOOL" => scalar(row.try_get::<bool, _>(idx), bool_text),
        "UUID" => scalar(row.try_get::<uuid::Uuid, _>(idx), |v| v.to_string()),
        "JSON" | "JSONB" => scalar(row.try_get::<Value, _>(idx), |v| v.to_string()),
        "DATE" => scalar(row.try_get::<NaiveDate, _>(idx), |v| v.format("%Y-%m-%d").to_string()),
        "TIME" => scalar(row.try_get::<NaiveTime, _>(idx), |v| v.format("%H:%M:%S%.f").to_string()),
        "TIMETZ" => scalar(row.try_get::<PgTimeTz<NaiveTime, FixedOffset>, _>(idx), |v| {
            format!("{}{}", v.time.format("%H:%M:%S%.f"), offset_text(v.offset))
        }),
        "TIMESTAMP" => scalar(row.try_get::<NaiveDateTime, _>(idx), naive_timestamp_text),
        "TIMESTAMPTZ" => scalar(row.try_get::<DateTime<Utc>, _>(idx), |v| {
            format!("{}+00", naive_timestamp_text(v.naive_utc()))
        }),
        "INTERVAL" => scalar(row.try_get::<PgInterval, _>(idx), interval_text),
        "BYTEA" => scalar(row.try_get::<Vec<u8>, _>(idx), |v| format!("\\x{}", hex(&v, ""))),
        "INET" | "CIDR" => raw.as_bytes().ok().and_then(inet_text).map(Cell::Text),
        "MACADDR" => raw.as_bytes().ok().filter(|b| b.len() == 6).map(|b| Cell::Text(hex(b, ":"))),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" | "XML" | "UNKNOWN" => {
            raw.as_str().ok().map(|s| Cell::Text(s.to_string()))
        }
        "INT2[]" => elements(row.try_get::<Vec<Option<i16>>, _>(idx), |v| v.to_string()),
        "INT4[]" => elements(row.try_get::<Vec<Option<i32>>, _>(idx), |v| v.to_string()),
        "INT8[]" => elements(row.try_get::<Vec<Option<i64>>, _>(idx), |v| v.to_string()),
        "FLOAT8[]" => elements(row.try_get::<Vec<Option<f64>>, _>(idx), |v| float_text(v, v.to_string())),
        "NUMERIC[]" => elements(row.try_get::<Vec<Option<Decimal>>, _>(idx), |v| v.to_string()),
        "BOOL[]" => elements(row.try_get::<Vec<Option<bool>>, _>(idx), bool_text),
        "TEXT[]" | "VARCHAR[]" => elements(row.try_get::<Vec<Option<String>>, _>(idx), |v| v),
        "UUID[]" => elements(row.try_get::<Vec<Option<uuid::Uuid>>, _>(idx), |v| v.to_string()),
        "DATE[]" => elements(row.try_get::<Vec<Option<NaiveDate>>, _>(idx), |v| v.format("%Y-%m-%d").to_string()),
        _ => None,
    };
    cell.ok_or_else(|| unsupported(column, &name))
}

fn bool_text(v: bool) -> String {
    let text = if v { "t" } else { "f" };
    text.to_string()
}

fn float_text(v: f64, shortest: String) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v.is_infinite() && v > 0.0 {
        "Infinity".into()
    } else if v.is_infinite() {
        "-Infinity".into()
    } else {
        shortest
    }
}

/// NaN and the infinities, which have no `Decimal` form. The sign word follows the
/// digit count and weight in the binary layout.
fn numeric_special(raw: &PgValueRef<'_>) -> Option<Cell> {
    let bytes = raw.as_bytes().ok()?;
    let sign = u16::from_be_bytes([*bytes.get(4)?, *bytes.get(5)?]);
    let text = match sign {
        0xC000 => "NaN",
        0xD000 => "Infinity",
        0xF000 => "-Infinity",
        _ => return None,
    };
    Some(Cell::Text(text.into()))
}

fn naive_timestamp_text(v: NaiveDateTime) -> String {
    v.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

fn offset_text(offset: FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.unsigned_abs();
    let (hours, minutes) = (secs / 3600, secs / 60 % 60);
    if minutes == 0 {
        format!("{sign}{hours:02}")
    } else {
        format!("{sign}{hours:02}:{minutes:02}")
    }
}

/// Two fractional digits, thousands grouped, as the C and en_US monetary locales print it.
fn money_text(PgMoney(cents): PgMoney) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{sign}${grouped}.{:02}", cents % 100)
}

/// `IntervalStyle = postgres` output.
fn interval_text(interval: PgInterval) -> String {
    let mut out = String::new();
    let mut is_before = false;
    let parts = [
        (interval.months / 12, "year"),
        (interval.months % 12, "mon"),
        (interval.days, "day"),
    ];
    for (value, unit) in parts {
        if value == 0 {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        let plus = if is_before && value > 0 { "+" } else { "" };
        let plural = if value != 1 { "s" } else { "" };
        out.push_str(&format!("{plus}{value} {unit}{plural}"));
        is_before = value < 0;
    }
    let micros = interval.microseconds;
    if out.is_empty() || micros != 0 {
        let sign = if micros < 0 {
            "-"
        } else if is_before {
            "+"
        } else {
            ""
        };
        let micros = micros.unsigned_abs();
        let hours = micros / 3_600_000_000;
        let minutes = micros / 60_000_000 % 60;
        let seconds = micros / 1_000_000 % 60;
        let fraction = micros % 1_000_000;
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&format!("{sign}{hours:02}:{minutes:02}:{seconds:02}"));
        if fraction > 0 {
            out.push('.');
            out.push_str(format!("{fraction:06}").trim_end_matches('0'));
        }
    }
    out
}

/// inet/cidr binary layout: family, prefix bits, cidr flag, address length, address.
fn inet_text(bytes: &[u8]) -> Option<String> {
    let [family, bits, is_cidr, _, addr @ ..] = bytes else {
        return None;
    };
    let ip = match (family, addr.len()) {
        (2, 4) => IpAddr::from(<[u8; 4]>::try_from(addr).ok()?),
        (3, 16) => IpAddr::from(<[u8; 16]>::try_from(addr).ok()?),
        _ => return None,
    };
    let max_bits = if ip.is_ipv4() { 32 } else { 128 };
    if *is_cidr != 0 || *bits != max_bits {
        Some(format!("{ip}/{bits}"))
    } else {
        Some(ip.to_string())
    }
}

fn hex(bytes: &[u8], separator: &str) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(separator)
}

fn quoted(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn cell_json(cell: &Cell, descriptor: &TypeDescriptor) -> String {
    match cell {
        Cell::Null => "null".into(),
        Cell::Text(text) => text_to_json(text, descriptor),
        Cell::Elements(items) => {
            let element = descriptor.element();
            let items: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Some(s) => scalar_json(s, &element),
                    None => "null".into(),
                })
                .collect();
            format!("[{}]", items.join(","))
        }
    }
}

/// Text form of a value (as PostgreSQL prints it) to a JSON token, guided by the declared type.
pub fn text_to_json(text: &str, descriptor: &TypeDescriptor) -> String {
    if descriptor.is_array {
        return match parse_array_literal(text) {
            Some(nodes) => nodes_json(&nodes, descriptor),
            None => quoted(text),
        };
    }
    scalar_json(text, descriptor)
}

fn nodes_json(nodes: &[ArrayNode], descriptor: &TypeDescriptor) -> String {
    let element = descriptor.element();
    let items: Vec<String> = nodes
        .iter()
        .map(|node| match node {
            ArrayNode::Item(None) => "null".into(),
            ArrayNode::Item(Some(s)) => scalar_json(s, &element),
            ArrayNode::Nested(inner) => nodes_json(inner, descriptor),
        })
        .collect();
    format!("[{}]", items.join(","))
}

fn scalar_json(text: &str, descriptor: &TypeDescriptor) -> String {
    match descriptor.category {
        // NaN and the infinities are not JSON numbers
        TypeCategory::Numeric if descriptor.driver != DriverType::Money && JSON_NUMBER.is_match(text) => {
            text.to_string()
        }
        TypeCategory::Boolean => match text {
            "t" | "true" => "true".into(),
            "f" | "false" => "false".into(),
            _ => quoted(text),
        },
        TypeCategory::Json if serde_json::from_str::<serde::de::IgnoredAny>(text).is_ok() => text.to_string(),
        TypeCategory::DateTime => quoted(&iso_timestamp(text, descriptor.driver)),
        _ => quoted(text),
    }
}

/// Timestamps as ISO-8601 (`T` separator, `+HH:MM` offset). Values chrono cannot read
/// (infinity, BC dates) keep their PostgreSQL form.
fn iso_timestamp(text: &str, driver: DriverType) -> String {
    match driver {
        DriverType::TimestampTz => DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z")
            .map(|d| d.to_rfc3339_opts(SecondsFormat::AutoSi, false))
            .unwrap_or_else(|_| text.to_string()),
        DriverType::Timestamp => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .map(|d| d.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            .unwrap_or_else(|_| text.to_string()),
        _ => text.to_string(),
    }
}
