//! Typed parameter values that sqlx binds with their native PostgreSQL type.

use crate::pg_type::TypeDescriptor;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// A value that can be bound to a routine call. Types without a native variant
/// (numeric, money, custom types, ...) travel as `Text` and are cast in SQL.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
    Uuid(uuid::Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Array(ArrayValue),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ArrayValue {
    Bool(Vec<Option<bool>>),
    I16(Vec<Option<i16>>),
    I32(Vec<Option<i32>>),
    I64(Vec<Option<i64>>),
    F32(Vec<Option<f32>>),
    F64(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Uuid(Vec<Option<uuid::Uuid>>),
    Date(Vec<Option<NaiveDate>>),
    Time(Vec<Option<NaiveTime>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
    TimestampTz(Vec<Option<DateTime<Utc>>>),
}

/// One bound argument of a routine call.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandParameter {
    /// Name as exposed over HTTP.
    pub name: String,
    pub descriptor: TypeDescriptor,
    pub value: ParamValue,
}

impl ParamValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// Text rendering used when a value lands in a text-typed array slot.
    pub fn into_text(self) -> String {
        match self {
            ParamValue::Null => String::new(),
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::I16(n) => n.to_string(),
            ParamValue::I32(n) => n.to_string(),
            ParamValue::I64(n) => n.to_string(),
            ParamValue::F32(n) => n.to_string(),
            ParamValue::F64(n) => n.to_string(),
            ParamValue::Text(s) => s,
            ParamValue::Uuid(u) => u.to_string(),
            ParamValue::Date(d) => d.to_string(),
            ParamValue::Time(t) => t.to_string(),
            ParamValue::Timestamp(t) => t.to_string(),
            ParamValue::TimestampTz(t) => t.to_rfc3339(),
            ParamValue::Array(a) => format!("{a:?}"),
        }
    }
}

fn collect<T>(items: Vec<Option<ParamValue>>, pick: impl Fn(ParamValue) -> Option<T>) -> Vec<Option<T>> {
    items.into_iter().map(|item| item.and_then(&pick)).collect()
}

impl ArrayValue {
    /// Build the array variant matching the element type from already-parsed elements.
    pub fn from_elements(element: &TypeDescriptor, items: Vec<Option<ParamValue>>) -> ArrayValue {
        use crate::pg_type::DriverType as D;
        match element.driver {
            D::Boolean => ArrayValue::Bool(collect(items, |v| match v {
                ParamValue::Bool(b) => Some(b),
                _ => None,
            })),
            D::Smallint => ArrayValue::I16(collect(items, |v| match v {
                ParamValue::I16(n) => Some(n),
                _ => None,
            })),
            D::Integer => ArrayValue::I32(collect(items, |v| match v {
                ParamValue::I32(n) => Some(n),
                _ => None,
            })),
            D::Bigint | D::Oid => ArrayValue::I64(collect(items, |v| match v {
                ParamValue::I64(n) => Some(n),
                _ => None,
            })),
            D::Real => ArrayValue::F32(collect(items, |v| match v {
                ParamValue::F32(n) => Some(n),
                _ => None,
            })),
            D::Double => ArrayValue::F64(collect(items, |v| match v {
                ParamValue::F64(n) => Some(n),
                _ => None,
            })),
            D::Uuid => ArrayValue::Uuid(collect(items, |v| match v {
                ParamValue::Uuid(u) => Some(u),
                _ => None,
            })),
            D::Date => ArrayValue::Date(collect(items, |v| match v {
                ParamValue::Date(d) => Some(d),
                _ => None,
            })),
            D::Time => ArrayValue::Time(collect(items, |v| match v {
                ParamValue::Time(t) => Some(t),
                _ => None,
            })),
            D::Timestamp => ArrayValue::Timestamp(collect(items, |v| match v {
                ParamValue::Timestamp(t) => Some(t),
                _ => None,
            })),
            D::TimestampTz => ArrayValue::TimestampTz(collect(items, |v| match v {
                ParamValue::TimestampTz(t) => Some(t),
                _ => None,
            })),
            _ => ArrayValue::Text(collect(items, |v| Some(v.into_text()))),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayValue::Bool(v) => v.len(),
            ArrayValue::I16(v) => v.len(),
            ArrayValue::I32(v) => v.len(),
            ArrayValue::I64(v) => v.len(),
            ArrayValue::F32(v) => v.len(),
            ArrayValue::F64(v) => v.len(),
            ArrayValue::Text(v) => v.len(),
            ArrayValue::Uuid(v) => v.len(),
            ArrayValue::Date(v) => v.len(),
            ArrayValue::Time(v) => v.len(),
            ArrayValue::Timestamp(v) => v.len(),
            ArrayValue::TimestampTz(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'q> Encode<'q, Postgres> for ArrayValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            ArrayValue::Bool(v) => <Vec<Option<bool>> as Encode<Postgres>>::encode_by_ref(v, buf),
            ArrayValue::I16(v) => <Vec<Option<i16>> as Encode<Postgres>>::encode_by_ref(v, buf),
            ArrayValue::I32(v) => <Vec<Option<i32>> as Encode<Postgres>>::encode_by_ref(v, buf),
            ArrayValue::I64(v) => <Vec<Option<i64>> as Encode<Postgres>>::encode_by_ref(v, buf),
            ArrayValue::F32(v) => <Vec<Option<f32>> as Encode<Postgres>>::encode_by_ref(v, buf),
            ArrayValue::F64(v) => <Vec<Option<f64>> as Encode<Postgres>>::encode_by_ref(v, buf),
            ArrayValue::Text(v) => <Vec<Option<String>> as Encode<Postgres>>::encode_by_ref(v, buf),
            ArrayValue::Uuid(v) => <Vec<Option<uuid::Uuid>> as Encode<Postgres>>::encode_by_ref(v, buf),
            ArrayValue::Date(v) => <Vec<Option<NaiveDate>> as Encode<Postgres>>::encode_by_ref(v, buf),
            ArrayValue::Time(v) => <Vec<Option<NaiveTime>> as Encode<Postgres>>::encode_by_ref(v, buf),
            ArrayValue::Timestamp(v) => <Vec<Option<NaiveDateTime>> as Encode<Postgres>>::encode_by_ref(v, buf),
            ArrayValue::TimestampTz(v) => {
                <Vec<Option<DateTime<Utc>>> as Encode<Postgres>>::encode_by_ref(v, buf)
            }
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            ArrayValue::Bool(_) => <Vec<bool> as Type<Postgres>>::type_info(),
            ArrayValue::I16(_) => <Vec<i16> as Type<Postgres>>::type_info(),
            ArrayValue::I32(_) => <Vec<i32> as Type<Postgres>>::type_info(),
            ArrayValue::I64(_) => <Vec<i64> as Type<Postgres>>::type_info(),
            ArrayValue::F32(_) => <Vec<f32> as Type<Postgres>>::type_info(),
            ArrayValue::F64(_) => <Vec<f64> as Type<Postgres>>::type_info(),
            ArrayValue::Text(_) => <Vec<String> as Type<Postgres>>::type_info(),
            ArrayValue::Uuid(_) => <Vec<uuid::Uuid> as Type<Postgres>>::type_info(),
            ArrayValue::Date(_) => <Vec<NaiveDate> as Type<Postgres>>::type_info(),
            ArrayValue::Time(_) => <Vec<NaiveTime> as Type<Postgres>>::type_info(),
            ArrayValue::Timestamp(_) => <Vec<NaiveDateTime> as Type<Postgres>>::type_info(),
            ArrayValue::TimestampTz(_) => <Vec<DateTime<Utc>> as Type<Postgres>>::type_info(),
        })
    }
}

impl sqlx::Type<Postgres> for ArrayValue {
    fn type_info() -> PgTypeInfo {
        <Vec<String> as Type<Postgres>>::type_info()
    }
}

impl<'q> Encode<'q, Postgres> for ParamValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            ParamValue::Null => <Option<String> as Encode<Postgres>>::encode_by_ref(&None, buf),
            ParamValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf),
            ParamValue::I16(n) => <i16 as Encode<Postgres>>::encode_by_ref(n, buf),
            ParamValue::I32(n) => <i32 as Encode<Postgres>>::encode_by_ref(n, buf),
            ParamValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf),
            ParamValue::F32(n) => <f32 as Encode<Postgres>>::encode_by_ref(n, buf),
            ParamValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf),
            ParamValue::Text(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)
            }
            ParamValue::Uuid(u) => <uuid::Uuid as Encode<Postgres>>::encode_by_ref(u, buf),
            ParamValue::Date(d) => <NaiveDate as Encode<Postgres>>::encode_by_ref(d, buf),
            ParamValue::Time(t) => <NaiveTime as Encode<Postgres>>::encode_by_ref(t, buf),
            ParamValue::Timestamp(t) => <NaiveDateTime as Encode<Postgres>>::encode_by_ref(t, buf),
            ParamValue::TimestampTz(t) => <DateTime<Utc> as Encode<Postgres>>::encode_by_ref(t, buf),
            ParamValue::Array(a) => a.encode_by_ref(buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            ParamValue::Null | ParamValue::Text(_) => <String as Type<Postgres>>::type_info(),
            ParamValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
            ParamValue::I16(_) => <i16 as Type<Postgres>>::type_info(),
            ParamValue::I32(_) => <i32 as Type<Postgres>>::type_info(),
            ParamValue::I64(_) => <i64 as Type<Postgres>>::type_info(),
            ParamValue::F32(_) => <f32 as Type<Postgres>>::type_info(),
            ParamValue::F64(_) => <f64 as Type<Postgres>>::type_info(),
            ParamValue::Uuid(_) => <uuid::Uuid as Type<Postgres>>::type_info(),
            ParamValue::Date(_) => <NaiveDate as Type<Postgres>>::type_info(),
            ParamValue::Time(_) => <NaiveTime as Type<Postgres>>::type_info(),
            ParamValue::Timestamp(_) => <NaiveDateTime as Type<Postgres>>::type_info(),
            ParamValue::TimestampTz(_) => <DateTime<Utc> as Type<Postgres>>::type_info(),
            ParamValue::Array(a) => return a.produces(),
        })
    }
}

impl sqlx::Type<Postgres> for ParamValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_variant_follows_element_type() {
        let int = TypeDescriptor::parse("integer");
        let arr = ArrayValue::from_elements(&int, vec![Some(ParamValue::I32(1)), None, Some(ParamValue::I32(3))]);
        assert_eq!(arr, ArrayValue::I32(vec![Some(1), None, Some(3)]));

        let custom = TypeDescriptor::parse("mood");
        let arr = ArrayValue::from_elements(&custom, vec![Some(ParamValue::Text("happy".into())), None]);
        assert_eq!(arr, ArrayValue::Text(vec![Some("happy".into()), None]));
        assert_eq!(arr.len(), 2);
    }

    #[test]
    fn produced_types_are_native() {
        use sqlx::TypeInfo;
        let name = |v: ParamValue| v.produces().map(|t| t.name().to_string());
        assert_eq!(name(ParamValue::I32(1)).as_deref(), Some(<i32 as Type<Postgres>>::type_info().name()));
        assert_eq!(name(ParamValue::Null).as_deref(), Some(<String as Type<Postgres>>::type_info().name()));
        assert_eq!(
            name(ParamValue::Array(ArrayValue::Bool(vec![Some(true)]))).as_deref(),
            Some(<Vec<bool> as Type<Postgres>>::type_info().name())
        );
    }
}
