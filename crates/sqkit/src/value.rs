//! Owned argument and column values.
//!
//! [`Value`] is what the renderer appends to the argument list for every
//! placeholder, and what a [`Database`](crate::Database) hands back for every
//! column of a result row. Keeping it a plain enum (instead of boxed `ToSql`
//! trait objects) makes rendered arguments comparable in tests and lets the row
//! cursor work against any backend.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tokio_postgres::types::{IsNull, ToSql, Type, WrongType};
use uuid::Uuid;

use crate::error::{SqError, SqResult};

/// One physical result row, column values in projection order.
pub type Record = Vec<Value>;

/// A SQL value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL NULL
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
}

impl Value {
    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Serialize any `serde` value into a JSON value.
    pub fn json<T: Serialize>(value: &T) -> SqResult<Self> {
        serde_json::to_value(value)
            .map(Value::Json)
            .map_err(|e| SqError::validation(format!("cannot encode JSON value: {e}")))
    }

    /// Short type name used in decode errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "blob",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
            Value::Json(_) => "json",
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v.and_utc())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// Integer and float widths follow the target column so that an `i64` bound
// against an `int4` column is not written as eight bytes.
type EncodeResult = Result<IsNull, Box<dyn std::error::Error + Sync + Send>>;

/// Encode `value` only when its Rust type maps to the parameter type.
fn encode<T: ToSql>(value: &T, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    if !T::accepts(ty) {
        return Err(Box::new(WrongType::new::<T>(ty.clone())));
    }
    value.to_sql(ty, out)
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> EncodeResult {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => encode(b, ty, out),
            Value::Int(i) => match *ty {
                Type::INT2 => encode(&i16::try_from(*i)?, ty, out),
                Type::INT4 => encode(&i32::try_from(*i)?, ty, out),
                Type::OID => encode(&u32::try_from(*i)?, ty, out),
                Type::FLOAT4 => encode(&(*i as f32), ty, out),
                Type::FLOAT8 => encode(&(*i as f64), ty, out),
                _ => encode(i, ty, out),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => encode(&(*f as f32), ty, out),
                _ => encode(f, ty, out),
            },
            Value::Text(s) => encode(s, ty, out),
            Value::Bytes(b) => encode(b, ty, out),
            Value::Timestamp(t) => match *ty {
                Type::TIMESTAMP => encode(&t.naive_utc(), ty, out),
                _ => encode(t, ty, out),
            },
            Value::Uuid(u) => encode(u, ty, out),
            Value::Json(j) => encode(j, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// Decode a `tokio_postgres` row into a [`Record`] by column type.
///
/// Types without a dedicated [`Value`] variant are read as text.
pub fn record_from_pg_row(row: &tokio_postgres::Row) -> SqResult<Record> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let decoded = match *column.type_() {
            Type::BOOL => row
                .try_get::<_, Option<bool>>(idx)
                .map(|v| v.map(Value::Bool)),
            Type::INT2 => row
                .try_get::<_, Option<i16>>(idx)
                .map(|v| v.map(Value::from)),
            Type::INT4 => row
                .try_get::<_, Option<i32>>(idx)
                .map(|v| v.map(Value::from)),
            Type::INT8 => row
                .try_get::<_, Option<i64>>(idx)
                .map(|v| v.map(Value::Int)),
            Type::OID => row
                .try_get::<_, Option<u32>>(idx)
                .map(|v| v.map(Value::from)),
            Type::FLOAT4 => row
                .try_get::<_, Option<f32>>(idx)
                .map(|v| v.map(Value::from)),
            Type::FLOAT8 => row
                .try_get::<_, Option<f64>>(idx)
                .map(|v| v.map(Value::Float)),
            Type::BYTEA => row
                .try_get::<_, Option<Vec<u8>>>(idx)
                .map(|v| v.map(Value::Bytes)),
            Type::TIMESTAMPTZ => row
                .try_get::<_, Option<DateTime<Utc>>>(idx)
                .map(|v| v.map(Value::Timestamp)),
            Type::TIMESTAMP => row
                .try_get::<_, Option<NaiveDateTime>>(idx)
                .map(|v| v.map(Value::from)),
            Type::UUID => row
                .try_get::<_, Option<Uuid>>(idx)
                .map(|v| v.map(Value::Uuid)),
            Type::JSON | Type::JSONB => row
                .try_get::<_, Option<serde_json::Value>>(idx)
                .map(|v| v.map(Value::Json)),
            _ => row
                .try_get::<_, Option<String>>(idx)
                .map(|v| v.map(Value::Text)),
        }
        .map_err(|e| SqError::decode(column.name(), e.to_string()))?;
        values.push(decoded.unwrap_or(Value::Null));
    }
    Ok(values)
}
