//! Row cursor and typed column access.
//!
//! A mapper closure receives a [`Row`] for every physical result row and reads
//! columns through field descriptors, never through column names:
//!
//! ```ignore
//! let users = select(Vec::<Field>::new())
//!     .from(&u)
//!     .fetch_all(&db, |row| {
//!         Ok(User {
//!             id: row.int64(&u.user_id)?,
//!             name: row.string(&u.displayname)?,
//!             email: row.nullable_string(&u.email)?,
//!         })
//!     })
//!     .await?;
//! ```
//!
//! When the SELECT has no explicit field list the mapper is first called once
//! in registration mode: accessors record their field and return a
//! placeholder, and the recorded fields become the projection.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{SqError, SqResult};
use crate::field::Field;
use crate::value::Value;

/// Conversion from a column [`Value`].
pub trait FromValue: Sized {
    /// Decode `value`, or describe why it cannot be decoded.
    fn from_value(value: &Value) -> Result<Self, String>;

    /// Value returned by accessors in registration mode.
    fn placeholder() -> Self;
}

fn mismatch(expected: &str, value: &Value) -> String {
    if value.is_null() {
        format!("unexpected NULL, expected {expected}")
    } else {
        format!("expected {expected}, got {}", value.type_name())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Uuid(u) => Ok(u.to_string()),
            other => Err(mismatch("text", other)),
        }
    }

    fn placeholder() -> Self {
        String::new()
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            other => Err(mismatch("integer", other)),
        }
    }

    fn placeholder() -> Self {
        0
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| format!("integer {wide} out of range for i32"))
    }

    fn placeholder() -> Self {
        0
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(mismatch("float", other)),
        }
    }

    fn placeholder() -> Self {
        0.0
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            // sqlite and mysql store booleans as integers
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => Err(mismatch("bool", other)),
        }
    }

    fn placeholder() -> Self {
        false
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(mismatch("blob", other)),
        }
    }

    fn placeholder() -> Self {
        Vec::new()
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Timestamp(t) => Ok(*t),
            Value::Text(s) => DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .or_else(|_| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").map(|t| t.and_utc())
                })
                .map_err(|e| format!("invalid timestamp {s:?}: {e}")),
            Value::Int(secs) => DateTime::from_timestamp(*secs, 0)
                .ok_or_else(|| format!("unix time {secs} out of range")),
            other => Err(mismatch("timestamp", other)),
        }
    }

    fn placeholder() -> Self {
        DateTime::<Utc>::UNIX_EPOCH
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Text(s) => Uuid::parse_str(s).map_err(|e| format!("invalid uuid {s:?}: {e}")),
            Value::Bytes(b) => Uuid::from_slice(b).map_err(|e| format!("invalid uuid bytes: {e}")),
            other => Err(mismatch("uuid", other)),
        }
    }

    fn placeholder() -> Self {
        Uuid::nil()
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::Text(s) => serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}")),
            Value::Bytes(b) => serde_json::from_slice(b).map_err(|e| format!("invalid JSON: {e}")),
            other => Err(mismatch("json", other)),
        }
    }

    fn placeholder() -> Self {
        serde_json::Value::Null
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }

    fn placeholder() -> Self {
        None
    }
}

enum RowState<'r> {
    Register(&'r mut Vec<Field>),
    Read {
        columns: &'r [Field],
        record: &'r [Value],
    },
}

/// Cursor over one physical result row.
pub struct Row<'r> {
    state: RowState<'r>,
    /// Non-NULL values read so far.
    count: usize,
    /// Expected index of the next read.
    next: usize,
}

impl<'r> Row<'r> {
    pub(crate) fn register(fields: &'r mut Vec<Field>) -> Self {
        Self {
            state: RowState::Register(fields),
            count: 0,
            next: 0,
        }
    }

    pub(crate) fn read(columns: &'r [Field], record: &'r [Value]) -> Self {
        Self {
            state: RowState::Read { columns, record },
            count: 0,
            next: 0,
        }
    }

    /// Whether this is the registration pass rather than a real row.
    pub fn is_registering(&self) -> bool {
        matches!(self.state, RowState::Register(_))
    }

    /// Number of non-NULL values read from this row so far.
    ///
    /// Zero for an unmatched outer-join side and always zero while registering.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Read `field` as `T`.
    pub fn get<T: FromValue>(&mut self, field: &Field) -> SqResult<T> {
        let (columns, record) = match &mut self.state {
            RowState::Register(fields) => {
                if !fields.iter().any(|f| f.same_expr(field)) {
                    fields.push(field.clone());
                }
                return Ok(T::placeholder());
            }
            RowState::Read { columns, record } => (*columns, *record),
        };
        let idx = self.position(columns, field)?;
        let value = record.get(idx).ok_or_else(|| {
            SqError::decode(
                field.label(),
                format!("row has {} column(s), field is column {}", record.len(), idx + 1),
            )
        })?;
        if !value.is_null() {
            self.count += 1;
        }
        T::from_value(value).map_err(|message| SqError::decode(field.label(), message))
    }

    /// Column index of `field`, trying the next sequential column first.
    fn position(&mut self, columns: &[Field], field: &Field) -> SqResult<usize> {
        let idx = match columns.get(self.next) {
            Some(c) if c.same_expr(field) => self.next,
            _ => columns
                .iter()
                .position(|c| c.same_expr(field))
                .ok_or_else(|| SqError::decode(field.label(), "field is not part of the projection"))?,
        };
        self.next = idx + 1;
        Ok(idx)
    }

    pub fn string(&mut self, field: &Field) -> SqResult<String> {
        self.get(field)
    }

    pub fn nullable_string(&mut self, field: &Field) -> SqResult<Option<String>> {
        self.get(field)
    }

    pub fn int64(&mut self, field: &Field) -> SqResult<i64> {
        self.get(field)
    }

    pub fn nullable_int64(&mut self, field: &Field) -> SqResult<Option<i64>> {
        self.get(field)
    }

    pub fn float64(&mut self, field: &Field) -> SqResult<f64> {
        self.get(field)
    }

    pub fn nullable_float64(&mut self, field: &Field) -> SqResult<Option<f64>> {
        self.get(field)
    }

    pub fn bool(&mut self, field: &Field) -> SqResult<bool> {
        self.get(field)
    }

    pub fn nullable_bool(&mut self, field: &Field) -> SqResult<Option<bool>> {
        self.get(field)
    }

    pub fn bytes(&mut self, field: &Field) -> SqResult<Vec<u8>> {
        self.get(field)
    }

    pub fn nullable_bytes(&mut self, field: &Field) -> SqResult<Option<Vec<u8>>> {
        self.get(field)
    }

    pub fn time(&mut self, field: &Field) -> SqResult<DateTime<Utc>> {
        self.get(field)
    }

    pub fn nullable_time(&mut self, field: &Field) -> SqResult<Option<DateTime<Utc>>> {
        self.get(field)
    }

    pub fn uuid(&mut self, field: &Field) -> SqResult<Uuid> {
        self.get(field)
    }

    pub fn nullable_uuid(&mut self, field: &Field) -> SqResult<Option<Uuid>> {
        self.get(field)
    }

    /// Deserialize a JSON column. Registration returns `T::default()`.
    pub fn json<T: DeserializeOwned + Default>(&mut self, field: &Field) -> SqResult<T> {
        match self.nullable_json(field)? {
            Some(v) => Ok(v),
            None if self.is_registering() => Ok(T::default()),
            None => Err(SqError::decode(field.label(), "unexpected NULL, expected json")),
        }
    }

    pub fn nullable_json<T: DeserializeOwned>(&mut self, field: &Field) -> SqResult<Option<T>> {
        let raw: Option<serde_json::Value> = self.get(field)?;
        match raw {
            None => Ok(None),
            Some(_) if self.is_registering() => Ok(None),
            Some(j) => serde_json::from_value(j)
                .map(Some)
                .map_err(|e| SqError::decode(field.label(), e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldType, TableInfo};

    fn fields() -> (Field, Field, Field) {
        let t = TableInfo::new("users").with_alias("u");
        (
            Field::new(&t, "user_id", FieldType::Number),
            Field::new(&t, "name", FieldType::String),
            Field::new(&t, "email", FieldType::String),
        )
    }

    #[test]
    fn registration_collects_fields_once() {
        let (id, name, _) = fields();
        let mut registered = Vec::new();
        let mut row = Row::register(&mut registered);
        assert!(row.is_registering());
        assert_eq!(row.int64(&id).unwrap(), 0);
        assert_eq!(row.string(&name).unwrap(), "");
        assert_eq!(row.int64(&id).unwrap(), 0);
        assert_eq!(row.count(), 0);
        assert_eq!(registered, vec![id, name]);
    }

    #[test]
    fn reads_by_descriptor_not_position() {
        let (id, name, email) = fields();
        let columns = vec![id.clone(), name.clone(), email.clone()];
        let record = vec![Value::Int(7), Value::from("bob"), Value::Null];
        let mut row = Row::read(&columns, &record);
        assert_eq!(row.nullable_string(&email).unwrap(), None);
        assert_eq!(row.string(&name).unwrap(), "bob");
        assert_eq!(row.int64(&id).unwrap(), 7);
        assert_eq!(row.count(), 2);
    }

    #[test]
    fn aliased_projection_matches_plain_field() {
        let (id, _, _) = fields();
        let columns = vec![id.alias("uid")];
        let record = vec![Value::Int(3)];
        let mut row = Row::read(&columns, &record);
        assert_eq!(row.int64(&id).unwrap(), 3);
    }

    #[test]
    fn same_column_name_in_two_tables_is_not_confused() {
        let a = TableInfo::new("users");
        let b = TableInfo::new("roles");
        let a_name = Field::new(&a, "name", FieldType::String);
        let b_name = Field::new(&b, "name", FieldType::String);
        let columns = vec![a_name.clone(), b_name.clone()];
        let record = vec![Value::from("alice"), Value::from("admin")];
        let mut row = Row::read(&columns, &record);
        assert_eq!(row.string(&b_name).unwrap(), "admin");
        assert_eq!(row.string(&a_name).unwrap(), "alice");
    }

    #[test]
    fn null_into_non_nullable_is_decode_error() {
        let (_, _, email) = fields();
        let columns = vec![email.clone()];
        let record = vec![Value::Null];
        let mut row = Row::read(&columns, &record);
        let err = row.string(&email).unwrap_err();
        assert!(matches!(err, SqError::Decode { ref column, .. } if column == "u.email"));
    }

    #[test]
    fn type_mismatch_is_decode_error() {
        let (id, _, _) = fields();
        let columns = vec![id.clone()];
        let record = vec![Value::from("seven")];
        let mut row = Row::read(&columns, &record);
        assert!(matches!(row.int64(&id), Err(SqError::Decode { .. })));
    }

    #[test]
    fn unknown_field_is_decode_error() {
        let (id, name, _) = fields();
        let columns = vec![id];
        let record = vec![Value::Int(1)];
        let mut row = Row::read(&columns, &record);
        assert!(matches!(row.string(&name), Err(SqError::Decode { .. })));
    }

    #[test]
    fn json_column_deserializes() {
        #[derive(serde::Deserialize, Default, Debug, PartialEq)]
        struct Prefs {
            theme: String,
        }
        let t = TableInfo::new("users");
        let prefs = Field::new(&t, "prefs", FieldType::Json);
        let columns = vec![prefs.clone()];
        let record = vec![Value::Json(serde_json::json!({ "theme": "dark" }))];
        let mut row = Row::read(&columns, &record);
        assert_eq!(
            row.json::<Prefs>(&prefs).unwrap(),
            Prefs {
                theme: "dark".to_string()
            }
        );
    }

    #[test]
    fn sqlite_style_values_decode() {
        let t = TableInfo::new("posts");
        let flag = Field::new(&t, "published", FieldType::Boolean);
        let at = Field::new(&t, "created_at", FieldType::Time);
        let columns = vec![flag.clone(), at.clone()];
        let record = vec![Value::Int(1), Value::from("2024-05-01 10:30:00")];
        let mut row = Row::read(&columns, &record);
        assert!(row.bool(&flag).unwrap());
        assert_eq!(row.time(&at).unwrap().to_rfc3339(), "2024-05-01T10:30:00+00:00");
    }
}
