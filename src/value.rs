//! Values flowing through expression trees.
//!
//! A [`Value`] is what a field, a context variable or a literal holds. The
//! third logical state, "not enough information to decide", is not a value:
//! evaluation returns [`Evaluation`], where `None` marks an indeterminate
//! result.

use crate::expression::{ExpressionError, ExpressionResult};
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Key used to tag dates when a value is rendered as JSON
pub const DATE_KEY: &str = "$date";

/// A row handed to an expression for evaluation
pub type Record = BTreeMap<String, Value>;

/// Named variables unrelated to the row being evaluated
pub type Environment = BTreeMap<String, Value>;

/// Outcome of evaluating an expression.
///
/// `Some(Value::Null)` means the data is known to be absent, `None` means the
/// result is indeterminate (for example the record itself was not supplied).
pub type Evaluation = Option<Value>;

/// Values that can appear in records, environments and literals
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    List(Vec<Value>),
}

impl Value {
    /// Name of the value's type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::List(_) => "list",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Order two values of compatible types.
    ///
    /// Integers and floats compare numerically, dates by instant. Returns
    /// `None` when the types have no common ordering.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality as seen by the expression algebra: numeric across int/float,
    /// dates by instant, lists element-wise, values of different types never
    /// equal. Null equals Null here; comparison operators handle Null before
    /// reaching this.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }

    /// Textual form used by string-producing operators.
    ///
    /// Lists have no textual form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::List(_) => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

/// An indeterminate input becomes Null
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = ExpressionError;

    fn try_from(json: serde_json::Value) -> ExpressionResult<Self> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Boolean(b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => n.as_f64().map(Value::Float).ok_or_else(|| {
                    ExpressionError::InvalidValue(format!("number {} is out of range", n))
                }),
            },
            serde_json::Value::String(s) => Ok(Value::String(s)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(Value::try_from)
                .collect::<ExpressionResult<Vec<_>>>()
                .map(Value::List),
            serde_json::Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(serde_json::Value::String(s)) = map.get(DATE_KEY) {
                        let date = DateTime::parse_from_rfc3339(s).map_err(|e| {
                            ExpressionError::InvalidValue(format!("invalid date '{}': {}", s, e))
                        })?;
                        return Ok(Value::Date(date.with_timezone(&Utc)));
                    }
                }
                Err(ExpressionError::InvalidValue(
                    "objects are only supported as records or tagged dates".to_string(),
                ))
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => {
                let mut map = serde_json::Map::new();
                map.insert(DATE_KEY.to_string(), serde_json::Value::String(d.to_rfc3339()));
                serde_json::Value::Object(map)
            }
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(d) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(DATE_KEY, &d.to_rfc3339())?;
                map.end()
            }
            Value::List(items) => serializer.collect_seq(items),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::try_from(json).map_err(D::Error::custom)
    }
}

/// Build a record from a JSON object
pub fn record_from_json(json: serde_json::Value) -> ExpressionResult<Record> {
    match json {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| Ok((k, Value::try_from(v)?)))
            .collect(),
        other => Err(ExpressionError::InvalidValue(format!(
            "expected an object for a record, got {}",
            other
        ))),
    }
}

/// Build a collection of records from a JSON array of objects
pub fn rows_from_json(json: serde_json::Value) -> ExpressionResult<Vec<Record>> {
    match json {
        serde_json::Value::Array(items) => items.into_iter().map(record_from_json).collect(),
        other => Err(ExpressionError::InvalidValue(format!(
            "expected an array of records, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_numeric_comparison_across_types() {
        assert_eq!(Value::Int(3).compare(&Value::Float(3.5)), Some(Ordering::Less));
        assert!(Value::Int(5).loose_eq(&Value::Float(5.0)));
        assert!(!Value::Int(5).loose_eq(&Value::String("5".to_string())));
        assert_eq!(Value::Int(1).compare(&Value::Boolean(true)), None);
    }

    #[test]
    fn test_dates_compare_by_instant() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = DateTime::parse_from_rfc3339("2024-01-01T02:00:00+02:00")
            .unwrap()
            .with_timezone(&Utc);
        assert!(Value::Date(a).loose_eq(&Value::Date(b)));
    }

    #[test]
    fn test_option_normalizes_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(4)), Value::Int(4));
    }

    #[test]
    fn test_json_conversion() -> anyhow::Result<()> {
        let json = serde_json::json!({
            "a": 1,
            "b": 2.5,
            "c": null,
            "d": [true, "x"],
            "e": { "$date": "2024-03-01T10:00:00Z" }
        });
        let record = record_from_json(json)?;
        assert_eq!(record["a"], Value::Int(1));
        assert_eq!(record["b"], Value::Float(2.5));
        assert_eq!(record["c"], Value::Null);
        assert_eq!(
            record["d"],
            Value::List(vec![Value::Boolean(true), Value::String("x".to_string())])
        );
        assert!(matches!(record["e"], Value::Date(_)));

        let back = serde_json::Value::from(&record["e"]);
        assert_eq!(back, serde_json::json!({ "$date": "2024-03-01T10:00:00+00:00" }));
        Ok(())
    }

    #[test]
    fn test_nested_objects_are_rejected() {
        let json = serde_json::json!({ "a": { "b": 1 } });
        assert!(matches!(
            record_from_json(json),
            Err(ExpressionError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_serde_round_trip() -> anyhow::Result<()> {
        let value = Value::List(vec![Value::Int(1), Value::Null, Value::String("s".into())]);
        let text = serde_json::to_string(&value)?;
        assert_eq!(text, "[1,null,\"s\"]");
        let back: Value = serde_json::from_str(&text)?;
        assert_eq!(back, value);
        Ok(())
    }
}
