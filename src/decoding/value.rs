//! A schema-less, navigable representation of decoded message payloads.
use serde::Serialize;
use indexmap::IndexMap;

/// A value found in a decoded payload.
///
/// Payloads are navigated without a fixed schema: look fields up by key with [`Value::get`],
/// elements up by position with [`Value::index`], or walk a dotted path with [`Value::at`].
/// Every accessor fails with an [`AccessError`] when the path does not exist - there is no
/// "empty placeholder" for missing fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    Mapping(Record),
    Sequence(Vec<Value>),
}

/// A leaf value, exactly as the source format provided it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

/// A mapping from field names to values - one decoded message record.
///
/// Fields keep the order of the source payload: JSON field order, or CSV header order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(IndexMap<String, Value>);

/// Failure to navigate a [`Value`] or a [`Record`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Key `{key}` is missing.")]
    MissingKey { key: String },
    #[error("Index {index} is out of bounds for a sequence of length {len}.")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("Cannot look up key `{key}` in a {found}.")]
    NotAMapping { key: String, found: &'static str },
    #[error("Cannot look up index {index} in a {found}.")]
    NotASequence { index: usize, found: &'static str },
}

impl Value {
    /// Look up `key`, failing if `self` is not a mapping or the key is missing.
    pub fn get(&self, key: &str) -> Result<&Value, AccessError> {
        match self {
            Self::Mapping(record) => record.get(key),
            other => Err(AccessError::NotAMapping {
                key: key.to_owned(),
                found: other.kind(),
            }),
        }
    }

    /// Look up the element at `index`, failing if `self` is not a sequence or it is too short.
    pub fn index(&self, index: usize) -> Result<&Value, AccessError> {
        match self {
            Self::Sequence(items) => items.get(index).ok_or(AccessError::IndexOutOfBounds {
                index,
                len: items.len(),
            }),
            other => Err(AccessError::NotASequence {
                index,
                found: other.kind(),
            }),
        }
    }

    /// Walk a dot-separated path, e.g. `customer.addresses.0.city`.
    ///
    /// A numeric segment indexes into a sequence; any other segment is a key lookup.
    /// An empty path returns `self`.
    pub fn at(&self, path: &str) -> Result<&Value, AccessError> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |current, segment| match (current, segment.parse::<usize>()) {
                (Self::Sequence(_), Ok(index)) => current.index(index),
                _ => current.get(segment),
            })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Scalar(Scalar::Number(n)) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Scalar(Scalar::Number(n)) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Scalar(Scalar::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Scalar::Null))
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Mapping(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// A human-readable name for the shape of this value, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(Scalar::Null) => "null",
            Self::Scalar(Scalar::Bool(_)) => "boolean",
            Self::Scalar(Scalar::Number(_)) => "number",
            Self::Scalar(Scalar::String(_)) => "string",
            Self::Mapping(_) => "mapping",
            Self::Sequence(_) => "sequence",
        }
    }
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, failing with [`AccessError::MissingKey`] if it is absent.
    pub fn get(&self, key: &str) -> Result<&Value, AccessError> {
        self.0.get(key).ok_or_else(|| AccessError::MissingKey {
            key: key.to_owned(),
        })
    }

    /// Look up `key`, returning `None` if it is absent.
    pub fn try_get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Walk a dot-separated path starting from this record. See [`Value::at`].
    pub fn at(&self, path: &str) -> Result<&Value, AccessError> {
        let mut segments = path.splitn(2, '.');
        let head = segments.next().unwrap_or_default();
        let value = self.get(head)?;
        match segments.next() {
            Some(rest) => value.at(rest),
            None => Ok(value),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Scalar(Scalar::Null),
            serde_json::Value::Bool(b) => Self::Scalar(Scalar::Bool(b)),
            serde_json::Value::Number(n) => Self::Scalar(Scalar::Number(n)),
            serde_json::Value::String(s) => Self::Scalar(Scalar::String(s)),
            serde_json::Value::Array(items) => {
                Self::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Self::Mapping(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::String(value.to_owned()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Scalar(Scalar::String(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Number(value.into()))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Self::Mapping(value)
    }
}
