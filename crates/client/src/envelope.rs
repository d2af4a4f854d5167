//! List response envelopes.
//!
//! List endpoints answer in one of three shapes: a paginated page
//! (`{"content": [...]}`), a wrapped list (`{"data": [...]}`), or a bare
//! array. [`ListEnvelope::from_json`] resolves the shape once at the network
//! boundary; callers only ever see the committed item sequence.

use serde_json::Value;

/// Shape of a list response.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEnvelope {
    /// `{"content": [...], "totalElements": ..}`
    Paginated(Vec<Value>),
    /// `{"data": [...]}`, or `{"data": {"content": [...]}}`
    Wrapped(Vec<Value>),
    /// `[...]`
    Raw(Vec<Value>),
    /// Anything else, including `null`.
    Empty,
}

impl ListEnvelope {
    /// Classify a response body.
    ///
    /// Precedence is `content`, then `data`, then a raw array, then empty.
    #[must_use]
    pub fn from_json(body: Value) -> Self {
        match body {
            Value::Array(items) => Self::Raw(items),
            Value::Object(mut map) => {
                if let Some(Value::Array(items)) = map.remove("content") {
                    return Self::Paginated(items);
                }
                match map.remove("data") {
                    Some(Value::Array(items)) => Self::Wrapped(items),
                    Some(Value::Object(mut inner)) => match inner.remove("content") {
                        Some(Value::Array(items)) => Self::Wrapped(items),
                        _ => Self::Empty,
                    },
                    _ => Self::Empty,
                }
            }
            _ => Self::Empty,
        }
    }

    /// The items, whatever the shape.
    #[must_use]
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Self::Paginated(items) | Self::Wrapped(items) | Self::Raw(items) => items,
            Self::Empty => Vec::new(),
        }
    }
}

/// Read a count out of a statistics response: a bare number, or an object
/// with `count`, `total` or `data`.
#[must_use]
pub fn count_from_json(body: &Value) -> Option<u64> {
    match body {
        Value::Number(n) => n.as_u64(),
        Value::Object(map) => ["count", "total", "data"]
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_u64)),
        _ => None,
    }
}
