//! Records and scalar attribute values.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Scalar attributes attached to a record, keyed by attribute name.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A scalar attribute value.
///
/// Serialized untagged, so JSON numbers and strings map directly:
/// `{"score": 61.5, "year": 2024, "text": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating-point number
    Float(f64),
    /// UTF-8 text
    Text(String),
}

impl AttributeValue {
    /// Get the text value, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get a numeric view of the value. Integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(i) => Some(*i as f64),
            AttributeValue::Float(f) => Some(*f),
            AttributeValue::Text(_) => None,
        }
    }

    /// Compare two values. Integers and floats compare numerically with each
    /// other, text compares lexicographically, anything else is incomparable.
    pub fn compare(&self, other: &AttributeValue) -> Option<Ordering> {
        match (self, other) {
            (AttributeValue::Integer(a), AttributeValue::Integer(b)) => Some(a.cmp(b)),
            (AttributeValue::Text(a), AttributeValue::Text(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Integer(value as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

/// One stored entry of a collection.
///
/// Records are immutable once inserted; only the `deleted` flag changes, and
/// only through the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub deleted: bool,
}

impl Record {
    /// Create a new live record without attributes.
    pub fn new(id: u64, vector: Vec<f32>) -> Self {
        Self {
            id,
            vector,
            attributes: Attributes::new(),
            deleted: false,
        }
    }

    /// Add an attribute.
    pub fn with_attribute<K, V>(mut self, name: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Replace all attributes.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Get an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Get the dimensionality of the record's vector.
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_mixed_numeric() {
        let int = AttributeValue::Integer(50);
        let float = AttributeValue::Float(50.5);
        assert_eq!(int.compare(&float), Some(Ordering::Less));
        assert_eq!(float.compare(&int), Some(Ordering::Greater));
        assert_eq!(int.compare(&AttributeValue::Float(50.0)), Some(Ordering::Equal));
    }

    #[test]
    fn test_compare_text_and_incomparable() {
        let a = AttributeValue::from("apple");
        let b = AttributeValue::from("banana");
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(a.compare(&AttributeValue::Integer(1)), None);
        assert_eq!(AttributeValue::Float(f64::NAN).compare(&AttributeValue::Integer(1)), None);
    }

    #[test]
    fn test_attributes_deserialize_untagged() {
        let attributes: Attributes =
            serde_json::from_str(r#"{"score": 61.5, "year": 2024, "text": "hello"}"#).unwrap();
        assert_eq!(attributes["score"], AttributeValue::Float(61.5));
        assert_eq!(attributes["year"], AttributeValue::Integer(2024));
        assert_eq!(attributes["text"].as_text(), Some("hello"));
    }

    #[test]
    fn test_record_builder() {
        let record = Record::new(3, vec![1.0, 2.0])
            .with_attribute("score", 10)
            .with_attribute("text", "hi");
        assert_eq!(record.dimension(), 2);
        assert_eq!(record.attribute("score"), Some(&AttributeValue::Integer(10)));
        assert!(!record.deleted);
    }
}
