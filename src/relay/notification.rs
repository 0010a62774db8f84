//! Notification Types
//!
//! A notification is what the platform broadcasts: a topic plus a bag of named
//! fields. The relay only ever inspects one string field of it.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Value stored under a notification field.
///
/// Serialised untagged, so a JSON line carries plain values. Anything that is
/// not one of the typed kinds (null, objects, mixed arrays) lands in `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Other(serde_json::Value),
}

impl FieldValue {
    /// Borrow the value as a string, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::String(_) => "string",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Other(_) => "other",
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(value)
    }
}

/// Where a notification was sent from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Sent by this process
    #[default]
    Local,
    /// Sent by another process, identified by its package or process name
    External(String),
}

impl Origin {
    pub fn is_local(&self) -> bool {
        matches!(self, Origin::Local)
    }
}

/// A broadcast notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub topic: String,
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
    #[serde(default)]
    pub origin: Origin,
}

impl Notification {
    pub fn new<S: Into<String>>(topic: S) -> Self {
        Self {
            topic: topic.into(),
            fields: HashMap::new(),
            origin: Origin::Local,
        }
    }

    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Mark the notification as sent by another process
    pub fn from_external<S: Into<String>>(mut self, sender: S) -> Self {
        self.origin = Origin::External(sender.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Look up a field holding a string; other value kinds count as absent
    pub fn string_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(FieldValue::as_str)
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self
            .fields
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v.kind()))
            .collect();
        keys.sort();
        write!(f, "{} [{}]", self.topic, keys.join(", "))?;
        if let Origin::External(sender) = &self.origin {
            write!(f, " from {}", sender)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_field_ignores_other_kinds() {
        let notification = Notification::new("com.scanner.BARCODE")
            .with_field("barcode", "4006381333931")
            .with_field("length", 13i64)
            .with_field("raw", vec![0x34u8, 0x30]);

        assert_eq!(notification.string_field("barcode"), Some("4006381333931"));
        assert_eq!(notification.string_field("length"), None);
        assert_eq!(notification.string_field("raw"), None);
        assert_eq!(notification.string_field("missing"), None);
    }

    #[test]
    fn test_deserialize_json_line() {
        let line = r#"{"topic":"com.scanner.BARCODE","fields":{"barcode":"X123","count":2,"ok":true}}"#;
        let notification: Notification = serde_json::from_str(line).unwrap();

        assert_eq!(notification.topic, "com.scanner.BARCODE");
        assert_eq!(notification.string_field("barcode"), Some("X123"));
        assert_eq!(notification.field("count"), Some(&FieldValue::Integer(2)));
        assert_eq!(notification.field("ok"), Some(&FieldValue::Boolean(true)));
        assert!(notification.origin.is_local());
    }

    #[test]
    fn test_unrelated_untyped_fields_are_kept() {
        let line = r#"{"topic":"com.scanner.BARCODE","fields":{"barcode":"X123","scanner_id":null,"meta":{"a":1},"tags":["x",2]}}"#;
        let notification: Notification = serde_json::from_str(line).unwrap();

        assert_eq!(notification.string_field("barcode"), Some("X123"));
        assert_eq!(
            notification.field("scanner_id"),
            Some(&FieldValue::Other(serde_json::Value::Null))
        );
        assert_eq!(
            notification.field("meta"),
            Some(&FieldValue::Other(serde_json::json!({"a": 1})))
        );
        assert_eq!(notification.string_field("tags"), None);
    }

    #[test]
    fn test_untyped_payload_field_counts_as_absent() {
        let line = r#"{"topic":"com.scanner.BARCODE","fields":{"barcode":{"value":"X123"}}}"#;
        let notification: Notification = serde_json::from_str(line).unwrap();

        assert_eq!(notification.string_field("barcode"), None);
        assert_eq!(notification.to_string(), "com.scanner.BARCODE [barcode:other]");
    }

    #[test]
    fn test_deserialize_external_origin() {
        let line = r#"{"topic":"t","origin":{"external":"com.example.spoof"}}"#;
        let notification: Notification = serde_json::from_str(line).unwrap();

        assert!(notification.fields.is_empty());
        assert_eq!(
            notification.origin,
            Origin::External("com.example.spoof".to_string())
        );
    }

    #[test]
    fn test_display_lists_field_kinds() {
        let notification = Notification::new("t")
            .with_field("b", true)
            .with_field("a", "x")
            .from_external("pkg");

        assert_eq!(notification.to_string(), "t [a:string, b:boolean] from pkg");
    }
}
