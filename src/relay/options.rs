//! Listen Options
//!
//! Options arrive from the embedding side as a loosely typed argument map.
//! Anything that is not a string under a recognised key is ignored and the
//! built-in default is used instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::relay::notification::Notification;

/// Topic of barcode broadcasts when no filter key is given
pub const DEFAULT_FILTER_KEY: &str = "com.scanner.BARCODE";

/// Field holding the scanned code when no payload field is given
pub const DEFAULT_PAYLOAD_FIELD: &str = "barcode";

const FILTER_KEY_ARGS: &[&str] = &["filterKey", "action"];
const PAYLOAD_FIELD_ARGS: &[&str] = &["payloadField", "extraKey"];

/// Partially specified options supplied when a listener attaches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenArgs {
    pub filter_key: Option<String>,
    pub payload_field: Option<String>,
}

impl ListenArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_key<S: Into<String>>(mut self, key: S) -> Self {
        self.filter_key = Some(key.into());
        self
    }

    pub fn payload_field<S: Into<String>>(mut self, field: S) -> Self {
        self.payload_field = Some(field.into());
        self
    }

    /// Read listen arguments from an untyped argument map.
    ///
    /// `filterKey`/`payloadField` take precedence over the older `action`/`extraKey`
    /// spellings. Non-object arguments yield empty args.
    pub fn from_value(arguments: &Value) -> Self {
        let Some(map) = arguments.as_object() else {
            return Self::default();
        };

        let lookup = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| map.get(*name).and_then(Value::as_str))
                .map(str::to_string)
        };

        Self {
            filter_key: lookup(FILTER_KEY_ARGS),
            payload_field: lookup(PAYLOAD_FIELD_ARGS),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        if let Some(key) = &self.filter_key {
            map.insert("filterKey".to_string(), Value::String(key.clone()));
        }
        if let Some(field) = &self.payload_field {
            map.insert("payloadField".to_string(), Value::String(field.clone()));
        }
        Value::Object(map)
    }
}

/// Fully resolved options of an active subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayOptions {
    pub filter_key: String,
    pub payload_field: String,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            filter_key: DEFAULT_FILTER_KEY.to_string(),
            payload_field: DEFAULT_PAYLOAD_FIELD.to_string(),
        }
    }
}

/// Outcome of inspecting one notification against the options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction<'a> {
    Value(&'a str),
    TopicMismatch,
    MissingField,
}

impl RelayOptions {
    /// Fill unset args from the built-in defaults
    pub fn resolve(args: Option<&ListenArgs>) -> Self {
        let defaults = Self::default();
        match args {
            Some(args) => Self {
                filter_key: args.filter_key.clone().unwrap_or(defaults.filter_key),
                payload_field: args.payload_field.clone().unwrap_or(defaults.payload_field),
            },
            None => defaults,
        }
    }

    /// Apply the topic check and field lookup. The value is returned untouched.
    pub fn extract<'a>(&self, notification: &'a Notification) -> Extraction<'a> {
        if notification.topic != self.filter_key {
            return Extraction::TopicMismatch;
        }
        match notification.string_field(&self.payload_field) {
            Some(value) => Extraction::Value(value),
            None => Extraction::MissingField,
        }
    }
}
