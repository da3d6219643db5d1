//! Inbound request and outbound record types exchanged with the host pipeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque resume token for the inbound request stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a host-supplied token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value carried by a named message field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// UTF-8 string value.
    String(String),
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Integer(i64),
    /// Floating point value.
    Double(f64),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Host-facing name of the value type, used in validation messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Borrow the string value, if this is a string field.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

/// Verb carried on an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Store a new configuration.
    Add,
    /// Remove a configuration file or ticker directory.
    Delete,
    /// Return every managed configuration.
    List,
    /// Anything else, preserved verbatim.
    Unrecognized(String),
}

impl Action {
    /// Map the wire verb to an action.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "add" => Self::Add,
            "delete" => Self::Delete,
            "return" => Self::List,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// Label used for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Delete => "delete",
            Self::List => "return",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Inbound action request delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Raw action verb.
    #[serde(default)]
    pub action: String,
    /// Request payload; meaning depends on the action.
    #[serde(default)]
    pub payload: String,
    /// Named message fields.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    /// Resume token echoed on checkpoint.
    #[serde(default)]
    pub cursor: Cursor,
}

impl ActionRequest {
    /// Build a request with no fields.
    #[must_use]
    pub fn new(action: impl Into<String>, payload: impl Into<String>, cursor: Cursor) -> Self {
        Self {
            action: action.into(),
            payload: payload.into(),
            fields: BTreeMap::new(),
            cursor,
        }
    }

    /// Attach a named field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Decoded action verb.
    #[must_use]
    pub fn action(&self) -> Action {
        Action::parse(&self.action)
    }

    /// Look up a named field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Outcome reported on every outbound record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    /// The operation succeeded.
    #[default]
    #[serde(rename = "OK")]
    Ok,
    /// The operation failed; the payload explains why.
    #[serde(rename = "ERROR")]
    Error,
}

impl Status {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result record emitted to the host for each committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutboundRecord {
    /// Fresh identifier assigned at commit time.
    pub uuid: Uuid,
    /// Path of the config file the record concerns.
    pub file_name: String,
    /// Logical config name.
    pub conf_name: String,
    /// Declared config type.
    pub conf_type: String,
    /// Config category (e.g. `Input`).
    pub conf_category: String,
    /// Ticker seconds, only for interval-driven types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    /// Operation status.
    pub status: Status,
    /// Constant correlation tag.
    #[serde(rename = "CMTag")]
    pub tag: String,
    /// Accumulated batch bytes.
    pub payload: String,
}

impl OutboundRecord {
    /// Look up a header field by its host name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "FileName" => Some(&self.file_name),
            "ConfName" => Some(&self.conf_name),
            "ConfType" => Some(&self.conf_type),
            "ConfCategory" => Some(&self.conf_category),
            "Ticker" => self.ticker.as_deref(),
            "Status" => Some(self.status.as_str()),
            "CMTag" => Some(&self.tag),
            _ => None,
        }
    }
}
