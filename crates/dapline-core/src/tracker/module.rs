//! The `module` event and the records it carries.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Module identifier. The protocol allows either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModuleId {
    Number(i64),
    String(String),
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleId::Number(n) => write!(f, "{n}"),
            ModuleId::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ModuleId {
    fn from(id: i64) -> Self {
        ModuleId::Number(id)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        ModuleId::String(id.to_string())
    }
}

/// One loaded code module as reported by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    pub id: ModuleId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_file_path: Option<String>,
}

/// A labelled detail row for a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleProperty {
    pub key: &'static str,
    pub value: String,
}

impl ModuleRecord {
    pub fn new(id: impl Into<ModuleId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            symbol_status: None,
            address_range: None,
            path: None,
            version: None,
            symbol_file_path: None,
        }
    }

    /// Detail rows shown beneath the module. Name and symbol status are left
    /// out since they label the module itself. Empty fields are skipped.
    pub fn properties(&self) -> Vec<ModuleProperty> {
        let mut rows = vec![ModuleProperty {
            key: "id:",
            value: self.id.to_string(),
        }];
        let optional = [
            ("load address:", &self.address_range),
            ("path:", &self.path),
            ("version:", &self.version),
            ("symbol filepath:", &self.symbol_file_path),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                rows.push(ModuleProperty {
                    key,
                    value: value.to_string(),
                });
            }
        }
        rows
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleReason {
    New,
    Changed,
    Removed,
    /// A reason this tracker does not know how to apply.
    Other(String),
}

impl ModuleReason {
    pub fn parse(reason: &str) -> Self {
        match reason {
            "new" => ModuleReason::New,
            "changed" => ModuleReason::Changed,
            "removed" => ModuleReason::Removed,
            other => ModuleReason::Other(other.to_string()),
        }
    }
}

/// Body of a `module` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleEvent {
    pub module: ModuleRecord,
    pub reason: String,
}

impl ModuleEvent {
    pub fn reason(&self) -> ModuleReason {
        ModuleReason::parse(&self.reason)
    }

    /// Extract the body of `message` if it is a `module` event.
    ///
    /// Returns `None` for any other message and `Some(Err(_))` for a
    /// `module` event whose body does not have the expected shape.
    pub fn from_message(message: &Value) -> Option<Result<Self, serde_json::Error>> {
        let is_module_event = message.get("type").and_then(Value::as_str) == Some("event")
            && message.get("event").and_then(Value::as_str) == Some("module");
        if !is_module_event {
            return None;
        }
        let body = message.get("body").cloned().unwrap_or(Value::Null);
        Some(serde_json::from_value(body))
    }
}
