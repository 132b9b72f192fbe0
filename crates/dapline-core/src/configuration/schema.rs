//! Recognized debugger option keys with their types and documented defaults.

use std::fmt;

use serde_json::Value;

pub const ADAPTER_EXECUTABLE_KEY: &str = "debugAdapterExecutable";
pub const ADAPTER_ARGS_KEY: &str = "debugAdapterArgs";
pub const ADAPTER_HOSTNAME_KEY: &str = "debugAdapterHostname";
pub const ADAPTER_PORT_KEY: &str = "debugAdapterPort";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    String,
    Number,
    Boolean,
    StringArray,
}

impl OptionKind {
    /// Whether `value` has this kind.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            OptionKind::String => value.is_string(),
            OptionKind::Number => value.is_number(),
            OptionKind::Boolean => value.is_boolean(),
            OptionKind::StringArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptionKind::String => "a string",
            OptionKind::Number => "a number",
            OptionKind::Boolean => "a boolean",
            OptionKind::StringArray => "an array of strings",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionDefault {
    String(&'static str),
    Number(f64),
    Boolean(bool),
    EmptyArray,
}

impl OptionDefault {
    /// Whether `value` equals this default.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (OptionDefault::String(d), Value::String(s)) => d == s,
            (OptionDefault::Number(d), Value::Number(n)) => n.as_f64() == Some(*d),
            (OptionDefault::Boolean(d), Value::Bool(b)) => d == b,
            (OptionDefault::EmptyArray, Value::Array(items)) => items.is_empty(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionSpec {
    pub key: &'static str,
    pub kind: OptionKind,
    pub default: OptionDefault,
}

const fn spec(key: &'static str, kind: OptionKind, default: OptionDefault) -> OptionSpec {
    OptionSpec { key, kind, default }
}

/// Every debugger option that settings may supply.
pub const OPTION_SCHEMA: &[OptionSpec] = &[
    // Debugger behavior.
    spec("commandEscapePrefix", OptionKind::String, OptionDefault::String("`")),
    spec("customFrameFormat", OptionKind::String, OptionDefault::String("")),
    spec("customThreadFormat", OptionKind::String, OptionDefault::String("")),
    spec("detachOnError", OptionKind::Boolean, OptionDefault::Boolean(false)),
    spec("disableASLR", OptionKind::Boolean, OptionDefault::Boolean(true)),
    spec("disableSTDIO", OptionKind::Boolean, OptionDefault::Boolean(false)),
    spec("displayExtendedBacktrace", OptionKind::Boolean, OptionDefault::Boolean(false)),
    spec("enableAutoVariableSummaries", OptionKind::Boolean, OptionDefault::Boolean(false)),
    spec("enableSyntheticChildDebugging", OptionKind::Boolean, OptionDefault::Boolean(false)),
    spec("timeout", OptionKind::Number, OptionDefault::Number(30.0)),
    // Platform and target.
    spec("platformName", OptionKind::String, OptionDefault::String("")),
    spec("targetTriple", OptionKind::String, OptionDefault::String("")),
    // Command hooks.
    spec("initCommands", OptionKind::StringArray, OptionDefault::EmptyArray),
    spec("preRunCommands", OptionKind::StringArray, OptionDefault::EmptyArray),
    spec("postRunCommands", OptionKind::StringArray, OptionDefault::EmptyArray),
    spec("stopCommands", OptionKind::StringArray, OptionDefault::EmptyArray),
    spec("exitCommands", OptionKind::StringArray, OptionDefault::EmptyArray),
    spec("terminateCommands", OptionKind::StringArray, OptionDefault::EmptyArray),
];

pub fn lookup(key: &str) -> Option<&'static OptionSpec> {
    OPTION_SCHEMA.iter().find(|spec| spec.key == key)
}

/// Short rendering of a JSON value for type-mismatch messages.
pub(crate) fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{s:?}"),
        other => other.to_string(),
    }
}
