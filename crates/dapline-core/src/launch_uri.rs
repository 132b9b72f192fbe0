//! Deep-link launch requests.
//!
//! A URI such as
//! `vscode://llvm-vs-code-extensions.lldb-dap/start?program=/bin/ls&args=-l&args=/tmp`
//! describes a debug configuration in its query string. The optional
//! `config` parameter carries a whole JSON configuration; the individual
//! parameters below are applied on top of it.

use serde_json::{Map, Value};
use url::Url;

use crate::configuration::DebugConfiguration;
use crate::error::LaunchError;

const START_PATH: &str = "/start";
const CONFIG_PARAM: &str = "config";
const ADAPTER_TYPE: &str = "lldb-dap";

const STRING_KEYS: &[&str] = &["name", "request", "program", "cwd", "debuggerRoot"];
const NUMBER_KEYS: &[&str] = &["pid"];
const ARRAY_KEYS: &[&str] = &[
    "args",
    "initCommands",
    "preRunCommands",
    "stopCommands",
    "exitCommands",
    "terminateCommands",
    "launchCommands",
    "attachCommands",
];

/// Build a debug configuration from a deep-link URI.
pub fn parse_launch_uri(uri: &str) -> Result<DebugConfiguration, LaunchError> {
    let url = Url::parse(uri).map_err(|e| unsupported(format!("invalid URI: {e}")))?;
    if url.path() != START_PATH {
        return Err(unsupported(format!("Unsupported Uri path: {}", url.path())));
    }

    let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let first = |key: &str| {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };

    let mut config = Map::new();
    config.insert("type".into(), ADAPTER_TYPE.into());
    config.insert("request".into(), "launch".into());
    config.insert("name".into(), "".into());

    if let Some(json) = first(CONFIG_PARAM) {
        let overrides: Map<String, Value> = serde_json::from_str(json)
            .map_err(|e| unsupported(format!("invalid config parameter: {e}")))?;
        config.extend(overrides);
    }

    for &key in STRING_KEYS {
        if let Some(value) = first(key).filter(|v| !v.is_empty()) {
            config.insert(key.into(), value.into());
        }
    }

    for &key in NUMBER_KEYS {
        if let Some(value) = first(key).filter(|v| !v.is_empty()) {
            let number: i64 = value
                .trim()
                .parse()
                .map_err(|_| unsupported(format!("{key} must be a number, got {value:?}")))?;
            config.insert(key.into(), number.into());
        }
    }

    for &key in ARRAY_KEYS {
        let values: Vec<Value> = params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| Value::from(v.as_str()))
            .collect();
        if !values.is_empty() {
            config.insert(key.into(), Value::Array(values));
        }
    }

    let mut unknown: Vec<&str> = Vec::new();
    for (key, _) in &params {
        let known = key == CONFIG_PARAM
            || STRING_KEYS.contains(&key.as_str())
            || NUMBER_KEYS.contains(&key.as_str())
            || ARRAY_KEYS.contains(&key.as_str());
        if !known && !unknown.contains(&key.as_str()) {
            unknown.push(key.as_str());
        }
    }
    if !unknown.is_empty() {
        return Err(unsupported(format!(
            "Unsupported URL parameters: {}",
            unknown.join(", ")
        )));
    }

    if !config.get("name").is_some_and(truthy) {
        let name = match config.get("program").filter(|v| truthy(v)) {
            Some(program) => program.clone(),
            None if config.get("request").and_then(Value::as_str) == Some("launch") => {
                "URL-based Launch".into()
            }
            None => "URL-based Attach".into(),
        };
        config.insert("name".into(), name);
    }

    let kind = config
        .get("type")
        .map_or_else(|| "undefined".to_string(), render);
    if kind != ADAPTER_TYPE {
        return Err(unsupported(format!("Unsupported debugger type: {kind}")));
    }
    Ok(config.into())
}

fn unsupported(message: String) -> LaunchError {
    LaunchError::UnsupportedLaunchRequest(message)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
