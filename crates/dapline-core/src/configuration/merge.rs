//! Layering settings under a launch configuration and checking launch-mode keys.

use serde_json::Value;
use tracing::{debug, warn};

use super::DebugConfiguration;
use super::schema::{
    ADAPTER_ARGS_KEY, ADAPTER_EXECUTABLE_KEY, ADAPTER_HOSTNAME_KEY, ADAPTER_PORT_KEY, OPTION_SCHEMA,
    OptionKind, describe_value, lookup,
};
use crate::error::{ConfigSource, LaunchError};
use crate::server::ServerEndpoint;
use crate::settings::DapSettings;

/// Host used when a port is given without a hostname.
pub const DEFAULT_HOSTNAME: &str = "localhost";

/// Fill recognized options missing from `config` with non-default settings.
///
/// Keys already present in `config` are never touched. Every candidate is
/// type-checked before anything is copied, so a mismatch leaves `config`
/// unchanged.
pub fn merge_settings(
    config: &mut DebugConfiguration,
    settings: &DapSettings,
) -> Result<(), LaunchError> {
    for key in settings.options.keys() {
        if lookup(key).is_none() {
            warn!(key = %key, "ignoring unrecognized debugger option in settings");
        }
    }

    let mut inherited = Vec::new();
    for spec in OPTION_SCHEMA {
        if config.contains_key(spec.key) {
            continue;
        }
        let Some(value) = settings.options.get(spec.key) else {
            continue;
        };
        if spec.default.matches(value) {
            continue;
        }
        if !spec.kind.accepts(value) {
            return Err(LaunchError::InvalidConfigurationType {
                key: spec.key.to_string(),
                expected: spec.kind,
                found: describe_value(value),
                origin: ConfigSource::Settings,
            });
        }
        inherited.push((spec.key, value.clone()));
    }

    for (key, value) in inherited {
        debug!(key, "inherited debugger option from settings");
        config.insert(key, value);
    }
    Ok(())
}

/// The launch mode a configuration asks for, before any server substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchMode {
    /// Spawn locally. Either field may be absent and is then filled from
    /// settings or discovery.
    Local {
        executable: Option<String>,
        args: Option<Vec<String>>,
    },
    /// Connect to an adapter the user is already running.
    Connect(ServerEndpoint),
}

/// Enforce the mutual exclusion between network and local launch keys.
pub fn check_launch_mode(config: &DebugConfiguration) -> Result<LaunchMode, LaunchError> {
    let has_hostname = config.contains_key(ADAPTER_HOSTNAME_KEY);
    let has_port = config.contains_key(ADAPTER_PORT_KEY);

    if has_hostname && !has_port {
        return Err(LaunchError::IncompleteEndpoint);
    }

    if has_port {
        if config.contains_key(ADAPTER_EXECUTABLE_KEY) || config.contains_key(ADAPTER_ARGS_KEY) {
            return Err(LaunchError::ConflictingLaunchMode);
        }
        let host = match config.get(ADAPTER_HOSTNAME_KEY) {
            None => DEFAULT_HOSTNAME.to_string(),
            Some(Value::String(host)) => host.clone(),
            Some(other) => return Err(mistyped(ADAPTER_HOSTNAME_KEY, OptionKind::String, other)),
        };
        let port = config.get(ADAPTER_PORT_KEY).unwrap_or(&Value::Null);
        let port = port
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| mistyped(ADAPTER_PORT_KEY, OptionKind::Number, port))?;
        return Ok(LaunchMode::Connect(ServerEndpoint { host, port }));
    }

    let executable = match config.get(ADAPTER_EXECUTABLE_KEY) {
        None => None,
        Some(Value::String(path)) => Some(path.clone()),
        Some(other) => return Err(mistyped(ADAPTER_EXECUTABLE_KEY, OptionKind::String, other)),
    };
    let args = config
        .get(ADAPTER_ARGS_KEY)
        .map(|value| string_array(value).ok_or_else(|| mistyped(ADAPTER_ARGS_KEY, OptionKind::StringArray, value)))
        .transpose()?;

    Ok(LaunchMode::Local { executable, args })
}

fn string_array(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn mistyped(key: &str, expected: OptionKind, found: &Value) -> LaunchError {
    LaunchError::InvalidConfigurationType {
        key: key.to_string(),
        expected,
        found: describe_value(found),
        origin: ConfigSource::LaunchConfiguration,
    }
}
