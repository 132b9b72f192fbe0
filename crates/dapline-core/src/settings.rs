//! Environment-level adapter settings.
//!
//! These are consulted for anything a launch request leaves out. The CLI
//! loads them from a TOML file; the type itself is format-agnostic.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Settings shared by every launch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DapSettings {
    /// Adapter executable to use when the launch request names none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_path: Option<PathBuf>,
    /// Adapter arguments used when the launch request has no `debugAdapterArgs`.
    pub arguments: Vec<String>,
    /// Run the adapter as one shared server instead of one process per launch.
    pub server_mode: bool,
    /// Exported to the adapter as `LLDBDAP_LOG`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    /// Extra environment for the adapter process.
    pub environment: BTreeMap<String, String>,
    /// Debugger option values, keyed by launch-configuration name.
    pub options: BTreeMap<String, Value>,
}

impl DapSettings {
    /// The configured adapter path, treating an empty path as unset.
    pub fn executable_path(&self) -> Option<&Path> {
        self.executable_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Environment for a locally spawned adapter.
    ///
    /// The configured environment plus `LLDBDAP_LOG` when a log path is set;
    /// the log variable wins over an entry of the same name.
    pub fn adapter_environment(&self) -> BTreeMap<String, String> {
        let mut env = self.environment.clone();
        if let Some(log_path) = self.log_path.as_deref().filter(|p| !p.as_os_str().is_empty()) {
            env.insert(
                "LLDBDAP_LOG".to_string(),
                log_path.to_string_lossy().into_owned(),
            );
        }
        env
    }
}
