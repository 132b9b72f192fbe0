//! Launch configurations and their resolution into something runnable.

pub mod merge;
pub mod resolver;
pub mod schema;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::server::ServerEndpoint;

pub use merge::{LaunchMode, check_launch_mode, merge_settings};
pub use resolver::{ConfigurationResolver, Resolution};

/// One requested debug session: option name to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebugConfiguration(Map<String, Value>);

impl DebugConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

}

impl From<Map<String, Value>> for DebugConfiguration {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<DebugConfiguration> for Value {
    fn from(config: DebugConfiguration) -> Self {
        Value::Object(config.0)
    }
}

/// Environment and working directory for a locally spawned adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnOptions {
    pub env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

/// A fully specified adapter command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterExecutable {
    pub command: PathBuf,
    pub args: Vec<String>,
    pub options: SpawnOptions,
}

/// How the front-end should reach the adapter for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdapterLaunch {
    /// Spawn a dedicated adapter process.
    Executable(AdapterExecutable),
    /// Connect to an adapter already listening on the network.
    Server(ServerEndpoint),
}

/// A validated configuration and the launch it implies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfiguration {
    pub configuration: DebugConfiguration,
    pub launch: AdapterLaunch,
}
