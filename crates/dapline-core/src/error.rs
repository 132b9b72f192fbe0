//! Error taxonomy for adapter resolution and launch.

use std::fmt;
use std::path::PathBuf;

use crate::configuration::schema::OptionKind;
use crate::remediation::RemediationAction;

/// Setting that users should open when the adapter path is wrong or missing.
pub const EXECUTABLE_PATH_SETTING: &str = "executable-path";

/// Where a rejected value came from. Used to point the user at the right
/// place to fix it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    LaunchConfiguration,
    Settings,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::LaunchConfiguration => f.write_str("your launch configuration"),
            ConfigSource::Settings => f.write_str("your settings"),
        }
    }
}

/// Failures while resolving a launch request into something runnable.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Debug adapter path \"{}\" is not a valid file. The path comes from {origin}.", .path.display())]
    NotExecutable { path: PathBuf, origin: ConfigSource },

    #[error("Unable to find the path to the LLDB debug adapter executable.")]
    NotFound,

    #[error("Expected {key} to be {expected}, got {found}. The value comes from {origin}.")]
    InvalidConfigurationType {
        key: String,
        expected: OptionKind,
        found: String,
        origin: ConfigSource,
    },

    #[error(
        "A debugAdapterPort must be provided when debugAdapterHostname is set. \
         Please update your launch configuration."
    )]
    IncompleteEndpoint,

    #[error(
        "The debugAdapterPort property is incompatible with debugAdapterExecutable and \
         debugAdapterArgs. Please update your launch configuration."
    )]
    ConflictingLaunchMode,

    #[error(transparent)]
    ServerStartFailure(#[from] ServerStartError),

    #[error("Unsupported launch request: {0}")]
    UnsupportedLaunchRequest(String),

    #[error("failed to query {} for server mode support: {message}", .path.display())]
    Probe { path: PathBuf, message: String },
}

impl LaunchError {
    /// Remediation actions offered alongside this error, in display order.
    ///
    /// An empty list means the error is not user-fixable through settings or
    /// the launch configuration and should propagate as-is.
    pub fn remediation(&self) -> Vec<RemediationAction> {
        match self {
            LaunchError::NotExecutable {
                origin: ConfigSource::LaunchConfiguration,
                ..
            } => vec![RemediationAction::Configure],
            LaunchError::NotExecutable {
                origin: ConfigSource::Settings,
                ..
            }
            | LaunchError::NotFound => {
                vec![RemediationAction::open_setting(EXECUTABLE_PATH_SETTING)]
            }
            LaunchError::InvalidConfigurationType {
                key,
                origin: ConfigSource::Settings,
                ..
            } => vec![RemediationAction::open_setting(format!("options.{key}"))],
            LaunchError::InvalidConfigurationType {
                origin: ConfigSource::LaunchConfiguration,
                ..
            }
            | LaunchError::IncompleteEndpoint
            | LaunchError::ConflictingLaunchMode => vec![RemediationAction::Configure],
            LaunchError::ServerStartFailure(_)
            | LaunchError::UnsupportedLaunchRequest(_)
            | LaunchError::Probe { .. } => Vec::new(),
        }
    }

    /// Whether the error carries at least one remediation action.
    pub fn is_remediable(&self) -> bool {
        !self.remediation().is_empty()
    }
}

/// Failures starting the shared adapter server.
///
/// `Clone` because a single failure is delivered to every caller awaiting
/// the same pending start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerStartError {
    #[error("failed to spawn debug adapter server '{command}': {message}")]
    Spawn { command: String, message: String },

    #[error("Server process exited early{}", describe_exit(.code, .signal))]
    ExitedEarly {
        code: Option<i32>,
        signal: Option<i32>,
    },

    #[error("error while supervising the server process: {0}")]
    Process(String),

    #[error("the server was stopped before it announced a connection")]
    Stopped,
}

fn describe_exit(code: &Option<i32>, signal: &Option<i32>) -> String {
    match (code, signal) {
        (Some(code), _) => format!(" with code {code}"),
        (None, Some(signal)) => format!(" due to signal {signal}"),
        (None, None) => String::new(),
    }
}
