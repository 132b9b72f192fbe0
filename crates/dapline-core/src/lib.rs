//! Brokers the lifecycle of an `lldb-dap` debug adapter and its sessions.
//!
//! The crate is split along the three stateful concerns plus their leaves:
//!
//! ```text
//! launch request
//!     |
//!     v
//! ConfigurationResolver --merge--> settings schema
//!     |        |
//!     |        +--locate--> AdapterLocator (launch path > settings > search)
//!     |        |
//!     |        +--start---> ServerManager (Idle -> Starting -> Running)
//!     v
//! AdapterLaunch::{Executable, Server}
//!
//! protocol messages --> SessionTracker --> per-session module tables
//! ```

pub mod configuration;
pub mod error;
pub mod executable;
pub mod launch_uri;
pub mod remediation;
pub mod server;
pub mod settings;
pub mod tracker;

pub use configuration::{
    AdapterExecutable, AdapterLaunch, ConfigurationResolver, DebugConfiguration, Resolution,
    ResolvedConfiguration, SpawnOptions,
};
pub use error::{ConfigSource, LaunchError, ServerStartError};
pub use executable::AdapterLocator;
pub use remediation::{Notifier, RemediableError, RemediationAction, RemediationOutcome};
pub use server::{RestartDecision, RestartPrompt, ServerEndpoint, ServerManager, ServerStatus};
pub use settings::DapSettings;
pub use tracker::{ModuleRecord, ModulesChanged, SessionId, SessionTracker};
