use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::LaunchError;

/// Substring of `--help` output that marks server-mode support.
pub const SERVER_MODE_MARKER: &str = "--connection";

/// Run `adapter --help` and check whether it documents server mode.
///
/// A non-zero exit still counts: only the help text matters. Failing to run
/// the binary at all is an error.
pub async fn supports_server_mode(adapter: &Path) -> Result<bool, LaunchError> {
    let output = Command::new(adapter)
        .arg("--help")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| LaunchError::Probe {
            path: adapter.to_path_buf(),
            message: e.to_string(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let supported = stdout.contains(SERVER_MODE_MARKER);
    debug!(
        adapter = %adapter.display(),
        supported,
        status = %output.status,
        "probed debug adapter for server mode"
    );
    Ok(supported)
}
