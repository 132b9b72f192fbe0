//! Locating the `lldb-dap` binary.
//!
//! Resolution order:
//! 1. Path from the launch request (`debugAdapterExecutable`)
//! 2. Path from settings (`executable-path`)
//! 3. Platform search: `xcrun -find` on macOS, then every `PATH` entry
//!
//! Explicit paths must be executable or resolution fails outright; searched
//! candidates that are not executable are skipped.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{ConfigSource, LaunchError};

/// File name of the adapter on this platform.
#[cfg(windows)]
pub const ADAPTER_FILE_NAME: &str = "lldb-dap.exe";
#[cfg(not(windows))]
pub const ADAPTER_FILE_NAME: &str = "lldb-dap";

const XCRUN: &str = "/usr/bin/xcrun";

/// Finds and validates the adapter executable.
#[derive(Debug, Clone)]
pub struct AdapterLocator {
    /// Directory list to scan, in `PATH` syntax. `None` disables the scan.
    search_path: Option<OsString>,
    /// Ask the Xcode toolchain locator before scanning.
    use_xcrun: bool,
}

impl AdapterLocator {
    /// Locator using this process's `PATH`, and `xcrun` on macOS.
    pub fn from_env() -> Self {
        Self {
            search_path: std::env::var_os("PATH"),
            use_xcrun: cfg!(target_os = "macos"),
        }
    }

    /// Locator scanning only the given `PATH`-style directory list.
    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
            use_xcrun: false,
        }
    }

    /// Resolve the adapter binary.
    ///
    /// Empty explicit paths count as absent.
    pub async fn resolve(
        &self,
        launch_path: Option<&str>,
        settings_path: Option<&Path>,
    ) -> Result<PathBuf, LaunchError> {
        if let Some(path) = launch_path.filter(|p| !p.is_empty()) {
            return validated(PathBuf::from(path), ConfigSource::LaunchConfiguration);
        }

        if let Some(path) = settings_path.filter(|p| !p.as_os_str().is_empty()) {
            return validated(path.to_path_buf(), ConfigSource::Settings);
        }

        match self.search().await {
            Some(path) => {
                info!(path = %path.display(), "found debug adapter");
                Ok(path)
            }
            None => Err(LaunchError::NotFound),
        }
    }

    /// Platform search for the adapter, returning the first executable hit.
    pub async fn search(&self) -> Option<PathBuf> {
        if self.use_xcrun {
            if let Some(path) = find_with_xcrun(ADAPTER_FILE_NAME).await {
                if is_executable(&path) {
                    return Some(path);
                }
                warn!(path = %path.display(), "xcrun reported a debug adapter that is not executable");
            }
        }

        let search_path = self.search_path.as_ref()?;
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        match which::which_in(ADAPTER_FILE_NAME, Some(search_path), cwd) {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(file_name = ADAPTER_FILE_NAME, error = %e, "debug adapter not found in search path");
                None
            }
        }
    }
}

impl Default for AdapterLocator {
    fn default() -> Self {
        Self::from_env()
    }
}

fn validated(path: PathBuf, origin: ConfigSource) -> Result<PathBuf, LaunchError> {
    if is_executable(&path) {
        debug!(path = %path.display(), ?origin, "using configured debug adapter");
        Ok(path)
    } else {
        Err(LaunchError::NotExecutable { path, origin })
    }
}

/// Whether `path` is a regular file the current user may execute.
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}

async fn find_with_xcrun(file_name: &str) -> Option<PathBuf> {
    let output = Command::new(XCRUN)
        .arg("-find")
        .arg(file_name)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let found = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    (!found.is_empty()).then(|| PathBuf::from(found))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[tokio::test]
    async fn launch_path_wins_over_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let launch = write_file(tmp.path(), "from-launch", 0o755);
        let settings = write_file(tmp.path(), "from-settings", 0o755);

        let locator = AdapterLocator::with_search_path("");
        let found = locator
            .resolve(launch.to_str(), Some(&settings))
            .await
            .unwrap();
        assert_eq!(found, launch);
    }

    #[tokio::test]
    async fn non_executable_launch_path_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let launch = write_file(tmp.path(), "lldb-dap", 0o644);
        // A valid adapter on the search path must not rescue a bad explicit path.
        let bin = tmp.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        write_file(&bin, ADAPTER_FILE_NAME, 0o755);

        let locator = AdapterLocator::with_search_path(bin.as_os_str());
        let err = locator.resolve(launch.to_str(), None).await.unwrap_err();
        assert!(matches!(
            err,
            LaunchError::NotExecutable {
                origin: ConfigSource::LaunchConfiguration,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_settings_path_is_attributed_to_settings() {
        let locator = AdapterLocator::with_search_path("");
        let err = locator
            .resolve(None, Some(Path::new("/nonexistent/lldb-dap")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LaunchError::NotExecutable {
                origin: ConfigSource::Settings,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn empty_paths_fall_through_to_search() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        std::fs::create_dir(&first).unwrap();
        std::fs::create_dir(&second).unwrap();
        // Non-executable candidate in the first directory is skipped.
        write_file(&first, ADAPTER_FILE_NAME, 0o644);
        let expected = write_file(&second, ADAPTER_FILE_NAME, 0o755);

        let search = std::env::join_paths([&first, &second]).unwrap();
        let locator = AdapterLocator::with_search_path(search);
        let found = locator
            .resolve(Some(""), Some(Path::new("")))
            .await
            .unwrap();
        assert_eq!(found, expected);
    }

    #[tokio::test]
    async fn nothing_found_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let locator = AdapterLocator::with_search_path(tmp.path().as_os_str());
        let err = locator.resolve(None, None).await.unwrap_err();
        assert!(matches!(err, LaunchError::NotFound));
    }

    #[test]
    fn directories_are_not_executable() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!is_executable(tmp.path()));
        assert!(!is_executable(&tmp.path().join("missing")));
    }
}
