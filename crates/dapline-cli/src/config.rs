//! Settings file management for dapline.
//!
//! Provides a TOML settings file at `~/.config/dapline/settings.toml` and a
//! resolution chain: CLI flag > env var > settings file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use dapline_core::DapSettings;

/// Overrides the settings file location.
pub const CONFIG_ENV: &str = "DAPLINE_CONFIG";
/// Overrides `executable-path`.
pub const ADAPTER_PATH_ENV: &str = "DAPLINE_ADAPTER_PATH";
/// Overrides `server-mode`.
pub const SERVER_MODE_ENV: &str = "DAPLINE_SERVER_MODE";

const SETTINGS_HEADER: &str = "\
# dapline settings.
#
# executable-path = \"/usr/bin/lldb-dap\"
# arguments = []
# server-mode = false
# log-path = \"/tmp/lldb-dap.log\"
#
# [environment]
# LLDB_USE_NATIVE_PDB_READER = \"1\"
#
# [options]
# timeout = 30
# initCommands = []
";

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the dapline config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/dapline` or `~/.config/dapline`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("dapline");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("dapline")
}

/// Settings file location: `cli_path` > `DAPLINE_CONFIG` > default.
pub fn settings_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    config_dir().join("settings.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the settings file. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<DapSettings> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(DapSettings::default());
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read settings file at {}", path.display()));
        }
    };
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse settings file at {}", path.display()))
}

/// Serialize and write the settings file, creating parent dirs as needed.
pub fn save_settings(path: &Path, settings: &DapSettings) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let body = toml::to_string_pretty(settings).context("failed to serialize settings")?;
    let contents = format!("{SETTINGS_HEADER}\n{body}");
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write settings file at {}", path.display()))?;
    Ok(())
}

// -----------------------------------------------------------------------
// Resolved settings
// -----------------------------------------------------------------------

/// Settings after applying flag and environment overrides.
#[derive(Debug)]
pub struct ResolvedSettings {
    pub path: PathBuf,
    pub settings: DapSettings,
}

impl ResolvedSettings {
    /// Resolve using the chain: CLI flag > env var > settings file > default.
    ///
    /// - Adapter path: `cli_adapter` > `DAPLINE_ADAPTER_PATH` > `executable-path` > search
    /// - Server mode: `cli_server_mode` > `DAPLINE_SERVER_MODE` > `server-mode` > `false`
    pub fn resolve(
        cli_config: Option<&Path>,
        cli_adapter: Option<&Path>,
        cli_server_mode: Option<bool>,
    ) -> Result<Self> {
        let path = settings_path(cli_config);
        let mut settings = load_settings(&path)?;

        if let Some(adapter) = cli_adapter {
            settings.executable_path = Some(adapter.to_path_buf());
        } else if let Some(adapter) = std::env::var_os(ADAPTER_PATH_ENV).filter(|p| !p.is_empty()) {
            settings.executable_path = Some(PathBuf::from(adapter));
        }

        if let Some(server_mode) = cli_server_mode {
            settings.server_mode = server_mode;
        } else if let Ok(raw) = std::env::var(SERVER_MODE_ENV) {
            settings.server_mode = parse_bool(&raw)
                .with_context(|| format!("{SERVER_MODE_ENV} is not a valid boolean"))?;
        }

        Ok(Self { path, settings })
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("expected true or false, got {other:?}"),
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
