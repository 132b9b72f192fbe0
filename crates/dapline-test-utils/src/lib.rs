//! Shared test utilities for dapline integration tests.
//!
//! Provides fake `lldb-dap` executables: small shell scripts written into a
//! temporary directory. Each fake answers `--help` like the real adapter and
//! appends the arguments of every other invocation to a spawn log, so tests
//! can count how many processes were actually started.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Help text of an adapter that supports server mode.
pub const SERVER_HELP: &str = "  --connection <uri>  Communicate with the client over a socket";
/// Help text of an adapter without server mode.
pub const PLAIN_HELP: &str = "  --repl-mode <mode>  Default evaluation mode";

/// A fake adapter script and its spawn log. Both are removed on drop.
pub struct FakeAdapter {
    _dir: TempDir,
    path: PathBuf,
    spawn_log: PathBuf,
}

impl FakeAdapter {
    /// Server-mode adapter that announces `connection://[127.0.0.1]:port`
    /// and then stays alive.
    pub fn server(port: u16) -> Self {
        Self::delayed_server(port, 0.0)
    }

    /// Like [`FakeAdapter::server`], waiting `delay_secs` before announcing.
    pub fn delayed_server(port: u16, delay_secs: f32) -> Self {
        Self::write(
            SERVER_HELP,
            &format!(
                "sleep {delay_secs}\n\
                 echo \"lldb-dap server starting\"\n\
                 echo \"Listening for: connection://[127.0.0.1]:{port}\"\n\
                 exec sleep 30\n"
            ),
        )
    }

    /// Server-mode adapter that fails before announcing anything.
    pub fn exits_early(code: i32) -> Self {
        Self::write(
            SERVER_HELP,
            &format!("echo \"error: failed to bind\" >&2\nexit {code}\n"),
        )
    }

    /// Server-mode adapter that announces `port` and exits straight away
    /// with status 0.
    pub fn announces_then_exits(port: u16) -> Self {
        Self::write(
            SERVER_HELP,
            &format!("echo \"connection://[127.0.0.1]:{port}\"\nexit 0\n"),
        )
    }

    /// Server-mode adapter that announces `first`, then `second` in a later
    /// write, and stays alive.
    pub fn announces_twice(first: u16, second: u16) -> Self {
        Self::write(
            SERVER_HELP,
            &format!(
                "echo \"connection://[127.0.0.1]:{first}\"\n\
                 sleep 0.2\n\
                 echo \"connection://[127.0.0.1]:{second}\"\n\
                 exec sleep 30\n"
            ),
        )
    }

    /// Server-mode adapter that writes its announcement in two pieces.
    pub fn split_announcement(port: u16) -> Self {
        Self::write(
            SERVER_HELP,
            &format!(
                "printf 'Listening for: connection://[127.0.0.1]:'\n\
                 sleep 0.2\n\
                 printf '{port}\\n'\n\
                 exec sleep 30\n"
            ),
        )
    }

    /// Adapter without server-mode support. Runs briefly and exits.
    pub fn plain() -> Self {
        Self::write(PLAIN_HELP, "exit 0\n")
    }

    fn write(help: &str, body: &str) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir for fake adapter");
        let path = dir.path().join("lldb-dap");
        let spawn_log = dir.path().join("spawns.log");

        let script = format!(
            "#!/bin/sh\n\
             if [ \"$1\" = \"--help\" ]; then\n\
             echo \"USAGE: lldb-dap [options]\"\n\
             echo \"{help}\"\n\
             exit 0\n\
             fi\n\
             echo \"$*\" >> \"{log}\"\n\
             {body}",
            log = spawn_log.display(),
        );
        fs::write(&path, script).expect("failed to write fake adapter");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("failed to make fake adapter executable");

        Self {
            _dir: dir,
            path,
            spawn_log,
        }
    }

    /// Path of the executable script.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Argument lines of every non-`--help` invocation so far.
    pub fn spawns(&self) -> Vec<String> {
        fs::read_to_string(&self.spawn_log)
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn spawn_count(&self) -> usize {
        self.spawns().len()
    }
}

/// Write a non-executable file named like the adapter.
pub fn non_executable_adapter(dir: &Path) -> PathBuf {
    let path = dir.join("lldb-dap");
    fs::write(&path, "#!/bin/sh\nexit 0\n").expect("failed to write file");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644))
        .expect("failed to set permissions");
    path
}
