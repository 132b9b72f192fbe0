//! Terminal front-ends for restart prompts and error remediation.
//!
//! Prompts go to stderr so stdout stays machine readable.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::ValueEnum;
use tokio::io::{AsyncBufReadExt, BufReader};

use dapline_core::server::{FixedDecision, RestartRequest};
use dapline_core::{Notifier, RestartDecision, RestartPrompt};

/// What to do when the running server was started with other arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnMismatch {
    /// Ask on the terminal.
    Ask,
    Restart,
    Reuse,
    Cancel,
}

impl OnMismatch {
    pub fn prompt(self) -> Arc<dyn RestartPrompt> {
        match self {
            OnMismatch::Ask => Arc::new(TerminalPrompt),
            OnMismatch::Restart => Arc::new(FixedDecision(Some(RestartDecision::Restart))),
            OnMismatch::Reuse => Arc::new(FixedDecision(Some(RestartDecision::UseExisting))),
            OnMismatch::Cancel => Arc::new(FixedDecision(Some(RestartDecision::Cancel))),
        }
    }
}

/// Print numbered choices and read one line from stdin.
///
/// Returns `None` on an empty line, end of input or an out-of-range answer.
async fn choose(labels: &[&str]) -> Option<usize> {
    if labels.is_empty() {
        return None;
    }
    for (i, label) in labels.iter().enumerate() {
        eprintln!("  [{}] {label}", i + 1);
    }
    eprint!("Choose an option (Enter to dismiss): ");

    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    match stdin.read_line(&mut line).await {
        Ok(0) | Err(_) => return None,
        Ok(_) => {}
    }
    let n: usize = line.trim().parse().ok()?;
    (1..=labels.len()).contains(&n).then(|| n - 1)
}

pub struct TerminalPrompt;

#[async_trait]
impl RestartPrompt for TerminalPrompt {
    async fn ask(&self, request: &RestartRequest) -> Option<RestartDecision> {
        eprintln!("{}\n\n{}\n", request.message(), request.detail());
        match choose(&["Restart", "Use Existing", "Cancel"]).await? {
            0 => Some(RestartDecision::Restart),
            1 => Some(RestartDecision::UseExisting),
            _ => Some(RestartDecision::Cancel),
        }
    }
}

/// Shows errors on the terminal. "Opening settings" prints where to edit.
pub struct TerminalNotifier {
    settings_path: PathBuf,
}

impl TerminalNotifier {
    pub fn new(settings_path: PathBuf) -> Self {
        Self { settings_path }
    }
}

#[async_trait]
impl Notifier for TerminalNotifier {
    async fn show_error(&self, message: &str, _modal: bool, labels: &[&str]) -> Option<usize> {
        eprintln!("error: {message}");
        choose(labels).await
    }

    async fn open_settings(&self, setting: Option<&str>) {
        match setting {
            Some(setting) => eprintln!(
                "Edit `{setting}` in {}",
                self.settings_path.display()
            ),
            None => eprintln!("Edit {}", self.settings_path.display()),
        }
    }
}
