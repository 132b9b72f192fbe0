//! Asking whether to restart a shared server whose arguments changed.

use async_trait::async_trait;

/// Answer to a restart prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Stop the running server and start one with the new arguments.
    Restart,
    /// Keep the running server even though its arguments differ.
    UseExisting,
    /// Abandon the launch.
    Cancel,
}

/// What the user is asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartRequest {
    pub pid: Option<u32>,
    /// `[path, ...args]` of the running server.
    pub running: Vec<String>,
    /// `[path, ...args]` that would be spawned instead.
    pub requested: Vec<String>,
}

impl RestartRequest {
    pub fn message(&self) -> &'static str {
        "The arguments to lldb-dap have changed. Would you like to restart the server?"
    }

    pub fn detail(&self) -> String {
        let pid = self
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown pid".to_string());
        format!(
            "An existing lldb-dap server ({pid}) is running with different arguments.\n\n\
             The previous lldb-dap server was started with:\n\n{}\n\n\
             The new lldb-dap server will be started with:\n\n{}\n\n\
             Restarting the server will interrupt any existing debug sessions and start a new server.",
            self.running.join(" "),
            self.requested.join(" "),
        )
    }
}

/// Capability for asking the user about a restart.
#[async_trait]
pub trait RestartPrompt: Send + Sync {
    /// Returns `None` when the prompt is dismissed without an answer.
    async fn ask(&self, request: &RestartRequest) -> Option<RestartDecision>;
}

/// A prompt that always gives the same answer. Useful for non-interactive
/// front-ends and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedDecision(pub Option<RestartDecision>);

#[async_trait]
impl RestartPrompt for FixedDecision {
    async fn ask(&self, _request: &RestartRequest) -> Option<RestartDecision> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_lists_both_command_lines() {
        let request = RestartRequest {
            pid: Some(42),
            running: vec!["/bin/lldb-dap".into(), "--old".into()],
            requested: vec!["/bin/lldb-dap".into(), "--new".into()],
        };
        let detail = request.detail();
        assert!(detail.contains("(42)"));
        assert!(detail.contains("/bin/lldb-dap --old"));
        assert!(detail.contains("/bin/lldb-dap --new"));
    }

    #[tokio::test]
    async fn fixed_decision_answers_verbatim() {
        let request = RestartRequest {
            pid: None,
            running: vec![],
            requested: vec![],
        };
        assert_eq!(
            FixedDecision(Some(RestartDecision::Restart)).ask(&request).await,
            Some(RestartDecision::Restart)
        );
        assert_eq!(FixedDecision(None).ask(&request).await, None);
    }
}
