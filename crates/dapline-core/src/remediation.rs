//! User-actionable errors.
//!
//! A [`RemediableError`] is a message plus an ordered list of
//! [`RemediationAction`]s. Presenting it through a [`Notifier`] blocks until
//! the user picks an action or dismisses the message.

use async_trait::async_trait;
use tracing::debug;

use crate::error::LaunchError;

/// Something the user can do about an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationAction {
    /// Open the settings page, optionally focused on a single setting.
    OpenSettings { setting: Option<String> },
    /// Abandon the launch and let the caller open the launch configuration.
    ///
    /// Only meaningful while a configuration is being resolved, which is why
    /// it is hidden unless [`PresentOptions::show_configure`] is set.
    Configure,
}

impl RemediationAction {
    pub fn open_setting(setting: impl Into<String>) -> Self {
        RemediationAction::OpenSettings {
            setting: Some(setting.into()),
        }
    }

    /// Button label shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            RemediationAction::OpenSettings { .. } => "Open Settings",
            RemediationAction::Configure => "Configure",
        }
    }
}

/// What happened after an error was presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationOutcome {
    /// The user dismissed the message; no action was taken.
    Dismissed,
    /// The settings page was opened.
    SettingsOpened,
    /// Abort the launch and open the launch configuration editor.
    OpenLaunchConfiguration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresentOptions {
    pub modal: bool,
    pub show_configure: bool,
}

/// Surface for showing errors to the user and performing the side effects
/// of their chosen remediation.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show `message` with one button per label.
    ///
    /// Returns the index of the chosen label, or `None` when the message was
    /// dismissed.
    async fn show_error(&self, message: &str, modal: bool, labels: &[&str]) -> Option<usize>;

    /// Open the settings page, focused on `setting` when given.
    async fn open_settings(&self, setting: Option<&str>);
}

/// An error message with the actions that can fix it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemediableError {
    message: String,
    actions: Vec<RemediationAction>,
}

impl RemediableError {
    pub fn new(message: impl Into<String>, actions: Vec<RemediationAction>) -> Self {
        Self {
            message: message.into(),
            actions,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn actions(&self) -> &[RemediationAction] {
        &self.actions
    }

    /// The actions that would be offered under `options`, in order.
    pub fn visible_actions(&self, options: PresentOptions) -> Vec<&RemediationAction> {
        self.actions
            .iter()
            .filter(|action| options.show_configure || **action != RemediationAction::Configure)
            .collect()
    }

    /// Show the error and run the chosen action.
    pub async fn present(
        &self,
        notifier: &dyn Notifier,
        options: PresentOptions,
    ) -> RemediationOutcome {
        let actions = self.visible_actions(options);
        let labels: Vec<&str> = actions.iter().map(|a| a.label()).collect();

        let Some(choice) = notifier
            .show_error(&self.message, options.modal, &labels)
            .await
        else {
            return RemediationOutcome::Dismissed;
        };

        match actions.get(choice) {
            Some(RemediationAction::OpenSettings { setting }) => {
                notifier.open_settings(setting.as_deref()).await;
                RemediationOutcome::SettingsOpened
            }
            Some(RemediationAction::Configure) => RemediationOutcome::OpenLaunchConfiguration,
            None => {
                debug!(choice, "notifier returned an index with no matching action");
                RemediationOutcome::Dismissed
            }
        }
    }
}

impl From<&LaunchError> for RemediableError {
    fn from(err: &LaunchError) -> Self {
        RemediableError::new(err.to_string(), err.remediation())
    }
}
