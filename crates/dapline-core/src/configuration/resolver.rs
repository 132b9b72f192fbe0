use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::merge::{LaunchMode, check_launch_mode, merge_settings};
use super::schema::{ADAPTER_ARGS_KEY, ADAPTER_EXECUTABLE_KEY, ADAPTER_HOSTNAME_KEY, ADAPTER_PORT_KEY};
use super::{AdapterExecutable, AdapterLaunch, DebugConfiguration, ResolvedConfiguration, SpawnOptions};
use crate::error::LaunchError;
use crate::executable::AdapterLocator;
use crate::remediation::{Notifier, PresentOptions, RemediableError, RemediationOutcome};
use crate::server::{ServerManager, supports_server_mode};
use crate::settings::DapSettings;

/// Outcome of an interactive resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Ready(ResolvedConfiguration),
    /// The launch was dropped without error: a prompt was cancelled or an
    /// error message dismissed.
    Abandoned,
    /// The user asked to edit the launch configuration instead.
    OpenLaunchConfiguration,
}

/// Turns launch requests into runnable adapter launches.
#[derive(Debug)]
pub struct ConfigurationResolver {
    settings: DapSettings,
    locator: AdapterLocator,
    server: Arc<ServerManager>,
}

impl ConfigurationResolver {
    pub fn new(settings: DapSettings, server: Arc<ServerManager>) -> Self {
        Self {
            settings,
            locator: AdapterLocator::from_env(),
            server,
        }
    }

    pub fn with_locator(mut self, locator: AdapterLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Merge settings into `config`, validate its launch mode and decide how
    /// the adapter is reached.
    ///
    /// When server mode is enabled and the adapter supports it, the local
    /// executable keys are replaced by the shared server's hostname and port.
    /// `Ok(None)` means the user cancelled at the restart prompt.
    pub async fn resolve(
        &self,
        mut config: DebugConfiguration,
        workspace_folder: Option<&Path>,
    ) -> Result<Option<ResolvedConfiguration>, LaunchError> {
        merge_settings(&mut config, &self.settings)?;

        let (executable, args) = match check_launch_mode(&config)? {
            LaunchMode::Connect(endpoint) => {
                debug!(%endpoint, "launch configuration names an existing adapter server");
                return Ok(Some(ResolvedConfiguration {
                    configuration: config,
                    launch: AdapterLaunch::Server(endpoint),
                }));
            }
            LaunchMode::Local { executable, args } => (executable, args),
        };

        // Built even when a server will be used so path problems surface here.
        let adapter = self
            .build_executable(&config, executable.as_deref(), args, workspace_folder)
            .await?;

        if !self.settings.server_mode || !supports_server_mode(&adapter.command).await? {
            return Ok(Some(ResolvedConfiguration {
                configuration: config,
                launch: AdapterLaunch::Executable(adapter),
            }));
        }

        let Some(endpoint) = self
            .server
            .start(&adapter.command, &adapter.args, &adapter.options)
            .await?
        else {
            info!("launch abandoned at the server restart prompt");
            return Ok(None);
        };

        config.remove(ADAPTER_EXECUTABLE_KEY);
        config.remove(ADAPTER_ARGS_KEY);
        config.insert(ADAPTER_HOSTNAME_KEY, endpoint.host.clone());
        config.insert(ADAPTER_PORT_KEY, endpoint.port);

        Ok(Some(ResolvedConfiguration {
            configuration: config,
            launch: AdapterLaunch::Server(endpoint),
        }))
    }

    /// [`resolve`](Self::resolve), presenting user-fixable errors through
    /// `notifier` instead of returning them.
    ///
    /// Errors with no remediation (server start, probe) still propagate.
    pub async fn resolve_with_notifier(
        &self,
        config: DebugConfiguration,
        workspace_folder: Option<&Path>,
        notifier: &dyn Notifier,
    ) -> Result<Resolution, LaunchError> {
        let err = match self.resolve(config, workspace_folder).await {
            Ok(Some(resolved)) => return Ok(Resolution::Ready(resolved)),
            Ok(None) => return Ok(Resolution::Abandoned),
            Err(err) if err.is_remediable() => err,
            Err(err) => return Err(err),
        };

        let options = PresentOptions {
            modal: true,
            show_configure: true,
        };
        let outcome = RemediableError::from(&err).present(notifier, options).await;
        debug!(?outcome, error = %err, "presented launch error");

        Ok(match outcome {
            RemediationOutcome::OpenLaunchConfiguration => Resolution::OpenLaunchConfiguration,
            RemediationOutcome::Dismissed | RemediationOutcome::SettingsOpened => {
                Resolution::Abandoned
            }
        })
    }

    /// Adapter launch for an already-resolved configuration.
    pub async fn descriptor_for(
        &self,
        config: &DebugConfiguration,
        workspace_folder: Option<&Path>,
    ) -> Result<AdapterLaunch, LaunchError> {
        match check_launch_mode(config)? {
            LaunchMode::Connect(endpoint) => Ok(AdapterLaunch::Server(endpoint)),
            LaunchMode::Local { executable, args } => self
                .build_executable(config, executable.as_deref(), args, workspace_folder)
                .await
                .map(AdapterLaunch::Executable),
        }
    }

    async fn build_executable(
        &self,
        config: &DebugConfiguration,
        executable: Option<&str>,
        args: Option<Vec<String>>,
        workspace_folder: Option<&Path>,
    ) -> Result<AdapterExecutable, LaunchError> {
        let command = self
            .locator
            .resolve(executable, self.settings.executable_path())
            .await?;
        let args = args.unwrap_or_else(|| self.settings.arguments.clone());
        let cwd = config
            .get_str("cwd")
            .map(PathBuf::from)
            .or_else(|| workspace_folder.map(Path::to_path_buf));

        Ok(AdapterExecutable {
            command,
            args,
            options: SpawnOptions {
                env: self.settings.adapter_environment(),
                cwd,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigSource;
    use crate::remediation::RemediationAction;
    use crate::server::{FixedDecision, ServerEndpoint};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct PickLabel {
        label: Option<&'static str>,
        shown: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl PickLabel {
        fn new(label: Option<&'static str>) -> Self {
            Self {
                label,
                shown: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Notifier for PickLabel {
        async fn show_error(&self, message: &str, modal: bool, labels: &[&str]) -> Option<usize> {
            assert!(modal);
            self.shown.lock().unwrap().push((
                message.to_string(),
                labels.iter().map(|l| l.to_string()).collect(),
            ));
            self.label
                .and_then(|wanted| labels.iter().position(|l| *l == wanted))
        }

        async fn open_settings(&self, _setting: Option<&str>) {}
    }

    fn resolver(settings: DapSettings) -> ConfigurationResolver {
        let server = Arc::new(ServerManager::new(Arc::new(FixedDecision(None))));
        ConfigurationResolver::new(settings, server)
            .with_locator(AdapterLocator::with_search_path(""))
    }

    fn config(value: serde_json::Value) -> DebugConfiguration {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn explicit_port_needs_no_adapter_binary() {
        let resolved = resolver(DapSettings::default())
            .resolve(config(json!({"debugAdapterPort": 4711})), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            resolved.launch,
            AdapterLaunch::Server(ServerEndpoint {
                host: "localhost".into(),
                port: 4711,
            })
        );
    }

    #[tokio::test]
    async fn missing_adapter_points_at_settings() {
        let err = resolver(DapSettings::default())
            .resolve(DebugConfiguration::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::NotFound));
        assert_eq!(
            err.remediation(),
            vec![RemediationAction::open_setting("executable-path")]
        );
    }

    #[tokio::test]
    async fn configure_choice_opens_launch_configuration() {
        let notifier = PickLabel::new(Some("Configure"));
        let resolution = resolver(DapSettings::default())
            .resolve_with_notifier(
                config(json!({"debugAdapterHostname": "localhost"})),
                None,
                &notifier,
            )
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::OpenLaunchConfiguration);

        let shown = notifier.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].1, vec!["Configure".to_string()]);
    }

    #[tokio::test]
    async fn dismissed_error_abandons_launch() {
        let notifier = PickLabel::new(None);
        let resolution = resolver(DapSettings::default())
            .resolve_with_notifier(DebugConfiguration::new(), None, &notifier)
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::Abandoned);
        assert_eq!(
            notifier.shown.lock().unwrap()[0].1,
            vec!["Open Settings".to_string()]
        );
    }

    #[tokio::test]
    async fn mistyped_settings_block_resolution() {
        let mut settings = DapSettings::default();
        settings.options.insert("timeout".into(), json!(true));
        let err = resolver(settings)
            .resolve(DebugConfiguration::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LaunchError::InvalidConfigurationType {
                origin: ConfigSource::Settings,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn descriptor_for_connect_configuration() {
        let launch = resolver(DapSettings::default())
            .descriptor_for(
                &config(json!({"debugAdapterHostname": "10.0.0.2", "debugAdapterPort": 9000})),
                None,
            )
            .await
            .unwrap();
        assert_eq!(
            launch,
            AdapterLaunch::Server(ServerEndpoint {
                host: "10.0.0.2".into(),
                port: 9000,
            })
        );
    }
}
