//! End-to-end tests for launch configuration resolution against fake
//! adapters.

#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use dapline_core::error::EXECUTABLE_PATH_SETTING;
use dapline_core::server::{FixedDecision, ServerStatus};
use dapline_core::{
    AdapterLaunch, AdapterLocator, ConfigSource, ConfigurationResolver, DapSettings,
    DebugConfiguration, LaunchError, Notifier, RemediationAction, Resolution, RestartDecision,
    ServerEndpoint, ServerManager, ServerStartError,
};
use dapline_test_utils::{FakeAdapter, non_executable_adapter};

// ===========================================================================
// Helpers
// ===========================================================================

fn config(value: Value) -> DebugConfiguration {
    serde_json::from_value(value).unwrap()
}

fn manager(decision: Option<RestartDecision>) -> Arc<ServerManager> {
    Arc::new(ServerManager::new(Arc::new(FixedDecision(decision))))
}

fn server_settings(adapter: &FakeAdapter, arguments: &[&str]) -> DapSettings {
    DapSettings {
        executable_path: Some(adapter.path().to_path_buf()),
        arguments: arguments.iter().map(|s| s.to_string()).collect(),
        server_mode: true,
        ..Default::default()
    }
}

/// Resolver that never finds anything by searching.
fn isolated(settings: DapSettings, server: Arc<ServerManager>) -> ConfigurationResolver {
    ConfigurationResolver::new(settings, server).with_locator(AdapterLocator::with_search_path(""))
}

/// Notifier that must never be shown anything.
struct Unreachable;

#[async_trait]
impl Notifier for Unreachable {
    async fn show_error(&self, message: &str, _modal: bool, _labels: &[&str]) -> Option<usize> {
        panic!("unexpected error shown: {message}");
    }

    async fn open_settings(&self, _setting: Option<&str>) {}
}

// ===========================================================================
// Validation
// ===========================================================================

#[tokio::test]
async fn settings_option_without_adapter_is_not_found() {
    let mut settings = DapSettings::default();
    settings.options.insert("timeout".into(), json!(45));

    let err = isolated(settings, manager(None))
        .resolve(config(json!({})), None)
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::NotFound));
    assert_eq!(
        err.remediation(),
        vec![RemediationAction::open_setting(EXECUTABLE_PATH_SETTING)]
    );
}

#[tokio::test]
async fn hostname_without_port_is_incomplete() {
    let adapter = FakeAdapter::server(41001);
    let err = isolated(server_settings(&adapter, &[]), manager(None))
        .resolve(config(json!({"debugAdapterHostname": "localhost"})), None)
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::IncompleteEndpoint));
    assert_eq!(adapter.spawn_count(), 0);
}

#[tokio::test]
async fn port_with_executable_conflicts() {
    let adapter = FakeAdapter::server(41002);
    let err = isolated(server_settings(&adapter, &[]), manager(None))
        .resolve(
            config(json!({
                "debugAdapterPort": 1234,
                "debugAdapterExecutable": adapter.path(),
            })),
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::ConflictingLaunchMode));
}

#[tokio::test]
async fn non_executable_launch_path_points_at_launch_configuration() {
    let tmp = tempfile::tempdir().unwrap();
    let bad = non_executable_adapter(tmp.path());

    let err = isolated(DapSettings::default(), manager(None))
        .resolve(config(json!({"debugAdapterExecutable": bad})), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LaunchError::NotExecutable {
            origin: ConfigSource::LaunchConfiguration,
            ..
        }
    ));
    assert_eq!(err.remediation(), vec![RemediationAction::Configure]);
}

#[tokio::test]
async fn launch_values_win_over_settings() {
    let adapter = FakeAdapter::plain();
    let mut settings = DapSettings {
        executable_path: Some(adapter.path().to_path_buf()),
        ..Default::default()
    };
    settings.options.insert("timeout".into(), json!(45));
    settings.options.insert("stopCommands".into(), json!(["bt"]));

    let resolved = isolated(settings, manager(None))
        .resolve(config(json!({"timeout": 10})), None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(resolved.configuration.get("timeout"), Some(&json!(10)));
    assert_eq!(
        resolved.configuration.get("stopCommands"),
        Some(&json!(["bt"]))
    );
}

// ===========================================================================
// Local executables
// ===========================================================================

#[tokio::test]
async fn adapter_without_server_support_runs_locally() {
    let adapter = FakeAdapter::plain();
    let workspace = tempfile::tempdir().unwrap();
    let settings = DapSettings {
        log_path: Some(PathBuf::from("/tmp/lldb-dap.log")),
        ..server_settings(&adapter, &["--repl-mode", "command"])
    };
    let server = manager(None);

    let resolved = isolated(settings, Arc::clone(&server))
        .resolve(config(json!({"program": "/bin/true"})), Some(workspace.path()))
        .await
        .unwrap()
        .unwrap();

    match resolved.launch {
        AdapterLaunch::Executable(exe) => {
            assert_eq!(exe.command, adapter.path());
            assert_eq!(exe.args, vec!["--repl-mode", "command"]);
            assert_eq!(exe.options.env["LLDBDAP_LOG"], "/tmp/lldb-dap.log");
            assert_eq!(exe.options.cwd.as_deref(), Some(workspace.path()));
        }
        other => panic!("expected local executable, got {other:?}"),
    }
    assert_eq!(adapter.spawn_count(), 0);
    assert_eq!(server.status(), ServerStatus::Idle);
}

#[tokio::test]
async fn launch_args_and_cwd_override_settings() {
    let adapter = FakeAdapter::plain();
    let resolver = isolated(
        DapSettings {
            server_mode: false,
            ..server_settings(&adapter, &["--from-settings"])
        },
        manager(None),
    );

    let resolved = resolver
        .resolve(
            config(json!({"debugAdapterArgs": ["--from-launch"], "cwd": "/srv/app"})),
            Some(std::path::Path::new("/ignored")),
        )
        .await
        .unwrap()
        .unwrap();

    let AdapterLaunch::Executable(exe) = resolved.launch else {
        panic!("expected local executable");
    };
    assert_eq!(exe.args, vec!["--from-launch"]);
    assert_eq!(exe.options.cwd, Some(PathBuf::from("/srv/app")));
    // Local launches keep their launch-mode keys.
    assert!(resolved.configuration.contains_key("debugAdapterArgs"));
}

// ===========================================================================
// Server mode
// ===========================================================================

#[tokio::test]
async fn server_mode_substitutes_endpoint() {
    let adapter = FakeAdapter::server(54321);
    let resolver = isolated(server_settings(&adapter, &[]), manager(None));

    let resolved = resolver
        .resolve(
            config(json!({
                "program": "/bin/true",
                "debugAdapterExecutable": adapter.path(),
                "debugAdapterArgs": [],
            })),
            None,
        )
        .await
        .unwrap()
        .unwrap();

    let expected = ServerEndpoint {
        host: "127.0.0.1".into(),
        port: 54321,
    };
    assert_eq!(resolved.launch, AdapterLaunch::Server(expected.clone()));

    let cfg = &resolved.configuration;
    assert!(!cfg.contains_key("debugAdapterExecutable"));
    assert!(!cfg.contains_key("debugAdapterArgs"));
    assert_eq!(cfg.get_str("debugAdapterHostname"), Some("127.0.0.1"));
    assert_eq!(cfg.get("debugAdapterPort"), Some(&json!(54321)));

    // The substituted configuration now describes a network launch.
    assert_eq!(
        resolver.descriptor_for(cfg, None).await.unwrap(),
        AdapterLaunch::Server(expected)
    );

    // A second launch reuses the same process.
    resolver
        .resolve(config(json!({"program": "/bin/true"})), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(adapter.spawn_count(), 1);
}

#[tokio::test]
async fn cancelled_restart_abandons_launch() {
    let adapter = FakeAdapter::server(41003);
    let server = manager(Some(RestartDecision::Cancel));

    isolated(server_settings(&adapter, &["--first"]), Arc::clone(&server))
        .resolve(config(json!({})), None)
        .await
        .unwrap()
        .unwrap();

    let second = isolated(server_settings(&adapter, &["--second"]), Arc::clone(&server));
    let resolution = second
        .resolve_with_notifier(config(json!({})), None, &Unreachable)
        .await
        .unwrap();

    assert_eq!(resolution, Resolution::Abandoned);
    assert_eq!(adapter.spawn_count(), 1);
}

#[tokio::test]
async fn server_failure_propagates_without_prompt() {
    let adapter = FakeAdapter::exits_early(2);
    let server = manager(None);

    let err = isolated(server_settings(&adapter, &[]), Arc::clone(&server))
        .resolve_with_notifier(config(json!({})), None, &Unreachable)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LaunchError::ServerStartFailure(ServerStartError::ExitedEarly { code: Some(2), .. })
    ));
    assert_eq!(server.status(), ServerStatus::Idle);
}
