use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};

use dapline_core::launch_uri::parse_launch_uri;
use dapline_core::server::{ServerStatus, supports_server_mode};
use dapline_core::{
    AdapterLocator, ConfigurationResolver, DebugConfiguration, Resolution, ServerManager,
    SpawnOptions,
};

use crate::config::ResolvedSettings;
use crate::prompt::{OnMismatch, TerminalNotifier};
use crate::read_input;

/// Execute `dapline locate`: print the adapter binary that would be used.
pub async fn run_locate(resolved: &ResolvedSettings) -> Result<()> {
    let path = AdapterLocator::from_env()
        .resolve(None, resolved.settings.executable_path())
        .await?;
    let server_mode = supports_server_mode(&path).await?;

    println!("{}", path.display());
    eprintln!(
        "server mode: {}",
        if server_mode { "supported" } else { "not supported" }
    );
    Ok(())
}

/// Execute `dapline resolve`: resolve a launch configuration and print it.
///
/// When the result uses a server this process started, the server is kept
/// alive until Ctrl-C.
pub async fn run_resolve(
    resolved: ResolvedSettings,
    file: &str,
    workspace: Option<&Path>,
    on_mismatch: OnMismatch,
) -> Result<()> {
    let raw = read_input(file)?;
    let config: DebugConfiguration = serde_json::from_str(&raw)
        .with_context(|| format!("{file} does not contain a JSON launch configuration"))?;

    let server = Arc::new(ServerManager::new(on_mismatch.prompt()));
    let notifier = TerminalNotifier::new(resolved.path.clone());
    let resolver = ConfigurationResolver::new(resolved.settings, Arc::clone(&server));

    match resolver
        .resolve_with_notifier(config, workspace, &notifier)
        .await?
    {
        Resolution::Ready(configuration) => {
            println!("{}", serde_json::to_string_pretty(&configuration)?);
            if server.status() != ServerStatus::Idle {
                hold_server(&server).await?;
            }
        }
        Resolution::Abandoned => eprintln!("Launch abandoned."),
        Resolution::OpenLaunchConfiguration => {
            eprintln!("Update the launch configuration in {file} and try again.");
        }
    }
    Ok(())
}

/// Execute `dapline serve`: start the shared server and print its endpoint.
pub async fn run_serve(resolved: ResolvedSettings, args: Vec<String>) -> Result<()> {
    let settings = resolved.settings;
    let adapter = AdapterLocator::from_env()
        .resolve(None, settings.executable_path())
        .await?;
    if !supports_server_mode(&adapter).await? {
        bail!("{} does not support server mode", adapter.display());
    }

    let args = if args.is_empty() {
        settings.arguments.clone()
    } else {
        args
    };
    let options = SpawnOptions {
        env: settings.adapter_environment(),
        cwd: None,
    };

    let server = ServerManager::new(OnMismatch::Cancel.prompt());
    let Some(endpoint) = server.start(&adapter, &args, &options).await? else {
        bail!("server start was cancelled");
    };

    println!("{}", serde_json::to_string(&endpoint)?);
    hold_server(&server).await
}

/// Execute `dapline uri`: print the configuration a deep link describes.
pub fn run_uri(uri: &str) -> Result<()> {
    let config = parse_launch_uri(uri)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn hold_server(server: &ServerManager) -> Result<()> {
    if let ServerStatus::Running { pid, endpoint, .. } = server.status() {
        let pid = pid.map_or_else(|| "unknown".to_string(), |p| p.to_string());
        eprintln!("lldb-dap server (pid {pid}) listening on {endpoint}. Press Ctrl-C to stop.");
    }
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    server.shutdown().await;
    Ok(())
}
