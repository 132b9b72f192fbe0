mod config;
mod launch_cmd;
mod modules_cmd;
mod prompt;
#[cfg(test)]
mod test_util;

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use uuid::Uuid;

use dapline_core::DapSettings;

use config::ResolvedSettings;
use prompt::OnMismatch;

#[derive(Parser)]
#[command(name = "dapline", about = "Broker for lldb-dap debug adapter processes")]
struct Cli {
    /// Settings file (overrides DAPLINE_CONFIG env var)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug adapter executable (overrides DAPLINE_ADAPTER_PATH env var)
    #[arg(long, global = true)]
    adapter: Option<PathBuf>,

    /// Run the adapter as a shared server (overrides DAPLINE_SERVER_MODE env var)
    #[arg(long, global = true)]
    server_mode: Option<bool>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default settings file
    Init {
        /// Overwrite existing settings file
        #[arg(long)]
        force: bool,
    },
    /// Print the debug adapter binary that would be used
    Locate,
    /// Resolve a JSON launch configuration and print the result
    Resolve {
        /// Path to the launch configuration, or `-` for stdin
        file: String,
        /// Workspace folder used as the default working directory
        #[arg(long)]
        workspace: Option<PathBuf>,
        /// What to do when a running server has different arguments
        #[arg(long, value_enum, default_value_t = OnMismatch::Ask)]
        on_mismatch: OnMismatch,
    },
    /// Start the shared debug adapter server and print its endpoint
    Serve {
        /// Adapter arguments (defaults to `arguments` from settings)
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Replay a protocol log and print the loaded modules
    Modules {
        /// JSON-lines protocol log, or `-` for stdin
        file: String,
        /// Session the log belongs to
        #[arg(long)]
        session_id: Option<Uuid>,
        /// Print modules as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse a deep-link launch URI and print the configuration
    Uri {
        /// The URI, e.g. vscode://llvm-vs-code-extensions.lldb-dap/start?program=/bin/ls
        uri: String,
    },
    /// Print shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Read a whole file, or stdin when `file` is `-`.
pub(crate) fn read_input(file: &str) -> anyhow::Result<String> {
    if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(file).with_context(|| format!("failed to read {file}"))
}

/// Execute the `dapline init` command: write the settings file.
fn cmd_init(cli_config: Option<&std::path::Path>, force: bool) -> anyhow::Result<()> {
    let path = config::settings_path(cli_config);

    if path.exists() && !force {
        anyhow::bail!(
            "settings file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    config::save_settings(&path, &DapSettings::default())?;
    println!("Settings written to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let resolve_settings = || {
        ResolvedSettings::resolve(cli.config.as_deref(), cli.adapter.as_deref(), cli.server_mode)
    };

    match &cli.command {
        Commands::Init { force } => {
            cmd_init(cli.config.as_deref(), *force)?;
        }
        Commands::Locate => {
            launch_cmd::run_locate(&resolve_settings()?).await?;
        }
        Commands::Resolve {
            file,
            workspace,
            on_mismatch,
        } => {
            launch_cmd::run_resolve(resolve_settings()?, file, workspace.as_deref(), *on_mismatch)
                .await?;
        }
        Commands::Serve { args } => {
            launch_cmd::run_serve(resolve_settings()?, args.clone()).await?;
        }
        Commands::Modules {
            file,
            session_id,
            json,
        } => {
            modules_cmd::run_modules(file, *session_id, *json)?;
        }
        Commands::Uri { uri } => {
            launch_cmd::run_uri(uri)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "dapline", &mut std::io::stdout());
        }
    }

    Ok(())
}
