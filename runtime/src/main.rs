// Copyright 2026 Replica Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use replica_runtime::cli::{self, Overrides};
use replica_runtime::logging;

#[derive(Parser)]
#[command(
    name = "replica",
    about = "Replica: clone any web page into a single self-contained HTML file",
    version,
    after_help = "Run 'replica <command> --help' for details on each command.\nRun 'replica' with no command to start the REST API."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error). RUST_LOG overrides it.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Chat completions endpoint of the generation backend
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Model name sent to the backend
    #[arg(long, global = true)]
    model: Option<String>,

    /// Maximum characters per chunk
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Maximum number of chunks sent to the backend
    #[arg(long, global = true)]
    max_chunks: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API (default)
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Clone a page into a single HTML file
    Clone {
        /// URL to clone
        url: String,
        /// Write the document here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Capture a page without generating a clone
    Capture {
        /// URL to capture
        url: String,
        /// Write the rendered DOM to this file
        #[arg(long)]
        dom: Option<PathBuf>,
        /// Write the full-page PNG screenshot to this file
        #[arg(long)]
        screenshot: Option<PathBuf>,
    },
    /// Render one page and write a capture frame to stdout
    #[command(hide = true)]
    CaptureWorker {
        /// URL to render
        url: String,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Print the effective configuration
    Config,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_json);

    let overrides = Overrides {
        backend_url: cli.backend_url.clone(),
        model: cli.model.clone(),
        chunk_size: cli.chunk_size,
        max_chunks: cli.max_chunks,
    };

    let result = run(cli, &overrides).await;

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    result
}

async fn run(cli: Cli, overrides: &Overrides) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "replica", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::CaptureWorker { url }) => {
            // Settings arrive through the environment the parent set.
            let config = replica::ReplicaConfig::from_env()?;
            cli::worker::run(&url, &config.capture).await
        }
        Some(Commands::Clone { url, output }) => {
            let config = cli::load_config(overrides)?;
            cli::clone_cmd::run(&config, &url, output.as_deref(), json).await
        }
        Some(Commands::Capture {
            url,
            dom,
            screenshot,
        }) => {
            let config = cli::load_config(overrides)?;
            cli::capture_cmd::run(&config, &url, dom.as_deref(), screenshot.as_deref(), json).await
        }
        Some(Commands::Doctor) => {
            let mut config = replica::ReplicaConfig::from_env()?;
            cli::apply_overrides(&mut config, overrides);
            cli::doctor::run(&config, json).await
        }
        Some(Commands::Config) => {
            let config = cli::load_config(overrides)?;
            cli::config_cmd::run(&config)
        }
        Some(Commands::Serve { host, port }) => {
            let config = cli::load_config(overrides)?;
            cli::serve::run(config, host, port).await
        }
        None => {
            let config = cli::load_config(overrides)?;
            cli::serve::run(config, None, None).await
        }
    }
}
