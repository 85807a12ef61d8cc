use anyhow::Result;
use clap::Parser;
use skywire_common::observability::{LogConfig, LogFormat, init_logging};
use skywire_config::{SkywireConfig, SkywireConfigLoader};

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Config: defaults < yaml < SKYWIRE_* < legacy BLUESKY_* / PDSHOST
    let loader = match &cli.config {
        Some(path) => SkywireConfigLoader::new().with_file(path),
        None => SkywireConfigLoader::new().with_default_locations(),
    };
    let cfg: SkywireConfig = loader.load()?;

    // 2) Logging; stdout stays clean for JSON
    let log_path = init_logging(LogConfig {
        emit_stderr: cli.log_stderr,
        format: if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Text
        },
        ..LogConfig::default()
    })?;
    tracing::debug!(log_path = %log_path.display(), config = ?cfg, "cli.start");

    let res = match cli.command {
        Commands::Bs(cmd) => commands::run_bs(&cfg, cmd).await,
        Commands::Db(args) => commands::run_db(&cfg, args).await,
    };
    if let Err(err) = &res {
        tracing::error!(error = ?err, "cli.failed");
    }
    res
}
