mod cli;
mod commands;
mod output;

use anyhow::{Context, Result};
use beacon_cli::{config, observability};
use clap::Parser;

use cli::{Cli, Commands, ConfigCommands, OutputFormat};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env early so BEACON_* variables are visible to clap and config
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();

    observability::init_tracing_with_level(cli.log_level.as_deref().unwrap_or("warn"));
    let cfg = config::load_config(cli.config.as_deref()).context("loading configuration")?;
    let level = cli.log_level.as_deref().unwrap_or(&cfg.logging.level);
    observability::apply_logging_level(level);
    tracing::debug!(
        interval_secs = cfg.scheduler.interval_secs,
        routes = cfg.routes.len(),
        "Configuration loaded"
    );

    match &cli.command {
        Commands::Send(args) => commands::send::send(&cfg, args, format).await?,
        Commands::Remind(args) => commands::remind::remind(&cfg, args, format).await?,
        Commands::Open(args) => commands::open::open(&cfg, &args.link, format)?,
        Commands::Routes => commands::routes::list(&cfg, format)?,
        Commands::Config(args) => match &args.command {
            ConfigCommands::Show => {
                let shown = cfg.redacted();
                match format {
                    OutputFormat::Json => output::print_json(&shown)?,
                    OutputFormat::Table => {
                        let rendered =
                            toml::to_string_pretty(&shown).context("rendering configuration")?;
                        print!("{rendered}");
                    }
                }
            }
            ConfigCommands::Validate => {
                output::print_success("Configuration is valid");
            }
        },
    }
    Ok(())
}
