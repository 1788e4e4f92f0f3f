use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod chat;
mod matching;
mod ui;

use estatehub_core::api::{BackendApi, HttpBackend};
use estatehub_core::{load_config, validate_config, HubConfig};

#[derive(Parser)]
#[command(
    name = "estatehub",
    version,
    about = "Century 21 lead chat and listing matching console"
)]
struct Cli {
    #[arg(
        long,
        default_value = "config/estatehub.yaml",
        help = "Path to the YAML config file"
    )]
    config: PathBuf,

    #[arg(long, help = "Backend base URL, overrides backend.base_url")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Talk to the lead capture chat")]
    Chat {
        #[arg(long, help = "Quick action to start with: sell, buy or question")]
        intent: Option<String>,
    },
    #[command(about = "Match unmatched listings across DomRF, Avito and DomClick")]
    Match {
        #[arg(long, default_value = "", help = "Initial search query")]
        search: String,
    },
    #[command(about = "List unified records")]
    Unified,
    #[command(about = "Rate a unified record")]
    Rate {
        #[arg(help = "Unified record ID")]
        unified_id: String,
        #[arg(help = "Rating from 1 to 5")]
        rating: u8,
        #[arg(long, default_value = "", help = "Reason for the rating")]
        description: String,
    },
    #[command(about = "Validate the config file")]
    Validate,
}

/// Load the config file, or build one from `--base-url` alone when the file
/// does not exist.
fn resolve_config(path: &Path, base_url: Option<&str>) -> Result<HubConfig> {
    let mut config = match base_url {
        Some(url) if !path.exists() => HubConfig::for_base_url(url),
        _ => load_config(path)?,
    };
    if let Some(url) = base_url {
        config.backend.base_url = url.to_string();
    }
    validate_config(&config)?;
    Ok(config)
}

fn connect(config: &HubConfig) -> Result<Arc<dyn BackendApi>> {
    Ok(Arc::new(HttpBackend::from_config(&config.backend)?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = resolve_config(&cli.config, cli.base_url.as_deref())?;

    std::fs::create_dir_all(&config.logging.dir)?;
    let file_appender = tracing_appender::rolling::daily(&config.logging.dir, "estatehub.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    tracing::debug!(base_url = %config.backend.base_url, "config loaded");

    match command {
        Commands::Validate => {
            println!(
                "Config OK. backend: {}, debounce: {}ms, logs: {}",
                config.backend.base_url,
                config.matching.debounce_ms,
                config.logging.dir.display()
            );
        }
        Commands::Chat { intent } => {
            chat::run_chat(connect(&config)?, intent.as_deref()).await?;
        }
        Commands::Match { search } => {
            matching::run_match(connect(&config)?, &search, config.matching.debounce()).await?;
        }
        Commands::Unified => {
            matching::print_unified(connect(&config)?).await?;
        }
        Commands::Rate {
            unified_id,
            rating,
            description,
        } => {
            matching::rate(connect(&config)?, &unified_id, rating, &description).await?;
        }
    }

    Ok(())
}
