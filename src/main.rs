use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use moodmuse_server::config::{self, AppConfig};
use moodmuse_server::orchestrator::MoodboardManager;
use moodmuse_server::providers::{OpenAiAnalyzer, OpenAiImageGenerator, SpotifyCatalog};
use moodmuse_server::server::{run_server, AppState};
use moodmuse_server::share_store::SqliteMoodboardStore;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing the moodboard database file.
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3000)]
    pub port: u16,

    /// Base URL used when generating share links.
    #[clap(long)]
    pub base_url: Option<String>,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            base_url: args.base_url.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  port: {}", app_config.port);
    info!("  base_url: {}", app_config.base_url);

    if !app_config.moodboards_db_path().exists() {
        info!(
            "Creating new moodboard database at {:?}",
            app_config.moodboards_db_path()
        );
    }
    let store = Arc::new(SqliteMoodboardStore::new(app_config.moodboards_db_path())?);

    let analyzer = Arc::new(OpenAiAnalyzer::from_settings(&app_config.completion));
    let catalog = Arc::new(SpotifyCatalog::from_settings(&app_config.catalog));
    let images = Arc::new(OpenAiImageGenerator::from_settings(&app_config.images));
    let manager = Arc::new(MoodboardManager::new(analyzer, catalog, images));

    let status = manager.provider_status();
    info!(
        completion = status.completion,
        catalog = status.catalog,
        images = status.images,
        "Provider credentials resolved"
    );

    let state = AppState {
        manager,
        store,
        base_url: app_config.base_url.clone(),
    };

    let shutdown_token = CancellationToken::new();
    {
        let shutdown_token = shutdown_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, initiating graceful shutdown");
                shutdown_token.cancel();
            }
        });
    }

    info!("Ready to serve at port {}!", app_config.port);
    run_server(state, app_config.port, shutdown_token).await
}
