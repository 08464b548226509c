use anyhow::{Context, Result, anyhow};
use clap::Parser;
use plantgate_server::auth::{AuthService, AuthState};
use plantgate_server::config::LoggingConfig;
use plantgate_server::{AppState, ServerConfig, SupabaseStore, create_router};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plantgate-server")]
#[command(about = "Role, permission and plant-scope gate for Supabase-backed APIs", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,
}

fn init_tracing(logging: &LoggingConfig) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, loaded) = if args.config.exists() {
        let config = ServerConfig::from_file(&args.config)
            .with_context(|| format!("Failed to load {}", args.config.display()))?;
        (config, true)
    } else {
        (ServerConfig::default(), false)
    };
    config.apply_env_overrides();

    init_tracing(&config.logging);

    info!("Starting PlantGate Server v{}", env!("CARGO_PKG_VERSION"));
    if !loaded {
        warn!(
            "Config file {} not found, using defaults and environment",
            args.config.display()
        );
    }

    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    let store = SupabaseStore::new(&config.identity_store)
        .context("Failed to create identity store client")?;
    info!("Identity store: {}", config.identity_store.url);

    let auth = AuthState::new(AuthService::new(Arc::new(store)), &config.auth);
    let app = create_router(AppState::new(auth));

    let addr = config.server_addr();
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
