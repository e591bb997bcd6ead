/// iPlay Server - session and playback-control backend
use clap::{Parser, Subcommand};
use iplay_server::{config::ServerConfig, create_router, state::AppState};
use std::{net::SocketAddr, path::PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "iplay-server")]
#[command(about = "iPlay session and playback-control server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Configuration file path
        #[arg(short, long, env = "IPLAY_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Load and validate the configuration, then exit
    CheckConfig {
        /// Configuration file path
        #[arg(short, long, env = "IPLAY_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iplay_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            serve(config).await?;
        }
        Commands::CheckConfig { config } => {
            check_config(config)?;
        }
    }

    Ok(())
}

async fn serve(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = ServerConfig::load(config_path.as_deref())?;

    // The server still starts so /api/auth/check-env can report the problem
    if let Err(e) = config.validate() {
        tracing::warn!("{}", e);
    }

    tracing::info!("Starting iPlay Server");
    tracing::info!("Host: {}", config.server.host);
    tracing::info!("Port: {}", config.server.port);
    tracing::info!("Redirect URI: {}", config.upstream.redirect_uri);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let app_state = AppState::new(config)?;
    let app = create_router(app_state);

    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn check_config(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = ServerConfig::load(config_path.as_deref())?;
    config.validate()?;

    println!("Configuration OK");
    println!("  listen:       {}:{}", config.server.host, config.server.port);
    println!("  production:   {}", config.server.production);
    println!("  redirect URI: {}", config.upstream.redirect_uri);
    println!("  accounts URL: {}", config.upstream.accounts_url);
    println!("  API base URL: {}", config.upstream.api_base_url);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
