// ABOUTME: Entry point for the hollowdex binary.
// ABOUTME: Parses CLI arguments, initializes tracing, prepares storage, and starts the HTTP server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hollowdex_server::{AppState, HollowdexConfig, create_router};

#[derive(Debug, Parser)]
#[command(name = "hollowdex", version, about = "Fan-wiki content server with draft/published staging")]
struct Cli {
    /// Storage root holding web/, admin/, and backup/ (overrides HOLLOWDEX_HOME).
    #[arg(long)]
    home: Option<PathBuf>,

    /// Address to listen on (overrides HOLLOWDEX_BIND).
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// SQLite catalog path (overrides HOLLOWDEX_DB).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Backups kept per stream, 0 keeps all (overrides HOLLOWDEX_BACKUP_RETAIN).
    #[arg(long)]
    backup_retain: Option<usize>,
}

impl Cli {
    fn apply(self, mut config: HollowdexConfig) -> HollowdexConfig {
        if let Some(home) = self.home {
            // A catalog path not set explicitly follows the storage root.
            if self.db.is_none() && config.db_path == config.home.join("catalog.db") {
                config.db_path = home.join("catalog.db");
            }
            config.home = home;
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(db) = self.db {
            config.db_path = db;
        }
        if let Some(retain) = self.backup_retain {
            config.backup_retain = (retain > 0).then_some(retain);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        eprintln!("ignoring unreadable .env file: {e}");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hollowdex=debug,tower_http=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.apply(HollowdexConfig::from_env().context("invalid configuration")?);

    tracing::info!(
        "hollowdex starting up (home {}, catalog {})",
        config.home.display(),
        config.db_path.display()
    );

    let bind = config.bind;
    let state = Arc::new(AppState::open(config).context("failed to open storage")?);

    let report = state.staging.initialize();
    if !report.is_complete() {
        tracing::warn!(
            "published stores not fully initialized: {:?}",
            report.failures()
        );
    }

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!("listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("hollowdex stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
