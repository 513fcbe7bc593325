use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use datagate::auth::Credential;
use datagate::manifest::{DatasetManifestBuilder, TaskLiftTransform};
use datagate::repo::GitDvcRepository;
use datagate::server::app;
use datagate::store::ObjectStore;
use datagate::sync::SyncCoordinator;
use datagate::{config, AppState};

#[derive(Parser, Debug)]
#[command(name = "datagate", about = "S3-compatible dataset gateway")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "datagate.yaml")]
    config: PathBuf,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.logging.level.clone()));
    if cfg.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let store = ObjectStore::new(&cfg.storage.root_dir, cfg.storage.etag_part_size_bytes)
        .context("failed to initialize object store")?;

    let repository = GitDvcRepository::new(
        PathBuf::from(&cfg.sync.git_folder),
        cfg.sync.branch.clone(),
    );
    let manifest = DatasetManifestBuilder::new(
        PathBuf::from(&cfg.sync.git_folder),
        cfg.sync.dataset.clone(),
        Arc::new(TaskLiftTransform),
    );
    let sync = SyncCoordinator::new(
        cfg.trigger_policy()?,
        format!("{}.dvc", cfg.sync.dataset),
        Arc::new(repository),
        Arc::new(manifest),
    );

    let credential: Credential = cfg.credential();
    let bind = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", cfg.server.host, cfg.server.port));

    let state = Arc::new(AppState {
        config: cfg,
        credential,
        store: Arc::new(store),
        sync: Arc::new(sync),
    });

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("DataGate listening on {bind}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received terminate signal"),
    }
}
