//! Music Recommender - Entry Point

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use music_recommender::{
    config::AppConfig, server, DataPreprocessor, RecommenderService, Trainer,
};

#[derive(Parser)]
#[command(name = "music-recommender", version, about = "ALS artist recommender")]
struct Cli {
    /// Optional config file (TOML, YAML or JSON); env vars override it
    #[arg(long, global = true, env = "RECOMMENDER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clean, filter and split the raw log, then build the train matrix
    Preprocess,
    /// Fit ALS on processed data and evaluate it
    Train,
    /// Preprocess, then train
    Run,
    /// Serve recommendations over HTTP
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    init_logging();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Preprocess => preprocess(&config).await,
        Command::Train => train(&config).await,
        Command::Run => {
            preprocess(&config).await?;
            train(&config).await
        }
        Command::Serve => serve(config).await,
    }
}

async fn preprocess(config: &AppConfig) -> anyhow::Result<()> {
    let preprocessor = DataPreprocessor::new(&config.data, config.preprocessing.clone());
    let stats = tokio::task::spawn_blocking(move || preprocessor.run_pipeline())
        .await
        .context("Preprocessing task panicked")?
        .context("Preprocessing failed")?;

    info!(
        rows = stats.rows_after_filter,
        users = stats.users_after_filter,
        artists = stats.artists_after_filter,
        sparsity = stats.matrix_sparsity,
        "Preprocessing finished"
    );
    Ok(())
}

async fn train(config: &AppConfig) -> anyhow::Result<()> {
    let trainer = Trainer::new(&config.data, &config.preprocessing, &config.model);
    let metadata = tokio::task::spawn_blocking(move || trainer.run_training_pipeline())
        .await
        .context("Training task panicked")?
        .context("Training failed")?;

    info!(
        seconds = metadata.training_time_seconds,
        metrics = ?metadata.metrics,
        "Training finished"
    );
    Ok(())
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting Music Recommender API");

    let processed_dir = config.data.processed_dir.clone();
    let model_dir = config.data.model_dir.clone();
    let serving = config.serving.clone();
    let loaded = tokio::task::spawn_blocking(move || {
        RecommenderService::load(&processed_dir, &model_dir, &serving)
    })
    .await
    .context("Model loading task panicked")?;

    // Create app state; without artifacts the API still answers with 503s
    let state = match loaded {
        Ok(service) => server::AppState::with_recommender(config.clone(), service),
        Err(e) => {
            warn!(error = %e, "Recommender not loaded, serving without a model");
            server::AppState::new(config.clone())
        }
    };

    // Create router
    let app = server::create_router(state);

    // Bind to socket
    let addr = config.server.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(%addr, "Server listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber for logging
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "music_recommender=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
