mod config;
mod error;
mod gemini;
mod models;
mod prompt;
mod relay;
mod routes;
mod studio;

use anyhow::Context;
use clap::Parser;
use routes::{router, AppState};
use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{fmt, EnvFilter};

use crate::{
    config::Config,
    gemini::{GeminiClient, ImageModel, PlaceholderModel},
};

#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Turn product photos into e-commerce model photographs")]
pub struct App {
    #[command(subcommand)]
    pub command: Option<SubCommands>,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommands {
    /// Run the upload server (default)
    Serve {
        /// Overrides the PORT environment variable
        #[clap(long)]
        port: Option<u16>,
    },
    /// Upload photos to a running server and download the generated image
    Generate(studio::GenerateArgs),
}

async fn serve(mut config: Config, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.port = port;
    }

    let model: Arc<dyn ImageModel> = match config.api_key.clone() {
        Some(api_key) => {
            tracing::info!("Using Gemini model '{}' at {}", config.model, config.api_base);
            Arc::new(GeminiClient::new(api_key, &config)?)
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set, running in demo mode with placeholder images");
            Arc::new(PlaceholderModel)
        }
    };
    let state = AppState { model, max_file_bytes: config.max_file_bytes };
    let app = router(state, config.max_body_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let app = App::parse();
    match app.command.unwrap_or(SubCommands::Serve { port: None }) {
        SubCommands::Serve { port } => serve(Config::from_env(), port).await,
        SubCommands::Generate(args) => studio::run(args).await,
    }
}
