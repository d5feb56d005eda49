// gemini-proxy - OpenAI and Ollama compatible front end for Gemini

pub mod api;
pub mod config;
pub mod gemini;

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::config::AppConfig;
use crate::gemini::GeminiClient;

/// `RUST_LOG` wins; otherwise `info`, or `debug` when debug logging is enabled.
pub fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

pub async fn run(config: AppConfig, api_key: String) -> Result<()> {
    let client = match &config.base_url {
        Some(base_url) => GeminiClient::new_with_base_url(api_key, base_url.as_str()),
        None => GeminiClient::new(api_key),
    };

    let state = AppState {
        backend: Arc::new(client),
        listen: config.bind_addr(),
        protocol: config.api,
    };

    tracing::info!("Starting {} API server...", config.api);
    api::start_server(state).await
}
