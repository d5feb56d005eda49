// HTTP API Server module

use anyhow::Result;
use axum::{
    body::Body,
    extract::State,
    http::{header, Method},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiProtocol;
use crate::gemini::GenerativeBackend;

pub mod error;
pub mod mappers;
pub mod ollama;
pub mod openai;
pub mod streaming;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn GenerativeBackend>,
    pub listen: String,
    pub protocol: ApiProtocol,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let api_routes = match state.protocol {
        ApiProtocol::OpenAi => openai::routes(),
        ApiProtocol::Ollama => ollama::routes(),
    };

    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .merge(api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState) -> Result<()> {
    let addr = state.listen.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn root(State(state): State<AppState>) -> String {
    let endpoints = match state.protocol {
        ApiProtocol::OpenAi => "POST /v1/chat/completions\nPOST /v1/embeddings",
        ApiProtocol::Ollama => "POST /api/generate\nPOST /api/embed",
    };
    format!(
        "gemini-proxy is running on {} ({} API)\n\n{}\n",
        state.listen, state.protocol, endpoints
    )
}

async fn healthz() -> &'static str {
    "ok"
}

/// Largest request body accepted before decoding.
pub const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Reads the whole body and decodes it as JSON.
pub(crate) async fn read_json<T: DeserializeOwned>(body: Body) -> Result<T, ApiError> {
    read_json_with_limit(body, MAX_REQUEST_BODY_BYTES).await
}

async fn read_json_with_limit<T: DeserializeOwned>(
    body: Body,
    limit: usize,
) -> Result<T, ApiError> {
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(ApiError::ReadBody)?;
    serde_json::from_slice(&bytes).map_err(ApiError::Decode)
}

/// JSON body terminated by a newline, like a streaming encoder would write it.
pub(crate) fn json_response<T: Serialize>(
    value: &T,
    what: &'static str,
) -> Result<Response, ApiError> {
    let mut body =
        serde_json::to_vec(value).map_err(|source| ApiError::Encode { what, source })?;
    body.push(b'\n');
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[tokio::test]
    async fn oversized_body_is_rejected_before_decoding() {
        let body = Body::from(format!("{{\"pad\":\"{}\"}}", "x".repeat(64)));
        let err = read_json_with_limit::<Value>(body, 16).await.unwrap_err();

        assert!(matches!(err, ApiError::ReadBody(_)));
        assert!(err.body().starts_with("failed to read request body"));
    }

    #[tokio::test]
    async fn body_within_limit_is_decoded() {
        let body = Body::from(r#"{"model":"m"}"#);
        let value: Value = read_json_with_limit(body, 64).await.unwrap();
        assert_eq!(value["model"], "m");

        let err = read_json_with_limit::<Value>(Body::from("{"), 64).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
