use axum::{body::Body, extract::State, response::Response};

use super::{EmbeddingData, EmbeddingsRequest, EmbeddingsResponse, Usage};
use crate::api::error::ApiError;
use crate::api::{json_response, read_json, AppState};

/// POST /v1/embeddings
///
/// `data[i]` is the embedding of `input[i]`.
pub async fn embeddings(
    State(state): State<AppState>,
    body: Body,
) -> Result<Response, ApiError> {
    let req: EmbeddingsRequest = read_json(body).await?;
    let inputs = req.input.into_vec();
    tracing::debug!(model = %req.model, inputs = inputs.len(), "Embeddings request");

    let vectors = state
        .backend
        .batch_embed_contents(&req.model, inputs)
        .await
        .map_err(|e| ApiError::backend("failed to make embeddings request", e))?;

    let data = vectors
        .into_iter()
        .enumerate()
        .map(|(index, embedding)| EmbeddingData {
            object: "embedding",
            embedding,
            index,
        })
        .collect();

    json_response(
        &EmbeddingsResponse {
            object: "list",
            data,
            model: req.model,
            usage: Usage::default(),
        },
        "embeddings",
    )
}
