// Ollama-compatible surface: /api/generate and /api/embed

use axum::{body::Body, extract::State, response::Response, routing::any, Router};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::mappers::common_utils::OneOrMany;
use super::mappers::generation::{map_generation_config, SamplingParams};
use super::mappers::response::candidate_text;
use super::streaming::{Framing, StreamEmitter};
use super::{json_response, read_json, AppState};
use crate::gemini::{self, GenerateContentResponse, Part, UsageMetadata};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/generate", any(generate))
        .route("/api/embed", any(embed))
}

// ===== Wire types =====

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    /// Accepted for compatibility; not forwarded.
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Options {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub stop: Option<OneOrMany<String>>,
    #[serde(default)]
    pub num_predict: Option<i32>,
    #[serde(default)]
    pub top_k: Option<i32>,
    #[serde(default)]
    pub top_p: Option<f32>,
}

impl From<&Options> for SamplingParams {
    fn from(options: &Options) -> Self {
        SamplingParams {
            stop: options.stop.clone(),
            // -1 and -2 mean "unlimited" / "fill context" to Ollama; leave those unset.
            max_tokens: options
                .num_predict
                .filter(|n| *n > 0)
                .and_then(|n| u32::try_from(n).ok()),
            temperature: options.temperature,
            top_p: options.top_p,
            top_k: options.top_k.and_then(|k| u32::try_from(k).ok()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub model: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub prompt_eval_count: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub eval_count: u32,
    pub done: bool,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl GenerateResponse {
    fn new(model: &str, response: String, usage: Option<&UsageMetadata>, done: bool) -> Self {
        Self {
            model: model.to_string(),
            response,
            created_at: Utc::now(),
            prompt_eval_count: usage.map(|u| u.prompt_token_count).unwrap_or_default(),
            eval_count: usage.map(|u| u.total_token_count).unwrap_or_default(),
            done,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub input: OneOrMany<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub model: String,
    pub embeddings: Vec<Vec<f32>>,
}

// ===== Handlers =====

/// POST /api/generate
pub async fn generate(State(state): State<AppState>, body: Body) -> Result<Response, ApiError> {
    let req: GenerateRequest = read_json(body).await?;
    tracing::debug!(model = %req.model, stream = ?req.stream, "Generate request");

    let generate = gemini::GenerateRequest {
        model: req.model.clone(),
        system_instruction: (!req.system.is_empty()).then(|| req.system.clone()),
        history: Vec::new(),
        input: vec![Part::Text(req.prompt.clone())],
        generation_config: map_generation_config(SamplingParams::from(&req.options)),
        tools: Vec::new(),
        tool_config: None,
    };

    if req.stream == Some(true) {
        let source = state
            .backend
            .stream_generate_content(generate)
            .await
            .map_err(|e| ApiError::backend("failed to generate content", e))?;
        return Ok(StreamEmitter::new(source, GenerateFraming::new(req.model)).into_response());
    }

    let result = state
        .backend
        .generate_content(generate)
        .await
        .map_err(|e| ApiError::backend("failed to generate content", e))?;
    let Some(candidate) = result.candidates.first() else {
        return Err(ApiError::NoCandidates);
    };

    let response = GenerateResponse::new(
        &req.model,
        candidate_text(candidate),
        result.usage_metadata.as_ref(),
        true,
    );
    json_response(&response, "generate")
}

/// POST /api/embed
pub async fn embed(State(state): State<AppState>, body: Body) -> Result<Response, ApiError> {
    let req: EmbedRequest = read_json(body).await?;
    let embeddings = state
        .backend
        .batch_embed_contents(&req.model, req.input.into_vec())
        .await
        .map_err(|e| ApiError::backend("failed to create embedding", e))?;

    json_response(
        &EmbedResponse {
            model: req.model,
            embeddings,
        },
        "embeddings",
    )
}

/// NDJSON: one `done: false` object per increment, then a `done: true` object
/// with the last reported usage.
pub(crate) struct GenerateFraming {
    model: String,
    usage: Option<UsageMetadata>,
}

impl GenerateFraming {
    pub(crate) fn new(model: String) -> Self {
        Self { model, usage: None }
    }

    fn line(response: &GenerateResponse) -> Result<Bytes, ApiError> {
        let mut line = serde_json::to_vec(response).map_err(|source| ApiError::Encode {
            what: "generate",
            source,
        })?;
        line.push(b'\n');
        Ok(Bytes::from(line))
    }
}

impl Framing for GenerateFraming {
    fn frame(&mut self, response: &GenerateContentResponse) -> Result<Bytes, ApiError> {
        if response.usage_metadata.is_some() {
            self.usage = response.usage_metadata.clone();
        }
        let text = response
            .candidates
            .first()
            .map(candidate_text)
            .unwrap_or_default();
        Self::line(&GenerateResponse::new(&self.model, text, None, false))
    }

    fn finish(&mut self) -> Option<Bytes> {
        let last = GenerateResponse::new(&self.model, String::new(), self.usage.as_ref(), true);
        match Self::line(&last) {
            Ok(line) => Some(line),
            Err(err) => {
                err.log();
                Some(Bytes::from(err.body()))
            }
        }
    }

    fn content_type(&self) -> &'static str {
        "application/x-ndjson"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{Candidate, Content};
    use serde_json::{json, Value};

    #[test]
    fn options_map_onto_generation_config() {
        let req: GenerateRequest = serde_json::from_value(json!({
            "model": "m",
            "prompt": "p",
            "options": { "temperature": 0.5, "stop": "###", "num_predict": 100, "top_k": 20, "top_p": 0.8 }
        }))
        .unwrap();

        let config = map_generation_config(SamplingParams::from(&req.options));
        assert_eq!(config.temperature, Some(0.5));
        assert_eq!(config.stop_sequences, Some(vec!["###".to_string()]));
        assert_eq!(config.max_output_tokens, Some(100));
        assert_eq!(config.top_k, Some(20));
        assert_eq!(config.top_p, Some(0.8));
        assert_eq!(config.candidate_count, None);
        assert_eq!(config.response_mime_type, None);
    }

    #[test]
    fn unlimited_num_predict_is_left_unset() {
        let options = Options {
            num_predict: Some(-1),
            ..Default::default()
        };
        assert_eq!(SamplingParams::from(&options).max_tokens, None);
    }

    #[test]
    fn streaming_lines_end_with_done_and_last_usage() {
        let mut framing = GenerateFraming::new("m".to_string());
        let increment = |text: &str, usage: Option<UsageMetadata>| GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content::text("model", text)),
                ..Default::default()
            }],
            usage_metadata: usage,
            model_version: None,
        };

        let parse = |b: Bytes| -> Value {
            assert!(b.ends_with(b"\n"));
            serde_json::from_slice(&b).unwrap()
        };

        let first = parse(framing.frame(&increment("Hel", None)).unwrap());
        assert_eq!(first["response"], "Hel");
        assert_eq!(first["done"], false);

        let usage = UsageMetadata {
            prompt_token_count: 4,
            candidates_token_count: 2,
            total_token_count: 6,
        };
        parse(framing.frame(&increment("lo", Some(usage))).unwrap());

        let last = parse(framing.finish().unwrap());
        assert_eq!(last["done"], true);
        assert_eq!(last["prompt_eval_count"], 4);
        assert_eq!(last["eval_count"], 6);
    }
}
