// Gemini API client (generativelanguage REST endpoint, API key auth)

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use super::types::{
    BatchEmbedRequest, BatchEmbedResponse, Content, EmbedContentRequest, GenerateContentResponse,
    Part, WireRequest,
};
use super::{BackendError, GenerateRequest, GenerativeBackend, ResponseStream};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    http_client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self::new_with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn new_with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            api_key,
            base_url,
            http_client: reqwest::Client::new(),
        }
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/{}:{}", self.base_url, qualified_model(model), method)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
    ) -> Result<reqwest::Response, BackendError> {
        let response = self
            .http_client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate_content(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateContentResponse, BackendError> {
        let url = self.model_url(&request.model, "generateContent");
        let payload = wire_request(request);

        let response = self.post(&url, &payload).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn stream_generate_content(
        &self,
        request: GenerateRequest,
    ) -> Result<ResponseStream, BackendError> {
        let url = format!(
            "{}?alt=sse",
            self.model_url(&request.model, "streamGenerateContent")
        );
        let payload = wire_request(request);

        let response = self.post(&url, &payload).await?;
        tracing::debug!("Gemini stream opened: {}", url);
        Ok(sse_responses(response.bytes_stream()))
    }

    async fn batch_embed_contents(
        &self,
        model: &str,
        inputs: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, BackendError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let model_name = qualified_model(model);
        let payload = BatchEmbedRequest {
            requests: inputs
                .into_iter()
                .map(|text| EmbedContentRequest {
                    model: model_name.clone(),
                    content: Content {
                        role: String::new(),
                        parts: vec![Part::Text(text)],
                    },
                })
                .collect(),
        };
        let sent = payload.requests.len();

        let url = self.model_url(model, "batchEmbedContents");
        let response = self.post(&url, &payload).await?;
        let body: BatchEmbedResponse = serde_json::from_slice(&response.bytes().await?)?;

        if body.embeddings.len() != sent {
            return Err(BackendError::EmbeddingCount {
                sent,
                received: body.embeddings.len(),
            });
        }
        Ok(body.embeddings.into_iter().map(|e| e.values).collect())
    }
}

/// Accepts both `gemini-2.0-flash` and `models/gemini-2.0-flash`.
fn qualified_model(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

/// The backend only knows `user` and `model` turns.
fn wire_role(role: &str) -> String {
    match role {
        "assistant" => "model".to_string(),
        other => other.to_string(),
    }
}

fn wire_request(request: GenerateRequest) -> WireRequest {
    let mut contents: Vec<Content> = request
        .history
        .into_iter()
        .map(|turn| Content {
            role: wire_role(&turn.role),
            parts: turn.parts,
        })
        .collect();
    contents.push(Content {
        role: "user".to_string(),
        parts: request.input,
    });

    WireRequest {
        contents,
        system_instruction: request.system_instruction.map(|text| Content {
            role: String::new(),
            parts: vec![Part::Text(text)],
        }),
        generation_config: request.generation_config,
        tools: request.tools,
        tool_config: request.tool_config,
    }
}

fn api_error(status: StatusCode, body: &str) -> BackendError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(error_message)
        .unwrap_or_else(|| body.trim().to_string());
    BackendError::Api {
        status: status.as_u16(),
        message,
    }
}

fn error_message(error: &Value) -> Option<String> {
    error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Splits an SSE byte stream into decoded results, one per `data:` line.
fn sse_responses<S, E>(source: S) -> ResponseStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<BackendError> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut source = Box::pin(source);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = source.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };
            buffer.extend_from_slice(&bytes);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(parsed) = parse_sse_line(&String::from_utf8_lossy(&line)) {
                    yield parsed;
                }
            }
        }

        if !buffer.is_empty() {
            if let Some(parsed) = parse_sse_line(&String::from_utf8_lossy(&buffer)) {
                yield parsed;
            }
        }
    };
    Box::pin(stream)
}

fn parse_sse_line(line: &str) -> Option<Result<GenerateContentResponse, BackendError>> {
    let data = line.trim_end_matches(['\r', '\n']).strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return Some(Err(e.into())),
    };
    if let Some(error) = value.get("error") {
        let status = error.get("code").and_then(Value::as_u64).unwrap_or(500) as u16;
        return Some(Err(BackendError::Api {
            status,
            message: error_message(error).unwrap_or_else(|| error.to_string()),
        }));
    }
    Some(serde_json::from_value(value).map_err(BackendError::from))
}
