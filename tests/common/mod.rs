//! Shared fixtures: an in-memory backend and router builders.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use http_body_util::BodyExt;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use gemini_proxy::api::{create_router, AppState};
use gemini_proxy::config::ApiProtocol;
use gemini_proxy::gemini::{
    BackendError, Candidate, Content, FinishReason, GenerateContentResponse, GenerateRequest,
    GenerativeBackend, ResponseStream, UsageMetadata,
};

type StreamItem = Result<GenerateContentResponse, BackendError>;

/// Canned backend that records what it was asked.
#[derive(Default)]
pub struct FakeBackend {
    generate_result: Mutex<Option<Result<GenerateContentResponse, String>>>,
    stream_items: Mutex<Vec<StreamItem>>,
    embeddings: Mutex<Option<Result<Vec<Vec<f32>>, String>>>,
    pub requests: Mutex<Vec<GenerateRequest>>,
    pub embed_calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: GenerateContentResponse) -> Self {
        *self.generate_result.lock().unwrap() = Some(Ok(response));
        self
    }

    pub fn with_generate_error(self, message: &str) -> Self {
        *self.generate_result.lock().unwrap() = Some(Err(message.to_string()));
        self
    }

    pub fn with_stream(self, items: Vec<StreamItem>) -> Self {
        *self.stream_items.lock().unwrap() = items;
        self
    }

    pub fn with_embeddings(self, vectors: Vec<Vec<f32>>) -> Self {
        *self.embeddings.lock().unwrap() = Some(Ok(vectors));
        self
    }

    pub fn with_embed_error(self, message: &str) -> Self {
        *self.embeddings.lock().unwrap() = Some(Err(message.to_string()));
        self
    }

    pub fn last_request(&self) -> GenerateRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("backend was not called")
    }
}

fn api_error(message: String) -> BackendError {
    BackendError::Api {
        status: 400,
        message,
    }
}

#[async_trait]
impl GenerativeBackend for FakeBackend {
    async fn generate_content(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateContentResponse, BackendError> {
        self.requests.lock().unwrap().push(request);
        match self.generate_result.lock().unwrap().clone() {
            Some(result) => result.map_err(api_error),
            None => Ok(GenerateContentResponse::default()),
        }
    }

    async fn stream_generate_content(
        &self,
        request: GenerateRequest,
    ) -> Result<ResponseStream, BackendError> {
        self.requests.lock().unwrap().push(request);
        let items = std::mem::take(&mut *self.stream_items.lock().unwrap());
        Ok(futures::stream::iter(items).boxed())
    }

    async fn batch_embed_contents(
        &self,
        model: &str,
        inputs: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, BackendError> {
        self.embed_calls
            .lock()
            .unwrap()
            .push((model.to_string(), inputs));
        match self.embeddings.lock().unwrap().clone() {
            Some(result) => result.map_err(api_error),
            None => Ok(Vec::new()),
        }
    }
}

pub fn router(backend: Arc<FakeBackend>, protocol: ApiProtocol) -> Router {
    create_router(AppState {
        backend,
        listen: "127.0.0.1:5555".to_string(),
        protocol,
    })
}

/// One-candidate text result.
pub fn text_response(text: &str, finish_reason: Option<FinishReason>) -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content::text("model", text)),
            finish_reason,
            index: None,
        }],
        usage_metadata: None,
        model_version: None,
    }
}

pub fn usage(prompt: u32, candidates: u32) -> UsageMetadata {
    UsageMetadata {
        prompt_token_count: prompt,
        candidates_token_count: candidates,
        total_token_count: prompt + candidates,
    }
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, String, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap_or("").to_string())
        .unwrap_or_default();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
