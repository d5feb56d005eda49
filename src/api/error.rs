// Request-scoped failures and the plain-text error writer

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::gemini::BackendError;

/// Every way a request can fail. Each variant renders as a plain-text body of
/// its message followed by a newline.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("failed to read request body: {0}")]
    ReadBody(#[source] axum::Error),

    #[error("failed to unmarshal request body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("{context}: {source}")]
    Backend {
        context: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("no candidates returned")]
    NoCandidates,

    #[error("failed to encode {what} response: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn backend(context: &'static str, source: BackendError) -> Self {
        ApiError::Backend { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body written to the client, also used mid-stream once headers are gone.
    pub fn body(&self) -> String {
        format!("{}\n", self)
    }

    pub(crate) fn log(&self) {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{}", self);
        } else {
            tracing::warn!(status = status.as_u16(), "{}", self);
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.body(),
        )
            .into_response()
    }
}

/// Fallback for wrong verbs on the OpenAI routes.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
