// Incremental response framing over a backend result stream

use axum::{
    body::Body,
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::StreamExt;
use std::convert::Infallible;

use super::error::ApiError;
use crate::gemini::{GenerateContentResponse, ResponseStream};

/// Wire encoding of a stream: one frame per backend increment plus an
/// optional trailer once the backend is exhausted.
pub trait Framing: Send + 'static {
    fn frame(&mut self, response: &GenerateContentResponse) -> Result<Bytes, ApiError>;

    /// Written after the last increment. Not written if the stream failed.
    fn finish(&mut self) -> Option<Bytes>;

    fn content_type(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
    Done,
    Failed,
}

/// Pulls increments from the backend and frames each one.
///
/// Dropping the emitter drops the backend stream, which is how a client
/// disconnect cancels the upstream call.
pub struct StreamEmitter<F> {
    source: ResponseStream,
    framing: F,
    state: StreamState,
    emitted: usize,
}

impl<F: Framing> StreamEmitter<F> {
    pub fn new(source: ResponseStream, framing: F) -> Self {
        Self {
            source,
            framing,
            state: StreamState::Idle,
            emitted: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Next chunk of body bytes, or `None` once the stream is finished.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        match self.state {
            StreamState::Done | StreamState::Failed => return None,
            StreamState::Idle => {
                tracing::debug!("Stream started");
                self.state = StreamState::Streaming;
            }
            StreamState::Streaming => {}
        }

        match self.source.next().await {
            Some(Ok(response)) => match self.framing.frame(&response) {
                Ok(frame) => {
                    self.emitted += 1;
                    Some(frame)
                }
                Err(err) => self.fail(err),
            },
            Some(Err(err)) => self.fail(ApiError::backend("failed to stream response", err)),
            None => {
                tracing::debug!(chunks = self.emitted, "Stream finished");
                self.state = StreamState::Done;
                self.framing.finish()
            }
        }
    }

    // Headers are already sent, so the error goes into the body and ends it.
    fn fail(&mut self, err: ApiError) -> Option<Bytes> {
        err.log();
        self.state = StreamState::Failed;
        Some(Bytes::from(err.body()))
    }

    pub fn into_response(self) -> Response {
        let content_type = self.framing.content_type();
        let body = futures::stream::unfold(self, |mut emitter| async move {
            let frame = emitter.next_frame().await?;
            Some((Ok::<_, Infallible>(frame), emitter))
        });

        (
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(body),
        )
            .into_response()
    }
}
