// Gemini result -> OpenAI chat completion / chunk envelope

use crate::api::openai::{ChatCompletionChoice, ChatCompletionResponse, ChatMessage, Usage};
use crate::gemini::{Candidate, GenerateContentResponse, Part};

use super::finish_reason::to_openai_finish_reason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Completion,
    Chunk,
}

impl ResponseKind {
    pub fn object(self) -> &'static str {
        match self {
            ResponseKind::Completion => "chat.completion",
            ResponseKind::Chunk => "chat.completion.chunk",
        }
    }
}

pub fn new_completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4())
}

/// Builds one envelope from one backend result.
///
/// Completion choices carry `message`, chunk choices carry `delta`.
pub fn to_openai_response(
    response: &GenerateContentResponse,
    kind: ResponseKind,
    model: &str,
    id: &str,
) -> ChatCompletionResponse {
    let choices = response
        .candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let message = ChatMessage {
                role: candidate
                    .content
                    .as_ref()
                    .map(|c| c.role.clone())
                    .unwrap_or_default(),
                content: candidate_text(candidate),
            };
            let (message, delta) = match kind {
                ResponseKind::Completion => (Some(message), None),
                ResponseKind::Chunk => (None, Some(message)),
            };
            ChatCompletionChoice {
                index: candidate.index.unwrap_or(i as u32),
                message,
                delta,
                finish_reason: to_openai_finish_reason(candidate.finish_reason).to_string(),
            }
        })
        .collect();

    ChatCompletionResponse {
        id: id.to_string(),
        object: kind.object().to_string(),
        created: chrono::Utc::now().timestamp(),
        model: model.to_string(),
        choices,
        usage: to_openai_usage(response),
    }
}

/// Usage counters, zeroed when the backend reported none.
pub fn to_openai_usage(response: &GenerateContentResponse) -> Usage {
    response
        .usage_metadata
        .as_ref()
        .map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        })
        .unwrap_or_default()
}

/// Text parts concatenated in order. Other parts are logged and skipped.
pub fn candidate_text(candidate: &Candidate) -> String {
    let Some(content) = &candidate.content else {
        return String::new();
    };

    let mut text = String::new();
    for part in &content.parts {
        match part {
            Part::Text(t) => text.push_str(t),
            other => {
                tracing::warn!("Skipping unsupported part type '{}' in candidate", other.kind());
            }
        }
    }
    text
}
