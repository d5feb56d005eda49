use axum::{body::Body, extract::State, response::Response};
use bytes::Bytes;

use super::{ChatCompletionRequest, ChatCompletionResponse, Usage};
use crate::api::error::ApiError;
use crate::api::mappers::conversation::reconstruct;
use crate::api::mappers::generation::{map_generation_config, SamplingParams};
use crate::api::mappers::response::{
    new_completion_id, to_openai_response, to_openai_usage, ResponseKind,
};
use crate::api::mappers::schema::{translate_tool_choice, translate_tools};
use crate::api::streaming::{Framing, StreamEmitter};
use crate::api::{json_response, read_json, AppState};
use crate::gemini::{Content, GenerateContentResponse, GenerateRequest, Part};

/// POST /v1/chat/completions
pub async fn chat_completions(
    State(state): State<AppState>,
    body: Body,
) -> Result<Response, ApiError> {
    let req: ChatCompletionRequest = read_json(body).await?;
    tracing::debug!(
        model = %req.model,
        messages = req.messages.len(),
        stream = req.stream,
        "Chat completion request"
    );

    let model = req.model.clone();
    let generate = build_generate_request(&req);

    if req.stream {
        let source = state
            .backend
            .stream_generate_content(generate)
            .await
            .map_err(|e| ApiError::backend("failed to stream response", e))?;
        let include_usage = req
            .stream_options
            .as_ref()
            .is_some_and(|opts| opts.include_usage);
        let framing = ChatChunkFraming::new(model, include_usage);
        return Ok(StreamEmitter::new(source, framing).into_response());
    }

    let result = state
        .backend
        .generate_content(generate)
        .await
        .map_err(|e| ApiError::backend("failed to generate content", e))?;
    if result.candidates.is_empty() {
        return Err(ApiError::NoCandidates);
    }

    let envelope = to_openai_response(
        &result,
        ResponseKind::Completion,
        &model,
        &new_completion_id(),
    );
    json_response(&envelope, "chat completions")
}

/// Translates the whole chat request into one backend call.
pub(crate) fn build_generate_request(req: &ChatCompletionRequest) -> GenerateRequest {
    let plan = reconstruct(&req.messages);

    GenerateRequest {
        model: req.model.clone(),
        system_instruction: plan.system_instruction,
        history: plan.prior_turns.into_iter().map(Content::from).collect(),
        input: vec![Part::Text(plan.final_input)],
        generation_config: map_generation_config(SamplingParams::from(req)),
        tools: translate_tools(&req.tools),
        tool_config: translate_tool_choice(req.tool_choice.as_ref()),
    }
}

/// `data: <chunk>\n` per increment, `data: [DONE]\n` at the end.
///
/// With `stream_options.include_usage`, a choice-less chunk carrying the last
/// reported usage is written just before `[DONE]`.
pub(crate) struct ChatChunkFraming {
    model: String,
    id: String,
    include_usage: bool,
    usage: Usage,
}

impl ChatChunkFraming {
    pub(crate) fn new(model: String, include_usage: bool) -> Self {
        Self {
            model,
            id: new_completion_id(),
            include_usage,
            usage: Usage::default(),
        }
    }

    fn data_line(chunk: &ChatCompletionResponse) -> Result<Vec<u8>, ApiError> {
        let json = serde_json::to_string(chunk).map_err(|source| ApiError::Encode {
            what: "chunk",
            source,
        })?;
        Ok(format!("data: {}\n", json).into_bytes())
    }

    fn usage_chunk(&self) -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: self.id.clone(),
            object: ResponseKind::Chunk.object().to_string(),
            created: chrono::Utc::now().timestamp(),
            model: self.model.clone(),
            choices: Vec::new(),
            usage: self.usage.clone(),
        }
    }
}

impl Framing for ChatChunkFraming {
    fn frame(&mut self, response: &GenerateContentResponse) -> Result<Bytes, ApiError> {
        if response.usage_metadata.is_some() {
            self.usage = to_openai_usage(response);
        }
        let chunk = to_openai_response(response, ResponseKind::Chunk, &self.model, &self.id);
        Self::data_line(&chunk).map(Bytes::from)
    }

    fn finish(&mut self) -> Option<Bytes> {
        let mut tail = Vec::new();
        if self.include_usage {
            match Self::data_line(&self.usage_chunk()) {
                Ok(line) => tail.extend_from_slice(&line),
                Err(err) => err.log(),
            }
        }
        tail.extend_from_slice(b"data: [DONE]\n");
        Some(Bytes::from(tail))
    }

    fn content_type(&self) -> &'static str {
        "text/event-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{FunctionCallingMode, SchemaType};
    use serde_json::json;

    #[test]
    fn chat_request_becomes_one_generate_call() {
        let req: ChatCompletionRequest = serde_json::from_value(json!({
            "model": "gemini-1.5-flash",
            "messages": [
                { "role": "system", "content": "Answer in French." },
                { "role": "user", "content": "hi" },
                { "role": "assistant", "content": "salut" },
                { "role": "user", "content": "weather?" }
            ],
            "temperature": 0.2,
            "tools": [{
                "type": "function",
                "function": {
                    "name": "get_weather",
                    "parameters": { "type": "object", "properties": { "city": { "type": "string" } } }
                }
            }],
            "tool_choice": "required"
        }))
        .unwrap();

        let generate = build_generate_request(&req);
        assert_eq!(generate.model, "gemini-1.5-flash");
        assert_eq!(generate.system_instruction.as_deref(), Some("Answer in French."));
        assert_eq!(
            generate.history,
            vec![Content::text("user", "hi"), Content::text("assistant", "salut")]
        );
        assert_eq!(generate.input, vec![Part::Text("weather?".to_string())]);
        assert_eq!(generate.generation_config.temperature, Some(0.2));
        assert_eq!(
            generate.generation_config.response_mime_type.as_deref(),
            Some("text/plain")
        );
        assert_eq!(generate.tools.len(), 1);
        let params = generate.tools[0].function_declarations[0].parameters.as_ref().unwrap();
        assert_eq!(params.properties["city"].schema_type, SchemaType::String);
        assert_eq!(
            generate.tool_config.unwrap().function_calling_config.mode,
            FunctionCallingMode::Any
        );
    }

    #[test]
    fn chunk_frames_share_one_id() {
        let mut framing = ChatChunkFraming::new("m".to_string(), false);
        let response = GenerateContentResponse {
            candidates: vec![crate::gemini::Candidate {
                content: Some(Content::text("model", "x")),
                ..Default::default()
            }],
            ..Default::default()
        };

        let parse = |frame: Bytes| -> serde_json::Value {
            let line = std::str::from_utf8(&frame).unwrap();
            assert!(line.starts_with("data: ") && line.ends_with('\n'));
            serde_json::from_str(line["data: ".len()..].trim_end()).unwrap()
        };
        let first = parse(framing.frame(&response).unwrap());
        let second = parse(framing.frame(&response).unwrap());

        assert_eq!(first["id"], second["id"]);
        assert_eq!(first["object"], "chat.completion.chunk");
        assert_eq!(framing.finish().unwrap(), Bytes::from_static(b"data: [DONE]\n"));
    }

    #[test]
    fn include_usage_adds_a_usage_chunk_before_done() {
        let mut framing = ChatChunkFraming::new("m".to_string(), true);
        let mut response = GenerateContentResponse {
            candidates: vec![crate::gemini::Candidate {
                content: Some(Content::text("model", "x")),
                ..Default::default()
            }],
            ..Default::default()
        };
        framing.frame(&response).unwrap();
        response.usage_metadata = Some(crate::gemini::UsageMetadata {
            prompt_token_count: 4,
            candidates_token_count: 3,
            total_token_count: 7,
        });
        framing.frame(&response).unwrap();

        let tail = framing.finish().unwrap();
        let tail = std::str::from_utf8(&tail).unwrap();
        let lines: Vec<&str> = tail.split_terminator('\n').collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "data: [DONE]");

        let usage: serde_json::Value =
            serde_json::from_str(lines[0].strip_prefix("data: ").unwrap()).unwrap();
        assert_eq!(usage["choices"], json!([]));
        assert_eq!(usage["usage"]["prompt_tokens"], 4);
        assert_eq!(usage["usage"]["total_tokens"], 7);
    }
}
