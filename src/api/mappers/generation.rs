// Front-end sampling options -> Gemini generation config

use super::common_utils::OneOrMany;
use crate::gemini::GenerationConfig;

/// Sampling and limit options common to both front ends, before mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplingParams {
    pub candidate_count: Option<u32>,
    pub stop: Option<OneOrMany<String>>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub response_mime_type: Option<String>,
}

/// Field-for-field copy. Nothing is defaulted here: an absent option stays
/// absent so the backend's own default applies.
pub fn map_generation_config(params: SamplingParams) -> GenerationConfig {
    GenerationConfig {
        candidate_count: params.candidate_count,
        stop_sequences: params.stop.map(OneOrMany::into_vec),
        max_output_tokens: params.max_tokens,
        temperature: params.temperature,
        top_p: params.top_p,
        top_k: params.top_k,
        presence_penalty: params.presence_penalty,
        frequency_penalty: params.frequency_penalty,
        response_mime_type: params.response_mime_type,
    }
}
