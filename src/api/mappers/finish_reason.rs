use crate::gemini::FinishReason;

/// Maps a backend finish reason to the OpenAI vocabulary.
///
/// Returns an empty string for unset or unrecognized reasons; callers omit the
/// field in that case.
pub fn to_openai_finish_reason(reason: Option<FinishReason>) -> &'static str {
    match reason {
        Some(FinishReason::Stop) => "stop",
        Some(FinishReason::MaxTokens) => "length",
        Some(FinishReason::Recitation) | Some(FinishReason::Safety) => "content_filter",
        Some(FinishReason::Other) => "other",
        Some(FinishReason::Unspecified) | Some(FinishReason::Unknown) | None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defined_reasons_map_to_openai_strings() {
        let cases = [
            (FinishReason::Stop, "stop"),
            (FinishReason::MaxTokens, "length"),
            (FinishReason::Recitation, "content_filter"),
            (FinishReason::Safety, "content_filter"),
            (FinishReason::Other, "other"),
        ];
        for (reason, want) in cases {
            assert_eq!(to_openai_finish_reason(Some(reason)), want, "{:?}", reason);
        }
    }

    #[test]
    fn undefined_reasons_map_to_empty() {
        assert_eq!(to_openai_finish_reason(None), "");
        assert_eq!(to_openai_finish_reason(Some(FinishReason::Unspecified)), "");
        assert_eq!(to_openai_finish_reason(Some(FinishReason::Unknown)), "");
    }
}
