// Chat message list -> system instruction + prior turns + final input

use crate::api::openai::ChatMessage;
use crate::gemini::Content;

/// How a chat request is replayed against the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationPlan {
    pub system_instruction: Option<String>,
    /// Every non-system message except the last, in request order.
    pub prior_turns: Vec<Turn>,
    /// Content of the last non-system message; empty when there is none.
    pub final_input: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

impl From<Turn> for Content {
    fn from(turn: Turn) -> Self {
        Content::text(turn.role, turn.content)
    }
}

/// Splits a chat transcript into the pieces the backend takes separately.
///
/// System messages never become turns. When several are present the last one
/// wins. Roles and content are copied verbatim. An empty transcript yields an
/// empty plan, which is still sent to the backend.
pub fn reconstruct(messages: &[ChatMessage]) -> ConversationPlan {
    let mut system_instruction = None;
    let mut turns: Vec<Turn> = Vec::with_capacity(messages.len());

    for message in messages {
        if message.role == "system" {
            if system_instruction.is_some() {
                tracing::debug!("Multiple system messages in request, using the last one");
            }
            system_instruction = Some(message.content.clone());
            continue;
        }
        turns.push(Turn {
            role: message.role.clone(),
            content: message.content.clone(),
        });
    }

    let final_input = turns.pop().map(|turn| turn.content).unwrap_or_default();

    ConversationPlan {
        system_instruction,
        prior_turns: turns,
        final_input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: &str, content: &str) -> ChatMessage {
        ChatMessage {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn system_message_is_extracted_and_last_message_is_final_input() {
        let plan = reconstruct(&[
            msg("system", "You are terse."),
            msg("user", "hi"),
            msg("assistant", "hello"),
            msg("user", "how are you?"),
        ]);

        assert_eq!(plan.system_instruction.as_deref(), Some("You are terse."));
        assert_eq!(
            plan.prior_turns,
            vec![
                Turn { role: "user".to_string(), content: "hi".to_string() },
                Turn { role: "assistant".to_string(), content: "hello".to_string() },
            ]
        );
        assert_eq!(plan.final_input, "how are you?");
    }

    #[test]
    fn prior_turns_hold_all_but_the_last_non_system_message() {
        for k in 0..5usize {
            let mut messages = vec![msg("system", "sys")];
            messages.extend((0..k).map(|i| msg("user", &format!("m{}", i))));

            let plan = reconstruct(&messages);
            assert_eq!(plan.prior_turns.len(), k.saturating_sub(1));
            if k > 0 {
                assert_eq!(plan.final_input, format!("m{}", k - 1));
            } else {
                assert_eq!(plan.final_input, "");
            }
        }
    }

    #[test]
    fn last_system_message_wins_even_when_it_is_last() {
        let plan = reconstruct(&[
            msg("system", "first"),
            msg("user", "question"),
            msg("system", "second"),
        ]);

        assert_eq!(plan.system_instruction.as_deref(), Some("second"));
        assert!(plan.prior_turns.is_empty());
        assert_eq!(plan.final_input, "question");
    }

    #[test]
    fn empty_and_system_only_transcripts_produce_empty_input() {
        assert_eq!(reconstruct(&[]), ConversationPlan::default());

        let plan = reconstruct(&[msg("system", "only rules")]);
        assert_eq!(plan.system_instruction.as_deref(), Some("only rules"));
        assert!(plan.prior_turns.is_empty());
        assert!(plan.final_input.is_empty());
    }

    #[test]
    fn content_is_not_trimmed() {
        let plan = reconstruct(&[msg("user", "  padded \n"), msg("user", "\tlast ")]);
        assert_eq!(plan.prior_turns[0].content, "  padded \n");
        assert_eq!(plan.final_input, "\tlast ");
    }
}
