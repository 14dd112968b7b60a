//! Flattening training examples into single-text prompts for causal LM tuning.

use serde::Serialize;

use crate::prompt::TrainingExample;

/// Marker appended after every response.
pub const END_OF_TEXT_TOKEN: &str = "<|end_of_text|>";

/// A prompt-format record, written as `{"text": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextRecord {
    pub text: String,
}

impl From<&TrainingExample> for TextRecord {
    fn from(example: &TrainingExample) -> Self {
        Self {
            text: to_prompt_format(example),
        }
    }
}

/// Render `example` as a `### Context:` / `### Response:` prompt.
///
/// History entries carry their rendered context above the content, and the
/// instruction becomes the final `system` line of the context block.
pub fn to_prompt_format(example: &TrainingExample) -> String {
    let mut out = String::from("### Context:\n");

    for entry in &example.context {
        out.push_str(&format!("{}: {}\n{}\n\n", entry.role, entry.context, entry.content));
    }
    out.push_str(&format!("system: {}\n", example.instruction));

    out.push_str("\n### Response:\n");
    out.push_str(&example.response);
    out.push_str(END_OF_TEXT_TOKEN);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ContextEntry;

    #[test]
    fn test_prompt_format() {
        let example = TrainingExample {
            instruction: "You are User 2 engaging in a conversation on Discord".to_string(),
            context: vec![ContextEntry {
                role: "User 1".to_string(),
                context: "Message ID 1.".to_string(),
                content: "hello".to_string(),
            }],
            response: "hi".to_string(),
            response_user: 2,
        };

        assert_eq!(
            to_prompt_format(&example),
            "### Context:\nUser 1: Message ID 1.\nhello\n\n\
             system: You are User 2 engaging in a conversation on Discord\n\
             \n### Response:\nhi<|end_of_text|>"
        );
    }

    #[test]
    fn test_prompt_format_without_history() {
        let example = TrainingExample {
            instruction: "You are User 1 starting a conversation on Discord".to_string(),
            context: Vec::new(),
            response: "first!".to_string(),
            response_user: 1,
        };

        let record = TextRecord::from(&example);
        assert!(record.text.starts_with("### Context:\nsystem: You are User 1 starting"));
        assert!(record.text.ends_with("### Response:\nfirst!<|end_of_text|>"));
    }
}
