//! Building anonymized training examples from conversation windows.

use serde::{Deserialize, Serialize};

use crate::anonymize::username;
use crate::context::{ContextResolver, MessageContext};
use crate::error::{Result, SerializerError};
use crate::window::Window;

/// One history message of a training example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub role: String,
    pub context: String,
    pub content: String,
}

/// A serialized training record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingExample {
    pub instruction: String,
    pub context: Vec<ContextEntry>,
    pub response: String,
    pub response_user: u32,
}

/// A window with its identities anonymized and replies resolved.
///
/// All ids are local to this prompt. The same message appearing in another
/// window gets its own, independently computed context there.
#[derive(Debug, Clone)]
pub struct Prompt<'a> {
    index: usize,
    window: Window<'a>,
    authors: Vec<u32>,
    contexts: Vec<Option<MessageContext>>,
    instruction: String,
}

impl<'a> Prompt<'a> {
    /// Anonymize `window` and resolve every message's context.
    ///
    /// `index` is the window's position in emission order and only shows up
    /// in errors.
    pub fn build(index: usize, window: Window<'a>, platform: &str) -> Result<Self> {
        if window.is_empty() {
            return Err(SerializerError::EmptyWindow(index));
        }

        let mut resolver = ContextResolver::new();
        let mut authors = Vec::with_capacity(window.len());
        let mut contexts = Vec::with_capacity(window.len());

        for message in window.messages {
            authors.push(resolver.register_author(message));
            contexts.push(Some(resolver.resolve(message)));
        }

        let last_author = authors[authors.len() - 1];
        let action = if window.len() == 1 { "starting" } else { "engaging in" };
        let instruction = format!(
            "You are {} {} a conversation on {}",
            username(last_author),
            action,
            platform
        );

        Ok(Self {
            index,
            window,
            authors,
            contexts,
            instruction,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn window(&self) -> &Window<'a> {
        &self.window
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Resolved context of the message at `position` within the window.
    pub fn context(&self, position: usize) -> Option<MessageContext> {
        self.contexts.get(position).copied().flatten()
    }

    /// Anonymized author number of the message at `position`.
    pub fn author(&self, position: usize) -> Option<u32> {
        self.authors.get(position).copied()
    }

    #[cfg(test)]
    pub(crate) fn forget_context(&mut self, position: usize) {
        self.contexts[position] = None;
    }

    /// Serialize into a training record.
    ///
    /// Fails if any history message is missing its context; that can only
    /// happen if resolution was skipped and the whole run must stop.
    pub fn to_example(&self) -> Result<TrainingExample> {
        let last = self.window.len() - 1;
        let history = &self.window.messages[..last];

        let context = history
            .iter()
            .enumerate()
            .map(|(position, message)| -> Result<ContextEntry> {
                let ctx = self.contexts[position].ok_or_else(|| {
                    SerializerError::UnresolvedContext {
                        window: self.index,
                        message: message.message_id.clone(),
                    }
                })?;
                Ok(ContextEntry {
                    role: username(self.authors[position]),
                    context: ctx.to_string(),
                    content: message.content.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TrainingExample {
            instruction: self.instruction.clone(),
            context,
            response: self.window.messages[last].content.clone(),
            response_user: self.authors[last],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RawMessage;
    use crate::window::WindowKind;

    fn window(messages: &[RawMessage]) -> Window<'_> {
        Window {
            kind: WindowKind::Full,
            start: 0,
            messages,
        }
    }

    fn sample() -> Vec<RawMessage> {
        vec![
            RawMessage::new("555", "anyone around?", "a1", 0),
            RawMessage::new("777", "yep", "a2", 10).replying_to(Some("a1"), Some("555")),
            RawMessage::new("555", "nice", "a3", 20),
            RawMessage::new("999", "late reply", "a4", 30).replying_to(Some("zz"), Some("888")),
        ]
    }

    #[test]
    fn test_single_message_window() {
        let messages = vec![RawMessage::new("123", "hello", "m1", 0)];
        let prompt = Prompt::build(0, window(&messages), "Discord").unwrap();
        let example = prompt.to_example().unwrap();

        assert_eq!(example.instruction, "You are User 1 starting a conversation on Discord");
        assert!(example.context.is_empty());
        assert_eq!(example.response, "hello");
        assert_eq!(example.response_user, 1);
    }

    #[test]
    fn test_multi_message_window() {
        let messages = sample();
        let prompt = Prompt::build(0, window(&messages), "Discord").unwrap();
        let example = prompt.to_example().unwrap();

        assert_eq!(example.instruction, "You are User 3 engaging in a conversation on Discord");
        assert_eq!(example.context.len(), 3);
        assert_eq!(
            example.context[0],
            ContextEntry {
                role: "User 1".to_string(),
                context: "Message ID 1.".to_string(),
                content: "anyone around?".to_string(),
            }
        );
        assert_eq!(example.context[1].role, "User 2");
        assert_eq!(
            example.context[1].context,
            "Message ID 2.\nReplying to message ID 1 by User 1"
        );
        assert_eq!(example.context[2].role, "User 1");
        assert_eq!(example.response, "late reply");
        assert_eq!(example.response_user, 3);
    }

    #[test]
    fn test_last_message_is_resolved_but_not_in_context() {
        let messages = sample();
        let prompt = Prompt::build(0, window(&messages), "Discord").unwrap();

        let last = prompt.context(3).unwrap();
        assert_eq!(last.id, 4);
        assert_eq!(
            last.to_string(),
            "Message ID 4.\nReplying to an unknown message by an unknown user"
        );
        assert_eq!(prompt.author(3), Some(3));
    }

    #[test]
    fn test_ids_restart_per_window() {
        let messages = sample();
        let full = Prompt::build(0, window(&messages), "Discord").unwrap();
        let tail = Prompt::build(1, window(&messages[1..]), "Discord").unwrap();

        // "777" is User 2 in the full window but User 1 once the window starts at it
        assert_eq!(full.author(1), Some(2));
        assert_eq!(tail.author(0), Some(1));

        // the reply target now lies before the window
        let example = tail.to_example().unwrap();
        assert_eq!(
            example.context[0].context,
            "Message ID 1.\nReplying to an unknown message by an unknown user"
        );
        // the full window's resolution is untouched
        assert_eq!(
            full.to_example().unwrap().context[1].context,
            "Message ID 2.\nReplying to message ID 1 by User 1"
        );
    }

    #[test]
    fn test_serialization_is_repeatable() {
        let messages = sample();
        let prompt = Prompt::build(0, window(&messages), "Discord").unwrap();
        let first = serde_json::to_string(&prompt.to_example().unwrap()).unwrap();
        let second = serde_json::to_string(&prompt.to_example().unwrap()).unwrap();
        assert_eq!(first, second);

        let rebuilt = Prompt::build(0, window(&messages), "Discord").unwrap();
        assert_eq!(first, serde_json::to_string(&rebuilt.to_example().unwrap()).unwrap());
    }

    #[test]
    fn test_json_field_names() {
        let messages = vec![RawMessage::new("1", "a", "m1", 0), RawMessage::new("2", "b", "m2", 1)];
        let prompt = Prompt::build(0, window(&messages), "Discord").unwrap();
        let value = serde_json::to_value(prompt.to_example().unwrap()).unwrap();

        assert_eq!(value["responseUser"], 2);
        assert_eq!(value["context"][0]["role"], "User 1");
        assert_eq!(value["context"][0]["context"], "Message ID 1.");
        assert_eq!(value["context"][0]["content"], "a");
    }

    #[test]
    fn test_unresolved_context_is_fatal() {
        let messages = sample();
        let mut prompt = Prompt::build(7, window(&messages), "Discord").unwrap();
        prompt.forget_context(1);

        match prompt.to_example() {
            Err(SerializerError::UnresolvedContext { window, message }) => {
                assert_eq!(window, 7);
                assert_eq!(message, "a2");
            }
            other => panic!("expected UnresolvedContext, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_window_rejected() {
        assert!(matches!(
            Prompt::build(3, window(&[]), "Discord"),
            Err(SerializerError::EmptyWindow(3))
        ));
    }

    #[test]
    fn test_platform_name() {
        let messages = vec![RawMessage::new("1", "a", "m1", 0)];
        let prompt = Prompt::build(0, window(&messages), "a chat platform").unwrap();
        assert_eq!(prompt.instruction(), "You are User 1 starting a conversation on a chat platform");
    }
}
