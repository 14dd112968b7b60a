//! Causal reply resolution within a window.

use std::fmt;

use crate::anonymize::{username, IdentityMap};
use crate::message::RawMessage;

/// The anonymized target of a reply. Either side may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTarget {
    pub message_id: Option<u32>,
    pub user_id: Option<u32>,
}

/// Window-local description of one message and what it replies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageContext {
    pub id: u32,
    pub reply: Option<ReplyTarget>,
}

impl MessageContext {
    pub fn new(id: u32) -> Self {
        Self { id, reply: None }
    }

    pub fn with_reply(id: u32, message_id: Option<u32>, user_id: Option<u32>) -> Self {
        Self {
            id,
            reply: Some(ReplyTarget { message_id, user_id }),
        }
    }
}

impl fmt::Display for MessageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message ID {}.", self.id)?;

        let Some(reply) = self.reply else {
            return Ok(());
        };

        f.write_str("\nReplying to")?;
        match reply.message_id {
            Some(id) => write!(f, " message ID {}", id)?,
            None => f.write_str(" an unknown message")?,
        }
        f.write_str(" by")?;
        match reply.user_id {
            Some(id) => write!(f, " {}", username(id)),
            None => f.write_str(" an unknown user"),
        }
    }
}

/// Resolves message contexts against the identity maps of a single window.
///
/// Only ids registered before the message being resolved are visible, so a
/// reply can never point forward in the window.
#[derive(Debug, Default)]
pub struct ContextResolver {
    users: IdentityMap,
    messages: IdentityMap,
}

impl ContextResolver {
    pub fn new() -> Self {
        Self {
            users: IdentityMap::new(),
            messages: IdentityMap::new(),
        }
    }

    /// Register the author of `message` and return their window-local number.
    pub fn register_author(&mut self, message: &RawMessage) -> u32 {
        self.users.register(&message.author_id)
    }

    /// Assign `message` the next message number and resolve its reply.
    pub fn resolve(&mut self, message: &RawMessage) -> MessageContext {
        let id = self.messages.register_fresh(&message.message_id);

        if !message.is_reply() {
            return MessageContext::new(id);
        }

        let user_id = message
            .replied_user_id
            .as_deref()
            .and_then(|u| self.users.get(u));
        // A tracked message is only reported alongside a tracked author
        let message_id = user_id.and(
            message
                .replied_message_id
                .as_deref()
                .and_then(|m| self.messages.get(m)),
        );

        MessageContext::with_reply(id, message_id, user_id)
    }

    pub fn user_id(&self, author_id: &str) -> Option<u32> {
        self.users.get(author_id)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}
