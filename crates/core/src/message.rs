//! Parsed chat messages.

/// One message from a channel export.
///
/// Messages are immutable once loaded. Anything derived per window (the
/// anonymized ids, the resolved reply) lives in the window that computed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub author_id: String,
    pub content: String,
    pub message_id: String,
    /// Creation time in milliseconds.
    pub timestamp: i64,
    pub replied_message_id: Option<String>,
    pub replied_user_id: Option<String>,
}

impl RawMessage {
    pub fn new(
        author_id: impl Into<String>,
        content: impl Into<String>,
        message_id: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            author_id: author_id.into(),
            content: content.into(),
            message_id: message_id.into(),
            timestamp,
            replied_message_id: None,
            replied_user_id: None,
        }
    }

    /// Attach a reply reference to this message.
    pub fn replying_to(
        mut self,
        replied_message_id: Option<impl Into<String>>,
        replied_user_id: Option<impl Into<String>>,
    ) -> Self {
        self.replied_message_id = replied_message_id.map(Into::into);
        self.replied_user_id = replied_user_id.map(Into::into);
        self
    }

    /// Whether the export carried a complete reply reference.
    ///
    /// Discord leaves `repliedUser` empty when the reply ping is turned off;
    /// such messages are treated as plain messages.
    pub fn is_reply(&self) -> bool {
        self.replied_message_id.is_some() && self.replied_user_id.is_some()
    }
}
