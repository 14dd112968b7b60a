//! Core serialization logic for chat-export training data.
//!
//! This crate turns channel exports into persona training examples: the
//! message stream is cut into overlapping conversation windows, every window
//! gets its own anonymized user and message ids, replies are resolved
//! against what the window has already seen, and each window becomes one
//! instruction/context/response record.

mod anonymize;
mod context;
pub mod error;
pub mod format;
mod message;
pub mod pipeline;
mod prompt;
mod window;

pub use anonymize::{username, IdentityMap};
pub use context::{ContextResolver, MessageContext, ReplyTarget};
pub use error::{Result, SerializerError};
pub use format::{to_prompt_format, TextRecord, END_OF_TEXT_TOKEN};
pub use message::RawMessage;
pub use pipeline::{
    discover_json_files, generate_prompts, load_export_file, load_message_data,
    write_jsonl_output, LoadReport, LoadedMessages, PipelineConfig, PipelineResult,
};
pub use prompt::{ContextEntry, Prompt, TrainingExample};
pub use window::{segment, Segmenter, SegmenterConfig, Window, WindowKind};

/// Default maximum number of messages past a window's start before it closes
pub const MAX_CONVERSATION_LENGTH: usize = 20;

/// Default inactivity gap (milliseconds) that closes a conversation
pub const ONE_HOUR: i64 = 3_600_000;

/// Closing windows longer than this also emit their leading half
pub const HALF_WINDOW_THRESHOLD: usize = 10;

/// Platform named in instructions when none is configured
pub const DEFAULT_PLATFORM: &str = "Discord";
