//! Pipeline for turning channel exports into JSONL training records.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, SerializerError};
use crate::format::TextRecord;
use crate::message::RawMessage;
use crate::prompt::Prompt;
use crate::window::{segment, SegmenterConfig, WindowKind};
use crate::{DEFAULT_PLATFORM, HALF_WINDOW_THRESHOLD, MAX_CONVERSATION_LENGTH, ONE_HOUR};

/// Name of the training records file inside the output directory.
pub const PROMPTS_FILE: &str = "prompts.jsonl";

/// Name of the flattened prompt-format file inside the output directory.
pub const PROMPT_FORMAT_FILE: &str = "conversations_prompt_format.jsonl";

/// Configuration for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub max_conversation_length: usize,
    /// Milliseconds of silence that end a conversation.
    pub inactivity_gap: i64,
    pub half_window_threshold: usize,
    /// Platform named in every instruction.
    pub platform: String,
    /// Also write the flattened prompt-format file.
    pub prompt_format: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_conversation_length: MAX_CONVERSATION_LENGTH,
            inactivity_gap: ONE_HOUR,
            half_window_threshold: HALF_WINDOW_THRESHOLD,
            platform: DEFAULT_PLATFORM.to_string(),
            prompt_format: false,
        }
    }
}

impl PipelineConfig {
    /// Read a TOML config file. Missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_conversation_length == 0 {
            return Err(SerializerError::InvalidConfig(
                "max_conversation_length must be at least 1".to_string(),
            ));
        }
        if self.inactivity_gap < 0 {
            return Err(SerializerError::InvalidConfig(
                "inactivity_gap must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            max_conversation_length: self.max_conversation_length,
            inactivity_gap: self.inactivity_gap,
            half_window_threshold: self.half_window_threshold,
        }
    }
}

/// Counts gathered while loading exports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub messages_loaded: usize,
    /// Rows without content or flagged as system messages.
    pub rows_filtered: usize,
    /// Rows missing an author, id or timestamp.
    pub rows_invalid: usize,
}

/// Messages of every export, in load order.
#[derive(Debug, Default)]
pub struct LoadedMessages {
    pub messages: Vec<RawMessage>,
    pub report: LoadReport,
}

/// Result of writing all windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineResult {
    pub total_windows: usize,
    pub opening_windows: usize,
    pub half_windows: usize,
    pub full_windows: usize,
    pub total_context_messages: usize,
    pub prompts_path: PathBuf,
    pub prompt_format_path: Option<PathBuf>,
}

/// Messages parsed from a single export file.
#[derive(Debug, Default)]
struct FileMessages {
    messages: Vec<RawMessage>,
    filtered: usize,
    invalid: usize,
}

enum Row {
    Message(RawMessage),
    Filtered,
    Invalid,
}

/// Discover all JSON exports under a directory, sorted by path.
pub fn discover_json_files(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping unreadable path under {:?}: {}", root, err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}

/// Parse one export file: a JSON array of message objects.
pub fn load_export_file(path: &Path) -> Result<Vec<RawMessage>> {
    Ok(parse_export_file(path)?.messages)
}

fn parse_export_file(path: &Path) -> Result<FileMessages> {
    let raw = std::fs::read_to_string(path)?;
    let data: Value = serde_json::from_str(&raw)?;

    let Value::Array(rows) = data else {
        return Err(SerializerError::InvalidExport(format!(
            "{} is not a JSON array",
            path.display()
        )));
    };

    let mut parsed = FileMessages::default();
    for (position, row) in rows.iter().enumerate() {
        match parse_row(row) {
            Row::Message(message) => parsed.messages.push(message),
            Row::Filtered => parsed.filtered += 1,
            Row::Invalid => {
                debug!(path = %path.display(), position, "skipping row without author, id or timestamp");
                parsed.invalid += 1;
            }
        }
    }
    Ok(parsed)
}

fn parse_row(row: &Value) -> Row {
    let content = match row.get("content") {
        Some(Value::String(s)) if !s.is_empty() => s,
        _ => return Row::Filtered,
    };
    if row.get("system").map_or(false, is_truthy) {
        return Row::Filtered;
    }

    let author_id = row.get("authorId").and_then(id_string);
    let message_id = row.get("id").and_then(id_string);
    let timestamp = row.get("createdTimestamp").and_then(timestamp_millis);

    let (Some(author_id), Some(message_id), Some(timestamp)) = (author_id, message_id, timestamp)
    else {
        return Row::Invalid;
    };

    let replied_user_id = row.pointer("/mentions/repliedUser").and_then(id_string);
    let replied_message_id = row.pointer("/reference/messageId").and_then(id_string);

    Row::Message(
        RawMessage::new(author_id, content.as_str(), message_id, timestamp)
            .replying_to(replied_message_id, replied_user_id),
    )
}

/// Snowflakes arrive as strings, older exports sometimes as numbers.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn timestamp_millis(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Load every export under `root`.
///
/// Files are parsed in parallel but concatenated in sorted path order, so
/// the result matches a sequential load. Unreadable or malformed files are
/// logged and skipped. A missing directory yields no messages.
pub fn load_message_data(root: &Path) -> LoadedMessages {
    if !root.is_dir() {
        warn!("Directory {:?} not found", root);
        return LoadedMessages::default();
    }

    let files = discover_json_files(root);
    if files.is_empty() {
        warn!("No JSON exports found under {:?}", root);
    }

    let parsed: Vec<(PathBuf, Result<FileMessages>)> = files
        .into_par_iter()
        .map(|path| {
            let result = parse_export_file(&path);
            (path, result)
        })
        .collect();

    let mut loaded = LoadedMessages::default();
    for (path, result) in parsed {
        match result {
            Ok(file) => {
                info!(
                    "Loaded {:?} with {} valid messages",
                    path,
                    file.messages.len()
                );
                loaded.report.files_loaded += 1;
                loaded.report.rows_filtered += file.filtered;
                loaded.report.rows_invalid += file.invalid;
                loaded.messages.extend(file.messages);
            }
            Err(e) => {
                warn!("Error loading {:?}: {}", path, e);
                loaded.report.files_skipped += 1;
            }
        }
    }
    loaded.report.messages_loaded = loaded.messages.len();

    loaded
}

/// Segment `messages` and build one prompt per emitted window.
pub fn generate_prompts<'a>(
    messages: &'a [RawMessage],
    config: &PipelineConfig,
) -> Result<Vec<Prompt<'a>>> {
    config.validate()?;

    segment(messages, &config.segmenter_config())
        .into_iter()
        .enumerate()
        .map(|(index, window)| Prompt::build(index, window, &config.platform))
        .collect()
}

/// Write one JSON line per prompt, in order.
///
/// Every prompt is serialized before any file is touched, so a prompt that
/// fails aborts the write and leaves existing output untouched.
pub fn write_jsonl_output(
    prompts: &[Prompt<'_>],
    output_dir: &Path,
    prompt_format: bool,
) -> Result<PipelineResult> {
    let examples = prompts
        .iter()
        .map(|prompt| prompt.to_example())
        .collect::<Result<Vec<_>>>()?;

    let prompts_path = output_dir.join(PROMPTS_FILE);
    let prompt_format_path = prompt_format.then(|| output_dir.join(PROMPT_FORMAT_FILE));

    let mut result = PipelineResult {
        total_windows: 0,
        opening_windows: 0,
        half_windows: 0,
        full_windows: 0,
        total_context_messages: 0,
        prompts_path: prompts_path.clone(),
        prompt_format_path: prompt_format_path.clone(),
    };

    let mut lines = Vec::with_capacity(examples.len());
    let mut text_lines = Vec::new();
    for (prompt, example) in prompts.iter().zip(&examples) {
        lines.push(serde_json::to_string(example)?);
        if prompt_format {
            text_lines.push(serde_json::to_string(&TextRecord::from(example))?);
        }

        result.total_windows += 1;
        result.total_context_messages += example.context.len();
        match prompt.window().kind {
            WindowKind::Opening => result.opening_windows += 1,
            WindowKind::Half => result.half_windows += 1,
            WindowKind::Full => result.full_windows += 1,
        }
    }

    std::fs::create_dir_all(output_dir)?;

    let mut prompts_file = BufWriter::new(File::create(&prompts_path)?);
    for line in &lines {
        writeln!(prompts_file, "{}", line)?;
    }
    let mut text_file = match &prompt_format_path {
        Some(path) => {
            let mut file = BufWriter::new(File::create(path)?);
            for line in &text_lines {
                writeln!(file, "{}", line)?;
            }
            Some(file)
        }
        None => None,
    };

    prompts_file.flush()?;
    if let Some(file) = text_file.as_mut() {
        file.flush()?;
    }

    info!("Saved {} prompts to {:?}", result.total_windows, prompts_path);
    if let Some(path) = &prompt_format_path {
        info!("Saved {} prompt-format records to {:?}", result.total_windows, path);
    }

    Ok(result)
}
