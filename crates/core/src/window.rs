//! Segmentation of a message stream into overlapping conversation windows.

use serde::Serialize;
use tracing::debug;

use crate::message::RawMessage;
use crate::{HALF_WINDOW_THRESHOLD, MAX_CONVERSATION_LENGTH, ONE_HOUR};

/// Why a window was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// The single message that opened a conversation.
    Opening,
    /// Leading half of a long conversation.
    Half,
    /// A whole conversation, up to and including the message that closed it.
    Full,
}

/// A contiguous run of messages that becomes one training example.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    pub kind: WindowKind,
    /// Index of the first message in the loaded sequence.
    pub start: usize,
    pub messages: &'a [RawMessage],
}

impl<'a> Window<'a> {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&'a RawMessage> {
        self.messages.last()
    }
}

/// Thresholds that decide where conversations end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmenterConfig {
    /// A window closes once it spans this many messages past its start.
    pub max_conversation_length: usize,
    /// Silence longer than this between consecutive messages closes a window.
    pub inactivity_gap: i64,
    /// Closing windows longer than this also yield a half window.
    pub half_window_threshold: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_conversation_length: MAX_CONVERSATION_LENGTH,
            inactivity_gap: ONE_HOUR,
            half_window_threshold: HALF_WINDOW_THRESHOLD,
        }
    }
}

/// Single forward pass over a message sequence.
///
/// Every conversation produces an opening window as soon as its first
/// message arrives and a full window when it closes. Messages buffered after
/// the last close are never emitted.
pub struct Segmenter<'a> {
    messages: &'a [RawMessage],
    config: SegmenterConfig,
    start: usize,
    windows: Vec<Window<'a>>,
}

impl<'a> Segmenter<'a> {
    pub fn new(messages: &'a [RawMessage], config: SegmenterConfig) -> Self {
        Self {
            messages,
            config,
            start: 0,
            windows: Vec::new(),
        }
    }

    /// Run over every message and return the windows in emission order.
    pub fn run(mut self) -> Vec<Window<'a>> {
        for index in 0..self.messages.len() {
            self.step(index);
        }

        let trailing = self.messages.len().saturating_sub(self.start);
        if trailing > 0 {
            debug!(trailing, "dropping messages of unclosed conversation");
        }

        self.windows
    }

    fn step(&mut self, index: usize) {
        let length = index - self.start;

        if index == self.start {
            self.emit(WindowKind::Opening, self.start, index + 1);
            return;
        }

        if self.closes_at(index, length) {
            self.emit_half(length);
            self.emit(WindowKind::Full, self.start, index + 1);
            self.start = index + 1;
        }
    }

    fn closes_at(&self, index: usize, length: usize) -> bool {
        let gap = self.messages[index]
            .timestamp
            .saturating_sub(self.messages[index - 1].timestamp);
        gap > self.config.inactivity_gap || length >= self.config.max_conversation_length
    }

    fn emit_half(&mut self, length: usize) {
        if length > self.config.half_window_threshold {
            // round(length / 2), halves rounded up
            let half = (length + 1) / 2;
            self.emit(WindowKind::Half, self.start, self.start + half);
        }
    }

    fn emit(&mut self, kind: WindowKind, start: usize, end: usize) {
        debug!(?kind, start, end, "emitting window");
        self.windows.push(Window {
            kind,
            start,
            messages: &self.messages[start..end],
        });
    }
}

/// Split `messages` into windows using `config`.
pub fn segment<'a>(messages: &'a [RawMessage], config: &SegmenterConfig) -> Vec<Window<'a>> {
    Segmenter::new(messages, *config).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(timestamps: &[i64]) -> Vec<RawMessage> {
        timestamps
            .iter()
            .enumerate()
            .map(|(i, &ts)| {
                RawMessage::new(format!("u{}", i % 3), format!("m{}", i), i.to_string(), ts)
            })
            .collect()
    }

    fn dense(count: usize) -> Vec<RawMessage> {
        stream(&(0..count as i64).collect::<Vec<_>>())
    }

    fn shape(windows: &[Window<'_>]) -> Vec<(WindowKind, usize, usize)> {
        windows.iter().map(|w| (w.kind, w.start, w.len())).collect()
    }

    #[test]
    fn test_empty_stream() {
        assert!(segment(&[], &SegmenterConfig::default()).is_empty());
    }

    #[test]
    fn test_dense_run_closes_at_max_length() {
        let messages = dense(21);
        let windows = segment(&messages, &SegmenterConfig::default());
        assert_eq!(
            shape(&windows),
            vec![
                (WindowKind::Opening, 0, 1),
                (WindowKind::Half, 0, 10),
                (WindowKind::Full, 0, 21),
            ]
        );
        assert_eq!(windows[1].messages[9].message_id, "9");
        assert_eq!(windows[2].last().unwrap().message_id, "20");
    }

    #[test]
    fn test_dense_run_of_twenty_never_closes() {
        let messages = dense(20);
        let windows = segment(&messages, &SegmenterConfig::default());
        assert_eq!(shape(&windows), vec![(WindowKind::Opening, 0, 1)]);
    }

    #[test]
    fn test_gap_closes_without_half() {
        let messages = stream(&[0, ONE_HOUR + 1]);
        let windows = segment(&messages, &SegmenterConfig::default());
        assert_eq!(
            shape(&windows),
            vec![(WindowKind::Opening, 0, 1), (WindowKind::Full, 0, 2)]
        );
    }

    #[test]
    fn test_gap_of_exactly_one_hour_does_not_close() {
        let messages = stream(&[0, ONE_HOUR]);
        let windows = segment(&messages, &SegmenterConfig::default());
        assert_eq!(shape(&windows), vec![(WindowKind::Opening, 0, 1)]);
    }

    #[test]
    fn test_trailing_messages_dropped() {
        let messages = dense(5);
        let windows = segment(&messages, &SegmenterConfig::default());
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].messages, &messages[..1]);
    }

    #[test]
    fn test_next_conversation_opens_after_close() {
        let mut timestamps = vec![0, ONE_HOUR * 2];
        timestamps.extend([ONE_HOUR * 2 + 1, ONE_HOUR * 5]);
        let messages = stream(&timestamps);
        let windows = segment(&messages, &SegmenterConfig::default());
        assert_eq!(
            shape(&windows),
            vec![
                (WindowKind::Opening, 0, 1),
                (WindowKind::Full, 0, 2),
                (WindowKind::Opening, 2, 1),
                (WindowKind::Full, 2, 2),
            ]
        );
    }

    #[test]
    fn test_half_window_threshold_is_strict() {
        // L = 10 at the gap: no half window
        let mut timestamps: Vec<i64> = (0..10).collect();
        timestamps.push(ONE_HOUR * 10);
        let messages = stream(&timestamps);
        let windows = segment(&messages, &SegmenterConfig::default());
        assert!(windows.iter().all(|w| w.kind != WindowKind::Half));

        // L = 11: half window of round(5.5) = 6 messages
        let mut timestamps: Vec<i64> = (0..11).collect();
        timestamps.push(ONE_HOUR * 10);
        let messages = stream(&timestamps);
        let windows = segment(&messages, &SegmenterConfig::default());
        assert_eq!(
            shape(&windows),
            vec![
                (WindowKind::Opening, 0, 1),
                (WindowKind::Half, 0, 6),
                (WindowKind::Full, 0, 12),
            ]
        );
    }

    #[test]
    fn test_custom_max_length() {
        let config = SegmenterConfig {
            max_conversation_length: 2,
            ..Default::default()
        };
        let messages = dense(6);
        let windows = segment(&messages, &config);
        assert_eq!(
            shape(&windows),
            vec![
                (WindowKind::Opening, 0, 1),
                (WindowKind::Full, 0, 3),
                (WindowKind::Opening, 3, 1),
                (WindowKind::Full, 3, 3),
            ]
        );
    }

    #[test]
    fn test_windows_share_messages() {
        let messages = dense(21);
        let windows = segment(&messages, &SegmenterConfig::default());
        let first = &messages[0];
        assert!(windows.iter().all(|w| &w.messages[0] == first));
    }
}
