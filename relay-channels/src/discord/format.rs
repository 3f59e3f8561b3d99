//! Discord message formatting.
//!
//! Discord rejects messages over 2000 characters. Replies are normally cut
//! smaller by the relay; the adapter re-splits at the hard limit as a guard.

use serde_json::Value;

/// Maximum message length for Discord.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Split text into chunks that fit Discord's character limit.
pub fn split_message(text: &str) -> Vec<String> {
    relay_core::split_message(text, MAX_MESSAGE_LENGTH)
}

const DEBUG_HEADER: &str = "Raw Message : \n";
const FENCE_OPEN: &str = "```json\n";
const FENCE_CLOSE: &str = "\n```";

/// Render a raw backend payload for `--debug` replies.
///
/// The pretty JSON is split first and every segment of at most `max_len`
/// characters carries its own fence.
pub fn debug_segments(raw: &Value, max_len: usize) -> Vec<String> {
    let pretty = serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string());
    let overhead = DEBUG_HEADER.len() + FENCE_OPEN.len() + FENCE_CLOSE.len();
    let budget = max_len.saturating_sub(overhead).max(1);

    relay_core::split_message(&pretty, budget)
        .into_iter()
        .enumerate()
        .map(|(index, segment)| {
            let header = if index == 0 { DEBUG_HEADER } else { "" };
            format!("{header}{FENCE_OPEN}{segment}{FENCE_CLOSE}")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_short_message() {
        let text = "Short message";
        let chunks = split_message(text);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn split_long_message() {
        let text = "a ".repeat(1500);
        let chunks = split_message(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= MAX_MESSAGE_LENGTH);
        }
    }

    #[test]
    fn debug_segments_small_payload() {
        let segments = debug_segments(&json!({"id": "x"}), 1800);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].starts_with("Raw Message : \n```json\n{"));
        assert!(segments[0].contains("\"id\": \"x\""));
        assert!(segments[0].ends_with("}\n```"));
    }

    #[test]
    fn debug_segments_keep_every_chunk_fenced() {
        let items: Vec<String> = (0..200).map(|i| format!("item number {i}")).collect();
        let raw = json!({ "items": items });
        let segments = debug_segments(&raw, 300);

        assert!(segments.len() > 1);
        assert!(segments[0].starts_with("Raw Message : \n```json\n"));
        for segment in &segments {
            assert!(segment.chars().count() <= 300);
            assert!(segment.ends_with("\n```"));
            assert_eq!(segment.matches("```").count(), 2);
        }
        for segment in &segments[1..] {
            assert!(segment.starts_with("```json\n"));
        }
    }
}
