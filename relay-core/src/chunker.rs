//! Reply chunking.
//!
//! Chat platforms cap the size of a single message, so long backend answers are
//! cut into segments. Each cut prefers the last line break inside the window,
//! then the last sentence end (`". "`), and falls back to a hard cut at the
//! limit. Lengths are counted in characters, so a cut never lands inside a
//! multi-byte character.

/// Default segment size for relayed answers.
pub const DEFAULT_MAX_LENGTH: usize = 1800;

/// Split `text` into trimmed, non-empty segments of at most `max_len` characters.
///
/// The sentence search only looks inside the `max_len` window, so a `". "`
/// pair straddling the window edge is not used as a split point. A `max_len`
/// of zero is treated as one.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut segments = Vec::new();
    let mut rest = text;

    while let Some(window_end) = char_boundary(rest, max_len) {
        let split = match find_split_point(&rest[..window_end]) {
            Some(idx) => idx,
            None => window_end,
        };

        push_segment(&mut segments, &rest[..split]);
        rest = rest[split..].trim();
    }

    push_segment(&mut segments, rest);
    segments
}

/// Byte offset of the `n`th character, or `None` when the text has `n` characters or fewer.
fn char_boundary(text: &str, n: usize) -> Option<usize> {
    text.char_indices().nth(n).map(|(idx, _)| idx)
}

/// Preferred split point inside `window`. An index of zero counts as no split point.
fn find_split_point(window: &str) -> Option<usize> {
    let idx = match window.rfind('\n') {
        Some(idx) => idx,
        // keep the period with the sentence it ends
        None => window.rfind(". ").map_or(0, |idx| idx + 1),
    };
    (idx > 0).then_some(idx)
}

fn push_segment(segments: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
}
