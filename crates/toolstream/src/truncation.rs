//! Size limit applied to serialized tool results.
//!
//! Tools are expected to bound their own output. This is the last line that keeps
//! the pipeline from forwarding an unbounded payload regardless.

use serde::{Deserialize, Serialize};

/// Appended to every truncated result.
pub const TRUNCATION_MARKER: &str = "\n\n[truncated: result exceeded size limit]";

/// Default maximum result size, in characters.
pub const DEFAULT_MAX_RESULT_SIZE: usize = 10_000;

/// Size limit for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncationPolicy {
    /// Maximum number of characters kept before the marker.
    pub max_size: usize,
}

impl TruncationPolicy {
    #[must_use]
    pub const fn new(max_size: usize) -> Self {
        Self { max_size }
    }
}

impl Default for TruncationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESULT_SIZE)
    }
}

/// Cut `content` to the policy's limit.
///
/// Returns the content unchanged when it holds at most `max_size` characters.
/// Otherwise keeps the first `max_size` characters and appends [`TRUNCATION_MARKER`].
/// Length is counted in `char`s so the cut never splits a code point, and applying
/// the same policy to an already-truncated result yields the same string.
pub fn truncate_result(content: &str, policy: TruncationPolicy) -> (String, bool) {
    match content.char_indices().nth(policy.max_size) {
        None => (content.to_string(), false),
        Some((cut, _)) => (format!("{}{}", &content[..cut], TRUNCATION_MARKER), true),
    }
}
