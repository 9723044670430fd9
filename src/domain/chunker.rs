//! Sliding-window text chunker.
//!
//! Splits text into windows of at most `max_chars` characters. Consecutive
//! windows share exactly `overlap_chars` characters. When a window does not
//! reach the end of the text, its end is pulled back to the nearest sentence
//! terminator (or, failing that, whitespace) within a short lookback, and a
//! hard cut is used when neither exists.
//!
//! Lengths are counted in characters, so a split never lands inside a
//! multi-byte code point.
//!
//! ```
//! use campusrag::domain::chunker::{chunk, merge_chunks};
//!
//! let text = "First sentence. Second sentence. Third one.";
//! let chunks = chunk(text, 20, 5).unwrap();
//! assert!(chunks.len() > 1);
//! assert_eq!(merge_chunks(&chunks), text);
//! ```

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', ';', '\n', '。', '！', '？', '；'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, DomainError> {
        if max_chars == 0 {
            return Err(DomainError::InvalidInput("max_chars must be greater than 0".into()));
        }
        if overlap_chars >= max_chars {
            return Err(DomainError::InvalidInput(format!(
                "overlap_chars ({overlap_chars}) must be smaller than max_chars ({max_chars})"
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 500,
            overlap_chars: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub parent_id: String,
    pub sequence_index: usize,
    /// Char offset of the first character in the parent text.
    pub start: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Split `text` into overlapping chunks.
pub fn chunk(text: &str, max_chars: usize, overlap_chars: usize) -> Result<Vec<Chunk>, DomainError> {
    let config = ChunkingConfig::new(max_chars, overlap_chars)?;
    Ok(chunk_document("", text, &config))
}

/// Split `text` into overlapping chunks tagged with `parent_id`.
///
/// Empty or whitespace-only text yields no chunks; text no longer than
/// `max_chars` yields one chunk equal to the input.
pub fn chunk_document(parent_id: &str, text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total = chars.len();
    let byte_at = |c: usize| if c == total { text.len() } else { offsets[c] };
    let lookback = (config.max_chars / 5).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let hard_end = (start + config.max_chars).min(total);
        let end = if hard_end == total {
            total
        } else {
            // Never end inside the overlap region, or the next window would not advance.
            let floor = hard_end
                .saturating_sub(lookback)
                .max(start + config.overlap_chars + 1);
            find_break(&chars, floor, hard_end).unwrap_or(hard_end)
        };

        chunks.push(Chunk {
            parent_id: parent_id.to_string(),
            sequence_index: chunks.len(),
            start,
            text: text[byte_at(start)..byte_at(end)].to_string(),
        });

        if end == total {
            break;
        }
        start = end - config.overlap_chars;
    }
    chunks
}

/// Best window end in `floor..=hard_end`: just after a sentence terminator,
/// else just after whitespace.
fn find_break(chars: &[char], floor: usize, hard_end: usize) -> Option<usize> {
    if floor > hard_end || floor == 0 {
        return None;
    }
    let candidates = || (floor..=hard_end).rev();
    candidates()
        .find(|&b| SENTENCE_TERMINATORS.contains(&chars[b - 1]))
        .or_else(|| candidates().find(|&b| chars[b - 1].is_whitespace()))
}

/// Rebuild the original text from chunks, dropping the overlapped prefix of
/// each chunk. Chunks may arrive in any order.
pub fn merge_chunks(chunks: &[Chunk]) -> String {
    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| (c.start, c.sequence_index));

    let mut merged = String::new();
    let mut covered = 0;
    for c in ordered {
        let len = c.char_len();
        if c.start + len <= covered {
            continue;
        }
        let skip = covered.saturating_sub(c.start);
        merged.extend(c.text.chars().skip(skip));
        covered = c.start + len;
    }
    merged
}
