//! Text chunking with token-bounded size and overlap.
//!
//! Token budgets are approximated at a fixed [`CHARS_PER_TOKEN`] ratio and all
//! offsets are counted in characters, so multi-byte text is never split inside
//! a code point. Chunks prefer to end right after a sentence (`". "`) or a
//! line break when one falls in the second half of the window.

use casevault_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Approximate characters per token used to size chunks.
pub const CHARS_PER_TOKEN: usize = 4;

/// Default chunk size in approximate tokens.
pub const DEFAULT_CHUNK_TOKENS: usize = 1000;

/// Default overlap between consecutive chunks in approximate tokens.
pub const DEFAULT_OVERLAP_TOKENS: usize = 200;

/// A contiguous slice of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Trimmed, never empty
    pub text: String,

    /// Position in the document's chunk sequence (0-indexed, no gaps)
    pub chunk_index: u32,

    /// Start of the untrimmed source range, in characters
    pub start: usize,

    /// End (exclusive) of the untrimmed source range, in characters
    pub end: usize,
}

/// Chunk sizing in approximate tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub chunk_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_tokens: DEFAULT_CHUNK_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
        }
    }
}

impl ChunkConfig {
    /// Create a validated configuration.
    pub fn new(chunk_tokens: usize, overlap_tokens: usize) -> AppResult<Self> {
        let config = Self {
            chunk_tokens,
            overlap_tokens,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject sizes that would produce empty windows or stall the split.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_tokens == 0 {
            return Err(AppError::InvalidInput(
                "chunk_tokens must be positive".to_string(),
            ));
        }

        if self.overlap_tokens >= self.chunk_tokens {
            return Err(AppError::InvalidInput(format!(
                "overlap_tokens ({}) must be less than chunk_tokens ({})",
                self.overlap_tokens, self.chunk_tokens
            )));
        }

        Ok(())
    }

    /// Chunk window in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_tokens * CHARS_PER_TOKEN
    }

    /// Overlap between consecutive windows in characters.
    pub fn overlap_size(&self) -> usize {
        self.overlap_tokens * CHARS_PER_TOKEN
    }

    /// Lazily split `text` into chunks.
    pub fn chunks<'a>(&self, text: &'a str) -> AppResult<Chunks<'a>> {
        self.validate()?;
        Ok(Chunks::new(text, self.chunk_size(), self.overlap_size()))
    }
}

/// Split text into overlapping, token-bounded chunks.
///
/// Returns an empty vector for empty or whitespace-only text, and a single
/// trimmed chunk when the text fits in one window.
pub fn chunk_text(text: &str, chunk_tokens: usize, overlap_tokens: usize) -> AppResult<Vec<Chunk>> {
    let config = ChunkConfig::new(chunk_tokens, overlap_tokens)?;
    let chunks: Vec<Chunk> = config.chunks(text)?.collect();

    tracing::debug!(
        "Chunked {} chars into {} chunks (size: {}, overlap: {})",
        text.chars().count(),
        chunks.len(),
        config.chunk_size(),
        config.overlap_size()
    );

    Ok(chunks)
}

/// Iterator over the chunks of one text.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    /// Byte offset of every character, plus `text.len()` as a sentinel
    offsets: Vec<usize>,
    chunk_size: usize,
    overlap_size: usize,
    start: usize,
    next_index: u32,
    done: bool,
}

impl<'a> Chunks<'a> {
    fn new(text: &'a str, chunk_size: usize, overlap_size: usize) -> Self {
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();

        Self {
            text,
            offsets,
            chunk_size,
            overlap_size,
            start: 0,
            next_index: 0,
            done: false,
        }
    }

    fn char_len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.offsets[start]..self.offsets[end]]
    }

    /// End offset just after the last sentence or line break in the window,
    /// if that break sits at or beyond the window midpoint.
    fn break_end(&self, start: usize, end: usize) -> Option<usize> {
        let window = self.slice(start, end);
        let last_break = match (window.rfind(". "), window.rfind('\n')) {
            (Some(a), Some(b)) => a.max(b),
            (a, b) => a.or(b)?,
        };

        // Both break characters are ASCII, so the byte offset is a char boundary.
        let break_char = self
            .offsets
            .binary_search(&(self.offsets[start] + last_break))
            .ok()?
            - start;

        (break_char >= self.chunk_size / 2).then_some(start + break_char + 1)
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let char_len = self.char_len();

        while !self.done && self.start < char_len {
            let start = self.start;
            let window_end = start + self.chunk_size;

            let end = if window_end < char_len {
                self.break_end(start, window_end).unwrap_or(window_end)
            } else {
                char_len
            };

            if end >= char_len {
                self.done = true;
            } else {
                // Always move forward, even if a short break window is
                // smaller than the overlap.
                self.start = end.saturating_sub(self.overlap_size).max(start + 1);
            }

            let trimmed = self.slice(start, end).trim();
            if trimmed.is_empty() {
                continue;
            }

            let chunk = Chunk {
                text: trimmed.to_string(),
                chunk_index: self.next_index,
                start,
                end,
            };
            self.next_index += 1;
            return Some(chunk);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legal_text(target_chars: usize) -> String {
        let sentence = "The petitioner authored widely cited articles on immunology. ";
        sentence.repeat(target_chars / sentence.len() + 1)[..target_chars].to_string()
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("Short text.", 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short text.");
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_short_text_is_trimmed() {
        let chunks = chunk_text("  \n Exhibit A summary. \n", 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Exhibit A summary.");
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 1000, 200).unwrap().is_empty());
    }

    #[test]
    fn test_whitespace_only_text() {
        assert!(chunk_text(" \n\t  \n", 1000, 200).unwrap().is_empty());
        assert!(chunk_text(&" ".repeat(10_000), 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_exactly_chunk_size_is_one_chunk() {
        let text = "x".repeat(400);
        let chunks = chunk_text(&text, 100, 20).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].end, 400);
    }

    #[test]
    fn test_rejects_zero_chunk_tokens() {
        let err = chunk_text("anything", 0, 0).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_chunk() {
        assert!(matches!(
            chunk_text("anything", 10, 10),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            chunk_text("anything", 10, 50),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_five_thousand_chars_multiple_chunks() {
        let text = legal_text(5000);
        let chunks = chunk_text(&text, 100, 20).unwrap();

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index as usize, i);
            assert!(!chunk.text.is_empty());
            assert_eq!(chunk.text, chunk.text.trim());
            assert!(chunk.end - chunk.start <= 400);
        }

        // Full coverage: the first chunk starts at 0, the last one reaches the
        // end, and every chunk starts before its predecessor ends.
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks.last().unwrap().end, 5000);
        for pair in chunks.windows(2) {
            assert!(pair[1].start < pair[0].end);
            assert!(pair[1].start > pair[0].start);
        }
    }

    #[test]
    fn test_overlap_without_break_adjustment() {
        // No ". " and no newline: windows are never adjusted.
        let text = "abcdefghijklmnopqrstuvwxyz".repeat(40);
        let chunks = chunk_text(&text, 50, 10).unwrap();

        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start, pair[0].end - 40);
            let tail = &pair[0].text[pair[0].text.len() - 40..];
            assert!(pair[1].text.starts_with(tail));
        }
    }

    #[test]
    fn test_sentence_break_after_midpoint() {
        let text = format!("{}. {}", "a".repeat(30), "b".repeat(30));
        let chunks = chunk_text(&text, 10, 0).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, format!("{}.", "a".repeat(30)));
        assert_eq!(chunks[0].end, 31);
        assert_eq!(chunks[1].text, "b".repeat(30));
    }

    #[test]
    fn test_sentence_break_before_midpoint_is_ignored() {
        let text = format!("{}. {}", "a".repeat(10), "b".repeat(50));
        let chunks = chunk_text(&text, 10, 0).unwrap();

        assert_eq!(chunks[0].end, 40);
        assert_eq!(chunks[0].text.chars().count(), 40);
    }

    #[test]
    fn test_newline_break() {
        let text = format!("{}\n{}", "a".repeat(25), "b".repeat(40));
        let chunks = chunk_text(&text, 10, 0).unwrap();

        assert_eq!(chunks[0].text, "a".repeat(25));
        assert_eq!(chunks[0].end, 26);
        assert!(chunks[1].text.starts_with('b'));
    }

    #[test]
    fn test_deterministic() {
        let text = legal_text(7321);
        let first = chunk_text(&text, 64, 16).unwrap();
        let second = chunk_text(&text, 64, 16).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_lazy_iterator_matches_collected() {
        let text = legal_text(3000);
        let config = ChunkConfig::new(50, 10).unwrap();
        let first_two: Vec<Chunk> = config.chunks(&text).unwrap().take(2).collect();
        let all = chunk_text(&text, 50, 10).unwrap();
        assert_eq!(first_two[..], all[..2]);
    }

    #[test]
    fn test_utf8_safety() {
        let text = "Petição aprovada 🎉 com distinção: ã, õ, ç, é. ".repeat(120);
        let chunks = chunk_text(&text, 25, 5).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 100);
            assert!(!chunk.text.is_empty());
        }
    }

    #[test]
    fn test_large_break_window_still_progresses() {
        // Breaks land right at the midpoint so each chunk is half a window,
        // smaller than the overlap would allow without the progress guard.
        let text = format!("{}\n", "z".repeat(20)).repeat(50);
        let chunks = chunk_text(&text, 10, 9).unwrap();

        assert!(!chunks.is_empty());
        for pair in chunks.windows(2) {
            assert!(pair[1].start > pair[0].start);
        }
        assert_eq!(chunks.last().unwrap().end, text.chars().count());
    }
}
