//! Grounding context for downstream text generation.
//!
//! Turns ranked chunks into a numbered, attributed context block and a list
//! of source references the caller can show next to generated text.

use crate::types::RetrievedChunk;
use serde::{Deserialize, Serialize};

/// Default snippet length for [`source_refs`], in characters.
pub const DEFAULT_SNIPPET_CHARS: usize = 200;

/// Attribution for one chunk used as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub document_id: String,
    pub document_name: String,
    pub chunk_index: u32,
    pub score: f32,
    pub snippet: String,
}

/// Format chunks as numbered source blocks separated by `---`.
///
/// Block numbering starts at 1 and follows the input order, so a generator
/// citing "Source 2" refers to the second chunk passed in.
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[Source {}: {} (chunk {})]\n{}",
                i + 1,
                chunk.document_name,
                chunk.chunk_index,
                chunk.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// One reference per chunk, with its text cut to `max_snippet_chars`.
pub fn source_refs(chunks: &[RetrievedChunk], max_snippet_chars: usize) -> Vec<SourceRef> {
    chunks
        .iter()
        .map(|chunk| SourceRef {
            document_id: chunk.document_id.clone(),
            document_name: chunk.document_name.clone(),
            chunk_index: chunk.chunk_index,
            score: chunk.score,
            snippet: snippet(&chunk.text, max_snippet_chars),
        })
        .collect()
}

fn snippet(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(document_name: &str, chunk_index: u32, text: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            document_id: format!("id-{}", document_name),
            document_name: document_name.to_string(),
            document_type: "evidence".to_string(),
            chunk_index,
            text: text.to_string(),
            score,
        }
    }

    #[test]
    fn test_build_context_numbers_sources() {
        let chunks = vec![
            chunk("cv.pdf", 0, "Ten years of research.", 0.9),
            chunk("letter.pdf", 4, "  Strong recommendation.\n", 0.5),
        ];

        let context = build_context(&chunks);
        assert_eq!(
            context,
            "[Source 1: cv.pdf (chunk 0)]\nTen years of research.\n\n---\n\n\
             [Source 2: letter.pdf (chunk 4)]\nStrong recommendation."
        );
    }

    #[test]
    fn test_build_context_empty() {
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_source_refs_truncate_snippets() {
        let chunks = vec![
            chunk("cv.pdf", 1, "short", 0.8),
            chunk("award.pdf", 2, "Gold medal for outstanding work", 0.7),
        ];

        let refs = source_refs(&chunks, 10);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].snippet, "short");
        assert_eq!(refs[1].snippet, "Gold medal...");
        assert_eq!(refs[1].document_id, "id-award.pdf");
        assert_eq!(refs[1].chunk_index, 2);
        assert_eq!(refs[1].score, 0.7);
    }

    #[test]
    fn test_snippet_respects_char_boundaries() {
        assert_eq!(snippet("éèêëàâ", 3), "éèê...");
        assert_eq!(snippet("日本語", 3), "日本語");
    }
}
