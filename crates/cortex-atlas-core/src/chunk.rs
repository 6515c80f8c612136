//! Paragraph-then-sentence text chunker.
//!
//! Splits document content into [`Chunk`]s whose length (in characters)
//! lies within `[MIN_CHUNK_LENGTH, MAX_CHUNK_LENGTH]`. Splitting prefers
//! blank-line paragraph boundaries so each chunk stays a coherent unit of
//! thought, and falls back to sentence boundaries for long paragraphs.
//!
//! # Algorithm
//!
//! 1. Split text on blank lines and trim each paragraph.
//! 2. A paragraph of at most `MAX_CHUNK_LENGTH` chars is kept whole if it
//!    has at least `MIN_CHUNK_LENGTH` chars, and dropped otherwise.
//! 3. A longer paragraph is split into sentences (`.`, `!`, `?` followed
//!    by whitespace). Sentences are joined with single spaces into a buffer
//!    until the next one would push it past `MAX_CHUNK_LENGTH`; the buffer
//!    is then flushed (if long enough) and restarted with that sentence.
//! 4. A single sentence longer than `MAX_CHUNK_LENGTH` is hard-split at the
//!    last whitespace before the limit.
//!
//! Short pieces are dropped, never padded. The function is pure and
//! deterministic.
//!
//! # Example
//!
//! ```rust
//! use cortex_atlas_core::chunk::split_text;
//!
//! let text = "This paragraph is comfortably longer than forty characters.\n\nToo short.";
//! let chunks = split_text(text);
//! assert_eq!(chunks.len(), 1);
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Chunk, Document};

/// Chunks shorter than this many characters are dropped.
pub const MIN_CHUNK_LENGTH: usize = 40;

/// No chunk is longer than this many characters.
pub const MAX_CHUNK_LENGTH: usize = 500;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph pattern is valid"));

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("sentence pattern is valid"));

/// Split raw text into ordered chunk texts.
///
/// Empty or whitespace-only input yields an empty vector.
pub fn split_text(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();

    for para in PARAGRAPH_BREAK.split(text) {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let len = char_len(trimmed);
        if len <= MAX_CHUNK_LENGTH {
            if len >= MIN_CHUNK_LENGTH {
                chunks.push(trimmed.to_string());
            }
        } else {
            split_long_paragraph(trimmed, &mut chunks);
        }
    }

    chunks
}

/// Chunk a single document, assigning `"{document_id}:{index}"` ids and the
/// document's timestamp to every chunk.
pub fn chunk_document(document: &Document) -> Vec<Chunk> {
    split_text(&document.content)
        .into_iter()
        .enumerate()
        .map(|(index, content)| Chunk {
            chunk_id: format!("{}:{}", document.document_id, index),
            document_id: document.document_id.clone(),
            content,
            index,
            timestamp: document.timestamp,
        })
        .collect()
}

/// Greedy sentence accumulation for paragraphs over the maximum length.
fn split_long_paragraph(para: &str, chunks: &mut Vec<String>) {
    let mut buf = String::new();
    let mut buf_len = 0usize;

    for sentence in sentences(para) {
        for piece in hard_split(sentence) {
            let piece_len = char_len(piece);
            let would_be = if buf.is_empty() {
                piece_len
            } else {
                buf_len + 1 + piece_len
            };

            if would_be > MAX_CHUNK_LENGTH && !buf.is_empty() {
                flush(&mut buf, chunks);
                buf_len = 0;
            }

            if !buf.is_empty() {
                buf.push(' ');
                buf_len += 1;
            }
            buf.push_str(piece);
            buf_len += piece_len;
        }
    }

    flush(&mut buf, chunks);
}

fn flush(buf: &mut String, chunks: &mut Vec<String>) {
    let trimmed = buf.trim();
    if char_len(trimmed) >= MIN_CHUNK_LENGTH {
        chunks.push(trimmed.to_string());
    }
    buf.clear();
}

/// Sentences of `text`, terminal punctuation kept, separating whitespace
/// dropped.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        // Terminators are single-byte ASCII.
        let end = m.start() + 1;
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            out.push(sentence);
        }
        start = m.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

/// Break a sentence longer than `MAX_CHUNK_LENGTH` into pieces that fit,
/// preferring whitespace boundaries.
fn hard_split(sentence: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut remaining = sentence;

    while char_len(remaining) > MAX_CHUNK_LENGTH {
        let limit = byte_offset_of_char(remaining, MAX_CHUNK_LENGTH);
        let split_at = remaining[..limit]
            .rfind(char::is_whitespace)
            .filter(|&pos| pos > 0)
            .unwrap_or(limit);

        let piece = remaining[..split_at].trim_end();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        remaining = remaining[split_at..].trim_start();
    }

    if !remaining.is_empty() {
        pieces.push(remaining);
    }
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `n`th char, or the string length if it has fewer.
fn byte_offset_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sentence_of(len: usize) -> String {
        // `len - 1` letters followed by a period.
        let mut s = "a".repeat(len - 1);
        s.push('.');
        s
    }

    #[test]
    fn test_empty_text() {
        assert!(split_text("").is_empty());
        assert!(split_text("   \n\n \t ").is_empty());
    }

    #[test]
    fn test_short_paragraph_dropped() {
        let chunks = split_text("Too short to keep.");
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_paragraphs_become_chunks() {
        let text = "The first paragraph is long enough to be kept as a chunk.\n\n\
                    Short one.\n\n\
                    The third paragraph is also long enough to become a chunk.";
        let chunks = split_text(text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("The first paragraph"));
        assert!(chunks[1].starts_with("The third paragraph"));
    }

    #[test]
    fn test_whitespace_only_line_is_a_paragraph_break() {
        let text = "The first paragraph is long enough to be kept as a chunk.\n   \n\
                    The second paragraph is long enough to be kept as a chunk.";
        assert_eq!(split_text(text).len(), 2);
    }

    #[test]
    fn test_exactly_max_length_is_one_chunk() {
        let para = "x".repeat(MAX_CHUNK_LENGTH);
        let chunks = split_text(&para);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chars().count(), MAX_CHUNK_LENGTH);
    }

    #[test]
    fn test_one_over_max_forces_sentence_split() {
        // Two sentences: 300 + 1 (space) + 200 = 501 chars.
        let para = format!("{} {}", sentence_of(300), sentence_of(200));
        assert_eq!(para.chars().count(), MAX_CHUNK_LENGTH + 1);

        let chunks = split_text(&para);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 300);
        assert_eq!(chunks[1].chars().count(), 200);
    }

    #[test]
    fn test_sentences_accumulate_greedily() {
        let sentences: Vec<String> = (0..12).map(|_| sentence_of(100)).collect();
        let para = sentences.join(" ");
        let chunks = split_text(&para);
        // Four 100-char sentences plus three spaces = 403; a fifth would be 504.
        assert_eq!(chunks.len(), 3);
        for c in &chunks {
            assert_eq!(c.chars().count(), 403);
        }
    }

    #[test]
    fn test_short_sentence_joins_open_buffer() {
        let para = format!("{} {} Tiny end.", sentence_of(300), sentence_of(250));
        let chunks = split_text(&para);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].chars().count(), 260);
        assert!(chunks[1].ends_with("Tiny end."));
    }

    #[test]
    fn test_short_trailing_buffer_dropped() {
        // 495 + 1 + 9 = 505: the tail cannot join and is below the minimum.
        let para = format!("{} Tiny end.", sentence_of(495));
        let chunks = split_text(&para);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chars().count(), 495);
    }

    #[test]
    fn test_oversized_sentence_is_hard_split() {
        let words: Vec<String> = (0..200).map(|i| format!("word{}", i)).collect();
        let para = words.join(" ");
        let chunks = split_text(&para);
        assert!(chunks.len() > 1);
        for c in &chunks {
            let len = c.chars().count();
            assert!(len >= MIN_CHUNK_LENGTH && len <= MAX_CHUNK_LENGTH, "len {}", len);
        }
        assert_eq!(chunks.join(" "), para);
    }

    #[test]
    fn test_bounds_hold_for_mixed_input() {
        let mut text = String::new();
        for i in 0..30 {
            let sentence_count = (i % 7) + 1;
            let para: Vec<String> = (0..sentence_count)
                .map(|j| format!("Sentence {} of paragraph {} talks about things at length", j, i))
                .collect();
            text.push_str(&para.join(". "));
            text.push_str(".\n\n");
        }
        text.push_str(&"é".repeat(1200));

        for c in split_text(&text) {
            let len = c.chars().count();
            assert!((MIN_CHUNK_LENGTH..=MAX_CHUNK_LENGTH).contains(&len), "len {}", len);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = format!("{} {}\n\nAnother paragraph that is long enough to keep.", sentence_of(300), sentence_of(300));
        assert_eq!(split_text(&text), split_text(&text));
    }

    #[test]
    fn test_chunk_document_ids_and_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let doc = Document {
            document_id: "doc-7".into(),
            author_id: "alice".into(),
            source: Default::default(),
            content: "The first paragraph is long enough to be kept as a chunk.\n\n\
                      The second paragraph is long enough to be kept as a chunk."
                .into(),
            timestamp: ts,
        };
        let chunks = chunk_document(&doc);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_id, "doc-7:0");
        assert_eq!(chunks[1].chunk_id, "doc-7:1");
        assert_eq!(chunks[1].index, 1);
        assert!(chunks.iter().all(|c| c.timestamp == ts && c.document_id == "doc-7"));
    }
}
