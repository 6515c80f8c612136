//! Structural feature extraction.
//!
//! Computes surface-level statistics of a chunk's text. Extraction is a
//! pure per-chunk function, so callers are free to run it in parallel.

use crate::models::{Chunk, Feature, FeatureVector};

/// Connectives counted by [`StructuralFeatures::logical_operator_ratio`].
pub const LOGICAL_OPERATORS: [&str; 6] = ["if", "then", "because", "therefore", "however", "but"];

/// Everything the structural extractor measures for one text.
///
/// `avg_sentence_length` is computed but not part of [`FeatureVector`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StructuralFeatures {
    pub information_density: f64,
    pub logical_operator_ratio: f64,
    pub avg_sentence_length: f64,
}

impl StructuralFeatures {
    /// Project onto the persisted vector; reserved fields stay `0.0`.
    pub fn to_vector(&self) -> FeatureVector {
        FeatureVector {
            information_density: self.information_density,
            logical_operator_ratio: self.logical_operator_ratio,
            ..Default::default()
        }
    }
}

pub fn extract_structural_features(text: &str) -> StructuralFeatures {
    let words: Vec<&str> = text.split_whitespace().collect();
    let word_count = words.len();
    let char_count = text.chars().count();

    let logical_hits = words
        .iter()
        .filter(|w| {
            let token = w.to_lowercase();
            let token = token.trim_end_matches(['.', ',']);
            LOGICAL_OPERATORS.contains(&token)
        })
        .count();

    // Segments include the empty remainder after a final terminator.
    let segments: Vec<&str> = text.split(['.', '!', '?']).collect();
    let sentence_words: usize = segments
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.split_whitespace().count())
        .sum();

    StructuralFeatures {
        information_density: word_count as f64 / char_count.max(1) as f64,
        logical_operator_ratio: logical_hits as f64 / word_count.max(1) as f64,
        avg_sentence_length: sentence_words as f64 / segments.len().max(1) as f64,
    }
}

/// Extract the persisted feature vector for every chunk, in order.
pub fn extract_features(chunks: &[Chunk]) -> Vec<Feature> {
    chunks
        .iter()
        .map(|chunk| Feature {
            chunk_id: chunk.chunk_id.clone(),
            features: extract_structural_features(&chunk.content).to_vector(),
        })
        .collect()
}
