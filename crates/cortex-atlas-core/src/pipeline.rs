//! Analysis pipeline orchestration.
//!
//! Sequences the stages into a [`Report`]:
//!
//! ```text
//! documents ─▶ normalize ─▶ chunk ─▶ (< 5 chunks? degenerate report)
//!                                   ─▶ sort by timestamp ─▶ features ─▶ clusters
//!                                   ─▶ label sequence ─▶ automaton ─▶ confidence ─▶ Report
//! ```
//!
//! The pipeline holds no state between runs. Given the same parameters and
//! the same documents in the same order, it returns the same report.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};

use crate::automaton::infer_automaton;
use crate::chunk::chunk_document;
use crate::cluster::{
    build_clusters, empty_cluster, select_primary_cluster, ClusterAssigner, Embedding,
    SequentialAssigner, DEFAULT_MIN_CLUSTER_SIZE,
};
use crate::confidence::{compute_confidence, INSUFFICIENT_DATA_CONFIDENCE, MIN_CHUNKS_FOR_INFERENCE};
use crate::features::extract_features;
use crate::models::{
    Automaton, Chunk, Cluster, Confidence, Document, Interpretation, Report, VersionInfo,
};

/// Label given to chunks that no cluster claimed.
pub const NOISE_LABEL: &str = "noise";

const NON_CLAIM_TRAITS: &str = "This analysis does not assess personality, intent, or mental state.";

/// Tunable algorithm parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineParams {
    pub min_cluster_size: usize,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
        }
    }
}

/// A configured pipeline. Cheap to share behind an `Arc`.
pub struct Pipeline {
    assigner: Box<dyn ClusterAssigner>,
}

impl Pipeline {
    pub fn new(params: PipelineParams) -> Self {
        Self::with_assigner(Box::new(SequentialAssigner::new(params.min_cluster_size)))
    }

    /// Build a pipeline around a custom clustering algorithm.
    pub fn with_assigner(assigner: Box<dyn ClusterAssigner>) -> Self {
        Self { assigner }
    }

    /// Run every stage over `documents` and assemble the report.
    ///
    /// Too little usable text is not an error: it yields a degenerate report
    /// with fixed low confidence. Errors are reserved for malformed input
    /// such as an empty or repeated `document_id`.
    pub fn run(&self, subject_id: &str, documents: &[Document]) -> Result<Report> {
        let documents = normalize_documents(documents)?;
        let mut chunks: Vec<Chunk> = documents.iter().flat_map(chunk_document).collect();

        if chunks.len() < MIN_CHUNKS_FOR_INFERENCE {
            return Ok(degenerate_report(subject_id, chunks.len()));
        }

        // Stable: chunks sharing a timestamp keep document and index order.
        chunks.sort_by_key(|c| c.timestamp);

        let features = extract_features(&chunks);
        let embeddings: Vec<Embedding> = features.iter().map(|f| f.features.to_embedding()).collect();
        let assignments = self.assigner.assign(&embeddings);
        let clusters = build_clusters(&chunks, &assignments);

        let primary = select_primary_cluster(&clusters).cloned();
        let primary_cluster_id = primary.as_ref().map(|c| c.cluster_id.clone());
        let coherence = primary.unwrap_or_else(empty_cluster).coherence_score;

        let sequence = label_sequence(&chunks, &clusters);
        let automaton = infer_automaton(&sequence);
        let overall = compute_confidence(chunks.len(), automaton.states.len(), coherence);

        Ok(Report {
            subject_id: subject_id.to_string(),
            interpretation: Some(pattern_interpretation(chunks.len(), clusters.len())),
            patterns: clusters,
            primary_cluster_id,
            automaton,
            confidence: Confidence {
                overall,
                notes: "Confidence is based on chunk volume, state variety, and clustering coherence."
                    .to_string(),
            },
            version_info: VersionInfo::default(),
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineParams::default())
    }
}

/// Run the pipeline with default parameters.
pub fn run_pipeline(subject_id: &str, documents: &[Document]) -> Result<Report> {
    Pipeline::default().run(subject_id, documents)
}

fn normalize_documents(documents: &[Document]) -> Result<Vec<Document>> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(documents.len());

    for doc in documents {
        let document_id = doc.document_id.trim();
        if document_id.is_empty() {
            bail!("document_id must not be empty");
        }
        if !seen.insert(document_id.to_string()) {
            bail!("duplicate document_id: {}", document_id);
        }
        normalized.push(Document {
            document_id: document_id.to_string(),
            content: doc.content.trim().to_string(),
            ..doc.clone()
        });
    }

    Ok(normalized)
}

/// Map each chunk, in order, to the id of the cluster that holds it.
fn label_sequence(chunks: &[Chunk], clusters: &[Cluster]) -> Vec<String> {
    let cluster_by_chunk: HashMap<&str, &str> = clusters
        .iter()
        .flat_map(|cl| {
            cl.member_chunks
                .iter()
                .map(move |id| (id.as_str(), cl.cluster_id.as_str()))
        })
        .collect();

    chunks
        .iter()
        .map(|c| {
            cluster_by_chunk
                .get(c.chunk_id.as_str())
                .copied()
                .unwrap_or(NOISE_LABEL)
                .to_string()
        })
        .collect()
}

fn degenerate_report(subject_id: &str, chunk_count: usize) -> Report {
    Report {
        subject_id: subject_id.to_string(),
        patterns: Vec::new(),
        primary_cluster_id: None,
        automaton: Automaton::default(),
        interpretation: Some(Interpretation {
            summary: format!(
                "Only {} usable text chunk(s) were available; at least {} are needed to infer patterns.",
                chunk_count, MIN_CHUNKS_FOR_INFERENCE
            ),
            guidance: vec!["Provide more text to infer stable patterns.".to_string()],
            failure_modes: vec!["Insufficient volume prevents reliable clustering.".to_string()],
            non_claims: vec![NON_CLAIM_TRAITS.to_string()],
        }),
        confidence: Confidence {
            overall: INSUFFICIENT_DATA_CONFIDENCE,
            notes: "Insufficient text volume for inference.".to_string(),
        },
        version_info: VersionInfo::default(),
    }
}

fn pattern_interpretation(chunk_count: usize, cluster_count: usize) -> Interpretation {
    Interpretation {
        summary: format!(
            "Observed {} text chunks grouped into {} communication pattern cluster(s).",
            chunk_count,
            cluster_count.max(1)
        ),
        guidance: vec![
            "Provide clear structure when introducing new topics.".to_string(),
            "Confirm shared assumptions before moving into details.".to_string(),
        ],
        failure_modes: vec![
            "Sparse text limits detectable structure.".to_string(),
            "Mixed topics may reduce clustering coherence.".to_string(),
        ],
        non_claims: vec![
            NON_CLAIM_TRAITS.to_string(),
            "It only summarizes observable communication patterns.".to_string(),
        ],
    }
}
