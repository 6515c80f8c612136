//! Core data models for Cortex Atlas.
//!
//! These types represent the documents, chunks, features, clusters, and
//! reports that flow through the analysis pipeline, plus the [`Job`] record
//! owned by the job store. All of them serialize to the JSON shapes served
//! by the HTTP API and printed by the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin channel of a submitted document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Email,
    Chat,
    #[default]
    Doc,
    Ticket,
    Note,
}

/// A timestamped text document attributed to one author.
///
/// Deserialization doubles as submission validation: a payload missing a
/// required field, carrying an unknown `source`, or an unparseable
/// `timestamp` is rejected before a job is ever created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub author_id: String,
    #[serde(default)]
    pub source: Source,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A bounded-length slice of a document's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `"{document_id}:{index}"`, unique within one pipeline run.
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    pub index: usize,
    pub timestamp: DateTime<Utc>,
}

/// Structural feature vector for one chunk.
///
/// Only the first two fields are computed today; the rest are reserved for
/// future extractors and stay at `0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(default)]
    pub information_density: f64,
    #[serde(default)]
    pub logical_operator_ratio: f64,
    #[serde(default)]
    pub hedging_frequency: f64,
    #[serde(default)]
    pub abstraction_level: f64,
    #[serde(default)]
    pub ordering_strength: f64,
    #[serde(default)]
    pub topic_drift: f64,
}

/// Number of fields in a [`FeatureVector`] embedding.
pub const FEATURE_DIMS: usize = 6;

impl FeatureVector {
    /// Flattens the vector in its canonical field order.
    pub fn to_embedding(&self) -> [f64; FEATURE_DIMS] {
        [
            self.information_density,
            self.logical_operator_ratio,
            self.hedging_frequency,
            self.abstraction_level,
            self.ordering_strength,
            self.topic_drift,
        ]
    }
}

/// A feature vector attached to its chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub chunk_id: String,
    pub features: FeatureVector,
}

/// A group of chunks that share a communication pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_id: String,
    pub label: String,
    /// Chunk ids in assignment order.
    pub member_chunks: Vec<String>,
    pub coherence_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomatonState {
    pub state_id: String,
    pub label: String,
    /// Share of the label sequence occupied by this state.
    pub support: f64,
}

/// A first-order transition. Serialized with `from`/`to` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomatonTransition {
    #[serde(rename = "from")]
    pub from_state: String,
    #[serde(rename = "to")]
    pub to_state: String,
    pub probability: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Automaton {
    pub states: Vec<AutomatonState>,
    pub transitions: Vec<AutomatonTransition>,
}

impl Automaton {
    pub fn is_empty(&self) -> bool {
        self.states.is_empty() && self.transitions.is_empty()
    }
}

/// Human-readable framing attached to a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub summary: String,
    pub guidance: Vec<String>,
    pub failure_modes: Vec<String>,
    #[serde(default)]
    pub non_claims: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub overall: f64,
    pub notes: String,
}

/// Algorithm versions that produced a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub features: String,
    pub automaton: String,
    pub interpretation: String,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            features: "0.1.0".to_string(),
            automaton: "0.1.0".to_string(),
            interpretation: "0.1.0".to_string(),
        }
    }
}

/// The final output of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub subject_id: String,
    pub patterns: Vec<Cluster>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_cluster_id: Option<String>,
    pub automaton: Automaton,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<Interpretation>,
    pub confidence: Confidence,
    pub version_info: VersionInfo,
}

/// Submitter-supplied knobs stored alongside a job.
///
/// The pipeline does not read these; they are kept so that clients can
/// retrieve exactly what they asked for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub retain_raw_text: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
    #[serde(default)]
    pub enable_llm_interpretation: bool,
}

/// Lifecycle status of an analysis [`Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => anyhow::bail!("unknown job status: '{}'", other),
        }
    }
}

/// A queued, running, or finished analysis request.
///
/// `documents` is kept as the raw JSON payload that was enqueued; the worker
/// decodes it inside its failure boundary so a corrupt payload fails the job
/// instead of the claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub analysis_id: String,
    pub subject_id: String,
    pub status: JobStatus,
    pub documents: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<AnalysisOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Decodes the stored document payload.
    pub fn decode_documents(&self) -> anyhow::Result<Vec<Document>> {
        let docs = serde_json::from_value(self.documents.clone())?;
        Ok(docs)
    }
}
