//! Job queue abstraction for Cortex Atlas.
//!
//! The [`JobStore`] trait owns the analysis job lifecycle:
//!
//! ```text
//! enqueue ─▶ queued ──claim_next──▶ running ──update_status──▶ completed | failed
//! ```
//!
//! Implementations must be `Send + Sync`; a single handle is constructed at
//! startup and shared (as `Arc<dyn JobStore>`) by the submission layer and
//! every worker.
//!
//! # Claim exclusivity
//!
//! [`claim_next`](JobStore::claim_next) must select-and-transition in one
//! atomic step. Under any number of concurrent callers, a given job is
//! returned to at most one of them.
//!
//! # Stranded jobs
//!
//! There is no lease or timeout. A worker that dies between claim and
//! update leaves its job in `running` until an operator intervenes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AnalysisOptions, Document, Job, JobStatus, Report};

/// Durable analysis job queue.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`enqueue`](JobStore::enqueue) | Record a new `queued` job |
/// | [`claim_next`](JobStore::claim_next) | Atomically take the oldest `queued` job |
/// | [`update_status`](JobStore::update_status) | Write a terminal result |
/// | [`fetch`](JobStore::fetch) | Read-only snapshot by id |
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a `queued` job and return its fresh `analysis_id`.
    async fn enqueue(
        &self,
        subject_id: &str,
        documents: &[Document],
        options: Option<&AnalysisOptions>,
    ) -> Result<String>;

    /// Move the oldest `queued` job to `running` and return it, or `None`
    /// if nothing is queued.
    async fn claim_next(&self) -> Result<Option<Job>>;

    /// Set status, report, and error, and bump `updated_at`.
    ///
    /// Not guarded against a second write to a terminal job; callers hold
    /// the job exclusively after claiming it. Errors if the id is unknown.
    async fn update_status(
        &self,
        analysis_id: &str,
        status: JobStatus,
        report: Option<&Report>,
        error: Option<&str>,
    ) -> Result<()>;

    /// Snapshot of a job by id.
    async fn fetch(&self, analysis_id: &str) -> Result<Option<Job>>;
}
