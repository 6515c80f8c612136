//! Downstream vector persistence for completed reports.
//!
//! The worker hands every completed report to a [`VectorSink`]. No vector
//! backend ships with the crate; [`NoopVectorSink`] records that the step
//! was skipped. Embedders can supply their own sink through
//! [`Worker::with_vector_sink`](crate::worker::Worker::with_vector_sink).

use anyhow::Result;
use async_trait::async_trait;

use cortex_atlas_core::models::Report;

#[async_trait]
pub trait VectorSink: Send + Sync {
    async fn store_report_vectors(&self, subject_id: &str, report: &Report) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVectorSink;

#[async_trait]
impl VectorSink for NoopVectorSink {
    async fn store_report_vectors(&self, subject_id: &str, _report: &Report) -> Result<()> {
        tracing::info!(subject_id, "vector storage not configured; skipping vector persistence");
        Ok(())
    }
}
