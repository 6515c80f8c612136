//! Background analysis worker.
//!
//! A worker repeatedly claims the oldest queued job, runs the pipeline over
//! its documents, and records the outcome:
//!
//! ```text
//! claim_next() ──▶ decode documents ──▶ Pipeline::run (blocking pool)
//!      │                                   │
//!      │ none: sleep poll_interval         ├─ Ok  → completed + report
//!      ▼                                   └─ Err / panic → failed + message
//!    retry
//! ```
//!
//! After a job completes, the report is handed to the [`VectorSink`] and,
//! when configured, written to the [`ArtifactStore`]. Failures in those
//! steps are logged and never change the job's status.
//!
//! Several workers (tasks or processes) may share one store; the store's
//! claim guarantees each job is processed once.

use anyhow::{bail, Result};
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

use cortex_atlas_core::models::{Job, JobStatus, Report};
use cortex_atlas_core::pipeline::Pipeline;
use cortex_atlas_core::store::JobStore;

use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::vectors::{NoopVectorSink, VectorSink};

pub struct Worker {
    store: Arc<dyn JobStore>,
    pipeline: Arc<Pipeline>,
    poll_interval: Duration,
    vectors: Arc<dyn VectorSink>,
    artifacts: Option<ArtifactStore>,
}

impl Worker {
    pub fn new(store: Arc<dyn JobStore>, pipeline: Arc<Pipeline>, poll_interval: Duration) -> Self {
        Self {
            store,
            pipeline,
            poll_interval,
            vectors: Arc::new(NoopVectorSink),
            artifacts: None,
        }
    }

    /// Worker wired from `[pipeline]`, `[worker]` and `[artifacts]`.
    pub fn from_config(store: Arc<dyn JobStore>, config: &Config) -> Self {
        let mut worker = Self::new(
            store,
            Arc::new(Pipeline::new(config.pipeline.params())),
            config.worker.poll_interval(),
        );
        worker.artifacts = ArtifactStore::from_config(&config.artifacts);
        worker
    }

    pub fn with_vector_sink(mut self, sink: Arc<dyn VectorSink>) -> Self {
        self.vectors = sink;
        self
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactStore) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Claim and process at most one job.
    ///
    /// Returns the id of the processed job, or `None` when the queue was
    /// empty. A failing analysis is not an error here; the job is marked
    /// `failed`. Errors are store failures only.
    pub async fn run_once(&self) -> Result<Option<String>> {
        let Some(job) = self.store.claim_next().await? else {
            return Ok(None);
        };
        let analysis_id = job.analysis_id.clone();
        self.process(job).await?;
        Ok(Some(analysis_id))
    }

    /// Poll the store until the process ends.
    pub async fn run(&self) -> Result<()> {
        info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "analysis worker started");
        loop {
            match self.run_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => warn!(error = %format!("{:#}", e), "job store error; retrying after poll interval"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    #[instrument(skip(self, job), fields(analysis_id = %job.analysis_id, subject_id = %job.subject_id))]
    async fn process(&self, job: Job) -> Result<()> {
        let start = Instant::now();
        info!("processing analysis job");

        match self.analyze(&job).await {
            Ok(report) => {
                self.store
                    .update_status(&job.analysis_id, JobStatus::Completed, Some(&report), None)
                    .await?;
                info!(
                    patterns = report.patterns.len(),
                    confidence = report.confidence.overall,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "analysis job completed"
                );
                self.publish(&job, &report).await;
            }
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(error = %message, "analysis job failed");
                self.store
                    .update_status(&job.analysis_id, JobStatus::Failed, None, Some(&message))
                    .await?;
            }
        }
        Ok(())
    }

    async fn analyze(&self, job: &Job) -> Result<Report> {
        let documents = job.decode_documents()?;
        let pipeline = self.pipeline.clone();
        let subject_id = job.subject_id.clone();

        let outcome =
            tokio::task::spawn_blocking(move || pipeline.run(&subject_id, &documents)).await;

        match outcome {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                bail!("analysis pipeline panicked: {}", panic_message(e.into_panic().as_ref()))
            }
            Err(e) => bail!("analysis task did not finish: {}", e),
        }
    }

    async fn publish(&self, job: &Job, report: &Report) {
        if let Err(e) = self.vectors.store_report_vectors(&job.subject_id, report).await {
            warn!(error = %format!("{:#}", e), "vector persistence failed");
        }
        if let Some(artifacts) = &self.artifacts {
            if let Err(e) = artifacts.persist_report(&job.analysis_id, report).await {
                warn!(error = %format!("{:#}", e), "report artifact write failed");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `concurrency` polling loops over one shared worker.
pub async fn run_workers(worker: Arc<Worker>, concurrency: usize) -> Result<()> {
    let mut handles = Vec::with_capacity(concurrency);
    for _ in 0..concurrency.max(1) {
        let worker = worker.clone();
        handles.push(tokio::spawn(async move { worker.run().await }));
    }
    for handle in handles {
        handle.await??;
    }
    Ok(())
}
