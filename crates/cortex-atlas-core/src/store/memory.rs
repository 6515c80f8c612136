//! In-memory [`JobStore`] implementation for tests and single-process use.
//!
//! Jobs live in a `Vec` (insertion order) behind a `std::sync::Mutex`.
//! Every operation takes the lock once, so `claim_next` selects and
//! transitions under a single guard.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{AnalysisOptions, Document, Job, JobStatus, Report};

use super::JobStore;

/// In-memory job queue.
pub struct InMemoryJobStore {
    jobs: Mutex<Vec<Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Job>>> {
        self.jobs
            .lock()
            .map_err(|_| anyhow!("job store lock poisoned"))
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(
        &self,
        subject_id: &str,
        documents: &[Document],
        options: Option<&AnalysisOptions>,
    ) -> Result<String> {
        let analysis_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let job = Job {
            analysis_id: analysis_id.clone(),
            subject_id: subject_id.to_string(),
            status: JobStatus::Queued,
            documents: serde_json::to_value(documents)?,
            options: options.cloned(),
            report: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.lock()?.push(job);
        Ok(analysis_id)
    }

    async fn claim_next(&self) -> Result<Option<Job>> {
        let mut jobs = self.lock()?;

        // Oldest by created_at; min_by_key keeps the first on ties.
        let next = jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Queued)
            .min_by_key(|j| j.created_at);

        Ok(next.map(|job| {
            job.status = JobStatus::Running;
            job.updated_at = Utc::now();
            job.clone()
        }))
    }

    async fn update_status(
        &self,
        analysis_id: &str,
        status: JobStatus,
        report: Option<&Report>,
        error: Option<&str>,
    ) -> Result<()> {
        let mut jobs = self.lock()?;
        let Some(job) = jobs.iter_mut().find(|j| j.analysis_id == analysis_id) else {
            bail!("analysis job not found: {}", analysis_id);
        };
        job.status = status;
        job.report = report.cloned();
        job.error = error.map(str::to_string);
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn fetch(&self, analysis_id: &str) -> Result<Option<Job>> {
        let jobs = self.lock()?;
        Ok(jobs.iter().find(|j| j.analysis_id == analysis_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use crate::pipeline::run_pipeline;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn docs() -> Vec<Document> {
        vec![Document {
            document_id: "d1".into(),
            author_id: "alice".into(),
            source: Source::Chat,
            content: "A message that is long enough to survive chunking on its own.".into(),
            timestamp: Utc::now(),
        }]
    }

    #[tokio::test]
    async fn test_enqueue_then_fetch_is_queued() {
        let store = InMemoryJobStore::new();
        let documents = docs();
        let id = store.enqueue("alice", &documents, None).await.unwrap();

        let job = store.fetch(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.report.is_none());
        assert!(job.error.is_none());
        assert_eq!(job.subject_id, "alice");
        assert_eq!(job.created_at, job.updated_at);
        assert_eq!(job.decode_documents().unwrap(), documents);
    }

    #[tokio::test]
    async fn test_fetch_unknown() {
        let store = InMemoryJobStore::new();
        assert!(store.fetch("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_is_fifo() {
        let store = InMemoryJobStore::new();
        let first = store.enqueue("a", &docs(), None).await.unwrap();
        let second = store.enqueue("b", &docs(), None).await.unwrap();

        assert_eq!(store.claim_next().await.unwrap().unwrap().analysis_id, first);
        assert_eq!(store.claim_next().await.unwrap().unwrap().analysis_id, second);
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_marks_running() {
        let store = InMemoryJobStore::new();
        let id = store.enqueue("alice", &docs(), None).await.unwrap();
        let claimed = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(store.fetch(&id).await.unwrap().unwrap().status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_update_status_completed_and_failed() {
        let store = InMemoryJobStore::new();
        let ok = store.enqueue("alice", &docs(), None).await.unwrap();
        let bad = store.enqueue("bob", &docs(), None).await.unwrap();
        let report = run_pipeline("alice", &docs()).unwrap();

        store
            .update_status(&ok, JobStatus::Completed, Some(&report), None)
            .await
            .unwrap();
        store
            .update_status(&bad, JobStatus::Failed, None, Some("boom"))
            .await
            .unwrap();

        let ok_job = store.fetch(&ok).await.unwrap().unwrap();
        assert_eq!(ok_job.status, JobStatus::Completed);
        assert_eq!(ok_job.report, Some(report));

        let bad_job = store.fetch(&bad).await.unwrap().unwrap();
        assert_eq!(bad_job.status, JobStatus::Failed);
        assert_eq!(bad_job.error.as_deref(), Some("boom"));
        assert!(bad_job.updated_at >= bad_job.created_at);
    }

    #[tokio::test]
    async fn test_update_unknown_job_errors() {
        let store = InMemoryJobStore::new();
        let err = store
            .update_status("nope", JobStatus::Failed, None, Some("x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_options_round_trip() {
        let store = InMemoryJobStore::new();
        let opts = AnalysisOptions {
            language: Some("en".into()),
            confidence_threshold: Some(0.65),
            ..Default::default()
        };
        let id = store.enqueue("alice", &docs(), Some(&opts)).await.unwrap();
        assert_eq!(store.fetch(&id).await.unwrap().unwrap().options, Some(opts));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_claims_are_exclusive() {
        let store = Arc::new(InMemoryJobStore::new());
        let id = store.enqueue("alice", &docs(), None).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.claim_next().await.unwrap() }));
        }

        let mut winners = Vec::new();
        for h in handles {
            if let Some(job) = h.await.unwrap() {
                winners.push(job.analysis_id);
            }
        }
        assert_eq!(winners, vec![id]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_claims_drain_each_job_once() {
        let store = Arc::new(InMemoryJobStore::new());
        let mut ids = HashSet::new();
        for i in 0..50 {
            ids.insert(store.enqueue(&format!("s{}", i), &docs(), None).await.unwrap());
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut mine = Vec::new();
                while let Some(job) = store.claim_next().await.unwrap() {
                    mine.push(job.analysis_id);
                }
                mine
            }));
        }

        let mut claimed = Vec::new();
        for h in handles {
            claimed.extend(h.await.unwrap());
        }
        assert_eq!(claimed.len(), 50);
        let unique: HashSet<String> = claimed.into_iter().collect();
        assert_eq!(unique, ids);
    }
}
