//! SQLite-backed [`JobStore`] implementation.
//!
//! Every operation is a single statement and therefore its own transaction.
//! The claim is one conditional `UPDATE … RETURNING`: SQLite serializes
//! writers, so the row selected by the subquery is flipped to `running` and
//! returned to exactly one connection, even across processes sharing the
//! database file.
//!
//! Timestamps are stored as Unix milliseconds; claim order is
//! `created_at`, then `rowid` (insertion order) for jobs created in the
//! same millisecond.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use cortex_atlas_core::models::{AnalysisOptions, Document, Job, JobStatus, Report};
use cortex_atlas_core::store::JobStore;

use crate::config::Config;
use crate::{db, migrate};

const JOB_COLUMNS: &str =
    "analysis_id, subject_id, status, documents, options, report, error, created_at, updated_at";

/// SQLite implementation of the [`JobStore`] trait.
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and ensure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp out of range: {}", ms))
}

fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let analysis_id: String = row.try_get("analysis_id")?;
    let status: String = row.try_get("status")?;

    // A corrupt document payload must fail the job in the worker, not the
    // claim, so undecodable JSON is passed through as a raw string.
    let documents_raw: String = row.try_get("documents")?;
    let documents = serde_json::from_str(&documents_raw)
        .unwrap_or(serde_json::Value::String(documents_raw));

    let options_raw: Option<String> = row.try_get("options")?;
    let options = match options_raw {
        Some(raw) => match serde_json::from_str::<AnalysisOptions>(&raw) {
            Ok(opts) => Some(opts),
            Err(e) => {
                tracing::warn!(analysis_id = %analysis_id, error = %e, "ignoring unreadable job options");
                None
            }
        },
        None => None,
    };

    let report_raw: Option<String> = row.try_get("report")?;
    let report = report_raw
        .map(|raw| serde_json::from_str::<Report>(&raw))
        .transpose()
        .with_context(|| format!("corrupt report for analysis job {}", analysis_id))?;

    Ok(Job {
        status: status.parse()?,
        subject_id: row.try_get("subject_id")?,
        documents,
        options,
        report,
        error: row.try_get("error")?,
        created_at: from_millis(row.try_get("created_at")?)?,
        updated_at: from_millis(row.try_get("updated_at")?)?,
        analysis_id,
    })
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn enqueue(
        &self,
        subject_id: &str,
        documents: &[Document],
        options: Option<&AnalysisOptions>,
    ) -> Result<String> {
        let analysis_id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_millis();
        let documents_json = serde_json::to_string(documents)?;
        let options_json = options.map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO analysis_jobs (analysis_id, subject_id, status, documents, options, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&analysis_id)
        .bind(subject_id)
        .bind(JobStatus::Queued.as_str())
        .bind(&documents_json)
        .bind(&options_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!(analysis_id = %analysis_id, subject_id, documents = documents.len(), "job enqueued");
        Ok(analysis_id)
    }

    async fn claim_next(&self) -> Result<Option<Job>> {
        let now = Utc::now().timestamp_millis();
        let sql = format!(
            r#"
            UPDATE analysis_jobs
            SET status = 'running', updated_at = ?
            WHERE analysis_id = (
                SELECT analysis_id FROM analysis_jobs
                WHERE status = 'queued'
                ORDER BY created_at ASC, rowid ASC
                LIMIT 1
            )
            AND status = 'queued'
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let job = job_from_row(&row)?;
                tracing::debug!(analysis_id = %job.analysis_id, "job claimed");
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    async fn update_status(
        &self,
        analysis_id: &str,
        status: JobStatus,
        report: Option<&Report>,
        error: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let report_json = report.map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            "UPDATE analysis_jobs SET status = ?, report = ?, error = ?, updated_at = ? WHERE analysis_id = ?",
        )
        .bind(status.as_str())
        .bind(&report_json)
        .bind(error)
        .bind(now)
        .bind(analysis_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("analysis job not found: {}", analysis_id);
        }

        tracing::debug!(analysis_id, status = %status, "job status updated");
        Ok(())
    }

    async fn fetch(&self, analysis_id: &str) -> Result<Option<Job>> {
        let sql = format!("SELECT {} FROM analysis_jobs WHERE analysis_id = ?", JOB_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(analysis_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_atlas_core::models::Source;
    use cortex_atlas_core::pipeline::run_pipeline;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_config(tmp: &TempDir) -> Config {
        let mut cfg = Config::minimal();
        cfg.db.path = tmp.path().join("atlas.sqlite");
        cfg
    }

    fn docs() -> Vec<Document> {
        vec![Document {
            document_id: "d1".into(),
            author_id: "alice".into(),
            source: Source::Ticket,
            content: "A ticket body that is long enough to survive chunking on its own.".into(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }]
    }

    #[tokio::test]
    async fn test_enqueue_then_fetch_is_queued() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteJobStore::open(&test_config(&tmp)).await.unwrap();

        let id = store.enqueue("alice", &docs(), None).await.unwrap();
        let job = store.fetch(&id).await.unwrap().unwrap();

        assert_eq!(job.analysis_id, id);
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.report.is_none());
        assert!(job.error.is_none());
        assert!(job.options.is_none());
        assert_eq!(job.decode_documents().unwrap(), docs());
    }

    #[tokio::test]
    async fn test_fetch_unknown() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteJobStore::open(&test_config(&tmp)).await.unwrap();
        assert!(store.fetch("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_fifo_then_empty() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteJobStore::open(&test_config(&tmp)).await.unwrap();

        let ids: Vec<String> = {
            let mut v = Vec::new();
            for s in ["a", "b", "c"] {
                v.push(store.enqueue(s, &docs(), None).await.unwrap());
            }
            v
        };

        for expected in &ids {
            let job = store.claim_next().await.unwrap().unwrap();
            assert_eq!(&job.analysis_id, expected);
            assert_eq!(job.status, JobStatus::Running);
        }
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_and_fail() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteJobStore::open(&test_config(&tmp)).await.unwrap();
        let ok = store.enqueue("alice", &docs(), None).await.unwrap();
        let bad = store.enqueue("bob", &docs(), None).await.unwrap();
        let report = run_pipeline("alice", &docs()).unwrap();

        store
            .update_status(&ok, JobStatus::Completed, Some(&report), None)
            .await
            .unwrap();
        store
            .update_status(&bad, JobStatus::Failed, None, Some("pipeline exploded"))
            .await
            .unwrap();

        let ok_job = store.fetch(&ok).await.unwrap().unwrap();
        assert_eq!(ok_job.status, JobStatus::Completed);
        assert_eq!(ok_job.report, Some(report));

        let bad_job = store.fetch(&bad).await.unwrap().unwrap();
        assert_eq!(bad_job.status, JobStatus::Failed);
        assert_eq!(bad_job.error.as_deref(), Some("pipeline exploded"));
        assert!(bad_job.report.is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_job_errors() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteJobStore::open(&test_config(&tmp)).await.unwrap();
        assert!(store
            .update_status("nope", JobStatus::Completed, None, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_options_persisted() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteJobStore::open(&test_config(&tmp)).await.unwrap();
        let opts = AnalysisOptions {
            language: Some("en".into()),
            retain_raw_text: true,
            ..Default::default()
        };
        let id = store.enqueue("alice", &docs(), Some(&opts)).await.unwrap();
        assert_eq!(store.fetch(&id).await.unwrap().unwrap().options, Some(opts));
    }

    #[tokio::test]
    async fn test_corrupt_documents_survive_claim() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteJobStore::open(&test_config(&tmp)).await.unwrap();
        let id = store.enqueue("alice", &docs(), None).await.unwrap();
        sqlx::query("UPDATE analysis_jobs SET documents = 'not json' WHERE analysis_id = ?")
            .bind(&id)
            .execute(store.pool())
            .await
            .unwrap();

        let job = store.claim_next().await.unwrap().unwrap();
        assert_eq!(job.analysis_id, id);
        assert!(job.decode_documents().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_racing_claims_single_winner() {
        let tmp = TempDir::new().unwrap();
        let cfg = test_config(&tmp);
        let seed = SqliteJobStore::open(&cfg).await.unwrap();
        let id = seed.enqueue("alice", &docs(), None).await.unwrap();

        // Separate pools stand in for separate worker processes.
        let mut stores = Vec::new();
        for _ in 0..4 {
            stores.push(Arc::new(SqliteJobStore::open(&cfg).await.unwrap()));
        }

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = stores[i % stores.len()].clone();
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
    async fn test_racing_drain_claims_each_job_once() {
        let tmp = TempDir::new().unwrap();
        let cfg = test_config(&tmp);
        let store = Arc::new(SqliteJobStore::open(&cfg).await.unwrap());

        let mut ids = HashSet::new();
        for i in 0..40 {
            ids.insert(store.enqueue(&format!("s{}", i), &docs(), None).await.unwrap());
        }

        let mut handles = Vec::new();
        for _ in 0..6 {
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
        assert_eq!(claimed.len(), 40);
        assert_eq!(claimed.into_iter().collect::<HashSet<_>>(), ids);
    }
}
