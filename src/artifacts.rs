//! On-disk copies of completed reports.
//!
//! Each report is written as pretty-printed JSON to `<dir>/<analysis_id>.json`.
//! Enabled with `[artifacts] enabled = true`; the job table stays the
//! source of truth.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use cortex_atlas_core::models::Report;

use crate::config::ArtifactsConfig;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns a store only when artifacts are enabled in config.
    pub fn from_config(config: &ArtifactsConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(&config.dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, analysis_id: &str) -> Result<PathBuf> {
        if analysis_id.is_empty()
            || analysis_id.contains(['/', '\\'])
            || analysis_id.starts_with('.')
        {
            bail!("invalid artifact id: '{}'", analysis_id);
        }
        Ok(self.dir.join(format!("{}.json", analysis_id)))
    }

    /// Write the report, creating the directory if needed. Returns the file path.
    pub async fn persist_report(&self, analysis_id: &str, report: &Report) -> Result<PathBuf> {
        let path = self.path_for(analysis_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create artifact directory: {}", self.dir.display()))?;

        let body = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write artifact: {}", path.display()))?;

        tracing::debug!(analysis_id, path = %path.display(), "report artifact written");
        Ok(path)
    }

    /// Read a previously persisted report. `Ok(None)` when no file exists.
    pub async fn load_report(&self, analysis_id: &str) -> Result<Option<Report>> {
        let path = self.path_for(analysis_id)?;
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read artifact: {}", path.display()))
            }
        };
        let report = serde_json::from_str(&body)
            .with_context(|| format!("Corrupt artifact: {}", path.display()))?;
        Ok(Some(report))
    }
}
