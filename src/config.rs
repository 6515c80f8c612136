//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/atlas.sqlite"
//!
//! [pipeline]
//! min_cluster_size = 3
//!
//! [worker]
//! poll_interval_ms = 5000
//! concurrency = 1
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! api_prefix = "/api"
//!
//! [artifacts]
//! enabled = false
//! dir = "storage_artifacts"
//! ```
//!
//! Only `[db]` is required; every other section falls back to defaults.

use anyhow::{Context, Result};
use cortex_atlas_core::cluster::DEFAULT_MIN_CLUSTER_SIZE;
use cortex_atlas_core::pipeline::PipelineParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: default_min_cluster_size(),
        }
    }
}

impl PipelineConfig {
    pub fn params(&self) -> PipelineParams {
        PipelineParams {
            min_cluster_size: self.min_cluster_size,
        }
    }
}

fn default_min_cluster_size() -> usize {
    DEFAULT_MIN_CLUSTER_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Number of polling loops `atlas worker` runs in this process.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            concurrency: default_concurrency(),
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    5000
}
fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_prefix: default_api_prefix(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_api_prefix() -> String {
    "/api".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_artifacts_dir")]
    pub dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_artifacts_dir(),
        }
    }
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("storage_artifacts")
}

impl Config {
    /// Defaults for commands that can run without a config file.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/atlas.sqlite"),
            },
            pipeline: PipelineConfig::default(),
            worker: WorkerConfig::default(),
            server: ServerConfig::default(),
            artifacts: ArtifactsConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline.min_cluster_size == 0 {
            anyhow::bail!("pipeline.min_cluster_size must be >= 1");
        }
        if self.worker.poll_interval_ms == 0 {
            anyhow::bail!("worker.poll_interval_ms must be > 0");
        }
        if self.worker.concurrency == 0 {
            anyhow::bail!("worker.concurrency must be >= 1");
        }
        if !self.server.api_prefix.is_empty() && !self.server.api_prefix.starts_with('/') {
            anyhow::bail!(
                "server.api_prefix must start with '/' (got '{}')",
                self.server.api_prefix
            );
        }
        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
