//! # Cortex Atlas
//!
//! Asynchronous communication-pattern analysis. A subject's documents are
//! chunked, turned into structural features, grouped into clusters, and
//! summarized as a first-order state machine over cluster labels, with a
//! confidence score attached.
//!
//! The algorithms live in the pure `cortex-atlas-core` crate. This crate
//! adds the durable job queue, the polling worker, the HTTP API and the
//! `atlas` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  enqueue  ┌──────────────┐  claim_next  ┌──────────┐
//! │ HTTP/CLI │──────────▶│ analysis_jobs│◀─────────────│  Worker  │
//! │  submit  │           │   (SQLite)   │  update      │ pipeline │
//! └──────────┘           └──────┬───────┘◀─────────────└────┬─────┘
//!                               │ fetch                     │
//!                               ▼                           ▼
//!                        status / report           vector sink, artifacts
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! atlas init                                  # create database
//! atlas analyze docs.json --pretty            # run the pipeline locally
//! atlas submit docs.json --subject alice      # enqueue a job
//! atlas worker                                # process queued jobs
//! atlas serve                                 # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite job store with atomic claim |
//! | [`worker`] | Polling analysis worker |
//! | [`server`] | HTTP API |
//! | [`artifacts`] | Report files on disk |
//! | [`vectors`] | Vector persistence hook |
//! | [`input`] | Document file loading |

pub mod artifacts;
pub mod config;
pub mod db;
pub mod input;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
pub mod vectors;
pub mod worker;
