//! # Cortex Atlas Core
//!
//! Pure analysis logic for Cortex Atlas: data models, chunking, structural
//! features, clustering, automaton inference, confidence scoring, the
//! pipeline that ties them together, and the job store abstraction.
//!
//! This crate contains no tokio, sqlx, filesystem, or network
//! dependencies. Storage backends and the worker runtime live in the
//! `cortex-atlas` application crate.

pub mod automaton;
pub mod chunk;
pub mod cluster;
pub mod confidence;
pub mod features;
pub mod models;
pub mod pipeline;
pub mod store;
