//! Document files for `atlas analyze` and `atlas submit`.
//!
//! A file holds either a JSON array of documents or an object with a
//! `documents` array.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use cortex_atlas_core::models::Document;

pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read documents file: {}", path.display()))?;
    parse_documents(&raw).with_context(|| format!("Invalid documents file: {}", path.display()))
}

pub fn parse_documents(raw: &str) -> Result<Vec<Document>> {
    let payload: Value = serde_json::from_str(raw)?;
    let list = match payload {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut obj) => match obj.remove("documents") {
            Some(documents) => documents,
            None => bail!("input object has no 'documents' key"),
        },
        _ => bail!("input must be a list of documents or an object with a 'documents' key"),
    };
    Ok(serde_json::from_value(list)?)
}

/// Checks applied to every submission before it is enqueued.
pub fn validate_submission(subject_id: &str, documents: &[Document]) -> Result<()> {
    if subject_id.trim().is_empty() {
        bail!("subject_id must not be empty");
    }
    if documents.is_empty() {
        bail!("documents must not be empty");
    }
    let mut seen = HashSet::new();
    for doc in documents {
        let id = doc.document_id.trim();
        if id.is_empty() {
            bail!("document_id must not be empty");
        }
        if !seen.insert(id) {
            bail!("duplicate document_id: {}", id);
        }
    }
    Ok(())
}

/// Subject for a local analysis: explicit, else the first author, else `unknown`.
pub fn default_subject(explicit: Option<&str>, documents: &[Document]) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| documents.first().map(|d| d.author_id.clone()))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
