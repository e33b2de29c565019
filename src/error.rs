//! Error types for the diagnostic engine.
//!
//! The library reports three failure families with `thiserror`:
//!
//! - [`LoadError`]: the knowledge base could not be constructed. Fatal at
//!   startup: no queries are served without a loaded [`KnowledgeBase`](crate::knowledge::KnowledgeBase).
//! - [`EngineError`]: a single query against the reasoning engine failed.
//!   Session history is left untouched, so the call is safe to retry.
//! - [`LedgerError`]: the feedback store could not be read or written.
//!
//! Application-level code (CLI, server, config) wraps these in `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::Category;

/// Failure while loading the knowledge base for a manufacturer/version.
#[derive(Error, Debug)]
pub enum LoadError {
    /// None of the candidate paths for a required category exist.
    #[error("required {category} source not found (tried: {})", display_paths(.tried))]
    MissingRequired {
        category: Category,
        tried: Vec<PathBuf>,
    },

    /// A source file exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source file is not valid JSON or does not match the expected schema.
    #[error("malformed JSON in {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An entry violates a knowledge-base invariant (blank description,
    /// duplicate code).
    #[error("invalid {category} entry in {}: {reason}", .path.display())]
    InvalidEntry {
        category: Category,
        path: PathBuf,
        reason: String,
    },
}

pub(crate) fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure of a single diagnostic query.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("reasoning engine is disabled; set [engine] provider in config")]
    Disabled,

    #[error("API key not set: environment variable {0} is missing")]
    MissingApiKey(String),

    #[error("authentication failed ({status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("rate limited by reasoning engine: {0}")]
    RateLimited(String),

    #[error("reasoning engine error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error calling reasoning engine: {0}")]
    Network(#[from] reqwest::Error),

    #[error("reasoning engine timed out after {0}s")]
    Timeout(u64),

    #[error("reasoning engine returned an empty reply")]
    EmptyReply,

    #[error("invalid reasoning engine response: {0}")]
    InvalidResponse(String),
}

/// Failure of the feedback store.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("feedback store I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("feedback store at {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize feedback: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("feedback ledger lock poisoned")]
    Poisoned,
}
