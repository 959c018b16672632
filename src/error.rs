//! Error types for loading inputs and serializing resources.
//!
//! Deserialization, coercion, schema normalization and query parsing are
//! infallible; they degrade malformed input instead of rejecting it.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while turning application objects into a wire document.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("invalid resource at {path}: expected object or null, got {actual}")]
    InvalidResource { path: String, actual: String },

    #[error("cannot determine resource type from {descriptor}")]
    UnresolvedType { descriptor: String },
}

impl SerializeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors while reading schema or document files.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
        }
    }
}
