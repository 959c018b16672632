//! JSON loading for schemas and documents.
//!
//! Handles loading from files, strings and stdin (`-`).

use std::io::Read;
use std::path::Path;

use serde_json::Value;

use crate::error::LoadError;
use crate::schema::Schema;

/// Source name that reads from standard input.
pub const STDIN_SOURCE: &str = "-";

/// Load a JSON value from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_json_str(&content)
}

/// Load a JSON value from a string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_json_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a JSON value from a file path, or from stdin when `source` is `-`.
pub fn load_json_auto(source: &str) -> Result<Value, LoadError> {
    if source != STDIN_SOURCE {
        return load_json(Path::new(source));
    }

    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .map_err(|source| LoadError::ReadError {
            path: STDIN_SOURCE.into(),
            source,
        })?;
    load_json_str(&content)
}

/// Load and normalize a schema configuration file.
///
/// Malformed entries inside a valid JSON file are skipped, not reported.
pub fn load_schema(path: &Path) -> Result<Schema, LoadError> {
    load_json(path).map(|config| Schema::from_value(&config))
}
