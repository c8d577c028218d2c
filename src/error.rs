//! Typed failure kinds for the load boundary and the matcher preconditions.
//!
//! Core transformations are total over well-formed tables; only table loading
//! and cross-match precondition checks produce these errors. A match run that
//! finds zero rows is a valid empty result, not an error.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },
    #[error("file contains no data: {}", path.display())]
    EmptyInput { path: PathBuf },
    #[error("failed to parse {}: {message}", path.display())]
    UnparseableInput { path: PathBuf, message: String },
    #[error("missing required column(s): {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },
}

impl ReconcileError {
    /// Builds a `SchemaMismatch` from an unsorted set of missing column names.
    pub fn schema_mismatch<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut missing: Vec<String> = missing.into_iter().map(Into::into).collect();
        missing.sort();
        missing.dedup();
        ReconcileError::SchemaMismatch { missing }
    }
}
