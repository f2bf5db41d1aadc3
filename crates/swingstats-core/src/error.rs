// Error types for workbook ingestion.

use std::path::PathBuf;

use thiserror::Error;

/// Why a single workbook could not be ingested. Every variant is scoped to
/// one file; a batch keeps going after any of them.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("workbook has no `{sheet}` sheet")]
    MissingSheet { sheet: String },

    #[error("could not extract match metadata: {message}")]
    MetadataExtraction { message: String },

    #[error("sheet `{sheet}` is missing required columns: {}", missing.join(", "))]
    SchemaMismatch { sheet: String, missing: Vec<String> },

    #[error("sheet `{sheet}` row {row}: column `{column}` {message}")]
    InvalidCell {
        sheet: String,
        row: usize,
        column: String,
        message: String,
    },

    #[error("ingestion failed, nothing was written: {message}")]
    IngestionFailed { message: String },
}

impl IngestError {
    /// Wrap a storage error, keeping its full context chain in the message.
    pub fn storage(err: anyhow::Error) -> Self {
        IngestError::IngestionFailed {
            message: format!("{err:#}"),
        }
    }
}
