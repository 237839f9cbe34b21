//! Error types for the mislabeled library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum MislabeledError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid count value '{value}' at row {row}, column {col}")]
    InvalidCount {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Invalid numeric value '{value}' for sample '{sample}', column '{column}'")]
    InvalidValue {
        value: String,
        sample: String,
        column: String,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Sample ID mismatch: {0}")]
    SampleMismatch(String),

    #[error("Missing column '{0}' in metadata")]
    MissingColumn(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Focus labels that the reference dataset cannot account for.
    #[error("Focus labels not present in the reference: {}", missing.join(", "))]
    LabelMismatch { missing: Vec<String> },

    /// A persisted table lacks mandatory columns.
    #[error("Invalid mislabeled table: missing required column(s) {}", missing.join(", "))]
    Format { missing: Vec<String> },

    /// A collaborator (table operation, classifier, source tracker) failed.
    #[error("{procedure} failed: {message}")]
    External { procedure: String, message: String },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MislabeledError {
    /// Build an external-procedure error.
    pub fn external(procedure: &str, message: impl Into<String>) -> Self {
        Self::External {
            procedure: procedure.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, MislabeledError>;
