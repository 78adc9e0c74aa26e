//! Error handling for the editor core
//!
//! Every error maps onto one of the categories the orchestration layer
//! recovers from: validation, data, computation, persistence or invariant
//! violations. Nothing here is meant to terminate the hosting process.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for editor operations
pub type Result<T> = std::result::Result<T, EditorError>;

/// Coarse classification used by the facade to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected request; the model is unchanged.
    Validation,
    /// Missing or malformed experimental data.
    Data,
    /// The numerical backend failed or the fit was cancelled.
    Computation,
    /// Project file could not be read or written.
    Persistence,
    /// Internal state is inconsistent; logged as a defect.
    Invariant,
}

/// Main error type for editor operations
#[derive(Error, Debug)]
pub enum EditorError {
    // Validation Errors
    #[error("Index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unknown minimizer engine: {engine}")]
    UnknownEngine { engine: String },

    #[error("Method '{method}' is not available for engine '{engine}'")]
    IncompatibleMethod { engine: String, method: String },

    #[error("Value {value} for '{name}' is outside bounds [{min}, {max}]")]
    ValueOutOfBounds {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Parameter '{name}' is disabled")]
    ParameterDisabled { name: String },

    #[error("Parameter not found: {path}")]
    ParameterNotFound { path: String },

    #[error("Material not found: {id}")]
    MaterialNotFound { id: u32 },

    #[error("Material '{name}' is still used by {layers} layer(s)")]
    MaterialInUse { name: String, layers: usize },

    #[error("Cannot remove the last {what}")]
    LastElement { what: &'static str },

    #[error("Edit rejected while a fit is running")]
    FitInProgress,

    #[error("Unknown project info key: {key}")]
    UnknownProjectKey { key: String },

    // Data Errors
    #[error("No experimental data loaded")]
    MissingData,

    #[error("Experimental data is empty")]
    EmptyData,

    #[error("Column length mismatch: {column} has {actual} values, expected {expected}")]
    LengthMismatch {
        column: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Uncertainty at index {index} is {value}; weights require non-zero, finite uncertainties")]
    InvalidUncertainty { index: usize, value: f64 },

    #[error("Expected 3 or 4 data columns, found {count}")]
    BadColumnCount { count: usize },

    #[error("Malformed data file {path}: {reason}")]
    MalformedData { path: PathBuf, reason: String },

    // Computation Errors
    #[error("Fit backend error: {reason}")]
    Backend { reason: String },

    #[error("Fit worker panicked: {reason}")]
    WorkerPanicked { reason: String },

    #[error("Fitting stopped")]
    Cancelled,

    // Persistence Errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to read file: {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}: {source}")]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory creation failed: {path}: {source}")]
    DirectoryCreateError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Project already exists: {path}")]
    ProjectAlreadyExists { path: PathBuf },

    #[error("Unsupported project schema version: {version}")]
    UnsupportedSchema { version: String },

    #[error("Invalid project document: {reason}")]
    InvalidProject { reason: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Invariant Violations
    #[error("Invariant violated: {reason}")]
    Invariant { reason: String },

    // Undo/Redo
    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EditorError {
    /// Map this error onto the recovery taxonomy.
    pub fn category(&self) -> ErrorCategory {
        use EditorError as E;
        match self {
            E::IndexOutOfRange { .. }
            | E::UnknownEngine { .. }
            | E::IncompatibleMethod { .. }
            | E::ValueOutOfBounds { .. }
            | E::ParameterDisabled { .. }
            | E::ParameterNotFound { .. }
            | E::MaterialNotFound { .. }
            | E::MaterialInUse { .. }
            | E::LastElement { .. }
            | E::FitInProgress
            | E::UnknownProjectKey { .. }
            | E::NothingToUndo
            | E::NothingToRedo => ErrorCategory::Validation,
            E::MissingData
            | E::EmptyData
            | E::LengthMismatch { .. }
            | E::InvalidUncertainty { .. }
            | E::BadColumnCount { .. }
            | E::MalformedData { .. } => ErrorCategory::Data,
            E::Backend { .. } | E::WorkerPanicked { .. } | E::Cancelled => {
                ErrorCategory::Computation
            }
            E::FileNotFound { .. }
            | E::FileReadError { .. }
            | E::FileWriteError { .. }
            | E::DirectoryCreateError { .. }
            | E::ProjectAlreadyExists { .. }
            | E::UnsupportedSchema { .. }
            | E::InvalidProject { .. }
            | E::Json(_)
            | E::Io(_) => ErrorCategory::Persistence,
            E::Invariant { .. } => ErrorCategory::Invariant,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            EditorError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            EditorError::UnknownEngine { .. } => "UNKNOWN_ENGINE",
            EditorError::IncompatibleMethod { .. } => "INCOMPATIBLE_METHOD",
            EditorError::ValueOutOfBounds { .. } => "VALUE_OUT_OF_BOUNDS",
            EditorError::ParameterDisabled { .. } => "PARAMETER_DISABLED",
            EditorError::ParameterNotFound { .. } => "PARAMETER_NOT_FOUND",
            EditorError::MaterialNotFound { .. } => "MATERIAL_NOT_FOUND",
            EditorError::MaterialInUse { .. } => "MATERIAL_IN_USE",
            EditorError::LastElement { .. } => "LAST_ELEMENT",
            EditorError::FitInProgress => "FIT_IN_PROGRESS",
            EditorError::UnknownProjectKey { .. } => "UNKNOWN_PROJECT_KEY",
            EditorError::MissingData => "MISSING_DATA",
            EditorError::EmptyData => "EMPTY_DATA",
            EditorError::LengthMismatch { .. } => "LENGTH_MISMATCH",
            EditorError::InvalidUncertainty { .. } => "INVALID_UNCERTAINTY",
            EditorError::BadColumnCount { .. } => "BAD_COLUMN_COUNT",
            EditorError::MalformedData { .. } => "MALFORMED_DATA",
            EditorError::Backend { .. } => "BACKEND_ERROR",
            EditorError::WorkerPanicked { .. } => "WORKER_PANICKED",
            EditorError::Cancelled => "CANCELLED",
            EditorError::FileNotFound { .. } => "FILE_NOT_FOUND",
            EditorError::FileReadError { .. } => "FILE_READ_ERROR",
            EditorError::FileWriteError { .. } => "FILE_WRITE_ERROR",
            EditorError::DirectoryCreateError { .. } => "DIRECTORY_CREATE_ERROR",
            EditorError::ProjectAlreadyExists { .. } => "PROJECT_ALREADY_EXISTS",
            EditorError::UnsupportedSchema { .. } => "UNSUPPORTED_SCHEMA",
            EditorError::InvalidProject { .. } => "INVALID_PROJECT",
            EditorError::Json(_) => "SERIALIZATION_ERROR",
            EditorError::Invariant { .. } => "INVARIANT_VIOLATION",
            EditorError::NothingToUndo => "NOTHING_TO_UNDO",
            EditorError::NothingToRedo => "NOTHING_TO_REDO",
            EditorError::Io(_) => "IO_ERROR",
        }
    }

    /// Check if the session can carry on unchanged after this error.
    ///
    /// Everything except an invariant violation leaves the model untouched.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.category(), ErrorCategory::Invariant)
    }

    /// Returns a user-friendly recovery suggestion.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            EditorError::FitInProgress => Some("Stop the running fit before editing the sample."),
            EditorError::MissingData | EditorError::EmptyData => {
                Some("Load an experimental data file before fitting.")
            }
            EditorError::InvalidUncertainty { .. } => {
                Some("Check the uncertainty column; zero errors cannot be used as fit weights.")
            }
            EditorError::MalformedData { .. } | EditorError::BadColumnCount { .. } => {
                Some("Data files need 3 or 4 whitespace-separated numeric columns.")
            }
            EditorError::InvalidProject { .. } => {
                Some("The project file is damaged; restore it from a backup or create a new project.")
            }
            EditorError::MaterialInUse { .. } => {
                Some("Assign another material to the layers that use it first.")
            }
            EditorError::FileNotFound { .. } => Some("Check the file path and try again."),
            EditorError::ProjectAlreadyExists { .. } => {
                Some("Choose a new directory or load the existing project.")
            }
            EditorError::NothingToUndo => Some("There are no actions to undo."),
            EditorError::NothingToRedo => Some("There are no undone actions to redo."),
            _ => None,
        }
    }
}
