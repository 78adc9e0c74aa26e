//! Refl Editor - orchestration core for a reflectometry model editor
//!
//! Keeps a layered sample model consistent while it is edited, runs fits
//! on a worker thread with cooperative cancellation, and records every
//! edit on an undo/redo stack.
//!
//! # Architecture
//!
//! - [`sample`]: parameters, materials, layers and structural items
//! - [`data`]: experimental datasets
//! - [`fitting`]: minimizer selection, backend seam and fit sessions
//! - [`state`]: commands, the undo stack, config and project files
//! - [`editor`]: the [`EditingFacade`] driven by the view layer

pub mod cli;
pub mod data;
pub mod editor;
pub mod error;
pub mod fitting;
pub mod sample;
pub mod state;

pub use data::ExperimentData;
pub use editor::{EditingFacade, Notification, StatusInfo};
pub use error::{EditorError, ErrorCategory, Result};
pub use fitting::{FitBackend, FitResults, FitStatus, MinimizerSelector, MockBackend};
pub use sample::{ItemKind, SampleModel, SampleState};
pub use state::{CommandStack, EditorConfig};
