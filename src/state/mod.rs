//! State Management Module
//!
//! Provides configuration, reversible commands, the undo/redo stack and
//! the project document.

pub mod command;
pub mod config;
pub mod project;
pub mod undo;

pub use command::{Command, CommandParent, Document, RenameTarget, ValueSnapshot};
pub use config::EditorConfig;
pub use project::{ProjectDocument, ProjectInfo, CURRENT_SCHEMA_VERSION, EXAMPLE_LOCATION};
pub use undo::{CommandGroup, CommandStack, Replay, Routing, DEFAULT_MAX_UNDO_LEVELS};
