//! Editor Module
//!
//! The editing facade the view layer drives, its notifications and the
//! undo/redo text formatting.

mod facade;
mod fit;
mod history;
mod notify;
mod persistence;

pub use facade::{default_q_grid, EditingFacade, StatusInfo, DEFAULT_Q_POINTS, DEFAULT_Q_RANGE};
pub use history::format_undo_text;
pub use notify::{Notification, Notifier};
