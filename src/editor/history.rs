//! Undo/redo on the editor and the text shown for it.

use std::sync::OnceLock;

use log::{debug, error, warn};
use regex::Regex;

use super::facade::EditingFacade;
use super::notify::Notification;
use crate::error::Result;
use crate::state::{Document, Replay, Routing};

fn parameter_change() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^<Parameter '(.*)': .* from (.*) to (.*)$").ok())
        .as_ref()
}

fn uncertainty() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\((.*) \+.*$").ok())
        .as_ref()
}

/// `(x +/- e)` becomes `x`; anything else is returned as is.
fn strip_uncertainty(value: &str) -> &str {
    uncertainty()
        .and_then(|re| re.captures(value))
        .and_then(|caps| caps.get(1))
        .map_or(value, |m| m.as_str())
}

fn is_bool_literal(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
}

/// Reformat a command description for display.
///
/// Parameter changes read `'name' value change from old to new`, or
/// `'name' fit change from ...` when the values are booleans. Other
/// descriptions are returned unchanged.
pub fn format_undo_text(description: &str) -> String {
    let Some(caps) = parameter_change().and_then(|re| re.captures(description)) else {
        return description.to_string();
    };
    let (Some(name), Some(old), Some(new)) = (caps.get(1), caps.get(2), caps.get(3)) else {
        return description.to_string();
    };

    let old = strip_uncertainty(old.as_str());
    let new = strip_uncertainty(new.as_str());
    let kind = if is_bool_literal(new) { "fit" } else { "value" };
    format!("'{}' {} change from {} to {}", name.as_str(), kind, old, new)
}

impl EditingFacade {
    /// Revert the most recent command group.
    pub fn undo(&mut self) -> Result<String> {
        self.ensure_idle()?;
        let old = self.minimizer.state();
        let mut doc = Document {
            sample: &mut self.sample,
            minimizer: &mut self.minimizer,
        };
        let replay = self.stack.undo(&mut doc)?;
        debug!("Undo: {}", replay.description);
        self.after_replay(&replay, &old);
        Ok(replay.description)
    }

    /// Re-apply the most recently undone group.
    pub fn redo(&mut self) -> Result<String> {
        self.ensure_idle()?;
        let old = self.minimizer.state();
        let mut doc = Document {
            sample: &mut self.sample,
            minimizer: &mut self.minimizer,
        };
        let replay = self.stack.redo(&mut doc)?;
        debug!("Redo: {}", replay.description);
        self.after_replay(&replay, &old);
        Ok(replay.description)
    }

    fn after_replay(&mut self, replay: &Replay, old: &crate::fitting::MinimizerState) {
        if replay.touches_minimizer {
            if let Err(e) = self.backend.switch_engine(self.minimizer.engine()) {
                warn!("Backend rejected engine '{}': {}", self.minimizer.engine(), e);
            }
        }
        self.clamp_selection();
        self.mark_changed();
        match replay.routing {
            Routing::Structure => {
                self.notifier.emit(Notification::StructureChanged);
                self.notifier.emit(Notification::ParametersChanged);
                self.refresh_simulation();
            }
            Routing::Parameters => {
                self.notifier.emit(Notification::ParametersChanged);
                self.refresh_simulation();
            }
            Routing::FacadeSetting => self.announce_minimizer_change(old),
            Routing::Unknown => error!("Replayed '{}' with no known origin", replay.description),
        }
        if replay.touches_minimizer && replay.routing != Routing::FacadeSetting {
            self.announce_minimizer_change(old);
        }
        self.notifier.emit(Notification::UndoRedoStateChanged);
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    /// Tooltip text for the next undo, empty when there is none.
    pub fn undo_text(&self) -> String {
        self.stack
            .undo_description()
            .map(|d| format_undo_text(&d))
            .unwrap_or_default()
    }

    pub fn redo_text(&self) -> String {
        self.stack
            .redo_description()
            .map(|d| format_undo_text(&d))
            .unwrap_or_default()
    }

    /// Undoable descriptions, most recent first.
    pub fn history(&self) -> Vec<String> {
        self.stack.history()
    }
}
