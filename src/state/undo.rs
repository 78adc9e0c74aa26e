//! Undo/Redo System
//!
//! A linear command history with macro grouping. Each history entry is a
//! group of one or more commands applied and reverted together. Replaying
//! a group reports a [`Routing`] that tells the editor which change
//! notifications the replay requires.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{EditorError, Result};
use crate::state::command::{Command, CommandParent, Document};

/// Default maximum number of undo levels to keep.
pub const DEFAULT_MAX_UNDO_LEVELS: usize = 100;

/// One undoable step: a non-empty list of commands under one label.
#[derive(Debug, Clone, Serialize)]
pub struct CommandGroup {
    pub id: String,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub commands: Vec<Command>,
}

impl CommandGroup {
    fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            timestamp: Utc::now(),
            commands: Vec::new(),
        }
    }

    fn single(command: Command) -> Self {
        let mut group = Self::new(command.description());
        group.commands.push(command);
        group
    }

    /// A single command describes itself; a macro uses its label.
    pub fn description(&self) -> String {
        match self.commands.as_slice() {
            [only] => only.description(),
            _ => self.label.clone(),
        }
    }

    /// Which views must refresh after this group is replayed.
    pub fn routing(&self) -> Routing {
        match self.commands.as_slice() {
            [] => Routing::Unknown,
            [only] => match only.parent() {
                CommandParent::StructuralChange => Routing::Structure,
                CommandParent::ParameterChange => Routing::Parameters,
                CommandParent::FacadeSetting => Routing::FacadeSetting,
                CommandParent::Unknown => Routing::Unknown,
            },
            _ => Routing::Structure,
        }
    }

    fn revert(&self, doc: &mut Document<'_>) -> Result<()> {
        self.commands.iter().rev().try_for_each(|c| c.undo(doc))
    }

    fn reapply(&self, doc: &mut Document<'_>) -> Result<()> {
        self.commands.iter().try_for_each(|c| c.redo(doc))
    }
}

/// Notification set a replayed group calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Structure and parameters changed.
    Structure,
    /// Only parameter values changed.
    Parameters,
    /// An editor setting changed; its own notifications apply.
    FacadeSetting,
    /// Defect: no content notification.
    Unknown,
}

/// Result of an undo or redo.
#[derive(Debug, Clone)]
pub struct Replay {
    pub description: String,
    pub routing: Routing,
    /// The group contained a minimizer change.
    pub touches_minimizer: bool,
}

/// Manages undo/redo for an editing session.
///
/// Explicitly owned by the editor; cleared on project load and reset.
#[derive(Debug, Clone)]
pub struct CommandStack {
    history: VecDeque<CommandGroup>,
    future: Vec<CommandGroup>,
    open: Option<CommandGroup>,
    macro_depth: usize,
    enabled: bool,
    max_undo_levels: usize,
    discarded: usize,
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO_LEVELS)
    }
}

impl CommandStack {
    pub fn new(max_levels: usize) -> Self {
        Self {
            history: VecDeque::new(),
            future: Vec::new(),
            open: None,
            macro_depth: 0,
            enabled: true,
            max_undo_levels: max_levels.max(1),
            discarded: 0,
        }
    }

    /// Apply `command` and record it.
    pub fn execute(&mut self, command: Command, doc: &mut Document<'_>) -> Result<()> {
        command.redo(doc)?;
        self.push(command);
        Ok(())
    }

    /// Record a command whose effect is already applied.
    ///
    /// Inside a macro the command joins the open group. A disabled stack
    /// drops it.
    pub fn push(&mut self, command: Command) {
        if !self.enabled {
            debug!("Command stack disabled; not recording '{}'", command.description());
            return;
        }
        match self.open.as_mut() {
            Some(group) => group.commands.push(command),
            None => self.commit(CommandGroup::single(command)),
        }
    }

    /// Open a macro. Nested calls join the outermost macro.
    pub fn begin_macro(&mut self, label: impl Into<String>) {
        self.macro_depth += 1;
        if self.macro_depth == 1 {
            self.open = Some(CommandGroup::new(label));
        }
    }

    /// Close a macro. Returns `true` when the outermost macro was closed
    /// and recorded; an empty macro is discarded.
    pub fn end_macro(&mut self) -> bool {
        if self.macro_depth == 0 {
            warn!("end_macro called without an open macro");
            return false;
        }
        self.macro_depth -= 1;
        if self.macro_depth > 0 {
            return false;
        }
        match self.open.take() {
            Some(group) if !group.commands.is_empty() => {
                self.commit(group);
                true
            }
            _ => false,
        }
    }

    pub fn in_macro(&self) -> bool {
        self.macro_depth > 0
    }

    /// Close every open macro, recording what they collected.
    pub fn close_macros(&mut self) {
        while self.macro_depth > 0 {
            self.end_macro();
        }
    }

    /// Revert the most recent group.
    ///
    /// A command that fails to revert is logged as a defect and the group
    /// is routed as [`Routing::Unknown`]; the stack pointer still moves.
    pub fn undo(&mut self, doc: &mut Document<'_>) -> Result<Replay> {
        self.close_macros();
        let group = self.history.pop_back().ok_or(EditorError::NothingToUndo)?;
        let replay = replay_of(&group, group.revert(doc));
        self.future.push(group);
        Ok(replay)
    }

    /// Re-apply the most recently undone group.
    pub fn redo(&mut self, doc: &mut Document<'_>) -> Result<Replay> {
        self.close_macros();
        let group = self.future.pop().ok_or(EditorError::NothingToRedo)?;
        let replay = replay_of(&group, group.reapply(doc));
        self.history.push_back(group);
        Ok(replay)
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Raw description of the group `undo` would revert.
    pub fn undo_description(&self) -> Option<String> {
        self.history.back().map(CommandGroup::description)
    }

    /// Raw description of the group `redo` would re-apply.
    pub fn redo_description(&self) -> Option<String> {
        self.future.last().map(CommandGroup::description)
    }

    pub fn peek_undo(&self) -> Option<&CommandGroup> {
        self.history.back()
    }

    pub fn peek_redo(&self) -> Option<&CommandGroup> {
        self.future.last()
    }

    /// Descriptions of undoable groups, most recent first.
    pub fn history(&self) -> Vec<String> {
        self.history.iter().rev().map(CommandGroup::description).collect()
    }

    pub fn undo_count(&self) -> usize {
        self.history.len()
    }

    pub fn redo_count(&self) -> usize {
        self.future.len()
    }

    /// Number of groups dropped by trimming since the last clear.
    pub fn discarded_count(&self) -> usize {
        self.discarded
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn max_undo_levels(&self) -> usize {
        self.max_undo_levels
    }

    /// If the new limit is lower than the current depth, the oldest groups are dropped.
    pub fn set_max_undo_levels(&mut self, max_levels: usize) {
        self.max_undo_levels = max_levels.max(1);
        self.trim_history();
    }

    /// Drop all history, including any open macro.
    pub fn clear(&mut self) {
        self.history.clear();
        self.future.clear();
        self.open = None;
        self.macro_depth = 0;
        self.discarded = 0;
    }

    fn commit(&mut self, group: CommandGroup) {
        debug!("Recorded '{}' ({} command(s))", group.label, group.commands.len());
        self.future.clear();
        self.history.push_back(group);
        self.trim_history();
    }

    fn trim_history(&mut self) {
        while self.history.len() > self.max_undo_levels {
            self.history.pop_front();
            self.discarded += 1;
        }
    }
}

fn replay_of(group: &CommandGroup, outcome: Result<()>) -> Replay {
    let routing = match outcome {
        Ok(()) => group.routing(),
        Err(e) => {
            error!("Replaying '{}' failed: {}", group.description(), e);
            Routing::Unknown
        }
    };
    Replay {
        description: group.description(),
        routing,
        touches_minimizer: group
            .commands
            .iter()
            .any(|c| matches!(c, Command::SetMinimizer { .. })),
    }
}
