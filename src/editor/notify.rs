//! Change notifications observed by the view layer.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};

use log::trace;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    StructureChanged,
    ParametersChanged,
    FitResultsChanged,
    FitFinished,
    FitRunningStateChanged,
    FitFailed(String),
    MinimizerEngineChanged,
    MinimizerMethodChanged,
    StatusInfoChanged,
    UndoRedoStateChanged,
    ProjectInfoChanged,
    ProjectCreatedChanged,
    StateChanged,
    ExperimentDataAdded,
    ExperimentDataRemoved,
    SimulatedCurveChanged,
    ProjectSaved { ok: bool, message: String },
    ProjectLoaded { ok: bool, message: String },
    ReportSaved { ok: bool, path: PathBuf },
}

/// Fan-out of notifications to channel subscribers.
///
/// Emitted notifications are also kept in a log until drained, which is
/// what tests and the CLI read.
#[derive(Debug, Default)]
pub struct Notifier {
    subscribers: Vec<Sender<Notification>>,
    log: Vec<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<Notification> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, notification: Notification) {
        trace!("notify {:?}", notification);
        self.subscribers
            .retain(|subscriber| subscriber.send(notification.clone()).is_ok());
        self.log.push(notification);
    }

    /// Take everything emitted since the last drain.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.log)
    }

    pub fn pending(&self) -> &[Notification] {
        &self.log
    }
}
