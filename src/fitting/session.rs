//! One fit at a time, on a worker thread or inline.
//!
//! The session owns the cancellation token and the receiving end of the
//! result channel; the worker owns only its snapshot of the problem.
//! Cancelling drops the receiver, so a result that arrives afterwards is
//! discarded. The cancelled worker's handle is kept until it has exited;
//! no new fit is dispatched while it is still running.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use super::backend::FitBackend;
use super::cancellation::CancellationToken;
use super::results::{FitOutcome, FitProblem};
use crate::error::{EditorError, Result};

/// Where the backend runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Inline on macOS, where the numerical backend is not thread safe;
    /// a worker thread elsewhere.
    #[default]
    Auto,
    Threaded,
    Synchronous,
}

impl ExecutionMode {
    pub fn is_threaded(self) -> bool {
        match self {
            ExecutionMode::Auto => !cfg!(target_os = "macos"),
            ExecutionMode::Threaded => true,
            ExecutionMode::Synchronous => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitState {
    Idle,
    Running,
    Cancelling,
}

pub struct FitSession {
    state: FitState,
    token: Option<CancellationToken>,
    results: Option<Receiver<Result<FitOutcome>>>,
    worker: Option<thread::JoinHandle<()>>,
    cancelled: Option<thread::JoinHandle<()>>,
}

impl FitSession {
    pub fn new() -> Self {
        Self {
            state: FitState::Idle,
            token: None,
            results: None,
            worker: None,
            cancelled: None,
        }
    }

    pub fn state(&self) -> FitState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == FitState::Running
    }

    /// Dispatch `problem` to `backend`.
    ///
    /// In synchronous mode this blocks until the backend returns; the result
    /// is still collected through [`poll`](FitSession::poll).
    pub fn start(
        &mut self,
        backend: Arc<dyn FitBackend>,
        problem: FitProblem,
        mode: ExecutionMode,
    ) -> Result<()> {
        if self.state != FitState::Idle || !self.reap_cancelled() {
            return Err(EditorError::FitInProgress);
        }

        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel();
        self.token = Some(token.clone());
        self.results = Some(rx);
        self.state = FitState::Running;

        if mode.is_threaded() {
            let spawned = thread::Builder::new()
                .name("fit-worker".to_string())
                .spawn(move || {
                    tracing::debug!(engine = %problem.engine, "fit worker started");
                    let result = run_guarded(backend.as_ref(), &problem, &token);
                    if tx.send(result).is_err() {
                        tracing::debug!("fit result discarded after cancellation");
                    }
                });
            match spawned {
                Ok(handle) => self.worker = Some(handle),
                Err(e) => {
                    self.reset();
                    return Err(EditorError::Backend {
                        reason: format!("failed to spawn fit worker: {}", e),
                    });
                }
            }
        } else {
            let result = run_guarded(backend.as_ref(), &problem, &token);
            // The receiver is held by `self`, so this cannot fail.
            let _ = tx.send(result);
        }

        debug!("Fit session running (threaded: {})", mode.is_threaded());
        Ok(())
    }

    /// Non-blocking check for a finished fit.
    pub fn poll(&mut self) -> Option<Result<FitOutcome>> {
        let received = match self.results.as_ref()?.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(EditorError::WorkerPanicked {
                reason: "fit worker exited without a result".to_string(),
            }),
        };
        self.finish();
        Some(received)
    }

    /// Block up to `timeout` for a finished fit.
    pub fn wait(&mut self, timeout: Duration) -> Option<Result<FitOutcome>> {
        let received = match self.results.as_ref()?.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => Err(EditorError::WorkerPanicked {
                reason: "fit worker exited without a result".to_string(),
            }),
        };
        self.finish();
        Some(received)
    }

    /// Request cancellation. Returns `false` when no fit was running.
    ///
    /// Does not wait for the worker; it stops at its next checkpoint.
    pub fn cancel(&mut self) -> bool {
        if self.state != FitState::Running {
            return false;
        }
        self.state = FitState::Cancelling;
        if let Some(token) = &self.token {
            token.cancel();
        }
        debug!("Fit cancellation requested");
        self.cancelled = self.worker.take();
        self.reset();
        true
    }

    /// Join a cancelled worker once it has exited. Returns `false` while it
    /// is still inside the backend.
    fn reap_cancelled(&mut self) -> bool {
        match self.cancelled.take() {
            Some(handle) if !handle.is_finished() => {
                self.cancelled = Some(handle);
                false
            }
            Some(handle) => {
                if handle.join().is_err() {
                    log::warn!("Cancelled fit worker terminated abnormally");
                }
                true
            }
            None => true,
        }
    }

    fn finish(&mut self) {
        if let Some(handle) = self.worker.take() {
            // The worker has sent its result and is about to return.
            if handle.join().is_err() {
                log::warn!("Fit worker terminated abnormally");
            }
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.token = None;
        self.results = None;
        self.worker = None;
        self.state = FitState::Idle;
    }
}

impl Default for FitSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FitSession {
    fn drop(&mut self) {
        if let Some(token) = &self.token {
            token.cancel();
        }
    }
}

fn run_guarded(
    backend: &dyn FitBackend,
    problem: &FitProblem,
    token: &CancellationToken,
) -> Result<FitOutcome> {
    panic::catch_unwind(AssertUnwindSafe(|| backend.fit(problem, token))).unwrap_or_else(
        |payload| {
            Err(EditorError::WorkerPanicked {
                reason: panic_message(payload.as_ref()),
            })
        },
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
