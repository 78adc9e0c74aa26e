//! Fit lifecycle on the editor.
//!
//! A fit is bracketed by a "Fit" macro on the command stack so the whole
//! write-back of fitted values undoes as one step.

use std::time::Duration;

use log::{info, warn};

use super::facade::EditingFacade;
use super::notify::Notification;
use crate::error::{EditorError, Result};
use crate::fitting::{FitOutcome, FitProblem, FitResults};
use crate::state::{Command, Document, ValueSnapshot};

impl EditingFacade {
    /// Start a fit of the free parameters against the loaded data.
    ///
    /// Calling this while a fit is running stops that fit and starts
    /// nothing. Data problems are reported through
    /// [`Notification::FitFailed`] without ever entering the running state.
    pub fn start_fit(&mut self) -> Result<()> {
        if self.session.is_running() {
            info!("Fit already running; stopping it");
            self.stop_fit();
            return Ok(());
        }

        let problem = match self.prepare_problem() {
            Ok(problem) => problem,
            Err(e) => {
                warn!("Fit not started: {}", e);
                self.notifier.emit(Notification::FitFailed(e.to_string()));
                return Err(e);
            }
        };
        info!(
            "Starting fit of {} parameters with {}",
            problem.free.len(),
            self.minimizer.label()
        );

        self.stack.begin_macro("Fit");
        self.fit_finished = false;
        self.notifier.emit(Notification::FitRunningStateChanged);

        let mode = self.config.execution;
        if let Err(e) = self.session.start(self.backend.clone(), problem, mode) {
            self.stack.end_macro();
            self.fit_finished = true;
            self.notifier.emit(Notification::FitRunningStateChanged);
            self.notifier.emit(Notification::FitFailed(e.to_string()));
            return Err(e);
        }

        if !mode.is_threaded() {
            if let Some(result) = self.poll_fit() {
                return result;
            }
        }
        Ok(())
    }

    /// Collect a finished fit without blocking.
    ///
    /// `None` while the worker is still running or when no fit was started.
    pub fn poll_fit(&mut self) -> Option<Result<()>> {
        let result = self.session.poll()?;
        Some(self.complete_fit(result))
    }

    /// Block up to `timeout` for the running fit.
    pub fn wait_fit(&mut self, timeout: Duration) -> Option<Result<()>> {
        let result = self.session.wait(timeout)?;
        Some(self.complete_fit(result))
    }

    /// Cancel the running fit. Returns `false`, with no notifications,
    /// when nothing was running.
    pub fn stop_fit(&mut self) -> bool {
        if !self.session.cancel() {
            return false;
        }
        info!("Fit stopped");
        self.stack.close_macros();
        self.fit_results = FitResults::cancelled();
        self.notifier.emit(Notification::FitResultsChanged);
        self.fit_finished = true;
        self.notifier.emit(Notification::FitRunningStateChanged);
        self.notifier
            .emit(Notification::FitFailed(EditorError::Cancelled.to_string()));
        self.notifier.emit(Notification::UndoRedoStateChanged);
        true
    }

    fn prepare_problem(&self) -> Result<FitProblem> {
        let data = self.experiment.as_ref().ok_or(EditorError::MissingData)?;
        let weights = data.weights()?;
        let free = self
            .sample
            .free_parameters()
            .into_iter()
            .map(|(path, _)| path)
            .collect();
        Ok(FitProblem {
            x: data.x.clone(),
            y: data.y.clone(),
            weights,
            engine: self.minimizer.engine().to_string(),
            method: self.minimizer.method().to_string(),
            sample: self.sample.clone(),
            free,
        })
    }

    fn complete_fit(&mut self, result: Result<FitOutcome>) -> Result<()> {
        match result {
            Ok(outcome) => {
                let written = self.write_back(&outcome);
                self.stack.end_macro();
                self.fit_results = FitResults::from_outcome(&outcome);
                info!(
                    "Fit finished: success={} nvarys={} redchi2={}",
                    outcome.success, outcome.n_pars, outcome.reduced_chi
                );
                self.notifier.emit(Notification::FitResultsChanged);
                self.fit_finished = true;
                self.notifier.emit(Notification::FitRunningStateChanged);
                self.notifier.emit(Notification::FitFinished);
                if written > 0 {
                    self.mark_changed();
                }
                self.on_parameters_changed();
                Ok(())
            }
            Err(e) => {
                warn!("Fit failed: {}", e);
                self.stack.close_macros();
                self.fit_finished = true;
                self.notifier.emit(Notification::FitRunningStateChanged);
                self.notifier.emit(Notification::FitFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Record fitted values as commands inside the open "Fit" macro.
    fn write_back(&mut self, outcome: &FitOutcome) -> usize {
        let mut written = 0;
        for fitted in &outcome.values {
            let Some(parameter) = self.sample.parameter(&fitted.path) else {
                warn!("Fitted value for unknown parameter {}", fitted.path);
                continue;
            };
            let new = ValueSnapshot {
                value: fitted.value,
                error: fitted.error,
            };
            let old = ValueSnapshot::of(parameter);
            if old == new {
                continue;
            }
            let command = Command::SetParameterValue {
                path: fitted.path,
                name: parameter.name.clone(),
                old,
                new,
            };
            let mut doc = Document {
                sample: &mut self.sample,
                minimizer: &mut self.minimizer,
            };
            match self.stack.execute(command, &mut doc) {
                Ok(()) => written += 1,
                Err(e) => warn!("Could not apply fitted value to {}: {}", fitted.path, e),
            }
        }
        written
    }
}
