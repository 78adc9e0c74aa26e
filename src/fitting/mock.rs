//! Mock backend for tests and the CLI
//!
//! Does no real optimisation. It returns a configured outcome after a
//! configurable number of iterations, checking the cancellation token
//! between them so cancellation paths can be exercised deterministically.

use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, info};

use super::backend::FitBackend;
use super::cancellation::CancellationToken;
use super::results::{FitOutcome, FitProblem, FittedValue};
use crate::error::{EditorError, Result};
use crate::sample::SampleState;

/// Engines the mock pretends to provide.
pub const MOCK_ENGINES: &[&str] = &["lmfit", "bumps", "DFO_LS"];

#[derive(Debug, Clone)]
enum FailureMode {
    None,
    Error(String),
    Panic(String),
}

pub struct MockBackend {
    outcome: FitOutcome,
    iterations: usize,
    delay: Duration,
    failure: FailureMode,
    engine: Mutex<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            outcome: FitOutcome {
                success: true,
                n_pars: 0,
                goodness_of_fit: 1.0,
                reduced_chi: 1.0,
                values: Vec::new(),
            },
            iterations: 1,
            delay: Duration::ZERO,
            failure: FailureMode::None,
            engine: Mutex::new(MOCK_ENGINES[0].to_string()),
        }
    }

    /// Outcome returned by every fit. With no `values`, each free
    /// parameter is reported back at its current value.
    pub fn with_outcome(mut self, outcome: FitOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every fit fails with a backend error.
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = FailureMode::Error(reason.into());
        self
    }

    /// Every fit panics inside the backend.
    pub fn panicking(mut self, reason: impl Into<String>) -> Self {
        self.failure = FailureMode::Panic(reason.into());
        self
    }

    pub fn current_engine(&self) -> String {
        self.engine
            .lock()
            .map(|engine| engine.clone())
            .unwrap_or_default()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FitBackend for MockBackend {
    fn interface_name(&self) -> &str {
        "mock"
    }

    fn available_engines(&self) -> Vec<String> {
        MOCK_ENGINES.iter().map(|s| s.to_string()).collect()
    }

    fn switch_engine(&self, name: &str) -> Result<()> {
        if !MOCK_ENGINES.contains(&name) {
            return Err(EditorError::UnknownEngine {
                engine: name.to_string(),
            });
        }
        let mut engine = self.engine.lock().map_err(|_| EditorError::Backend {
            reason: "engine lock poisoned".to_string(),
        })?;
        *engine = name.to_string();
        Ok(())
    }

    fn compute_curve(&self, sample: &SampleState, q: &[f64]) -> Result<Vec<(f64, f64)>> {
        let scale = sample.model.scale.value;
        let background = sample.model.background.value;
        let roughness: f64 = sample.model.layers().map(|l| l.roughness.value).sum();
        Ok(q.iter()
            .map(|&q| {
                let fresnel = 1.0 / (1.0 + (q / 0.02).powi(4));
                let damping = (-(q * roughness).powi(2) / 2.0).exp();
                (q, scale * fresnel * damping + background)
            })
            .collect())
    }

    fn fit(&self, problem: &FitProblem, cancel: &CancellationToken) -> Result<FitOutcome> {
        info!(
            engine = %problem.engine,
            method = %problem.method,
            points = problem.x.len(),
            free = problem.free.len(),
            "mock fit started"
        );

        for iteration in 0..self.iterations {
            cancel.checkpoint()?;
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            debug!(iteration, "mock fit iteration");
        }
        cancel.checkpoint()?;

        match &self.failure {
            FailureMode::None => {}
            FailureMode::Error(reason) => {
                return Err(EditorError::Backend {
                    reason: reason.clone(),
                })
            }
            FailureMode::Panic(reason) => panic!("{}", reason),
        }

        let mut outcome = self.outcome.clone();
        if outcome.values.is_empty() {
            outcome.values = problem
                .free
                .iter()
                .filter_map(|path| {
                    problem.sample.parameter(path).map(|p| FittedValue {
                        path: *path,
                        value: p.value,
                        error: Some(p.value.abs() * 0.01),
                    })
                })
                .collect();
        }
        info!(success = outcome.success, "mock fit finished");
        Ok(outcome)
    }
}
