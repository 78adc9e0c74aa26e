//! Interface to the physics engine that computes and fits curves.

use super::cancellation::CancellationToken;
use super::results::{FitOutcome, FitProblem};
use crate::error::Result;
use crate::sample::SampleState;

/// Numerical backend consumed by the editor.
///
/// Implementations must be shareable with the fit worker thread. `fit`
/// receives an owned snapshot of the sample and must not touch the editor's
/// live state; it is expected to poll `cancel` between iterations.
pub trait FitBackend: Send + Sync {
    /// Name of the calculation interface, shown in status info.
    fn interface_name(&self) -> &str;

    /// Engine names the backend can run, in preference order.
    fn available_engines(&self) -> Vec<String>;

    /// Make `name` the active engine.
    fn switch_engine(&self, name: &str) -> Result<()>;

    /// Simulated `(q, intensity)` pairs for the given q grid.
    fn compute_curve(&self, sample: &SampleState, q: &[f64]) -> Result<Vec<(f64, f64)>>;

    /// Run one fit.
    fn fit(&self, problem: &FitProblem, cancel: &CancellationToken) -> Result<FitOutcome>;
}
