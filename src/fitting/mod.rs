//! Fitting: backend interface, minimizer selection and the fit session.

pub mod backend;
pub mod cancellation;
pub mod minimizer;
pub mod mock;
pub mod results;
pub mod session;

pub use backend::FitBackend;
pub use cancellation::CancellationToken;
pub use minimizer::{default_method, MinimizerSelector, MinimizerState};
pub use mock::{MockBackend, MOCK_ENGINES};
pub use results::{FitOutcome, FitProblem, FitResults, FitStatus, FittedValue};
pub use session::{ExecutionMode, FitSession, FitState};
