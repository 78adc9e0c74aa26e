//! Experimental data handling.

pub mod experiment;

pub use experiment::ExperimentData;
