//! Fit inputs and outputs.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::sample::{ParameterPath, SampleState};

/// Outcome flag of the last fit.
///
/// Serialized as `null`, `true`, `false` or `"cancelled"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitStatus {
    #[default]
    NotRun,
    Succeeded,
    Failed,
    Cancelled,
}

impl Serialize for FitStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FitStatus::NotRun => serializer.serialize_none(),
            FitStatus::Succeeded => serializer.serialize_bool(true),
            FitStatus::Failed => serializer.serialize_bool(false),
            FitStatus::Cancelled => serializer.serialize_str("cancelled"),
        }
    }
}

impl<'de> Deserialize<'de> for FitStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Null => Ok(FitStatus::NotRun),
            serde_json::Value::Bool(true) => Ok(FitStatus::Succeeded),
            serde_json::Value::Bool(false) => Ok(FitStatus::Failed),
            serde_json::Value::String(s) if s == "cancelled" => Ok(FitStatus::Cancelled),
            other => Err(de::Error::custom(format!("invalid fit status: {}", other))),
        }
    }
}

/// Summary the view shows after a fit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FitResults {
    pub success: FitStatus,
    pub nvarys: Option<usize>,
    #[serde(rename = "GOF")]
    pub gof: Option<f64>,
    pub redchi2: Option<f64>,
}

impl FitResults {
    pub fn from_outcome(outcome: &FitOutcome) -> Self {
        Self {
            success: if outcome.success {
                FitStatus::Succeeded
            } else {
                FitStatus::Failed
            },
            nvarys: Some(outcome.n_pars),
            gof: Some(outcome.goodness_of_fit),
            redchi2: Some(outcome.reduced_chi),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            success: FitStatus::Cancelled,
            ..Self::default()
        }
    }
}

/// A fitted value reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedValue {
    pub path: ParameterPath,
    pub value: f64,
    pub error: Option<f64>,
}

/// Raw result of one backend fit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FitOutcome {
    pub success: bool,
    pub n_pars: usize,
    pub goodness_of_fit: f64,
    pub reduced_chi: f64,
    #[serde(default)]
    pub values: Vec<FittedValue>,
}

/// Everything a worker needs; owned so it can cross the thread boundary.
#[derive(Debug, Clone)]
pub struct FitProblem {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub weights: Vec<f64>,
    pub engine: String,
    pub method: String,
    pub sample: SampleState,
    pub free: Vec<ParameterPath>,
}
