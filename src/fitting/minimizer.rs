//! Minimizer engine and method selection.
//!
//! Only a tested subset of each engine's methods is exposed, and switching
//! engine resets the method to that engine's default from the same table.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};

/// Engine name, exposed methods, default method.
const TESTED_METHODS: &[(&str, &[&str], &str)] = &[
    ("lmfit", &["leastsq", "powell", "cobyla"], "leastsq"),
    ("bumps", &["newton", "lm", "de"], "lm"),
    ("DFO_LS", &["leastsq"], "leastsq"),
];

/// Serializable {engine, method} pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimizerState {
    pub engine: String,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinimizerSelector {
    engines: Vec<String>,
    engine: String,
    method: String,
}

impl MinimizerSelector {
    /// Build from the engines a backend reports, keeping backend order and
    /// dropping engines without a tested method table.
    pub fn new(available: &[String]) -> Result<Self> {
        let engines: Vec<String> = available
            .iter()
            .filter(|name| table_entry(name).is_some())
            .cloned()
            .collect();
        let engine = engines
            .first()
            .cloned()
            .ok_or_else(|| EditorError::UnknownEngine {
                engine: available.join(", "),
            })?;
        let method = default_method(&engine).unwrap_or_default().to_string();
        Ok(Self {
            engines,
            engine,
            method,
        })
    }

    pub fn engines(&self) -> &[String] {
        &self.engines
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn engine_index(&self) -> usize {
        self.engines
            .iter()
            .position(|e| *e == self.engine)
            .unwrap_or(0)
    }

    /// Methods compatible with the current engine.
    pub fn methods(&self) -> &'static [&'static str] {
        table_entry(&self.engine).map(|(_, m, _)| *m).unwrap_or(&[])
    }

    pub fn method_index(&self) -> usize {
        self.methods()
            .iter()
            .position(|m| *m == self.method)
            .unwrap_or(0)
    }

    /// Switch engine; returns `Ok(false)` if it is already active.
    pub fn set_engine(&mut self, name: &str) -> Result<bool> {
        if !self.engines.iter().any(|e| e == name) {
            return Err(EditorError::UnknownEngine {
                engine: name.to_string(),
            });
        }
        if self.engine == name {
            return Ok(false);
        }
        self.engine = name.to_string();
        self.method = default_method(name).unwrap_or_default().to_string();
        debug!("Minimizer engine set to {} ({})", self.engine, self.method);
        Ok(true)
    }

    /// Switch method within the current engine; returns `Ok(false)` if unchanged.
    pub fn set_method(&mut self, name: &str) -> Result<bool> {
        if !self.methods().contains(&name) {
            return Err(EditorError::IncompatibleMethod {
                engine: self.engine.clone(),
                method: name.to_string(),
            });
        }
        if self.method == name {
            return Ok(false);
        }
        self.method = name.to_string();
        debug!("Minimizer method set to {}", self.method);
        Ok(true)
    }

    pub fn state(&self) -> MinimizerState {
        MinimizerState {
            engine: self.engine.clone(),
            method: self.method.clone(),
        }
    }

    /// Restore a saved pair, validating it against the engine table.
    pub fn restore(&mut self, state: &MinimizerState) -> Result<()> {
        let mut next = self.clone();
        next.set_engine(&state.engine)?;
        next.set_method(&state.method)?;
        *self = next;
        Ok(())
    }

    /// "engine (method)" as shown in the status bar.
    pub fn label(&self) -> String {
        format!("{} ({})", self.engine, self.method)
    }
}

fn table_entry(engine: &str) -> Option<&'static (&'static str, &'static [&'static str], &'static str)> {
    TESTED_METHODS.iter().find(|(name, _, _)| *name == engine)
}

/// Canonical default method for `engine`.
pub fn default_method(engine: &str) -> Option<&'static str> {
    table_entry(engine).map(|(_, _, default)| *default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn selector() -> MinimizerSelector {
        let engines: Vec<String> = ["lmfit", "bumps", "DFO_LS", "scipy"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        MinimizerSelector::new(&engines).unwrap()
    }

    #[test]
    fn test_untested_engines_hidden() {
        let s = selector();
        assert_eq!(s.engines(), &["lmfit", "bumps", "DFO_LS"]);
        assert_eq!(s.engine(), "lmfit");
        assert_eq!(s.method(), "leastsq");
    }

    #[test_case("lmfit", "leastsq")]
    #[test_case("bumps", "lm")]
    #[test_case("DFO_LS", "leastsq")]
    fn test_engine_switch_resets_method(engine: &str, expected: &str) {
        let mut s = selector();
        s.set_engine("bumps").unwrap();
        s.set_method("de").unwrap();
        s.set_engine(engine).unwrap();
        if engine != "bumps" {
            assert_eq!(s.method(), expected);
        }
        assert!(s.methods().contains(&s.method()));
    }

    #[test]
    fn test_same_engine_is_noop() {
        let mut s = selector();
        s.set_method("powell").unwrap();
        assert!(!s.set_engine("lmfit").unwrap());
        assert_eq!(s.method(), "powell");
    }

    #[test]
    fn test_incompatible_method() {
        let mut s = selector();
        assert!(matches!(
            s.set_method("de"),
            Err(EditorError::IncompatibleMethod { .. })
        ));
        assert!(matches!(
            s.set_engine("scipy"),
            Err(EditorError::UnknownEngine { .. })
        ));
    }

    #[test]
    fn test_restore_is_atomic() {
        let mut s = selector();
        let bad = MinimizerState {
            engine: "bumps".into(),
            method: "cobyla".into(),
        };
        assert!(s.restore(&bad).is_err());
        assert_eq!(s.label(), "lmfit (leastsq)");
    }
}
