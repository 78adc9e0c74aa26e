//! Fittable scalar parameters and their addresses in the sample.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::material::MaterialId;
use crate::error::{EditorError, Result};

/// A single fittable value with bounds.
///
/// `enabled` is the boundary flag: semi-infinite fronting and backing
/// layers carry disabled thickness and roughness. `fixed` excludes the
/// parameter from fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
    /// Uncertainty from the last accepted fit.
    #[serde(default)]
    pub error: Option<f64>,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default = "default_true")]
    pub fixed: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Parameter {
    /// Create a fixed, enabled parameter with the given bounds.
    pub fn new(name: impl Into<String>, value: f64, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            value,
            error: None,
            min,
            max,
            unit: String::new(),
            fixed: true,
            enabled: true,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn free(mut self) -> Self {
        self.fixed = false;
        self
    }

    /// Whether a fit may vary this parameter.
    pub fn is_free(&self) -> bool {
        self.enabled && !self.fixed
    }

    /// Check a user-requested value against the enabled flag and bounds.
    pub fn validate(&self, value: f64) -> Result<()> {
        if !self.enabled {
            return Err(EditorError::ParameterDisabled {
                name: self.name.clone(),
            });
        }
        if !value.is_finite() || value < self.min || value > self.max {
            return Err(EditorError::ValueOutOfBounds {
                name: self.name.clone(),
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Render the value the way undo descriptions show it, with the
    /// uncertainty wrapped as `(x +/- e)` when one is known.
    pub fn display_value(value: f64, error: Option<f64>) -> String {
        match error {
            Some(e) => format!("({} +/- {})", value, e),
            None => format!("{}", value),
        }
    }
}

/// Which scalar of a layer a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerField {
    Thickness,
    Roughness,
}

/// Which scalar of a material a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialField {
    Sld,
    Isld,
}

/// Address of a parameter inside the workspace.
///
/// Item and layer positions are indices; they stay valid across a linear
/// undo history because commands are reverted in reverse order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterPath {
    Scale,
    Background,
    Layer {
        item: usize,
        layer: usize,
        field: LayerField,
    },
    Repetitions {
        item: usize,
    },
    Material {
        material: MaterialId,
        field: MaterialField,
    },
}

impl fmt::Display for ParameterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterPath::Scale => write!(f, "scale"),
            ParameterPath::Background => write!(f, "background"),
            ParameterPath::Layer { item, layer, field } => {
                let field = match field {
                    LayerField::Thickness => "thickness",
                    LayerField::Roughness => "roughness",
                };
                write!(f, "items[{}].layers[{}].{}", item, layer, field)
            }
            ParameterPath::Repetitions { item } => write!(f, "items[{}].repetitions", item),
            ParameterPath::Material { material, field } => {
                let field = match field {
                    MaterialField::Sld => "sld",
                    MaterialField::Isld => "isld",
                };
                write!(f, "materials[{}].{}", material, field)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_bounds() {
        let p = Parameter::new("thickness", 10.0, 0.0, 100.0);
        assert!(p.validate(50.0).is_ok());
        assert!(matches!(
            p.validate(150.0),
            Err(EditorError::ValueOutOfBounds { .. })
        ));
        assert!(p.validate(f64::NAN).is_err());
    }

    #[test]
    fn test_disabled_rejects_edits() {
        let mut p = Parameter::new("roughness", 3.0, 0.0, 50.0);
        p.enabled = false;
        assert!(matches!(
            p.validate(4.0),
            Err(EditorError::ParameterDisabled { .. })
        ));
        assert!(!p.is_free());
    }

    #[test]
    fn test_display_value() {
        assert_eq!(Parameter::display_value(10.0, None), "10");
        assert_eq!(Parameter::display_value(10.5, Some(0.25)), "(10.5 +/- 0.25)");
    }

    #[test]
    fn test_path_display() {
        let path = ParameterPath::Layer {
            item: 1,
            layer: 0,
            field: LayerField::Thickness,
        };
        assert_eq!(path.to_string(), "items[1].layers[0].thickness");
    }
}
