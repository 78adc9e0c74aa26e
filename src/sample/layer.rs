//! A single physical layer of the stack.

use serde::{Deserialize, Serialize};

use super::material::MaterialId;
use super::parameter::{LayerField, Parameter};

/// Upper bound used for thickness and roughness.
pub const MAX_LENGTH: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub material: MaterialId,
    pub thickness: Parameter,
    pub roughness: Parameter,
}

impl Layer {
    pub fn new(name: impl Into<String>, material: MaterialId, thickness: f64, roughness: f64) -> Self {
        Self {
            name: name.into(),
            material,
            thickness: Parameter::new("thickness", thickness, 0.0, MAX_LENGTH).with_unit("Å"),
            roughness: Parameter::new("roughness", roughness, 0.0, MAX_LENGTH).with_unit("Å"),
        }
    }

    pub fn parameter(&self, field: LayerField) -> &Parameter {
        match field {
            LayerField::Thickness => &self.thickness,
            LayerField::Roughness => &self.roughness,
        }
    }

    pub fn parameter_mut(&mut self, field: LayerField) -> &mut Parameter {
        match field {
            LayerField::Thickness => &mut self.thickness,
            LayerField::Roughness => &mut self.roughness,
        }
    }

    /// Set the boundary flag on both thickness and roughness.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.thickness.enabled = enabled;
        self.roughness.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.thickness.enabled && self.roughness.enabled
    }
}
