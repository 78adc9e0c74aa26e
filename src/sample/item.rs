//! Structural items: named groups of layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::layer::Layer;
use super::parameter::Parameter;

/// Upper bound on the repetition count of a repeating item.
pub const MAX_REPETITIONS: f64 = 9999.0;

/// The two item variants the editor can switch between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Simple,
    Repeating,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Simple => write!(f, "Multi-layer"),
            ItemKind::Repeating => write!(f, "Repeating Multi-layer"),
        }
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" | "multi-layer" => Ok(ItemKind::Simple),
            "repeating" | "repeating multi-layer" => Ok(ItemKind::Repeating),
            other => Err(format!("unknown item kind: {}", other)),
        }
    }
}

/// Variant payload. Only repeating items carry a repetition count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemVariant {
    Simple,
    Repeating { repetitions: Parameter },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralItem {
    pub name: String,
    pub variant: ItemVariant,
    pub layers: Vec<Layer>,
}

impl StructuralItem {
    pub fn simple(name: impl Into<String>, layers: Vec<Layer>) -> Self {
        Self {
            name: name.into(),
            variant: ItemVariant::Simple,
            layers,
        }
    }

    pub fn repeating(name: impl Into<String>, layers: Vec<Layer>, repetitions: f64) -> Self {
        Self {
            name: name.into(),
            variant: ItemVariant::Repeating {
                repetitions: repetitions_parameter(repetitions),
            },
            layers,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self.variant {
            ItemVariant::Simple => ItemKind::Simple,
            ItemVariant::Repeating { .. } => ItemKind::Repeating,
        }
    }

    /// Rebuild this item as `kind`, keeping name and layers.
    ///
    /// A new repeating item starts with one repetition.
    pub fn converted(self, kind: ItemKind) -> Self {
        match kind {
            ItemKind::Simple => Self::simple(self.name, self.layers),
            ItemKind::Repeating => Self::repeating(self.name, self.layers, 1.0),
        }
    }

    pub fn repetitions(&self) -> Option<&Parameter> {
        match &self.variant {
            ItemVariant::Repeating { repetitions } => Some(repetitions),
            ItemVariant::Simple => None,
        }
    }

    pub fn repetitions_mut(&mut self) -> Option<&mut Parameter> {
        match &mut self.variant {
            ItemVariant::Repeating { repetitions } => Some(repetitions),
            ItemVariant::Simple => None,
        }
    }

    pub fn first_layer_mut(&mut self) -> Option<&mut Layer> {
        self.layers.first_mut()
    }

    pub fn last_layer_mut(&mut self) -> Option<&mut Layer> {
        self.layers.last_mut()
    }
}

fn repetitions_parameter(value: f64) -> Parameter {
    Parameter::new("repetitions", value, 1.0, MAX_REPETITIONS)
}
