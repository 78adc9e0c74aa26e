//! Reversible editor commands.
//!
//! Each command carries both the old and the new value, so it can be
//! applied in either direction, and records the kind of entity it touched
//! when it is created. Undo routing reads that tag instead of inspecting
//! the target at replay time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};
use crate::fitting::{MinimizerSelector, MinimizerState};
use crate::sample::{MaterialId, Parameter, ParameterPath, SampleState};

/// Kind of entity a command mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandParent {
    /// Composition of the model or catalog changed.
    StructuralChange,
    /// A value inside the existing structure changed.
    ParameterChange,
    /// An editor-level setting such as the minimizer.
    FacadeSetting,
    /// Could not be classified; routing treats it as a defect.
    Unknown,
}

/// What a rename applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenameTarget {
    Item { item: usize },
    Layer { item: usize, layer: usize },
    Material { material: MaterialId },
}

impl fmt::Display for RenameTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenameTarget::Item { .. } => write!(f, "item"),
            RenameTarget::Layer { .. } => write!(f, "layer"),
            RenameTarget::Material { .. } => write!(f, "material"),
        }
    }
}

/// Value and uncertainty of a parameter at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueSnapshot {
    pub value: f64,
    pub error: Option<f64>,
}

impl ValueSnapshot {
    pub fn of(parameter: &Parameter) -> Self {
        Self {
            value: parameter.value,
            error: parameter.error,
        }
    }
}

impl fmt::Display for ValueSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Parameter::display_value(self.value, self.error))
    }
}

/// The state commands operate on.
pub struct Document<'a> {
    pub sample: &'a mut SampleState,
    pub minimizer: &'a mut MinimizerSelector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    SetParameterValue {
        path: ParameterPath,
        name: String,
        old: ValueSnapshot,
        new: ValueSnapshot,
    },
    SetParameterFixed {
        path: ParameterPath,
        name: String,
        old: bool,
        new: bool,
    },
    /// Whole-sample snapshot for edits that change composition.
    ReplaceSample {
        label: String,
        before: Box<SampleState>,
        after: Box<SampleState>,
    },
    Rename {
        target: RenameTarget,
        old: String,
        new: String,
    },
    SetMinimizer {
        old: MinimizerState,
        new: MinimizerState,
    },
}

impl Command {
    pub fn parent(&self) -> CommandParent {
        match self {
            Command::ReplaceSample { .. } => CommandParent::StructuralChange,
            Command::SetParameterValue { .. }
            | Command::SetParameterFixed { .. }
            | Command::Rename { .. } => CommandParent::ParameterChange,
            Command::SetMinimizer { .. } => CommandParent::FacadeSetting,
        }
    }

    /// Text shown in the history and parsed for undo tooltips.
    pub fn description(&self) -> String {
        match self {
            Command::SetParameterValue { name, old, new, .. } => {
                format!("<Parameter '{}': value change from {} to {}", name, old, new)
            }
            Command::SetParameterFixed { name, old, new, .. } => {
                format!("<Parameter '{}': fit change from {} to {}", name, !old, !new)
            }
            Command::ReplaceSample { label, .. } => label.clone(),
            Command::Rename { target, old, new } => {
                format!("Rename {} '{}' to '{}'", target, old, new)
            }
            Command::SetMinimizer { old, new } => format!(
                "Minimizer change from {} ({}) to {} ({})",
                old.engine, old.method, new.engine, new.method
            ),
        }
    }

    /// Apply the forward direction.
    pub fn redo(&self, doc: &mut Document<'_>) -> Result<()> {
        self.apply(doc, true)
    }

    /// Apply the reverse direction.
    pub fn undo(&self, doc: &mut Document<'_>) -> Result<()> {
        self.apply(doc, false)
    }

    fn apply(&self, doc: &mut Document<'_>, forward: bool) -> Result<()> {
        match self {
            Command::SetParameterValue { path, old, new, .. } => {
                let target = if forward { new } else { old };
                let parameter = resolve(doc.sample, path)?;
                parameter.value = target.value;
                parameter.error = target.error;
            }
            Command::SetParameterFixed { path, old, new, .. } => {
                resolve(doc.sample, path)?.fixed = if forward { *new } else { *old };
            }
            Command::ReplaceSample { before, after, .. } => {
                let target = if forward { after } else { before };
                *doc.sample = target.as_ref().clone();
            }
            Command::Rename { target, old, new } => {
                let name = (if forward { new } else { old }).clone();
                match *target {
                    RenameTarget::Item { item } => doc.sample.model.item_mut(item)?.name = name,
                    RenameTarget::Layer { item, layer } => {
                        doc.sample.model.layer_mut(item, layer)?.name = name
                    }
                    RenameTarget::Material { material } => {
                        doc.sample
                            .catalog
                            .get_mut(material)
                            .ok_or(EditorError::MaterialNotFound { id: material.0 })?
                            .name = name
                    }
                }
            }
            Command::SetMinimizer { old, new } => {
                doc.minimizer.restore(if forward { new } else { old })?;
            }
        }
        Ok(())
    }
}

fn resolve<'s>(sample: &'s mut SampleState, path: &ParameterPath) -> Result<&'s mut Parameter> {
    sample
        .parameter_mut(path)
        .ok_or_else(|| EditorError::ParameterNotFound {
            path: path.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::LayerField;

    fn selector() -> MinimizerSelector {
        let engines: Vec<String> = vec!["lmfit".into(), "bumps".into()];
        MinimizerSelector::new(&engines).unwrap()
    }

    #[test]
    fn test_value_command_round_trip() {
        let mut sample = SampleState::default_workspace();
        let mut minimizer = selector();
        let original = sample.clone();
        let path = ParameterPath::Layer {
            item: 1,
            layer: 0,
            field: LayerField::Thickness,
        };
        let command = Command::SetParameterValue {
            path,
            name: "thickness".into(),
            old: ValueSnapshot {
                value: 100.0,
                error: None,
            },
            new: ValueSnapshot {
                value: 120.0,
                error: Some(0.5),
            },
        };

        let mut doc = Document {
            sample: &mut sample,
            minimizer: &mut minimizer,
        };
        command.redo(&mut doc).unwrap();
        assert_eq!(doc.sample.parameter(&path).unwrap().value, 120.0);
        command.undo(&mut doc).unwrap();
        assert_eq!(sample, original);
    }

    #[test]
    fn test_descriptions() {
        let command = Command::SetParameterValue {
            path: ParameterPath::Scale,
            name: "scale".into(),
            old: ValueSnapshot {
                value: 1.0,
                error: Some(0.1),
            },
            new: ValueSnapshot {
                value: 2.0,
                error: None,
            },
        };
        assert_eq!(
            command.description(),
            "<Parameter 'scale': value change from (1 +/- 0.1) to 2"
        );
        assert_eq!(command.parent(), CommandParent::ParameterChange);

        let command = Command::SetParameterFixed {
            path: ParameterPath::Scale,
            name: "scale".into(),
            old: true,
            new: false,
        };
        assert_eq!(
            command.description(),
            "<Parameter 'scale': fit change from false to true"
        );
    }

    #[test]
    fn test_unresolvable_path_fails() {
        let mut sample = SampleState::default_workspace();
        let mut minimizer = selector();
        let command = Command::SetParameterFixed {
            path: ParameterPath::Repetitions { item: 7 },
            name: "repetitions".into(),
            old: true,
            new: false,
        };
        let mut doc = Document {
            sample: &mut sample,
            minimizer: &mut minimizer,
        };
        assert!(matches!(
            command.redo(&mut doc),
            Err(EditorError::ParameterNotFound { .. })
        ));
    }

    #[test]
    fn test_minimizer_command() {
        let mut sample = SampleState::default_workspace();
        let mut minimizer = selector();
        let command = Command::SetMinimizer {
            old: minimizer.state(),
            new: MinimizerState {
                engine: "bumps".into(),
                method: "lm".into(),
            },
        };
        let mut doc = Document {
            sample: &mut sample,
            minimizer: &mut minimizer,
        };
        command.redo(&mut doc).unwrap();
        assert_eq!(doc.minimizer.engine(), "bumps");
        command.undo(&mut doc).unwrap();
        assert_eq!(minimizer.label(), "lmfit (leastsq)");
        assert_eq!(command.parent(), CommandParent::FacadeSetting);
    }
}
