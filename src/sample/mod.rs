//! Sample data model: parameters, materials, layers and structural items.

pub mod item;
pub mod layer;
pub mod material;
pub mod model;
pub mod parameter;

pub use item::{ItemKind, ItemVariant, StructuralItem, MAX_REPETITIONS};
pub use layer::{Layer, MAX_LENGTH};
pub use material::{Material, MaterialCatalog, MaterialId};
pub use model::SampleModel;
pub use parameter::{LayerField, MaterialField, Parameter, ParameterPath};

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};

/// The model together with the catalog its layers point into.
///
/// Structural commands snapshot this pair, so undoing one restores both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleState {
    pub model: SampleModel,
    pub catalog: MaterialCatalog,
}

impl SampleState {
    pub fn new(model: SampleModel, catalog: MaterialCatalog) -> Self {
        Self { model, catalog }
    }

    /// Air / D2O / Si workspace a new project starts from.
    pub fn default_workspace() -> Self {
        let mut catalog = MaterialCatalog::new();
        let air = catalog.add("Air", 0.0, 0.0);
        let d2o = catalog.add("D2O", 6.36, 0.0);
        let si = catalog.add("Si", 2.074, 0.0);

        let model = SampleModel::new(vec![
            StructuralItem::simple("Superphase", vec![Layer::new("Air Layer", air, 0.0, 0.0)]),
            StructuralItem::simple("D2O Layer", vec![Layer::new("D2O Layer", d2o, 100.0, 3.0)]),
            StructuralItem::simple("Substrate", vec![Layer::new("Si Layer", si, 0.0, 3.0)]),
        ]);

        Self { model, catalog }
    }

    pub fn parameter(&self, path: &ParameterPath) -> Option<&Parameter> {
        match *path {
            ParameterPath::Material { material, field } => {
                self.catalog.get(material).map(|m| m.parameter(field))
            }
            _ => self.model.parameter(path),
        }
    }

    pub fn parameter_mut(&mut self, path: &ParameterPath) -> Option<&mut Parameter> {
        match *path {
            ParameterPath::Material { material, field } => {
                self.catalog.get_mut(material).map(|m| m.parameter_mut(field))
            }
            _ => self.model.parameter_mut(path),
        }
    }

    /// Like [`SampleState::parameter`] but reports a missing path as an error.
    pub fn require(&self, path: &ParameterPath) -> Result<&Parameter> {
        self.parameter(path)
            .ok_or_else(|| EditorError::ParameterNotFound {
                path: path.to_string(),
            })
    }

    /// Every parameter in the workspace, model first, then in-model materials.
    pub fn parameters(&self) -> Vec<(ParameterPath, &Parameter)> {
        let mut out = self.model.parameters();
        for material in self.catalog.in_model(&self.model) {
            for field in [MaterialField::Sld, MaterialField::Isld] {
                let path = ParameterPath::Material {
                    material: material.id,
                    field,
                };
                out.push((path, material.parameter(field)));
            }
        }
        out
    }

    /// Parameters a fit may vary.
    pub fn free_parameters(&self) -> Vec<(ParameterPath, &Parameter)> {
        self.parameters()
            .into_iter()
            .filter(|(_, p)| p.is_free())
            .collect()
    }

    /// Non-empty structure, boundary state and catalog references.
    pub fn check_invariants(&self) -> Result<()> {
        self.model.check_structure()?;
        self.model.check_boundaries()?;
        self.catalog.check_references(&self.model)
    }
}
