//! Materials and the catalog that owns them.
//!
//! Layers refer to materials through a [`MaterialId`]; the catalog is the
//! only owner. Materials that no layer references are kept as orphans so
//! they survive a save/load round trip.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::model::SampleModel;
use super::parameter::{MaterialField, Parameter};
use crate::error::{EditorError, Result};

/// Stable identifier of a material within a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(pub u32);

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Named scattering properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    /// Real part of the scattering length density (1e-6 Å^-2).
    pub sld: Parameter,
    /// Imaginary part of the scattering length density (1e-6 Å^-2).
    pub isld: Parameter,
}

impl Material {
    pub fn new(id: MaterialId, name: impl Into<String>, sld: f64, isld: f64) -> Self {
        Self {
            id,
            name: name.into(),
            sld: Parameter::new("sld", sld, -f64::MAX, f64::MAX).with_unit("1e-6 1/Å^2"),
            isld: Parameter::new("isld", isld, -f64::MAX, f64::MAX).with_unit("1e-6 1/Å^2"),
        }
    }

    pub fn parameter(&self, field: MaterialField) -> &Parameter {
        match field {
            MaterialField::Sld => &self.sld,
            MaterialField::Isld => &self.isld,
        }
    }

    pub fn parameter_mut(&mut self, field: MaterialField) -> &mut Parameter {
        match field {
            MaterialField::Sld => &mut self.sld,
            MaterialField::Isld => &mut self.isld,
        }
    }
}

/// Ordered set of materials known to the workspace.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaterialCatalog {
    materials: Vec<Material>,
    next_id: u32,
}

impl MaterialCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a catalog from materials that already carry ids.
    pub fn from_materials(materials: Vec<Material>) -> Self {
        let next_id = materials.iter().map(|m| m.id.0 + 1).max().unwrap_or(0);
        Self { materials, next_id }
    }

    /// Add a new material and return its id.
    pub fn add(&mut self, name: impl Into<String>, sld: f64, isld: f64) -> MaterialId {
        let id = MaterialId(self.next_id);
        self.next_id += 1;
        self.materials.push(Material::new(id, name, sld, isld));
        id
    }

    /// Insert a material that was created elsewhere, keeping its id.
    pub fn insert(&mut self, material: Material) {
        self.next_id = self.next_id.max(material.id.0 + 1);
        self.materials.push(material);
    }

    /// Remove a material, refusing while any layer still references it.
    pub fn remove(&mut self, id: MaterialId, model: &SampleModel) -> Result<Material> {
        let position = self.position(id)?;
        let users = model
            .layers()
            .filter(|layer| layer.material == id)
            .count();
        if users > 0 {
            return Err(EditorError::MaterialInUse {
                name: self.materials[position].name.clone(),
                layers: users,
            });
        }
        Ok(self.materials.remove(position))
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.iter_mut().find(|m| m.id == id)
    }

    pub fn contains(&self, id: MaterialId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    /// Materials no layer of `model` references.
    pub fn orphans(&self, model: &SampleModel) -> Vec<&Material> {
        let used = model.referenced_materials();
        self.materials
            .iter()
            .filter(|m| !used.contains(&m.id))
            .collect()
    }

    /// Materials referenced by at least one layer, in catalog order.
    pub fn in_model(&self, model: &SampleModel) -> Vec<&Material> {
        let used = model.referenced_materials();
        self.materials
            .iter()
            .filter(|m| used.contains(&m.id))
            .collect()
    }

    /// Every material referenced by the model must be in the catalog.
    pub fn check_references(&self, model: &SampleModel) -> Result<()> {
        let known: HashSet<MaterialId> = self.materials.iter().map(|m| m.id).collect();
        match model.referenced_materials().into_iter().find(|id| !known.contains(id)) {
            Some(missing) => Err(EditorError::Invariant {
                reason: format!("layer references material {} missing from catalog", missing),
            }),
            None => Ok(()),
        }
    }

    fn position(&self, id: MaterialId) -> Result<usize> {
        self.materials
            .iter()
            .position(|m| m.id == id)
            .ok_or(EditorError::MaterialNotFound { id: id.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Layer, StructuralItem};

    fn catalog_and_model() -> (MaterialCatalog, SampleModel, MaterialId) {
        let mut catalog = MaterialCatalog::new();
        let air = catalog.add("Air", 0.0, 0.0);
        let si = catalog.add("Si", 2.074, 0.0);
        let spare = catalog.add("Spare", 1.0, 0.0);
        let model = SampleModel::new(vec![
            StructuralItem::simple("Superphase", vec![Layer::new("Air Layer", air, 0.0, 0.0)]),
            StructuralItem::simple("Substrate", vec![Layer::new("Si Layer", si, 0.0, 3.0)]),
        ]);
        (catalog, model, spare)
    }

    #[test]
    fn test_ids_are_unique() {
        let mut catalog = MaterialCatalog::new();
        let a = catalog.add("A", 1.0, 0.0);
        let b = catalog.add("B", 2.0, 0.0);
        assert_ne!(a, b);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_orphans() {
        let (catalog, model, spare) = catalog_and_model();
        let orphans = catalog.orphans(&model);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, spare);
        assert_eq!(catalog.in_model(&model).len(), 2);
    }

    #[test]
    fn test_remove_referenced_material_fails() {
        let (mut catalog, model, spare) = catalog_and_model();
        let air = catalog.at(0).unwrap().id;
        assert!(matches!(
            catalog.remove(air, &model),
            Err(EditorError::MaterialInUse { .. })
        ));
        assert!(catalog.remove(spare, &model).is_ok());
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_from_materials_keeps_ids() {
        let (catalog, _, _) = catalog_and_model();
        let materials: Vec<Material> = catalog.iter().cloned().collect();
        let mut rebuilt = MaterialCatalog::from_materials(materials);
        let next = rebuilt.add("New", 0.5, 0.0);
        assert_eq!(next, MaterialId(3));
    }
}
