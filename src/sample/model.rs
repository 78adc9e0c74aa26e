//! The ordered stack of structural items, fronting medium first.
//!
//! The first layer of the first item and the last layer of the last item
//! are semi-infinite media. Their thickness and roughness stay disabled;
//! every other layer is enabled. [`SampleModel::enforce_boundaries`] restores
//! that state and is safe to call any number of times.

use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};

use super::item::{ItemKind, StructuralItem};
use super::layer::Layer;
use super::material::MaterialId;
use super::parameter::{LayerField, Parameter, ParameterPath};
use crate::error::{EditorError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleModel {
    pub scale: Parameter,
    pub background: Parameter,
    items: Vec<StructuralItem>,
}

impl SampleModel {
    pub fn new(items: Vec<StructuralItem>) -> Self {
        let mut model = Self {
            scale: Parameter::new("scale", 1.0, 0.0, f64::MAX),
            background: Parameter::new("background", 1e-8, 0.0, f64::MAX),
            items,
        };
        model.enforce_boundaries();
        model
    }

    pub fn items(&self) -> &[StructuralItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Result<&StructuralItem> {
        let len = self.items.len();
        self.items
            .get(index)
            .ok_or(EditorError::IndexOutOfRange { index, len })
    }

    pub fn item_mut(&mut self, index: usize) -> Result<&mut StructuralItem> {
        let len = self.items.len();
        self.items
            .get_mut(index)
            .ok_or(EditorError::IndexOutOfRange { index, len })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All layers, fronting to backing.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.items.iter().flat_map(|item| item.layers.iter())
    }

    pub fn referenced_materials(&self) -> HashSet<MaterialId> {
        self.layers().map(|layer| layer.material).collect()
    }

    /// Switch the item at `index` to `kind`, keeping its position.
    ///
    /// Returns `Ok(false)` when the item already has that kind. The
    /// boundary layers are released before the replacement and re-disabled
    /// afterwards, also when the model holds a single item.
    pub fn set_item_type(&mut self, index: usize, kind: ItemKind) -> Result<bool> {
        if self.item(index)?.kind() == kind {
            return Ok(false);
        }

        self.release_boundaries();
        let current = std::mem::replace(
            &mut self.items[index],
            StructuralItem::simple(String::new(), Vec::new()),
        );
        self.items[index] = current.converted(kind);
        self.enforce_boundaries();

        debug!("Item {} converted to {}", index, kind);
        Ok(true)
    }

    /// Insert `item` at `index` (clamped to the end).
    pub fn insert_item(&mut self, index: usize, item: StructuralItem) -> usize {
        let index = index.min(self.items.len());
        self.items.insert(index, item);
        self.enforce_boundaries();
        index
    }

    /// Remove the item at `index`. The last remaining item cannot be removed.
    pub fn remove_item(&mut self, index: usize) -> Result<StructuralItem> {
        self.item(index)?;
        if self.items.len() == 1 {
            return Err(EditorError::LastElement { what: "item" });
        }
        let removed = self.items.remove(index);
        self.enforce_boundaries();
        Ok(removed)
    }

    /// Swap two items in place.
    pub fn swap_items(&mut self, a: usize, b: usize) -> Result<()> {
        self.item(a)?;
        self.item(b)?;
        self.items.swap(a, b);
        self.enforce_boundaries();
        Ok(())
    }

    pub fn add_layer(&mut self, item: usize, layer: Layer) -> Result<usize> {
        let target = self.item_mut(item)?;
        target.layers.push(layer);
        let index = target.layers.len() - 1;
        self.enforce_boundaries();
        Ok(index)
    }

    /// Remove a layer; an item keeps at least one layer.
    pub fn remove_layer(&mut self, item: usize, layer: usize) -> Result<Layer> {
        let target = self.item_mut(item)?;
        let len = target.layers.len();
        if layer >= len {
            return Err(EditorError::IndexOutOfRange { index: layer, len });
        }
        if len == 1 {
            return Err(EditorError::LastElement { what: "layer" });
        }
        let removed = target.layers.remove(layer);
        self.enforce_boundaries();
        Ok(removed)
    }

    pub fn layer_mut(&mut self, item: usize, layer: usize) -> Result<&mut Layer> {
        let target = self.item_mut(item)?;
        let len = target.layers.len();
        target
            .layers
            .get_mut(layer)
            .ok_or(EditorError::IndexOutOfRange { index: layer, len })
    }

    /// Force-enable the current boundary layers.
    pub fn release_boundaries(&mut self) {
        if let Some(layer) = self.items.first_mut().and_then(|i| i.first_layer_mut()) {
            layer.set_enabled(true);
        }
        if let Some(layer) = self.items.last_mut().and_then(|i| i.last_layer_mut()) {
            layer.set_enabled(true);
        }
    }

    /// Disable the boundary layers and enable every interior layer.
    pub fn enforce_boundaries(&mut self) {
        let last_item = self.items.len().saturating_sub(1);
        for (i, item) in self.items.iter_mut().enumerate() {
            let last_layer = item.layers.len().saturating_sub(1);
            for (j, layer) in item.layers.iter_mut().enumerate() {
                let boundary = (i == 0 && j == 0) || (i == last_item && j == last_layer);
                layer.set_enabled(!boundary);
            }
        }
    }

    /// At least one item, and at least one layer in every item.
    pub fn check_structure(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(EditorError::Invariant {
                reason: "model has no items".to_string(),
            });
        }
        match self.items.iter().position(|item| item.layers.is_empty()) {
            Some(index) => Err(EditorError::Invariant {
                reason: format!("item {} ('{}') has no layers", index, self.items[index].name),
            }),
            None => Ok(()),
        }
    }

    /// Verify the boundary state without changing anything.
    pub fn check_boundaries(&self) -> Result<()> {
        let mut expected = self.clone();
        expected.enforce_boundaries();
        if expected.items == self.items {
            Ok(())
        } else {
            Err(EditorError::Invariant {
                reason: "boundary layer enablement is inconsistent".to_string(),
            })
        }
    }

    /// Look up a model-owned parameter. Material paths are resolved by the catalog.
    pub fn parameter(&self, path: &ParameterPath) -> Option<&Parameter> {
        match *path {
            ParameterPath::Scale => Some(&self.scale),
            ParameterPath::Background => Some(&self.background),
            ParameterPath::Layer { item, layer, field } => self
                .items
                .get(item)
                .and_then(|i| i.layers.get(layer))
                .map(|l| l.parameter(field)),
            ParameterPath::Repetitions { item } => {
                self.items.get(item).and_then(|i| i.repetitions())
            }
            ParameterPath::Material { .. } => None,
        }
    }

    pub fn parameter_mut(&mut self, path: &ParameterPath) -> Option<&mut Parameter> {
        match *path {
            ParameterPath::Scale => Some(&mut self.scale),
            ParameterPath::Background => Some(&mut self.background),
            ParameterPath::Layer { item, layer, field } => self
                .items
                .get_mut(item)
                .and_then(|i| i.layers.get_mut(layer))
                .map(|l| l.parameter_mut(field)),
            ParameterPath::Repetitions { item } => {
                self.items.get_mut(item).and_then(|i| i.repetitions_mut())
            }
            ParameterPath::Material { .. } => None,
        }
    }

    /// Every model-owned parameter with its path.
    pub fn parameters(&self) -> Vec<(ParameterPath, &Parameter)> {
        let mut out = vec![
            (ParameterPath::Scale, &self.scale),
            (ParameterPath::Background, &self.background),
        ];
        for (i, item) in self.items.iter().enumerate() {
            if let Some(repetitions) = item.repetitions() {
                out.push((ParameterPath::Repetitions { item: i }, repetitions));
            }
            for (j, layer) in item.layers.iter().enumerate() {
                for field in [LayerField::Thickness, LayerField::Roughness] {
                    let path = ParameterPath::Layer {
                        item: i,
                        layer: j,
                        field,
                    };
                    out.push((path, layer.parameter(field)));
                }
            }
        }
        out
    }
}
