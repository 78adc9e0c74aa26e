//! The editing facade
//!
//! Single owner of the sample, the minimizer selection, the command stack
//! and the fit session. The view layer calls in here and observes
//! [`Notification`]s. Every edit runs on the caller's thread; only the
//! backend fit runs elsewhere.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use super::notify::{Notification, Notifier};
use crate::data::ExperimentData;
use crate::error::{EditorError, Result};
use crate::fitting::{
    FitBackend, FitResults, FitSession, FitState, MinimizerSelector, MinimizerState, MockBackend,
};
use crate::sample::{
    ItemKind, Layer, MaterialCatalog, MaterialId, ParameterPath, SampleModel, SampleState,
    StructuralItem,
};
use crate::state::{
    Command, CommandStack, Document, EditorConfig, ProjectInfo, RenameTarget, ValueSnapshot,
};

/// Points in the q grid used when no experiment is loaded.
pub const DEFAULT_Q_POINTS: usize = 100;
pub const DEFAULT_Q_RANGE: (f64, f64) = (0.005, 0.3);

/// Calculator and minimizer shown in the status bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusInfo {
    pub calculation: String,
    pub minimization: String,
}

pub struct EditingFacade {
    pub(super) config: EditorConfig,
    pub(super) backend: Arc<dyn FitBackend>,
    pub(super) sample: SampleState,
    pub(super) minimizer: MinimizerSelector,
    pub(super) stack: CommandStack,
    pub(super) notifier: Notifier,
    pub(super) session: FitSession,
    pub(super) fit_results: FitResults,
    pub(super) fit_finished: bool,
    pub(super) experiment: Option<ExperimentData>,
    pub(super) experiment_skipped: bool,
    pub(super) project_info: ProjectInfo,
    pub(super) project_path: PathBuf,
    pub(super) project_created: bool,
    pub(super) state_changed: bool,
    pub(super) simulated: Vec<(f64, f64)>,
    pub(super) report: String,
    pub(super) current_item: usize,
    pub(super) current_layer: usize,
    pub(super) current_material: usize,
}

impl EditingFacade {
    /// Start a session on the default workspace.
    pub fn new(config: EditorConfig, backend: Arc<dyn FitBackend>) -> Result<Self> {
        let minimizer = MinimizerSelector::new(&backend.available_engines())?;
        backend.switch_engine(minimizer.engine())?;

        let mut facade = Self {
            stack: CommandStack::new(config.max_undo_levels),
            project_path: config.project_dir.join("Example Project"),
            config,
            backend,
            sample: SampleState::default_workspace(),
            minimizer,
            notifier: Notifier::new(),
            session: FitSession::new(),
            fit_results: FitResults::default(),
            fit_finished: true,
            experiment: None,
            experiment_skipped: false,
            project_info: ProjectInfo::default(),
            project_created: false,
            state_changed: false,
            simulated: Vec::new(),
            report: String::new(),
            current_item: 0,
            current_layer: 0,
            current_material: 0,
        };
        facade.refresh_simulation();
        facade.notifier.drain();
        info!(
            "Editor ready: {} via {}",
            facade.minimizer.label(),
            facade.backend.interface_name()
        );
        Ok(facade)
    }

    /// Session backed by [`MockBackend`] with default settings.
    pub fn with_mock() -> Result<Self> {
        Self::new(EditorConfig::default(), Arc::new(MockBackend::new()))
    }

    // ---- observation ----

    pub fn subscribe(&mut self) -> Receiver<Notification> {
        self.notifier.subscribe()
    }

    /// Notifications emitted since the last call.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifier.drain()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn sample(&self) -> &SampleState {
        &self.sample
    }

    pub fn model(&self) -> &SampleModel {
        &self.sample.model
    }

    pub fn catalog(&self) -> &MaterialCatalog {
        &self.sample.catalog
    }

    pub fn minimizer(&self) -> &MinimizerSelector {
        &self.minimizer
    }

    pub fn command_stack(&self) -> &CommandStack {
        &self.stack
    }

    pub fn fit_results(&self) -> &FitResults {
        &self.fit_results
    }

    pub fn is_fit_finished(&self) -> bool {
        self.fit_finished
    }

    pub fn fit_state(&self) -> FitState {
        self.session.state()
    }

    pub fn experiment(&self) -> Option<&ExperimentData> {
        self.experiment.as_ref()
    }

    pub fn experiment_skipped(&self) -> bool {
        self.experiment_skipped
    }

    pub fn project_info(&self) -> &ProjectInfo {
        &self.project_info
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn project_created(&self) -> bool {
        self.project_created
    }

    pub fn state_has_changed(&self) -> bool {
        self.state_changed
    }

    pub fn simulated_curve(&self) -> &[(f64, f64)] {
        &self.simulated
    }

    pub fn status_info(&self) -> StatusInfo {
        StatusInfo {
            calculation: self.backend.interface_name().to_string(),
            minimization: self.minimizer.label(),
        }
    }

    pub fn current_item_index(&self) -> usize {
        self.current_item
    }

    pub fn current_layer_index(&self) -> usize {
        self.current_layer
    }

    pub fn current_material_index(&self) -> usize {
        self.current_material
    }

    pub fn current_item_kind(&self) -> Option<ItemKind> {
        self.sample.model.items().get(self.current_item).map(|i| i.kind())
    }

    /// Repetitions of the current item; 1 for simple items.
    pub fn current_item_repetitions(&self) -> f64 {
        self.sample
            .model
            .items()
            .get(self.current_item)
            .and_then(|i| i.repetitions())
            .map_or(1.0, |p| p.value)
    }

    // ---- selection cursors (untracked) ----

    /// `None` and the current index are ignored.
    pub fn select_item(&mut self, index: Option<usize>) -> Result<()> {
        let Some(index) = index.filter(|i| *i != self.current_item) else {
            return Ok(());
        };
        self.sample.model.item(index)?;
        self.current_item = index;
        self.current_layer = 0;
        self.notifier.emit(Notification::StructureChanged);
        Ok(())
    }

    pub fn select_layer(&mut self, index: Option<usize>) -> Result<()> {
        let Some(index) = index.filter(|i| *i != self.current_layer) else {
            return Ok(());
        };
        let len = self.sample.model.item(self.current_item)?.layers.len();
        if index >= len {
            return Err(EditorError::IndexOutOfRange { index, len });
        }
        self.current_layer = index;
        self.notifier.emit(Notification::StructureChanged);
        Ok(())
    }

    pub fn select_material(&mut self, index: Option<usize>) -> Result<()> {
        let Some(index) = index.filter(|i| *i != self.current_material) else {
            return Ok(());
        };
        let len = self.sample.catalog.len();
        if index >= len {
            return Err(EditorError::IndexOutOfRange { index, len });
        }
        self.current_material = index;
        self.notifier.emit(Notification::StructureChanged);
        Ok(())
    }

    // ---- minimizer ----

    /// Switch engine; the method resets to the engine default.
    pub fn set_engine(&mut self, name: &str) -> Result<bool> {
        self.ensure_idle()?;
        let mut next = self.minimizer.clone();
        if !next.set_engine(name)? {
            return Ok(false);
        }
        self.record_minimizer(next.state())?;
        Ok(true)
    }

    /// Switch method within the current engine.
    pub fn set_method(&mut self, name: &str) -> Result<bool> {
        self.ensure_idle()?;
        let mut next = self.minimizer.clone();
        if !next.set_method(name)? {
            return Ok(false);
        }
        self.record_minimizer(next.state())?;
        Ok(true)
    }

    pub fn set_engine_index(&mut self, index: usize) -> Result<bool> {
        let len = self.minimizer.engines().len();
        let name = self
            .minimizer
            .engines()
            .get(index)
            .cloned()
            .ok_or(EditorError::IndexOutOfRange { index, len })?;
        self.set_engine(&name)
    }

    pub fn set_method_index(&mut self, index: usize) -> Result<bool> {
        let methods = self.minimizer.methods();
        let name = methods.get(index).ok_or(EditorError::IndexOutOfRange {
            index,
            len: methods.len(),
        })?;
        self.set_method(name)
    }

    /// Apply a minimizer change and record it. An engine change is only
    /// recorded once the backend has switched; otherwise the selector is
    /// restored and the backend error returned.
    fn record_minimizer(&mut self, new: MinimizerState) -> Result<()> {
        let old = self.minimizer.state();
        let engine_changed = old.engine != new.engine;
        let command = Command::SetMinimizer {
            old: old.clone(),
            new,
        };
        let mut doc = Document {
            sample: &mut self.sample,
            minimizer: &mut self.minimizer,
        };
        command.redo(&mut doc)?;
        if engine_changed {
            if let Err(e) = self.backend.switch_engine(doc.minimizer.engine()) {
                warn!("Backend refused engine '{}': {}", doc.minimizer.engine(), e);
                command.undo(&mut doc)?;
                return Err(e);
            }
        }
        self.stack.push(command);
        self.mark_changed();
        self.announce_minimizer_change(&old);
        self.notifier.emit(Notification::UndoRedoStateChanged);
        Ok(())
    }

    /// Notifications for a minimizer change away from `old`.
    pub(super) fn announce_minimizer_change(&mut self, old: &MinimizerState) {
        if old.engine != self.minimizer.engine() {
            self.notifier.emit(Notification::MinimizerEngineChanged);
        }
        if old.method != self.minimizer.method() {
            self.notifier.emit(Notification::MinimizerMethodChanged);
        }
        self.notifier.emit(Notification::StatusInfoChanged);
    }

    // ---- parameters ----

    /// Set a parameter value; editing clears a fitted uncertainty.
    pub fn set_parameter_value(&mut self, path: ParameterPath, value: f64) -> Result<bool> {
        self.ensure_idle()?;
        let parameter = self.sample.require(&path)?;
        parameter.validate(value)?;
        if parameter.value == value && parameter.error.is_none() {
            return Ok(false);
        }
        let command = Command::SetParameterValue {
            path,
            name: parameter.name.clone(),
            old: ValueSnapshot::of(parameter),
            new: ValueSnapshot { value, error: None },
        };
        self.execute_value_command(command)?;
        Ok(true)
    }

    /// Mark a parameter fixed or free. Boundary parameters cannot be freed.
    pub fn set_parameter_fixed(&mut self, path: ParameterPath, fixed: bool) -> Result<bool> {
        self.ensure_idle()?;
        let parameter = self.sample.require(&path)?;
        if parameter.fixed == fixed {
            return Ok(false);
        }
        if !fixed && !parameter.enabled {
            return Err(EditorError::ParameterDisabled {
                name: parameter.name.clone(),
            });
        }
        let command = Command::SetParameterFixed {
            path,
            name: parameter.name.clone(),
            old: parameter.fixed,
            new: fixed,
        };
        self.execute_value_command(command)?;
        Ok(true)
    }

    /// Repetition count of a repeating item.
    pub fn set_item_repetitions(&mut self, index: usize, repetitions: f64) -> Result<bool> {
        if self.sample.model.item(index)?.kind() != ItemKind::Repeating {
            return Err(EditorError::ParameterNotFound {
                path: ParameterPath::Repetitions { item: index }.to_string(),
            });
        }
        self.set_parameter_value(ParameterPath::Repetitions { item: index }, repetitions)
    }

    pub fn rename_item(&mut self, index: usize, name: &str) -> Result<bool> {
        let old = self.sample.model.item(index)?.name.clone();
        self.rename(RenameTarget::Item { item: index }, old, name)
    }

    pub fn rename_layer(&mut self, item: usize, layer: usize, name: &str) -> Result<bool> {
        let old = self.sample.model.layer_mut(item, layer)?.name.clone();
        self.rename(RenameTarget::Layer { item, layer }, old, name)
    }

    pub fn rename_material(&mut self, id: MaterialId, name: &str) -> Result<bool> {
        let old = self
            .sample
            .catalog
            .get(id)
            .ok_or(EditorError::MaterialNotFound { id: id.0 })?
            .name
            .clone();
        self.rename(RenameTarget::Material { material: id }, old, name)
    }

    fn rename(&mut self, target: RenameTarget, old: String, new: &str) -> Result<bool> {
        self.ensure_idle()?;
        if old == new {
            return Ok(false);
        }
        self.execute_value_command(Command::Rename {
            target,
            old,
            new: new.to_string(),
        })?;
        Ok(true)
    }

    fn execute_value_command(&mut self, command: Command) -> Result<()> {
        debug!("{}", command.description());
        let mut doc = Document {
            sample: &mut self.sample,
            minimizer: &mut self.minimizer,
        };
        self.stack.execute(command, &mut doc)?;
        self.mark_changed();
        self.on_parameters_changed();
        Ok(())
    }

    // ---- structure ----

    /// Switch the item at `index` between simple and repeating in place.
    pub fn set_item_type(&mut self, index: usize, kind: ItemKind) -> Result<bool> {
        self.structural_edit("Change item type", |s| s.model.set_item_type(index, kind))
    }

    /// Insert a one-layer item after the current item.
    pub fn add_item(&mut self) -> Result<usize> {
        let material = self.current_material_id()?;
        let position = (self.current_item + 1).min(self.sample.model.len());
        let index = self.structural_edit("Add item", |s| {
            let layer_name = layer_name_for(&s.catalog, material);
            let item = StructuralItem::simple(
                "Multi-layer",
                vec![Layer::new(layer_name, material, 10.0, 1.0)],
            );
            Ok(s.model.insert_item(position, item))
        })?;
        self.current_item = index;
        self.current_layer = 0;
        Ok(index)
    }

    pub fn remove_item(&mut self, index: usize) -> Result<()> {
        self.structural_edit("Remove item", |s| s.model.remove_item(index).map(|_| ()))?;
        self.clamp_selection();
        Ok(())
    }

    pub fn duplicate_item(&mut self, index: usize) -> Result<usize> {
        self.structural_edit("Duplicate item", |s| {
            let copy = s.model.item(index)?.clone();
            Ok(s.model.insert_item(index + 1, copy))
        })
    }

    pub fn move_item_up(&mut self, index: usize) -> Result<bool> {
        if index == 0 {
            return Ok(false);
        }
        self.structural_edit("Move item up", |s| s.model.swap_items(index, index - 1))?;
        if self.current_item == index {
            self.current_item = index - 1;
        }
        Ok(true)
    }

    pub fn move_item_down(&mut self, index: usize) -> Result<bool> {
        if index + 1 >= self.sample.model.len() {
            self.sample.model.item(index)?;
            return Ok(false);
        }
        self.structural_edit("Move item down", |s| s.model.swap_items(index, index + 1))?;
        if self.current_item == index {
            self.current_item = index + 1;
        }
        Ok(true)
    }

    pub fn add_layer(&mut self, item: usize) -> Result<usize> {
        let material = self.current_material_id()?;
        self.structural_edit("Add layer", |s| {
            let layer_name = layer_name_for(&s.catalog, material);
            s.model.add_layer(item, Layer::new(layer_name, material, 10.0, 1.0))
        })
    }

    pub fn remove_layer(&mut self, item: usize, layer: usize) -> Result<()> {
        self.structural_edit("Remove layer", |s| s.model.remove_layer(item, layer).map(|_| ()))?;
        self.clamp_selection();
        Ok(())
    }

    pub fn set_layer_material(&mut self, item: usize, layer: usize, id: MaterialId) -> Result<bool> {
        self.structural_edit("Change layer material", |s| {
            if !s.catalog.contains(id) {
                return Err(EditorError::MaterialNotFound { id: id.0 });
            }
            let target = s.model.layer_mut(item, layer)?;
            let changed = target.material != id;
            target.material = id;
            Ok(changed)
        })
    }

    pub fn add_material(&mut self) -> Result<MaterialId> {
        let id = self.structural_edit("Add material", |s| {
            let name = format!("Material {}", s.catalog.len() + 1);
            Ok(s.catalog.add(name, 2.074, 0.0))
        })?;
        self.current_material = self.sample.catalog.len().saturating_sub(1);
        Ok(id)
    }

    /// Remove a material no layer references.
    pub fn remove_material(&mut self, id: MaterialId) -> Result<()> {
        self.structural_edit("Remove material", |s| {
            s.catalog.remove(id, &s.model).map(|_| ())
        })?;
        self.clamp_selection();
        Ok(())
    }

    /// Run `edit` on a copy of the sample and commit it as one snapshot
    /// command. A failed edit leaves the sample untouched; an edit that
    /// changes nothing records nothing.
    fn structural_edit<T, F>(&mut self, label: &str, edit: F) -> Result<T>
    where
        F: FnOnce(&mut SampleState) -> Result<T>,
    {
        self.ensure_idle()?;
        let mut next = self.sample.clone();
        let value = edit(&mut next).map_err(|e| {
            warn!("{} rejected: {}", label, e);
            e
        })?;
        next.model.enforce_boundaries();
        if next == self.sample {
            return Ok(value);
        }

        let before = std::mem::replace(&mut self.sample, next);
        self.stack.push(Command::ReplaceSample {
            label: label.to_string(),
            before: Box::new(before),
            after: Box::new(self.sample.clone()),
        });
        if let Err(e) = self.sample.check_invariants() {
            log::error!("{} left the sample inconsistent: {}", label, e);
        }
        debug!("{} applied", label);

        self.mark_changed();
        self.notifier.emit(Notification::StructureChanged);
        self.refresh_simulation();
        self.notifier.emit(Notification::UndoRedoStateChanged);
        Ok(value)
    }

    // ---- experiment data ----

    pub fn load_experiment_data(&mut self, path: &Path) -> Result<()> {
        let data = ExperimentData::load_from_file(path)?;
        self.set_experiment(data);
        Ok(())
    }

    /// Install experiment data that was built in memory.
    pub fn set_experiment(&mut self, data: ExperimentData) {
        self.project_info.experiments = data.name.clone();
        self.experiment = Some(data);
        self.experiment_skipped = false;
        self.mark_changed();
        self.notifier.emit(Notification::ExperimentDataAdded);
        self.notifier.emit(Notification::ProjectInfoChanged);
        self.refresh_simulation();
    }

    pub fn remove_experiment(&mut self) -> bool {
        if self.experiment.take().is_none() && !self.experiment_skipped {
            return false;
        }
        self.experiment_skipped = false;
        self.mark_changed();
        self.notifier.emit(Notification::ExperimentDataRemoved);
        self.refresh_simulation();
        true
    }

    /// Rename the dataset; also shown as the project's experiments entry.
    pub fn set_experiment_name(&mut self, name: &str) -> Result<bool> {
        let data = self.experiment.as_mut().ok_or(EditorError::MissingData)?;
        if data.name == name {
            return Ok(false);
        }
        data.name = name.to_string();
        self.project_info.experiments = name.to_string();
        self.notifier.emit(Notification::ProjectInfoChanged);
        Ok(true)
    }

    /// Proceed without experimental data.
    pub fn skip_experiment(&mut self) {
        self.experiment = None;
        self.experiment_skipped = true;
        self.mark_changed();
        self.notifier.emit(Notification::ExperimentDataRemoved);
    }

    // ---- shared plumbing ----

    pub(super) fn ensure_idle(&self) -> Result<()> {
        if self.session.is_running() {
            warn!("Edit rejected: a fit is running");
            return Err(EditorError::FitInProgress);
        }
        Ok(())
    }

    pub(super) fn mark_changed(&mut self) {
        if !self.state_changed {
            self.state_changed = true;
            self.notifier.emit(Notification::StateChanged);
        }
    }

    pub(super) fn on_parameters_changed(&mut self) {
        self.notifier.emit(Notification::ParametersChanged);
        self.refresh_simulation();
        self.notifier.emit(Notification::UndoRedoStateChanged);
    }

    /// Recompute the simulated curve over the experiment range or the default grid.
    pub(super) fn refresh_simulation(&mut self) {
        let q = match self.experiment.as_ref() {
            Some(data) if !data.is_empty() => data.x.clone(),
            _ => default_q_grid(),
        };
        match self.backend.compute_curve(&self.sample, &q) {
            Ok(curve) => {
                self.simulated = curve;
                self.notifier.emit(Notification::SimulatedCurveChanged);
            }
            Err(e) => warn!("Simulation failed: {}", e),
        }
    }

    pub(super) fn clamp_selection(&mut self) {
        self.current_item = self.current_item.min(self.sample.model.len().saturating_sub(1));
        let layers = self
            .sample
            .model
            .items()
            .get(self.current_item)
            .map_or(1, |i| i.layers.len());
        self.current_layer = self.current_layer.min(layers.saturating_sub(1));
        self.current_material = self
            .current_material
            .min(self.sample.catalog.len().saturating_sub(1));
    }

    fn current_material_id(&self) -> Result<MaterialId> {
        self.sample
            .catalog
            .at(self.current_material)
            .or_else(|| self.sample.catalog.at(0))
            .map(|m| m.id)
            .ok_or(EditorError::IndexOutOfRange {
                index: self.current_material,
                len: 0,
            })
    }
}

fn layer_name_for(catalog: &MaterialCatalog, material: MaterialId) -> String {
    catalog
        .get(material)
        .map_or_else(|| "Layer".to_string(), |m| format!("{} Layer", m.name))
}

/// Evenly spaced q values over [`DEFAULT_Q_RANGE`].
pub fn default_q_grid() -> Vec<f64> {
    let (start, end) = DEFAULT_Q_RANGE;
    let step = (end - start) / (DEFAULT_Q_POINTS - 1) as f64;
    (0..DEFAULT_Q_POINTS).map(|i| start + step * i as f64).collect()
}
