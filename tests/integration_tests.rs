//! Integration Tests
//!
//! End-to-end tests driving the editing facade the way a view layer would.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;
use tempfile::{NamedTempFile, TempDir};

use refl_editor::data::ExperimentData;
use refl_editor::fitting::{
    CancellationToken, ExecutionMode, FitBackend, FitOutcome, FitProblem, FitState, FitStatus,
    MinimizerState, MockBackend,
};
use refl_editor::sample::{ItemKind, LayerField, ParameterPath, SampleState};
use refl_editor::{EditingFacade, EditorConfig, EditorError, Notification};

fn editor_with(backend: MockBackend, execution: ExecutionMode) -> EditingFacade {
    let config = EditorConfig {
        execution,
        ..EditorConfig::default()
    };
    EditingFacade::new(config, Arc::new(backend)).unwrap()
}

fn editor() -> EditingFacade {
    editor_with(MockBackend::new(), ExecutionMode::Synchronous)
}

/// Wraps the mock backend, counting concurrent fits and refusing some
/// engines.
struct InstrumentedBackend {
    inner: MockBackend,
    refused: Vec<&'static str>,
    active: AtomicUsize,
    peak: AtomicUsize,
    fits: AtomicUsize,
}

impl InstrumentedBackend {
    fn new(inner: MockBackend) -> Self {
        Self {
            inner,
            refused: Vec::new(),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            fits: AtomicUsize::new(0),
        }
    }

    fn refusing(mut self, engine: &'static str) -> Self {
        self.refused.push(engine);
        self
    }
}

impl FitBackend for InstrumentedBackend {
    fn interface_name(&self) -> &str {
        self.inner.interface_name()
    }

    fn available_engines(&self) -> Vec<String> {
        self.inner.available_engines()
    }

    fn switch_engine(&self, name: &str) -> refl_editor::Result<()> {
        if self.refused.iter().any(|refused| *refused == name) {
            return Err(EditorError::Backend {
                reason: format!("engine {} unavailable", name),
            });
        }
        self.inner.switch_engine(name)
    }

    fn compute_curve(&self, sample: &SampleState, q: &[f64]) -> refl_editor::Result<Vec<(f64, f64)>> {
        self.inner.compute_curve(sample, q)
    }

    fn fit(&self, problem: &FitProblem, cancel: &CancellationToken) -> refl_editor::Result<FitOutcome> {
        self.fits.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = self.inner.fit(problem, cancel);
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn instrumented_editor(backend: &Arc<InstrumentedBackend>, execution: ExecutionMode) -> EditingFacade {
    let config = EditorConfig {
        execution,
        ..EditorConfig::default()
    };
    EditingFacade::new(config, backend.clone()).unwrap()
}

fn layer_path(item: usize, layer: usize, field: LayerField) -> ParameterPath {
    ParameterPath::Layer { item, layer, field }
}

fn dataset(ye: Vec<f64>) -> ExperimentData {
    ExperimentData::from_columns(
        "run1",
        vec![0.01, 0.02, 0.05, 0.1],
        vec![1.0, 0.3, 0.01, 0.001],
        ye,
        None,
    )
    .unwrap()
}

/// First layer of the first item and last layer of the last item are
/// disabled; every other layer is enabled.
fn assert_boundary_policy(sample: &SampleState) {
    let items = sample.model.items();
    let last_item = items.len() - 1;
    for (i, item) in items.iter().enumerate() {
        let last_layer = item.layers.len() - 1;
        for (j, layer) in item.layers.iter().enumerate() {
            let boundary = (i == 0 && j == 0) || (i == last_item && j == last_layer);
            assert_eq!(
                layer.is_enabled(),
                !boundary,
                "layer {} of item {} has the wrong enabled flag",
                j,
                i
            );
        }
    }
    assert!(sample.check_invariants().is_ok());
}

// === Structure Editing ===

#[test]
fn test_item_type_toggle_round_trip() {
    let mut facade = editor();
    facade.add_item().unwrap();
    let original = facade.sample().clone();

    for index in 0..facade.model().len() {
        assert!(facade.set_item_type(index, ItemKind::Repeating).unwrap());
        assert_eq!(facade.model().items()[index].kind(), ItemKind::Repeating);
        assert_boundary_policy(facade.sample());

        assert!(facade.set_item_type(index, ItemKind::Simple).unwrap());
        assert_eq!(facade.sample(), &original);
    }
}

#[test]
fn test_boundary_policy_survives_edits() {
    let mut facade = editor();
    facade.add_item().unwrap();
    assert_boundary_policy(facade.sample());
    facade.add_layer(0).unwrap();
    assert_boundary_policy(facade.sample());
    facade.add_layer(3).unwrap();
    assert_boundary_policy(facade.sample());
    facade.move_item_down(2).unwrap();
    assert_boundary_policy(facade.sample());
    facade.move_item_up(1).unwrap();
    assert_boundary_policy(facade.sample());
    facade.duplicate_item(0).unwrap();
    assert_boundary_policy(facade.sample());
    facade.remove_item(0).unwrap();
    assert_boundary_policy(facade.sample());
    facade.remove_layer(1, 0).unwrap();
    assert_boundary_policy(facade.sample());
    facade.undo().unwrap();
    assert_boundary_policy(facade.sample());
}

#[test]
fn test_single_item_sample() {
    let mut facade = editor();
    facade.remove_item(2).unwrap();
    facade.remove_item(1).unwrap();
    assert!(matches!(
        facade.remove_item(0),
        Err(EditorError::LastElement { .. })
    ));
    assert!(facade.set_item_type(0, ItemKind::Repeating).unwrap());
    assert!(!facade.model().items()[0].layers[0].is_enabled());
    assert!(matches!(
        facade.set_item_type(1, ItemKind::Repeating),
        Err(EditorError::IndexOutOfRange { index: 1, len: 1 })
    ));
}

// === Undo / Redo ===

fn snapshot(facade: &EditingFacade) -> (SampleState, MinimizerState) {
    (facade.sample().clone(), facade.minimizer().state())
}

#[test]
fn test_undo_redo_restores_every_state() {
    let mut facade = editor();
    let mut states = vec![snapshot(&facade)];

    facade.set_item_type(1, ItemKind::Repeating).unwrap();
    states.push(snapshot(&facade));
    facade
        .set_parameter_value(layer_path(1, 0, LayerField::Thickness), 55.0)
        .unwrap();
    states.push(snapshot(&facade));
    facade.set_engine("bumps").unwrap();
    states.push(snapshot(&facade));
    facade.set_item_repetitions(1, 3.0).unwrap();
    states.push(snapshot(&facade));
    facade.add_item().unwrap();
    states.push(snapshot(&facade));
    facade.set_method("de").unwrap();
    states.push(snapshot(&facade));
    facade
        .set_parameter_fixed(layer_path(1, 0, LayerField::Roughness), false)
        .unwrap();
    states.push(snapshot(&facade));
    facade.rename_item(2, "Bilayer").unwrap();
    states.push(snapshot(&facade));

    let steps = states.len() - 1;
    for expected in states.iter().rev().skip(1) {
        facade.undo().unwrap();
        assert_eq!(&snapshot(&facade), expected);
    }
    assert!(!facade.can_undo());

    for expected in states.iter().skip(1) {
        facade.redo().unwrap();
        assert_eq!(&snapshot(&facade), expected);
    }
    assert!(!facade.can_redo());
    assert_eq!(facade.history().len(), steps);
}

#[test]
fn test_structural_undo_routes_structure_and_parameters() {
    let mut facade = editor();
    facade.set_item_type(1, ItemKind::Repeating).unwrap();
    facade.drain_notifications();

    facade.undo().unwrap();
    let notes = facade.drain_notifications();
    assert!(notes.contains(&Notification::StructureChanged));
    assert!(notes.contains(&Notification::ParametersChanged));
    assert!(notes.contains(&Notification::UndoRedoStateChanged));
}

#[test]
fn test_new_edit_clears_redo() {
    let mut facade = editor();
    facade
        .set_parameter_value(layer_path(1, 0, LayerField::Thickness), 20.0)
        .unwrap();
    facade.undo().unwrap();
    assert!(facade.can_redo());
    facade
        .set_parameter_value(layer_path(1, 0, LayerField::Thickness), 30.0)
        .unwrap();
    assert!(!facade.can_redo());
}

// === Minimizer ===

#[test]
fn test_repeated_engine_switch_is_noop() {
    let mut facade = editor();
    assert!(facade.set_engine("bumps").unwrap());
    assert_eq!(facade.minimizer().method(), "lm");
    let depth = facade.command_stack().undo_count();
    facade.drain_notifications();

    assert!(!facade.set_engine("bumps").unwrap());
    assert_eq!(facade.command_stack().undo_count(), depth);
    assert!(facade.drain_notifications().is_empty());
}

#[test]
fn test_refused_engine_switch_leaves_selector_unchanged() {
    let backend = Arc::new(InstrumentedBackend::new(MockBackend::new()).refusing("bumps"));
    let mut facade = instrumented_editor(&backend, ExecutionMode::Synchronous);
    facade.drain_notifications();

    assert!(matches!(
        facade.set_engine("bumps"),
        Err(EditorError::Backend { .. })
    ));
    assert_eq!(facade.minimizer().engine(), "lmfit");
    assert_eq!(facade.minimizer().method(), "leastsq");
    assert!(!facade.can_undo());
    assert!(!facade.state_has_changed());
    assert!(facade.drain_notifications().is_empty());

    assert!(facade.set_engine("DFO_LS").unwrap());
    assert_eq!(facade.status_info().minimization, "DFO_LS (leastsq)");
    facade.undo().unwrap();
    assert_eq!(facade.minimizer().engine(), "lmfit");
}

#[test]
fn test_incompatible_method_rejected() {
    let mut facade = editor();
    assert!(matches!(
        facade.set_method("de"),
        Err(EditorError::IncompatibleMethod { .. })
    ));
    assert!(matches!(
        facade.set_engine("scipy"),
        Err(EditorError::UnknownEngine { .. })
    ));
    assert_eq!(facade.status_info().minimization, "lmfit (leastsq)");
    assert!(!facade.can_undo());
}

// === Fitting ===

#[test]
fn test_zero_uncertainty_fails_before_running() {
    let mut facade = editor();
    facade.set_experiment(dataset(vec![0.1, 0.0, 0.01, 0.001]));
    facade.drain_notifications();

    assert!(matches!(
        facade.start_fit(),
        Err(EditorError::InvalidUncertainty { index: 1, .. })
    ));
    let notes = facade.drain_notifications();
    assert!(!notes.contains(&Notification::FitRunningStateChanged));
    assert!(notes.iter().any(|n| matches!(n, Notification::FitFailed(_))));
    assert_eq!(facade.fit_state(), FitState::Idle);
    assert!(facade.is_fit_finished());
}

#[test]
fn test_stop_fit_when_idle() {
    let mut facade = editor();
    assert!(!facade.stop_fit());
    assert!(facade.drain_notifications().is_empty());
}

#[test]
fn test_stub_fit_results() {
    let outcome = FitOutcome {
        success: true,
        n_pars: 3,
        goodness_of_fit: 1.2,
        reduced_chi: 1.05,
        values: Vec::new(),
    };
    let mut facade = editor_with(MockBackend::new().with_outcome(outcome), ExecutionMode::Synchronous);
    let data = ExperimentData::from_columns(
        "stub",
        vec![0.0, 1.0, 2.0],
        vec![10.0, 8.0, 6.0],
        vec![1.0, 1.0, 1.0],
        None,
    )
    .unwrap();
    facade.set_experiment(data);

    facade.start_fit().unwrap();
    assert!(facade.is_fit_finished());
    let results = facade.fit_results();
    assert_eq!(results.success, FitStatus::Succeeded);
    assert_eq!(results.nvarys, Some(3));
    assert_eq!(results.gof, Some(1.2));
    assert_eq!(results.redchi2, Some(1.05));

    let json = serde_json::to_value(results).unwrap();
    assert_eq!(json["GOF"], serde_json::json!(1.2));
    assert_eq!(json["success"], serde_json::json!(true));
}

#[test]
fn test_threaded_fit_completes() {
    let backend = MockBackend::new()
        .with_iterations(5)
        .with_delay(Duration::from_millis(2));
    let mut facade = editor_with(backend, ExecutionMode::Threaded);
    facade
        .set_parameter_fixed(layer_path(1, 0, LayerField::Thickness), false)
        .unwrap();
    facade.set_experiment(dataset(vec![0.1, 0.03, 0.001, 0.0001]));

    facade.start_fit().unwrap();
    assert!(!facade.is_fit_finished());
    assert!(matches!(
        facade.set_item_type(1, ItemKind::Repeating),
        Err(EditorError::FitInProgress)
    ));

    let result = facade.wait_fit(Duration::from_secs(10)).expect("fit finished");
    assert!(result.is_ok());
    assert!(facade.is_fit_finished());
    assert_eq!(facade.fit_state(), FitState::Idle);
    let thickness = facade
        .sample()
        .parameter(&layer_path(1, 0, LayerField::Thickness))
        .unwrap();
    assert_abs_diff_eq!(thickness.error.unwrap(), 1.0, epsilon = 1e-12);
}

#[test]
fn test_cancel_running_fit() {
    let backend = MockBackend::new()
        .with_iterations(10_000)
        .with_delay(Duration::from_millis(5));
    let mut facade = editor_with(backend, ExecutionMode::Threaded);
    facade
        .set_parameter_fixed(layer_path(1, 0, LayerField::Thickness), false)
        .unwrap();
    facade.set_experiment(dataset(vec![0.1, 0.03, 0.001, 0.0001]));
    let before = facade.sample().clone();
    let depth = facade.command_stack().undo_count();

    facade.start_fit().unwrap();
    assert_eq!(facade.fit_state(), FitState::Running);
    facade.drain_notifications();

    assert!(facade.stop_fit());
    assert!(facade.is_fit_finished());
    assert_eq!(facade.fit_state(), FitState::Idle);
    assert_eq!(facade.fit_results().success, FitStatus::Cancelled);
    let notes = facade.drain_notifications();
    assert!(notes.contains(&Notification::FitFailed("Fitting stopped".to_string())));
    assert!(notes.contains(&Notification::FitRunningStateChanged));

    std::thread::sleep(Duration::from_millis(20));
    assert!(facade.poll_fit().is_none());
    assert_eq!(facade.sample(), &before);
    assert_eq!(facade.command_stack().undo_count(), depth);
    assert!(!facade.command_stack().in_macro());
}

#[test]
fn test_start_while_running_stops_fit() {
    let backend = Arc::new(InstrumentedBackend::new(
        MockBackend::new()
            .with_iterations(1)
            .with_delay(Duration::from_millis(300)),
    ));
    let mut facade = instrumented_editor(&backend, ExecutionMode::Threaded);
    facade.set_experiment(dataset(vec![0.1, 0.03, 0.001, 0.0001]));
    let depth = facade.command_stack().undo_count();

    facade.start_fit().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    facade.drain_notifications();

    facade.start_fit().unwrap();
    assert_eq!(facade.fit_state(), FitState::Idle);
    assert!(facade.is_fit_finished());
    assert_eq!(facade.fit_results().success, FitStatus::Cancelled);
    assert!(!facade.command_stack().in_macro());
    assert_eq!(facade.command_stack().undo_count(), depth);
    assert!(facade
        .drain_notifications()
        .contains(&Notification::FitFailed("Fitting stopped".to_string())));

    // The stopped worker is still inside the backend.
    assert!(matches!(facade.start_fit(), Err(EditorError::FitInProgress)));
    assert!(facade.is_fit_finished());
    assert!(!facade.command_stack().in_macro());

    std::thread::sleep(Duration::from_millis(600));
    facade.start_fit().unwrap();
    let result = facade.wait_fit(Duration::from_secs(10)).expect("fit finished");
    assert!(result.is_ok());
    assert_eq!(backend.fits.load(Ordering::SeqCst), 2);
    assert_eq!(backend.peak.load(Ordering::SeqCst), 1);
}

#[test]
fn test_worker_panic_reported() {
    let mut facade = editor_with(MockBackend::new().panicking("boom"), ExecutionMode::Threaded);
    facade.set_experiment(dataset(vec![0.1, 0.03, 0.001, 0.0001]));
    facade.start_fit().unwrap();

    let result = facade.wait_fit(Duration::from_secs(10)).expect("fit finished");
    assert!(matches!(result, Err(EditorError::WorkerPanicked { .. })));
    assert!(facade.is_fit_finished());
    assert!(facade
        .drain_notifications()
        .iter()
        .any(|n| matches!(n, Notification::FitFailed(m) if m.contains("boom"))));
}

// === Persistence ===

#[test]
fn test_two_item_four_layer_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut facade = editor();
    facade.remove_item(1).unwrap();
    facade.add_layer(0).unwrap();
    facade.add_layer(1).unwrap();
    facade
        .set_parameter_value(layer_path(0, 1, LayerField::Thickness), 12.345678901)
        .unwrap();
    facade
        .set_parameter_value(layer_path(1, 0, LayerField::Roughness), 4.25)
        .unwrap();
    facade.set_item_type(1, ItemKind::Repeating).unwrap();
    facade.set_item_repetitions(1, 7.0).unwrap();
    facade.add_material().unwrap();
    assert_eq!(facade.model().len(), 2);
    assert_eq!(facade.model().layers().count(), 4);

    let location = dir.path().join("proj");
    facade
        .edit_project_info("location", &location.to_string_lossy())
        .unwrap();
    facade.create_project().unwrap();
    facade.save_project().unwrap();

    let mut loaded = editor();
    loaded.load_project(&location).unwrap();

    let saved_params = facade.sample().parameters();
    let loaded_params = loaded.sample().parameters();
    assert_eq!(saved_params.len(), loaded_params.len());
    for ((path_a, a), (path_b, b)) in saved_params.iter().zip(loaded_params.iter()) {
        assert_eq!(path_a, path_b);
        assert_abs_diff_eq!(a.value, b.value, epsilon = 1e-9);
        assert_eq!(a.fixed, b.fixed);
        assert_eq!(a.enabled, b.enabled);
    }
    assert_eq!(loaded.catalog().len(), facade.catalog().len());
    assert_eq!(
        loaded.catalog().orphans(loaded.model()).len(),
        facade.catalog().orphans(facade.model()).len()
    );
    assert_eq!(loaded.model().items()[1].kind(), ItemKind::Repeating);
    assert_boundary_policy(loaded.sample());
}

#[test]
fn test_four_column_data_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "# q R dR dq").unwrap();
    writeln!(file, "0.01 1.0 0.1 0.001").unwrap();
    writeln!(file, "0.02 0.5 0.05 0.001").unwrap();
    writeln!(file, "0.03 0.1 0.01 0.002").unwrap();

    let mut facade = editor();
    facade.load_experiment_data(file.path()).unwrap();
    assert_eq!(facade.experiment().unwrap().column_count(), 4);
    assert_eq!(facade.simulated_curve().len(), 3);

    let location = dir.path().join("proj");
    facade
        .edit_project_info("location", &location.to_string_lossy())
        .unwrap();
    facade.create_project().unwrap();

    let mut loaded = editor();
    loaded.load_project(&location).unwrap();
    let data = loaded.experiment().unwrap();
    assert_eq!(data.column_count(), 4);
    assert_eq!(data.len(), 3);
    assert_abs_diff_eq!(data.x[2], 0.03, epsilon = 1e-12);
}
