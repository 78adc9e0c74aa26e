//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use walkdir::WalkDir;

use crate::editor::EditingFacade;
use crate::error::{EditorError, Result};
use crate::fitting::MockBackend;
use crate::sample::{ItemKind, LayerField, ParameterPath};
use crate::state::project::PROJECT_FILE;
use crate::state::{EditorConfig, ProjectDocument};

fn facade(config: &EditorConfig) -> Result<EditingFacade> {
    EditingFacade::new(config.clone(), Arc::new(MockBackend::new()))
}

fn open(config: &EditorConfig, project: &Path) -> Result<EditingFacade> {
    let mut editor = facade(config)?;
    editor.load_project(project)?;
    Ok(editor)
}

/// Create a new project directory with the default sample.
pub fn new_project(config: &EditorConfig, path: &Path, name: Option<&str>) -> Result<()> {
    info!("Creating new project at: {}", path.display());

    let mut editor = facade(config)?;
    editor.edit_project_info("location", &path.to_string_lossy())?;
    if let Some(name) = name {
        editor.edit_project_info("name", name)?;
    }
    let file = editor.create_project()?;

    println!("Project created: {}", file.display());
    Ok(())
}

/// Print the sample, the minimizer and the project info.
pub fn show(config: &EditorConfig, project: &Path) -> Result<()> {
    let editor = open(config, project)?;
    let info = editor.project_info();

    println!("Project: {} ({})", info.name, info.short_description);
    println!("Location: {}", editor.project_path().display());
    println!("Modified: {}", info.modified);
    println!("Experiments: {}", info.experiments);
    let status = editor.status_info();
    println!("Calculator: {} | Minimizer: {}", status.calculation, status.minimization);
    println!("{:-<60}", "");

    let model = editor.model();
    println!(
        "scale = {}  background = {}",
        model.scale.value, model.background.value
    );
    for (i, item) in model.items().iter().enumerate() {
        let repetitions = item
            .repetitions()
            .map(|p| format!(" x{}", p.value))
            .unwrap_or_default();
        println!("[{}] {} ({}){}", i, item.name, item.kind(), repetitions);
        for (j, layer) in item.layers.iter().enumerate() {
            let material = editor
                .catalog()
                .get(layer.material)
                .map_or("?", |m| m.name.as_str());
            let marker = if layer.is_enabled() { "" } else { "  [boundary]" };
            println!(
                "    ({}) {}: {} d={} sigma={}{}",
                j, layer.name, material, layer.thickness.value, layer.roughness.value, marker
            );
        }
    }

    let orphans = editor.catalog().orphans(model);
    if !orphans.is_empty() {
        println!("Unused materials:");
        for material in orphans {
            println!("    {} sld={}", material.name, material.sld.value);
        }
    }

    let free = editor.sample().free_parameters();
    println!("{:-<60}", "");
    println!("Free parameters: {}", free.len());
    for (path, parameter) in free {
        println!("    {} = {}", path, parameter.value);
    }

    Ok(())
}

/// Switch an item between simple and repeating.
pub fn set_type(config: &EditorConfig, project: &Path, item: usize, kind: ItemKind) -> Result<()> {
    info!("Setting item {} to {} in {}", item, kind, project.display());

    let mut editor = open(config, project)?;
    if editor.set_item_type(item, kind)? {
        editor.save_project()?;
        println!("Item {} is now {}", item, kind);
    } else {
        println!("Item {} is already {}", item, kind);
    }
    Ok(())
}

/// Set a layer thickness or roughness.
pub fn set_layer(
    config: &EditorConfig,
    project: &Path,
    item: usize,
    layer: usize,
    field: LayerField,
    value: f64,
    free: bool,
) -> Result<()> {
    let mut editor = open(config, project)?;
    let path = ParameterPath::Layer { item, layer, field };
    let mut changed = editor.set_parameter_value(path, value)?;
    if free {
        changed |= editor.set_parameter_fixed(path, false)?;
    }
    if changed {
        editor.save_project()?;
    }
    println!("{}", editor.undo_text());
    Ok(())
}

/// Attach an experimental data file to the project.
pub fn load_data(config: &EditorConfig, project: &Path, file: &Path) -> Result<()> {
    info!("Loading data {} into {}", file.display(), project.display());

    let mut editor = open(config, project)?;
    editor.load_experiment_data(file)?;
    editor.save_project()?;

    if let Some(data) = editor.experiment() {
        println!(
            "Loaded '{}': {} points, {} columns",
            data.name,
            data.len(),
            data.column_count()
        );
    }
    Ok(())
}

/// Fit the free parameters and save the fitted values.
pub fn fit(
    config: &EditorConfig,
    project: &Path,
    engine: Option<&str>,
    method: Option<&str>,
) -> Result<()> {
    let mut editor = open(config, project)?;
    if let Some(engine) = engine {
        editor.set_engine(engine)?;
    }
    if let Some(method) = method {
        editor.set_method(method)?;
    }

    println!("Fitting with {}", editor.minimizer().label());
    editor.start_fit()?;
    if !editor.is_fit_finished() {
        match editor.wait_fit(config.fit_timeout()) {
            Some(result) => result?,
            None => {
                warn!("Fit did not finish within {:?}", config.fit_timeout());
                editor.stop_fit();
                return Err(EditorError::Cancelled);
            }
        }
    }

    let results = editor.fit_results();
    println!("{}", serde_json::to_string_pretty(results)?);
    editor.save_project()?;
    Ok(())
}

/// List every project found below `dir`.
pub fn list_examples(dir: &Path) -> Result<()> {
    let mut found = 0;
    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == PROJECT_FILE)
    {
        match ProjectDocument::load(entry.path()) {
            Ok(doc) => {
                found += 1;
                println!(
                    "{}: {} ({} items)",
                    entry.path().display(),
                    doc.project_info.name,
                    doc.model.len()
                );
            }
            Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
        }
    }
    if found == 0 {
        println!("No projects found under {}", dir.display());
    }
    Ok(())
}
