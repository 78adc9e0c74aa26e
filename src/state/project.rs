//! Project State Schema
//!
//! The `project.json` document and the directory layout around it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::data::ExperimentData;
use crate::error::{EditorError, Result};
use crate::fitting::MinimizerState;
use crate::sample::{Material, MaterialCatalog, SampleModel, SampleState};

/// Current schema version for project files.
pub const CURRENT_SCHEMA_VERSION: &str = "1.0.0";

/// Project directory structure constants.
pub const PROJECT_FILE: &str = "project.json";
pub const SAMPLES_DIR: &str = "samples";
pub const EXPERIMENTS_DIR: &str = "experiments";
pub const CALCULATIONS_DIR: &str = "calculations";

/// Project path shown for bundled example projects.
pub const EXAMPLE_LOCATION: &str = "--- EXAMPLE ---";

/// Format of the `modified` field.
const MODIFIED_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Descriptive metadata shown on the project page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub short_description: String,
    pub samples: String,
    pub experiments: String,
    pub modified: String,
}

impl Default for ProjectInfo {
    fn default() -> Self {
        Self {
            name: "Example Project".to_string(),
            short_description: "reflectometry, 1D".to_string(),
            samples: "Not loaded".to_string(),
            experiments: "Not loaded".to_string(),
            modified: now_stamp(),
        }
    }
}

impl ProjectInfo {
    /// Keys accepted by [`ProjectInfo::set`].
    pub const KEYS: &'static [&'static str] =
        &["name", "short_description", "samples", "experiments", "modified"];

    /// Set a field by key. Returns `Ok(false)` if the value is unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<bool> {
        let field = match key {
            "name" => &mut self.name,
            "short_description" => &mut self.short_description,
            "samples" => &mut self.samples,
            "experiments" => &mut self.experiments,
            "modified" => &mut self.modified,
            _ => {
                return Err(EditorError::UnknownProjectKey {
                    key: key.to_string(),
                })
            }
        };
        if *field == value {
            return Ok(false);
        }
        *field = value.to_string();
        Ok(true)
    }

    pub fn touch(&mut self) {
        self.modified = now_stamp();
    }
}

fn now_stamp() -> String {
    Local::now().format(MODIFIED_FORMAT).to_string()
}

fn default_schema_version() -> String {
    CURRENT_SCHEMA_VERSION.to_string()
}

/// Serializable snapshot of everything a project round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    /// Schema version for compatibility checks.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    pub model: SampleModel,

    /// Materials referenced by the model, in catalog order.
    pub materials: Vec<Material>,

    /// Materials no layer references.
    #[serde(default)]
    pub materials_not_in_model: Vec<Material>,

    /// Experiment columns: x, y, ye and optionally xe.
    #[serde(default)]
    pub experiments: Option<Vec<Vec<f64>>>,

    #[serde(default)]
    pub experiment_name: Option<String>,

    #[serde(default)]
    pub experiment_skipped: bool,

    pub project_info: ProjectInfo,

    pub interface: String,

    pub minimizer: MinimizerState,
}

impl ProjectDocument {
    pub fn capture(
        sample: &SampleState,
        experiment: Option<&ExperimentData>,
        experiment_skipped: bool,
        project_info: &ProjectInfo,
        interface: &str,
        minimizer: MinimizerState,
    ) -> Self {
        let owned = |materials: Vec<&Material>| -> Vec<Material> {
            materials.into_iter().cloned().collect()
        };
        Self {
            schema_version: CURRENT_SCHEMA_VERSION.to_string(),
            model: sample.model.clone(),
            materials: owned(sample.catalog.in_model(&sample.model)),
            materials_not_in_model: owned(sample.catalog.orphans(&sample.model)),
            experiments: experiment.map(ExperimentData::to_column_arrays),
            experiment_name: experiment.map(|e| e.name.clone()),
            experiment_skipped,
            project_info: project_info.clone(),
            interface: interface.to_string(),
            minimizer,
        }
    }

    /// Rebuild the sample: in-model materials first, then orphans.
    pub fn sample(&self) -> Result<SampleState> {
        let mut materials = self.materials.clone();
        materials.extend(self.materials_not_in_model.iter().cloned());
        let catalog = MaterialCatalog::from_materials(materials);
        let mut model = self.model.clone();
        model.check_structure().map_err(invalid_project)?;
        if model.check_boundaries().is_err() {
            warn!("Project boundary layers were inconsistent; re-applying boundary policy");
            model.enforce_boundaries();
        }
        catalog.check_references(&model).map_err(invalid_project)?;
        Ok(SampleState::new(model, catalog))
    }

    /// Experiment data by actual column count.
    pub fn experiment(&self) -> Result<Option<ExperimentData>> {
        match &self.experiments {
            Some(columns) => {
                let name = self
                    .experiment_name
                    .clone()
                    .unwrap_or_else(|| "Experiment".to_string());
                ExperimentData::from_column_arrays(name, columns.clone()).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Write `<dir>/project.json`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let project_file = project_file_path(dir);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&project_file, content).map_err(|e| EditorError::FileWriteError {
            path: project_file.clone(),
            source: e,
        })?;
        info!("Saved project to {}", project_file.display());
        Ok(project_file)
    }

    /// Read a project from its directory or from the `project.json` itself.
    pub fn load(path: &Path) -> Result<Self> {
        let project_file = if path.is_dir() {
            project_file_path(path)
        } else {
            path.to_path_buf()
        };
        if !project_file.exists() {
            return Err(EditorError::FileNotFound { path: project_file });
        }

        let content = fs::read_to_string(&project_file).map_err(|e| EditorError::FileReadError {
            path: project_file.clone(),
            source: e,
        })?;
        let data: serde_json::Value = serde_json::from_str(&content)?;
        check_schema_version(&data)?;

        let document: ProjectDocument = serde_json::from_value(data)?;
        info!("Loaded project from {}", project_file.display());
        Ok(document)
    }
}

/// A document that parsed but describes an impossible sample.
fn invalid_project(error: EditorError) -> EditorError {
    match error {
        EditorError::Invariant { reason } => EditorError::InvalidProject { reason },
        other => other,
    }
}

/// Reject documents written by a newer major schema.
fn check_schema_version(data: &serde_json::Value) -> Result<()> {
    let version = data
        .get("schema_version")
        .and_then(|v| v.as_str())
        .unwrap_or(CURRENT_SCHEMA_VERSION);
    let major = |v: &str| v.split('.').next().and_then(|m| m.parse::<u32>().ok());
    match (major(version), major(CURRENT_SCHEMA_VERSION)) {
        (Some(found), Some(current)) if found <= current => Ok(()),
        _ => Err(EditorError::UnsupportedSchema {
            version: version.to_string(),
        }),
    }
}

/// Get the path to the project.json file.
pub fn project_file_path(base: &Path) -> PathBuf {
    base.join(PROJECT_FILE)
}

/// Create the project directory and its sub-directories.
///
/// Fails if `path` already exists.
pub fn create_directory_structure(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(EditorError::ProjectAlreadyExists {
            path: path.to_path_buf(),
        });
    }
    fs::create_dir_all(path).map_err(|e| EditorError::DirectoryCreateError {
        path: path.to_path_buf(),
        source: e,
    })?;
    for dir in [SAMPLES_DIR, EXPERIMENTS_DIR, CALCULATIONS_DIR] {
        let dir_path = path.join(dir);
        fs::create_dir_all(&dir_path).map_err(|e| EditorError::DirectoryCreateError {
            path: dir_path,
            source: e,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn document() -> ProjectDocument {
        let mut sample = SampleState::default_workspace();
        sample.catalog.add("Spare", 1.5, 0.0);
        let experiment = ExperimentData::from_columns(
            "run1",
            vec![0.01, 0.02],
            vec![1.0, 0.5],
            vec![0.1, 0.05],
            None,
        )
        .unwrap();
        ProjectDocument::capture(
            &sample,
            Some(&experiment),
            false,
            &ProjectInfo::default(),
            "mock",
            MinimizerState {
                engine: "lmfit".into(),
                method: "leastsq".into(),
            },
        )
    }

    #[test]
    fn test_orphans_split_out() {
        let doc = document();
        assert_eq!(doc.materials.len(), 3);
        assert_eq!(doc.materials_not_in_model.len(), 1);
        assert_eq!(doc.materials_not_in_model[0].name, "Spare");
    }

    #[test]
    fn test_save_load() {
        let dir = TempDir::new().unwrap();
        let doc = document();
        doc.save(dir.path()).unwrap();

        let loaded = ProjectDocument::load(dir.path()).unwrap();
        assert_eq!(loaded.project_info, doc.project_info);
        assert_eq!(loaded.minimizer, doc.minimizer);
        assert_eq!(loaded.model.len(), doc.model.len());
        let d2o = &loaded.materials[1];
        assert_eq!(d2o.name, "D2O");
        assert!((d2o.sld.value - 6.36).abs() < 1e-9);
        let sample = loaded.sample().unwrap();
        assert_eq!(sample.catalog.len(), 4);
        assert_eq!(loaded.experiment().unwrap().unwrap().column_count(), 3);
    }

    #[test]
    fn test_empty_structure_rejected() {
        let dir = TempDir::new().unwrap();
        let mut value = serde_json::to_value(document()).unwrap();
        value["model"]["items"] = serde_json::json!([]);
        fs::write(project_file_path(dir.path()), value.to_string()).unwrap();
        let loaded = ProjectDocument::load(dir.path()).unwrap();
        assert!(matches!(
            loaded.sample(),
            Err(EditorError::InvalidProject { .. })
        ));

        let mut value = serde_json::to_value(document()).unwrap();
        value["model"]["items"][1]["layers"] = serde_json::json!([]);
        fs::write(project_file_path(dir.path()), value.to_string()).unwrap();
        let err = ProjectDocument::load(dir.path()).unwrap().sample().unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Persistence);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let dir = TempDir::new().unwrap();
        let mut value = serde_json::to_value(document()).unwrap();
        value["schema_version"] = serde_json::json!("2.0.0");
        fs::write(project_file_path(dir.path()), value.to_string()).unwrap();
        assert!(matches!(
            ProjectDocument::load(dir.path()),
            Err(EditorError::UnsupportedSchema { .. })
        ));
    }

    #[test]
    fn test_create_directory_structure() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("proj");
        create_directory_structure(&root).unwrap();
        assert!(root.join(SAMPLES_DIR).is_dir());
        assert!(root.join(EXPERIMENTS_DIR).is_dir());
        assert!(root.join(CALCULATIONS_DIR).is_dir());
        assert!(matches!(
            create_directory_structure(&root),
            Err(EditorError::ProjectAlreadyExists { .. })
        ));
    }

    #[test]
    fn test_project_info_set() {
        let mut info = ProjectInfo::default();
        assert!(info.set("name", "Bilayer").unwrap());
        assert!(!info.set("name", "Bilayer").unwrap());
        assert!(info.set("colour", "red").is_err());
    }
}
