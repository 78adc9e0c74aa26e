//! Project metadata, save and load.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::facade::EditingFacade;
use super::notify::Notification;
use crate::error::{EditorError, Result};
use crate::fitting::FitResults;
use crate::sample::SampleState;
use crate::state::project::{create_directory_structure, project_file_path};
use crate::state::{ProjectDocument, ProjectInfo, EXAMPLE_LOCATION};

impl EditingFacade {
    /// Edit one project info field. `location` sets the project directory.
    pub fn edit_project_info(&mut self, key: &str, value: &str) -> Result<bool> {
        if key == "location" {
            let path = PathBuf::from(value);
            if path == self.project_path {
                return Ok(false);
            }
            self.project_path = path;
            self.notifier.emit(Notification::ProjectInfoChanged);
            return Ok(true);
        }
        if !self.project_info.set(key, value)? {
            return Ok(false);
        }
        self.notifier.emit(Notification::ProjectInfoChanged);
        Ok(true)
    }

    /// Create the project directory tree and write an initial `project.json`.
    pub fn create_project(&mut self) -> Result<PathBuf> {
        create_directory_structure(&self.project_path)?;
        self.project_info.touch();
        let file = self.capture().save(&self.project_path)?;
        info!("Created project at {}", self.project_path.display());
        self.project_created = true;
        self.notifier.emit(Notification::ProjectCreatedChanged);
        self.notifier.emit(Notification::ProjectInfoChanged);
        Ok(file)
    }

    /// Write the current state to `<project_path>/project.json`.
    pub fn save_project(&mut self) -> Result<PathBuf> {
        self.project_info.touch();
        match self.capture().save(&self.project_path) {
            Ok(file) => {
                self.state_changed = false;
                self.notifier.emit(Notification::ProjectSaved {
                    ok: true,
                    message: format!("Saved to {}", file.display()),
                });
                self.notifier.emit(Notification::ProjectInfoChanged);
                Ok(file)
            }
            Err(e) => {
                warn!("Save failed: {}", e);
                self.notifier.emit(Notification::ProjectSaved {
                    ok: false,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Replace the session with a project read from `path`.
    ///
    /// `path` is the project directory or its `project.json`. The session
    /// is left untouched when anything in the document is invalid.
    pub fn load_project(&mut self, path: &Path) -> Result<()> {
        match self.try_load(path) {
            Ok(file) => {
                self.project_path = file
                    .parent()
                    .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
                self.notifier.emit(Notification::ProjectLoaded {
                    ok: true,
                    message: format!("Loaded {}", file.display()),
                });
                Ok(())
            }
            Err(e) => {
                warn!("Load failed: {}", e);
                self.notifier.emit(Notification::ProjectLoaded {
                    ok: false,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Load a bundled example; it is shown with no real location.
    pub fn load_example_project(&mut self, path: &Path) -> Result<()> {
        self.load_project(path)?;
        self.project_path = PathBuf::from(EXAMPLE_LOCATION);
        self.notifier.emit(Notification::ProjectInfoChanged);
        Ok(())
    }

    /// Back to the default workspace with empty history.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.sample = SampleState::default_workspace();
        self.experiment = None;
        self.experiment_skipped = false;
        self.project_info = ProjectInfo::default();
        self.project_path = self.config.project_dir.join(&self.project_info.name);
        self.project_created = false;
        self.state_changed = false;
        self.fit_results = FitResults::default();
        self.stack.clear();
        self.clamp_selection();
        self.refresh_simulation();
        for notification in [
            Notification::StructureChanged,
            Notification::ParametersChanged,
            Notification::ProjectInfoChanged,
            Notification::ProjectCreatedChanged,
            Notification::ExperimentDataRemoved,
            Notification::FitResultsChanged,
            Notification::UndoRedoStateChanged,
        ] {
            self.notifier.emit(notification);
        }
        Ok(())
    }

    /// Store the HTML report rendered by the view.
    pub fn set_report(&mut self, html: &str) {
        self.report = html.to_string();
    }

    pub fn report(&self) -> &str {
        &self.report
    }

    /// Write the stored report to `path`. Success and failure are both
    /// announced with [`Notification::ReportSaved`].
    pub fn save_report(&mut self, path: &Path) -> Result<()> {
        let written = fs::write(path, &self.report).map_err(|e| EditorError::FileWriteError {
            path: path.to_path_buf(),
            source: e,
        });
        match &written {
            Ok(()) => info!("Report saved to {}", path.display()),
            Err(e) => warn!("Report not saved: {}", e),
        }
        self.notifier.emit(Notification::ReportSaved {
            ok: written.is_ok(),
            path: path.to_path_buf(),
        });
        written
    }

    /// Current state as a project document.
    pub fn capture(&self) -> ProjectDocument {
        ProjectDocument::capture(
            &self.sample,
            self.experiment.as_ref(),
            self.experiment_skipped,
            &self.project_info,
            self.backend.interface_name(),
            self.minimizer.state(),
        )
    }

    fn try_load(&mut self, path: &Path) -> Result<PathBuf> {
        self.ensure_idle()?;
        let document = ProjectDocument::load(path)?;
        let sample = document.sample()?;
        let experiment = document.experiment()?;
        let mut minimizer = self.minimizer.clone();
        minimizer.restore(&document.minimizer)?;
        if document.interface != self.backend.interface_name() {
            warn!(
                "Project was saved with calculator '{}'; using '{}'",
                document.interface,
                self.backend.interface_name()
            );
        }
        self.backend.switch_engine(minimizer.engine())?;

        self.sample = sample;
        self.experiment = experiment;
        self.experiment_skipped = document.experiment_skipped;
        self.project_info = document.project_info;
        self.minimizer = minimizer;
        self.fit_results = FitResults::default();
        self.stack.clear();
        self.project_created = true;
        self.state_changed = false;
        self.clamp_selection();
        self.refresh_simulation();

        self.notifier.emit(Notification::StructureChanged);
        self.notifier.emit(Notification::ParametersChanged);
        self.notifier.emit(Notification::ProjectInfoChanged);
        self.notifier.emit(Notification::ProjectCreatedChanged);
        self.notifier.emit(if self.experiment.is_some() {
            Notification::ExperimentDataAdded
        } else {
            Notification::ExperimentDataRemoved
        });
        self.notifier.emit(Notification::MinimizerEngineChanged);
        self.notifier.emit(Notification::MinimizerMethodChanged);
        self.notifier.emit(Notification::StatusInfoChanged);
        self.notifier.emit(Notification::UndoRedoStateChanged);

        Ok(if path.is_dir() {
            project_file_path(path)
        } else {
            path.to_path_buf()
        })
    }
}
