//! Project selection and on-disk layout

use crate::config::ScreenConfig;
use crate::errors::{ScreenError, ScreenResult};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

lazy_static! {
    static ref PROJECT_NAME_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap();
}

/// File holding a project's descriptor table
pub const DESCRIPTOR_FILE: &str = "descriptors.csv";
pub const DECOMPOSITION_FILE: &str = "energy_decomposition.csv";

/// Which project an analysis runs against, and where projects live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub project: String,
    pub data_dir: PathBuf,
}

pub fn validate_project_name(name: &str) -> ScreenResult<()> {
    if PROJECT_NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(ScreenError::invalid_input(
            "project",
            format!("'{name}' must be 1-64 characters of letters, digits, '-' or '_'"),
        ))
    }
}

impl ProjectContext {
    pub fn new(project: &str, data_dir: impl Into<PathBuf>) -> ScreenResult<Self> {
        validate_project_name(project)?;
        Ok(Self {
            project: project.to_string(),
            data_dir: data_dir.into(),
        })
    }

    pub fn from_config(project: &str, config: &ScreenConfig) -> ScreenResult<Self> {
        Self::new(project, &config.data_dir)
    }

    pub fn project_dir(&self) -> PathBuf {
        self.data_dir.join(&self.project)
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.project_dir().join(DESCRIPTOR_FILE)
    }

    pub fn decomposition_path(&self) -> PathBuf {
        self.project_dir().join(DECOMPOSITION_FILE)
    }

    /// Cache key; distinct data directories never share entries
    pub fn cache_key(&self) -> String {
        format!("{}::{}", self.data_dir.display(), self.project)
    }

    pub fn summary_string(&self) -> String {
        format!("project={} path={}", self.project, self.descriptor_path().display())
    }
}

/// Project directories under `data_dir` that hold a descriptor table, sorted by name.
/// A missing data directory has no projects.
pub fn list_projects(data_dir: &Path) -> ScreenResult<Vec<String>> {
    if !data_dir.exists() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(data_dir)
        .map_err(|e| ScreenError::io(format!("list projects in {}", data_dir.display()), e))?;

    let mut projects = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ScreenError::io("read project entry", e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if PROJECT_NAME_PATTERN.is_match(&name) && entry.path().join(DESCRIPTOR_FILE).is_file() {
            projects.push(name);
        }
    }
    projects.sort();
    Ok(projects)
}
