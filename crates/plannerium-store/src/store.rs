//! File-backed project store: one pretty-printed JSON file per project.
//!
//! Writes go to a temp file in the same directory and are renamed into
//! place, so readers never see a half-written project. Concurrent saves
//! under one name race; the last rename wins.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::StoreError;
use crate::config::StoreConfig;
use crate::models::{ProjectName, SavedProject, TimeTracking};

#[derive(Debug, Clone)]
pub struct ProjectStore {
    config: StoreConfig,
}

impl ProjectStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Persist `project` under `name`, replacing any previous version.
    pub async fn save(&self, name: &str, project: &SavedProject) -> Result<PathBuf, StoreError> {
        let name = ProjectName::parse(name)?;
        let dir = self.config.dir.clone();
        let path = self.config.project_path(name.as_str());
        let bytes = serde_json::to_vec_pretty(project)?;

        fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::io(&dir, source))?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &bytes))
            .await
            .map_err(|e| StoreError::Background(e.to_string()))??;

        tracing::info!(project = %name, path = %path.display(), "project saved");
        Ok(path)
    }

    /// Load the project saved under `name`, or `None` if there is none.
    pub async fn load(&self, name: &str) -> Result<Option<SavedProject>, StoreError> {
        let name = ProjectName::parse(name)?;
        let path = self.config.project_path(name.as_str());

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::io(&path, source)),
        };

        let project = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            name: name.to_string(),
            source,
        })?;
        Ok(Some(project))
    }

    /// Names of all saved projects, sorted.
    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        let dir = &self.config.dir;
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::io(dir, source)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| StoreError::io(dir, source))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Skips leftover temp files and anything else we would not write.
            if ProjectName::parse(stem).is_ok() {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove a saved project. Returns whether it existed.
    pub async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let name = ProjectName::parse(name)?;
        let path = self.config.project_path(name.as_str());
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(project = %name, "project deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::io(&path, source)),
        }
    }

    /// Replace the tracking state of a saved project.
    pub async fn update_tracking(
        &self,
        name: &str,
        tracking: TimeTracking,
    ) -> Result<SavedProject, StoreError> {
        let mut project = self
            .load(name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_owned()))?;
        project.time_tracking = Some(tracking);
        self.save(name, &project).await?;
        Ok(project)
    }
}

fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".plannerium-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|source| StoreError::io(dir, source))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|source| StoreError::io(tmp.path(), source))?;
    tmp.persist(target)
        .map_err(|e| StoreError::io(target, e.error))?;
    Ok(())
}
