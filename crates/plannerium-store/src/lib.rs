//! Persistence for generated plans: named JSON projects on local disk.

pub mod config;
pub mod models;
pub mod store;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use config::StoreConfig;
pub use models::{ProjectName, SavedProject, TimeTracking};
pub use store::ProjectStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid project name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("project {0:?} not found")]
    NotFound(String),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("project {name:?} is not valid JSON: {source}")]
    Corrupt {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode project: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("background write failed: {0}")]
    Background(String),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
