use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::audio::Container;

const ARTIFACT_STEM: &str = "recording";

/// The single persisted recording. Every new recording overwrites it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    path: PathBuf,
}

impl Artifact {
    pub fn new(documents_dir: &Path, container: Container) -> Self {
        let file_name = format!("{}.{}", ARTIFACT_STEM, container.extension());
        Self {
            path: documents_dir.join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// `$XDG_DATA_HOME/taprec`, falling back to `~/.local/share/taprec`
pub fn default_documents_dir() -> Result<PathBuf> {
    let data_dir = if let Ok(dir) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(dir)
    } else {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        PathBuf::from(home).join(".local").join("share")
    };

    Ok(data_dir.join("taprec"))
}

/// Make sure the documents directory exists before anything records into it
pub fn prepare_documents_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create documents directory: {:?}", dir))
}
