//! Collaborators supplied by whatever hosts the search popup.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info};

use crate::model::types::CardFile;

/// Host ingestion entry point for downloaded cards.
pub trait CardImporter: Send + Sync {
    fn import(&self, files: Vec<CardFile>) -> Result<Vec<PathBuf>>;
}

/// Non-fatal, user-visible notifications.
pub trait Notifier: Send + Sync {
    fn error(&self, title: &str, detail: &str);
}

/// Drops cards into a directory the host watches.
#[derive(Debug)]
pub struct DirectoryImporter {
    dir: PathBuf,
    imported: Mutex<Vec<PathBuf>>,
}

impl DirectoryImporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            imported: Mutex::new(Vec::new()),
        }
    }

    /// Every path written so far, oldest first.
    pub fn imported(&self) -> Vec<PathBuf> {
        self.imported
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

impl CardImporter for DirectoryImporter {
    fn import(&self, files: Vec<CardFile>) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating import directory {}", self.dir.display()))?;
        let mut written = Vec::with_capacity(files.len());
        for file in files {
            let path = self.dir.join(&file.name);
            std::fs::write(&path, &file.bytes)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), media_type = %file.media_type, bytes = file.bytes.len(), "card imported");
            written.push(path);
        }
        if let Ok(mut log) = self.imported.lock() {
            log.extend(written.iter().cloned());
        }
        Ok(written)
    }
}

/// Reports notifications through the log (CLI runs).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, title: &str, detail: &str) {
        error!(detail = detail, "{title}");
    }
}
