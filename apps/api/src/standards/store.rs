use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::standards::defaults::default_config;
use crate::standards::models::StandardsConfig;
use crate::standards::validation::{validate_config, ConfigIssue};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("standards file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("standards file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("standards configuration has {} issue(s)", .0.len())]
    Invalid(Vec<ConfigIssue>),
}

/// The standards JSON file on disk. Reads go to the file every time so that
/// hand edits are picked up; writes are serialized and atomic.
pub struct StandardsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl StandardsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand-edited files go through the same validation as `save`.
    pub async fn load(&self) -> Result<StandardsConfig, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => {
                let config: StandardsConfig = serde_json::from_slice(&raw)?;
                if let Err(issues) = validate_config(&config) {
                    warn!(
                        "Standards file {} has {} issue(s)",
                        self.path.display(),
                        issues.len()
                    );
                    return Err(StoreError::Invalid(issues));
                }
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "No standards file at {}, using built-in defaults",
                    self.path.display()
                );
                Ok(default_config())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, config: &StandardsConfig) -> Result<(), StoreError> {
        validate_config(config).map_err(StoreError::Invalid)?;
        let body = serde_json::to_vec_pretty(config)?;

        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &body))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        info!(
            "Saved standards ({} targets) to {}",
            config.targets.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Writes the built-in defaults when no file exists, so administrators
    /// have something to edit.
    pub async fn ensure_exists(&self) -> Result<(), StoreError> {
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(());
        }
        warn!(
            "Standards file {} missing, writing defaults",
            self.path.display()
        );
        self.save(&default_config()).await
    }
}

fn write_atomically(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
