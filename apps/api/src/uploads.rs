//! Uploaded model files on disk.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file selected")]
    MissingFile,

    #[error("only .ifc files are accepted, got '{0}'")]
    NotIfc(String),

    #[error("could not store upload {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub id: Uuid,
    /// Sanitized client file name, without the id prefix.
    pub file_name: String,
    pub path: PathBuf,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<(), UploadError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| UploadError::Io {
                path: self.dir.display().to_string(),
                source,
            })
    }

    /// Writes `bytes` as `<uuid>_<sanitized name>`.
    pub async fn save(&self, original_name: &str, bytes: &Bytes) -> Result<StoredUpload, UploadError> {
        let file_name = validate_ifc_name(original_name)?;
        self.ensure_dir().await?;

        let id = Uuid::new_v4();
        let path = self.dir.join(format!("{id}_{file_name}"));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| UploadError::Io {
                path: path.display().to_string(),
                source,
            })?;

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(StoredUpload {
            id,
            file_name,
            path,
            size: bytes.len(),
        })
    }
}

/// Sanitizes a client file name and requires the `.ifc` extension.
pub fn validate_ifc_name(original_name: &str) -> Result<String, UploadError> {
    if original_name.trim().is_empty() {
        return Err(UploadError::MissingFile);
    }
    let file_name = sanitize_file_name(original_name);
    if !is_ifc(&file_name) {
        return Err(UploadError::NotIfc(original_name.to_string()));
    }
    Ok(file_name)
}

pub fn is_ifc(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case("ifc"))
}

/// Keeps the last path component, drops `..`, and maps everything outside
/// `[A-Za-z0-9._-]` to `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let base = base.replace("..", "");
    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches(|c: char| c == '.' || c == '_').to_string()
}
