//! On-disk layout for downloaded products, plus atomic write helpers.
//!
//! Downloads land under `<output_root>/<object>/`, where `<object>` is
//! `tic{n}` when the catalog row carries a secondary id and the display name
//! otherwise. Every write goes through write-to-temp-then-rename so a crash
//! mid-write never leaves a truncated file behind.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::{ObjectId, TicId};
use crate::error::DiggerError;

pub fn object_dir(output_root: &Utf8Path, object: &ObjectId) -> Utf8PathBuf {
    output_root.join(object.dir_name())
}

pub fn ensure_dir(dir: &Utf8Path) -> Result<(), DiggerError> {
    fs::create_dir_all(dir.as_std_path()).map_err(|err| DiggerError::Filesystem(err.to_string()))
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), DiggerError> {
    let parent = path
        .parent()
        .ok_or_else(|| DiggerError::Filesystem(format!("no parent directory for {path}")))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix(".harps-digger")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
    fs::write(temp.path(), content).map_err(|err| DiggerError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
    Ok(())
}

/// Provenance record written next to each object's downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadMetadata {
    pub target: String,
    pub tic: Option<TicId>,
    pub toi: Option<String>,
    pub source_urls: Vec<String>,
    pub downloaded_at: String,
    pub tool: String,
}

impl DownloadMetadata {
    pub fn new(target: &str, tic: Option<TicId>, toi: Option<String>) -> Self {
        Self {
            target: target.to_string(),
            tic,
            toi,
            source_urls: Vec::new(),
            downloaded_at: chrono::Utc::now().to_rfc3339(),
            tool: format!("harps-digger/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub fn metadata_path(object_dir: &Utf8Path) -> Utf8PathBuf {
    object_dir.join("metadata.json")
}

pub fn write_metadata(path: &Utf8Path, metadata: &DownloadMetadata) -> Result<(), DiggerError> {
    let content = serde_json::to_vec_pretty(metadata)
        .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
    write_bytes_atomic(path, &content)
}

/// TIC-namespaced object directories under `output_root`, sorted by id.
/// Name-namespaced directories are skipped; without a TIC there is nothing
/// to join against the alerts table.
pub fn list_tic_dirs(output_root: &Utf8Path) -> Result<Vec<(TicId, Utf8PathBuf)>, DiggerError> {
    let mut dirs = Vec::new();
    let entries = fs::read_dir(output_root.as_std_path())
        .map_err(|err| DiggerError::Filesystem(format!("read {output_root}: {err}")))?;
    for entry in entries {
        let entry = entry.map_err(|err| DiggerError::Filesystem(err.to_string()))?;
        if !entry.path().is_dir() {
            continue;
        }
        let path = Utf8PathBuf::from_path_buf(entry.path())
            .map_err(|path| DiggerError::Filesystem(format!("non-utf8 path {}", path.display())))?;
        let name = path.file_name().unwrap_or_default();
        if let Some(digits) = name.strip_prefix("tic") {
            if let Ok(value) = digits.parse::<u64>() {
                dirs.push((TicId(value), path));
            }
        }
    }
    dirs.sort_by_key(|(tic, _)| *tic);
    Ok(dirs)
}
