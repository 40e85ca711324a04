use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

fn parent_dir(destination: &Path) -> PathBuf {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Creates `{destination}.<random>.tmp` next to `destination`.
///
/// The temp file is deleted on drop unless it is handed to [`commit_staged`].
pub fn stage_beside(destination: &Path) -> Result<NamedTempFile, PersistError> {
    let dir = parent_dir(destination);
    ensure_output_dir(&dir)?;
    let prefix = match destination.file_name() {
        Some(name) => format!("{}.", name.to_string_lossy()),
        None => ".merge.".to_string(),
    };
    let tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(&dir)?;
    Ok(tmp)
}

/// Flushes `staged` and moves it over `destination`, replacing any existing file.
pub fn commit_staged(mut staged: NamedTempFile, destination: &Path) -> Result<(), PersistError> {
    staged.flush()?;
    staged.as_file_mut().sync_all()?;

    if destination.exists() {
        fs::remove_file(destination)?;
    }
    staged
        .persist(destination)
        .map_err(|e| PersistError::Io(e.error))?;
    Ok(())
}

/// Atomically write `content` to `destination` by writing a temp file then renaming.
pub fn write_atomically(destination: &Path, content: &[u8]) -> Result<(), PersistError> {
    let mut staged = stage_beside(destination)?;
    staged.write_all(content)?;
    commit_staged(staged, destination)
}
