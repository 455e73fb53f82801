use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("output path {0:?} is a directory")]
    TargetIsDirectory(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure the directory that will hold `target` exists; create if missing.
pub fn ensure_parent_dir(target: &Path) -> Result<PathBuf, PersistError> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if dir.exists() {
        let meta = fs::metadata(&dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(&dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(dir)
}

/// Writes `contents` to `target` through a temp file in the same directory,
/// so readers never observe a half-written export.
pub fn write_atomically(target: &Path, contents: &[u8]) -> Result<(), PersistError> {
    if target.is_dir() {
        return Err(PersistError::TargetIsDirectory(target.to_path_buf()));
    }
    let dir = ensure_parent_dir(target)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(target).map_err(|e| PersistError::Io(e.error))?;
    Ok(())
}
