use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("directory missing or not writable: {0}")]
    Dir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("could not parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("could not serialize: {0}")]
    Serialize(String),
}

/// Creates `dir` if missing and probes that it is writable.
pub fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| StoreError::Dir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(StoreError::Dir(format!("{} is not a directory", dir.display())));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| StoreError::Dir(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| StoreError::Dir(e.to_string()))?;
    Ok(())
}

/// Replaces `target` with `content` by writing a sibling temp file and
/// renaming it over the target. The rename replaces an existing file in one
/// step, so readers see either the old content or the new one.
pub fn write_atomic(target: &Path, content: &[u8]) -> Result<(), StoreError> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    ensure_dir(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;

    tmp.persist(target).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_directories() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("nested/dir/file.bin");
        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"second");
    }

    #[test]
    fn overwrite_replaces_in_place_without_leftovers() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("credentials.ron");
        fs::write(&target, "old").unwrap();
        write_atomic(&target, b"new").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
        let entries = fs::read_dir(root.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn refuses_a_file_as_directory() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let err = write_atomic(&blocker.join("file"), b"data").unwrap_err();
        assert!(matches!(err, StoreError::Dir(_)));
    }
}
