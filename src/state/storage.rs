// File system operations for evidence attachments
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::StoreConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source file not found: {0}")]
    SourceNotFound(PathBuf),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A file copied into the attachments directory
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Path relative to the project root, always `/`-separated
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub bytes: u64,
}

/// Get (creating if needed) the attachments directory of a project
pub fn attachments_dir(root: &Path, config: &StoreConfig) -> StorageResult<PathBuf> {
    let dir = root.join(&config.attachments_dir);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}

/// Copy `source` into the attachments directory as `<id>_<sanitized name>`
pub fn store_attachment(
    root: &Path,
    config: &StoreConfig,
    id: &str,
    file_name: &str,
    source: &Path,
) -> StorageResult<StoredFile> {
    if !source.is_file() {
        return Err(StorageError::SourceNotFound(source.to_path_buf()));
    }

    let dir = attachments_dir(root, config)?;
    let stored_name = format!("{}_{}", id, sanitize_file_name(file_name));
    let absolute_path = dir.join(&stored_name);
    let bytes = fs::copy(source, &absolute_path)?;

    Ok(StoredFile {
        relative_path: format!("{}/{}", config.attachments_dir, stored_name),
        absolute_path,
        bytes,
    })
}

/// Resolve a stored relative path against the project root
pub fn resolve_stored_path(root: &Path, relative_path: &str) -> PathBuf {
    relative_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

/// Delete a stored file; returns whether a file was actually removed
pub fn remove_stored_file(root: &Path, relative_path: &str) -> StorageResult<bool> {
    let path = resolve_stored_path(root, relative_path);
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(&path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("screen shot (1).png"), "screen_shot__1_.png");
        assert_eq!(sanitize_file_name("log-2024_01.txt"), "log-2024_01.txt");
        assert_eq!(sanitize_file_name("résumé.pdf"), "r_sum_.pdf");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn test_store_and_remove_attachment() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.txt");
        fs::write(&source, b"evidence bytes").unwrap();

        let root = temp_dir.path().join("project");
        let config = StoreConfig::default();
        let stored = store_attachment(&root, &config, "abc", "my log.txt", &source).unwrap();

        assert_eq!(stored.relative_path, "attachments/abc_my_log.txt");
        assert_eq!(stored.bytes, 14);
        assert_eq!(fs::read(&stored.absolute_path).unwrap(), b"evidence bytes");

        assert!(remove_stored_file(&root, &stored.relative_path).unwrap());
        assert!(!remove_stored_file(&root, &stored.relative_path).unwrap());
    }

    #[test]
    fn test_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let result = store_attachment(
            temp_dir.path(),
            &StoreConfig::default(),
            "abc",
            "x.txt",
            &temp_dir.path().join("nope.txt"),
        );
        assert!(matches!(result, Err(StorageError::SourceNotFound(_))));
    }
}
