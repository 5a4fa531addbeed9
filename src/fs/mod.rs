// src/fs/mod.rs

//! Filesystem access used by config loading, provisioning and eradication.
//!
//! Everything that touches the workspace goes through [`FileSystem`] so the
//! provisioning pipeline can be exercised against [`mock::MockFileSystem`].

use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Recursively delete `path`. A missing path is not an error.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Read `path`, or write `default` there and return it when the file is
    /// missing or empty.
    fn read_or_write_default(&self, path: &Path, default: &str) -> Result<String> {
        match self.read_to_string(path) {
            Ok(contents) if !contents.is_empty() => Ok(contents),
            _ => {
                self.write(path, default.as_bytes())?;
                Ok(default.to_string())
            }
        }
    }
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
            }
        }
        fs::write(path, contents).with_context(|| format!("writing to file {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing dir {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_or_write_default_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");
        let fs = RealFileSystem;

        let first = fs.read_or_write_default(&path, "[]").unwrap();
        assert_eq!(first, "[]");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");

        std::fs::write(&path, "[1]").unwrap();
        assert_eq!(fs.read_or_write_default(&path, "[]").unwrap(), "[1]");
    }

    #[test]
    fn remove_dir_all_ignores_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        fs.remove_dir_all(&dir.path().join("nope")).unwrap();

        let sub = dir.path().join("proj").join("src");
        fs.create_dir_all(&sub).unwrap();
        fs.remove_dir_all(&dir.path().join("proj")).unwrap();
        assert!(!fs.exists(&dir.path().join("proj")));
    }
}
