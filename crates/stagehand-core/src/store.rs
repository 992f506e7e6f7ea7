//! Config file access and installed-record persistence.

use crate::error::{Result, StagehandError};
use crate::{io, paths};
use std::path::{Path, PathBuf};

pub trait ConfigStore: Send + Sync {
    /// Project root that relative paths are resolved against.
    fn root(&self) -> &Path;

    fn read_yaml(&self, path: &Path) -> Result<Vec<u8>>;

    fn write_installed_record(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Every installed record as `(app name, bytes)`.
    fn list_installed_records(&self) -> Result<Vec<(String, Vec<u8>)>>;
}

/// Filesystem store rooted at a project directory.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    root: PathBuf,
}

impl FsConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl ConfigStore for FsConfigStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn read_yaml(&self, path: &Path) -> Result<Vec<u8>> {
        let path = self.absolute(path);
        if !path.exists() {
            return Err(StagehandError::ConfigNotFound(path.display().to_string()));
        }
        Ok(std::fs::read(&path)?)
    }

    fn write_installed_record(&self, name: &str, data: &[u8]) -> Result<()> {
        paths::validate_app_name(name)?;
        io::atomic_write(&paths::installed_record_path(&self.root, name), data)
    }

    fn list_installed_records(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let dir = paths::installed_apps_dir(&self.root);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            records.push((name.to_string(), std::fs::read(&path)?));
        }
        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn read_relative_and_absolute() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("plan.yaml"), "a: 1").unwrap();
        let store = FsConfigStore::new(dir.path());
        assert_eq!(store.read_yaml(Path::new("plan.yaml")).unwrap(), b"a: 1");
        assert_eq!(
            store.read_yaml(&dir.path().join("plan.yaml")).unwrap(),
            b"a: 1"
        );
    }

    #[test]
    fn read_missing_is_config_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FsConfigStore::new(dir.path());
        let err = store.read_yaml(Path::new("nope.yaml")).unwrap_err();
        assert!(matches!(err, StagehandError::ConfigNotFound(_)));
    }

    #[test]
    fn write_then_list_records() {
        let dir = TempDir::new().unwrap();
        let store = FsConfigStore::new(dir.path());
        store.write_installed_record("zeta", b"name: zeta").unwrap();
        store.write_installed_record("alpha", b"name: alpha").unwrap();
        std::fs::write(
            paths::installed_apps_dir(dir.path()).join("notes.txt"),
            "ignored",
        )
        .unwrap();

        let records = store.list_installed_records().unwrap();
        let names: Vec<_> = records.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(dir.path().join(".stagehand/tmp/apps/alpha.yaml").exists());
    }

    #[test]
    fn write_rejects_unsafe_names() {
        let dir = TempDir::new().unwrap();
        let store = FsConfigStore::new(dir.path());
        assert!(store.write_installed_record("../escape", b"x").is_err());
    }

    #[test]
    fn list_without_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FsConfigStore::new(dir.path());
        assert!(store.list_installed_records().unwrap().is_empty());
    }
}
