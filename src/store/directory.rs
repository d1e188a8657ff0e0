use super::{DashboardStore, StoreError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Dashboards kept as `<root>/<name>.json` files.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, name: &str) -> Result<PathBuf, StoreError> {
        if name.is_empty() || name == ".." || name.contains(['/', '\\']) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(format!("{name}.json")))
    }
}

impl DashboardStore for DirectoryStore {
    fn get_dashboard(&self, name: &str) -> Result<String, StoreError> {
        let path = self.path(name)?;
        fs::read_to_string(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => StoreError::NotFound(name.to_string()),
            _ => io_error(&path, source),
        })
    }

    fn put_dashboard(&self, name: &str, body: &str) -> Result<String, StoreError> {
        let path = self.path(name)?;
        fs::write(&path, body).map_err(|source| io_error(&path, source))?;
        Ok(format!("wrote {} bytes to {}", body.len(), path.display()))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
