use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use log::{debug, trace, warn};

use crate::error::{Error, Result};

/// Sample payloads served inside exchanges, keyed by file name.
///
/// Loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    root: Option<PathBuf>,
    files: HashMap<String, Bytes>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every regular file directly under `path`.
    ///
    /// A missing directory yields an empty store so that the built-in pages
    /// can still be served.
    pub fn load_dir(path: &Path) -> Result<Self> {
        let mut store = Self {
            root: Some(path.to_path_buf()),
            files: HashMap::new(),
        };

        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Content directory {} does not exist.", path.display());
                return Ok(store);
            }
            Err(e) => {
                return Err(Error::config(format!(
                    "failed to list {}: {e}",
                    path.display()
                )))
            }
        };

        for entry in entries {
            let entry = entry
                .map_err(|e| Error::config(format!("failed to list {}: {e}", path.display())))?;
            let file_path = entry.path();
            if !file_path.is_file() {
                continue;
            }
            let Some(name) = file_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let blob = fs::read(&file_path).map_err(|e| {
                Error::config(format!("failed to read {}: {e}", file_path.display()))
            })?;
            trace!("loaded {name}. size: {}", blob.len());
            store.files.insert(name.to_owned(), Bytes::from(blob));
        }

        debug!(
            "Loaded {} content file(s) from {}.",
            store.files.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn insert(&mut self, name: impl Into<String>, blob: impl Into<Bytes>) {
        self.files.insert(name.into(), blob.into());
    }

    pub fn get(&self, name: &str) -> Option<&Bytes> {
        self.files.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Directory the store was loaded from, for diagnostics.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_files_from_directory() {
        let dir = std::env::temp_dir().join(format!("sxg-content-{}", std::process::id()));
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("v0.js"), b"console.log(1);").unwrap();
        fs::write(dir.join("nested").join("skipped.txt"), b"x").unwrap();

        let store = ContentStore::load_dir(&dir).unwrap();

        assert_eq!(store.get("v0.js").unwrap().as_ref(), b"console.log(1);");
        assert!(!store.contains("nested"));
        assert!(!store.contains("skipped.txt"));
        assert_eq!(store.root(), Some(dir.as_path()));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory_is_empty() {
        let store = ContentStore::load_dir(Path::new("/definitely/not/here")).unwrap();
        assert!(!store.contains("v0.js"));
    }

    #[test]
    fn insert_and_get() {
        let mut store = ContentStore::new();
        store.insert("a.css", Bytes::from_static(b""));

        assert!(store.contains("a.css"));
        assert!(store.get("a.css").unwrap().is_empty());
        assert!(store.get("b.css").is_none());
    }
}
