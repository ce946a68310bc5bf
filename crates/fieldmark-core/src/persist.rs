//! Best-effort mirroring of the field list into a key-value slot
//!
//! The slot holds the whole field list as JSON under one fixed key and is
//! overwritten on every mutation. Nothing here may fail the caller: a broken or
//! unavailable backend only costs the convenience of rehydration.

use crate::error::{FieldmarkError, Result};
use crate::field::Field;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default storage key for the field list.
pub const DEFAULT_FIELDS_KEY: &str = "pdfFormFields";

/// A string key-value slot (browser `localStorage`, a directory on disk, ...).
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Process-local store, used when nothing durable is available.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a state directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FieldmarkError::Storage(e.to_string())),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| FieldmarkError::Storage(e.to_string()))?;
        fs::write(self.path_for(key), value).map_err(|e| FieldmarkError::Storage(e.to_string()))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FieldmarkError::Storage(e.to_string())),
        }
    }
}

/// Read the persisted field list. Missing, unreadable, or malformed data yields
/// an empty list.
pub fn load_fields(store: &dyn KeyValueStore, key: &str) -> Vec<Field> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read persisted fields");
            return Vec::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring malformed persisted fields");
            Vec::new()
        }
    }
}

/// Overwrite the persisted field list. Failures are logged and swallowed.
pub fn save_fields(store: &mut dyn KeyValueStore, key: &str, fields: &[Field]) {
    let json = match serde_json::to_string(fields) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to serialize fields for persistence");
            return;
        }
    };
    if let Err(e) = store.set(key, &json) {
        tracing::warn!(key, error = %e, "Failed to persist fields");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldKind;

    /// Backend whose every call fails
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(FieldmarkError::Storage("quota exceeded".into()))
        }
        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(FieldmarkError::Storage("quota exceeded".into()))
        }
        fn remove(&mut self, _key: &str) -> Result<()> {
            Err(FieldmarkError::Storage("quota exceeded".into()))
        }
    }

    fn sample_fields() -> Vec<Field> {
        vec![
            Field::new(1, FieldKind::Text, 10.0, 20.0, 1),
            Field::new(2, FieldKind::Signature, 30.0, 40.0, 2),
        ]
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        save_fields(&mut store, DEFAULT_FIELDS_KEY, &sample_fields());
        assert_eq!(load_fields(&store, DEFAULT_FIELDS_KEY), sample_fields());
    }

    #[test]
    fn test_missing_key_loads_empty() {
        let store = MemoryStore::new();
        assert!(load_fields(&store, DEFAULT_FIELDS_KEY).is_empty());
    }

    #[test]
    fn test_malformed_data_loads_empty() {
        let mut store = MemoryStore::new();
        store.set(DEFAULT_FIELDS_KEY, "{not json").unwrap();
        assert!(load_fields(&store, DEFAULT_FIELDS_KEY).is_empty());
    }

    #[test]
    fn test_broken_backend_is_swallowed() {
        let mut store = BrokenStore;
        save_fields(&mut store, DEFAULT_FIELDS_KEY, &sample_fields());
        assert!(load_fields(&store, DEFAULT_FIELDS_KEY).is_empty());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("fieldmark-store-{}", std::process::id()));
        let mut store = FileStore::new(&dir);

        assert_eq!(store.get("fields").unwrap(), None);
        save_fields(&mut store, "fields", &sample_fields());
        assert_eq!(load_fields(&store, "fields"), sample_fields());

        store.remove("fields").unwrap();
        assert_eq!(store.get("fields").unwrap(), None);
        store.remove("fields").unwrap();

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_sanitizes_keys() {
        let store = FileStore::new("/tmp/state");
        assert_eq!(
            store.path_for("../escape/key"),
            PathBuf::from("/tmp/state/___escape_key.json")
        );
    }
}
