//! `window.localStorage` as a field-list slot

use fieldmark_core::error::{FieldmarkError, Result};
use fieldmark_core::{KeyValueStore, MemoryStore};

fn js_error(e: wasm_bindgen::JsValue) -> FieldmarkError {
    FieldmarkError::Storage(e.as_string().unwrap_or_else(|| format!("{:?}", e)))
}

pub struct LocalStorage {
    storage: web_sys::Storage,
}

impl LocalStorage {
    /// `None` when storage is unavailable (private mode, sandboxed iframe)
    pub fn open() -> Option<Self> {
        let window = web_sys::window()?;
        let storage = window.local_storage().ok()??;
        Some(Self { storage })
    }
}

impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage.get_item(key).map_err(js_error)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.storage.set_item(key, value).map_err(js_error)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.storage.remove_item(key).map_err(js_error)
    }
}

/// localStorage when the browser allows it, otherwise an in-memory slot
pub fn best_available() -> Box<dyn KeyValueStore> {
    match LocalStorage::open() {
        Some(storage) => Box::new(storage),
        None => {
            web_sys::console::warn_1(&"localStorage unavailable; fields will not survive a reload".into());
            Box::new(MemoryStore::new())
        }
    }
}
