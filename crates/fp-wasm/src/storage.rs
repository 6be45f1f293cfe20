//! Browser `localStorage` as a recovery sink.

use fp_editor::DocumentSink;
use fp_editor::PersistError;
use wasm_bindgen::JsValue;
use web_sys::Storage;

/// Writes the recovery copy under one `localStorage` key.
pub struct LocalStorageSink {
    storage: Storage,
    key: String,
}

impl LocalStorageSink {
    /// `None` when the page has no window or storage is disabled
    /// (private browsing, sandboxed iframes).
    pub fn open(key: &str) -> Option<Self> {
        let storage = web_sys::window()?.local_storage().ok()??;
        Some(Self {
            storage,
            key: key.to_string(),
        })
    }
}

fn js_error(err: JsValue) -> PersistError {
    PersistError::Io(std::io::Error::other(format!("localStorage: {err:?}")))
}

impl DocumentSink for LocalStorageSink {
    fn write(&mut self, json: &str) -> Result<(), PersistError> {
        self.storage.set_item(&self.key, json).map_err(js_error)
    }

    fn read(&self) -> Result<Option<String>, PersistError> {
        self.storage.get_item(&self.key).map_err(js_error)
    }
}
