//! JavaScript bindings
//!
//! Exposes the store to page scripts as `ClaimStorage`. Documents cross the
//! boundary as JSON strings.

use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::consts::*;
use crate::document::ClaimDocument;
use crate::persistence::{BackupReason, ClaimStore, export_file_name};
use crate::platform::{Clock, LocalStorageBackend, SystemClock};

#[wasm_bindgen]
pub struct ClaimStorage {
    inner: ClaimStore<LocalStorageBackend>,
}

#[wasm_bindgen]
impl ClaimStorage {
    /// Open the store over the window's LocalStorage
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<ClaimStorage, JsValue> {
        let backend = LocalStorageBackend::open().map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(Self {
            inner: ClaimStore::new(backend),
        })
    }

    #[wasm_bindgen(getter)]
    pub fn version(&self) -> u32 {
        SCHEMA_VERSION
    }

    pub fn load(&self) -> String {
        to_json(&self.inner.load())
    }

    /// Save a full document; rejects JSON that is not a root document
    pub fn save(&self, json: &str) -> bool {
        match serde_json::from_str::<ClaimDocument>(json) {
            Ok(doc) => self.inner.save(&doc),
            Err(e) => {
                log::warn!("Rejected save: {}", e);
                false
            }
        }
    }

    #[wasm_bindgen(js_name = getSection)]
    pub fn get_section(&self, name: &str) -> Option<String> {
        self.inner.get_section_by_name(name).map(|v| to_json(&v))
    }

    #[wasm_bindgen(js_name = setSection)]
    pub fn set_section(&self, name: &str, json: &str) -> bool {
        match serde_json::from_str::<Value>(json) {
            Ok(value) => self.inner.set_section_by_name(name, value),
            Err(e) => {
                log::warn!("Rejected section {}: {}", name, e);
                false
            }
        }
    }

    /// Create a backup (`reason` defaults to "manual")
    pub fn backup(&self, reason: Option<String>) -> bool {
        let reason = reason
            .and_then(|r| r.parse::<BackupReason>().ok())
            .unwrap_or_default();
        self.inner.backup(reason)
    }

    #[wasm_bindgen(js_name = listBackups)]
    pub fn list_backups(&self) -> String {
        to_json(&self.inner.list_backups())
    }

    #[wasm_bindgen(js_name = restoreBackup)]
    pub fn restore_backup(&self, id: f64) -> bool {
        self.inner.restore_backup(id as i64)
    }

    pub fn validate(&self) -> bool {
        self.inner.validate()
    }

    pub fn reindex(&self) -> String {
        to_json(&self.inner.reindex())
    }

    #[wasm_bindgen(js_name = purgeAll)]
    pub fn purge_all(&self) -> bool {
        self.inner.purge_all()
    }

    /// Download the current document as an export file
    #[wasm_bindgen(js_name = exportAsJson)]
    pub fn export_as_json(&self) -> bool {
        let Some(json) = self.inner.export_as_json() else {
            return false;
        };
        let file_name = export_file_name(SystemClock.now_ms());
        match download(&file_name, &json) {
            Ok(()) => {
                log::info!("Claim data exported to {}", file_name);
                true
            }
            Err(e) => {
                log::error!("Export download failed: {:?}", e);
                false
            }
        }
    }

    #[wasm_bindgen(js_name = importJson)]
    pub fn import_json(&self, json: &str) -> bool {
        self.inner.import_json(json)
    }

    #[wasm_bindgen(js_name = createSnapshot)]
    pub fn create_snapshot(&self, label: Option<String>) -> bool {
        self.inner
            .create_snapshot(label.as_deref().unwrap_or_default())
            .is_some()
    }

    #[wasm_bindgen(js_name = listSnapshots)]
    pub fn list_snapshots(&self) -> String {
        to_json(&self.inner.list_snapshots())
    }

    #[wasm_bindgen(js_name = restoreSnapshot)]
    pub fn restore_snapshot(&self, id: f64) -> bool {
        self.inner.restore_snapshot(id as i64)
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        log::error!("Failed to encode response: {}", e);
        "null".to_string()
    })
}

/// Offer `contents` to the user as a JSON file download
fn download(file_name: &str, contents: &str) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or("no window")?;
    let document = window.document().ok_or("no document")?;
    let body = document.body().ok_or("no body")?;

    let parts = js_sys::Array::of1(&JsValue::from_str(contents));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type("application/json");
    let blob = web_sys::Blob::new_with_str_sequence_and_options(&parts, &options)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob)?;

    let anchor: web_sys::HtmlAnchorElement = document
        .create_element("a")?
        .dyn_into()
        .map_err(JsValue::from)?;
    anchor.set_href(&url);
    anchor.set_download(file_name);
    body.append_child(&anchor)?;
    anchor.click();
    body.remove_child(&anchor)?;
    web_sys::Url::revoke_object_url(&url)?;
    Ok(())
}
