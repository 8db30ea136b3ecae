use crate::util::now_ms;
use serde::{Deserialize, Serialize};

pub(crate) const DOC_KEY: &str = "versenote_document";

/// Page-provided configuration, read from `window.ENV` when the host page
/// defines it.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct EnvConfig {
    pub autosave_ms: i32,
}

impl EnvConfig {
    pub fn new() -> Self {
        let default_autosave_ms = 1200;

        if let Some(window) = web_sys::window() {
            if let Some(env) = window.get("ENV") {
                if !env.is_undefined() && env.is_object() {
                    if let Ok(ms) = js_sys::Reflect::get(&env, &"AUTOSAVE_MS".into()) {
                        if let Some(ms) = ms.as_f64() {
                            // Sub-100ms debounces would write on nearly
                            // every keystroke.
                            if ms >= 100.0 {
                                return Self {
                                    autosave_ms: ms as i32,
                                };
                            }
                        }
                    }
                }
            }
        }

        Self {
            autosave_ms: default_autosave_ms,
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Envelope around the serialized surface. The document itself is an HTML
/// string; the envelope carries the metadata a later remote layer would
/// need to reconcile against.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct DocSnapshot {
    pub saved_ms: i64,
    #[serde(default)]
    pub title: Option<String>,
    pub html: String,
}

pub(crate) fn load_json_from_storage<T: for<'de> Deserialize<'de>>(key: &str) -> Option<T> {
    let storage = web_sys::window().and_then(|w| w.local_storage().ok().flatten())?;
    let json = storage.get_item(key).ok().flatten()?;
    serde_json::from_str(&json).ok()
}

pub(crate) fn save_json_to_storage<T: Serialize>(key: &str, value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
            let _ = storage.set_item(key, &json);
        }
    }
}

/// Persistence hook: the host saves whatever the surface serialized to.
pub(crate) fn save_document(title: Option<String>, html: &str) {
    let snapshot = DocSnapshot {
        saved_ms: now_ms(),
        title,
        html: html.to_string(),
    };
    save_json_to_storage(DOC_KEY, &snapshot);
}

pub(crate) fn load_document() -> Option<DocSnapshot> {
    load_json_from_storage::<DocSnapshot>(DOC_KEY)
}

pub(crate) fn clear_document() {
    if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
        let _ = storage.remove_item(DOC_KEY);
    }
}

// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` +
// wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_env_config_falls_back_to_default() {
        // No window.ENV in the test page.
        let cfg = EnvConfig::new();
        assert_eq!(cfg.autosave_ms, 1200);
    }

    #[wasm_bindgen_test]
    fn test_document_snapshot_roundtrip() {
        clear_document();
        assert!(load_document().is_none());

        save_document(Some("Week 12".to_string()), "<p>notes</p>");
        let snap = load_document().expect("snapshot should load back");
        assert_eq!(snap.title.as_deref(), Some("Week 12"));
        assert_eq!(snap.html, "<p>notes</p>");
        assert!(snap.saved_ms > 0);

        clear_document();
        assert!(load_document().is_none());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_envelope_serializes_round_trip() {
        let snap = DocSnapshot {
            saved_ms: 1722850000000,
            title: Some("Romans 8".to_string()),
            html: "<p>no condemnation</p>".to_string(),
        };
        let json = serde_json::to_string(&snap).expect("should serialize");
        let back: DocSnapshot = serde_json::from_str(&json).expect("should parse");
        assert_eq!(back.saved_ms, snap.saved_ms);
        assert_eq!(back.title, snap.title);
        assert_eq!(back.html, snap.html);
    }

    #[test]
    fn test_snapshot_title_defaults_to_none() {
        // Older snapshots predate the title field.
        let json = r#"{"saved_ms": 1, "html": "<p></p>"}"#;
        let snap: DocSnapshot = serde_json::from_str(json).expect("should parse");
        assert!(snap.title.is_none());
    }
}
