use crate::outline::html::serialize_document;
use crate::state::AppContext;
use crate::storage::{save_document, EnvConfig};
use leptos::ev;
use leptos::prelude::*;
use std::sync::{Arc, Mutex};
use wasm_bindgen::JsCast;

/// Debounced localStorage autosave for the editing surface.
///
/// Responsibilities:
/// - debounce timer per burst of document/title changes
/// - best-effort pagehide flush
///
/// Non-responsibilities:
/// - outline UI state (editing location, focus, etc.)
#[derive(Clone)]
pub(crate) struct DocAutosave {
    app_state: AppContext,

    autosave_ms: i32,
    timer: Arc<Mutex<Option<i32>>>,

    /// Global listener (keep the handle alive).
    _pagehide_handle: StoredValue<Option<WindowListenerHandle>>,
}

impl DocAutosave {
    pub fn new(app_state: AppContext) -> Self {
        let s = Self {
            app_state,
            autosave_ms: EnvConfig::new().autosave_ms,
            timer: Arc::new(Mutex::new(None)),
            _pagehide_handle: StoredValue::new(None),
        };
        s.start_pagehide_listener();
        s
    }

    /// Called on every document or title change; restarts the debounce.
    pub fn schedule(&self) {
        let Some(win) = web_sys::window() else {
            return;
        };

        if let Ok(mut slot) = self.timer.lock() {
            if let Some(tid) = slot.take() {
                win.clear_timeout_with_handle(tid);
            }
        }

        let s2 = self.clone();
        let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
            s2.flush();
        });

        let tid = win
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                cb.as_ref().unchecked_ref(),
                self.autosave_ms,
            )
            .unwrap_or(0);

        if let Ok(mut slot) = self.timer.lock() {
            *slot = Some(tid);
        }
    }

    pub fn flush(&self) {
        let html = self
            .app_state
            .0
            .document
            .with_untracked(|doc| serialize_document(doc));
        let title = self.app_state.0.doc_title.get_untracked();
        let title = if title.trim().is_empty() {
            None
        } else {
            Some(title)
        };
        save_document(title, &html);
    }

    fn start_pagehide_listener(&self) {
        let s2 = self.clone();
        let pagehide =
            window_event_listener(ev::pagehide, move |_ev: web_sys::PageTransitionEvent| {
                s2.flush();
            });
        self._pagehide_handle.set_value(Some(pagehide));
    }
}
