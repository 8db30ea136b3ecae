use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

/// Run `f` on the next timer tick, after the current render has settled.
///
/// Structural mutations schedule focus/caret work through this; doing it
/// synchronously races the browser's own layout of the new nodes.
pub(crate) fn next_tick(f: impl FnOnce() + 'static) {
    after_ms(0, f);
}

pub(crate) fn after_ms(delay: i32, f: impl FnOnce() + 'static) {
    let Some(win) = web_sys::window() else {
        return;
    };
    let cb = Closure::once_into_js(f);
    let _ = win
        .set_timeout_with_callback_and_timeout_and_arguments_0(cb.as_ref().unchecked_ref(), delay);
}
