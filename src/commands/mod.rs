use std::sync::Arc;

use leptos::prelude::*;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

use crate::components::hooks::use_random::use_random_id_for;
use crate::state::AppContext;
use crate::toolbar::{register_when_ready, ToolbarPlugin, ToolbarRegistry, SPLIT_SLOT_INDEX};

/// Class names marking outline structure in the live DOM, the same markers
/// the serializer writes. The list command refuses to run anywhere under
/// one of these.
pub(crate) const OUTLINE_MARKER_CLASSES: [&str; 4] = [
    "toggle-block",
    "toggle-title",
    "toggle-body",
    "toggle-children",
];

/// Pure half of the list-formatting exclusion: true when any class in the
/// selection anchor's ancestor chain is an outline marker.
pub(crate) fn chain_has_outline_marker<'a>(
    ancestor_classes: impl IntoIterator<Item = &'a str>,
) -> bool {
    ancestor_classes
        .into_iter()
        .any(|class| OUTLINE_MARKER_CLASSES.contains(&class))
}

fn page_document() -> Option<web_sys::Document> {
    web_sys::window()?.document()
}

fn exec(command: &str, value: Option<&str>) -> bool {
    let Some(doc) = page_document() else {
        return false;
    };
    match value {
        Some(v) => doc
            .exec_command_with_show_ui_and_value(command, false, v)
            .unwrap_or(false),
        None => doc.exec_command(command).unwrap_or(false),
    }
}

fn query_state(command: &str) -> bool {
    page_document()
        .map(|d| d.query_command_state(command).unwrap_or(false))
        .unwrap_or(false)
}

/// Walk the selection anchor's ancestors looking for an outline marker.
pub(crate) fn selection_inside_outline() -> bool {
    let Some(win) = web_sys::window() else {
        return false;
    };
    let Ok(Some(selection)) = win.get_selection() else {
        return false;
    };
    let Some(anchor) = selection.anchor_node() else {
        return false;
    };

    let mut current = if anchor.node_type() == web_sys::Node::ELEMENT_NODE {
        anchor.dyn_into::<web_sys::Element>().ok()
    } else {
        anchor.parent_element()
    };

    while let Some(el) = current {
        let classes = el.class_list();
        for i in 0..classes.length() {
            if let Some(class) = classes.item(i) {
                if chain_has_outline_marker([class.as_str()]) {
                    return true;
                }
            }
        }
        current = el.parent_element();
    }
    false
}

/// One native rich-text command behind a toolbar button.
pub(crate) struct FormattingCommand {
    command: &'static str,
    button_id: String,
    /// Hard exclusion inside outline nodes: the native toggle is never
    /// invoked there, and the button renders disabled.
    outline_excluded: bool,
}

impl FormattingCommand {
    fn new(command: &'static str, button_id: String, outline_excluded: bool) -> Self {
        Self {
            command,
            button_id,
            outline_excluded,
        }
    }

    fn button(&self) -> Option<web_sys::Element> {
        page_document()?.get_element_by_id(&self.button_id)
    }
}

impl ToolbarPlugin for FormattingCommand {
    fn attach(&self) {
        let Some(button) = self.button() else {
            return;
        };

        let command = self.command;
        let excluded = self.outline_excluded;
        // mousedown keeps the surface selection alive while the command runs.
        let cb = Closure::wrap(Box::new(move |ev: web_sys::MouseEvent| {
            ev.prevent_default();
            if excluded && selection_inside_outline() {
                return;
            }
            exec(command, None);
        }) as Box<dyn FnMut(web_sys::MouseEvent)>);
        let _ = button.add_event_listener_with_callback("mousedown", cb.as_ref().unchecked_ref());
        // The listener lives exactly as long as the slot content does;
        // unregistering clears the slot and the element with it.
        cb.forget();
    }

    fn on_selection_change(&self) {
        let Some(button) = self.button() else {
            return;
        };
        let classes = button.class_list();
        let _ = classes.toggle_with_force("is-active", query_state(self.command));

        if self.outline_excluded {
            let blocked = selection_inside_outline();
            let _ = classes.toggle_with_force("is-blocked", blocked);
            let _ = button.set_attribute("aria-disabled", if blocked { "true" } else { "false" });
        }
    }
}

const SWATCHES: [&str; 6] = [
    "#1f2937", "#b91c1c", "#b45309", "#15803d", "#1d4ed8", "#7e22ce",
];

/// Fixed swatch row applying `foreColor` to the current selection.
pub(crate) struct ColorCommand {
    container_id: String,
}

impl ToolbarPlugin for ColorCommand {
    fn attach(&self) {
        let Some(container) = page_document().and_then(|d| d.get_element_by_id(&self.container_id))
        else {
            return;
        };

        let cb = Closure::wrap(Box::new(move |ev: web_sys::MouseEvent| {
            ev.prevent_default();
            let Some(swatch) = ev
                .target()
                .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
                .and_then(|el| el.closest("[data-color]").ok().flatten())
            else {
                return;
            };
            if let Some(color) = swatch.get_attribute("data-color") {
                exec("foreColor", Some(&color));
            }
        }) as Box<dyn FnMut(web_sys::MouseEvent)>);
        let _ =
            container.add_event_listener_with_callback("mousedown", cb.as_ref().unchecked_ref());
        cb.forget();
    }
}

fn command_button_html(id: &str, label: &str, title: &str) -> String {
    format!(
        r#"<button id="{id}" type="button" class="toolbar-btn" title="{title}">{label}</button>"#
    )
}

fn swatch_row_html(id: &str) -> String {
    let mut out = format!(r#"<span id="{id}" class="toolbar-swatches">"#);
    for color in SWATCHES {
        out.push_str(&format!(
            r#"<button type="button" class="toolbar-swatch" data-color="{color}" title="{color}" style="background:{color}"></button>"#
        ));
    }
    out.push_str("</span>");
    out
}

/// Register the formatting features. Each polls the registry until its slot
/// exists and is free; there is no startup ordering requirement.
pub(crate) fn install_formatting_commands(app: &AppContext) {
    let registry = app.0.toolbar;

    let bold_id = use_random_id_for("bold_btn");
    register_when_ready(
        registry,
        "bold",
        "0".to_string(),
        Arc::new(FormattingCommand::new("bold", bold_id.clone(), false)),
        command_button_html(&bold_id, "<b>B</b>", "Bold"),
    );

    let italic_id = use_random_id_for("italic_btn");
    register_when_ready(
        registry,
        "italic",
        "1".to_string(),
        Arc::new(FormattingCommand::new("italic", italic_id.clone(), false)),
        command_button_html(&italic_id, "<i>I</i>", "Italic"),
    );

    let list_id = use_random_id_for("list_btn");
    register_when_ready(
        registry,
        "bullet-list",
        "2".to_string(),
        Arc::new(FormattingCommand::new(
            "insertUnorderedList",
            list_id.clone(),
            true,
        )),
        command_button_html(&list_id, "&#8226;&#8211;", "Bulleted list"),
    );

    let color_id = use_random_id_for("color_row");
    register_when_ready(
        registry,
        "text-color",
        format!("{SPLIT_SLOT_INDEX}-right"),
        Arc::new(ColorCommand {
            container_id: color_id.clone(),
        }),
        swatch_row_html(&color_id),
    );
}

/// One document-level listener fanning selection changes out to every
/// registered plugin so buttons track the caret.
pub(crate) fn install_selection_listener(registry: RwSignal<ToolbarRegistry>) {
    let Some(doc) = page_document() else {
        return;
    };
    let cb = Closure::wrap(Box::new(move || {
        registry.with_untracked(|r| r.for_each_plugin(|p| p.on_selection_change()));
    }) as Box<dyn FnMut()>);
    let _ = doc.add_event_listener_with_callback("selectionchange", cb.as_ref().unchecked_ref());
    // App-lifetime listener.
    cb.forget();
}

#[cfg(test)]
mod tests {
    use super::*;

    // Any outline marker anywhere in the ancestor
    // chain blocks list formatting.
    #[test]
    fn test_marker_in_chain_blocks_list_formatting() {
        assert!(chain_has_outline_marker(["toggle-title"]));
        assert!(chain_has_outline_marker(["toggle-body"]));
        assert!(chain_has_outline_marker(["toggle-children"]));
        assert!(chain_has_outline_marker(["verse-text", "toggle-block"]));
    }

    #[test]
    fn test_plain_chain_allows_list_formatting() {
        assert!(!chain_has_outline_marker([]));
        assert!(!chain_has_outline_marker(["text-block", "editor-surface", "flex"]));
        // Near-miss class names must not trip the exclusion.
        assert!(!chain_has_outline_marker(["toggle", "block", "toggle-blocked"]));
    }

    #[test]
    fn test_command_button_html_carries_id_and_title() {
        let html = command_button_html("btn1", "<b>B</b>", "Bold");
        assert!(html.contains(r#"id="btn1""#));
        assert!(html.contains(r#"title="Bold""#));
        assert!(html.contains("<b>B</b>"));
    }

    #[test]
    fn test_swatch_row_lists_every_color() {
        let html = swatch_row_html("row1");
        for color in SWATCHES {
            assert!(html.contains(&format!(r#"data-color="{color}""#)));
        }
    }
}
