use std::sync::Arc;

use leptos::prelude::*;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

use crate::components::hooks::use_random::use_random_id_for;
use crate::models::{Block, Document, NodeId, MAX_LEVEL};
use crate::outline::{self, Caret, EditOutcome, FocusTarget};
use crate::state::{AppContext, EditLocation};
use crate::toolbar::{register_when_ready, ToolbarPlugin};
use crate::util::{after_ms, next_tick};

const SHAKE_MS: i32 = 400;

/// Editor-scoped UI state shared down the block tree.
#[derive(Clone, Copy)]
pub(crate) struct EditorCtx {
    /// Node currently playing the rejection shake.
    shaking: RwSignal<Option<NodeId>>,
}

fn run_op(
    document: RwSignal<Document>,
    op: impl FnOnce(&mut Document) -> EditOutcome,
) -> EditOutcome {
    document.try_update(op).unwrap_or_default()
}

fn apply_outcome(editor: EditorCtx, source: NodeId, outcome: EditOutcome) {
    if outcome.rejected.is_some() {
        let shaking = editor.shaking;
        shaking.set(Some(source));
        after_ms(SHAKE_MS, move || {
            if shaking.get_untracked() == Some(source) {
                shaking.set(None);
            }
        });
    }
    if let Some(target) = outcome.focus {
        schedule_focus(target);
    }
}

pub(crate) fn title_dom_id(id: NodeId) -> String {
    format!("toggle-title-{id}")
}

pub(crate) fn body_dom_id(id: NodeId) -> String {
    format!("toggle-body-{id}")
}

pub(crate) fn text_dom_id(id: NodeId) -> String {
    format!("text-block-{id}")
}

/// Mutate first, reposition the caret one tick later. The target element may
/// not be mounted yet, or may already be gone again; `focus_now` re-checks
/// before acting, so a stale request is a no-op.
pub(crate) fn schedule_focus(target: FocusTarget) {
    next_tick(move || focus_now(target));
}

fn focus_now(target: FocusTarget) {
    let Some(doc) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    match target {
        FocusTarget::Title(id, caret) => focus_input(&doc, &title_dom_id(id), caret),
        FocusTarget::BodyText(id, caret) => focus_textarea(&doc, &body_dom_id(id), caret),
        FocusTarget::TextBlock(id, caret) => focus_contenteditable(&doc, &text_dom_id(id), caret),
    }
}

fn focus_input(doc: &web_sys::Document, dom_id: &str, caret: Caret) {
    let Some(el) = doc.get_element_by_id(dom_id) else {
        return;
    };
    let Ok(input) = el.dyn_into::<web_sys::HtmlInputElement>() else {
        return;
    };
    let _ = input.focus();
    // selectionStart/End are in UTF-16 code units.
    let pos = match caret {
        Caret::Start => 0,
        Caret::End => input.value().encode_utf16().count() as u32,
    };
    let _ = input.set_selection_range(pos, pos);
}

fn focus_textarea(doc: &web_sys::Document, dom_id: &str, caret: Caret) {
    let Some(el) = doc.get_element_by_id(dom_id) else {
        return;
    };
    let Ok(area) = el.dyn_into::<web_sys::HtmlTextAreaElement>() else {
        return;
    };
    let _ = area.focus();
    let pos = match caret {
        Caret::Start => 0,
        Caret::End => area.value().encode_utf16().count() as u32,
    };
    let _ = area.set_selection_range(pos, pos);
}

fn focus_contenteditable(doc: &web_sys::Document, dom_id: &str, caret: Caret) {
    let Some(el) = doc.get_element_by_id(dom_id) else {
        return;
    };
    if let Some(he) = el.dyn_ref::<web_sys::HtmlElement>() {
        let _ = he.focus();
    }
    let Ok(range) = doc.create_range() else {
        return;
    };
    if range.select_node_contents(&el).is_err() {
        return;
    }
    range.collapse_with_to_start(matches!(caret, Caret::Start));
    if let Ok(Some(selection)) = web_sys::window().map(|w| w.get_selection()).unwrap_or(Ok(None)) {
        let _ = selection.remove_all_ranges();
        let _ = selection.add_range(&range);
    }
}

fn top_level_ids(doc: &Document) -> Vec<NodeId> {
    doc.blocks
        .iter()
        .map(|b| match b {
            Block::Text(t) => t.id,
            Block::Outline(n) => n.id,
        })
        .collect()
}

#[component]
pub fn EditorSurface() -> impl IntoView {
    let app = expect_context::<AppContext>();
    let document = app.0.document;

    provide_context(EditorCtx {
        shaking: RwSignal::new(None),
    });

    view! {
        <div class="editor-surface mt-3 min-h-[320px] rounded-md border border-input bg-background p-3">
            <For
                each=move || document.with(top_level_ids)
                key=|id| *id
                children=move |id: NodeId| view! { <BlockView block_id=id /> }
            />
        </div>
    }
}

#[derive(Clone, Copy, PartialEq)]
enum BlockKind {
    Text,
    Outline,
}

#[component]
fn BlockView(block_id: NodeId) -> impl IntoView {
    let app = expect_context::<AppContext>();
    let document = app.0.document;

    // The kind of a block with a given id never changes in place
    // (conversions allocate fresh ids), so this resolves once per mount.
    let kind = document.with_untracked(|d| {
        d.blocks.iter().find_map(|b| match b {
            Block::Text(t) if t.id == block_id => Some(BlockKind::Text),
            Block::Outline(n) if n.id == block_id => Some(BlockKind::Outline),
            _ => None,
        })
    });

    match kind {
        Some(BlockKind::Text) => view! { <TextBlockView block_id=block_id /> }.into_any(),
        Some(BlockKind::Outline) => view! { <OutlineNodeView node_id=block_id /> }.into_any(),
        None => ().into_view().into_any(),
    }
}

#[component]
fn TextBlockView(block_id: NodeId) -> impl IntoView {
    let app = expect_context::<AppContext>();
    let document = app.0.document;
    let editing = app.0.editing;

    // Initial projection only: the contenteditable owns its DOM afterwards
    // and the model follows via input events. Re-rendering the element on
    // every keystroke would drop the caret.
    let initial_html = document
        .with_untracked(|d| {
            d.blocks.iter().find_map(|b| match b {
                Block::Text(t) if t.id == block_id => Some(t.html.clone()),
                _ => None,
            })
        })
        .unwrap_or_default();

    view! {
        <div
            id=text_dom_id(block_id)
            class="text-block min-h-[24px] whitespace-pre-wrap py-0.5 text-sm outline-none"
            contenteditable="true"
            inner_html=initial_html
            on:input=move |ev: web_sys::Event| {
                let Some(el) = ev.target().and_then(|t| t.dyn_into::<web_sys::Element>().ok())
                else {
                    return;
                };
                let html = el.inner_html();
                run_op(document, |d| outline::set_text_block_html(d, block_id, &html));
            }
            on:focus=move |_| editing.set(Some(EditLocation::TextBlock(block_id)))
        ></div>
    }
}

#[component]
fn OutlineNodeView(node_id: NodeId) -> impl IntoView {
    let app = expect_context::<AppContext>();
    let editor = expect_context::<EditorCtx>();
    let document = app.0.document;
    let editing = app.0.editing;

    let Some((level, initial_title)) = document.with_untracked(|d| {
        outline::find_node(d, node_id).map(|n| (n.level, n.title.clone()))
    }) else {
        return ().into_view().into_any();
    };

    let expanded = Memo::new(move |_| {
        document.with(|d| {
            outline::find_node(d, node_id)
                .map(|n| n.expanded)
                .unwrap_or(true)
        })
    });
    let has_children = Memo::new(move |_| {
        document.with(|d| {
            outline::find_node(d, node_id)
                .map(|n| n.children().is_some())
                .unwrap_or(false)
        })
    });
    let kid_ids = Memo::new(move |_| {
        document.with(|d| {
            outline::find_node(d, node_id)
                .and_then(|n| n.children().map(|ks| ks.iter().map(|k| k.id).collect::<Vec<_>>()))
                .unwrap_or_default()
        })
    });

    let can_add = level < MAX_LEVEL;
    let body_id = body_dom_id(node_id);

    view! {
        <div
            class=move || {
                if editor.shaking.get() == Some(node_id) {
                    "toggle-block toggle-shake"
                } else {
                    "toggle-block"
                }
            }
            attr:data-level=level.to_string()
            style=format!("margin-left: {}px", level as i32 * 18)
        >
            <div class="toggle-header flex items-center gap-2 py-1">
                <button
                    class="toggle-caret h-5 w-5 text-base leading-none text-muted-foreground cursor-pointer hover:text-foreground/80"
                    title=move || if expanded.get() { "Collapse" } else { "Expand" }
                    on:click=move |_| {
                        run_op(document, |d| outline::toggle_expanded(d, node_id));
                    }
                >
                    {move || if expanded.get() { "▾" } else { "▸" }}
                </button>

                <input
                    id=title_dom_id(node_id)
                    class="toggle-title h-7 w-full min-w-0 flex-1 rounded-md border border-transparent bg-transparent px-2 py-1 text-sm font-medium outline-none focus-visible:border-ring"
                    placeholder="Toggle title"
                    prop:value=initial_title
                    on:input=move |ev: web_sys::Event| {
                        let raw = event_target_value(&ev);
                        let outcome =
                            run_op(document, |d| outline::apply_title_input(d, node_id, &raw));
                        if outcome.changed {
                            // Uncontrolled input: when normalization rewrote
                            // the text, push it back before the caret restore.
                            let normalized = document
                                .with_untracked(|d| {
                                    outline::find_node(d, node_id).map(|n| n.title.clone())
                                })
                                .unwrap_or_default();
                            if normalized != raw {
                                if let Some(input) = ev
                                    .target()
                                    .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
                                {
                                    input.set_value(&normalized);
                                }
                            }
                        }
                        apply_outcome(editor, node_id, outcome);
                    }
                    on:keydown=move |ev: web_sys::KeyboardEvent| {
                        let key = ev.key();
                        if key == "Enter" {
                            ev.prevent_default();
                            let outcome = run_op(document, |d| outline::title_enter(d, node_id));
                            apply_outcome(editor, node_id, outcome);
                            return;
                        }
                        if key == "Backspace" {
                            let empty = ev
                                .target()
                                .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
                                .map(|i| i.value().is_empty())
                                .unwrap_or(false);
                            if empty {
                                ev.prevent_default();
                                let outcome = run_op(document, |d| {
                                    outline::title_backspace_empty(d, node_id)
                                });
                                apply_outcome(editor, node_id, outcome);
                            }
                        }
                    }
                    on:focus=move |ev: web_sys::FocusEvent| {
                        editing.set(Some(EditLocation::Title(node_id)));
                        // Placeholder cleanup: zero-width remnants clear on entry.
                        if let Some(input) = ev
                            .target()
                            .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
                        {
                            let value = input.value();
                            if !value.is_empty() && outline::is_blank(&value) {
                                input.set_value("");
                                run_op(document, |d| outline::apply_title_input(d, node_id, ""));
                            }
                        }
                    }
                />

                <button
                    class="toggle-add h-5 w-5 rounded text-sm leading-none text-muted-foreground hover:text-foreground/80 disabled:opacity-40"
                    disabled=!can_add
                    title="Add nested toggle"
                    on:click=move |_| {
                        let outcome = run_op(document, |d| outline::add_child(d, node_id));
                        apply_outcome(editor, node_id, outcome);
                    }
                >
                    "+"
                </button>
            </div>

            <div class=move || {
                if expanded.get() {
                    "toggle-body-container pl-7"
                } else {
                    "toggle-body-container pl-7 hidden"
                }
            }>
                {move || {
                    if has_children.get() {
                        view! {
                            <div class="toggle-children space-y-0.5">
                                <For
                                    each=move || kid_ids.get()
                                    key=|id| *id
                                    children=move |id: NodeId| {
                                        view! { <OutlineNodeView node_id=id /> }
                                    }
                                />
                            </div>
                        }
                            .into_any()
                    } else {
                        let initial_body = document
                            .with_untracked(|d| {
                                outline::find_node(d, node_id)
                                    .and_then(|n| n.body_text().map(|t| t.to_string()))
                            })
                            .unwrap_or_default();
                        let body_id = body_id.clone();
                        view! {
                            <textarea
                                id=body_id
                                class="toggle-body w-full resize-none rounded-md border border-transparent bg-transparent px-2 py-1 text-sm outline-none focus-visible:border-ring"
                                rows=2
                                placeholder="Write, or press + to nest"
                                prop:value=initial_body
                                on:input=move |ev: web_sys::Event| {
                                    let raw = event_target_value(&ev);
                                    run_op(document, |d| outline::apply_body_input(d, node_id, &raw));
                                }
                                on:keydown=move |ev: web_sys::KeyboardEvent| {
                                    let key = ev.key();
                                    let empty = ev
                                        .target()
                                        .and_then(|t| {
                                            t.dyn_into::<web_sys::HtmlTextAreaElement>().ok()
                                        })
                                        .map(|t| t.value().is_empty())
                                        .unwrap_or(false);
                                    if key == "Enter" && empty {
                                        ev.prevent_default();
                                        let outcome =
                                            run_op(document, |d| outline::body_enter_empty(d, node_id));
                                        apply_outcome(editor, node_id, outcome);
                                        return;
                                    }
                                    if key == "Backspace" && empty {
                                        ev.prevent_default();
                                        let outcome = run_op(document, |d| {
                                            outline::body_backspace_empty(d, node_id)
                                        });
                                        apply_outcome(editor, node_id, outcome);
                                    }
                                }
                                on:focus=move |ev: web_sys::FocusEvent| {
                                    editing.set(Some(EditLocation::BodyText(node_id)));
                                    if let Some(area) = ev
                                        .target()
                                        .and_then(|t| {
                                            t.dyn_into::<web_sys::HtmlTextAreaElement>().ok()
                                        })
                                    {
                                        let value = area.value();
                                        if !value.is_empty() && outline::is_blank(&value) {
                                            area.set_value("");
                                            run_op(document, |d| {
                                                outline::apply_body_input(d, node_id, "")
                                            });
                                        }
                                    }
                                }
                            ></textarea>
                        }
                            .into_any()
                    }
                }}
            </div>
        </div>
    }
    .into_any()
}

/// The "new toggle" toolbar feature. With the caret outside any outline a
/// click inserts a fresh level-0 toggle; inside one, it exits past the
/// outermost ancestor instead.
pub(crate) struct OutlinePlugin {
    app: AppContext,
    button_id: String,
}

impl ToolbarPlugin for OutlinePlugin {
    fn attach(&self) {
        let Some(button) = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(&self.button_id))
        else {
            return;
        };

        let app = self.app.clone();
        // mousedown fires before the surface blurs, so the editing location
        // still reflects where the caret actually is.
        let cb = Closure::wrap(Box::new(move |ev: web_sys::MouseEvent| {
            ev.prevent_default();
            let document = app.0.document;
            let outcome = match app.0.editing.get_untracked() {
                Some(location) => match location.inside_outline() {
                    Some(id) => run_op(document, |d| outline::exit_outline(d, id)),
                    None => {
                        let EditLocation::TextBlock(block) = location else {
                            return;
                        };
                        run_op(document, |d| outline::insert_toggle(d, Some(block)))
                    }
                },
                None => run_op(document, |d| outline::insert_toggle(d, None)),
            };
            if let Some(target) = outcome.focus {
                schedule_focus(target);
            }
        }) as Box<dyn FnMut(web_sys::MouseEvent)>);
        let _ = button.add_event_listener_with_callback("mousedown", cb.as_ref().unchecked_ref());
        cb.forget();
    }
}

pub(crate) fn install_outline_plugin(app: &AppContext) {
    let registry = app.0.toolbar;
    let button_id = use_random_id_for("toggle_btn");
    let content = format!(
        r#"<button id="{button_id}" type="button" class="toolbar-btn" title="Toggle block">&#9656;</button>"#
    );
    register_when_ready(
        registry,
        "toggle-outline",
        "3".to_string(),
        Arc::new(OutlinePlugin {
            app: app.clone(),
            button_id,
        }),
        content,
    );
}
