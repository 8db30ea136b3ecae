use crate::commands::{install_formatting_commands, install_selection_listener};
use crate::components::ui::Button;
use crate::editor::{schedule_focus, install_outline_plugin, EditorSurface};
use crate::models::{Block, Document};
use crate::outline::{Caret, FocusTarget};
use crate::state::doc_autosave::DocAutosave;
use crate::state::{AppContext, AppState};
use crate::storage;
use crate::toolbar::Toolbar;
use leptos::prelude::*;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;

#[component]
pub fn App() -> impl IntoView {
    let app = AppContext(AppState::new());
    provide_context(app.clone());

    // Local-first autosave: any document or title change restarts the
    // debounce; pagehide flushes whatever is pending.
    let autosave = DocAutosave::new(app.clone());
    {
        let app = app.clone();
        Effect::new(move |_| {
            app.0.document.track();
            app.0.doc_title.track();
            autosave.schedule();
        });
    }

    // Feature modules poll the toolbar until their slot accepts them; no
    // startup ordering between these and the Toolbar mount.
    install_outline_plugin(&app);
    install_formatting_commands(&app);
    install_selection_listener(app.0.toolbar);

    view! {
        <Router>
            <Routes fallback=|| view! { <div class="px-4 py-8 text-xs text-muted-foreground">"Not found"</div> }>
                <Route path=path!("") view=EditorPage />
            </Routes>
        </Router>
    }
}

#[component]
pub fn EditorPage() -> impl IntoView {
    let app = expect_context::<AppContext>();
    let doc_title = app.0.doc_title;

    let app_clear = app.clone();
    let on_clear = move |_| {
        let fresh = Document::seed();
        let first = fresh.blocks.first().map(|b| match b {
            Block::Text(t) => t.id,
            Block::Outline(n) => n.id,
        });
        app_clear.0.document.set(fresh);
        app_clear.0.editing.set(None);
        storage::clear_document();
        if let Some(id) = first {
            schedule_focus(FocusTarget::TextBlock(id, Caret::Start));
        }
    };

    view! {
        <div class="min-h-screen bg-background">
            <div class="mx-auto w-full max-w-[860px] px-4 py-8">
                <div class="mb-4 flex items-center justify-between">
                    <div class="space-y-1">
                        <h1 class="text-xl font-semibold">"Versenote"</h1>
                        <p class="text-xs text-muted-foreground">"Study notes"</p>
                    </div>

                    <Button
                        on:click=on_clear
                        class="bg-transparent border border-input text-muted-foreground hover:bg-accent hover:text-accent-foreground"
                    >
                        "Clear"
                    </Button>
                </div>

                <input
                    class="mb-3 w-full rounded-md border border-input bg-transparent px-3 py-1 text-sm outline-none focus-visible:border-ring"
                    placeholder="Untitled study"
                    prop:value=move || doc_title.get()
                    on:input=move |ev| doc_title.set(event_target_value(&ev))
                />

                <Toolbar />
                <EditorSurface />
            </div>
        </div>
    }
}
