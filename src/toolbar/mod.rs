use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use leptos::prelude::*;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

use crate::state::AppContext;

/// Number of numbered mounting points the toolbar exposes.
pub(crate) const SLOT_COUNT: usize = 8;

/// The one slot that is only a layout container: it carries a `-left` and a
/// `-right` sub-slot and never accepts a plugin itself.
pub(crate) const SPLIT_SLOT_INDEX: usize = 5;

/// Fixed retry delay for feature modules polling their registration in.
/// Contention only comes from page-load ordering, so no backoff is needed.
const REGISTER_RETRY_MS: i32 = 150;

/// Controller contract for one registered feature.
///
/// `attach` runs one tick after the slot's HTML is in the tree; listeners it
/// creates live on elements inside the slot, so clearing the slot on
/// unregister is what tears them down.
pub(crate) trait ToolbarPlugin: Send + Sync {
    fn attach(&self) {}
    /// Reflect the current selection into the control's visual state.
    fn on_selection_change(&self) {}
    fn destroy(&self) {}
}

pub(crate) type PluginHandle = Arc<dyn ToolbarPlugin + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Slot {
    pub occupied: bool,
    pub content: String,
    container_only: bool,
}

impl Slot {
    fn new(container_only: bool) -> Self {
        Self {
            occupied: false,
            content: String::new(),
            container_only,
        }
    }
}

/// Single source of truth for which mounting points exist and who occupies
/// them. Held in a signal so the Toolbar component re-projects on change.
#[derive(Clone, Default)]
pub(crate) struct ToolbarRegistry {
    slots: BTreeMap<String, Slot>,
    plugins: HashMap<String, PluginHandle>,
}

impl ToolbarRegistry {
    /// Create the numbered slots plus the split slot's sub-slots. Idempotent:
    /// a re-mounted toolbar must not wipe existing occupancy.
    pub fn create_slots(&mut self, n: usize) {
        if !self.slots.is_empty() {
            return;
        }
        for i in 0..n {
            let container_only = i == SPLIT_SLOT_INDEX;
            self.slots.insert(i.to_string(), Slot::new(container_only));
            if container_only {
                self.slots.insert(format!("{i}-left"), Slot::new(false));
                self.slots.insert(format!("{i}-right"), Slot::new(false));
            }
        }
    }

    /// Mount a feature into a slot. Returns false, with no side effects, when
    /// the slot does not exist yet or is already taken; callers poll until
    /// this succeeds.
    pub fn register_plugin(
        &mut self,
        name: &str,
        slot_id: &str,
        controller: PluginHandle,
        content: &str,
    ) -> bool {
        let Some(slot) = self.slots.get_mut(slot_id) else {
            return false;
        };
        if slot.container_only || slot.occupied {
            return false;
        }
        slot.occupied = true;
        slot.content = content.to_string();
        self.plugins
            .insert(plugin_key(name, slot_id), controller);
        true
    }

    pub fn unregister_plugin(&mut self, name: &str, slot_id: &str) -> bool {
        let key = plugin_key(name, slot_id);
        let Some(controller) = self.plugins.remove(&key) else {
            return false;
        };
        if let Some(slot) = self.slots.get_mut(slot_id) {
            slot.occupied = false;
            slot.content.clear();
        }
        controller.destroy();
        true
    }

    pub fn is_slot_available(&self, slot_id: &str) -> bool {
        self.slots
            .get(slot_id)
            .map(|s| !s.container_only && !s.occupied)
            .unwrap_or(false)
    }

    pub fn list_available_slots(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|(_, s)| !s.container_only && !s.occupied)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn list_registered_plugins(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.plugins.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn slot_content(&self, slot_id: &str) -> Option<String> {
        self.slots
            .get(slot_id)
            .filter(|s| s.occupied)
            .map(|s| s.content.clone())
    }

    pub fn for_each_plugin(&self, mut f: impl FnMut(&dyn ToolbarPlugin)) {
        for controller in self.plugins.values() {
            f(controller.as_ref());
        }
    }
}

fn plugin_key(name: &str, slot_id: &str) -> String {
    format!("{name}-{slot_id}")
}

/// Poll until the registry has slots and the target slot accepts us, then
/// schedule `attach` one tick after the toolbar has projected the content.
///
/// Registration failure is never fatal here: the toolbar simply has not
/// mounted yet, or a rival took the slot (in which case we keep trying a
/// slot that will never free up; harmless, and visible in the plugin list).
pub(crate) fn register_when_ready(
    registry: RwSignal<ToolbarRegistry>,
    name: &'static str,
    slot_id: String,
    controller: PluginHandle,
    content: String,
) {
    let Some(win) = web_sys::window() else {
        return;
    };

    let timer_id = std::rc::Rc::new(std::cell::Cell::new(0i32));
    let timer_id_inner = timer_id.clone();

    let cb = Closure::wrap(Box::new(move || {
        let registered = registry
            .try_update(|r| r.register_plugin(name, &slot_id, controller.clone(), &content))
            .unwrap_or(false);
        if !registered {
            return;
        }

        if let Some(win) = web_sys::window() {
            win.clear_interval_with_handle(timer_id_inner.get());
        }
        let controller = controller.clone();
        crate::util::next_tick(move || controller.attach());
    }) as Box<dyn FnMut()>);

    let tid = win
        .set_interval_with_callback_and_timeout_and_arguments_0(
            cb.as_ref().unchecked_ref(),
            REGISTER_RETRY_MS,
        )
        .unwrap_or(0);
    timer_id.set(tid);

    // Polling loop lives until registration succeeds; at most app lifetime.
    cb.forget();
}

#[component]
pub fn Toolbar() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let registry = app_state.0.toolbar;

    // Slots exist from the toolbar's first render onward; polling feature
    // modules start succeeding after this update.
    registry.update(|r| r.create_slots(SLOT_COUNT));

    view! {
        <div class="toolbar flex flex-wrap items-center gap-1 rounded-md border border-input bg-background px-2 py-1">
            {move || {
                let reg = registry.get();
                (0..SLOT_COUNT)
                    .map(|i| {
                        if i == SPLIT_SLOT_INDEX {
                            let left = reg.slot_content(&format!("{i}-left")).unwrap_or_default();
                            let right = reg.slot_content(&format!("{i}-right")).unwrap_or_default();
                            view! {
                                <div class="toolbar-split flex items-center gap-2 border-l border-input pl-2">
                                    <div class="toolbar-slot flex items-center" inner_html=left></div>
                                    <div class="toolbar-slot flex items-center" inner_html=right></div>
                                </div>
                            }
                            .into_any()
                        } else {
                            let content = reg.slot_content(&i.to_string()).unwrap_or_default();
                            view! {
                                <div class="toolbar-slot flex items-center" inner_html=content></div>
                            }
                            .into_any()
                        }
                    })
                    .collect_view()
            }}
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct TestPlugin {
        destroyed: Arc<AtomicBool>,
        attached: Arc<AtomicUsize>,
    }

    impl TestPlugin {
        fn handle() -> (PluginHandle, Arc<AtomicBool>, Arc<AtomicUsize>) {
            let destroyed = Arc::new(AtomicBool::new(false));
            let attached = Arc::new(AtomicUsize::new(0));
            let plugin = Arc::new(TestPlugin {
                destroyed: destroyed.clone(),
                attached: attached.clone(),
            });
            (plugin, destroyed, attached)
        }
    }

    impl ToolbarPlugin for TestPlugin {
        fn attach(&self) {
            self.attached.fetch_add(1, Ordering::SeqCst);
        }
        fn destroy(&self) {
            self.destroyed.store(true, Ordering::SeqCst);
        }
    }

    fn registry() -> ToolbarRegistry {
        let mut r = ToolbarRegistry::default();
        r.create_slots(SLOT_COUNT);
        r
    }

    #[test]
    fn test_create_slots_builds_numbered_and_sub_slots() {
        let r = registry();
        assert!(r.is_slot_available("0"));
        assert!(r.is_slot_available(&format!("{SPLIT_SLOT_INDEX}-left")));
        assert!(r.is_slot_available(&format!("{SPLIT_SLOT_INDEX}-right")));
        // The container itself is permanently unavailable.
        assert!(!r.is_slot_available(&SPLIT_SLOT_INDEX.to_string()));
    }

    #[test]
    fn test_create_slots_is_idempotent() {
        let mut r = registry();
        let (plugin, _, _) = TestPlugin::handle();
        assert!(r.register_plugin("bold", "0", plugin, "<button>B</button>"));

        r.create_slots(SLOT_COUNT);
        assert!(!r.is_slot_available("0"));
        assert_eq!(r.slot_content("0").as_deref(), Some("<button>B</button>"));
    }

    #[test]
    fn test_register_fails_on_missing_slot() {
        let mut r = ToolbarRegistry::default();
        let (plugin, _, _) = TestPlugin::handle();
        assert!(!r.register_plugin("bold", "0", plugin, "<button>B</button>"));
        assert!(r.list_registered_plugins().is_empty());
    }

    #[test]
    fn test_register_fails_on_container_slot() {
        let mut r = registry();
        let (plugin, _, _) = TestPlugin::handle();
        assert!(!r.register_plugin("x", &SPLIT_SLOT_INDEX.to_string(), plugin, "<i>x</i>"));
    }

    // The second registration at a taken slot fails and must not
    // disturb the first plugin's rendered content.
    #[test]
    fn test_slot_single_occupancy() {
        let mut r = registry();
        let (first, _, _) = TestPlugin::handle();
        let (second, _, _) = TestPlugin::handle();

        assert!(r.register_plugin("bold", "2", first, "<button>B</button>"));
        assert!(!r.register_plugin("italic", "2", second, "<button>I</button>"));

        assert_eq!(r.slot_content("2").as_deref(), Some("<button>B</button>"));
        assert_eq!(r.list_registered_plugins(), vec!["bold-2".to_string()]);
    }

    #[test]
    fn test_register_into_sub_slot() {
        let mut r = registry();
        let (plugin, _, _) = TestPlugin::handle();
        let slot = format!("{SPLIT_SLOT_INDEX}-right");
        assert!(r.register_plugin("color", &slot, plugin, "<span>c</span>"));
        assert!(!r.is_slot_available(&slot));
        assert!(r.is_slot_available(&format!("{SPLIT_SLOT_INDEX}-left")));
    }

    #[test]
    fn test_unregister_frees_slot_and_destroys_controller() {
        let mut r = registry();
        let (plugin, destroyed, _) = TestPlugin::handle();
        assert!(r.register_plugin("bold", "1", plugin, "<button>B</button>"));

        assert!(r.unregister_plugin("bold", "1"));
        assert!(destroyed.load(Ordering::SeqCst));
        assert!(r.is_slot_available("1"));
        assert_eq!(r.slot_content("1"), None);
        assert!(r.list_registered_plugins().is_empty());

        // Unregistering twice reports failure without exploding.
        assert!(!r.unregister_plugin("bold", "1"));
    }

    #[test]
    fn test_list_available_slots_shrinks_on_registration() {
        let mut r = registry();
        let before = r.list_available_slots().len();
        let (plugin, _, _) = TestPlugin::handle();
        r.register_plugin("bold", "0", plugin, "");
        assert_eq!(r.list_available_slots().len(), before - 1);
    }

    #[test]
    fn test_for_each_plugin_visits_registrations() {
        let mut r = registry();
        let (a, _, attached_a) = TestPlugin::handle();
        let (b, _, attached_b) = TestPlugin::handle();
        r.register_plugin("bold", "0", a, "");
        r.register_plugin("italic", "1", b, "");

        r.for_each_plugin(|p| p.attach());
        assert_eq!(attached_a.load(Ordering::SeqCst), 1);
        assert_eq!(attached_b.load(Ordering::SeqCst), 1);
    }
}
