pub mod button;

// Re-export component symbols so callers can `use crate::components::ui::Button`.
pub use button::*;
