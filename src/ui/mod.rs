pub mod autocomplete;
pub mod components;
pub mod render;
pub mod session;
pub mod shortcuts;
pub mod tui;
