//! Keyboard shortcut constants for consistent documentation.

pub const HELP: &str = "F1";
pub const THEME: &str = "F2";
pub const OPEN_POPUP: &str = "s";
pub const QUIT: &str = "q";
pub const CLOSE_POPUP: &str = "Esc";
pub const NEXT_FIELD: &str = "Tab";
pub const PREV_FIELD: &str = "Shift+Tab";
pub const FOCUS_RESULTS: &str = "F6";
pub const PAGE_PREV: &str = "PgUp";
pub const PAGE_NEXT: &str = "PgDn";
pub const SEARCH: &str = "Enter";
pub const DOWNLOAD: &str = "d";
pub const PREVIEW: &str = "Space";
pub const COPY_LINK: &str = "o";

// Autocomplete
pub const SUGGEST_NEXT: &str = "↓";
pub const SUGGEST_PREV: &str = "↑";
pub const SUGGEST_ACCEPT: &str = "Enter/Tab";
pub const SUGGEST_DISMISS: &str = "Esc";
