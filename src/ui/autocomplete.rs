//! Tag autocomplete for comma separated tag inputs.
//!
//! Each controller owns one input's text and a floating suggestion panel.
//! Only the trailing comma segment is completed; earlier tags are left alone.

use std::fmt;
use std::time::{Duration, Instant};

use crate::model::types::TagCatalog;

pub const MAX_SUGGESTIONS: usize = 10;

/// Focus loss closes the panel only after this delay, so a click that lands on
/// an option still commits.
pub const BLUR_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AutocompleteState {
    #[default]
    Idle,
    Suggesting {
        options: Vec<String>,
        /// `None` until the user arrows into the list.
        cursor: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutocompleteKey {
    ArrowDown,
    ArrowUp,
    Enter,
    Tab,
    Escape,
}

/// What the input should do with the key afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// No panel; the input handles the key as usual.
    Ignored,
    /// The controller used the key; suppress the default action.
    Consumed,
    /// The panel closed without a commit; the default action still runs.
    Dismissed,
}

type CommitObserver = Box<dyn FnMut(&str)>;

pub struct AutocompleteController {
    id: &'static str,
    value: String,
    state: AutocompleteState,
    blur_deadline: Option<Instant>,
    observers: Vec<CommitObserver>,
}

impl fmt::Debug for AutocompleteController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutocompleteController")
            .field("id", &self.id)
            .field("value", &self.value)
            .field("state", &self.state)
            .field("blur_deadline", &self.blur_deadline)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Lower-cased, trimmed text after the last comma.
pub fn trailing_segment(value: &str) -> String {
    value
        .rsplit(',')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

/// Replaces the trailing segment with ` <tag>` and trims the result.
pub fn replace_trailing_segment(value: &str, tag: &str) -> String {
    let mut parts: Vec<&str> = value.split(',').collect();
    let replacement = format!(" {tag}");
    if let Some(last) = parts.last_mut() {
        *last = &replacement;
    }
    parts.join(",").trim().to_string()
}

impl AutocompleteController {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            value: String::new(),
            state: AutocompleteState::Idle,
            blur_deadline: None,
            observers: Vec::new(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_suggesting(&self) -> bool {
        matches!(self.state, AutocompleteState::Suggesting { .. })
    }

    pub fn options(&self) -> &[String] {
        match &self.state {
            AutocompleteState::Suggesting { options, .. } => options,
            AutocompleteState::Idle => &[],
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        match &self.state {
            AutocompleteState::Suggesting { cursor, .. } => *cursor,
            AutocompleteState::Idle => None,
        }
    }

    /// Registers a listener for committed values.
    pub fn on_commit(&mut self, observer: impl FnMut(&str) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Input event: the text changed.
    pub fn set_text(&mut self, text: impl Into<String>, catalog: &TagCatalog) {
        self.value = text.into();
        self.recompute(catalog);
    }

    pub fn insert_char(&mut self, c: char, catalog: &TagCatalog) {
        self.value.push(c);
        self.recompute(catalog);
    }

    pub fn backspace(&mut self, catalog: &TagCatalog) {
        self.value.pop();
        self.recompute(catalog);
    }

    fn recompute(&mut self, catalog: &TagCatalog) {
        let fragment = trailing_segment(&self.value);
        if fragment.is_empty() || catalog.is_empty() {
            self.close();
            return;
        }
        let options = catalog.prefix_matches(&fragment, MAX_SUGGESTIONS);
        if options.is_empty() {
            self.close();
        } else {
            self.state = AutocompleteState::Suggesting {
                options,
                cursor: None,
            };
        }
    }

    pub fn handle_key(&mut self, key: AutocompleteKey) -> KeyOutcome {
        let AutocompleteState::Suggesting { options, cursor } = &mut self.state else {
            return KeyOutcome::Ignored;
        };
        let len = options.len();
        if len == 0 {
            return KeyOutcome::Ignored;
        }
        match key {
            AutocompleteKey::ArrowDown => {
                *cursor = Some(cursor.map(|c| (c + 1) % len).unwrap_or(0));
                KeyOutcome::Consumed
            }
            AutocompleteKey::ArrowUp => {
                // With nothing selected, Up lands on the last option, not the
                // second to last: the mirror of Down landing on the first.
                *cursor = Some(cursor.map(|c| (c + len - 1) % len).unwrap_or(len - 1));
                KeyOutcome::Consumed
            }
            AutocompleteKey::Enter | AutocompleteKey::Tab => match cursor.and_then(|c| options.get(c)) {
                Some(tag) => {
                    let tag = tag.clone();
                    self.commit(&tag);
                    KeyOutcome::Consumed
                }
                None => {
                    self.close();
                    KeyOutcome::Dismissed
                }
            },
            AutocompleteKey::Escape => {
                self.close();
                KeyOutcome::Consumed
            }
        }
    }

    /// Pointer pressed on option `index`; commits it whatever the cursor says.
    pub fn pointer_down(&mut self, index: usize) -> bool {
        let Some(tag) = self.options().get(index).cloned() else {
            return false;
        };
        self.blur_deadline = None;
        self.commit(&tag);
        true
    }

    /// Focus left the input; the panel closes once [`BLUR_GRACE`] has passed.
    pub fn blur(&mut self, now: Instant) {
        if self.is_suggesting() {
            self.blur_deadline = Some(now + BLUR_GRACE);
        }
    }

    /// Applies a due blur. Returns true when the panel was closed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.blur_deadline {
            Some(deadline) if now >= deadline => {
                self.blur_deadline = None;
                let was_open = self.is_suggesting();
                self.close();
                was_open
            }
            _ => false,
        }
    }

    pub fn close(&mut self) {
        self.state = AutocompleteState::Idle;
    }

    fn commit(&mut self, tag: &str) {
        self.value = replace_trailing_segment(&self.value, tag);
        self.close();
        let value = self.value.clone();
        for observer in &mut self.observers {
            observer(&value);
        }
    }
}
