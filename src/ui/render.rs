//! Result list rendering and the shared description preview box.

use serde::Serialize;

use crate::model::types::CatalogRecord;

/// Displayed descriptions are cut to this many characters.
pub const DESCRIPTION_PREVIEW_CHARS: usize = 180;

pub const EMPTY_STATE_MESSAGE: &str = "No characters found";

/// Distance between the pointer and the preview box, both axes.
pub const HOVER_OFFSET: u16 = 12;

pub fn truncate_description(full: &str) -> String {
    if full.chars().count() > DESCRIPTION_PREVIEW_CHARS {
        let mut out: String = full.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
        out.push('…');
        out
    } else {
        full.to_string()
    }
}

/// What one card shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardView {
    pub index: usize,
    pub name: String,
    pub author: String,
    pub short_description: String,
    pub tags: Vec<String>,
    pub full_path: String,
    pub card_image_url: String,
    pub thumbnail_url: String,
}

impl CardView {
    fn from_record(index: usize, record: &CatalogRecord) -> Self {
        let name = if record.name.is_empty() {
            "Unnamed".to_string()
        } else {
            record.name.clone()
        };
        Self {
            index,
            name,
            author: record.author.clone(),
            short_description: truncate_description(&record.description),
            tags: record.tags.clone(),
            full_path: record.full_path.clone(),
            card_image_url: record.card_image_url.clone(),
            thumbnail_url: record.thumbnail_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListView {
    Cards(Vec<CardView>),
    Empty,
}

/// Owns the current result list and everything painted from it.
#[derive(Debug, Clone)]
pub struct ListRenderer {
    records: Vec<CatalogRecord>,
    view: ListView,
    /// Card index → untruncated description.
    descriptions: Vec<String>,
    renders: u64,
}

impl Default for ListRenderer {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            view: ListView::Cards(Vec::new()),
            descriptions: Vec::new(),
            renders: 0,
        }
    }
}

impl ListRenderer {
    /// Replaces everything with one card per record.
    pub fn render(&mut self, records: Vec<CatalogRecord>) {
        let cards = records
            .iter()
            .enumerate()
            .map(|(i, r)| CardView::from_record(i, r))
            .collect();
        self.descriptions = records.iter().map(|r| r.description.clone()).collect();
        self.records = records;
        self.view = ListView::Cards(cards);
        self.renders += 1;
    }

    pub fn render_empty_state(&mut self) {
        self.records.clear();
        self.descriptions.clear();
        self.view = ListView::Empty;
        self.renders += 1;
    }

    pub fn view(&self) -> &ListView {
        &self.view
    }

    pub fn cards(&self) -> &[CardView] {
        match &self.view {
            ListView::Cards(cards) => cards,
            ListView::Empty => &[],
        }
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&CatalogRecord> {
        self.records.get(index)
    }

    pub fn full_description(&self, index: usize) -> Option<&str> {
        self.descriptions.get(index).map(String::as_str)
    }

    pub fn render_count(&self) -> u64 {
        self.renders
    }
}

/// Pointer position in screen cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: u16,
    pub y: u16,
}

/// The single floating preview box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoverOverlay {
    content: String,
    visible: bool,
    position: Point,
    hovered: Option<usize>,
}

impl HoverOverlay {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Top-left corner of the box.
    pub fn position(&self) -> Point {
        self.position
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    fn place(&mut self, at: Point) {
        self.position = Point {
            x: at.x.saturating_add(HOVER_OFFSET),
            y: at.y.saturating_add(HOVER_OFFSET),
        };
    }

    pub fn pointer_enter(&mut self, card: usize, at: Point, renderer: &ListRenderer) {
        self.hovered = Some(card);
        let Some(full) = renderer.full_description(card).filter(|d| !d.is_empty()) else {
            return;
        };
        self.content = full.to_string();
        self.visible = true;
        self.place(at);
    }

    pub fn pointer_move(&mut self, at: Point) {
        if self.visible {
            self.place(at);
        }
    }

    pub fn pointer_leave(&mut self) {
        self.hovered = None;
        self.visible = false;
    }

    /// Forgets which card is under the pointer after the grid was repainted.
    /// The box stays up; the next `track` over any card re-reads its text.
    pub fn invalidate(&mut self) {
        self.hovered = None;
    }

    /// Feeds a raw pointer position; `card` is whatever card lies under it.
    /// Crossing a card boundary becomes leave/enter, anything else a move.
    pub fn track(&mut self, card: Option<usize>, at: Point, renderer: &ListRenderer) {
        if card.is_some() && card == self.hovered {
            self.pointer_move(at);
            return;
        }
        if self.hovered.is_some() || self.visible {
            self.pointer_leave();
        }
        if let Some(card) = card {
            self.pointer_enter(card, at, renderer);
        }
    }
}
