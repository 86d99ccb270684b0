//! Terminal host for the search popup.
//!
//! The host screen stands in for the application that embeds the popup: `s`
//! opens the modal, `Esc` closes it. All UI state lives on the loop thread;
//! network work is spawned onto the tokio runtime and reports back through an
//! unbounded channel that the loop drains every tick.

use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::TestBackend;
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

use crate::config::{Endpoints, SettingsStore};
use crate::host::{DirectoryImporter, Notifier};
use crate::model::types::TagCatalog;
use crate::remote::{RemoteClient, ReqwestProxy};
use crate::search::form::Trigger;
use crate::search::orchestrator::{ApplyOutcome, ContainerId, SearchCompletion, SearchTicket};
use crate::ui::autocomplete::{AutocompleteKey, KeyOutcome};
use crate::ui::components::theme::{ThemePalette, chip_style, kbd_style};
use crate::ui::render::{CardView, EMPTY_STATE_MESSAGE, HoverOverlay, ListView, Point};
use crate::ui::session::{PopupSession, TagField};
use crate::ui::shortcuts;

const CARD_HEIGHT: u16 = 6;
const CARD_MIN_WIDTH: u16 = 34;
const DOWNLOAD_LABEL: &str = "[⇩ get]";
const HOVER_WIDTH: u16 = 60;
const HOVER_MAX_HEIGHT: u16 = 16;

type Client = RemoteClient<ReqwestProxy>;

/// Everything `tui` needs from the CLI layer.
#[derive(Debug, Clone)]
pub struct TuiOptions {
    pub settings_path: PathBuf,
    pub import_dir: PathBuf,
    pub endpoints: Endpoints,
    pub once: bool,
}

/// Messages from spawned tasks back to the loop.
#[derive(Debug)]
enum AppEvent {
    SearchFinished(SearchCompletion),
    TagsLoaded {
        container: ContainerId,
        catalog: TagCatalog,
    },
    Imported {
        full_path: String,
        paths: Vec<PathBuf>,
    },
    Notice {
        text: String,
        kind: StatusKind,
    },
}

/// Work the loop should hand to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Search(SearchTicket),
    LoadTags(ContainerId),
    Download {
        full_path: String,
        card_image_url: String,
    },
}

/// Routes download failures to the status line.
struct ChannelNotifier(UnboundedSender<AppEvent>);

impl Notifier for ChannelNotifier {
    fn error(&self, title: &str, detail: &str) {
        let _ = self.0.send(AppEvent::Notice {
            text: format!("{title}: {detail}"),
            kind: StatusKind::Error,
        });
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
enum StatusKind {
    #[default]
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Status {
    text: String,
    kind: StatusKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Focus {
    SearchTerm,
    Include,
    Exclude,
    ResultsPerPage,
    Page,
    Sort,
    Nsfw,
    SearchButton,
    Results,
}

impl Focus {
    const ORDER: [Focus; 9] = [
        Focus::SearchTerm,
        Focus::Include,
        Focus::Exclude,
        Focus::ResultsPerPage,
        Focus::Page,
        Focus::Sort,
        Focus::Nsfw,
        Focus::SearchButton,
        Focus::Results,
    ];

    fn position(self) -> usize {
        Self::ORDER.iter().position(|f| *f == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ORDER[(self.position() + 1) % Self::ORDER.len()]
    }

    fn prev(self) -> Self {
        Self::ORDER[(self.position() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    fn tag_field(self) -> Option<TagField> {
        match self {
            Focus::Include => Some(TagField::Include),
            Focus::Exclude => Some(TagField::Exclude),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CardHit {
    index: usize,
    area: Rect,
    download: Rect,
}

/// Screen regions from the last frame, for mouse hit-testing.
#[derive(Clone, Debug, Default)]
struct HitMap {
    fields: Vec<(Focus, Rect)>,
    page_prev: Option<Rect>,
    page_next: Option<Rect>,
    cards: Vec<CardHit>,
    grid_cols: usize,
    suggestions: Option<(TagField, Vec<Rect>)>,
}

fn contains(r: Rect, x: u16, y: u16) -> bool {
    x >= r.x && x < r.x.saturating_add(r.width) && y >= r.y && y < r.y.saturating_add(r.height)
}

impl HitMap {
    fn card_at(&self, x: u16, y: u16) -> Option<&CardHit> {
        self.cards.iter().find(|c| contains(c.area, x, y))
    }

    fn field_at(&self, x: u16, y: u16) -> Option<Focus> {
        self.fields
            .iter()
            .find(|(_, r)| contains(*r, x, y))
            .map(|(f, _)| *f)
    }

    fn field_rect(&self, focus: Focus) -> Option<Rect> {
        self.fields.iter().find(|(f, _)| *f == focus).map(|(_, r)| *r)
    }

    fn suggestion_at(&self, x: u16, y: u16) -> Option<(TagField, usize)> {
        let (field, rows) = self.suggestions.as_ref()?;
        rows.iter()
            .position(|r| contains(*r, x, y))
            .map(|idx| (*field, idx))
    }
}

struct App {
    store: SettingsStore,
    popup: Option<PopupSession>,
    next_container: u64,
    focus: Focus,
    selected: usize,
    overlay: HoverOverlay,
    status: Status,
    show_help: bool,
    help_scroll: u16,
    theme_dark: bool,
    imported: Vec<PathBuf>,
    quit: bool,
    hits: HitMap,
    commands: Vec<Command>,
}

impl App {
    fn new(store: SettingsStore) -> Self {
        Self {
            store,
            popup: None,
            next_container: 1,
            focus: Focus::SearchTerm,
            selected: 0,
            overlay: HoverOverlay::default(),
            status: Status::default(),
            show_help: false,
            help_scroll: 0,
            theme_dark: true,
            imported: Vec::new(),
            quit: false,
            hits: HitMap::default(),
            commands: Vec::new(),
        }
    }

    fn palette(&self) -> ThemePalette {
        if self.theme_dark {
            ThemePalette::dark()
        } else {
            ThemePalette::light()
        }
    }

    fn set_status(&mut self, text: impl Into<String>, kind: StatusKind) {
        self.status = Status {
            text: text.into(),
            kind,
        };
    }

    fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    fn open_popup(&mut self) {
        let container = ContainerId(self.next_container);
        self.next_container += 1;
        self.popup = Some(PopupSession::open(container, self.store.chub()));
        self.focus = Focus::SearchTerm;
        self.selected = 0;
        self.overlay.pointer_leave();
        self.commands.push(Command::LoadTags(container));
        info!(container = container.0, "popup opened");
    }

    fn close_popup(&mut self) {
        self.persist_settings();
        if let Some(popup) = self.popup.take() {
            info!(container = popup.container().0, "popup closed");
        }
        self.overlay.pointer_leave();
        self.hits = HitMap::default();
    }

    fn persist_settings(&mut self) {
        let Some(popup) = self.popup.as_ref() else {
            return;
        };
        let settings = popup.settings();
        if settings == self.store.chub() {
            return;
        }
        self.store.set_chub(settings);
        if let Err(e) = self.store.save() {
            warn!("saving settings failed: {e:#}");
        }
    }

    fn trigger(&mut self, trigger: Trigger, now: Instant) {
        if let Some(popup) = self.popup.as_mut() {
            popup.trigger(trigger, now);
        }
        self.persist_settings();
    }

    fn move_focus(&mut self, target: Focus, now: Instant) {
        if target == self.focus {
            return;
        }
        if let (Some(field), Some(popup)) = (self.focus.tag_field(), self.popup.as_mut()) {
            popup.blur_tag(field, now);
        }
        self.focus = target;
    }

    fn card_count(&self) -> usize {
        self.popup
            .as_ref()
            .map(|p| p.renderer().cards().len())
            .unwrap_or(0)
    }

    fn selected_card(&self) -> Option<&CardView> {
        self.popup
            .as_ref()
            .and_then(|p| p.renderer().cards().get(self.selected))
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit = true;
            return;
        }
        match key.code {
            KeyCode::F(1) => {
                self.show_help = !self.show_help;
                self.help_scroll = 0;
                return;
            }
            KeyCode::F(2) => {
                self.theme_dark = !self.theme_dark;
                return;
            }
            _ => {}
        }
        if self.show_help {
            match key.code {
                KeyCode::Esc => self.show_help = false,
                KeyCode::Down => self.help_scroll = self.help_scroll.saturating_add(1),
                KeyCode::Up => self.help_scroll = self.help_scroll.saturating_sub(1),
                _ => {}
            }
            return;
        }
        if self.popup.is_none() {
            match key.code {
                KeyCode::Char('s') => self.open_popup(),
                KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
                _ => {}
            }
            return;
        }
        self.handle_popup_key(key, now);
    }

    fn handle_popup_key(&mut self, key: KeyEvent, now: Instant) {
        // The suggestion panel sees navigation keys before the input does.
        if let Some(field) = self.focus.tag_field() {
            let ac_key = match key.code {
                KeyCode::Down => Some(AutocompleteKey::ArrowDown),
                KeyCode::Up => Some(AutocompleteKey::ArrowUp),
                KeyCode::Enter => Some(AutocompleteKey::Enter),
                KeyCode::Tab => Some(AutocompleteKey::Tab),
                KeyCode::Esc => Some(AutocompleteKey::Escape),
                _ => None,
            };
            if let (Some(ac_key), Some(popup)) = (ac_key, self.popup.as_mut())
                && popup.tag_key(field, ac_key) == KeyOutcome::Consumed
            {
                return;
            }
        }

        match key.code {
            KeyCode::Esc => self.close_popup(),
            KeyCode::Tab => self.move_focus(self.focus.next(), now),
            KeyCode::BackTab => self.move_focus(self.focus.prev(), now),
            KeyCode::F(6) => self.move_focus(Focus::Results, now),
            KeyCode::PageUp => self.trigger(Trigger::PageDown, now),
            KeyCode::PageDown => self.trigger(Trigger::PageUp, now),
            _ => self.handle_field_key(key, now),
        }
    }

    fn handle_field_key(&mut self, key: KeyEvent, now: Instant) {
        let Some(popup) = self.popup.as_mut() else {
            return;
        };
        match self.focus {
            Focus::SearchTerm => match key.code {
                KeyCode::Char(c) => popup.form.search_term.push(c),
                KeyCode::Backspace => {
                    popup.form.search_term.pop();
                }
                KeyCode::Enter => self.trigger(Trigger::SearchTerm, now),
                _ => {}
            },
            Focus::Include | Focus::Exclude => {
                let Some(field) = self.focus.tag_field() else {
                    return;
                };
                match key.code {
                    KeyCode::Char(c) => popup.type_tag_char(field, c, now),
                    KeyCode::Backspace => popup.backspace_tag(field, now),
                    KeyCode::Enter => popup.trigger(field.trigger(), now),
                    _ => return,
                }
                self.persist_settings();
            }
            Focus::ResultsPerPage => {
                if edit_digits(&mut popup.form.find_count, key.code) {
                    self.trigger(Trigger::ResultsPerPage, now);
                } else if key.code == KeyCode::Enter {
                    self.trigger(Trigger::ResultsPerPage, now);
                }
            }
            Focus::Page => match key.code {
                KeyCode::Left => self.trigger(Trigger::PageDown, now),
                KeyCode::Right => self.trigger(Trigger::PageUp, now),
                code => {
                    if edit_digits(&mut popup.form.page, code) || code == KeyCode::Enter {
                        self.trigger(Trigger::PageNumber, now);
                    }
                }
            },
            Focus::Sort => {
                match key.code {
                    KeyCode::Left | KeyCode::Up => popup.form.sort = popup.form.sort.prev(),
                    KeyCode::Right | KeyCode::Down | KeyCode::Enter | KeyCode::Char(' ') => {
                        popup.form.sort = popup.form.sort.next()
                    }
                    _ => return,
                }
                self.trigger(Trigger::Sort, now);
            }
            Focus::Nsfw => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Char(' ')) {
                    popup.form.nsfw = !popup.form.nsfw;
                    self.trigger(Trigger::Nsfw, now);
                }
            }
            Focus::SearchButton => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Char(' ')) {
                    self.trigger(Trigger::SearchButton, now);
                }
            }
            Focus::Results => self.handle_results_key(key),
        }
    }

    fn handle_results_key(&mut self, key: KeyEvent) {
        let count = self.card_count();
        let cols = self.hits.grid_cols.max(1);
        match key.code {
            KeyCode::Right => self.select(self.selected.saturating_add(1)),
            KeyCode::Left => self.select(self.selected.saturating_sub(1)),
            KeyCode::Down => self.select(self.selected.saturating_add(cols)),
            KeyCode::Up => self.select(self.selected.saturating_sub(cols)),
            KeyCode::Home => self.select(0),
            KeyCode::End => self.select(count.saturating_sub(1)),
            KeyCode::Enter | KeyCode::Char('d') => self.download(self.selected),
            KeyCode::Char('o') => self.copy_link(),
            KeyCode::Char(' ') => self.toggle_preview(),
            _ => {}
        }
    }

    fn select(&mut self, index: usize) {
        let count = self.card_count();
        if count == 0 {
            self.selected = 0;
            return;
        }
        self.selected = index.min(count - 1);
    }

    fn download(&mut self, index: usize) {
        let Some(card) = self
            .popup
            .as_ref()
            .and_then(|p| p.renderer().cards().get(index))
        else {
            return;
        };
        let full_path = card.full_path.clone();
        let card_image_url = card.card_image_url.clone();
        self.set_status(format!("Downloading {full_path}…"), StatusKind::Info);
        self.commands.push(Command::Download {
            full_path,
            card_image_url,
        });
    }

    fn copy_link(&mut self) {
        let Some(link) = self
            .popup
            .as_ref()
            .and_then(|p| p.renderer().record(self.selected))
            .map(|r| r.page_url())
        else {
            return;
        };
        self.set_status(link, StatusKind::Info);
    }

    /// Keyboard equivalent of hovering the selected card.
    fn toggle_preview(&mut self) {
        if self.overlay.hovered() == Some(self.selected) && self.overlay.is_visible() {
            self.overlay.pointer_leave();
            return;
        }
        let at = self
            .hits
            .cards
            .iter()
            .find(|c| c.index == self.selected)
            .map(|c| Point {
                x: c.area.x,
                y: c.area.y,
            })
            .unwrap_or_default();
        if let Some(popup) = self.popup.as_ref() {
            self.overlay.pointer_leave();
            self.overlay.pointer_enter(self.selected, at, popup.renderer());
        }
    }

    fn handle_mouse(&mut self, ev: MouseEvent, now: Instant) {
        if self.popup.is_none() || self.show_help {
            return;
        }
        let at = Point {
            x: ev.column,
            y: ev.row,
        };
        match ev.kind {
            MouseEventKind::Moved => {
                let card = self.hits.card_at(at.x, at.y).map(|c| c.index);
                if let Some(popup) = self.popup.as_ref() {
                    self.overlay.track(card, at, popup.renderer());
                }
            }
            MouseEventKind::Down(MouseButton::Left) => self.click(at, now),
            MouseEventKind::ScrollDown => {
                let step = self.hits.grid_cols.max(1);
                self.select(self.selected.saturating_add(step));
            }
            MouseEventKind::ScrollUp => {
                let step = self.hits.grid_cols.max(1);
                self.select(self.selected.saturating_sub(step));
            }
            _ => {}
        }
    }

    fn click(&mut self, at: Point, now: Instant) {
        // Option presses land before the input loses focus.
        if let Some((field, option)) = self.hits.suggestion_at(at.x, at.y) {
            if let Some(popup) = self.popup.as_mut() {
                popup.tag_pointer_down(field, option);
            }
            return;
        }
        if self.hits.page_prev.is_some_and(|r| contains(r, at.x, at.y)) {
            self.move_focus(Focus::Page, now);
            self.trigger(Trigger::PageDown, now);
            return;
        }
        if self.hits.page_next.is_some_and(|r| contains(r, at.x, at.y)) {
            self.move_focus(Focus::Page, now);
            self.trigger(Trigger::PageUp, now);
            return;
        }
        if let Some(card) = self.hits.card_at(at.x, at.y).copied() {
            self.move_focus(Focus::Results, now);
            self.select(card.index);
            if contains(card.download, at.x, at.y) {
                self.download(card.index);
            }
            return;
        }
        let Some(target) = self.hits.field_at(at.x, at.y) else {
            if let (Some(field), Some(popup)) = (self.focus.tag_field(), self.popup.as_mut()) {
                popup.blur_tag(field, now);
            }
            return;
        };
        self.move_focus(target, now);
        match target {
            Focus::Nsfw => {
                if let Some(popup) = self.popup.as_mut() {
                    popup.form.nsfw = !popup.form.nsfw;
                }
                self.trigger(Trigger::Nsfw, now);
            }
            Focus::Sort => {
                if let Some(popup) = self.popup.as_mut() {
                    popup.form.sort = popup.form.sort.next();
                }
                self.trigger(Trigger::Sort, now);
            }
            Focus::SearchButton => self.trigger(Trigger::SearchButton, now),
            _ => {}
        }
    }

    fn on_event(&mut self, ev: AppEvent) {
        match ev {
            AppEvent::SearchFinished(completion) => {
                let Some(popup) = self.popup.as_mut() else {
                    debug!(
                        container = completion.container.0,
                        "search finished after popup closed"
                    );
                    return;
                };
                match popup.apply(completion) {
                    ApplyOutcome::Painted(count) => {
                        self.selected = 0;
                        self.overlay.invalidate();
                        self.set_status(format!("{count} characters"), StatusKind::Info);
                    }
                    ApplyOutcome::EmptyState => {
                        self.selected = 0;
                        self.overlay.pointer_leave();
                        self.set_status(EMPTY_STATE_MESSAGE, StatusKind::Info);
                    }
                    ApplyOutcome::Detached | ApplyOutcome::Superseded => {}
                }
            }
            AppEvent::TagsLoaded { container, catalog } => match self.popup.as_mut() {
                Some(popup) if popup.container() == container => popup.set_tag_catalog(catalog),
                _ => debug!(container = container.0, "tag catalog for closed popup dropped"),
            },
            AppEvent::Imported { full_path, paths } => {
                let shown = paths
                    .first()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| full_path.clone());
                self.set_status(format!("Imported {shown}"), StatusKind::Success);
                self.imported.extend(paths);
            }
            AppEvent::Notice { text, kind } => self.set_status(text, kind),
        }
    }

    /// Advances timers; a settled search becomes a command.
    fn tick(&mut self, now: Instant) {
        if let Some(popup) = self.popup.as_mut()
            && let Some(ticket) = popup.tick(now)
        {
            self.commands.push(Command::Search(ticket));
        }
        self.persist_settings();
    }
}

/// Applies a digit or backspace to a numeric input. Returns true on change.
fn edit_digits(buffer: &mut String, code: KeyCode) -> bool {
    match code {
        KeyCode::Char(c) if c.is_ascii_digit() => {
            buffer.push(c);
            true
        }
        KeyCode::Backspace => buffer.pop().is_some(),
        _ => false,
    }
}

pub fn help_lines(palette: ThemePalette) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    let add_section = |title: &str, items: &[(&str, &str)]| -> Vec<Line<'static>> {
        let mut v = Vec::new();
        v.push(Line::from(Span::styled(title.to_string(), palette.title())));
        for (keys, what) in items {
            v.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(keys.to_string(), kbd_style(palette)),
                Span::raw(format!("  {what}")),
            ]));
        }
        v.push(Line::from(""));
        v
    };

    lines.extend(add_section(
        "Popup",
        &[
            (shortcuts::OPEN_POPUP, "open the search popup"),
            (shortcuts::CLOSE_POPUP, "close it (settings are saved)"),
            (
                "Tab / Shift+Tab",
                "move between search term, tags, paging, sort, NSFW, Search, results",
            ),
            (shortcuts::FOCUS_RESULTS, "jump to the results grid"),
        ],
    ));
    lines.extend(add_section(
        "Search",
        &[
            (shortcuts::SEARCH, "in the search term runs the search"),
            ("typing", "in include/exclude tags searches as you type (500 ms debounce)"),
            ("PgUp / PgDn", "previous / next page; ◀ ▶ also work with the mouse"),
            ("←/→", "on Sort cycles the order; Space toggles NSFW"),
        ],
    ));
    lines.extend(add_section(
        "Tag suggestions",
        &[
            (shortcuts::SUGGEST_NEXT, "next suggestion"),
            (shortcuts::SUGGEST_PREV, "previous suggestion"),
            (shortcuts::SUGGEST_ACCEPT, "accept the highlighted tag"),
            (shortcuts::SUGGEST_DISMISS, "dismiss"),
        ],
    ));
    lines.extend(add_section(
        "Results",
        &[
            ("arrows", "move between cards; hover shows the full description"),
            (shortcuts::PREVIEW, "preview the selected card's description"),
            (shortcuts::DOWNLOAD, "download the selected card into the import folder"),
            (shortcuts::COPY_LINK, "show the card's page link in the status line"),
        ],
    ));
    lines.extend(add_section(
        "General",
        &[
            (shortcuts::HELP, "toggle this help"),
            (shortcuts::THEME, "dark/light theme"),
            ("q / Ctrl+C", "quit"),
        ],
    ));

    lines
}

fn render_help_overlay(frame: &mut Frame, palette: ThemePalette, scroll: u16) {
    let area = frame.area();
    let popup_area = centered_rect(70, 70, area);
    let lines = help_lines(palette);
    let block = Block::default()
        .title(Span::styled("Help / Shortcuts", palette.title()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));

    frame.render_widget(Clear, popup_area);

    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: true })
            .scroll((scroll, 0)),
        popup_area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1]);

    horizontal[1]
}

pub fn footer_legend(show_help: bool) -> &'static str {
    if show_help {
        "Esc close help • ↑/↓ scroll • F1 toggle help • F2 theme"
    } else {
        "F1 help | s search | Tab fields | Enter search | PgUp/PgDn page | d download | o link | Space preview | F2 theme | Esc close | q quit"
    }
}

fn field_block(label: &str, focused: bool, palette: ThemePalette) -> Block<'static> {
    Block::default()
        .title(Span::styled(label.to_string(), palette.hint_style()))
        .borders(Borders::ALL)
        .border_style(if focused {
            palette.border_focus_style()
        } else {
            palette.border_style()
        })
}

fn input_line(value: &str, focused: bool, placeholder: &str, palette: ThemePalette) -> Line<'static> {
    let mut spans = Vec::new();
    if value.is_empty() && !focused {
        spans.push(Span::styled(placeholder.to_string(), palette.hint_style()));
    } else {
        spans.push(Span::styled(value.to_string(), Style::default().fg(palette.fg)));
    }
    if focused {
        spans.push(Span::styled("▏", Style::default().fg(palette.accent)));
    }
    Line::from(spans)
}

fn draw(frame: &mut Frame, app: &App) -> HitMap {
    let palette = app.palette();
    let mut hits = HitMap::default();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(frame.area());

    draw_host(frame, chunks[0], app, palette);
    frame.render_widget(
        Paragraph::new(footer_legend(app.show_help)).style(palette.hint_style()),
        chunks[1],
    );

    if let Some(popup) = app.popup.as_ref() {
        let area = centered_rect(92, 92, chunks[0]);
        draw_popup(frame, area, app, popup, palette, &mut hits);
        draw_suggestions(frame, popup, palette, &mut hits);
        draw_hover(frame, &app.overlay, palette);
    }

    if app.show_help {
        render_help_overlay(frame, palette, app.help_scroll);
    }
    hits
}

fn status_style(kind: StatusKind, palette: ThemePalette) -> Style {
    match kind {
        StatusKind::Info => palette.hint_style(),
        StatusKind::Success => Style::default().fg(palette.success),
        StatusKind::Error => Style::default()
            .fg(palette.error)
            .add_modifier(Modifier::BOLD),
    }
}

fn draw_host(frame: &mut Frame, area: Rect, app: &App, palette: ThemePalette) {
    let block = Block::default()
        .title(Span::styled(" chub-search ", palette.title()))
        .borders(Borders::ALL)
        .border_style(palette.border_style())
        .style(Style::default().bg(palette.bg));
    let mut lines = vec![
        Line::from(vec![
            Span::raw("Press "),
            Span::styled(shortcuts::OPEN_POPUP, kbd_style(palette)),
            Span::raw(" to search Chub for characters, "),
            Span::styled(shortcuts::QUIT, kbd_style(palette)),
            Span::raw(" to quit."),
        ]),
        Line::from(""),
    ];
    if !app.status.text.is_empty() {
        lines.push(Line::from(Span::styled(
            app.status.text.clone(),
            status_style(app.status.kind, palette),
        )));
        lines.push(Line::from(""));
    }
    if !app.imported.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Imported this session ({})", app.imported.len()),
            palette.title(),
        )));
        for path in app.imported.iter().rev().take(20) {
            lines.push(Line::from(format!("  {}", path.display())));
        }
    }
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_popup(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    popup: &PopupSession,
    palette: ThemePalette,
    hits: &mut HitMap,
) {
    frame.render_widget(Clear, area);
    let block = Block::default()
        .title(Span::styled(" Search Chub ", palette.title()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .style(palette.surface_style());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Min(3),    // results
                Constraint::Length(3), // search term
                Constraint::Length(3), // include / exclude
                Constraint::Length(3), // paging, sort, nsfw, button
                Constraint::Length(1), // status
            ]
            .as_ref(),
        )
        .split(inner);

    draw_grid(frame, rows[0], app, popup, palette, hits);

    let form = &popup.form;
    let focused = |f: Focus| app.focus == f;

    frame.render_widget(
        Paragraph::new(input_line(
            &form.search_term,
            focused(Focus::SearchTerm),
            "Search Chub for characters…",
            palette,
        ))
        .block(field_block("Search", focused(Focus::SearchTerm), palette)),
        rows[1],
    );
    hits.fields.push((Focus::SearchTerm, rows[1]));

    let tag_row = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(rows[2]);
    let tags_hint = if popup.catalog_loaded() {
        format!("{} known tags", popup.catalog().len())
    } else {
        "loading tags…".to_string()
    };
    for (focus, field, label, rect) in [
        (Focus::Include, TagField::Include, "Include tags", tag_row[0]),
        (Focus::Exclude, TagField::Exclude, "Exclude tags", tag_row[1]),
    ] {
        frame.render_widget(
            Paragraph::new(input_line(
                popup.tag_input(field).value(),
                focused(focus),
                &format!("comma separated ({tags_hint})"),
                palette,
            ))
            .block(field_block(label, focused(focus), palette)),
            rect,
        );
        hits.fields.push((focus, rect));
    }

    let controls = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length(18), // per page
                Constraint::Length(16), // page
                Constraint::Min(22),    // sort
                Constraint::Length(12), // nsfw
                Constraint::Length(12), // search button
            ]
            .as_ref(),
        )
        .split(rows[3]);

    frame.render_widget(
        Paragraph::new(input_line(
            &form.find_count,
            focused(Focus::ResultsPerPage),
            "10",
            palette,
        ))
        .block(field_block("Per page", focused(Focus::ResultsPerPage), palette)),
        controls[0],
    );
    hits.fields.push((Focus::ResultsPerPage, controls[0]));

    let page_block = field_block("Page", focused(Focus::Page), palette);
    let page_inner = page_block.inner(controls[1]);
    frame.render_widget(page_block, controls[1]);
    let pager = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(2), Constraint::Min(1), Constraint::Length(2)].as_ref())
        .split(page_inner);
    let arrow = Style::default().fg(palette.accent).add_modifier(Modifier::BOLD);
    frame.render_widget(Paragraph::new(Span::styled("◀", arrow)), pager[0]);
    frame.render_widget(
        Paragraph::new(input_line(&form.page, focused(Focus::Page), "1", palette))
            .alignment(Alignment::Center),
        pager[1],
    );
    frame.render_widget(
        Paragraph::new(Span::styled("▶", arrow)).alignment(Alignment::Right),
        pager[2],
    );
    hits.fields.push((Focus::Page, controls[1]));
    hits.page_prev = Some(pager[0]);
    hits.page_next = Some(pager[2]);

    let sort_style = if focused(Focus::Sort) {
        palette.selected_style().fg(palette.fg)
    } else {
        Style::default().fg(palette.fg)
    };
    frame.render_widget(
        Paragraph::new(Span::styled(format!("‹ {} ›", form.sort.label()), sort_style))
            .block(field_block("Sort by", focused(Focus::Sort), palette)),
        controls[2],
    );
    hits.fields.push((Focus::Sort, controls[2]));

    let check = if form.nsfw { "[x] NSFW" } else { "[ ] NSFW" };
    frame.render_widget(
        Paragraph::new(check).block(field_block("", focused(Focus::Nsfw), palette)),
        controls[3],
    );
    hits.fields.push((Focus::Nsfw, controls[3]));

    let button_style = if focused(Focus::SearchButton) {
        palette.highlight_style()
    } else {
        palette.title()
    };
    frame.render_widget(
        Paragraph::new(Span::styled("Search", button_style))
            .alignment(Alignment::Center)
            .block(field_block("", focused(Focus::SearchButton), palette)),
        controls[4],
    );
    hits.fields.push((Focus::SearchButton, controls[4]));

    frame.render_widget(
        Paragraph::new(Span::styled(
            app.status.text.clone(),
            status_style(app.status.kind, palette),
        )),
        rows[4],
    );
}

fn draw_grid(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    popup: &PopupSession,
    palette: ThemePalette,
    hits: &mut HitMap,
) {
    let busy = popup.is_busy();
    let title = if busy {
        Span::styled(" Searching… ", palette.busy_style())
    } else {
        Span::styled(" Characters ", palette.title())
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if app.focus == Focus::Results {
            palette.border_focus_style()
        } else {
            palette.border_style()
        });
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let cards = match popup.renderer().view() {
        ListView::Empty => {
            frame.render_widget(
                Paragraph::new(EMPTY_STATE_MESSAGE)
                    .alignment(Alignment::Center)
                    .style(palette.hint_style()),
                inner,
            );
            return;
        }
        ListView::Cards(cards) if cards.is_empty() => {
            frame.render_widget(
                Paragraph::new("Type a search and press Enter, or start typing tags.")
                    .alignment(Alignment::Center)
                    .style(palette.hint_style()),
                inner,
            );
            return;
        }
        ListView::Cards(cards) => cards,
    };

    let cols = usize::from((inner.width / CARD_MIN_WIDTH).max(1));
    let rows = usize::from((inner.height / CARD_HEIGHT).max(1));
    let per_screen = cols * rows;
    let first = (app.selected / per_screen) * per_screen;
    let card_width = inner.width / cols as u16;
    hits.grid_cols = cols;

    for (slot, card) in cards.iter().skip(first).take(per_screen).enumerate() {
        let x = inner.x + (slot % cols) as u16 * card_width;
        let y = inner.y + (slot / cols) as u16 * CARD_HEIGHT;
        let height = CARD_HEIGHT.min(inner.bottom().saturating_sub(y));
        if height < 3 {
            break;
        }
        let rect = Rect {
            x,
            y,
            width: card_width,
            height,
        };
        let selected = app.selected == card.index;
        let download = draw_card(frame, rect, card, selected, busy, palette);
        hits.cards.push(CardHit {
            index: card.index,
            area: rect,
            download,
        });
    }
}

/// Draws one card and returns the download action's rect.
fn draw_card(
    frame: &mut Frame,
    area: Rect,
    card: &CardView,
    selected: bool,
    busy: bool,
    palette: ThemePalette,
) -> Rect {
    let mut base = Style::default().bg(palette.stripe(card.index)).fg(palette.fg);
    if busy {
        base = base.patch(palette.busy_style());
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(if selected {
            palette.border_focus_style()
        } else {
            palette.border_style()
        })
        .style(base);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(inner);

    let name_style = if selected {
        palette.selected_style().fg(palette.accent)
    } else {
        Style::default().fg(palette.fg).add_modifier(Modifier::BOLD)
    };
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(card.name.clone(), name_style),
            Span::styled(" by ", palette.hint_style()),
            Span::styled(card.author.clone(), Style::default().fg(palette.accent_alt)),
        ])),
        rows[0],
    );
    frame.render_widget(
        Paragraph::new(card.short_description.clone())
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(palette.fg)),
        rows[1],
    );

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Min(0),
                Constraint::Length(DOWNLOAD_LABEL.chars().count() as u16),
            ]
            .as_ref(),
        )
        .split(rows[2]);
    let mut chips = Vec::new();
    for tag in &card.tags {
        if !chips.is_empty() {
            chips.push(Span::raw(" "));
        }
        chips.push(Span::styled(format!("#{tag}"), chip_style(palette)));
    }
    frame.render_widget(Paragraph::new(Line::from(chips)), bottom[0]);
    frame.render_widget(
        Paragraph::new(Span::styled(DOWNLOAD_LABEL, kbd_style(palette))),
        bottom[1],
    );
    bottom[1]
}

fn draw_suggestions(
    frame: &mut Frame,
    popup: &PopupSession,
    palette: ThemePalette,
    hits: &mut HitMap,
) {
    let open = [(TagField::Include, Focus::Include), (TagField::Exclude, Focus::Exclude)]
        .into_iter()
        .find(|(field, _)| popup.tag_input(*field).is_suggesting());
    let Some((field, focus)) = open else {
        return;
    };
    let Some(anchor) = hits.field_rect(focus) else {
        return;
    };
    let input = popup.tag_input(field);
    let options = input.options();
    let screen = frame.area();
    let height = (options.len() as u16 + 2).min(screen.height);
    let y = if anchor.bottom().saturating_add(height) <= screen.bottom() {
        anchor.bottom()
    } else {
        anchor.y.saturating_sub(height)
    };
    let area = Rect {
        x: anchor.x,
        y,
        width: anchor.width.min(40).max(12).min(screen.width),
        height,
    };

    let items: Vec<ListItem> = options
        .iter()
        .enumerate()
        .map(|(i, tag)| {
            let style = if input.cursor() == Some(i) {
                palette.highlight_style()
            } else {
                Style::default().fg(palette.fg)
            };
            ListItem::new(Line::from(Span::styled(tag.clone(), style)))
        })
        .collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(palette.border_focus_style())
        .style(palette.surface_style());
    let inner = block.inner(area);
    frame.render_widget(Clear, area);
    frame.render_widget(List::new(items).block(block), area);

    let rows = (0..options.len() as u16)
        .take_while(|i| *i < inner.height)
        .map(|i| Rect {
            x: inner.x,
            y: inner.y + i,
            width: inner.width,
            height: 1,
        })
        .collect();
    hits.suggestions = Some((field, rows));
}

fn wrapped_height(text: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let lines: usize = text
        .lines()
        .map(|l| l.chars().count().div_ceil(width).max(1))
        .sum();
    u16::try_from(lines.max(1)).unwrap_or(u16::MAX)
}

fn draw_hover(frame: &mut Frame, overlay: &HoverOverlay, palette: ThemePalette) {
    if !overlay.is_visible() {
        return;
    }
    let screen = frame.area();
    let width = HOVER_WIDTH.min(screen.width);
    let height = wrapped_height(overlay.content(), width.saturating_sub(2))
        .saturating_add(2)
        .min(HOVER_MAX_HEIGHT)
        .min(screen.height);
    let pos = overlay.position();
    let area = Rect {
        x: pos.x.min(screen.right().saturating_sub(width)),
        y: pos.y.min(screen.bottom().saturating_sub(height)),
        width,
        height,
    };
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(overlay.content().to_string())
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(palette.accent_alt))
                    .style(palette.surface_style()),
            ),
        area,
    );
}

/// Runtime side of the loop: spawns commands and owns the shared clients.
struct Dispatcher {
    runtime: Handle,
    client: Arc<Client>,
    importer: Arc<DirectoryImporter>,
    tx: UnboundedSender<AppEvent>,
}

impl Dispatcher {
    fn dispatch(&self, command: Command) {
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        match command {
            Command::Search(ticket) => {
                self.runtime.spawn(async move {
                    let records = client.search(&ticket.query).await;
                    let _ = tx.send(AppEvent::SearchFinished(ticket.complete(records)));
                });
            }
            Command::LoadTags(container) => {
                self.runtime.spawn(async move {
                    let catalog = client.fetch_tag_catalog().await;
                    let _ = tx.send(AppEvent::TagsLoaded { container, catalog });
                });
            }
            Command::Download {
                full_path,
                card_image_url,
            } => {
                let importer = Arc::clone(&self.importer);
                self.runtime.spawn(async move {
                    let notifier = ChannelNotifier(tx.clone());
                    let paths = client
                        .download_card(&full_path, &card_image_url, importer.as_ref(), &notifier)
                        .await;
                    if !paths.is_empty() {
                        let _ = tx.send(AppEvent::Imported { full_path, paths });
                    }
                });
            }
        }
    }
}

pub fn run_tui(runtime: Handle, opts: TuiOptions) -> Result<()> {
    if opts.once
        && dotenvy::var("TUI_HEADLESS")
            .map(|v| v == "1")
            .unwrap_or(false)
    {
        return run_tui_headless(&opts);
    }

    let transport = ReqwestProxy::new(opts.endpoints.proxy.clone(), opts.endpoints.timeout)?;
    let (tx, rx) = unbounded_channel();
    let dispatcher = Dispatcher {
        runtime,
        client: Arc::new(RemoteClient::new(transport, opts.endpoints.clone())),
        importer: Arc::new(DirectoryImporter::new(&opts.import_dir)),
        tx,
    };
    let mut app = App::new(SettingsStore::load(&opts.settings_path));
    app.set_status(
        format!("Downloads go to {}", opts.import_dir.display()),
        StatusKind::Info,
    );

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut app, &dispatcher, rx, opts.once);
    app.close_popup();
    teardown_terminal()?;
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    dispatcher: &Dispatcher,
    mut rx: UnboundedReceiver<AppEvent>,
    once: bool,
) -> Result<()> {
    let tick_rate = Duration::from_millis(30);
    loop {
        let mut hits = HitMap::default();
        terminal.draw(|f| hits = draw(f, app))?;
        app.hits = hits;
        if once {
            return Ok(());
        }

        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    app.handle_key(key, Instant::now())
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse, Instant::now()),
                _ => {}
            }
        }
        while let Ok(ev) = rx.try_recv() {
            app.on_event(ev);
        }
        app.tick(Instant::now());
        for command in app.take_commands() {
            dispatcher.dispatch(command);
        }
        if app.quit {
            return Ok(());
        }
    }
}

fn run_tui_headless(opts: &TuiOptions) -> Result<()> {
    let mut app = App::new(SettingsStore::load(&opts.settings_path));
    app.open_popup();
    let mut terminal = Terminal::new(TestBackend::new(120, 40))?;
    let mut hits = HitMap::default();
    terminal.draw(|f| hits = draw(f, &app))?;
    app.hits = hits;
    let queued = app.take_commands().len();
    info!(fields = app.hits.fields.len(), queued, "headless frame rendered");
    Ok(())
}

fn teardown_terminal() -> Result<()> {
    let mut stdout = io::stdout();
    disable_raw_mode()?;
    execute!(stdout, LeaveAlternateScreen, DisableMouseCapture)?;
    Ok(())
}
