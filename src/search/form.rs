//! Popup form state and the query it produces.

use crate::config::{ChubSettings, DEFAULT_FIND_COUNT};
use crate::model::types::{SearchQuery, SortKey, split_tags};
use crate::ui::autocomplete::AutocompleteController;

/// Control that caused a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    SearchButton,
    SearchTerm,
    IncludeTags,
    ExcludeTags,
    Sort,
    Nsfw,
    ResultsPerPage,
    PageNumber,
    PageUp,
    PageDown,
}

impl Trigger {
    /// Pager controls keep the current page; everything else starts over at 1.
    pub fn is_pager(self) -> bool {
        matches!(self, Trigger::PageNumber | Trigger::PageUp | Trigger::PageDown)
    }
}

#[derive(Debug)]
pub struct SearchForm {
    pub search_term: String,
    pub include: AutocompleteController,
    pub exclude: AutocompleteController,
    /// Raw text of the results-per-page input.
    pub find_count: String,
    /// Raw text of the page number input.
    pub page: String,
    pub sort: SortKey,
    pub nsfw: bool,
}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n >= 1)
}

impl SearchForm {
    pub fn new(settings: ChubSettings) -> Self {
        Self {
            search_term: String::new(),
            include: AutocompleteController::new("includeTags"),
            exclude: AutocompleteController::new("excludeTags"),
            find_count: settings.find_count.to_string(),
            page: "1".to_string(),
            sort: SortKey::default(),
            nsfw: settings.nsfw,
        }
    }

    pub fn page_number(&self) -> u32 {
        parse_positive(&self.page).unwrap_or(1)
    }

    pub fn results_per_page(&self) -> u32 {
        parse_positive(&self.find_count).unwrap_or(DEFAULT_FIND_COUNT)
    }

    pub fn page_up(&mut self) {
        self.page = self.page_number().saturating_add(1).to_string();
    }

    pub fn page_down(&mut self) {
        self.page = self.page_number().saturating_sub(1).max(1).to_string();
    }

    /// Values to persist after a search is requested.
    pub fn settings(&self) -> ChubSettings {
        ChubSettings {
            find_count: self.results_per_page(),
            nsfw: self.nsfw,
        }
    }

    /// Reads the form for a search fired by `trigger`, resetting the page
    /// first unless a pager control fired it.
    pub fn submit(&mut self, trigger: Trigger) -> SearchQuery {
        match trigger {
            Trigger::PageUp => self.page_up(),
            Trigger::PageDown => self.page_down(),
            t if !t.is_pager() => self.page = "1".to_string(),
            _ => {}
        }
        SearchQuery {
            search_term: self.search_term.clone(),
            include_tags: split_tags(self.include.value()),
            exclude_tags: split_tags(self.exclude.value()),
            nsfw: self.nsfw,
            sort: Some(self.sort),
            page: self.page_number(),
            results_per_page: self.results_per_page(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::TagCatalog;

    fn form() -> SearchForm {
        SearchForm::new(ChubSettings::default())
    }

    #[test]
    fn non_pager_trigger_resets_page() {
        let mut f = form();
        f.page = "4".into();
        let q = f.submit(Trigger::IncludeTags);
        assert_eq!(q.page, 1);
        assert_eq!(f.page, "1");
    }

    #[test]
    fn pager_triggers_keep_or_move_page() {
        let mut f = form();
        f.page = "4".into();
        assert_eq!(f.submit(Trigger::PageNumber).page, 4);
        assert_eq!(f.submit(Trigger::PageUp).page, 5);
        assert_eq!(f.submit(Trigger::PageDown).page, 4);
    }

    #[test]
    fn page_down_never_goes_below_one() {
        let mut f = form();
        assert_eq!(f.submit(Trigger::PageDown).page, 1);
        f.page = "garbage".into();
        assert_eq!(f.submit(Trigger::PageNumber).page, 1);
    }

    #[test]
    fn tags_are_split_and_blank_entries_dropped() {
        let mut f = form();
        let cat = TagCatalog::default();
        f.include.set_text("elf, mage, ", &cat);
        f.exclude.set_text(" , gore", &cat);
        let q = f.submit(Trigger::SearchButton);
        assert_eq!(q.include_tags, vec!["elf", "mage"]);
        assert_eq!(q.exclude_tags, vec!["gore"]);
    }

    #[test]
    fn invalid_results_per_page_uses_default() {
        let mut f = form();
        f.find_count = "0".into();
        assert_eq!(f.submit(Trigger::ResultsPerPage).results_per_page, DEFAULT_FIND_COUNT);
        f.find_count = "30".into();
        assert_eq!(f.submit(Trigger::ResultsPerPage).results_per_page, 30);
        assert_eq!(f.settings().find_count, 30);
    }
}
