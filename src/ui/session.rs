//! Everything that lives exactly as long as one open search popup.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::ChubSettings;
use crate::model::types::TagCatalog;
use crate::search::debounce::SEARCH_DEBOUNCE;
use crate::search::form::{SearchForm, Trigger};
use crate::search::orchestrator::{
    ApplyOutcome, ContainerId, Orchestrator, SearchCompletion, SearchTicket,
};
use crate::ui::autocomplete::{AutocompleteController, AutocompleteKey, KeyOutcome};
use crate::ui::render::ListRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagField {
    Include,
    Exclude,
}

impl TagField {
    pub fn trigger(self) -> Trigger {
        match self {
            TagField::Include => Trigger::IncludeTags,
            TagField::Exclude => Trigger::ExcludeTags,
        }
    }
}

#[derive(Debug)]
pub struct PopupSession {
    container: ContainerId,
    pub form: SearchForm,
    orchestrator: Orchestrator,
    renderer: ListRenderer,
    catalog: TagCatalog,
    catalog_loaded: bool,
    /// Fields whose autocomplete committed since the last tick.
    commits: Rc<RefCell<VecDeque<Trigger>>>,
}

impl PopupSession {
    pub fn open(container: ContainerId, settings: ChubSettings) -> Self {
        Self::with_debounce(container, settings, SEARCH_DEBOUNCE)
    }

    pub fn with_debounce(container: ContainerId, settings: ChubSettings, delay: Duration) -> Self {
        let mut form = SearchForm::new(settings);
        let commits = Rc::new(RefCell::new(VecDeque::new()));
        for (field, input) in [
            (TagField::Include, &mut form.include),
            (TagField::Exclude, &mut form.exclude),
        ] {
            let queue = Rc::clone(&commits);
            input.on_commit(move |_value: &str| queue.borrow_mut().push_back(field.trigger()));
        }
        Self {
            container,
            form,
            orchestrator: Orchestrator::with_delay(container, delay),
            renderer: ListRenderer::default(),
            catalog: TagCatalog::default(),
            catalog_loaded: false,
            commits,
        }
    }

    pub fn container(&self) -> ContainerId {
        self.container
    }

    pub fn renderer(&self) -> &ListRenderer {
        &self.renderer
    }

    pub fn is_busy(&self) -> bool {
        self.orchestrator.is_busy()
    }

    pub fn catalog(&self) -> &TagCatalog {
        &self.catalog
    }

    pub fn catalog_loaded(&self) -> bool {
        self.catalog_loaded
    }

    pub fn set_tag_catalog(&mut self, catalog: TagCatalog) {
        debug!(container = self.container.0, tags = catalog.len(), "tag catalog attached");
        self.catalog = catalog;
        self.catalog_loaded = true;
    }

    pub fn settings(&self) -> ChubSettings {
        self.form.settings()
    }

    pub fn tag_input(&self, field: TagField) -> &AutocompleteController {
        match field {
            TagField::Include => &self.form.include,
            TagField::Exclude => &self.form.exclude,
        }
    }

    fn tag_input_mut(&mut self, field: TagField) -> &mut AutocompleteController {
        match field {
            TagField::Include => &mut self.form.include,
            TagField::Exclude => &mut self.form.exclude,
        }
    }

    /// A form control changed: read the form and queue a debounced search.
    pub fn trigger(&mut self, trigger: Trigger, now: Instant) {
        let query = self.form.submit(trigger);
        self.orchestrator.request(query, now);
    }

    pub fn type_tag_char(&mut self, field: TagField, c: char, now: Instant) {
        let input = match field {
            TagField::Include => &mut self.form.include,
            TagField::Exclude => &mut self.form.exclude,
        };
        input.insert_char(c, &self.catalog);
        self.trigger(field.trigger(), now);
    }

    pub fn backspace_tag(&mut self, field: TagField, now: Instant) {
        let input = match field {
            TagField::Include => &mut self.form.include,
            TagField::Exclude => &mut self.form.exclude,
        };
        input.backspace(&self.catalog);
        self.trigger(field.trigger(), now);
    }

    pub fn tag_key(&mut self, field: TagField, key: AutocompleteKey) -> KeyOutcome {
        self.tag_input_mut(field).handle_key(key)
    }

    pub fn tag_pointer_down(&mut self, field: TagField, option: usize) -> bool {
        self.tag_input_mut(field).pointer_down(option)
    }

    pub fn blur_tag(&mut self, field: TagField, now: Instant) {
        self.tag_input_mut(field).blur(now);
    }

    /// Advances timers. Autocomplete commits become searches here, then the
    /// debounce gets a chance to fire.
    pub fn tick(&mut self, now: Instant) -> Option<SearchTicket> {
        let committed: Vec<Trigger> = self.commits.borrow_mut().drain(..).collect();
        for trigger in committed {
            self.trigger(trigger, now);
        }
        self.form.include.tick(now);
        self.form.exclude.tick(now);
        self.orchestrator.poll(now)
    }

    /// Paints a finished search if it still belongs to this popup.
    pub fn apply(&mut self, completion: SearchCompletion) -> ApplyOutcome {
        self.orchestrator.complete(completion, &mut self.renderer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::CatalogRecord;
    use crate::ui::render::ListView;

    fn session() -> PopupSession {
        let mut s = PopupSession::with_debounce(ContainerId(7), ChubSettings::default(), Duration::ZERO);
        s.set_tag_catalog(TagCatalog::new(["mage", "magic", "warrior"]));
        s
    }

    #[test]
    fn autocomplete_commit_queues_a_search_with_new_value() {
        let now = Instant::now();
        let mut s = session();
        for c in "elf, ma".chars() {
            s.type_tag_char(TagField::Include, c, now);
        }
        let typed = s.tick(now).unwrap();
        assert_eq!(typed.query.include_tags, vec!["elf", "ma"]);

        assert_eq!(s.tag_key(TagField::Include, AutocompleteKey::ArrowDown), KeyOutcome::Consumed);
        assert_eq!(s.tag_key(TagField::Include, AutocompleteKey::Enter), KeyOutcome::Consumed);
        let committed = s.tick(now).unwrap();
        assert_eq!(committed.query.include_tags, vec!["elf", "mage"]);
        assert!(committed.generation > typed.generation);
    }

    #[test]
    fn field_change_resets_page_before_search() {
        let now = Instant::now();
        let mut s = session();
        s.form.page = "3".into();
        s.trigger(Trigger::PageUp, now);
        assert_eq!(s.tick(now).unwrap().query.page, 4);
        s.trigger(Trigger::Nsfw, now);
        assert_eq!(s.tick(now).unwrap().query.page, 1);
    }

    #[test]
    fn stale_and_foreign_completions_never_paint() {
        let now = Instant::now();
        let mut s = session();
        s.trigger(Trigger::SearchButton, now);
        let ticket = s.tick(now).unwrap();
        let foreign = SearchCompletion {
            container: ContainerId(6),
            generation: ticket.generation,
            records: vec![CatalogRecord {
                id: None,
                name: "ghost".into(),
                description: "boo".into(),
                full_path: "x/ghost".into(),
                tags: vec![],
                author: "x".into(),
                thumbnail_url: String::new(),
                card_image_url: String::new(),
            }],
        };
        assert_eq!(s.apply(foreign), ApplyOutcome::Detached);
        assert_eq!(s.apply(ticket.complete(vec![])), ApplyOutcome::EmptyState);
        assert_eq!(s.renderer().view(), &ListView::Empty);
    }
}
