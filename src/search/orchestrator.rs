//! Turns form activity into searches and search results into paint.
//!
//! Requests go through a 500 ms trailing debounce. Each fired search carries
//! the popup's container id and a generation number; a completion is only
//! painted if both still match, so a popup that was closed (or a slower, older
//! request) can never overwrite what is on screen.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::model::types::{CatalogRecord, SearchQuery};
use crate::search::debounce::{Debouncer, SEARCH_DEBOUNCE};
use crate::ui::render::ListRenderer;

/// Identity of one popup's result container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub u64);

/// A search the event loop should run now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub container: ContainerId,
    pub generation: u64,
    pub query: SearchQuery,
}

/// Result of running a [`SearchTicket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCompletion {
    pub container: ContainerId,
    pub generation: u64,
    pub records: Vec<CatalogRecord>,
}

impl SearchTicket {
    pub fn complete(&self, records: Vec<CatalogRecord>) -> SearchCompletion {
        SearchCompletion {
            container: self.container,
            generation: self.generation,
            records,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Cards painted.
    Painted(usize),
    /// Empty-state message painted.
    EmptyState,
    /// Addressed to a container that is no longer on screen.
    Detached,
    /// A newer search was issued after this one.
    Superseded,
}

#[derive(Debug)]
pub struct Orchestrator {
    container: ContainerId,
    debounce: Debouncer<SearchQuery>,
    latest_generation: u64,
    busy: bool,
}

impl Orchestrator {
    pub fn new(container: ContainerId) -> Self {
        Self::with_delay(container, SEARCH_DEBOUNCE)
    }

    pub fn with_delay(container: ContainerId, delay: Duration) -> Self {
        Self {
            container,
            debounce: Debouncer::new(delay),
            latest_generation: 0,
            busy: false,
        }
    }

    pub fn container(&self) -> ContainerId {
        self.container
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Queues `query` behind the debounce; a later request replaces it.
    pub fn request(&mut self, query: SearchQuery, now: Instant) {
        self.debounce.call(query, now);
    }

    /// Fires the settled request, if any.
    pub fn poll(&mut self, now: Instant) -> Option<SearchTicket> {
        let query = self.debounce.poll(now)?;
        self.latest_generation += 1;
        self.busy = true;
        debug!(
            container = self.container.0,
            generation = self.latest_generation,
            page = query.page,
            "search fired"
        );
        Some(SearchTicket {
            container: self.container,
            generation: self.latest_generation,
            query,
        })
    }

    pub fn complete(
        &mut self,
        completion: SearchCompletion,
        renderer: &mut ListRenderer,
    ) -> ApplyOutcome {
        if completion.container != self.container {
            debug!(
                expected = self.container.0,
                got = completion.container.0,
                "dropping result for detached container"
            );
            return ApplyOutcome::Detached;
        }
        if completion.generation != self.latest_generation {
            debug!(
                generation = completion.generation,
                latest = self.latest_generation,
                "dropping superseded result"
            );
            return ApplyOutcome::Superseded;
        }
        self.busy = false;
        if completion.records.is_empty() {
            renderer.render_empty_state();
            ApplyOutcome::EmptyState
        } else {
            let count = completion.records.len();
            renderer.render(completion.records);
            ApplyOutcome::Painted(count)
        }
    }
}
