//! State behind one list screen: the query, the visible page and the last
//! error.
//!
//! A refresh is split in two so the controller never has to be borrowed
//! across an await:
//!
//! ```text
//! controller.start() ─▶ PendingRefresh::run().await ─▶ controller.complete()
//! ```
//!
//! Every `start` issues a new ticket, and so does every change to the query.
//! `complete` drops results whose ticket has been superseded, so a slow
//! response for an old search term cannot replace the results of a newer one
//! or write back its page index.
//!
//! Keystrokes and filter picks go through [`ListController::type_search`] and
//! [`ListController::choose_filter`]; [`ListController::settled`] waits out
//! the debounce window, commits the burst once and refreshes.

use std::collections::BTreeMap;
use std::time::Duration;

use petadmin_shared::{ApiError, DomainRecord, ResourceKind};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::ClientConfig;
use crate::debounce::{debounced, DebounceInput, SequenceGate, Ticket};
use crate::query::{apply, Filter, QueryResult, QueryState, SortSpec};
use crate::repository::Repository;

struct Debounce {
    input: DebounceInput<u64>,
    quiet: UnboundedReceiver<u64>,
}

pub struct ListController {
    kind: ResourceKind,
    repo: Repository,
    state: QueryState,
    gate: SequenceGate,
    view: Option<QueryResult<DomainRecord>>,
    error: Option<ApiError>,
    loading: bool,
    debounce: Option<Debounce>,
    /// Bumped on every keystroke or filter pick; the debounce task echoes it.
    generation: u64,
    pending_filters: BTreeMap<String, Option<Filter>>,
    dirty: bool,
}

impl ListController {
    /// A controller without a debounce window: `settled` commits immediately.
    pub fn new(kind: ResourceKind, repo: Repository, page_size: u64) -> Self {
        Self {
            kind,
            repo,
            state: QueryState::new(page_size),
            gate: SequenceGate::new(),
            view: None,
            error: None,
            loading: false,
            debounce: None,
            generation: 0,
            pending_filters: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Page size and debounce window from `config`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_config(kind: ResourceKind, repo: Repository, config: &ClientConfig) -> Self {
        Self::new(kind, repo, config.page_size).with_debounce(config.debounce)
    }

    /// Must be called inside a tokio runtime.
    pub fn with_debounce(mut self, window: Duration) -> Self {
        let (input, quiet) = debounced(window);
        self.debounce = Some(Debounce { input, quiet });
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// The page on screen, if anything has loaded yet.
    pub fn view(&self) -> Option<&QueryResult<DomainRecord>> {
        self.view.as_ref()
    }

    pub fn rows(&self) -> &[DomainRecord] {
        self.view.as_ref().map(|v| v.page.as_slice()).unwrap_or(&[])
    }

    /// Error of the last completed refresh. The previous page stays visible.
    pub fn error(&self) -> Option<&ApiError> {
        self.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True while typed input or filter picks wait for the quiet window.
    pub fn has_pending_input(&self) -> bool {
        self.dirty
    }

    /// Record a keystroke. Results change only once the input settles.
    pub fn type_search(&mut self, input: impl Into<String>) {
        self.state.set_search_input(input);
        self.touch();
    }

    /// A filter pick that is committed together with the typed search.
    pub fn choose_filter(&mut self, name: &str, value: &str) {
        self.pending_filters.insert(name.to_string(), Filter::parse(name, value));
        self.touch();
    }

    /// Wait for the debounce window to pass without new input, then commit
    /// the burst and refresh once.
    ///
    /// Returns `false` when nothing was pending or the result was superseded.
    pub async fn settled(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        let mut stopped = false;
        if let Some(debounce) = self.debounce.as_mut() {
            loop {
                match debounce.quiet.recv().await {
                    Some(generation) if generation == self.generation => break,
                    Some(_) => continue,
                    None => {
                        stopped = true;
                        break;
                    }
                }
            }
        }
        if stopped {
            tracing::warn!(kind = %self.kind, "debounce task stopped; committing input now");
            self.debounce = None;
        }
        self.commit_input();
        self.refresh().await
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.generation += 1;
        if let Some(debounce) = &self.debounce {
            debounce.input.push(self.generation);
        }
    }

    fn commit_input(&mut self) {
        self.dirty = false;
        self.state.commit_search();
        for (name, filter) in std::mem::take(&mut self.pending_filters) {
            self.state.set_filter(name, filter);
        }
        self.supersede();
    }

    /// Any in-flight refresh now belongs to an outdated query.
    fn supersede(&mut self) {
        self.gate.issue();
        self.loading = false;
    }

    /// Commit a search term right away, bypassing the debounce window.
    pub fn set_search(&mut self, term: impl Into<String>) {
        self.state.set_search(term);
        self.supersede();
    }

    /// `value` as chosen in a filter select; `"all"` or empty clears it.
    pub fn set_filter(&mut self, name: &str, value: &str) {
        self.state.set_filter(name, Filter::parse(name, value));
        self.supersede();
    }

    pub fn clear_filter(&mut self, name: &str) {
        self.state.set_filter(name, None);
        self.supersede();
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.state.set_sort(sort);
        self.supersede();
    }

    pub fn toggle_sort(&mut self, key: &str) {
        self.state.toggle_sort(key);
        self.supersede();
    }

    pub fn set_page(&mut self, page: u64) {
        self.state.set_page(page);
        self.supersede();
    }

    pub fn set_page_size(&mut self, size: u64) {
        self.state.set_page_size(size);
        self.supersede();
    }

    /// Snapshot the current query and issue a ticket for it.
    pub fn start(&mut self) -> PendingRefresh {
        self.loading = true;
        PendingRefresh {
            ticket: self.gate.issue(),
            kind: self.kind,
            state: self.state.clone(),
            repo: self.repo.clone(),
        }
    }

    /// Apply a finished refresh. Returns `false` if it was superseded.
    pub fn complete(&mut self, done: Completed) -> bool {
        if !self.gate.is_current(done.ticket) {
            tracing::debug!(kind = %self.kind, ticket = done.ticket.value(), "dropping superseded result");
            return false;
        }
        self.loading = false;

        if let Some(result) = done.result {
            self.state.page = result.pagination.page;
            self.view = Some(result);
        }
        if let Some(err) = &done.error {
            tracing::warn!(kind = %self.kind, error = %err, "list refresh failed");
        }
        self.error = done.error;
        true
    }

    pub async fn refresh(&mut self) -> bool {
        let pending = self.start();
        let done = pending.run().await;
        self.complete(done)
    }
}

/// A refresh that has been started but not yet applied.
pub struct PendingRefresh {
    ticket: Ticket,
    kind: ResourceKind,
    state: QueryState,
    repo: Repository,
}

impl PendingRefresh {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub async fn run(self) -> Completed {
        let outcome = self.repo.read(self.kind).await;
        let result = outcome
            .data
            .as_deref()
            .map(|listing| apply(&listing.records, &self.state));
        Completed {
            ticket: self.ticket,
            result,
            error: outcome.error,
        }
    }
}

#[derive(Debug)]
pub struct Completed {
    ticket: Ticket,
    result: Option<QueryResult<DomainRecord>>,
    error: Option<ApiError>,
}

impl Completed {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }
}
