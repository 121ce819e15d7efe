//! Collaborators that keep everything in memory.
//!
//! They behave like a browser closely enough to drive pjax without one: headless rendering,
//! server-side smoke tests, and this crate's own tests.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::{Rc, Weak},
};

use slab::Slab;

use super::{
    BrowserHistory, ClickHandler, Completion, Dom, FragmentRequest, FragmentResponse,
    InFlightRequest, Transport, TransportError,
};
use crate::{
    capability::HostEnvironment,
    events::Subscription,
    interceptor::{ClickAction, LinkClick},
    options::PageUrl,
    state::{HistoryMutation, HistoryState},
};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

type Handlers = Rc<RefCell<Slab<(String, ClickHandler)>>>;

#[derive(Default)]
struct MemoryDomState {
    containers: BTreeMap<String, String>,
    title: String,
}

/// A [`Dom`] made of named containers.
///
/// Selectors are matched literally against the names the containers were created with.
#[derive(Default)]
pub struct MemoryDom {
    state: RefCell<MemoryDomState>,
    handlers: Handlers,
}

impl MemoryDom {
    /// Add a container matched by `selector`.
    pub fn with_container(self, selector: impl Into<String>, html: impl Into<String>) -> Self {
        self.insert_container(selector, html);
        self
    }

    /// Set the document title.
    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.state.borrow_mut().title = title.into();
        self
    }

    /// Add or replace a container.
    pub fn insert_container(&self, selector: impl Into<String>, html: impl Into<String>) {
        self.state
            .borrow_mut()
            .containers
            .insert(selector.into(), html.into());
    }

    /// Remove a container, as if the page structure changed.
    pub fn remove_container(&self, selector: &str) {
        self.state.borrow_mut().containers.remove(selector);
    }

    /// The contents of a container.
    pub fn html(&self, selector: &str) -> Option<String> {
        self.state.borrow().containers.get(selector).cloned()
    }

    /// Click a link matched by `selector`. Returns whether any handler prevented the default
    /// action.
    pub fn click(&self, selector: &str, click: &LinkClick) -> ClickAction {
        let handlers: Vec<ClickHandler> = self
            .handlers
            .borrow()
            .iter()
            .filter(|(_, (bound, _))| bound == selector)
            .map(|(_, (_, handler))| handler.clone())
            .collect();

        let mut action = ClickAction::Default;
        for handler in handlers {
            if handler(click) == ClickAction::PreventDefault {
                action = ClickAction::PreventDefault;
            }
        }
        action
    }

    /// The number of bound click handlers.
    pub fn bound_handlers(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl Dom for MemoryDom {
    fn exists(&self, selector: &str) -> bool {
        self.state.borrow().containers.contains_key(selector)
    }

    fn set_inner_html(&self, selector: &str, html: &str) {
        if let Some(contents) = self.state.borrow_mut().containers.get_mut(selector) {
            *contents = html.to_string();
        }
    }

    fn title(&self) -> String {
        self.state.borrow().title.clone()
    }

    fn set_title(&self, title: &str) {
        self.state.borrow_mut().title = title.to_string();
    }

    fn delegate_click(&self, selector: &str, handler: ClickHandler) -> Subscription {
        let key = self
            .handlers
            .borrow_mut()
            .insert((selector.to_string(), handler));
        let handlers: Weak<_> = Rc::downgrade(&self.handlers);
        Subscription::new(move || {
            if let Some(handlers) = handlers.upgrade() {
                let mut handlers = handlers.borrow_mut();
                if handlers.contains(key) {
                    handlers.remove(key);
                }
            }
        })
    }
}

/// An entry of a [`MemoryHistory`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryEntry {
    /// The state object, as the browser would hand it back.
    pub state: Option<serde_json::Value>,
    /// The title hint.
    pub title: String,
    /// The url of the entry.
    pub url: String,
}

struct MemoryHistoryState {
    entries: Vec<MemoryEntry>,
    index: usize,
    mutations: Vec<HistoryMutation>,
    assigned: Vec<String>,
    hash_writes: Vec<String>,
}

/// A [`BrowserHistory`] that stores the session history in memory and records every write.
///
/// Full page loads ([`BrowserHistory::assign`]) are recorded but do not change the location.
pub struct MemoryHistory {
    state: RefCell<MemoryHistoryState>,
    environment: HostEnvironment,
    has_state: bool,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::with_initial_url("/")
    }
}

impl MemoryHistory {
    /// A history whose only entry is `url`.
    pub fn with_initial_url(url: impl Into<String>) -> Self {
        Self {
            state: RefCell::new(MemoryHistoryState {
                entries: vec![MemoryEntry {
                    state: None,
                    title: String::new(),
                    url: url.into(),
                }],
                index: 0,
                mutations: Vec::new(),
                assigned: Vec::new(),
                hash_writes: Vec::new(),
            }),
            environment: HostEnvironment::modern(DEFAULT_USER_AGENT),
            has_state: true,
        }
    }

    /// Pretend to run in `environment`.
    pub fn with_environment(self, environment: HostEnvironment) -> Self {
        Self {
            environment,
            ..self
        }
    }

    /// Pretend `history.state` is (not) readable.
    pub fn with_state_support(self, has_state: bool) -> Self {
        Self { has_state, ..self }
    }

    /// Every `pushState` and `replaceState`, in order.
    pub fn mutations(&self) -> Vec<HistoryMutation> {
        self.state.borrow().mutations.clone()
    }

    /// Every url loaded as a normal page, in order.
    pub fn assigned(&self) -> Vec<String> {
        self.state.borrow().assigned.clone()
    }

    /// Every hash written with [`BrowserHistory::set_hash`], without the `#`, in order.
    pub fn hash_writes(&self) -> Vec<String> {
        self.state.borrow().hash_writes.clone()
    }

    /// The session history.
    pub fn entries(&self) -> Vec<MemoryEntry> {
        self.state.borrow().entries.clone()
    }

    /// The current entry.
    pub fn current(&self) -> MemoryEntry {
        let state = self.state.borrow();
        state.entries[state.index].clone()
    }

    /// Go back one entry and return the state a popstate event would carry.
    ///
    /// Returns `None` without moving if there is nothing to go back to.
    pub fn back(&self) -> Option<Option<serde_json::Value>> {
        let mut state = self.state.borrow_mut();
        if state.index == 0 {
            return None;
        }
        state.index -= 1;
        Some(state.entries[state.index].state.clone())
    }

    /// Go forward one entry and return the state a popstate event would carry.
    pub fn forward(&self) -> Option<Option<serde_json::Value>> {
        let mut state = self.state.borrow_mut();
        if state.index + 1 >= state.entries.len() {
            return None;
        }
        state.index += 1;
        Some(state.entries[state.index].state.clone())
    }

    fn set_current_url(&self, url: String) {
        let mut state = self.state.borrow_mut();
        let index = state.index;
        state.entries[index].url = url;
    }
}

impl BrowserHistory for MemoryHistory {
    fn environment(&self) -> HostEnvironment {
        self.environment.clone()
    }

    fn has_state(&self) -> bool {
        self.has_state
    }

    fn push_state(&self, record: &HistoryState, title: &str, url: &str) {
        let mut state = self.state.borrow_mut();
        let index = state.index;
        state.entries.truncate(index + 1);
        state.entries.push(MemoryEntry {
            state: Some(record.to_value()),
            title: title.to_string(),
            url: url.to_string(),
        });
        state.index = index + 1;
        state.mutations.push(HistoryMutation::Push {
            state: record.clone(),
            title: title.to_string(),
            url: url.to_string(),
        });
    }

    fn replace_state(&self, record: &HistoryState, title: &str, url: Option<&str>) {
        let mut state = self.state.borrow_mut();
        let index = state.index;
        let entry = &mut state.entries[index];
        entry.state = Some(record.to_value());
        entry.title = title.to_string();
        if let Some(url) = url {
            entry.url = url.to_string();
        }
        state.mutations.push(HistoryMutation::Replace {
            state: record.clone(),
            title: title.to_string(),
            url: url.map(str::to_string),
        });
    }

    fn location(&self) -> String {
        self.current().url
    }

    fn hash(&self) -> String {
        PageUrl::parse(&self.location())
            .and_then(|url| {
                url.fragment()
                    .filter(|hash| !hash.is_empty())
                    .map(|hash| format!("#{hash}"))
            })
            .unwrap_or_default()
    }

    fn set_hash(&self, hash: &str) {
        let hash = hash.trim_start_matches('#');
        let Some(mut url) = PageUrl::parse(&self.location()) else {
            return;
        };
        url.set_fragment(Some(hash));
        self.set_current_url(url.to_string());
        self.state.borrow_mut().hash_writes.push(hash.to_string());
    }

    fn assign(&self, url: &str) {
        self.state.borrow_mut().assigned.push(url.to_string());
    }
}

struct PendingRequest {
    request: FragmentRequest,
    completion: Option<Completion>,
    aborted: Rc<Cell<bool>>,
}

/// A [`Transport`] whose requests complete when told to.
#[derive(Default)]
pub struct MemoryTransport {
    requests: RefCell<Vec<PendingRequest>>,
}

impl MemoryTransport {
    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<FragmentRequest> {
        self.requests
            .borrow()
            .iter()
            .map(|pending| pending.request.clone())
            .collect()
    }

    /// Whether the `index`th request was aborted.
    pub fn is_aborted(&self, index: usize) -> bool {
        self.requests
            .borrow()
            .get(index)
            .is_some_and(|pending| pending.aborted.get())
    }

    /// Complete the `index`th request, even if it was aborted. A transport cannot always take
    /// back a response that is already on its way.
    ///
    /// Returns `false` if the request does not exist or already completed.
    pub fn complete(
        &self,
        index: usize,
        result: Result<FragmentResponse, TransportError>,
    ) -> bool {
        let completion = self
            .requests
            .borrow_mut()
            .get_mut(index)
            .and_then(|pending| pending.completion.take());
        match completion {
            Some(completion) => {
                completion(result);
                true
            }
            None => false,
        }
    }

    /// Complete the `index`th request with a `200 OK` and `body`.
    pub fn respond(&self, index: usize, body: impl Into<String>) -> bool {
        self.complete(index, Ok(FragmentResponse::ok(body)))
    }

    /// Complete the most recent request with a `200 OK` and `body`.
    pub fn respond_latest(&self, body: impl Into<String>) -> bool {
        let len = self.requests.borrow().len();
        len > 0 && self.respond(len - 1, body)
    }
}

struct MemoryInFlight {
    aborted: Rc<Cell<bool>>,
}

impl InFlightRequest for MemoryInFlight {
    fn abort(&self) {
        self.aborted.set(true);
    }
}

impl Transport for MemoryTransport {
    fn send(&self, request: FragmentRequest, on_complete: Completion) -> Box<dyn InFlightRequest> {
        let aborted = Rc::new(Cell::new(false));
        self.requests.borrow_mut().push(PendingRequest {
            request,
            completion: Some(on_complete),
            aborted: aborted.clone(),
        });
        Box::new(MemoryInFlight { aborted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(container: &str) -> HistoryState {
        HistoryState {
            container: container.to_string(),
            url: None,
            timeout_ms: 650,
        }
    }

    #[test]
    fn history_stack() {
        let history = MemoryHistory::with_initial_url("/");
        history.push_state(&record("#a"), "A", "/a");
        history.push_state(&record("#b"), "B", "/b");
        assert_eq!(history.location(), "/b");

        assert_eq!(history.back(), Some(Some(record("#a").to_value())));
        assert_eq!(history.location(), "/a");

        // pushing drops the forward entries
        history.push_state(&record("#c"), "C", "/c");
        assert_eq!(history.forward(), None);
        assert_eq!(
            history
                .entries()
                .iter()
                .map(|entry| entry.url.as_str())
                .collect::<Vec<_>>(),
            vec!["/", "/a", "/c"]
        );

        history.replace_state(&record("#d"), "D", None);
        assert_eq!(history.location(), "/c");
        assert_eq!(history.current().title, "D");
        assert_eq!(history.mutations().len(), 4);
    }

    #[test]
    fn hashes() {
        let history = MemoryHistory::with_initial_url("/page#top");
        assert_eq!(history.hash(), "#top");
        history.set_hash("");
        assert_eq!(history.hash(), "");
        history.set_hash("#bottom");
        assert_eq!(history.location(), "/page#bottom");
        assert_eq!(history.hash_writes(), vec!["", "bottom"]);
    }

    #[test]
    fn click_delegation() {
        let dom = MemoryDom::default();
        let subscription = dom.delegate_click(
            "a.pjax",
            Rc::new(|_: &LinkClick| ClickAction::PreventDefault),
        );
        assert_eq!(dom.bound_handlers(), 1);
        assert_eq!(
            dom.click("a.pjax", &LinkClick::new("/")),
            ClickAction::PreventDefault
        );
        assert_eq!(dom.click("a.other", &LinkClick::new("/")), ClickAction::Default);

        drop(subscription);
        assert_eq!(dom.bound_handlers(), 0);
        assert_eq!(dom.click("a.pjax", &LinkClick::new("/")), ClickAction::Default);
    }

    #[test]
    fn transport_completes_once() {
        let transport = MemoryTransport::default();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let in_flight = transport.send(
            FragmentRequest {
                method: Default::default(),
                url: "/".into(),
                query: vec![],
                body: None,
                headers: vec![],
                timeout: Default::default(),
            },
            Box::new(move |_| counter.set(counter.get() + 1)),
        );

        in_flight.abort();
        assert!(transport.is_aborted(0));
        assert!(transport.respond(0, "late"));
        assert!(!transport.respond(0, "again"));
        assert_eq!(calls.get(), 1);
    }
}
