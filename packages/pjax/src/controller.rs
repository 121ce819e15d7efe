//! The navigation controller.
//!
//! The controller owns the only mutable state of pjax: the single in-flight request and the flag
//! recording whether the entry the session started on has been replaced yet. Starting a
//! navigation supersedes the previous one unconditionally, whatever container it targets. A
//! superseded navigation is detached before it is aborted, so a late response can never touch
//! the document or the history stack.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use tracing::{debug, trace, warn};

use crate::{
    classify::{Classification, Fragment, ResponseClassifier},
    error::Result,
    events::{Listeners, PjaxEvent, Subscription},
    options::{NavigationOptions, NavigationRequest, PjaxConfig},
    platform::{
        BrowserHistory, Completion, Dom, Finished, FragmentRequest, FragmentResponse, InFlightRequest,
        Transport, TransportError,
    },
    state::HistoryPlan,
};

/// Where a navigation stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationStatus {
    /// The fragment request has not completed.
    Pending,
    /// The fragment was injected.
    Applied,
    /// The url was loaded as a normal page.
    Redirected,
    /// A newer navigation took over before this one completed.
    Superseded,
}

/// The result of a navigation that completed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The fragment was injected into the container.
    Applied(Fragment),
    /// The browser was sent to the url for a normal page load.
    FallbackRedirect(String),
}

struct HandleInner {
    id: u64,
    url: String,
    container: String,
    status: Cell<NavigationStatus>,
    outcome: RefCell<Option<NavigationOutcome>>,
}

/// A handle to a navigation, in flight or done.
#[derive(Clone)]
pub struct NavigationHandle {
    inner: Rc<HandleInner>,
}

impl NavigationHandle {
    fn new(id: u64, url: String, container: String) -> Self {
        Self {
            inner: Rc::new(HandleInner {
                id,
                url,
                container,
                status: Cell::new(NavigationStatus::Pending),
                outcome: RefCell::new(None),
            }),
        }
    }

    /// A navigation that was handed to the browser right away.
    pub(crate) fn redirected(id: u64, url: String) -> Self {
        let handle = Self::new(id, url.clone(), String::new());
        handle.finish(NavigationOutcome::FallbackRedirect(url));
        handle
    }

    /// Unique (per controller) id of this navigation.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The literal url of the navigation.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// The target container.
    pub fn container(&self) -> &str {
        &self.inner.container
    }

    /// The current status.
    pub fn status(&self) -> NavigationStatus {
        self.inner.status.get()
    }

    /// Whether the navigation has not completed or been superseded yet.
    pub fn is_pending(&self) -> bool {
        self.status() == NavigationStatus::Pending
    }

    /// The outcome, once the navigation completed.
    pub fn outcome(&self) -> Option<NavigationOutcome> {
        self.inner.outcome.borrow().clone()
    }

    fn finish(&self, outcome: NavigationOutcome) {
        let status = match outcome {
            NavigationOutcome::Applied(_) => NavigationStatus::Applied,
            NavigationOutcome::FallbackRedirect(_) => NavigationStatus::Redirected,
        };
        self.inner.status.set(status);
        *self.inner.outcome.borrow_mut() = Some(outcome);
    }

    fn supersede(&self) {
        self.inner.status.set(NavigationStatus::Superseded);
    }
}

impl PartialEq for NavigationHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for NavigationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationHandle")
            .field("id", &self.id())
            .field("url", &self.url())
            .field("container", &self.container())
            .field("status", &self.status())
            .finish()
    }
}

struct InFlight {
    handle: NavigationHandle,
    request: Box<dyn InFlightRequest>,
}

struct ControllerInner {
    dom: Rc<dyn Dom>,
    history: Rc<dyn BrowserHistory>,
    transport: Rc<dyn Transport>,
    config: PjaxConfig,
    listeners: Listeners,
    in_flight: RefCell<Option<InFlight>>,
    active: Cell<bool>,
    next_id: Cell<u64>,
}

/// Runs partial navigations.
///
/// Cloning a controller is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct NavigationController {
    inner: Rc<ControllerInner>,
}

impl NavigationController {
    /// Create a controller over the given collaborators.
    pub fn new(
        dom: Rc<dyn Dom>,
        history: Rc<dyn BrowserHistory>,
        transport: Rc<dyn Transport>,
        config: PjaxConfig,
    ) -> Self {
        Self {
            inner: Rc::new(ControllerInner {
                dom,
                history,
                transport,
                config,
                listeners: Listeners::default(),
                in_flight: RefCell::new(None),
                active: Cell::new(false),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Start a partial navigation.
    ///
    /// Fails only when the options are invalid, in which case nothing is sent. Every other
    /// failure ends in a full page load of the url.
    pub fn navigate(&self, options: impl Into<NavigationOptions>) -> Result<NavigationHandle> {
        let request = options.into().build(&self.inner.config)?;

        self.supersede();

        let handle = NavigationHandle::new(
            self.next_id(),
            request.url.clone(),
            request.container.clone(),
        );
        debug!(id = handle.id(), url = %request.url, container = %request.container, "navigating");

        // take the single-flight slot before any listener runs, so a navigation started from a
        // listener supersedes this one
        *self.inner.in_flight.borrow_mut() = Some(InFlight {
            handle: handle.clone(),
            request: Box::new(Finished),
        });

        self.inner.listeners.emit(&PjaxEvent::Start {
            container: request.container.clone(),
        });
        if !handle.is_pending() {
            debug!(id = handle.id(), "superseded before it was sent");
            return Ok(handle);
        }

        let wire = FragmentRequest::for_navigation(&request, &self.inner.config);
        let on_complete: Completion = {
            let controller = Rc::downgrade(&self.inner);
            let handle = handle.clone();
            let request = request.clone();
            Box::new(move |result| complete(&controller, &handle, &request, result))
        };
        let sent = self.inner.transport.send(wire, on_complete);

        // the transport may have completed synchronously and released the slot
        if let Some(in_flight) = self
            .inner
            .in_flight
            .borrow_mut()
            .as_mut()
            .filter(|in_flight| in_flight.handle == handle)
        {
            in_flight.request = sent;
        }

        self.inner.listeners.emit(&PjaxEvent::Navigate {
            handle: handle.clone(),
            request,
        });

        Ok(handle)
    }

    /// Observe lifecycle events.
    pub fn subscribe(&self, listener: impl Fn(&PjaxEvent) + 'static) -> Subscription {
        self.inner.listeners.subscribe(listener)
    }

    /// The navigation currently in flight.
    pub fn in_flight(&self) -> Option<NavigationHandle> {
        self.inner
            .in_flight
            .borrow()
            .as_ref()
            .map(|in_flight| in_flight.handle.clone())
    }

    /// Whether a push already happened in this session.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// The configuration shared by all navigations.
    pub fn config(&self) -> &PjaxConfig {
        &self.inner.config
    }

    pub(crate) fn dom(&self) -> &Rc<dyn Dom> {
        &self.inner.dom
    }

    pub(crate) fn history(&self) -> &Rc<dyn BrowserHistory> {
        &self.inner.history
    }

    pub(crate) fn next_id(&self) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        id
    }

    fn supersede(&self) {
        let previous = self.inner.in_flight.borrow_mut().take();
        if let Some(InFlight { handle, request }) = previous {
            if handle.is_pending() {
                debug!(id = handle.id(), url = handle.url(), "superseding navigation");
                handle.supersede();
                request.abort();
            }
        }
    }

    fn release(&self, handle: &NavigationHandle) {
        let mut in_flight = self.inner.in_flight.borrow_mut();
        if in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.handle == *handle)
        {
            in_flight.take();
        }
    }

    fn resolve(
        &self,
        request: &NavigationRequest,
        result: std::result::Result<FragmentResponse, TransportError>,
    ) -> NavigationOutcome {
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(url = %request.url, "fragment request failed, loading the page instead: {err}");
                return NavigationOutcome::FallbackRedirect(request.url.clone());
            }
        };

        match ResponseClassifier::classify_response(&response) {
            Classification::Fragment(fragment) => NavigationOutcome::Applied(fragment),
            Classification::FullPageFallback(reason) => {
                warn!(url = %request.url, ?reason, "response is not a fragment, loading the page instead");
                NavigationOutcome::FallbackRedirect(request.url.clone())
            }
        }
    }

    fn apply(&self, request: &NavigationRequest, fragment: &Fragment) {
        let dom = &self.inner.dom;
        let history = &self.inner.history;

        let previous_title = dom.title();
        dom.set_inner_html(&request.container, &fragment.html);
        if let Some(title) = &fragment.title {
            dom.set_title(title);
        }
        let title = dom.title();

        let plan = HistoryPlan::for_request(request, self.is_active(), &previous_title, &title);
        if plan.activates {
            self.inner.active.set(true);
        }
        plan.apply(&**history);

        if request.updates_history() {
            self.inner.listeners.emit(&PjaxEvent::PageView {
                url: request.url.clone(),
            });
        }

        // reassigning an identical hash is a no-op for the browser, so clear it first to make
        // anchors and hashchange listeners fire again
        let hash = history.hash();
        if !hash.is_empty() {
            history.set_hash("");
            history.set_hash(&hash);
        }
    }
}

impl fmt::Debug for NavigationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationController")
            .field("config", &self.inner.config)
            .field("in_flight", &self.in_flight())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

fn complete(
    controller: &Weak<ControllerInner>,
    handle: &NavigationHandle,
    request: &NavigationRequest,
    result: std::result::Result<FragmentResponse, TransportError>,
) {
    if !handle.is_pending() {
        trace!(id = handle.id(), "dropping response of a superseded navigation");
        return;
    }
    let Some(inner) = controller.upgrade() else {
        return;
    };
    let controller = NavigationController { inner };
    controller.release(handle);

    let outcome = controller.resolve(request, result);
    match &outcome {
        NavigationOutcome::Applied(fragment) => controller.apply(request, fragment),
        NavigationOutcome::FallbackRedirect(url) => controller.history().assign(url),
    }
    handle.finish(outcome.clone());

    if let (NavigationOutcome::Applied(fragment), Some(on_success)) =
        (&outcome, &request.on_success)
    {
        on_success(request, fragment);
    }

    controller.inner.listeners.emit(&PjaxEvent::End {
        container: request.container.clone(),
    });
}
