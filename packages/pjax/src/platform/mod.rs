//! Platform Integration
//!
//! pjax does not touch the DOM, the network or the History API directly. It relies on three
//! collaborators instead:
//! - a [`Dom`] to find containers, swap their contents, read and write the title, and bind
//!   delegated click handlers,
//! - a [`Transport`] to send fragment requests and abort them,
//! - a [`BrowserHistory`] to write history entries and move the location.
//!
//! [`memory`] provides in-memory implementations of all three, `web` (behind the `web` feature)
//! binds them to a real browser.

use std::{rc::Rc, time::Duration};

use crate::{
    capability::HostEnvironment,
    events::Subscription,
    interceptor::{ClickAction, LinkClick},
    options::{encode_pairs, Method, NavigationRequest, PjaxConfig},
    state::HistoryState,
};

pub mod memory;

#[cfg(feature = "web")]
pub mod web;

/// A delegated click handler.
pub type ClickHandler = Rc<dyn Fn(&LinkClick) -> ClickAction>;

/// The document pjax injects fragments into.
pub trait Dom {
    /// Whether `selector` matches at least one element.
    #[must_use]
    fn exists(&self, selector: &str) -> bool;

    /// Replace the contents of every element matching `selector` with `html`.
    fn set_inner_html(&self, selector: &str, html: &str);

    /// The document title.
    #[must_use]
    fn title(&self) -> String;

    /// Set the document title.
    fn set_title(&self, title: &str);

    /// Call `handler` for clicks on elements matching `selector`, including elements added later.
    ///
    /// The default action of the click must be prevented when the handler returns
    /// [`ClickAction::PreventDefault`]. Dropping the returned subscription unbinds the handler.
    fn delegate_click(&self, selector: &str, handler: ClickHandler) -> Subscription;
}

/// The browser's session history and location.
pub trait BrowserHistory {
    /// What the host supports. Only consulted once, when pjax starts.
    #[must_use]
    fn environment(&self) -> HostEnvironment;

    /// Whether `history.state` can be read. Browsers that expose it do not fire a popstate event
    /// on page load.
    #[must_use]
    fn has_state(&self) -> bool;

    /// Push a new entry.
    fn push_state(&self, state: &HistoryState, title: &str, url: &str);

    /// Replace the current entry. A `url` of `None` keeps the current url.
    fn replace_state(&self, state: &HistoryState, title: &str, url: Option<&str>);

    /// The full current location.
    #[must_use]
    fn location(&self) -> String;

    /// The fragment of the current location, including the leading `#`, or an empty string.
    #[must_use]
    fn hash(&self) -> String;

    /// Set the fragment of the current location. `hash` may or may not start with `#`.
    fn set_hash(&self, hash: &str);

    /// Load `url` as a normal page.
    fn assign(&self, url: &str);
}

/// Called exactly once when a request completes, unless it was aborted.
pub type Completion = Box<dyn FnOnce(Result<FragmentResponse, TransportError>)>;

/// Sends fragment requests.
pub trait Transport {
    /// Start `request` and call `on_complete` when it finishes.
    ///
    /// The timeout of the request is enforced by the transport; an elapsed timeout completes with
    /// [`TransportError::Timeout`]. Implementations may call `on_complete` before returning.
    fn send(&self, request: FragmentRequest, on_complete: Completion) -> Box<dyn InFlightRequest>;
}

/// A request that has been sent but may not have completed.
pub trait InFlightRequest {
    /// Cancel the request. Must be a no-op for requests that already completed.
    fn abort(&self);
}

/// A request that will not be aborted, because it has nothing left to do.
pub struct Finished;

impl InFlightRequest for Finished {
    fn abort(&self) {}
}

/// What goes on the wire for a navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentRequest {
    /// The HTTP method.
    pub method: Method,
    /// The url without its query or fragment.
    pub url: String,
    /// Query pairs: those of the navigation url, followed by the request data for `GET`.
    pub query: Vec<(String, String)>,
    /// The form encoded request data for methods other than `GET`.
    pub body: Option<String>,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// How long the transport may take.
    pub timeout: Duration,
}

impl FragmentRequest {
    /// The wire request for `request`.
    pub fn for_navigation(request: &NavigationRequest, config: &PjaxConfig) -> Self {
        let mut query = request.location.query_pairs();

        let body = match request.method {
            Method::Get => {
                query.extend(request.data.iter().cloned());
                None
            }
            _ => Some(encode_pairs(&request.data)),
        };

        Self {
            method: request.method,
            url: request.location.without_query().to_string(),
            query,
            body,
            headers: vec![(config.header_name().to_string(), "true".to_string())],
            timeout: request.timeout,
        }
    }

    /// The url including the query string.
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        format!("{}?{}", self.url, encode_pairs(&self.query))
    }

    /// The value of the header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The first value of the query key `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }
}

/// A completed response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentResponse {
    /// The HTTP status.
    pub status: u16,
    /// The response body.
    pub body: String,
}

impl FragmentResponse {
    /// A `200 OK` response with `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why a request did not produce a response.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request failed before a response arrived.
    #[error("network error: {0}")]
    Network(String),
    /// The request took longer than its timeout.
    #[error("request timed out")]
    Timeout,
    /// The request was aborted.
    #[error("request aborted")]
    Aborted,
}
