//! The records stored in the browser history and the rules for writing them.
//!
//! The browser owns the history stack. This module only decides which entries to write after a
//! fragment has been applied; it never edits an entry that was already written.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{options::NavigationRequest, platform::BrowserHistory};

fn default_timeout_ms() -> u64 {
    crate::options::DEFAULT_TIMEOUT.as_millis() as u64
}

/// The state object attached to a history entry written by pjax.
///
/// The `pjax` key doubles as the marker that tells popstate handling the entry is ours.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryState {
    /// Selector of the container the fragment was loaded into.
    #[serde(rename = "pjax")]
    pub container: String,

    /// The url to replay, present only when it differs from the entry's own url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Timeout of the recorded request in milliseconds.
    #[serde(rename = "timeout", default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl HistoryState {
    /// The record describing a successful `request`.
    pub fn for_request(request: &NavigationRequest) -> Self {
        Self {
            container: request.container.clone(),
            url: request.effective_url(),
            timeout_ms: request.timeout.as_millis() as u64,
        }
    }

    /// Read a record back from the untyped state of a history entry.
    ///
    /// Returns `None` for missing state, state written by someone else, and records without a
    /// usable container.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let state: Self = serde_json::from_value(value.clone()).ok()?;
        (!state.container.trim().is_empty()).then_some(state)
    }

    /// The record as an untyped value.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// The timeout of the recorded request.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// This record with the replay url cleared. Used for the entry the session started on.
    pub fn initial(&self) -> Self {
        Self {
            url: None,
            ..self.clone()
        }
    }
}

/// A single write to the history stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryMutation {
    /// `history.replaceState(state, title, url)`.
    Replace {
        /// The new state of the current entry.
        state: HistoryState,
        /// The title hint.
        title: String,
        /// The new url of the current entry, or `None` to keep it.
        url: Option<String>,
    },
    /// `history.pushState(state, title, url)`.
    Push {
        /// The state of the new entry.
        state: HistoryState,
        /// The title hint.
        title: String,
        /// The url of the new entry.
        url: String,
    },
}

impl HistoryMutation {
    /// Perform the write.
    pub fn apply(&self, history: &dyn BrowserHistory) {
        match self {
            Self::Replace { state, title, url } => {
                history.replace_state(state, title, url.as_deref())
            }
            Self::Push { state, title, url } => history.push_state(state, title, url),
        }
    }
}

/// The history writes that follow a successful navigation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryPlan {
    /// The writes, in order.
    pub mutations: Vec<HistoryMutation>,
    /// Whether this plan performs the one-time replace of the entry the session started on.
    pub activates: bool,
}

impl HistoryPlan {
    /// Plan the writes for `request`.
    ///
    /// `active` is whether a push already happened in this session. `previous_title` is the
    /// document title before the fragment was applied and `title` the one after.
    ///
    /// The first push is preceded by a replace of the current entry, so that going back from the
    /// first pjax entry lands on a record we understand instead of one the browser considers
    /// state-less.
    pub fn for_request(
        request: &NavigationRequest,
        active: bool,
        previous_title: &str,
        title: &str,
    ) -> Self {
        let state = HistoryState::for_request(request);

        if request.replace {
            return Self {
                mutations: vec![HistoryMutation::Replace {
                    state,
                    title: title.to_string(),
                    url: Some(request.url.clone()),
                }],
                activates: false,
            };
        }

        if !request.push {
            return Self::default();
        }

        let mut mutations = Vec::with_capacity(2);
        if !active {
            mutations.push(HistoryMutation::Replace {
                state: state.initial(),
                title: previous_title.to_string(),
                url: None,
            });
        }
        mutations.push(HistoryMutation::Push {
            state,
            title: title.to_string(),
            url: request.url.clone(),
        });

        Self {
            mutations,
            activates: !active,
        }
    }

    /// Perform every write of the plan.
    pub fn apply(&self, history: &dyn BrowserHistory) {
        for mutation in &self.mutations {
            mutation.apply(history);
        }
    }
}
