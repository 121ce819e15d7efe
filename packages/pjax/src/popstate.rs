//! Back and forward buttons.
//!
//! Entries written by pjax are replayed through the controller without writing history again.
//! Anything we cannot replay safely is reloaded as a normal page.

use tracing::{debug, warn};

use crate::{
    controller::{NavigationController, NavigationHandle},
    options::NavigationOptions,
    state::HistoryState,
};

/// Whether the spurious popstate some browsers fire on page load may still arrive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PopstatePhase {
    /// No popstate has been seen yet and the browser may fire one on load.
    AwaitingFirstEvent {
        /// The location when pjax started.
        initial_url: String,
    },
    /// Every popstate is a real navigation.
    Steady,
}

/// What handling a popstate event did.
#[derive(Clone, Debug, PartialEq)]
pub enum PopstateOutcome {
    /// The event was the spurious one fired on page load.
    Ignored,
    /// The entry was replayed as a partial navigation.
    Replayed(NavigationHandle),
    /// The location was reloaded as a normal page.
    Reloaded(String),
}

/// Tracks the popstate phase of a page.
#[derive(Clone, Debug)]
pub struct PopstateHandler {
    phase: PopstatePhase,
}

impl PopstateHandler {
    /// Create a handler for a page loaded at `initial_url`.
    ///
    /// Browsers that expose `history.state` (`has_state`) do not fire a popstate on load, so
    /// there is nothing to wait for.
    pub fn new(has_state: bool, initial_url: impl Into<String>) -> Self {
        let phase = match has_state {
            true => PopstatePhase::Steady,
            false => PopstatePhase::AwaitingFirstEvent {
                initial_url: initial_url.into(),
            },
        };
        Self { phase }
    }

    /// The current phase.
    pub fn phase(&self) -> &PopstatePhase {
        &self.phase
    }

    /// Record a popstate at `location` and report whether it is the spurious initial one.
    pub fn observe(&mut self, location: &str) -> bool {
        let phase = std::mem::replace(&mut self.phase, PopstatePhase::Steady);
        matches!(phase, PopstatePhase::AwaitingFirstEvent { initial_url } if initial_url == location)
    }
}

/// Replay the history entry carrying `state`, the browser being at `location`.
pub(crate) fn replay(
    state: Option<&serde_json::Value>,
    location: &str,
    controller: &NavigationController,
) -> PopstateOutcome {
    let Some(record) = state.and_then(HistoryState::from_value) else {
        debug!(%location, "popstate without a pjax record, reloading");
        return reload(location, controller);
    };

    if !controller.dom().exists(&record.container) {
        warn!(container = %record.container, %location, "container of the history entry is gone, reloading");
        return reload(location, controller);
    }

    let url = record.url.clone().unwrap_or_else(|| location.to_string());
    let options = NavigationOptions::new(url)
        .container(record.container.clone())
        .timeout(record.timeout())
        .push(false)
        .replace(false);

    match controller.navigate(options) {
        Ok(handle) => PopstateOutcome::Replayed(handle),
        Err(err) => {
            warn!(%location, "cannot replay history entry: {err}");
            reload(location, controller)
        }
    }
}

fn reload(location: &str, controller: &NavigationController) -> PopstateOutcome {
    controller.history().assign(location);
    PopstateOutcome::Reloaded(location.to_string())
}
