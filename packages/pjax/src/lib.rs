#![doc = include_str!("../README.md")]
#![doc(html_logo_url = "https://avatars.githubusercontent.com/u/79236386")]
#![doc(html_favicon_url = "https://avatars.githubusercontent.com/u/79236386")]
#![deny(missing_docs)]

use std::{cell::RefCell, rc::Rc};

use tracing::debug;

pub mod capability;
pub mod classify;
pub mod controller;
pub mod error;
pub mod events;
pub mod interceptor;
pub mod logging;
pub mod options;
pub mod platform;
pub mod popstate;
pub mod state;

use crate::{
    controller::{NavigationController, NavigationHandle},
    error::Result,
    events::{PjaxEvent, Subscription},
    interceptor::LinkTarget,
    options::{NavigationOptions, PjaxConfig},
    platform::{BrowserHistory, ClickHandler, Dom, Transport},
    popstate::{PopstateHandler, PopstateOutcome},
};

/// A collection of useful items most applications might need.
pub mod prelude {
    pub use crate::capability::{supports_pjax, HostEnvironment};
    pub use crate::classify::{Classification, Fragment, ResponseClassifier};
    pub use crate::controller::{
        NavigationController, NavigationHandle, NavigationOutcome, NavigationStatus,
    };
    pub use crate::error::{ConfigError, PjaxError};
    pub use crate::events::{PjaxEvent, Subscription};
    pub use crate::interceptor::{ClickAction, LinkClick, LinkTarget, Modifiers, MouseButton};
    pub use crate::options::{Method, NavigationOptions, NavigationRequest, PjaxConfig, UrlSource};
    pub use crate::platform::memory::{MemoryDom, MemoryHistory, MemoryTransport};
    pub use crate::platform::{BrowserHistory, Dom, Transport};
    pub use crate::popstate::PopstateOutcome;
    pub use crate::state::HistoryState;
    pub use crate::Pjax;

    #[cfg(feature = "web")]
    pub use crate::platform::web::{WebDom, WebHistory, XhrTransport};
}

/// The entry points of pjax for one page.
///
/// When the host does not support the History API (or is a browser known to break with it) every
/// entry point degrades to plain browser behavior: [`Pjax::navigate`] loads the url as a normal
/// page and [`Pjax::hijack`] binds nothing.
///
/// Cloning is cheap and every clone drives the same controller.
#[derive(Clone)]
pub struct Pjax {
    controller: NavigationController,
    supported: bool,
    popstate: Rc<RefCell<PopstateHandler>>,
}

impl Pjax {
    /// Set up pjax over the given collaborators.
    ///
    /// Browser capabilities are checked once, here, unless [`PjaxConfig::force_support`] overrides it.
    pub fn new(
        dom: Rc<dyn Dom>,
        history: Rc<dyn BrowserHistory>,
        transport: Rc<dyn Transport>,
        config: PjaxConfig,
    ) -> Self {
        let supported = config
            .force_support
            .unwrap_or_else(|| capability::supports_pjax(&history.environment()));
        if !supported {
            debug!("pjax is not supported here, links behave normally");
        }

        let popstate = PopstateHandler::new(history.has_state(), history.location());
        Self {
            controller: NavigationController::new(dom, history, transport, config),
            supported,
            popstate: Rc::new(RefCell::new(popstate)),
        }
    }

    /// Whether partial navigation is enabled.
    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// The controller running the navigations.
    pub fn controller(&self) -> &NavigationController {
        &self.controller
    }

    /// Load `options.url` into `options.container`.
    ///
    /// ```rust
    /// # use dioxus_pjax::prelude::*;
    /// # use std::rc::Rc;
    /// # let dom = Rc::new(MemoryDom::default().with_container("#list", ""));
    /// # let pjax = Pjax::new(dom, Rc::new(MemoryHistory::default()), Rc::new(MemoryTransport::default()), PjaxConfig::default());
    /// let handle = pjax
    ///     .navigate(NavigationOptions::new("/items?sort=asc").container("#list"))
    ///     .unwrap();
    /// assert!(handle.is_pending());
    /// ```
    pub fn navigate(&self, options: impl Into<NavigationOptions>) -> Result<NavigationHandle> {
        let options = options.into();
        if self.supported {
            return self.controller.navigate(options);
        }

        let url = options.resolve_url()?;
        debug!(%url, "loading the page normally");
        self.controller.history().assign(&url);
        Ok(NavigationHandle::redirected(self.controller.next_id(), url))
    }

    /// Load clicks on elements matching `links` into a container instead of following them.
    ///
    /// `target` is either the container selector or a full set of options. Each link's `href`
    /// becomes the url of the navigation, and a `data-pjax` attribute on the link overrides the
    /// container. Clicks that ask for a new tab or window are left alone.
    ///
    /// Dropping the returned subscription unbinds the handler.
    pub fn hijack(
        &self,
        links: &str,
        target: impl Into<LinkTarget>,
        options: Option<NavigationOptions>,
    ) -> Result<Subscription> {
        let configured = interceptor::link_options(target.into(), options)?;
        if !self.supported {
            return Ok(Subscription::inert());
        }

        let controller = self.controller.clone();
        let handler: ClickHandler =
            Rc::new(move |click| interceptor::intercept(&controller, &configured, click));
        Ok(self.controller.dom().delegate_click(links, handler))
    }

    /// Handle the browser moving through its session history. `state` is the state object of
    /// the entry that became current.
    pub fn handle_popstate(&self, state: Option<&serde_json::Value>) -> PopstateOutcome {
        if !self.supported {
            return PopstateOutcome::Ignored;
        }

        let location = self.controller.history().location();
        let spurious = self.popstate.borrow_mut().observe(&location);
        if spurious {
            debug!(%location, "ignoring initial popstate");
            return PopstateOutcome::Ignored;
        }
        popstate::replay(state, &location, &self.controller)
    }

    /// Observe lifecycle events of every navigation.
    pub fn subscribe(&self, listener: impl Fn(&PjaxEvent) + 'static) -> Subscription {
        self.controller.subscribe(listener)
    }
}
