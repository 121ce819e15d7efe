//! Lifecycle notifications and the subscriptions that receive them.

use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
};

use slab::Slab;

use crate::{controller::NavigationHandle, options::NavigationRequest};

/// Something observable happened to a navigation.
#[derive(Clone, Debug)]
pub enum PjaxEvent {
    /// A fragment request for `container` is about to be sent. Useful for showing a spinner.
    Start {
        /// The target container.
        container: String,
    },
    /// The fragment request for `container` finished, whatever the outcome. Superseded requests
    /// never finish.
    End {
        /// The target container.
        container: String,
    },
    /// A navigation was issued.
    Navigate {
        /// The in-flight navigation.
        handle: NavigationHandle,
        /// The request after defaults were applied.
        request: NavigationRequest,
    },
    /// A fragment was applied and the history stack now points at `url`. Analytics integrations
    /// should record a page view here.
    PageView {
        /// The url now in the address bar.
        url: String,
    },
}

impl PjaxEvent {
    /// The DOM event name this notification corresponds to.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start.pjax",
            Self::End { .. } => "end.pjax",
            Self::Navigate { .. } => "pjax",
            Self::PageView { .. } => "pageview.pjax",
        }
    }

    /// The container the notification is scoped to, if it is not global.
    pub fn container(&self) -> Option<&str> {
        match self {
            Self::Start { container } | Self::End { container } => Some(container.as_str()),
            Self::Navigate { .. } | Self::PageView { .. } => None,
        }
    }
}

type Listener = Rc<dyn Fn(&PjaxEvent)>;

/// The set of observers of a controller.
#[derive(Clone, Default)]
pub(crate) struct Listeners {
    slots: Rc<RefCell<Slab<Listener>>>,
}

impl Listeners {
    pub(crate) fn subscribe(&self, listener: impl Fn(&PjaxEvent) + 'static) -> Subscription {
        let key = self.slots.borrow_mut().insert(Rc::new(listener));
        let slots = Rc::downgrade(&self.slots);
        Subscription::new(move || remove(&slots, key))
    }

    /// Notify every observer. Observers may subscribe, unsubscribe or navigate while being
    /// notified; they see the set as it was when the event was emitted.
    pub(crate) fn emit(&self, event: &PjaxEvent) {
        tracing::trace!(event = event.name(), container = event.container(), "emitting");
        let listeners: Vec<Listener> = self
            .slots
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.borrow().len()
    }
}

fn remove(slots: &Weak<RefCell<Slab<Listener>>>, key: usize) {
    if let Some(slots) = slots.upgrade() {
        let mut slots = slots.borrow_mut();
        if slots.contains(key) {
            slots.remove(key);
        }
    }
}

/// A registration that is undone when dropped.
///
/// Returned for event observers and for hijacked links. Call [`Subscription::forget`] to keep the
/// registration for the rest of the page's life.
#[must_use = "dropping a subscription unregisters it immediately"]
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// A subscription that runs `teardown` when dropped.
    pub fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A subscription that registered nothing.
    pub fn inert() -> Self {
        Self { teardown: None }
    }

    /// Whether dropping this subscription undoes anything.
    pub fn is_active(&self) -> bool {
        self.teardown.is_some()
    }

    /// Keep the registration alive forever.
    pub fn forget(mut self) {
        self.teardown.take();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn dropping_unsubscribes() {
        let listeners = Listeners::default();
        let seen = Rc::new(Cell::new(0));

        let counter = seen.clone();
        let subscription = listeners.subscribe(move |_| counter.set(counter.get() + 1));
        listeners.emit(&PjaxEvent::PageView { url: "/".into() });
        assert_eq!(seen.get(), 1);

        drop(subscription);
        assert_eq!(listeners.len(), 0);
        listeners.emit(&PjaxEvent::PageView { url: "/".into() });
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn forgotten_subscriptions_stay() {
        let listeners = Listeners::default();
        listeners.subscribe(|_| {}).forget();
        assert_eq!(listeners.len(), 1);
        assert!(!Subscription::inert().is_active());
    }

    #[test]
    fn event_names() {
        let start = PjaxEvent::Start {
            container: "#main".into(),
        };
        assert_eq!(start.name(), "start.pjax");
        assert_eq!(start.container(), Some("#main"));
        assert_eq!(PjaxEvent::PageView { url: "/".into() }.container(), None);
    }
}
