#![allow(dead_code)]

use std::{cell::RefCell, rc::Rc};

use dioxus_pjax::prelude::*;

pub struct Page {
    pub dom: Rc<MemoryDom>,
    pub history: Rc<MemoryHistory>,
    pub transport: Rc<MemoryTransport>,
    pub pjax: Pjax,
}

impl Page {
    pub fn new(url: &str, dom: MemoryDom) -> Self {
        Self::with_history(MemoryHistory::with_initial_url(url), dom, PjaxConfig::default())
    }

    pub fn with_history(history: MemoryHistory, dom: MemoryDom, config: PjaxConfig) -> Self {
        let dom = Rc::new(dom);
        let history = Rc::new(history);
        let transport = Rc::new(MemoryTransport::default());
        let pjax = Pjax::new(dom.clone(), history.clone(), transport.clone(), config);
        Self {
            dom,
            history,
            transport,
            pjax,
        }
    }

    /// Record the names of every lifecycle event, scoped ones as `name container`.
    pub fn record_events(&self) -> (Rc<RefCell<Vec<String>>>, Subscription) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let subscription = self.pjax.subscribe(move |event| {
            let entry = match event.container() {
                Some(container) => format!("{} {container}", event.name()),
                None => event.name().to_string(),
            };
            sink.borrow_mut().push(entry);
        });
        (events, subscription)
    }
}

pub fn state(container: &str, url: Option<&str>) -> HistoryState {
    HistoryState {
        container: container.to_string(),
        url: url.map(str::to_string),
        timeout_ms: 650,
    }
}
