//! Collaborators backed by a real browser.

use std::{cell::RefCell, rc::Rc};

use gloo::events::{EventListener, EventListenerOptions};
use tracing::error;
use wasm_bindgen::{prelude::Closure, JsCast, JsValue};
use web_sys::{
    window, Document, Element, Event, History, MouseEvent, PopStateEvent, Window, XmlHttpRequest,
};

use super::{
    BrowserHistory, ClickHandler, Completion, Dom, FragmentRequest, FragmentResponse, Finished,
    InFlightRequest, Transport, TransportError,
};
use crate::{
    capability::HostEnvironment,
    error::{PjaxError, Result},
    events::Subscription,
    interceptor::{ClickAction, LinkClick, Modifiers, MouseButton},
    options::PjaxConfig,
    state::HistoryState,
    Pjax,
};

fn platform_error(what: &str) -> PjaxError {
    PjaxError::Platform(what.to_string())
}

/// A [`Dom`] over `window.document`.
pub struct WebDom {
    document: Document,
}

impl WebDom {
    /// Bind to the document of the current window.
    pub fn new() -> Result<Self> {
        let document = window()
            .and_then(|window| window.document())
            .ok_or_else(|| platform_error("pjax needs a window with a document"))?;
        Ok(Self { document })
    }

    fn elements(&self, selector: &str) -> Vec<Element> {
        match self.document.query_selector_all(selector) {
            Ok(list) => (0..list.length())
                .filter_map(|index| list.item(index))
                .filter_map(|node| node.dyn_into::<Element>().ok())
                .collect(),
            Err(err) => {
                error!(selector, ?err, "invalid selector");
                Vec::new()
            }
        }
    }
}

impl Dom for WebDom {
    fn exists(&self, selector: &str) -> bool {
        matches!(self.document.query_selector(selector), Ok(Some(_)))
    }

    fn set_inner_html(&self, selector: &str, html: &str) {
        for element in self.elements(selector) {
            element.set_inner_html(html);
        }
    }

    fn title(&self) -> String {
        self.document.title()
    }

    fn set_title(&self, title: &str) {
        self.document.set_title(title);
    }

    fn delegate_click(&self, selector: &str, handler: ClickHandler) -> Subscription {
        let selector = selector.to_string();
        let listener = EventListener::new_with_options(
            &self.document,
            "click",
            EventListenerOptions::enable_prevent_default(),
            move |event| {
                let Some(click) = link_click(event, &selector) else {
                    return;
                };
                if handler(&click) == ClickAction::PreventDefault {
                    event.prevent_default();
                }
            },
        );
        Subscription::new(move || drop(listener))
    }
}

/// Describe a click if it landed on (or inside) an element matching `selector`.
fn link_click(event: &Event, selector: &str) -> Option<LinkClick> {
    let mouse = event.dyn_ref::<MouseEvent>()?;
    let target = event.target()?.dyn_into::<Element>().ok()?;
    let link = target.closest(selector).ok()??;

    // the `href` property is resolved against the document url, the attribute is not
    let href = js_sys::Reflect::get(&link, &JsValue::from_str("href"))
        .ok()
        .and_then(|href| href.as_string())
        .or_else(|| link.get_attribute("href"))?;

    Some(LinkClick {
        button: MouseButton::from_web_code(mouse.button()),
        modifiers: Modifiers {
            meta: mouse.meta_key(),
            ctrl: mouse.ctrl_key(),
            shift: mouse.shift_key(),
            alt: mouse.alt_key(),
        },
        href,
        container_override: link.get_attribute("data-pjax"),
    })
}

/// A [`BrowserHistory`] over the [History API](https://developer.mozilla.org/en-US/docs/Web/API/History_API).
pub struct WebHistory {
    window: Window,
    history: History,
}

impl WebHistory {
    /// Bind to the history of the current window.
    pub fn new() -> Result<Self> {
        let window = window().ok_or_else(|| platform_error("pjax needs a window"))?;
        let history = window
            .history()
            .map_err(|_| platform_error("`window` has no access to `history`"))?;
        Ok(Self { window, history })
    }

    fn has_function(&self, name: &str) -> bool {
        js_sys::Reflect::get(&self.history, &JsValue::from_str(name))
            .map(|value| value.is_function())
            .unwrap_or(false)
    }
}

impl BrowserHistory for WebHistory {
    fn environment(&self) -> HostEnvironment {
        HostEnvironment {
            has_push_state: self.has_function("pushState"),
            has_replace_state: self.has_function("replaceState"),
            user_agent: self.window.navigator().user_agent().unwrap_or_default(),
        }
    }

    fn has_state(&self) -> bool {
        js_sys::Reflect::has(&self.history, &JsValue::from_str("state")).unwrap_or(false)
    }

    fn push_state(&self, state: &HistoryState, title: &str, url: &str) {
        let value = match serde_wasm_bindgen::to_value(state) {
            Ok(value) => value,
            Err(err) => {
                error!(%err, "failed to serialize history state");
                return;
            }
        };
        if let Err(err) = self.history.push_state_with_url(&value, title, Some(url)) {
            error!(?err, url, "failed to push state");
        }
    }

    fn replace_state(&self, state: &HistoryState, title: &str, url: Option<&str>) {
        let value = match serde_wasm_bindgen::to_value(state) {
            Ok(value) => value,
            Err(err) => {
                error!(%err, "failed to serialize history state");
                return;
            }
        };
        if let Err(err) = self.history.replace_state_with_url(&value, title, url) {
            error!(?err, ?url, "failed to replace state");
        }
    }

    fn location(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn hash(&self) -> String {
        self.window.location().hash().unwrap_or_default()
    }

    fn set_hash(&self, hash: &str) {
        if let Err(err) = self.window.location().set_hash(hash) {
            error!(?err, hash, "failed to set hash");
        }
    }

    fn assign(&self, url: &str) {
        if let Err(err) = self.window.location().assign(url) {
            error!(?err, url, "failed to navigate");
        }
    }
}

/// A [`Transport`] over `XMLHttpRequest`.
#[derive(Clone, Copy, Debug, Default)]
pub struct XhrTransport;

struct XhrInFlight {
    xhr: XmlHttpRequest,
}

impl InFlightRequest for XhrInFlight {
    fn abort(&self) {
        self.xhr.set_onload(None);
        self.xhr.set_onerror(None);
        self.xhr.set_ontimeout(None);
        if let Err(err) = self.xhr.abort() {
            error!(?err, "failed to abort fragment request");
        }
    }
}

impl Transport for XhrTransport {
    fn send(&self, request: FragmentRequest, on_complete: Completion) -> Box<dyn InFlightRequest> {
        let completion = Rc::new(RefCell::new(Some(on_complete)));
        let finish = move |result: std::result::Result<FragmentResponse, TransportError>| {
            let completion = completion.borrow_mut().take();
            if let Some(completion) = completion {
                completion(result);
            }
        };
        let finish = Rc::new(finish);

        match open(&request) {
            Ok(xhr) => {
                let load = {
                    let xhr = xhr.clone();
                    let finish = finish.clone();
                    Closure::<dyn FnMut()>::new(move || {
                        let status = xhr.status().unwrap_or_default();
                        let body = xhr.response_text().ok().flatten().unwrap_or_default();
                        finish(Ok(FragmentResponse { status, body }));
                    })
                    .into_js_value()
                };
                let failed = {
                    let finish = finish.clone();
                    Closure::<dyn FnMut()>::new(move || {
                        finish(Err(TransportError::Network("request failed".to_string())))
                    })
                    .into_js_value()
                };
                let timed_out = {
                    let finish = finish.clone();
                    Closure::<dyn FnMut()>::new(move || finish(Err(TransportError::Timeout)))
                        .into_js_value()
                };

                xhr.set_onload(Some(load.unchecked_ref()));
                xhr.set_onerror(Some(failed.unchecked_ref()));
                xhr.set_ontimeout(Some(timed_out.unchecked_ref()));

                if let Err(err) = xhr.send_with_opt_str(request.body.as_deref()) {
                    finish(Err(TransportError::Network(format!("{err:?}"))));
                    return Box::new(Finished);
                }
                Box::new(XhrInFlight { xhr })
            }
            Err(err) => {
                finish(Err(TransportError::Network(format!("{err:?}"))));
                Box::new(Finished)
            }
        }
    }
}

fn open(request: &FragmentRequest) -> std::result::Result<XmlHttpRequest, JsValue> {
    let xhr = XmlHttpRequest::new()?;
    xhr.open_with_async(request.method.as_str(), &request.full_url(), true)?;
    for (name, value) in &request.headers {
        xhr.set_request_header(name, value)?;
    }
    if request.body.is_some() {
        xhr.set_request_header("Content-Type", "application/x-www-form-urlencoded")?;
    }
    xhr.set_timeout(request.timeout.as_millis().min(u32::MAX as u128) as u32);
    Ok(xhr)
}

impl Pjax {
    /// Set up pjax in the current browser window.
    pub fn web(config: PjaxConfig) -> Result<Self> {
        Ok(Self::new(
            Rc::new(WebDom::new()?),
            Rc::new(WebHistory::new()?),
            Rc::new(XhrTransport),
            config,
        ))
    }

    /// Replay pjax history entries when the user goes back or forward.
    pub fn bind_popstate(&self) -> Result<Subscription> {
        let window = window().ok_or_else(|| platform_error("pjax needs a window"))?;
        let pjax = self.clone();
        let listener = EventListener::new(&window, "popstate", move |event| {
            let state = event
                .dyn_ref::<PopStateEvent>()
                .map(PopStateEvent::state)
                .and_then(|state| serde_wasm_bindgen::from_value::<HistoryState>(state).ok())
                .map(|state| state.to_value());
            pjax.handle_popstate(state.as_ref());
        });
        Ok(Subscription::new(move || drop(listener)))
    }
}
