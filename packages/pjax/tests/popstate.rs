use dioxus_pjax::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

mod common;
use common::Page;

fn browsed_page() -> Page {
    let page = Page::new(
        "/",
        MemoryDom::default()
            .with_title("Home")
            .with_container("#main", "<p>home</p>"),
    );
    page.pjax.navigate(("/a", "#main")).unwrap();
    page.transport.respond_latest("<title>A</title><p>a</p>");
    page.pjax.navigate(("/b", "#main")).unwrap();
    page.transport.respond_latest("<title>B</title><p>b</p>");
    page
}

#[test]
fn back_replays_the_previous_entry_without_writing_history() {
    let page = browsed_page();
    let writes = page.history.mutations().len();
    assert_eq!(writes, 3);

    let state = page.history.back().unwrap();
    assert_eq!(page.history.location(), "/a");

    let PopstateOutcome::Replayed(handle) = page.pjax.handle_popstate(state.as_ref()) else {
        panic!("expected the entry to be replayed");
    };
    assert_eq!(handle.container(), "#main");

    let request = page.transport.requests().pop().unwrap();
    assert_eq!(request.url, "/a");
    assert_eq!(request.query_value("_pjax"), Some("true"));

    page.transport.respond_latest("<title>A</title><p>a again</p>");
    assert_eq!(handle.status(), NavigationStatus::Applied);
    assert_eq!(page.dom.html("#main").as_deref(), Some("<p>a again</p>"));
    assert_eq!(page.dom.title(), "A");
    assert_eq!(page.history.mutations().len(), writes);
    assert_eq!(page.history.location(), "/a");
}

#[test]
fn back_to_the_initial_entry_is_replayed_too() {
    let page = browsed_page();
    page.history.back();
    let state = page.history.back().unwrap();

    assert_eq!(state, Some(json!({ "pjax": "#main", "timeout": 650 })));
    assert!(matches!(
        page.pjax.handle_popstate(state.as_ref()),
        PopstateOutcome::Replayed(_)
    ));
    assert_eq!(page.transport.requests().pop().unwrap().url, "/");
}

#[test]
fn recorded_url_and_timeout_win() {
    let page = browsed_page();
    let state = json!({ "pjax": "#main", "url": "/a?page=2", "timeout": 1200 });

    let PopstateOutcome::Replayed(handle) = page.pjax.handle_popstate(Some(&state)) else {
        panic!("expected the entry to be replayed");
    };
    assert_eq!(handle.url(), "/a?page=2");

    let request = page.transport.requests().pop().unwrap();
    assert_eq!(request.query_value("page"), Some("2"));
    assert_eq!(request.timeout.as_millis(), 1200);
}

#[test]
fn vanished_container_reloads_the_page() {
    let page = Page::new("/gone", MemoryDom::default().with_container("#main", ""));
    let state = json!({ "pjax": "#nolongerhere", "timeout": 650 });

    assert_eq!(
        page.pjax.handle_popstate(Some(&state)),
        PopstateOutcome::Reloaded("/gone".to_string())
    );
    assert_eq!(page.history.assigned(), vec!["/gone".to_string()]);
    assert!(page.transport.requests().is_empty());
}

#[test]
fn foreign_or_missing_state_reloads_the_page() {
    let page = Page::new("/elsewhere", MemoryDom::default().with_container("#main", ""));

    for state in [None, Some(json!({ "scroll": 120 })), Some(json!({ "pjax": "" }))] {
        assert_eq!(
            page.pjax.handle_popstate(state.as_ref()),
            PopstateOutcome::Reloaded("/elsewhere".to_string())
        );
    }
    assert_eq!(page.history.assigned().len(), 3);
    assert!(page.transport.requests().is_empty());
}

#[test]
fn initial_popstate_is_ignored_once() {
    let page = Page::with_history(
        MemoryHistory::with_initial_url("/start").with_state_support(false),
        MemoryDom::default().with_container("#main", ""),
        PjaxConfig::default(),
    );

    assert_eq!(page.pjax.handle_popstate(None), PopstateOutcome::Ignored);
    assert_eq!(
        page.pjax.handle_popstate(None),
        PopstateOutcome::Reloaded("/start".to_string())
    );
}

#[test]
fn browsers_exposing_state_have_no_initial_popstate() {
    let page = Page::new("/start", MemoryDom::default().with_container("#main", ""));
    assert_eq!(
        page.pjax.handle_popstate(None),
        PopstateOutcome::Reloaded("/start".to_string())
    );
}

#[test]
fn replay_supersedes_a_pending_navigation() {
    let page = browsed_page();
    let pending = page.pjax.navigate(("/c", "#main")).unwrap();

    let state = page.history.back().unwrap();
    page.pjax.handle_popstate(state.as_ref());

    assert_eq!(pending.status(), NavigationStatus::Superseded);
    assert_eq!(page.pjax.controller().in_flight().unwrap().url(), "/a");
}
