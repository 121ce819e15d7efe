//! Detecting whether the host can run partial navigation at all.

use std::sync::LazyLock;

use regex::Regex;

/// iOS before 4.3 (8F190) does not update the location bar on `pushState`.
static LEGACY_IOS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i) Mobile/([1-7][a-z]|(8([abcde]|f(1[0-8]))))")
        .expect("legacy iOS pattern is valid")
});

/// WebKit engines up to 532 (Mercury and other old embedded browsers) have a broken History API.
static LEGACY_WEBKIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)AppleWebKit/5([0-2]|3[0-2])").expect("legacy WebKit pattern is valid")
});

/// What the host exposes, as far as partial navigation is concerned.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostEnvironment {
    /// `history.pushState` exists.
    pub has_push_state: bool,
    /// `history.replaceState` exists.
    pub has_replace_state: bool,
    /// `navigator.userAgent`.
    pub user_agent: String,
}

impl HostEnvironment {
    /// An environment with a working History API and the given user agent.
    pub fn modern(user_agent: impl Into<String>) -> Self {
        Self {
            has_push_state: true,
            has_replace_state: true,
            user_agent: user_agent.into(),
        }
    }
}

/// Whether partial navigation can be used in `env`.
pub fn supports_pjax(env: &HostEnvironment) -> bool {
    env.has_push_state && env.has_replace_state && !is_denylisted(&env.user_agent)
}

/// Whether the user agent belongs to a browser known to mishandle `pushState`.
pub fn is_denylisted(user_agent: &str) -> bool {
    LEGACY_IOS.is_match(user_agent) || LEGACY_WEBKIT.is_match(user_agent)
}
