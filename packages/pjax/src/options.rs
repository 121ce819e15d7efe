//! Navigation options and crate-wide configuration.

use std::{fmt, rc::Rc, sync::LazyLock, time::Duration};

use url::{Position, Url};

use crate::{
    classify::Fragment,
    error::{ConfigError, Result},
};

/// How long a partial fetch may take before it is abandoned for a full page load.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(650);

/// The header attached to every fragment request.
pub const DEFAULT_HEADER: &str = "X-PJAX";

/// The query key attached to every fragment request. Browsers keep one cache entry per URL, so
/// without it a cached fragment could be served for a normal page load (and the other way around).
pub const DEFAULT_MARKER: &str = "_pjax";

/// A user continuation invoked after a fragment has been applied.
pub type SuccessCallback = Rc<dyn Fn(&NavigationRequest, &Fragment)>;

/// Where the url of a navigation comes from.
#[derive(Clone)]
pub enum UrlSource {
    /// A literal url.
    Literal(String),
    /// A producer evaluated once, when the navigation is started.
    Lazy(Rc<dyn Fn() -> String>),
}

impl UrlSource {
    /// Create a url that is computed when the navigation starts.
    pub fn lazy(producer: impl Fn() -> String + 'static) -> Self {
        Self::Lazy(Rc::new(producer))
    }

    /// Get the url, evaluating the producer if there is one.
    pub fn resolve(&self) -> String {
        match self {
            Self::Literal(url) => url.clone(),
            Self::Lazy(producer) => producer(),
        }
    }
}

impl fmt::Debug for UrlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(url) => f.debug_tuple("Literal").field(url).finish(),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

impl From<&str> for UrlSource {
    fn from(url: &str) -> Self {
        Self::Literal(url.to_string())
    }
}

impl From<String> for UrlSource {
    fn from(url: String) -> Self {
        Self::Literal(url)
    }
}

/// The HTTP method used for the fragment request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    /// Extra data is merged into the query string.
    #[default]
    Get,
    /// Extra data is sent as a form encoded body.
    Post,
    /// Extra data is sent as a form encoded body.
    Put,
    /// Extra data is sent as a form encoded body.
    Patch,
    /// Extra data is sent as a form encoded body.
    Delete,
}

impl Method {
    /// The method name as it goes on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a single navigation.
///
/// Every field is optional here and filled in from [`PjaxConfig`] when the options are turned
/// into a [`NavigationRequest`]. This follows the builder pattern:
///
/// ```rust
/// # use dioxus_pjax::prelude::*;
/// # use std::time::Duration;
/// let options = NavigationOptions::new("/items?sort=asc")
///     .container("#list")
///     .timeout(Duration::from_secs(1))
///     .data("page", "2");
/// ```
#[derive(Clone, Default)]
pub struct NavigationOptions {
    pub(crate) url: Option<UrlSource>,
    pub(crate) container: Option<String>,
    pub(crate) push: Option<bool>,
    pub(crate) replace: Option<bool>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) method: Option<Method>,
    pub(crate) data: Vec<(String, String)>,
    pub(crate) on_success: Option<SuccessCallback>,
}

impl NavigationOptions {
    /// Options targeting `url`.
    pub fn new(url: impl Into<UrlSource>) -> Self {
        Self::default().url(url)
    }

    /// The url to load. Defaults to the `href` of the clicked link for hijacked links.
    pub fn url(self, url: impl Into<UrlSource>) -> Self {
        Self {
            url: Some(url.into()),
            ..self
        }
    }

    /// The selector of the element whose contents are replaced by the fragment.
    ///
    /// This has to be a selector and not an element, because it is stored in the history entry
    /// and replayed when the user navigates back.
    pub fn container(self, selector: impl Into<String>) -> Self {
        Self {
            container: Some(selector.into()),
            ..self
        }
    }

    /// Whether to push a new history entry. Defaults to `true`.
    pub fn push(self, push: bool) -> Self {
        Self {
            push: Some(push),
            ..self
        }
    }

    /// Whether to replace the current history entry instead of pushing. Takes precedence over
    /// [`NavigationOptions::push`]. Defaults to `false`.
    pub fn replace(self, replace: bool) -> Self {
        Self {
            replace: Some(replace),
            ..self
        }
    }

    /// How long to wait for the fragment before falling back to a full page load.
    ///
    /// Defaults to [`PjaxConfig::default_timeout`].
    pub fn timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    /// The HTTP method of the fragment request. Defaults to [`Method::Get`].
    pub fn method(self, method: Method) -> Self {
        Self {
            method: Some(method),
            ..self
        }
    }

    /// Add a key/value pair to the request data.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.push((key.into(), value.into()));
        self
    }

    /// Run `callback` after the fragment has been applied.
    pub fn on_success(self, callback: impl Fn(&NavigationRequest, &Fragment) + 'static) -> Self {
        Self {
            on_success: Some(Rc::new(callback)),
            ..self
        }
    }

    /// The configured container selector, if any.
    pub fn container_selector(&self) -> Option<&str> {
        self.container.as_deref()
    }

    /// Check that the container, if one is set, is usable as a selector.
    pub(crate) fn validate_container(&self) -> Result<(), ConfigError> {
        match &self.container {
            Some(selector) if selector.trim().is_empty() => Err(ConfigError::EmptyContainer),
            _ => Ok(()),
        }
    }

    /// Validate the options and fill in the defaults from `config`.
    ///
    /// The container is checked before the url is resolved, so a lazy url is never evaluated for
    /// a navigation that cannot start.
    pub fn build(&self, config: &PjaxConfig) -> Result<NavigationRequest> {
        let container = match &self.container {
            None => return Err(ConfigError::MissingContainer.into()),
            Some(selector) if selector.trim().is_empty() => {
                return Err(ConfigError::EmptyContainer.into())
            }
            Some(selector) => selector.clone(),
        };

        let url = self.resolve_url()?;
        let location = PageUrl::parse(&url).ok_or_else(|| ConfigError::InvalidUrl(url.clone()))?;

        let marker = config.marker_key();
        let mut data = self.data.clone();
        if !data.iter().any(|(key, _)| key == marker) {
            data.push((marker.to_string(), "true".to_string()));
        }

        Ok(NavigationRequest {
            url,
            container,
            push: self.push.unwrap_or(true),
            replace: self.replace.unwrap_or(false),
            timeout: self.timeout.unwrap_or(config.timeout),
            method: self.method.unwrap_or_default(),
            data,
            marker: marker.to_string(),
            location,
            on_success: self.on_success.clone(),
        })
    }

    pub(crate) fn resolve_url(&self) -> Result<String> {
        self.url
            .as_ref()
            .map(UrlSource::resolve)
            .ok_or_else(|| ConfigError::MissingUrl.into())
    }
}

impl fmt::Debug for NavigationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationOptions")
            .field("url", &self.url)
            .field("container", &self.container)
            .field("push", &self.push)
            .field("replace", &self.replace)
            .field("timeout", &self.timeout)
            .field("method", &self.method)
            .field("data", &self.data)
            .field("on_success", &self.on_success.is_some())
            .finish()
    }
}

impl<U: Into<UrlSource>, C: Into<String>> From<(U, C)> for NavigationOptions {
    fn from((url, container): (U, C)) -> Self {
        Self::new(url).container(container)
    }
}

/// A validated navigation, ready to be sent.
#[derive(Clone)]
pub struct NavigationRequest {
    /// The literal url of the navigation. This is what ends up in the address bar.
    pub url: String,
    /// The selector of the element that receives the fragment.
    pub container: String,
    /// Push a history entry on success.
    pub push: bool,
    /// Replace the current history entry on success. Wins over `push`.
    pub replace: bool,
    /// Timeout of the fragment request.
    pub timeout: Duration,
    /// HTTP method of the fragment request.
    pub method: Method,
    /// Extra request data, always including the marker pair.
    pub data: Vec<(String, String)>,
    pub(crate) marker: String,
    pub(crate) location: PageUrl,
    pub(crate) on_success: Option<SuccessCallback>,
}

impl NavigationRequest {
    /// The request data without the marker pair.
    pub fn extra_data(&self) -> impl Iterator<Item = &(String, String)> {
        self.data.iter().filter(move |(key, _)| *key != self.marker)
    }

    /// The form encoded request data without the marker pair.
    pub fn serialized_extra_data(&self) -> String {
        encode_pairs(self.extra_data())
    }

    /// The url that reproduces this navigation, including any extra data.
    ///
    /// Returns `None` when the request carries nothing beyond the marker, in which case the
    /// literal url already describes the navigation.
    pub fn effective_url(&self) -> Option<String> {
        let extra = self.serialized_extra_data();
        if extra.is_empty() {
            return None;
        }

        let mut location = self.location.clone();
        location.append_pairs(self.extra_data());
        Some(location.to_string())
    }

    /// Whether a success updates the history stack.
    pub fn updates_history(&self) -> bool {
        self.replace || self.push
    }
}

impl fmt::Debug for NavigationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationRequest")
            .field("url", &self.url)
            .field("container", &self.container)
            .field("push", &self.push)
            .field("replace", &self.replace)
            .field("timeout", &self.timeout)
            .field("method", &self.method)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

static DOCUMENT_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("http://document.pjax/").expect("document base url is valid"));

/// A url as written in a link: absolute, or relative to the current document.
///
/// Relative urls are resolved against a placeholder origin and written back without it, so they
/// stay relative.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PageUrl {
    url: Url,
    relative: bool,
}

impl PageUrl {
    pub(crate) fn parse(input: &str) -> Option<Self> {
        let url = DOCUMENT_BASE.join(input).ok()?;
        let relative = url.origin() == DOCUMENT_BASE.origin();
        Some(Self { url, relative })
    }

    fn slice(&self, end: Position) -> &str {
        match self.relative {
            true => &self.url[Position::BeforePath..end],
            false => &self.url[..end],
        }
    }

    /// Everything up to the query.
    pub(crate) fn without_query(&self) -> &str {
        self.slice(Position::AfterPath)
    }

    /// The fragment, without the `#`.
    pub(crate) fn fragment(&self) -> Option<&str> {
        self.url.fragment()
    }

    pub(crate) fn query_pairs(&self) -> Vec<(String, String)> {
        self.url.query_pairs().into_owned().collect()
    }

    /// Append form encoded pairs to the query, keeping the fragment last.
    pub(crate) fn append_pairs<'a>(&mut self, pairs: impl IntoIterator<Item = &'a (String, String)>) {
        self.url
            .query_pairs_mut()
            .extend_pairs(pairs.into_iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    pub(crate) fn set_fragment(&mut self, fragment: Option<&str>) {
        self.url.set_fragment(fragment);
    }
}

impl fmt::Display for PageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slice(Position::AfterFragment))
    }
}

pub(crate) fn encode_pairs<'a>(pairs: impl IntoIterator<Item = &'a (String, String)>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.into_iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}

/// Crate-wide settings shared by every navigation of a [`Pjax`](crate::Pjax) instance.
///
/// ```rust
/// # use dioxus_pjax::prelude::*;
/// # use std::time::Duration;
/// let config = PjaxConfig::default()
///     .default_timeout(Duration::from_millis(1000))
///     .header("X-Partial");
/// ```
#[derive(Clone, Debug)]
pub struct PjaxConfig {
    pub(crate) header: String,
    pub(crate) marker: String,
    pub(crate) timeout: Duration,
    pub(crate) force_support: Option<bool>,
}

impl Default for PjaxConfig {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER.to_string(),
            marker: DEFAULT_MARKER.to_string(),
            timeout: DEFAULT_TIMEOUT,
            force_support: None,
        }
    }
}

impl PjaxConfig {
    /// The header that tells the server to render a fragment. Defaults to `X-PJAX`.
    pub fn header(self, header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            ..self
        }
    }

    /// The query key that keeps fragment responses out of the page cache. Defaults to `_pjax`.
    pub fn marker(self, marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            ..self
        }
    }

    /// The timeout used when a navigation does not set one. Defaults to 650ms.
    pub fn default_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Skip the capability check and force partial navigation on or off.
    pub fn force_support(self, supported: bool) -> Self {
        Self {
            force_support: Some(supported),
            ..self
        }
    }

    /// The name of the fragment request header.
    pub fn header_name(&self) -> &str {
        &self.header
    }

    /// The query key of the marker pair.
    pub fn marker_key(&self) -> &str {
        &self.marker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PjaxError;
    use std::cell::Cell;

    #[test]
    fn defaults_are_filled_in() {
        let request = NavigationOptions::new("/items")
            .container("#list")
            .build(&PjaxConfig::default())
            .unwrap();

        assert!(request.push);
        assert!(!request.replace);
        assert_eq!(request.timeout, Duration::from_millis(650));
        assert_eq!(request.method, Method::Get);
        assert_eq!(
            request.data,
            vec![("_pjax".to_string(), "true".to_string())]
        );
    }

    #[test]
    fn missing_container_is_a_configuration_error() {
        let err = NavigationOptions::new("/items")
            .build(&PjaxConfig::default())
            .unwrap_err();
        assert_eq!(err, PjaxError::Configuration(ConfigError::MissingContainer));

        let err = NavigationOptions::new("/items")
            .container("  ")
            .build(&PjaxConfig::default())
            .unwrap_err();
        assert_eq!(err, PjaxError::Configuration(ConfigError::EmptyContainer));
    }

    #[test]
    fn lazy_url_is_not_evaluated_without_a_container() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let options = NavigationOptions::new(UrlSource::lazy(move || {
            counter.set(counter.get() + 1);
            "/lazy".to_string()
        }));

        assert!(options.build(&PjaxConfig::default()).is_err());
        assert_eq!(calls.get(), 0);

        let request = options
            .container("#main")
            .build(&PjaxConfig::default())
            .unwrap();
        assert_eq!(request.url, "/lazy");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn marker_is_not_duplicated() {
        let request = NavigationOptions::new("/items")
            .container("#list")
            .data("_pjax", "true")
            .build(&PjaxConfig::default())
            .unwrap();
        assert_eq!(request.data.len(), 1);
        assert_eq!(request.effective_url(), None);
    }

    #[test]
    fn effective_url_only_carries_extra_data() {
        let request = NavigationOptions::new("/items?sort=asc#top")
            .container("#list")
            .data("page", "2")
            .build(&PjaxConfig::default())
            .unwrap();

        assert_eq!(
            request.effective_url().as_deref(),
            Some("/items?sort=asc&page=2#top")
        );

        let request = NavigationOptions::new("/items")
            .container("#list")
            .data("q", "a b")
            .build(&PjaxConfig::default())
            .unwrap();
        assert_eq!(request.effective_url().as_deref(), Some("/items?q=a+b"));

        let request = NavigationOptions::new("https://example.com/items")
            .container("#list")
            .data("page", "2")
            .build(&PjaxConfig::default())
            .unwrap();
        assert_eq!(
            request.effective_url().as_deref(),
            Some("https://example.com/items?page=2")
        );
    }

    #[test]
    fn page_urls_keep_their_form() {
        let url = PageUrl::parse("/a/b?x=1&y=2#frag").unwrap();
        assert_eq!(url.without_query(), "/a/b");
        assert_eq!(url.fragment(), Some("frag"));
        assert_eq!(
            url.query_pairs(),
            vec![
                ("x".to_string(), "1".to_string()),
                ("y".to_string(), "2".to_string())
            ]
        );
        assert_eq!(url.to_string(), "/a/b?x=1&y=2#frag");

        let mut url = PageUrl::parse("https://example.com/docs").unwrap();
        assert_eq!(url.without_query(), "https://example.com/docs");
        url.set_fragment(Some("install"));
        assert_eq!(url.to_string(), "https://example.com/docs#install");
    }

    #[test]
    fn unparsable_urls_are_rejected() {
        let err = NavigationOptions::new("http://[broken")
            .container("#main")
            .build(&PjaxConfig::default())
            .unwrap_err();
        assert_eq!(
            err,
            PjaxError::Configuration(ConfigError::InvalidUrl("http://[broken".to_string()))
        );
    }

    #[test]
    fn config_names_are_used_for_the_marker() {
        let config = PjaxConfig::default().marker("_partial").header("X-Partial");
        assert_eq!(config.header_name(), "X-Partial");
        assert_eq!(config.marker_key(), "_partial");

        let request = NavigationOptions::new("/a")
            .container("#main")
            .build(&config)
            .unwrap();
        assert_eq!(
            request.data,
            vec![("_partial".to_string(), "true".to_string())]
        );
    }
}
