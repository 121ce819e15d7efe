//! Deciding whether a response body can be injected into a container.
//!
//! Servers are only expected, not required, to answer a fragment request with a fragment. A full
//! document usually means the partial route was never reached: a login wall, an error page that
//! renders the whole layout, a proxy interstitial. Those are loaded as a whole page instead.

use std::sync::LazyLock;

use regex::Regex;

use crate::platform::FragmentResponse;

static FULL_DOCUMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<html").expect("full document pattern is valid"));

static LEADING_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\A\s*<title(?:\s[^>]*)?>(.*?)</title\s*>")
        .expect("leading title pattern is valid")
});

/// A piece of markup meant to replace the contents of a container.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fragment {
    /// The text of the leading `<title>` element, if the fragment had a non-empty one.
    pub title: Option<String>,
    /// The markup to inject, with the title element removed.
    pub html: String,
}

/// Why a response was not treated as a fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackReason {
    /// The body was empty or only whitespace.
    Empty,
    /// The body contained an `<html` tag.
    FullDocument,
    /// The response status was not a success.
    Status(u16),
}

/// The verdict of the [`ResponseClassifier`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Inject the fragment.
    Fragment(Fragment),
    /// Load the url as a normal page.
    FullPageFallback(FallbackReason),
}

/// Classifies fragment responses.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseClassifier;

impl ResponseClassifier {
    /// Classify a response body.
    pub fn classify(body: &str) -> Classification {
        if body.trim().is_empty() {
            return Classification::FullPageFallback(FallbackReason::Empty);
        }

        if FULL_DOCUMENT.is_match(body) {
            return Classification::FullPageFallback(FallbackReason::FullDocument);
        }

        Classification::Fragment(extract_title(body))
    }

    /// Classify a whole response. Anything but a 2xx status is a fallback.
    pub fn classify_response(response: &FragmentResponse) -> Classification {
        if !response.is_success() {
            return Classification::FullPageFallback(FallbackReason::Status(response.status));
        }
        Self::classify(&response.body)
    }
}

fn extract_title(body: &str) -> Fragment {
    let Some(captures) = LEADING_TITLE.captures(body) else {
        return Fragment {
            title: None,
            html: body.to_string(),
        };
    };

    let (Some(whole), Some(text)) = (captures.get(0), captures.get(1)) else {
        return Fragment {
            title: None,
            html: body.to_string(),
        };
    };

    let title = decode_entities(text.as_str().trim());
    Fragment {
        title: (!title.is_empty()).then_some(title),
        html: body[whole.end()..].to_string(),
    }
}

/// Decode character references in a title. A title that is not well formed escaped text is kept
/// as written.
fn decode_entities(text: &str) -> String {
    match quick_xml::escape::unescape(text) {
        Ok(decoded) => decoded.into_owned(),
        Err(err) => {
            tracing::trace!(%err, title = text, "keeping undecodable title as is");
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blank_bodies_fall_back() {
        for body in ["", "   ", "\n\t  \r\n"] {
            assert_eq!(
                ResponseClassifier::classify(body),
                Classification::FullPageFallback(FallbackReason::Empty)
            );
        }
    }

    #[test]
    fn full_documents_fall_back() {
        for body in [
            "<html><body>Login</body></html>",
            "<!DOCTYPE html>\n<HTML lang=\"en\"><body></body></HTML>",
            "<div>before</div><Html>",
        ] {
            assert_eq!(
                ResponseClassifier::classify(body),
                Classification::FullPageFallback(FallbackReason::FullDocument)
            );
        }
    }

    #[test]
    fn leading_title_is_extracted() {
        assert_eq!(
            ResponseClassifier::classify("<title>Items</title><ul><li>a</li></ul>"),
            Classification::Fragment(Fragment {
                title: Some("Items".to_string()),
                html: "<ul><li>a</li></ul>".to_string(),
            })
        );

        assert_eq!(
            ResponseClassifier::classify("\n  <TITLE data-x=\"1\">\n  Tom &amp; Jerry  </Title>\n<p>hi</p>"),
            Classification::Fragment(Fragment {
                title: Some("Tom & Jerry".to_string()),
                html: "\n<p>hi</p>".to_string(),
            })
        );
    }

    #[test]
    fn fragments_without_a_title() {
        assert_eq!(
            ResponseClassifier::classify("<p>no title here</p>"),
            Classification::Fragment(Fragment {
                title: None,
                html: "<p>no title here</p>".to_string(),
            })
        );

        // a blank title is dropped but the element is still removed
        assert_eq!(
            ResponseClassifier::classify("<title>  </title><p>x</p>"),
            Classification::Fragment(Fragment {
                title: None,
                html: "<p>x</p>".to_string(),
            })
        );

        // only a leading title counts
        let body = "<p>x</p><title>late</title>";
        assert_eq!(
            ResponseClassifier::classify(body),
            Classification::Fragment(Fragment {
                title: None,
                html: body.to_string(),
            })
        );
    }

    #[test]
    fn error_statuses_fall_back() {
        let response = FragmentResponse {
            status: 500,
            body: "<p>oops</p>".to_string(),
        };
        assert_eq!(
            ResponseClassifier::classify_response(&response),
            Classification::FullPageFallback(FallbackReason::Status(500))
        );
    }

    #[test]
    fn entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &#65;&#x42; &quot;c&quot;"), "a <b> AB \"c\"");
        assert_eq!(decode_entities("Tom & Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("&bogus; title"), "&bogus; title");
    }
}
