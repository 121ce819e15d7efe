//! Errors surfaced by pjax.

use thiserror::Error;

/// The result type used throughout this crate.
pub type Result<T, E = PjaxError> = std::result::Result<T, E>;

/// Errors that are surfaced to the caller of a pjax entry point.
///
/// Runtime failures (network errors, timeouts, full documents in the response, stale history
/// entries) are never reported through this type. They degrade to a full page navigation instead.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PjaxError {
    /// The navigation was configured incorrectly and never started.
    #[error("invalid pjax configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// The platform bindings could not be set up.
    #[error("pjax platform error: {0}")]
    Platform(String),
}

/// The ways a set of navigation options can fail validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No container selector was configured. History entries can only store selectors, so there
    /// is nothing to fall back on.
    #[error("pjax container must be a string selector")]
    MissingContainer,

    /// The container selector was empty or only whitespace.
    #[error("pjax container selector must not be empty")]
    EmptyContainer,

    /// No url was configured.
    #[error("pjax navigation requires a url")]
    MissingUrl,

    /// The url could not be parsed, not even relative to the current document.
    #[error("pjax navigation url `{0}` is not a valid url")]
    InvalidUrl(String),
}
