//! Turning link clicks into partial navigations.

use crate::{
    controller::NavigationController,
    error::Result,
    options::NavigationOptions,
};

/// The mouse button that triggered a click.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseButton {
    /// Usually the left button.
    #[default]
    Primary,
    /// Usually the middle button or wheel.
    Auxiliary,
    /// Usually the right button.
    Secondary,
    /// Any other button, by its DOM `button` code.
    Other(i16),
}

impl MouseButton {
    /// Convert a DOM `MouseEvent.button` code.
    pub fn from_web_code(code: i16) -> Self {
        match code {
            0 => Self::Primary,
            1 => Self::Auxiliary,
            2 => Self::Secondary,
            other => Self::Other(other),
        }
    }
}

/// Modifier keys held during a click.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Command on macOS, the Windows key elsewhere.
    pub meta: bool,
    /// Control.
    pub ctrl: bool,
    /// Shift.
    pub shift: bool,
    /// Alt or Option.
    pub alt: bool,
}

/// A click on a hijacked link, as reported by the [`Dom`](crate::platform::Dom).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkClick {
    /// The button that was pressed.
    pub button: MouseButton,
    /// The modifier keys that were held.
    pub modifiers: Modifiers,
    /// The resolved target of the link.
    pub href: String,
    /// The `data-pjax` attribute of the link, naming the container to load into.
    pub container_override: Option<String>,
}

impl LinkClick {
    /// A plain primary-button click on a link to `href`.
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Default::default()
        }
    }

    /// Set the button.
    pub fn with_button(self, button: MouseButton) -> Self {
        Self { button, ..self }
    }

    /// Set the modifiers.
    pub fn with_modifiers(self, modifiers: Modifiers) -> Self {
        Self { modifiers, ..self }
    }

    /// Set the `data-pjax` container override.
    pub fn with_container_override(self, container: impl Into<String>) -> Self {
        Self {
            container_override: Some(container.into()),
            ..self
        }
    }

    /// Whether the user asked for the link to open in a new tab or window. Those clicks are left
    /// to the browser.
    pub fn opens_elsewhere(&self) -> bool {
        self.button != MouseButton::Primary || self.modifiers.meta || self.modifiers.ctrl
    }
}

/// What the browser should do with a click after the handler ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickAction {
    /// Follow the link as usual.
    Default,
    /// Suppress the browser's navigation, pjax took over.
    PreventDefault,
}

/// The first argument of [`Pjax::hijack`](crate::Pjax::hijack): either a container or a full set
/// of options.
#[derive(Clone, Debug)]
pub enum LinkTarget {
    /// Load into this container.
    Container(String),
    /// Use these options.
    Options(NavigationOptions),
}

impl From<&str> for LinkTarget {
    fn from(selector: &str) -> Self {
        Self::Container(selector.to_string())
    }
}

impl From<String> for LinkTarget {
    fn from(selector: String) -> Self {
        Self::Container(selector)
    }
}

impl From<NavigationOptions> for LinkTarget {
    fn from(options: NavigationOptions) -> Self {
        Self::Options(options)
    }
}

/// Merge the hijack arguments into one set of options and check the container.
///
/// A missing container is fine here, the links may carry a `data-pjax` attribute.
pub(crate) fn link_options(
    target: LinkTarget,
    options: Option<NavigationOptions>,
) -> Result<NavigationOptions> {
    let options = match (target, options) {
        (LinkTarget::Container(selector), Some(options)) => options.container(selector),
        (LinkTarget::Container(selector), None) => NavigationOptions::default().container(selector),
        (LinkTarget::Options(options), None) => options,
        (LinkTarget::Options(options), Some(_)) => {
            tracing::warn!("hijack was given options twice, ignoring the second set");
            options
        }
    };
    options.validate_container()?;
    Ok(options)
}

/// The options for a navigation triggered by `click`.
///
/// The link's target replaces any configured url and its `data-pjax` attribute wins over the
/// configured container.
pub(crate) fn click_options(click: &LinkClick, configured: &NavigationOptions) -> NavigationOptions {
    let mut options = configured.clone().url(click.href.clone());
    if let Some(container) = click
        .container_override
        .as_ref()
        .filter(|container| !container.trim().is_empty())
    {
        options = options.container(container.clone());
    }
    options
}

/// Handle a click on a hijacked link.
pub(crate) fn intercept(
    controller: &NavigationController,
    configured: &NavigationOptions,
    click: &LinkClick,
) -> ClickAction {
    if click.opens_elsewhere() {
        tracing::trace!(href = %click.href, "click opens elsewhere, leaving it to the browser");
        return ClickAction::Default;
    }

    match controller.navigate(click_options(click, configured)) {
        Ok(_) => ClickAction::PreventDefault,
        Err(err) => {
            tracing::warn!(href = %click.href, "not hijacking click: {err}");
            ClickAction::Default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, PjaxError};

    #[test]
    fn new_tab_intent_is_respected() {
        let click = LinkClick::new("/a");
        assert!(!click.opens_elsewhere());

        for button in [
            MouseButton::Auxiliary,
            MouseButton::Secondary,
            MouseButton::Other(4),
        ] {
            assert!(click.clone().with_button(button).opens_elsewhere());
        }

        let meta = Modifiers {
            meta: true,
            ..Default::default()
        };
        let ctrl = Modifiers {
            ctrl: true,
            ..Default::default()
        };
        let shift = Modifiers {
            shift: true,
            ..Default::default()
        };
        assert!(click.clone().with_modifiers(meta).opens_elsewhere());
        assert!(click.clone().with_modifiers(ctrl).opens_elsewhere());
        assert!(!click.with_modifiers(shift).opens_elsewhere());
    }

    #[test]
    fn web_button_codes() {
        assert_eq!(MouseButton::from_web_code(0), MouseButton::Primary);
        assert_eq!(MouseButton::from_web_code(1), MouseButton::Auxiliary);
        assert_eq!(MouseButton::from_web_code(2), MouseButton::Secondary);
        assert_eq!(MouseButton::from_web_code(3), MouseButton::Other(3));
    }

    #[test]
    fn hijack_arguments_are_merged() {
        let options = link_options("#main".into(), None).unwrap();
        assert_eq!(options.container_selector(), Some("#main"));

        let options = link_options(
            "#main".into(),
            Some(NavigationOptions::default().container("#other").push(false)),
        )
        .unwrap();
        assert_eq!(options.container_selector(), Some("#main"));
        assert_eq!(options.push, Some(false));

        let options = link_options(NavigationOptions::default().into(), None).unwrap();
        assert_eq!(options.container_selector(), None);

        assert_eq!(
            link_options("".into(), None).unwrap_err(),
            PjaxError::Configuration(ConfigError::EmptyContainer)
        );
    }

    #[test]
    fn element_override_wins() {
        let configured = NavigationOptions::default().container("#main").replace(true);

        let options = click_options(
            &LinkClick::new("/a").with_container_override("#sidebar"),
            &configured,
        );
        assert_eq!(options.container_selector(), Some("#sidebar"));
        assert_eq!(options.replace, Some(true));
        assert_eq!(options.resolve_url().unwrap(), "/a");

        let options = click_options(&LinkClick::new("/b"), &configured);
        assert_eq!(options.container_selector(), Some("#main"));
    }
}
