#![forbid(unsafe_code)]

//!
//! Reversible inline-style patching for pages that keep re-rendering
//! themselves.
//!
//! The engine records the exact inline style of every element it touches in
//! a [snapshot::PatchLedger], mutates inline styles to pin a navigation bar
//! to the viewport while the page is scrolled, and restores every element
//! verbatim when the page scrolls back to the top. A mutation observer hook
//! lets the host re-assert the current state whenever the page replaces the
//! watched subtree.
//!
//! All DOM access goes through the [Dom] trait, so the engine runs both
//! against a real browser (the `web` feature) and against an in-memory tree
//! (the `server` feature) for plain `cargo test`.
//!

pub mod engine;
pub mod error;
pub mod patch;
pub mod prefs;
pub mod selector;
pub mod snapshot;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "web")]
pub mod web;

pub use engine::{Engine, EngineConfig, PinState};
pub use error::Error;
pub use patch::PatchSpec;
pub use prefs::Preference;
pub use selector::SelectorList;
pub use snapshot::{PatchLedger, StyleSnapshot};

/// Viewport-relative box of an element, as reported by the layout engine.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

///
/// The host DOM surface the engine runs against.
///
/// Everything here mirrors what a browser main thread offers: selector
/// queries, computed styles, layout rects, inline style and class mutation,
/// node insertion/removal, one injected stylesheet, scroll position and a
/// small key/value storage. Backends implement this for `web_sys` or for an
/// in-memory tree.
///
/// Absence is always modeled as `Option`/empty, never as an error: a
/// selector that matches nothing simply means "not ready yet".
///
pub trait Dom: Sized {
    /// A cheap, clonable handle to a live element. Cloning the handle never
    /// extends the element's lifetime beyond what the document grants it.
    type Element: Clone;

    fn query(&self, selector: &str) -> Option<Self::Element>;
    fn query_all(&self, selector: &str) -> Vec<Self::Element>;
    /// Query among the descendants of `scope` only.
    fn query_within(&self, scope: &Self::Element, selector: &str) -> Option<Self::Element>;
    /// Nearest ancestor-or-self matching `selector`.
    fn closest(&self, el: &Self::Element, selector: &str) -> Option<Self::Element>;

    /// Node identity (`===` in the browser, pointer identity in memory).
    fn same(&self, a: &Self::Element, b: &Self::Element) -> bool;
    fn contains(&self, ancestor: &Self::Element, node: &Self::Element) -> bool;
    fn parent(&self, el: &Self::Element) -> Option<Self::Element>;
    fn children(&self, el: &Self::Element) -> Vec<Self::Element>;
    /// Whether the element is still attached to the document.
    fn is_connected(&self, el: &Self::Element) -> bool;

    /// The serialized `style` attribute, `None` when absent.
    fn style_attribute(&self, el: &Self::Element) -> Option<String>;
    fn set_style_attribute(&self, el: &Self::Element, css: &str) -> Result<(), Error>;
    fn remove_style_attribute(&self, el: &Self::Element) -> Result<(), Error>;
    fn set_style_property(
        &self,
        el: &Self::Element,
        name: &str,
        value: &str,
        important: bool,
    ) -> Result<(), Error>;
    /// Resolved value of one CSS property, `None` when it cannot be read.
    fn computed_style(&self, el: &Self::Element, property: &str) -> Option<String>;

    fn class_attribute(&self, el: &Self::Element) -> Option<String>;
    fn set_class_attribute(&self, el: &Self::Element, value: &str) -> Result<(), Error>;
    fn class_list(&self, el: &Self::Element) -> Vec<String>;
    fn remove_class(&self, el: &Self::Element, class: &str) -> Result<(), Error>;

    fn bounding_rect(&self, el: &Self::Element) -> Rect;
    fn scroll_y(&self) -> f64;
    fn prefers_dark(&self) -> bool;

    fn create_element(&self, tag_name: &str) -> Result<Self::Element, Error>;
    /// Insert `node` as the next sibling of `reference`.
    fn insert_after(&self, reference: &Self::Element, node: &Self::Element)
        -> Result<(), Error>;
    fn remove(&self, node: &Self::Element) -> Result<(), Error>;

    /// Add one `<style>` block identified by a marker attribute. Calling
    /// again with the same marker is a no-op.
    fn inject_stylesheet(&self, marker: &str, css: &str) -> Result<(), Error>;

    fn read_storage(&self, key: &str) -> Option<String>;
    fn write_storage(&self, key: &str, value: &str) -> Result<(), Error>;
}
