//! Host page abstraction
//!
//! The survey engine owns rendering and navigation. Everything the core needs
//! from it goes through the traits in this module, so the same logic runs
//! against a live page binding or the in-memory [`MemoryDocument`].

pub mod memory;

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

pub use memory::MemoryDocument;

/// Element ids the host engine renders on every page
pub mod ids {
    pub const NEXT_BUTTON: &str = "NextButton";
    pub const PREVIOUS_BUTTON: &str = "PreviousButton";
    pub const BUTTONS: &str = "Buttons";
    pub const BACK_BUTTON: &str = "BackButton";
}

/// Opaque handle to an element of one page generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type ClickHandler = Arc<dyn Fn() + Send + Sync>;

/// Description of an element to append to the page
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    pub tag: String,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
    pub styles: Vec<(String, String)>,
    pub text: Option<String>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn style(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.push((name.into(), value.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// The host page as seen by the core
///
/// Handles are only meaningful for the page generation that produced them.
/// Operations on a handle that no longer exists are no-ops.
pub trait Document: Send + Sync {
    /// All elements carrying `id`, oldest render first
    fn find_all(&self, id: &str) -> Vec<NodeId>;

    /// The authoritative element for `id`: the most recently rendered one
    fn find(&self, id: &str) -> Option<NodeId> {
        self.find_all(id).last().copied()
    }

    fn find_by_class(&self, class: &str) -> Vec<NodeId>;

    fn contains(&self, node: NodeId) -> bool;

    fn value(&self, node: NodeId) -> Option<String>;
    fn set_value(&self, node: NodeId, value: &str);

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn set_attribute(&self, node: NodeId, name: &str, value: &str);

    fn text(&self, node: NodeId) -> Option<String>;
    fn set_text(&self, node: NodeId, text: &str);

    /// Computed style value, e.g. `"45px"` for `margin-bottom`
    fn style(&self, node: NodeId, name: &str) -> Option<String>;
    fn set_style(&self, node: NodeId, name: &str, value: &str);

    fn is_visible(&self, node: NodeId) -> bool;
    fn set_visible(&self, node: NodeId, visible: bool);

    fn append(&self, parent: NodeId, spec: ElementSpec) -> NodeId;
    fn remove(&self, node: NodeId);

    /// Bind the click handler of `node`, replacing any previous one
    fn on_click(&self, node: NodeId, handler: ClickHandler);
    fn off_click(&self, node: NodeId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDirection {
    Next,
    Previous,
}

impl NavDirection {
    pub fn control_id(&self) -> &'static str {
        match self {
            NavDirection::Next => ids::NEXT_BUTTON,
            NavDirection::Previous => ids::PREVIOUS_BUTTON,
        }
    }
}

/// The host survey engine
pub trait SurveyEngine: Send + Sync {
    /// Canonical embedded-data write. It does not refresh the rendered input,
    /// which the store updates itself.
    fn set_embedded_data(&self, key: &str, value: &str);

    fn nav_click(&self, direction: NavDirection);
}

/// Audio playback collaborator; only stopping matters to the core
pub trait AudioControl: Send + Sync {
    fn stop(&self);
}

static LEADING_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([+-]?\d+)").unwrap());

/// Leading integer of a CSS length, the way the browser's `parseInt` reads it
pub fn pixels(value: &str) -> Option<i32> {
    LEADING_INT
        .captures(value)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
