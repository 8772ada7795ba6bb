//! In-memory host page
//!
//! Backs the test suite and the `simulate` command. Elements live in render
//! order; replacing the page drops every element (and click handler) except
//! the body, which is what the host engine does between steps.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use log::trace;

use super::{
    AudioControl, ClickHandler, Document, ElementSpec, NavDirection, NodeId, SurveyEngine, ids,
};

#[derive(Debug, Clone)]
struct MemoryNode {
    tag: String,
    dom_id: Option<String>,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    value: Option<String>,
    text: String,
    visible: bool,
    parent: Option<NodeId>,
}

struct MemoryDocumentInner {
    next_id: u64,
    body: NodeId,
    nodes: BTreeMap<NodeId, MemoryNode>,
    handlers: HashMap<NodeId, ClickHandler>,
    generation: u64,
}

/// Handles to the navigation controls added by [`MemoryDocument::add_nav_controls`]
#[derive(Debug, Clone, Copy)]
pub struct NavControls {
    pub container: NodeId,
    pub next: NodeId,
    pub previous: Option<NodeId>,
}

#[derive(Clone)]
pub struct MemoryDocument {
    inner: Arc<Mutex<MemoryDocumentInner>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        let body = NodeId(0);
        let mut nodes = BTreeMap::new();
        nodes.insert(body, MemoryNode::from_spec(ElementSpec::new("body"), None));

        Self {
            inner: Arc::new(Mutex::new(MemoryDocumentInner {
                next_id: 1,
                body,
                nodes,
                handlers: HashMap::new(),
                generation: 0,
            })),
        }
    }

    pub fn body(&self) -> NodeId {
        self.inner.lock().unwrap().body
    }

    /// Append an element directly under the body
    pub fn insert(&self, spec: ElementSpec) -> NodeId {
        let body = self.body();
        self.append(body, spec)
    }

    /// Render an embedded-data input the way the host inlines it
    pub fn add_embedded_data(&self, key: &str, value: &str) -> NodeId {
        self.insert(
            ElementSpec::new("input")
                .attr("id", key)
                .attr("type", "hidden")
                .attr("value", value),
        )
    }

    /// Render the button container with a next control (and optionally a
    /// previous control) carrying the given bottom margin
    pub fn add_nav_controls(&self, margin_bottom: &str, with_previous: bool) -> NavControls {
        let container = self.insert(ElementSpec::new("div").attr("id", ids::BUTTONS));
        let previous = with_previous.then(|| {
            self.append(
                container,
                ElementSpec::new("input")
                    .attr("id", ids::PREVIOUS_BUTTON)
                    .attr("type", "submit")
                    .attr("name", "PreviousButton")
                    .attr("title", "←")
                    .attr("value", "←"),
            )
        });
        let next = self.append(
            container,
            ElementSpec::new("input")
                .attr("id", ids::NEXT_BUTTON)
                .attr("type", "submit")
                .attr("name", "NextButton")
                .attr("title", "→")
                .attr("value", "→")
                .style("margin-bottom", margin_bottom),
        );

        NavControls {
            container,
            next,
            previous,
        }
    }

    /// Drop the current page, keeping only the body
    pub fn replace_page(&self) {
        let mut inner = self.inner.lock().unwrap();
        let body = inner.body;
        inner.nodes.retain(|id, _| *id == body);
        inner.handlers.clear();
        inner.generation += 1;
        trace!("Memory document replaced page, generation {}", inner.generation);
    }

    /// Dispatch a click. Returns whether a live handler ran.
    pub fn click(&self, node: NodeId) -> bool {
        let handler = {
            let inner = self.inner.lock().unwrap();
            if !inner.nodes.contains_key(&node) {
                return false;
            }
            inner.handlers.get(&node).cloned()
        };

        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    pub fn live_handlers(&self) -> usize {
        self.inner.lock().unwrap().handlers.len()
    }

    pub fn has_handler(&self, node: NodeId) -> bool {
        self.inner.lock().unwrap().handlers.contains_key(&node)
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .get(&node)
            .map(|n| n.tag.clone())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .get(&node)
            .and_then(|n| n.parent)
    }

    pub fn page_generation(&self) -> u64 {
        self.inner.lock().unwrap().generation
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNode {
    fn from_spec(spec: ElementSpec, parent: Option<NodeId>) -> Self {
        let mut node = MemoryNode {
            tag: spec.tag,
            dom_id: None,
            classes: spec.classes,
            attributes: BTreeMap::new(),
            styles: spec.styles.into_iter().collect(),
            value: None,
            text: spec.text.unwrap_or_default(),
            visible: true,
            parent,
        };

        for (name, value) in spec.attributes {
            match name.as_str() {
                "id" => node.dom_id = Some(value),
                "value" => node.value = Some(value),
                "class" => node.classes.extend(value.split_whitespace().map(String::from)),
                _ => {
                    node.attributes.insert(name, value);
                }
            }
        }

        node
    }
}

impl MemoryDocumentInner {
    /// The node and every descendant of it
    fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = vec![root];
        let mut i = 0;
        while i < out.len() {
            let current = out[i];
            out.extend(
                self.nodes
                    .iter()
                    .filter(|(_, n)| n.parent == Some(current))
                    .map(|(id, _)| *id),
            );
            i += 1;
        }
        out
    }
}

impl Document for MemoryDocument {
    fn find_all(&self, id: &str) -> Vec<NodeId> {
        let inner = self.inner.lock().unwrap();
        inner
            .nodes
            .iter()
            .filter(|(_, n)| n.dom_id.as_deref() == Some(id))
            .map(|(node, _)| *node)
            .collect()
    }

    fn find_by_class(&self, class: &str) -> Vec<NodeId> {
        let inner = self.inner.lock().unwrap();
        inner
            .nodes
            .iter()
            .filter(|(_, n)| n.classes.iter().any(|c| c == class))
            .map(|(node, _)| *node)
            .collect()
    }

    fn contains(&self, node: NodeId) -> bool {
        self.inner.lock().unwrap().nodes.contains_key(&node)
    }

    fn value(&self, node: NodeId) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.nodes.get(&node).and_then(|n| n.value.clone())
    }

    fn set_value(&self, node: NodeId, value: &str) {
        if let Some(n) = self.inner.lock().unwrap().nodes.get_mut(&node) {
            n.value = Some(value.to_string());
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        let n = inner.nodes.get(&node)?;
        match name {
            "id" => n.dom_id.clone(),
            "value" => n.value.clone(),
            "class" => Some(n.classes.join(" ")),
            _ => n.attributes.get(name).cloned(),
        }
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let mut inner = self.inner.lock().unwrap();
        let Some(n) = inner.nodes.get_mut(&node) else {
            return;
        };
        match name {
            "id" => n.dom_id = Some(value.to_string()),
            "value" => n.value = Some(value.to_string()),
            _ => {
                n.attributes.insert(name.to_string(), value.to_string());
            }
        }
    }

    fn text(&self, node: NodeId) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.nodes.get(&node).map(|n| n.text.clone())
    }

    fn set_text(&self, node: NodeId, text: &str) {
        if let Some(n) = self.inner.lock().unwrap().nodes.get_mut(&node) {
            n.text = text.to_string();
        }
    }

    fn style(&self, node: NodeId, name: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.nodes.get(&node).and_then(|n| n.styles.get(name).cloned())
    }

    fn set_style(&self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.inner.lock().unwrap().nodes.get_mut(&node) {
            n.styles.insert(name.to_string(), value.to_string());
        }
    }

    fn is_visible(&self, node: NodeId) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.nodes.get(&node).map(|n| n.visible).unwrap_or(false)
    }

    fn set_visible(&self, node: NodeId, visible: bool) {
        if let Some(n) = self.inner.lock().unwrap().nodes.get_mut(&node) {
            n.visible = visible;
        }
    }

    fn append(&self, parent: NodeId, spec: ElementSpec) -> NodeId {
        let mut inner = self.inner.lock().unwrap();
        let id = NodeId(inner.next_id);
        inner.next_id += 1;
        // Appending to a node from a replaced page lands on the body
        let parent = if inner.nodes.contains_key(&parent) {
            parent
        } else {
            inner.body
        };
        inner.nodes.insert(id, MemoryNode::from_spec(spec, Some(parent)));
        id
    }

    fn remove(&self, node: NodeId) {
        let mut inner = self.inner.lock().unwrap();
        if node == inner.body || !inner.nodes.contains_key(&node) {
            return;
        }
        for id in inner.subtree(node) {
            inner.nodes.remove(&id);
            inner.handlers.remove(&id);
        }
    }

    fn on_click(&self, node: NodeId, handler: ClickHandler) {
        let mut inner = self.inner.lock().unwrap();
        if inner.nodes.contains_key(&node) {
            inner.handlers.insert(node, handler);
        }
    }

    fn off_click(&self, node: NodeId) {
        self.inner.lock().unwrap().handlers.remove(&node);
    }
}

/// Survey engine double that records what the core asked of it
#[derive(Clone, Default)]
pub struct RecordingEngine {
    embedded: Arc<Mutex<Vec<(String, String)>>>,
    navigations: Arc<Mutex<Vec<NavDirection>>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embedded_writes(&self) -> Vec<(String, String)> {
        self.embedded.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<NavDirection> {
        self.navigations.lock().unwrap().clone()
    }
}

impl SurveyEngine for RecordingEngine {
    fn set_embedded_data(&self, key: &str, value: &str) {
        self.embedded
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string()));
    }

    fn nav_click(&self, direction: NavDirection) {
        self.navigations.lock().unwrap().push(direction);
    }
}

/// Audio double counting stop requests
#[derive(Clone, Default)]
pub struct RecordingAudio {
    stops: Arc<Mutex<u32>>,
}

impl RecordingAudio {
    pub fn stops(&self) -> u32 {
        *self.stops.lock().unwrap()
    }
}

impl AudioControl for RecordingAudio {
    fn stop(&self) {
        *self.stops.lock().unwrap() += 1;
    }
}
