//! In-memory DOM and manual scheduler.
//!
//! A small arena-backed element tree with just enough behaviour for the
//! engine: selector queries, inline styles, listener bindings, media state,
//! and mutation/event queues that a driver drains. Page fixtures load into it
//! from JSON.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::{Dom, DomError, Scheduler};
use crate::selector::{Selector, SelectorTree};
use crate::types::{DomEvent, Listener, TimerId};

/// Handle of a node in a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    attrs: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    paused: bool,
}

impl NodeData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            style: BTreeMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            paused: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    node: NodeId,
    event: DomEvent,
    listener: Listener,
}

/// Arena-backed document.
#[derive(Debug, Clone)]
pub struct MemoryDom {
    nodes: Vec<Option<NodeData>>,
    root: NodeId,
    body: NodeId,
    location: String,
    bindings: Vec<Binding>,
    added: Vec<NodeId>,
    events: VecDeque<(NodeId, DomEvent)>,
    autoplay_blocked: bool,
}

impl MemoryDom {
    /// An empty `<html><body></body></html>` document at `location`.
    pub fn new(location: &str) -> Self {
        let mut root = NodeData::new("html");
        let mut body = NodeData::new("body");
        let root_id = NodeId(0);
        let body_id = NodeId(1);
        root.children.push(body_id);
        body.parent = Some(root_id);

        Self {
            nodes: vec![Some(root), Some(body)],
            root: root_id,
            body: body_id,
            location: location.to_string(),
            bindings: Vec::new(),
            added: Vec::new(),
            events: VecDeque::new(),
            autoplay_blocked: false,
        }
    }

    /// Build a document from a page fixture. Fixture nodes are not reported
    /// as mutations.
    pub fn from_fixture(fixture: &PageFixture) -> Self {
        let mut dom = Self::new(&fixture.location);
        let body = dom.body;
        for node in &fixture.body {
            dom.append_fixture(body, node);
        }
        dom.added.clear();
        dom
    }

    fn append_fixture(&mut self, parent: NodeId, fixture: &FixtureNode) -> NodeId {
        let id = self.alloc(&fixture.tag);
        if let Some(data) = self.node_mut(id) {
            data.attrs = fixture.attrs.clone();
            data.style = fixture.style.clone();
            data.text = fixture.text.clone().unwrap_or_default();
            data.paused = !fixture.playing;
        }
        self.link(parent, id);
        for child in &fixture.children {
            self.append_fixture(id, child);
        }
        id
    }

    fn alloc(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Some(NodeData::new(tag)));
        NodeId(self.nodes.len() - 1)
    }

    fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.unlink(child);
        if let Some(data) = self.node_mut(child) {
            data.parent = Some(parent);
        }
        if let Some(data) = self.node_mut(parent) {
            data.children.push(child);
        }
        if self.is_attached(parent) {
            self.added.push(child);
        }
    }

    fn unlink(&mut self, child: NodeId) {
        let Some(parent) = self.node(child).and_then(|data| data.parent) else {
            return;
        };
        if let Some(data) = self.node_mut(parent) {
            data.children.retain(|&c| c != child);
        }
        if let Some(data) = self.node_mut(child) {
            data.parent = None;
        }
    }

    fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(data) = self.node(id) {
                out.push(id);
                stack.extend(data.children.iter().rev().copied());
            }
        }
        out
    }

    // -- builder helpers -------------------------------------------------------

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn body_id(&self) -> NodeId {
        self.body
    }

    /// Create `<tag attrs…>` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.alloc(tag);
        if let Some(data) = self.node_mut(id) {
            for (name, value) in attrs {
                data.attrs.insert((*name).to_string(), (*value).to_string());
            }
        }
        if self.node(parent).is_some() {
            self.link(parent, id);
        }
        id
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(data) = self.node_mut(node) {
            data.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn set_node_text(&mut self, node: NodeId, text: &str) {
        if let Some(data) = self.node_mut(node) {
            data.text = text.to_string();
        }
    }

    pub fn set_location(&mut self, location: &str) {
        self.location = location.to_string();
    }

    /// Make subsequent `play()` calls fail like a blocked autoplay.
    pub fn set_autoplay_blocked(&mut self, blocked: bool) {
        self.autoplay_blocked = blocked;
    }

    /// Start playback as a user gesture would (ignores autoplay blocking).
    pub fn user_play(&mut self, media: NodeId) {
        let started = match self.node_mut(media) {
            Some(data) if data.paused => {
                data.paused = false;
                true
            }
            _ => false,
        };
        if started {
            self.events.push_back((media, DomEvent::Play));
        }
    }

    /// Queue a user-input event on `node`.
    pub fn fire(&mut self, node: NodeId, event: DomEvent) {
        if self.node(node).is_some() {
            self.events.push_back((node, event));
        }
    }

    /// Drain queued events.
    pub fn take_events(&mut self) -> Vec<(NodeId, DomEvent)> {
        self.events.drain(..).collect()
    }

    /// Drain nodes inserted into the document since the last call.
    pub fn take_added(&mut self) -> Vec<NodeId> {
        let added = std::mem::take(&mut self.added);
        added.into_iter().filter(|&id| self.is_attached(id)).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.events.is_empty() || !self.added.is_empty()
    }

    /// Listeners bound for `event` on `node`, in binding order.
    pub fn listeners_for(&self, node: NodeId, event: DomEvent) -> Vec<Listener> {
        self.bindings
            .iter()
            .filter(|b| b.node == node && b.event == event)
            .map(|b| b.listener)
            .collect()
    }

    /// All (event, listener) pairs bound on `node`.
    pub fn bindings_on(&self, node: NodeId) -> Vec<(DomEvent, Listener)> {
        self.bindings
            .iter()
            .filter(|b| b.node == node)
            .map(|b| (b.event, b.listener))
            .collect()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn binding_count_for(&self, listener: Listener) -> usize {
        self.bindings.iter().filter(|b| b.listener == listener).count()
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.node(id).and_then(|data| data.parent);
        }
        false
    }

    /// Nodes still allocated (attached or not).
    pub fn live_node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Attached elements matching a CSS string; invalid CSS matches nothing.
    pub fn select(&self, css: &str) -> Vec<NodeId> {
        match Selector::parse(css) {
            Ok(selector) => self.query_all(&selector),
            Err(err) => {
                log::warn!("Ignoring invalid selector '{}': {}", css, err);
                Vec::new()
            }
        }
    }

    /// Indented outline of the attached tree, one element per line.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.outline_node(self.root, 0, &mut out);
        out
    }

    fn outline_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(data) = self.node(id) else {
            return;
        };
        let _ = write!(out, "{}<{}", "  ".repeat(depth), data.tag);
        for (name, value) in &data.attrs {
            if value.is_empty() {
                let _ = write!(out, " {}", name);
            } else {
                let _ = write!(out, " {}=\"{}\"", name, value);
            }
        }
        if !data.style.is_empty() {
            let style = data
                .style
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("; ");
            let _ = write!(out, " style=\"{}\"", style);
        }
        out.push('>');
        if !data.text.is_empty() {
            let _ = write!(out, " {}", data.text);
        }
        out.push('\n');
        for &child in &data.children {
            self.outline_node(child, depth + 1, out);
        }
    }
}

impl SelectorTree for MemoryDom {
    type Node = NodeId;

    fn tag_name(&self, node: &NodeId) -> Option<&str> {
        self.node(*node).map(|data| data.tag.as_str())
    }

    fn attr(&self, node: &NodeId, name: &str) -> Option<&str> {
        self.node(*node)
            .and_then(|data| data.attrs.get(name))
            .map(String::as_str)
    }

    fn parent_node(&self, node: &NodeId) -> Option<NodeId> {
        self.node(*node).and_then(|data| data.parent)
    }

    fn child_nodes(&self, node: &NodeId) -> Vec<NodeId> {
        self.node(*node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }
}

impl Dom for MemoryDom {
    type Node = NodeId;

    fn query_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.subtree(self.root)
            .into_iter()
            .filter(|id| selector.matches(self, id))
            .collect()
    }

    fn query_within(&self, root: &NodeId, selector: &Selector) -> Option<NodeId> {
        self.subtree(*root)
            .into_iter()
            .skip(1)
            .find(|id| selector.matches(self, id))
    }

    fn matches(&self, node: &NodeId, selector: &Selector) -> bool {
        self.node(*node).is_some() && selector.matches(self, node)
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.subtree(self.root)
            .into_iter()
            .find(|node| self.attr(node, "id") == Some(id))
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.body)
    }

    fn document_element(&self) -> Option<NodeId> {
        Some(self.root)
    }

    fn location(&self) -> String {
        self.location.clone()
    }

    fn text_content(&self, node: &NodeId) -> String {
        self.subtree(*node)
            .into_iter()
            .filter_map(|id| self.node(id))
            .map(|data| data.text.as_str())
            .collect()
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        self.attr(node, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    fn add_class(&mut self, node: &NodeId, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        if let Some(data) = self.node_mut(*node) {
            let classes = data.attrs.entry("class".to_string()).or_default();
            if !classes.is_empty() {
                classes.push(' ');
            }
            classes.push_str(class);
        }
    }

    fn remove_class(&mut self, node: &NodeId, class: &str) {
        if let Some(data) = self.node_mut(*node) {
            if let Some(classes) = data.attrs.get_mut("class") {
                *classes = classes
                    .split_whitespace()
                    .filter(|c| *c != class)
                    .collect::<Vec<_>>()
                    .join(" ");
                if classes.is_empty() {
                    data.attrs.remove("class");
                }
            }
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.attr(node, name).map(str::to_string)
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        self.set_attr(*node, name, value);
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) {
        if let Some(data) = self.node_mut(*node) {
            data.attrs.remove(name);
        }
    }

    fn style(&self, node: &NodeId, property: &str) -> Option<String> {
        self.node(*node).and_then(|data| data.style.get(property).cloned())
    }

    fn set_style(&mut self, node: &NodeId, property: &str, value: &str) {
        if let Some(data) = self.node_mut(*node) {
            if value.is_empty() {
                data.style.remove(property);
            } else {
                data.style.insert(property.to_string(), value.to_string());
            }
        }
    }

    fn z_index(&self, node: &NodeId) -> Option<i32> {
        self.node(*node)
            .and_then(|data| data.style.get("z-index"))
            .and_then(|value| value.trim().parse().ok())
    }

    fn create_element(&mut self, tag: &str) -> Result<NodeId, DomError> {
        Ok(self.alloc(tag))
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), DomError> {
        if self.node(*parent).is_none() || self.node(*child).is_none() {
            return Err(DomError::Detached);
        }
        self.link(*parent, *child);
        Ok(())
    }

    fn set_text(&mut self, node: &NodeId, text: &str) {
        self.set_node_text(*node, text);
    }

    fn remove(&mut self, node: &NodeId) {
        if *node == self.root || self.node(*node).is_none() {
            return;
        }
        self.unlink(*node);
        let removed = self.subtree(*node);
        for id in &removed {
            self.nodes[id.0] = None;
        }
        self.bindings.retain(|b| !removed.contains(&b.node));
        self.events.retain(|(id, _)| !removed.contains(id));
    }

    fn listen(&mut self, node: &NodeId, event: DomEvent, listener: Listener) {
        if self.node(*node).is_some() {
            self.bindings.push(Binding {
                node: *node,
                event,
                listener,
            });
        }
    }

    fn unlisten(&mut self, node: &NodeId, event: DomEvent, listener: Listener) {
        let target = Binding {
            node: *node,
            event,
            listener,
        };
        if let Some(pos) = self.bindings.iter().position(|b| *b == target) {
            self.bindings.remove(pos);
        }
    }

    fn is_paused(&self, media: &NodeId) -> bool {
        self.node(*media).map_or(true, |data| data.paused)
    }

    fn pause(&mut self, media: &NodeId) {
        let stopped = match self.node_mut(*media) {
            Some(data) if !data.paused => {
                data.paused = true;
                true
            }
            _ => false,
        };
        if stopped {
            self.events.push_back((*media, DomEvent::Pause));
        }
    }

    fn play(&mut self, media: &NodeId) -> Result<(), DomError> {
        if self.node(*media).is_none() {
            return Err(DomError::Detached);
        }
        if self.autoplay_blocked {
            return Err(DomError::PlaybackRejected("autoplay blocked".to_string()));
        }
        self.user_play(*media);
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Error type for fixture loading.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("Invalid fixture JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A page to load into a [`MemoryDom`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageFixture {
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default)]
    pub body: Vec<FixtureNode>,
}

fn default_location() -> String {
    "/".to_string()
}

/// One element of a page fixture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Media elements only: start out playing
    #[serde(default)]
    pub playing: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FixtureNode>,
}

impl PageFixture {
    pub fn from_json(text: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(text)?)
    }
}

// =============================================================================
// Manual Scheduler
// =============================================================================

/// A clock that only moves when told to, with a queue of one-shot timers.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    now: u64,
    next_id: u32,
    pending: Vec<(u64, TimerId)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Due time of the earliest armed timer.
    pub fn next_due(&self) -> Option<u64> {
        self.pending.iter().map(|(due, _)| *due).min()
    }

    /// Remove and return the earliest timer due at or before `until`,
    /// moving the clock to its due time.
    pub fn pop_due(&mut self, until: u64) -> Option<TimerId> {
        let (index, &(due, id)) = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, (due, _))| *due <= until)
            .min_by_key(|(_, (due, id))| (*due, *id))?;
        self.pending.remove(index);
        self.now = self.now.max(due);
        Some(id)
    }

    /// Move the clock forward (never backward).
    pub fn advance_to(&mut self, time: u64) {
        self.now = self.now.max(time);
    }
}

impl Scheduler for ManualScheduler {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn set_timeout(&mut self, delay_ms: u64) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.pending.push((self.now + delay_ms, id));
        id
    }

    fn clear_timeout(&mut self, id: TimerId) {
        self.pending.retain(|(_, pending)| *pending != id);
    }
}
