/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Reference in-memory render tree.
//!
//! Backed by `petgraph::StableGraph` with parent→child edges ordered by
//! an insertion-index weight. Handles stay valid across other mounts.
//! This is the fixture the test suites drive and the adapter embedders
//! can populate when no live host runtime is wired up.

use std::cell::RefCell;
use std::rc::Rc;

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use serde_json::{Map, Value};

use crate::store::SharedStore;
use crate::tree::{EffectSlot, GenerationView, NodeKind, RenderNode};

/// Stable node handle (petgraph NodeIndex, survives other mounts).
pub type NodeKey = NodeIndex;

struct MemoryNode {
    kind: NodeKind,
    display_name: Option<String>,
    inputs: Option<Map<String, Value>>,
    internal_state: Option<Value>,
    context_values: Option<Vec<Value>>,
    identity_key: Option<String>,
    effects: Vec<EffectSlot>,
    render_duration_ms: Option<f64>,
    previous: Option<GenerationView>,
    store: Option<SharedStore>,
}

impl MemoryNode {
    fn new(kind: NodeKind, display_name: Option<&str>) -> Self {
        Self {
            kind,
            display_name: display_name.map(str::to_string),
            inputs: None,
            internal_state: None,
            context_values: None,
            identity_key: None,
            effects: Vec::new(),
            render_duration_ms: None,
            previous: None,
            store: None,
        }
    }

    fn generation_view(&self) -> GenerationView {
        GenerationView {
            inputs: self
                .inputs
                .as_ref()
                .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            internal_state: self.internal_state.clone(),
            context_values: self.context_values.clone(),
        }
    }
}

struct TreeInner {
    graph: StableGraph<MemoryNode, usize>,
    root: NodeKey,
}

impl TreeInner {
    fn children_of(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut ordered: Vec<(usize, NodeKey)> = self
            .graph
            .edges_directed(key, Direction::Outgoing)
            .map(|edge| (*edge.weight(), edge.target()))
            .collect();
        ordered.sort_by_key(|(order, _)| *order);
        ordered.into_iter().map(|(_, child)| child).collect()
    }

    fn parent_of(&self, key: NodeKey) -> Option<NodeKey> {
        self.graph
            .neighbors_directed(key, Direction::Incoming)
            .next()
    }
}

/// Fields applied by [`MemoryTree::commit`]; `None` leaves the field as is.
#[derive(Default)]
pub struct CommitUpdate {
    pub inputs: Option<Value>,
    pub internal_state: Option<Value>,
    pub context_values: Option<Vec<Value>>,
    pub render_duration_ms: Option<f64>,
}

#[derive(Clone)]
pub struct MemoryTree {
    inner: Rc<RefCell<TreeInner>>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        let mut graph = StableGraph::new();
        let root = graph.add_node(MemoryNode::new(NodeKind::Root, None));
        Self {
            inner: Rc::new(RefCell::new(TreeInner { graph, root })),
        }
    }

    pub fn root_key(&self) -> NodeKey {
        self.inner.borrow().root
    }

    pub fn root(&self) -> MemoryNodeHandle {
        self.handle(self.root_key())
    }

    pub fn handle(&self, key: NodeKey) -> MemoryNodeHandle {
        MemoryNodeHandle {
            inner: Rc::clone(&self.inner),
            key,
        }
    }

    /// Appends a node under `parent` and returns its key.
    pub fn mount(&self, parent: NodeKey, kind: NodeKind, name: Option<&str>) -> NodeKey {
        let mut inner = self.inner.borrow_mut();
        let order = inner
            .graph
            .edges_directed(parent, Direction::Outgoing)
            .count();
        let child = inner.graph.add_node(MemoryNode::new(kind, name));
        inner.graph.add_edge(parent, child, order);
        child
    }

    /// Replaces the node's inputs; non-object values are discarded.
    pub fn set_inputs(&self, key: NodeKey, inputs: Value) {
        self.with_node(key, |node| {
            node.inputs = match inputs {
                Value::Object(map) => Some(map),
                _ => None,
            };
        });
    }

    pub fn set_internal_state(&self, key: NodeKey, state: Value) {
        self.with_node(key, |node| node.internal_state = Some(state));
    }

    pub fn set_context_values(&self, key: NodeKey, values: Vec<Value>) {
        self.with_node(key, |node| node.context_values = Some(values));
    }

    pub fn set_identity_key(&self, key: NodeKey, identity: Option<&str>) {
        self.with_node(key, |node| node.identity_key = identity.map(str::to_string));
    }

    pub fn add_effect(
        &self,
        key: NodeKey,
        source: &str,
        dependencies: Option<Vec<String>>,
        has_cleanup: bool,
    ) {
        self.with_node(key, |node| {
            let index = node.effects.len();
            node.effects.push(EffectSlot {
                index,
                source: source.to_string(),
                dependencies,
                has_cleanup,
            });
        });
    }

    pub fn set_render_duration_ms(&self, key: NodeKey, duration: Option<f64>) {
        self.with_node(key, |node| node.render_duration_ms = duration);
    }

    pub fn attach_store(&self, key: NodeKey, store: SharedStore) {
        self.with_node(key, |node| node.store = Some(store));
    }

    /// Starts a new generation: the current inputs/state/context become
    /// the previous-generation snapshot, then `update` is applied.
    pub fn commit(&self, key: NodeKey, update: CommitUpdate) {
        self.with_node(key, |node| {
            node.previous = Some(node.generation_view());
            if let Some(inputs) = update.inputs {
                node.inputs = match inputs {
                    Value::Object(map) => Some(map),
                    _ => None,
                };
            }
            if let Some(state) = update.internal_state {
                node.internal_state = Some(state);
            }
            if let Some(values) = update.context_values {
                node.context_values = Some(values);
            }
            if let Some(duration) = update.render_duration_ms {
                node.render_duration_ms = Some(duration);
            }
        });
    }

    fn with_node(&self, key: NodeKey, apply: impl FnOnce(&mut MemoryNode)) {
        let mut inner = self.inner.borrow_mut();
        if let Some(node) = inner.graph.node_weight_mut(key) {
            apply(node);
        }
    }
}

#[derive(Clone)]
pub struct MemoryNodeHandle {
    inner: Rc<RefCell<TreeInner>>,
    key: NodeKey,
}

impl MemoryNodeHandle {
    pub fn key(&self) -> NodeKey {
        self.key
    }

    fn read<T>(&self, extract: impl FnOnce(&MemoryNode) -> T) -> Option<T> {
        let inner = self.inner.borrow();
        inner.graph.node_weight(self.key).map(extract)
    }

    fn sibling_handle(&self, key: NodeKey) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            key,
        }
    }
}

impl RenderNode for MemoryNodeHandle {
    fn kind(&self) -> NodeKind {
        self.read(|node| node.kind).unwrap_or(NodeKind::Fragment)
    }

    fn display_name(&self) -> Option<String> {
        self.read(|node| node.display_name.clone()).flatten()
    }

    fn input_fields(&self) -> Option<Vec<(String, Value)>> {
        self.read(|node| {
            node.inputs
                .as_ref()
                .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        })
        .flatten()
    }

    fn internal_state(&self) -> Option<Value> {
        self.read(|node| node.internal_state.clone()).flatten()
    }

    fn context_values(&self) -> Option<Vec<Value>> {
        self.read(|node| node.context_values.clone()).flatten()
    }

    fn identity_key(&self) -> Option<String> {
        self.read(|node| node.identity_key.clone()).flatten()
    }

    fn effect_slots(&self) -> Vec<EffectSlot> {
        self.read(|node| node.effects.clone()).unwrap_or_default()
    }

    fn render_duration_ms(&self) -> Option<f64> {
        self.read(|node| node.render_duration_ms).flatten()
    }

    fn parent(&self) -> Option<Self> {
        let key = self.inner.borrow().parent_of(self.key)?;
        Some(self.sibling_handle(key))
    }

    fn first_child(&self) -> Option<Self> {
        let key = self.inner.borrow().children_of(self.key).first().copied()?;
        Some(self.sibling_handle(key))
    }

    fn next_sibling(&self) -> Option<Self> {
        let key = {
            let inner = self.inner.borrow();
            let parent = inner.parent_of(self.key)?;
            let siblings = inner.children_of(parent);
            let position = siblings.iter().position(|key| *key == self.key)?;
            siblings.get(position + 1).copied()
        }?;
        Some(self.sibling_handle(key))
    }

    fn previous_generation(&self) -> Option<GenerationView> {
        self.read(|node| node.previous.clone()).flatten()
    }

    fn attached_store(&self) -> Option<SharedStore> {
        self.read(|node| node.store.clone()).flatten()
    }
}
