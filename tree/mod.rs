/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Render-tree capability surface and the bounded walker.
//!
//! The host runtime owns tree memory; this module only defines the
//! narrow `RenderNode` view the rest of the crate reads through, plus a
//! pure depth-first traversal over it. `memory_tree` provides the
//! reference in-process implementation used by tests and by embedders
//! without a live host adapter.

use serde_json::Value;

use crate::store::SharedStore;

pub mod memory_tree;

/// Structural role of a node in the host tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// User-defined unit with its own inputs and internal state.
    Composite,
    /// Platform primitive (an actual on-screen element).
    Host,
    Fragment,
    Text,
    Root,
}

/// One deferred-effect slot registered on a node.
#[derive(Debug, Clone)]
pub struct EffectSlot {
    pub index: usize,
    /// Textual body of the attached function, as surfaced by the host.
    pub source: String,
    /// `None` when no dependency list was declared at all; `Some(vec![])`
    /// is the explicit empty list.
    pub dependencies: Option<Vec<String>>,
    pub has_cleanup: bool,
}

/// Snapshot of a node's previous generation, as far as the host can
/// still produce it. Any field may be missing on partially instrumented
/// hosts.
#[derive(Debug, Clone, Default)]
pub struct GenerationView {
    pub inputs: Option<Vec<(String, Value)>>,
    pub internal_state: Option<Value>,
    pub context_values: Option<Vec<Value>>,
}

/// Capability view over one host-owned tree node.
///
/// Handles are cheap clones into host memory; every accessor is a fresh
/// read, and `None` from any of them means the host could not produce
/// the data, never that the engine should abort.
pub trait RenderNode: Clone {
    fn kind(&self) -> NodeKind;
    fn display_name(&self) -> Option<String>;
    /// Own-enumerable input fields. The reserved `children` field is the
    /// caller's concern to ignore.
    fn input_fields(&self) -> Option<Vec<(String, Value)>>;
    fn internal_state(&self) -> Option<Value>;
    /// Inherited context values as sampled at the latest render.
    fn context_values(&self) -> Option<Vec<Value>>;
    /// List identity key, when this node sits in a keyed collection.
    fn identity_key(&self) -> Option<String>;
    fn effect_slots(&self) -> Vec<EffectSlot>;
    /// Self-reported duration of the latest render, absent on
    /// non-instrumented builds.
    fn render_duration_ms(&self) -> Option<f64>;
    fn parent(&self) -> Option<Self>;
    fn first_child(&self) -> Option<Self>;
    fn next_sibling(&self) -> Option<Self>;
    fn previous_generation(&self) -> Option<GenerationView>;
    /// Structural metadata: a state container attached to this node, if
    /// the host wired one up.
    fn attached_store(&self) -> Option<SharedStore> {
        None
    }
}

/// Human label for a node, used in issues and timeline payloads.
pub fn component_label<N: RenderNode>(node: &N) -> String {
    node.display_name()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Anonymous".to_string())
}

pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOutcome {
    pub visited: usize,
    pub truncated: bool,
}

/// Depth-first, children-then-siblings traversal from `root`.
///
/// Visits every reachable node exactly once with `(node, path)`, where
/// the path is the `/`-joined chain of ancestor display names (nodes
/// without a display name extend the path by nothing). Traversal uses an
/// explicit stack and stops silently once `node_cap` nodes have been
/// visited. Siblings of `root` itself are out of scope.
pub fn walk<N, F>(root: &N, node_cap: usize, mut visit: F) -> WalkOutcome
where
    N: RenderNode,
    F: FnMut(&N, &str),
{
    if node_cap == 0 {
        return WalkOutcome { visited: 0, truncated: true };
    }

    let root_path = match root.display_name() {
        Some(name) if !name.is_empty() => name,
        _ => String::new(),
    };
    visit(root, &root_path);
    let mut visited = 1usize;

    let mut stack: Vec<(N, String)> = Vec::new();
    if let Some(child) = root.first_child() {
        stack.push((child, root_path));
    }

    while let Some((node, parent_path)) = stack.pop() {
        if visited >= node_cap {
            return WalkOutcome { visited, truncated: true };
        }
        let path = match node.display_name() {
            Some(name) if !name.is_empty() => join_path(&parent_path, &name),
            _ => parent_path.clone(),
        };
        visit(&node, &path);
        visited += 1;

        if let Some(sibling) = node.next_sibling() {
            stack.push((sibling, parent_path));
        }
        if let Some(child) = node.first_child() {
            stack.push((child, path));
        }
    }

    WalkOutcome { visited, truncated: false }
}
