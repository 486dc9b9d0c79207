/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Render-change classification.
//!
//! Given a node and the snapshot of its previous generation, decides
//! *why* it updated: fresh mount, changed inputs, changed internal
//! state, both, inherited context, or nothing detectable (the parent
//! re-rendered). Field lists are capped and values rendered through the
//! bounded previewer, never as raw dumps.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::EngineConfig;
use crate::tree::{GenerationView, RenderNode};

pub mod preview;

use preview::preview;

/// Input field that never participates in diffing.
const RESERVED_CHILDREN_FIELD: &str = "children";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Mount,
    Inputs,
    Internal,
    InputsAndInternal,
    Inherited,
    Unknown,
}

impl ChangeKind {
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Mount => "mount",
            Self::Inputs => "inputs",
            Self::Internal => "internal",
            Self::InputsAndInternal => "inputs+internal",
            Self::Inherited => "inherited",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChangeClassification {
    pub kind: ChangeKind,
    /// Changed field names, capped; `overflow` counts the rest.
    pub changed_fields: Vec<String>,
    pub overflow: usize,
    pub summary: String,
}

impl ChangeClassification {
    fn simple(kind: ChangeKind, summary: &str) -> Self {
        Self {
            kind,
            changed_fields: Vec::new(),
            overflow: 0,
            summary: summary.to_string(),
        }
    }
}

/// One changed field with before/after previews.
struct FieldChange {
    name: String,
    rendered: String,
}

pub fn classify_node<N: RenderNode>(node: &N, config: &EngineConfig) -> ChangeClassification {
    let Some(previous) = node.previous_generation() else {
        return ChangeClassification::simple(ChangeKind::Mount, "mounted");
    };

    let input_changes = diff_inputs(node, &previous, config);
    let internal_changes = diff_internal(node, &previous);
    let has_inputs = !input_changes.is_empty();
    let has_internal = internal_changes.is_some();

    if has_inputs || has_internal {
        let kind = match (has_inputs, has_internal) {
            (true, true) => ChangeKind::InputsAndInternal,
            (true, false) => ChangeKind::Inputs,
            _ => ChangeKind::Internal,
        };
        let mut fields = input_changes;
        if let Some(internal_fields) = internal_changes {
            fields.extend(internal_fields.into_iter().map(|name| FieldChange {
                rendered: name.clone(),
                name,
            }));
        }
        return bounded_classification(kind, fields, config);
    }

    if context_changed(node, &previous) {
        return ChangeClassification {
            kind: ChangeKind::Inherited,
            changed_fields: vec!["context".to_string()],
            overflow: 0,
            summary: "inherited context changed".to_string(),
        };
    }

    ChangeClassification::simple(ChangeKind::Unknown, "parent re-rendered")
}

fn bounded_classification(
    kind: ChangeKind,
    fields: Vec<FieldChange>,
    config: &EngineConfig,
) -> ChangeClassification {
    let cap = config.changed_field_cap.max(1);
    let overflow = fields.len().saturating_sub(cap);
    let shown: Vec<FieldChange> = fields.into_iter().take(cap).collect();
    let rendered: Vec<&str> = shown.iter().map(|field| field.rendered.as_str()).collect();
    let mut summary = format!("{} changed: {}", kind.as_tag(), rendered.join(", "));
    if overflow > 0 {
        summary.push_str(&format!(" (+{overflow} more)"));
    }
    ChangeClassification {
        kind,
        changed_fields: shown.into_iter().map(|field| field.name).collect(),
        overflow,
        summary,
    }
}

/// Symmetric difference of input fields (reserved `children` excluded)
/// whose values differ.
fn diff_inputs<N: RenderNode>(
    node: &N,
    previous: &GenerationView,
    config: &EngineConfig,
) -> Vec<FieldChange> {
    let (Some(current), Some(prior)) = (node.input_fields(), previous.inputs.as_ref()) else {
        return Vec::new();
    };
    let prior_map: HashMap<&str, &Value> = prior
        .iter()
        .map(|(name, value)| (name.as_str(), value))
        .collect();

    let depth = config.preview_depth;
    let string_cap = config.preview_string_cap;
    let mut changes = Vec::new();
    for (name, value) in &current {
        if name == RESERVED_CHILDREN_FIELD {
            continue;
        }
        match prior_map.get(name.as_str()) {
            Some(prior_value) if *prior_value == value => {}
            Some(prior_value) => changes.push(FieldChange {
                name: name.clone(),
                rendered: format!(
                    "{name} ({} -> {})",
                    preview(prior_value, depth, string_cap),
                    preview(value, depth, string_cap),
                ),
            }),
            None => changes.push(FieldChange {
                name: name.clone(),
                rendered: format!("{name} (added {})", preview(value, depth, string_cap)),
            }),
        }
    }
    let current_names: HashMap<&str, ()> = current
        .iter()
        .map(|(name, _)| (name.as_str(), ()))
        .collect();
    for (name, value) in prior {
        if name == RESERVED_CHILDREN_FIELD || current_names.contains_key(name.as_str()) {
            continue;
        }
        changes.push(FieldChange {
            name: name.clone(),
            rendered: format!("{name} (removed {})", preview(value, depth, string_cap)),
        });
    }
    changes
}

/// Internal-state change as a shallow field list, when one is derivable.
fn diff_internal<N: RenderNode>(node: &N, previous: &GenerationView) -> Option<Vec<String>> {
    let current = node.internal_state()?;
    let prior = previous.internal_state.as_ref()?;
    if current == *prior {
        return None;
    }
    match (&current, prior) {
        (Value::Object(current_map), Value::Object(prior_map)) => {
            let mut changed: Vec<String> = current_map
                .iter()
                .filter(|(key, value)| prior_map.get(*key) != Some(*value))
                .map(|(key, _)| key.clone())
                .collect();
            for key in prior_map.keys() {
                if !current_map.contains_key(key) {
                    changed.push(key.clone());
                }
            }
            if changed.is_empty() {
                changed.push("state".to_string());
            }
            Some(changed)
        }
        _ => Some(vec!["state".to_string()]),
    }
}

fn context_changed<N: RenderNode>(node: &N, previous: &GenerationView) -> bool {
    match (node.context_values(), previous.context_values.as_ref()) {
        (Some(current), Some(prior)) => current != *prior,
        _ => false,
    }
}
