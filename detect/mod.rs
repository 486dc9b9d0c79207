/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Anti-pattern detection over visited nodes.
//!
//! Detectors are stateless per call; all cross-call memory (dedup keys,
//! rerender windows, slow-render arming) lives on `RuleEngine` and is
//! dropped in one `reset`. Persistent conditions fire once per
//! `(component, kind, location)`; event-like conditions re-arm when
//! their underlying signal recovers or when the engine resets.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::diff::{ChangeClassification, ChangeKind};
use crate::tree::{NodeKind, RenderNode, component_label};

pub mod effect_classify;

use effect_classify::classify_effect_body;

/// Bound on sibling scans while collecting a node's children.
const CHILD_SCAN_CAP: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    MissingKey,
    IndexAsKey,
    MissingCleanup,
    UpdateLoop,
    MissingDependencies,
    ExcessiveRerenders,
    SlowRender,
    StaleClosure,
}

impl IssueKind {
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::MissingKey => "MISSING_KEY",
            Self::IndexAsKey => "INDEX_AS_KEY",
            Self::MissingCleanup => "MISSING_CLEANUP",
            Self::UpdateLoop => "UPDATE_LOOP",
            Self::MissingDependencies => "MISSING_DEPENDENCIES",
            Self::ExcessiveRerenders => "EXCESSIVE_RERENDERS",
            Self::SlowRender => "SLOW_RENDER",
            Self::StaleClosure => "STALE_CLOSURE",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub component_name: String,
    pub message: String,
    pub suggestion: String,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Issue {
    pub fn new(
        kind: IssueKind,
        severity: Severity,
        component_name: &str,
        message: String,
        suggestion: &str,
        timestamp_ms: f64,
        location: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            component_name: component_name.to_string(),
            message,
            suggestion: suggestion.to_string(),
            timestamp_ms,
            location,
        }
    }

    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

pub struct RuleEngine {
    frame_budget_ms: f64,
    slow_render_error_ms: f64,
    rerender_window_ms: f64,
    rerender_threshold: usize,
    dedup: HashSet<String>,
    render_times: HashMap<String, VecDeque<f64>>,
    rerender_fired: HashSet<String>,
    slow_fired: HashSet<String>,
}

impl RuleEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            frame_budget_ms: config.frame_budget_ms,
            slow_render_error_ms: config.slow_render_error_ms,
            rerender_window_ms: config.rerender_window_ms,
            rerender_threshold: config.rerender_threshold.max(1),
            dedup: HashSet::new(),
            render_times: HashMap::new(),
            rerender_fired: HashSet::new(),
            slow_fired: HashSet::new(),
        }
    }

    /// Drops every dedup key, window, and arming flag. Suppressed
    /// conditions may fire again afterwards if they still hold.
    pub fn reset(&mut self) {
        self.dedup.clear();
        self.render_times.clear();
        self.rerender_fired.clear();
        self.slow_fired.clear();
    }

    /// Runs every detector against one visited node.
    pub fn inspect_node<N: RenderNode>(
        &mut self,
        node: &N,
        path: &str,
        change: &ChangeClassification,
        now_ms: f64,
        sink: &mut Vec<Issue>,
    ) {
        let component = component_label(node);
        self.detect_list_identity(node, &component, path, now_ms, sink);
        self.detect_effect_slots(node, &component, path, now_ms, sink);
        self.detect_excessive_rerenders(&component, path, change, now_ms, sink);
        self.detect_slow_render(node, &component, path, now_ms, sink);
    }

    fn emit_once(&mut self, sink: &mut Vec<Issue>, issue: Issue) {
        let key = format!(
            "{}|{}|{}",
            issue.component_name,
            issue.kind.as_tag(),
            issue.location.as_deref().unwrap_or(""),
        );
        if self.dedup.insert(key) {
            sink.push(issue);
        }
    }

    fn detect_list_identity<N: RenderNode>(
        &mut self,
        node: &N,
        component: &str,
        path: &str,
        now_ms: f64,
        sink: &mut Vec<Issue>,
    ) {
        let children = qualifying_children(node);
        if children.len() < 2 {
            return;
        }
        let total = children.len();
        let missing = children
            .iter()
            .filter(|child| child.identity_key().is_none())
            .count();
        if missing > 0 {
            self.emit_once(
                sink,
                Issue::new(
                    IssueKind::MissingKey,
                    Severity::Error,
                    component,
                    format!("{missing} of {total} children are missing keys"),
                    "Give every collection child a stable identity key",
                    now_ms,
                    Some(path.to_string()),
                ),
            );
            return;
        }
        let index_keyed = children.iter().enumerate().all(|(index, child)| {
            child.identity_key().as_deref() == Some(index.to_string().as_str())
        });
        if index_keyed {
            self.emit_once(
                sink,
                Issue::new(
                    IssueKind::IndexAsKey,
                    Severity::Warning,
                    component,
                    format!("{total} children use their array index as key"),
                    "Derive keys from item identity, not position",
                    now_ms,
                    Some(path.to_string()),
                ),
            );
        }
    }

    fn detect_effect_slots<N: RenderNode>(
        &mut self,
        node: &N,
        component: &str,
        path: &str,
        now_ms: f64,
        sink: &mut Vec<Issue>,
    ) {
        for slot in node.effect_slots() {
            let profile = classify_effect_body(&slot.source);
            let location = format!("{path}#effect{}", slot.index);

            if let Some(resource) = profile.resource
                && !slot.has_cleanup
            {
                self.emit_once(
                    sink,
                    Issue::new(
                        IssueKind::MissingCleanup,
                        Severity::Warning,
                        component,
                        format!("effect acquires a {} but registers no cleanup", resource.label()),
                        "Return a teardown function that releases the resource",
                        now_ms,
                        Some(location.clone()),
                    ),
                );
            }

            let empty_dependencies = slot
                .dependencies
                .as_ref()
                .is_some_and(|dependencies| dependencies.is_empty());
            let excused = profile
                .resource
                .is_some_and(|resource| resource.excuses_empty_dependencies());
            if profile.sets_state && empty_dependencies && !excused {
                self.emit_once(
                    sink,
                    Issue::new(
                        IssueKind::UpdateLoop,
                        Severity::Error,
                        component,
                        "effect updates state with an empty dependency list".to_string(),
                        "Add the values the update depends on, or gate the write",
                        now_ms,
                        Some(location.clone()),
                    ),
                );
            }

            if slot.dependencies.is_none() && profile.reads_external {
                self.emit_once(
                    sink,
                    Issue::new(
                        IssueKind::MissingDependencies,
                        Severity::Info,
                        component,
                        "effect reads external values but declares no dependency list"
                            .to_string(),
                        "Declare a dependency list so reruns track the values read",
                        now_ms,
                        Some(location),
                    ),
                );
            }
        }
    }

    fn detect_excessive_rerenders(
        &mut self,
        component: &str,
        path: &str,
        change: &ChangeClassification,
        now_ms: f64,
        sink: &mut Vec<Issue>,
    ) {
        if matches!(change.kind, ChangeKind::Mount) {
            return;
        }
        let times = self.render_times.entry(path.to_string()).or_default();
        times.push_back(now_ms);
        while times
            .front()
            .is_some_and(|stamp| now_ms - *stamp > self.rerender_window_ms)
        {
            times.pop_front();
        }
        let count = times.len();
        if count >= self.rerender_threshold && self.rerender_fired.insert(path.to_string()) {
            sink.push(Issue::new(
                IssueKind::ExcessiveRerenders,
                Severity::Warning,
                component,
                format!(
                    "{count} renders within {}ms",
                    self.rerender_window_ms as u64
                ),
                "Memoize inputs or split the component to calm the render loop",
                now_ms,
                Some(path.to_string()),
            ));
        }
    }

    fn detect_slow_render<N: RenderNode>(
        &mut self,
        node: &N,
        component: &str,
        path: &str,
        now_ms: f64,
        sink: &mut Vec<Issue>,
    ) {
        // Absent duration data disables this detector, nothing else.
        let Some(duration_ms) = node.render_duration_ms() else {
            return;
        };
        if duration_ms <= self.frame_budget_ms {
            // Recovery re-arms the key so a later regression fires again.
            self.slow_fired.remove(path);
            return;
        }
        if !self.slow_fired.insert(path.to_string()) {
            return;
        }
        let severity = if duration_ms > self.slow_render_error_ms {
            Severity::Error
        } else {
            Severity::Warning
        };
        sink.push(Issue::new(
            IssueKind::SlowRender,
            severity,
            component,
            format!(
                "render took {duration_ms:.1}ms (budget {}ms)",
                self.frame_budget_ms as u64
            ),
            "Profile the render body and move heavy work out of it",
            now_ms,
            Some(path.to_string()),
        ));
    }
}

/// Host- and composite-kind children of `node`, in sibling order.
fn qualifying_children<N: RenderNode>(node: &N) -> Vec<N> {
    let mut children = Vec::new();
    let mut cursor = node.first_child();
    let mut scanned = 0usize;
    while let Some(child) = cursor {
        if matches!(child.kind(), NodeKind::Host | NodeKind::Composite) {
            children.push(child.clone());
        }
        scanned += 1;
        if scanned >= CHILD_SCAN_CAP {
            break;
        }
        cursor = child.next_sibling();
    }
    children
}
