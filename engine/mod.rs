/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Engine orchestration.
//!
//! Single-threaded cooperative: the host delivers tree-update
//! notifications and calls `idle_tick` from its idle scheduling; the
//! engine never blocks that thread. Overlapping update notifications
//! coalesce into one pending root, analyzed at most once per throttle
//! window with the most recent root winning. Disabling clears every
//! cache, dedup set, and pending flag in one operation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::annotator::{Annotator, Highlight, LayoutProbe};
use crate::closure::{ClosureTracker, InterceptionLayer};
use crate::config::EngineConfig;
use crate::detect::{Issue, RuleEngine};
use crate::diff::{ChangeKind, classify_node};
use crate::pipeline::{EventPipeline, Transport};
use crate::protocol::{ControlMessage, EngineEvent};
use crate::store::discovery::{DiscoveryContext, DiscoveryStatus, GlobalScope, StoreDiscovery};
use crate::store::{StoreBridge, StoreError};
use crate::tree::{NodeKind, RenderNode, component_label, walk};

/// Detected host framework, reported once by the host adapter.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub version: String,
    pub mode: String,
}

#[derive(Debug, Clone, Copy)]
pub struct MemorySample {
    pub used: u64,
    pub total: u64,
    pub limit: u64,
}

/// Optional host capability; absence disables memory snapshots only.
pub trait MemoryProbe {
    fn sample(&self) -> Option<MemorySample>;
}

pub struct DebugEngine<N: RenderNode> {
    config: EngineConfig,
    enabled: bool,
    scan_enabled: bool,
    pipeline: EventPipeline,
    rules: RuleEngine,
    tracker: Rc<RefCell<ClosureTracker>>,
    interception: InterceptionLayer,
    discovery: StoreDiscovery,
    bridge: Option<StoreBridge>,
    scope: Box<dyn GlobalScope>,
    memory_probe: Option<Box<dyn MemoryProbe>>,
    layout_probe: Option<Box<dyn LayoutProbe>>,
    annotator: Annotator,
    host: Option<HostInfo>,
    pending_root: Option<N>,
    last_analysis_at_ms: Option<f64>,
    render_counts: HashMap<String, u64>,
    memory_monitoring: bool,
    last_memory_sample_at_ms: f64,
}

impl<N: RenderNode> DebugEngine<N> {
    pub fn new(
        config: EngineConfig,
        transport: Box<dyn Transport>,
        scope: Box<dyn GlobalScope>,
    ) -> Self {
        let tracker = Rc::new(RefCell::new(ClosureTracker::new(config.closure_ttl_ms)));
        let interception = InterceptionLayer::new(Rc::clone(&tracker));
        Self {
            pipeline: EventPipeline::new(transport, &config),
            rules: RuleEngine::new(&config),
            discovery: StoreDiscovery::new(&config),
            annotator: Annotator::new(config.highlight_ttl_ms),
            tracker,
            interception,
            bridge: None,
            scope,
            memory_probe: None,
            layout_probe: None,
            host: None,
            enabled: false,
            scan_enabled: true,
            pending_root: None,
            last_analysis_at_ms: None,
            render_counts: HashMap::new(),
            memory_monitoring: false,
            last_memory_sample_at_ms: 0.0,
            config,
        }
    }

    pub fn with_memory_probe(mut self, probe: Box<dyn MemoryProbe>) -> Self {
        self.memory_probe = Some(probe);
        self
    }

    pub fn with_layout_probe(mut self, probe: Box<dyn LayoutProbe>) -> Self {
        self.layout_probe = Some(probe);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn scan_enabled(&self) -> bool {
        self.scan_enabled
    }

    pub fn interception_layer(&self) -> &InterceptionLayer {
        &self.interception
    }

    pub fn bridge(&self) -> Option<&StoreBridge> {
        self.bridge.as_ref()
    }

    pub fn discovery_status(&self) -> DiscoveryStatus {
        self.discovery.status()
    }

    pub fn highlights(&mut self, now_ms: f64) -> &[Highlight] {
        self.annotator.active(now_ms)
    }

    /// Host adapter reports the detected framework.
    pub fn attach_host(&mut self, info: HostInfo, now_ms: f64) {
        self.publish_event(
            EngineEvent::ReactDetected {
                version: info.version.clone(),
                mode: info.mode.clone(),
            },
            now_ms,
        );
        self.host = Some(info);
    }

    pub fn enable(&mut self, now_ms: f64) {
        if !self.enabled {
            self.enabled = true;
            self.interception.install();
            self.discovery.reenable(now_ms);
        }
        self.publish_event(EngineEvent::DebuggerStateChanged { enabled: true }, now_ms);
    }

    /// One clearing operation: pending work, dedup state, closure
    /// registry, counters, highlights, and the discovery poll all reset
    /// so a later enable starts from a clean slate.
    pub fn disable(&mut self, now_ms: f64) {
        self.enabled = false;
        self.pending_root = None;
        self.last_analysis_at_ms = None;
        self.rules.reset();
        self.tracker.borrow_mut().clear();
        self.interception.uninstall();
        let _ = self.interception.drain_issues();
        self.annotator.clear();
        self.render_counts.clear();
        self.memory_monitoring = false;
        self.discovery.stop();
        self.publish_event(EngineEvent::DebuggerStateChanged { enabled: false }, now_ms);
    }

    pub fn handle_control(&mut self, message: ControlMessage, now_ms: f64) {
        match message {
            ControlMessage::EnableDebugger => self.enable(now_ms),
            ControlMessage::DisableDebugger => self.disable(now_ms),
            ControlMessage::GetDebuggerState => {
                let enabled = self.enabled;
                self.publish_event(EngineEvent::DebuggerStateChanged { enabled }, now_ms);
            }
            ControlMessage::ToggleScan { enabled } => {
                self.scan_enabled = enabled.unwrap_or(!self.scan_enabled);
                let scan_enabled = self.scan_enabled;
                self.publish_event(EngineEvent::ScanStatus { enabled: scan_enabled }, now_ms);
            }
            ControlMessage::StartMemoryMonitoring => self.memory_monitoring = true,
            ControlMessage::StopMemoryMonitoring => self.memory_monitoring = false,
            ControlMessage::DispatchStoreAction { action } => {
                let outcome = self
                    .bridge
                    .as_mut()
                    .map(|bridge| bridge.dispatch_action(action, now_ms));
                self.finish_store_op(outcome, now_ms);
            }
            ControlMessage::SetStoreState { path, value } => {
                let outcome = self
                    .bridge
                    .as_mut()
                    .map(|bridge| bridge.set_override(path, value, now_ms).map(|_| None));
                self.finish_store_op(outcome, now_ms);
            }
            ControlMessage::ClearStoreOverrides => {
                let outcome = self
                    .bridge
                    .as_mut()
                    .map(|bridge| bridge.clear_overrides(now_ms).map(Some));
                self.finish_store_op(outcome, now_ms);
            }
            ControlMessage::DeleteArrayItem { path, index } => {
                let outcome = self
                    .bridge
                    .as_mut()
                    .map(|bridge| bridge.delete_array_item(path, index, now_ms).map(|_| None));
                self.finish_store_op(outcome, now_ms);
            }
            ControlMessage::MoveArrayItem {
                path,
                from_index,
                to_index,
            } => {
                let outcome = self.bridge.as_mut().map(|bridge| {
                    bridge
                        .move_array_item(path, from_index, to_index, now_ms)
                        .map(|_| None)
                });
                self.finish_store_op(outcome, now_ms);
            }
            ControlMessage::RefreshStoreState => {
                let outcome = self.bridge.as_mut().map(|bridge| {
                    bridge
                        .snapshot()
                        .map(|snapshot| Some(EngineEvent::StoreStateChange { snapshot }))
                });
                self.finish_store_op(outcome, now_ms);
            }
        }
    }

    fn finish_store_op(
        &mut self,
        outcome: Option<Result<Option<EngineEvent>, StoreError>>,
        now_ms: f64,
    ) {
        match outcome {
            None => debug!("store control ignored, no store attached"),
            Some(Err(error)) => warn!("store control failed: {error}"),
            Some(Ok(Some(event))) => self.publish_event(event, now_ms),
            Some(Ok(None)) => {}
        }
    }

    /// Tree-update notification; overlapping notifications coalesce and
    /// the most recent root wins.
    pub fn notify_tree_update(&mut self, root: N) {
        if self.enabled && self.scan_enabled {
            self.pending_root = Some(root);
        }
    }

    /// Idle-time driver: runs the deferred analysis when the throttle
    /// window allows, services discovery, the bridge debounce, closure
    /// eviction, memory sampling, and the pipeline flush.
    pub fn idle_tick(&mut self, now_ms: f64) {
        if self.enabled {
            self.service_discovery(now_ms);

            let due = self
                .last_analysis_at_ms
                .is_none_or(|last| now_ms - last >= self.config.scan_throttle_ms);
            if due && let Some(root) = self.pending_root.take() {
                self.analyze(&root, now_ms);
            }

            for issue in self.interception.drain_issues() {
                self.publish_event(EngineEvent::StaleClosureDetected { issue }, now_ms);
            }

            self.tracker.borrow_mut().evict_expired(now_ms);

            let change = self.bridge.as_mut().and_then(|bridge| bridge.tick(now_ms));
            if let Some(event) = change {
                self.publish_event(event, now_ms);
            }

            self.sample_memory(now_ms);
        }
        self.pipeline.tick(now_ms);
    }

    fn service_discovery(&mut self, now_ms: f64) {
        if self.bridge.is_some() {
            return;
        }
        let context = DiscoveryContext {
            scope: &*self.scope,
            mounted_root: self.pending_root.as_ref(),
        };
        let Some(store) = self.discovery.poll(&context, now_ms) else {
            return;
        };
        match StoreBridge::attach(store, &self.config) {
            Ok((bridge, snapshot)) => {
                self.bridge = Some(bridge);
                self.publish_event(EngineEvent::StoreDetected { snapshot }, now_ms);
            }
            Err(error) => warn!("discovered store failed to attach: {error}"),
        }
    }

    fn sample_memory(&mut self, now_ms: f64) {
        if !self.memory_monitoring {
            return;
        }
        if now_ms - self.last_memory_sample_at_ms < self.config.memory_sample_interval_ms {
            return;
        }
        // Instrumentation absent: skip quietly rather than erroring.
        let Some(sample) = self.memory_probe.as_ref().and_then(|probe| probe.sample()) else {
            return;
        };
        self.last_memory_sample_at_ms = now_ms;
        self.publish_event(
            EngineEvent::MemorySnapshot {
                used: sample.used,
                total: sample.total,
                limit: sample.limit,
                timestamp_ms: now_ms,
            },
            now_ms,
        );
    }

    fn analyze(&mut self, root: &N, now_ms: f64) {
        self.last_analysis_at_ms = Some(now_ms);

        let mut issues: Vec<Issue> = Vec::new();
        let mut render_entries: Vec<Value> = Vec::new();
        let mut component_names: Vec<String> = Vec::new();
        {
            let rules = &mut self.rules;
            let tracker = &self.tracker;
            let render_counts = &mut self.render_counts;
            let config = &self.config;
            let outcome = walk(root, config.node_cap, |node, path| {
                let change = classify_node(node, config);
                if matches!(node.kind(), NodeKind::Composite) {
                    tracker.borrow_mut().note_render(path);
                    *render_counts.entry(path.to_string()).or_insert(0) += 1;
                    component_names.push(component_label(node));
                }
                rules.inspect_node(node, path, &change, now_ms, &mut issues);
                if !matches!(change.kind, ChangeKind::Unknown) || node.render_duration_ms().is_some()
                {
                    render_entries.push(json!({
                        "component": component_label(node),
                        "path": path,
                        "cause": change.kind.as_tag(),
                        "changedFields": change.changed_fields,
                        "summary": change.summary,
                        "durationMs": node.render_duration_ms(),
                    }));
                }
            });
            if outcome.truncated {
                debug!("analysis truncated at {} nodes", outcome.visited);
            }
        }

        for entry in &render_entries {
            self.pipeline.publish("render", entry.clone(), now_ms);
        }
        for issue in &issues {
            self.pipeline.publish("issue", issue.to_payload(), now_ms);
            if let (Some(probe), Some(path)) = (self.layout_probe.as_deref(), &issue.location) {
                self.annotator.observe(path, issue, probe, now_ms);
            }
        }

        // Legacy eager commit summary beside the timeline path.
        let renders: Value = self
            .render_counts
            .iter()
            .map(|(path, count)| (path.clone(), json!(count)))
            .collect::<serde_json::Map<String, Value>>()
            .into();
        self.pipeline.publish_eager(
            "FIBER_COMMIT",
            EngineEvent::FiberCommit {
                components: json!(component_names),
                issues: issues.clone(),
                renders,
                timestamp_ms: now_ms,
            }
            .payload(),
            now_ms,
        );
    }

    /// Crash funnel: ships the failure with whatever context is cheap to
    /// gather (memory pressure, noisiest component).
    pub fn report_crash(
        &mut self,
        crash_type: &str,
        message: &str,
        stack: Option<String>,
        now_ms: f64,
    ) {
        let memory = self
            .memory_probe
            .as_ref()
            .and_then(|probe| probe.sample())
            .map(|sample| {
                json!({
                    "used": sample.used,
                    "total": sample.total,
                    "limit": sample.limit,
                })
            });
        let mut analysis_hints = Vec::new();
        if let Some(memory_value) = &memory
            && let (Some(used), Some(limit)) = (
                memory_value["used"].as_u64(),
                memory_value["limit"].as_u64(),
            )
            && limit > 0
            && used * 10 >= limit * 9
        {
            analysis_hints.push("memory usage was near its limit".to_string());
        }
        if let Some((path, count)) = self
            .render_counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(path, count)| (path.clone(), *count))
            && count > 1
        {
            analysis_hints.push(format!("{path} rendered {count} times before the crash"));
        }
        if analysis_hints.is_empty() {
            analysis_hints.push("review the most recent timeline events".to_string());
        }
        self.publish_event(
            EngineEvent::CrashDetected {
                id: Uuid::new_v4(),
                timestamp_ms: now_ms,
                crash_type: crash_type.to_string(),
                message: message.to_string(),
                stack,
                memory,
                analysis_hints,
            },
            now_ms,
        );
    }

    /// Re-initializes the transport after a dead-pipeline latch.
    pub fn reset_pipeline(&mut self) {
        self.pipeline.reset();
    }

    pub fn pipeline_dead(&self) -> bool {
        self.pipeline.is_dead()
    }

    /// Non-critical events are suppressed entirely while disabled;
    /// critical acknowledgements always pass.
    fn publish_event(&mut self, event: EngineEvent, now_ms: f64) {
        if !self.enabled && !crate::pipeline::is_critical(event.type_tag()) {
            return;
        }
        self.pipeline.publish(event.type_tag(), event.payload(), now_ms);
    }
}
