/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! End-to-end engine flows: enable, scan, coalescing, lifecycle resets.

use renderscope::engine::{DebugEngine, HostInfo, MemoryProbe, MemorySample};
use renderscope::protocol::ControlMessage;
use renderscope::tree::NodeKind;
use renderscope::tree::memory_tree::{MemoryNodeHandle, MemoryTree};
use renderscope::EngineConfig;

use crate::harness::{FakeScope, RecordingTransport};

fn engine_with(
    transport: &RecordingTransport,
    scope: &FakeScope,
    config: EngineConfig,
) -> DebugEngine<MemoryNodeHandle> {
    DebugEngine::new(config, Box::new(transport.clone()), Box::new(scope.clone()))
}

/// A list whose two rows carry no identity keys.
fn unkeyed_list_tree() -> MemoryTree {
    let tree = MemoryTree::new();
    let app = tree.mount(tree.root_key(), NodeKind::Composite, Some("App"));
    let list = tree.mount(app, NodeKind::Composite, Some("List"));
    tree.mount(list, NodeKind::Host, Some("Row"));
    tree.mount(list, NodeKind::Host, Some("Row"));
    tree
}

#[test]
fn scan_pass_ships_commit_summary_and_timeline_batch() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let mut engine = engine_with(&transport, &scope, EngineConfig::default());

    engine.enable(0.0);
    engine.attach_host(
        HostInfo {
            version: "18.2.0".to_string(),
            mode: "development".to_string(),
        },
        0.0,
    );
    engine.notify_tree_update(unkeyed_list_tree().root());
    engine.idle_tick(10_000.0);

    let types = transport.envelope_types();
    assert!(types.contains(&"DEBUGGER_STATE_CHANGED".to_string()));
    assert!(types.contains(&"REACT_DETECTED".to_string()));
    assert!(types.contains(&"FIBER_COMMIT".to_string()));
    assert!(types.contains(&"TIMELINE_EVENTS".to_string()));

    let tags = transport.timeline_entry_tags();
    assert!(tags.iter().any(|tag| tag == "issue:MISSING_KEY"));
    assert!(tags.iter().any(|tag| tag.starts_with("render")));
}

#[test]
fn disabled_engine_suppresses_everything_but_critical_acks() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let mut engine = engine_with(&transport, &scope, EngineConfig::default());

    // Never enabled: scans are ignored outright.
    engine.notify_tree_update(unkeyed_list_tree().root());
    engine.idle_tick(10_000.0);
    assert_eq!(transport.count_of("FIBER_COMMIT"), 0);
    assert_eq!(transport.count_of("TIMELINE_EVENTS"), 0);

    // Critical acknowledgements still pass while disabled.
    engine.handle_control(ControlMessage::GetDebuggerState, 11_000.0);
    assert_eq!(transport.count_of("DEBUGGER_STATE_CHANGED"), 1);
    engine.handle_control(ControlMessage::ToggleScan { enabled: Some(false) }, 11_100.0);
    assert_eq!(transport.count_of("SCAN_STATUS"), 1);
}

#[test]
fn overlapping_updates_coalesce_and_the_most_recent_root_wins() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let mut engine = engine_with(&transport, &scope, EngineConfig::default());
    engine.enable(0.0);

    let first = MemoryTree::new();
    first.mount(first.root_key(), NodeKind::Composite, Some("FirstRoot"));
    let second = MemoryTree::new();
    second.mount(second.root_key(), NodeKind::Composite, Some("SecondRoot"));

    engine.notify_tree_update(first.root());
    engine.notify_tree_update(second.root());
    engine.idle_tick(10_000.0);

    assert_eq!(transport.count_of("FIBER_COMMIT"), 1);
    let delivered = transport.delivered.borrow();
    let commit = delivered
        .iter()
        .find(|envelope| envelope.message_type == "FIBER_COMMIT")
        .expect("commit envelope");
    let components = commit.payload.as_ref().expect("payload")["components"]
        .as_array()
        .expect("components")
        .clone();
    drop(delivered);
    assert!(components.iter().any(|name| name.as_str() == Some("SecondRoot")));
    assert!(components.iter().all(|name| name.as_str() != Some("FirstRoot")));
}

#[test]
fn analysis_respects_the_throttle_window() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let mut engine = engine_with(&transport, &scope, EngineConfig::default());
    engine.enable(0.0);

    let tree = unkeyed_list_tree();
    engine.notify_tree_update(tree.root());
    engine.idle_tick(10_000.0);
    assert_eq!(transport.count_of("FIBER_COMMIT"), 1);

    // A second update inside the window stays pending.
    engine.notify_tree_update(tree.root());
    engine.idle_tick(10_050.0);
    assert_eq!(transport.count_of("FIBER_COMMIT"), 1);

    engine.idle_tick(10_400.0);
    assert_eq!(transport.count_of("FIBER_COMMIT"), 2);
}

#[test]
fn disable_then_enable_lets_suppressed_issues_fire_again() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let mut engine = engine_with(&transport, &scope, EngineConfig::default());
    engine.enable(0.0);

    let tree = unkeyed_list_tree();
    engine.notify_tree_update(tree.root());
    engine.idle_tick(10_000.0);

    // Same condition, second pass: deduplicated.
    engine.notify_tree_update(tree.root());
    engine.idle_tick(11_000.0);

    let before = transport
        .timeline_entry_tags()
        .iter()
        .filter(|tag| *tag == "issue:MISSING_KEY")
        .count();
    assert_eq!(before, 1);

    engine.disable(12_000.0);
    engine.enable(13_000.0);
    engine.notify_tree_update(tree.root());
    engine.idle_tick(20_000.0);

    let after = transport
        .timeline_entry_tags()
        .iter()
        .filter(|tag| *tag == "issue:MISSING_KEY")
        .count();
    assert_eq!(after, 2);
}

struct FixedMemoryProbe;
impl MemoryProbe for FixedMemoryProbe {
    fn sample(&self) -> Option<MemorySample> {
        Some(MemorySample {
            used: 64,
            total: 128,
            limit: 256,
        })
    }
}

#[test]
fn memory_snapshots_follow_start_and_stop_controls() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let mut engine = engine_with(&transport, &scope, EngineConfig::default())
        .with_memory_probe(Box::new(FixedMemoryProbe));
    engine.enable(0.0);

    engine.idle_tick(1_000.0);
    engine.handle_control(ControlMessage::StartMemoryMonitoring, 1_500.0);
    engine.idle_tick(3_000.0);
    engine.idle_tick(3_100.0);
    engine.idle_tick(5_000.0);
    engine.handle_control(ControlMessage::StopMemoryMonitoring, 5_500.0);
    engine.idle_tick(8_000.0);

    let snapshots = transport
        .timeline_entry_tags()
        .iter()
        .filter(|tag| *tag == "MEMORY_SNAPSHOT")
        .count();
    assert_eq!(snapshots, 2);
}

#[test]
fn crash_reports_carry_analysis_hints() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let mut engine = engine_with(&transport, &scope, EngineConfig::default());
    engine.enable(0.0);

    engine.report_crash(
        "unhandled-rejection",
        "boom",
        Some("at main.js:1".to_string()),
        1_000.0,
    );
    engine.idle_tick(10_000.0);

    let tags = transport.timeline_entry_tags();
    assert!(tags.iter().any(|tag| tag.starts_with("CRASH_DETECTED")));
}

#[test]
fn control_messages_drive_the_engine_from_wire_json() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let mut engine = engine_with(&transport, &scope, EngineConfig::default());

    let enable: ControlMessage =
        serde_json::from_str(r#"{"type":"ENABLE_DEBUGGER"}"#).expect("parse");
    engine.handle_control(enable, 0.0);
    assert!(engine.is_enabled());

    let toggle: ControlMessage =
        serde_json::from_str(r#"{"type":"TOGGLE_SCAN","enabled":false}"#).expect("parse");
    engine.handle_control(toggle, 1.0);
    assert!(!engine.scan_enabled());
}
