/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Store discovery and the override control surface, end to end.

use std::rc::Rc;

use serde_json::json;

use renderscope::EngineConfig;
use renderscope::engine::DebugEngine;
use renderscope::protocol::ControlMessage;
use renderscope::store::SharedStore;
use renderscope::store::discovery::DiscoveryStatus;
use renderscope::store::memory_store::MemoryStore;
use renderscope::tree::memory_tree::MemoryNodeHandle;

use crate::harness::{FakeScope, RecordingTransport};

fn engine_with(
    transport: &RecordingTransport,
    scope: &FakeScope,
) -> DebugEngine<MemoryNodeHandle> {
    DebugEngine::new(
        EngineConfig::default(),
        Box::new(transport.clone()),
        Box::new(scope.clone()),
    )
}

fn path(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

#[test]
fn discovered_store_is_announced_with_a_snapshot() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let store = MemoryStore::new(json!({"user": {"role": "viewer"}}));
    scope.insert("reduxStore", Rc::new(store) as SharedStore);

    let mut engine = engine_with(&transport, &scope);
    engine.enable(0.0);
    engine.idle_tick(1_000.0);

    assert_eq!(engine.discovery_status(), DiscoveryStatus::Found);
    assert_eq!(transport.count_of("STORE_DETECTED"), 1);
    let delivered = transport.delivered.borrow();
    let detected = delivered
        .iter()
        .find(|envelope| envelope.message_type == "STORE_DETECTED")
        .expect("detection envelope");
    assert_eq!(
        detected.payload.as_ref().expect("payload")["snapshot"]["user"]["role"],
        json!("viewer")
    );
}

#[test]
fn discovery_without_candidates_eventually_exhausts() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let mut engine = engine_with(&transport, &scope);
    engine.enable(0.0);

    let mut now = 0.0;
    for _ in 0..40 {
        engine.idle_tick(now);
        now += 60_000.0;
    }
    assert_eq!(engine.discovery_status(), DiscoveryStatus::Exhausted);
    assert_eq!(transport.count_of("STORE_DETECTED"), 0);
}

#[test]
fn override_controls_mutate_and_restore_the_store() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let store = MemoryStore::new(json!({"user": {"role": "viewer"}, "todos": ["a", "b"]}));
    scope.insert("store", Rc::new(store.clone()) as SharedStore);

    let mut engine = engine_with(&transport, &scope);
    engine.enable(0.0);
    engine.idle_tick(1_000.0);
    let before = store.state();

    engine.handle_control(
        ControlMessage::SetStoreState {
            path: path(&["user", "role"]),
            value: json!("admin"),
        },
        2_000.0,
    );
    assert_eq!(store.state()["user"]["role"], json!("admin"));
    assert_eq!(engine.bridge().expect("bridge").overrides().len(), 1);

    engine.handle_control(ControlMessage::ClearStoreOverrides, 3_000.0);
    assert_eq!(store.state(), before);
    assert!(engine.bridge().expect("bridge").overrides().is_empty());
    assert_eq!(transport.count_of("STORE_OVERRIDES_CLEARED"), 1);
}

#[test]
fn array_item_controls_edit_store_collections() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let store = MemoryStore::new(json!({"todos": ["a", "b", "c"]}));
    scope.insert("store", Rc::new(store.clone()) as SharedStore);

    let mut engine = engine_with(&transport, &scope);
    engine.enable(0.0);
    engine.idle_tick(1_000.0);

    engine.handle_control(
        ControlMessage::MoveArrayItem {
            path: path(&["todos"]),
            from_index: 0,
            to_index: 2,
        },
        2_000.0,
    );
    assert_eq!(store.state()["todos"], json!(["b", "c", "a"]));

    engine.handle_control(
        ControlMessage::DeleteArrayItem {
            path: path(&["todos"]),
            index: 0,
        },
        3_000.0,
    );
    assert_eq!(store.state()["todos"], json!(["c", "a"]));
}

#[test]
fn dispatched_actions_surface_on_the_timeline_and_bursts_debounce() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let store = MemoryStore::new(json!({"n": 0}));
    scope.insert("store", Rc::new(store) as SharedStore);

    let mut engine = engine_with(&transport, &scope);
    engine.enable(0.0);
    engine.idle_tick(1_000.0);

    engine.handle_control(
        ControlMessage::DispatchStoreAction {
            action: json!({"type": "login", "payload": {"user": "ada"}}),
        },
        2_000.0,
    );
    engine.handle_control(
        ControlMessage::DispatchStoreAction {
            action: json!({"type": "logout"}),
        },
        2_010.0,
    );

    // The change burst becomes a single debounced snapshot.
    engine.idle_tick(2_020.0);
    assert_eq!(transport.count_of("STORE_STATE_CHANGE"), 0);
    engine.idle_tick(2_200.0);
    assert_eq!(transport.count_of("STORE_STATE_CHANGE"), 1);
    engine.idle_tick(2_400.0);
    assert_eq!(transport.count_of("STORE_STATE_CHANGE"), 1);

    let tags = transport.timeline_entry_tags();
    let actions = tags
        .iter()
        .filter(|tag| tag.starts_with("STORE_ACTION"))
        .count();
    assert_eq!(actions, 2);
}

#[test]
fn refresh_control_reads_a_fresh_snapshot() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let store = MemoryStore::new(json!({"ready": true}));
    scope.insert("store", Rc::new(store) as SharedStore);

    let mut engine = engine_with(&transport, &scope);
    engine.enable(0.0);
    engine.idle_tick(1_000.0);

    engine.handle_control(ControlMessage::RefreshStoreState, 2_000.0);
    assert_eq!(transport.count_of("STORE_STATE_CHANGE"), 1);
}

#[test]
fn store_controls_without_a_store_are_ignored() {
    let transport = RecordingTransport::default();
    let scope = FakeScope::default();
    let mut engine = engine_with(&transport, &scope);
    engine.enable(0.0);

    engine.handle_control(
        ControlMessage::SetStoreState {
            path: path(&["user", "role"]),
            value: json!("admin"),
        },
        1_000.0,
    );
    assert!(engine.bridge().is_none());
}
