/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Wire surface: three-tier envelopes, inbound control messages, and
//! outbound events.
//!
//! Envelopes flow instrumented page → relay → consumer; the relay only
//! forwards messages whose `source` matches the tier it expects, which
//! keeps the tiers from talking past each other. Tags follow the
//! established wire vocabulary so existing consumers keep working.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::detect::Issue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeSource {
    /// Instrumented page, closest to the tree.
    Page,
    /// Bridges the page and the consumer process.
    Relay,
    /// Presentation side.
    Consumer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub source: EnvelopeSource,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Envelope {
    pub fn page(message_type: &str, payload: Option<Value>) -> Self {
        Self {
            source: EnvelopeSource::Page,
            message_type: message_type.to_string(),
            payload,
        }
    }
}

/// Relay-side filter: forwards only envelopes from the expected origin
/// tier, re-tagged as relay traffic. Everything else is cross-talk and
/// gets dropped.
pub fn relay_forward(envelope: Envelope, expected_source: EnvelopeSource) -> Option<Envelope> {
    if envelope.source != expected_source {
        return None;
    }
    Some(Envelope {
        source: EnvelopeSource::Relay,
        ..envelope
    })
}

/// Control messages flowing into the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    #[serde(rename = "ENABLE_DEBUGGER")]
    EnableDebugger,
    #[serde(rename = "DISABLE_DEBUGGER")]
    DisableDebugger,
    #[serde(rename = "GET_DEBUGGER_STATE")]
    GetDebuggerState,
    #[serde(rename = "TOGGLE_SCAN")]
    ToggleScan {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enabled: Option<bool>,
    },
    #[serde(rename = "START_MEMORY_MONITORING")]
    StartMemoryMonitoring,
    #[serde(rename = "STOP_MEMORY_MONITORING")]
    StopMemoryMonitoring,
    #[serde(rename = "DISPATCH_STORE_ACTION")]
    DispatchStoreAction { action: Value },
    #[serde(rename = "SET_STORE_STATE")]
    SetStoreState { path: Vec<String>, value: Value },
    #[serde(rename = "CLEAR_STORE_OVERRIDES")]
    ClearStoreOverrides,
    #[serde(rename = "DELETE_ARRAY_ITEM")]
    DeleteArrayItem {
        path: Vec<String>,
        index: usize,
    },
    #[serde(rename = "MOVE_ARRAY_ITEM")]
    MoveArrayItem {
        path: Vec<String>,
        #[serde(rename = "fromIndex")]
        from_index: usize,
        #[serde(rename = "toIndex")]
        to_index: usize,
    },
    #[serde(rename = "REFRESH_STORE_STATE")]
    RefreshStoreState,
}

/// Events flowing out of the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    ReactDetected {
        version: String,
        mode: String,
    },
    StoreDetected {
        snapshot: Value,
    },
    StoreAction {
        id: Uuid,
        action_type: String,
        payload: Value,
        timestamp_ms: f64,
    },
    StoreStateChange {
        snapshot: Value,
    },
    StoreOverridesCleared,
    /// Legacy eager commit summary, shipped beside the timeline path.
    FiberCommit {
        components: Value,
        issues: Vec<Issue>,
        renders: Value,
        timestamp_ms: f64,
    },
    StaleClosureDetected {
        issue: Issue,
    },
    MemorySnapshot {
        used: u64,
        total: u64,
        limit: u64,
        timestamp_ms: f64,
    },
    CrashDetected {
        id: Uuid,
        timestamp_ms: f64,
        crash_type: String,
        message: String,
        stack: Option<String>,
        memory: Option<Value>,
        analysis_hints: Vec<String>,
    },
    ScanStatus {
        enabled: bool,
    },
    DebuggerStateChanged {
        enabled: bool,
    },
}

impl EngineEvent {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::ReactDetected { .. } => "REACT_DETECTED",
            Self::StoreDetected { .. } => "STORE_DETECTED",
            Self::StoreAction { .. } => "STORE_ACTION",
            Self::StoreStateChange { .. } => "STORE_STATE_CHANGE",
            Self::StoreOverridesCleared => "STORE_OVERRIDES_CLEARED",
            Self::FiberCommit { .. } => "FIBER_COMMIT",
            Self::StaleClosureDetected { .. } => "STALE_CLOSURE_DETECTED",
            Self::MemorySnapshot { .. } => "MEMORY_SNAPSHOT",
            Self::CrashDetected { .. } => "CRASH_DETECTED",
            Self::ScanStatus { .. } => "SCAN_STATUS",
            Self::DebuggerStateChanged { .. } => "DEBUGGER_STATE_CHANGED",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::ReactDetected { version, mode } => {
                json!({ "version": version, "mode": mode })
            }
            Self::StoreDetected { snapshot } | Self::StoreStateChange { snapshot } => {
                json!({ "snapshot": snapshot })
            }
            Self::StoreAction {
                id,
                action_type,
                payload,
                timestamp_ms,
            } => json!({
                "id": id,
                "type": action_type,
                "payload": payload,
                "timestamp": timestamp_ms,
            }),
            Self::StoreOverridesCleared => json!({}),
            Self::FiberCommit {
                components,
                issues,
                renders,
                timestamp_ms,
            } => json!({
                "components": components,
                "issues": issues,
                "renders": renders,
                "timestamp": timestamp_ms,
            }),
            Self::StaleClosureDetected { issue } => json!({ "issue": issue }),
            Self::MemorySnapshot {
                used,
                total,
                limit,
                timestamp_ms,
            } => json!({
                "used": used,
                "total": total,
                "limit": limit,
                "timestamp": timestamp_ms,
            }),
            Self::CrashDetected {
                id,
                timestamp_ms,
                crash_type,
                message,
                stack,
                memory,
                analysis_hints,
            } => json!({
                "id": id,
                "timestamp": timestamp_ms,
                "type": crash_type,
                "message": message,
                "stack": stack,
                "memorySnapshot": memory,
                "analysisHints": analysis_hints,
            }),
            Self::ScanStatus { enabled } | Self::DebuggerStateChanged { enabled } => {
                json!({ "enabled": enabled })
            }
        }
    }
}
