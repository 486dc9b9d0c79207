/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Bridge to an externally owned state container.
//!
//! The container's shape is opaque; the bridge talks to it through the
//! three `StoreHandle` capabilities (read, dispatch, subscribe) plus an
//! optional one-shot state transform. Overrides capture the original
//! value on first touch and restore it in one batch on clear.
//! Administrative dispatches are tagged so they never re-enter the
//! broadcast loop as application actions.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use log::warn;
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::protocol::EngineEvent;

pub mod discovery;
pub mod json_path;
pub mod memory_store;

/// Action-type prefix marking bridge-internal dispatches.
pub const ADMIN_ACTION_PREFIX: &str = "@@renderscope/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Unavailable,
    ReadFailed(String),
    DispatchFailed(String),
    Unsupported,
}

impl fmt::Display for StoreError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(formatter, "store unavailable"),
            Self::ReadFailed(reason) => write!(formatter, "store read failed: {reason}"),
            Self::DispatchFailed(reason) => {
                write!(formatter, "store dispatch failed: {reason}")
            }
            Self::Unsupported => write!(formatter, "capability unsupported by this store"),
        }
    }
}

/// One-shot edit applied to the state produced by the next dispatch.
pub type StateTransform = Box<dyn FnOnce(Value) -> Value>;

/// Capability surface of a discovered container. `read_state`,
/// `dispatch`, and `subscribe` are required of every candidate;
/// `install_transform` is optional and gates the override mechanism.
pub trait StoreHandle {
    fn read_state(&self) -> Result<Value, StoreError>;
    fn dispatch(&self, action: Value) -> Result<(), StoreError>;
    fn subscribe(&self, observer: Box<dyn Fn()>) -> Result<(), StoreError>;
    fn install_transform(&self, _transform: StateTransform) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }
}

pub type SharedStore = Rc<dyn StoreHandle>;

pub(crate) fn admin_action(kind: &str) -> Value {
    json!({ "type": format!("{ADMIN_ACTION_PREFIX}{kind}") })
}

pub(crate) fn is_admin_action(action: &Value) -> bool {
    action
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|action_type| action_type.starts_with(ADMIN_ACTION_PREFIX))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOverride {
    pub path: Vec<String>,
    pub original_value: Value,
    pub current_value: Value,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: f64,
}

pub struct StoreBridge {
    store: SharedStore,
    overrides: Vec<StoreOverride>,
    debounce_ms: f64,
    dirty: Rc<Cell<bool>>,
    dirty_since_ms: Option<f64>,
}

impl StoreBridge {
    /// Wires up a validated store: one subscription feeding the
    /// debounced broadcast, and an initial snapshot for the discovery
    /// announcement.
    pub fn attach(store: SharedStore, config: &EngineConfig) -> Result<(Self, Value), StoreError> {
        let snapshot = store.read_state()?;
        let dirty = Rc::new(Cell::new(false));
        let flag = Rc::clone(&dirty);
        store.subscribe(Box::new(move || flag.set(true)))?;
        Ok((
            Self {
                store,
                overrides: Vec::new(),
                debounce_ms: config.store_debounce_ms,
                dirty,
                dirty_since_ms: None,
            },
            snapshot,
        ))
    }

    pub fn snapshot(&self) -> Result<Value, StoreError> {
        self.store.read_state()
    }

    pub fn overrides(&self) -> &[StoreOverride] {
        &self.overrides
    }

    /// Forwards an action to the store. Application actions come back as
    /// a `STORE_ACTION` event; administrative ones stay silent.
    pub fn dispatch_action(
        &mut self,
        action: Value,
        now_ms: f64,
    ) -> Result<Option<EngineEvent>, StoreError> {
        let administrative = is_admin_action(&action);
        let action_type = action
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let payload = action.get("payload").cloned().unwrap_or(Value::Null);
        self.store.dispatch(action)?;
        if administrative {
            return Ok(None);
        }
        Ok(Some(EngineEvent::StoreAction {
            id: Uuid::new_v4(),
            action_type,
            payload,
            timestamp_ms: now_ms,
        }))
    }

    fn dispatch_admin(&mut self, kind: &str, now_ms: f64) -> Result<(), StoreError> {
        self.dispatch_action(admin_action(kind), now_ms).map(|_| ())
    }

    pub fn set_override(
        &mut self,
        path: Vec<String>,
        value: Value,
        now_ms: f64,
    ) -> Result<(), StoreError> {
        let state = self.store.read_state()?;
        let original = json_path::get_path(&state, &path)
            .cloned()
            .unwrap_or(Value::Null);

        // Install before recording: an override-incapable store leaves
        // no half-applied record behind.
        let mut assignments: Vec<(Vec<String>, Value)> = self
            .overrides
            .iter()
            .filter(|entry| entry.path != path)
            .map(|entry| (entry.path.clone(), entry.current_value.clone()))
            .collect();
        assignments.push((path.clone(), value.clone()));
        self.store.install_transform(Box::new(move |mut state| {
            for (assignment_path, assignment_value) in assignments {
                if !json_path::set_path(&mut state, &assignment_path, assignment_value) {
                    warn!("override path no longer matches store shape, skipping");
                }
            }
            state
        }))?;

        match self.overrides.iter_mut().find(|entry| entry.path == path) {
            Some(existing) => {
                // First-touch original survives repeated overrides.
                existing.current_value = value;
                existing.timestamp_ms = now_ms;
            }
            None => self.overrides.push(StoreOverride {
                path,
                original_value: original,
                current_value: value,
                timestamp_ms: now_ms,
            }),
        }
        self.dispatch_admin("APPLY_OVERRIDE", now_ms)
    }

    /// Restores every captured original in one batch and drops the
    /// records.
    pub fn clear_overrides(&mut self, now_ms: f64) -> Result<EngineEvent, StoreError> {
        if !self.overrides.is_empty() {
            let restores: Vec<(Vec<String>, Value)> = self
                .overrides
                .iter()
                .map(|entry| (entry.path.clone(), entry.original_value.clone()))
                .collect();
            self.store.install_transform(Box::new(move |mut state| {
                for (path, value) in restores {
                    if !json_path::set_path(&mut state, &path, value) {
                        warn!("override path vanished before restore, skipping");
                    }
                }
                state
            }))?;
            self.dispatch_admin("CLEAR_OVERRIDES", now_ms)?;
            self.overrides.clear();
        }
        Ok(EngineEvent::StoreOverridesCleared)
    }

    pub fn delete_array_item(
        &mut self,
        path: Vec<String>,
        index: usize,
        now_ms: f64,
    ) -> Result<(), StoreError> {
        self.store.install_transform(Box::new(move |mut state| {
            if !json_path::delete_array_item(&mut state, &path, index) {
                warn!("array delete skipped, path or index out of shape");
            }
            state
        }))?;
        self.dispatch_admin("DELETE_ARRAY_ITEM", now_ms)
    }

    pub fn move_array_item(
        &mut self,
        path: Vec<String>,
        from_index: usize,
        to_index: usize,
        now_ms: f64,
    ) -> Result<(), StoreError> {
        self.store.install_transform(Box::new(move |mut state| {
            if !json_path::move_array_item(&mut state, &path, from_index, to_index) {
                warn!("array move skipped, path or indices out of shape");
            }
            state
        }))?;
        self.dispatch_admin("MOVE_ARRAY_ITEM", now_ms)
    }

    /// Debounced change broadcast: a burst of store notifications inside
    /// the window collapses into one snapshot event.
    pub fn tick(&mut self, now_ms: f64) -> Option<EngineEvent> {
        if self.dirty.get() && self.dirty_since_ms.is_none() {
            self.dirty_since_ms = Some(now_ms);
        }
        let since = self.dirty_since_ms?;
        if now_ms - since < self.debounce_ms {
            return None;
        }
        self.dirty.set(false);
        self.dirty_since_ms = None;
        match self.store.read_state() {
            Ok(snapshot) => Some(EngineEvent::StoreStateChange { snapshot }),
            Err(error) => {
                warn!("store snapshot read failed after change burst: {error}");
                None
            }
        }
    }
}
