/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Best-effort store discovery over an arbitrary global namespace.
//!
//! An ordered table of independent strategies, each pure and
//! side-effect-free until one produces a validated candidate. Discovery
//! retries on a bounded exponential schedule and stops permanently once
//! the attempt ceiling is reached; only an explicit re-enable restarts
//! it.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use log::{debug, warn};

use crate::config::EngineConfig;
use crate::store::SharedStore;
use crate::tree::{RenderNode, walk};

/// Global names checked first; ordinary application conventions.
const KNOWN_GLOBAL_NAMES: [&str; 5] = [
    "store",
    "__store__",
    "reduxStore",
    "appStore",
    "__APP_STORE__",
];

/// Conventions of other state-management families, checked last.
const ALT_CONVENTION_NAMES: [&str; 4] = [
    "__MOBX_STORE__",
    "vuexStore",
    "__zustand_store__",
    "stateContainer",
];

/// Node budget when scanning tree metadata for an attached container.
const METADATA_SCAN_CAP: usize = 200;

/// Host-global namespace, as far as the adapter can enumerate it.
pub trait GlobalScope {
    fn lookup(&self, name: &str) -> Option<SharedStore>;
    fn property_names(&self) -> Vec<String>;
    /// Containers registered with a dev-tooling extension, if present.
    fn devtools_stores(&self) -> Vec<SharedStore>;
}

pub struct DiscoveryContext<'a, N: RenderNode> {
    pub scope: &'a dyn GlobalScope,
    pub mounted_root: Option<&'a N>,
}

/// Candidates must survive a read before they count as discovered.
fn validate(candidate: SharedStore) -> Option<SharedStore> {
    match candidate.read_state() {
        Ok(_) => Some(candidate),
        Err(error) => {
            debug!("store candidate rejected: {error}");
            None
        }
    }
}

type StrategyFn<N> = fn(&DiscoveryContext<'_, N>) -> Option<SharedStore>;

struct Strategy<N: RenderNode> {
    id: &'static str,
    discover: StrategyFn<N>,
}

fn discover_known_globals<N: RenderNode>(context: &DiscoveryContext<'_, N>) -> Option<SharedStore> {
    KNOWN_GLOBAL_NAMES
        .iter()
        .filter_map(|name| context.scope.lookup(name))
        .find_map(validate)
}

fn discover_devtools<N: RenderNode>(context: &DiscoveryContext<'_, N>) -> Option<SharedStore> {
    context
        .scope
        .devtools_stores()
        .into_iter()
        .find_map(validate)
}

fn discover_tree_metadata<N: RenderNode>(context: &DiscoveryContext<'_, N>) -> Option<SharedStore> {
    let root = context.mounted_root?;
    let mut found: Option<SharedStore> = None;
    walk(root, METADATA_SCAN_CAP, |node, _| {
        if found.is_none() {
            found = node.attached_store();
        }
    });
    found.and_then(validate)
}

fn discover_name_scan<N: RenderNode>(context: &DiscoveryContext<'_, N>) -> Option<SharedStore> {
    context
        .scope
        .property_names()
        .into_iter()
        .filter(|name| {
            let lowered = name.to_ascii_lowercase();
            lowered.contains("store") || lowered.contains("state")
        })
        .filter_map(|name| context.scope.lookup(&name))
        .find_map(validate)
}

fn discover_alt_conventions<N: RenderNode>(
    context: &DiscoveryContext<'_, N>,
) -> Option<SharedStore> {
    ALT_CONVENTION_NAMES
        .iter()
        .filter_map(|name| context.scope.lookup(name))
        .find_map(validate)
}

fn strategies<N: RenderNode>() -> [Strategy<N>; 5] {
    [
        Strategy { id: "known-globals", discover: discover_known_globals::<N> },
        Strategy { id: "devtools-connections", discover: discover_devtools::<N> },
        Strategy { id: "tree-metadata", discover: discover_tree_metadata::<N> },
        Strategy { id: "global-name-scan", discover: discover_name_scan::<N> },
        Strategy { id: "alt-conventions", discover: discover_alt_conventions::<N> },
    ]
}

fn retry_delay(step: u32, min_delay: Duration, max_delay: Duration) -> Duration {
    let step = step as usize;
    ExponentialBuilder::default()
        .with_min_delay(min_delay)
        .with_max_delay(max_delay)
        .with_factor(2.0)
        .with_max_times(step.saturating_add(1))
        .build()
        .nth(step)
        .unwrap_or(max_delay)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStatus {
    Probing,
    Found,
    Exhausted,
    Stopped,
}

pub struct StoreDiscovery {
    status: DiscoveryStatus,
    attempts: u32,
    max_attempts: u32,
    min_delay: Duration,
    max_delay: Duration,
    next_attempt_at_ms: f64,
}

impl StoreDiscovery {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            status: DiscoveryStatus::Probing,
            attempts: 0,
            max_attempts: config.discovery_max_attempts.max(1),
            min_delay: Duration::from_millis(config.discovery_backoff_min_ms),
            max_delay: Duration::from_millis(config.discovery_backoff_max_ms),
            next_attempt_at_ms: 0.0,
        }
    }

    pub fn status(&self) -> DiscoveryStatus {
        self.status
    }

    /// Runs one discovery attempt when due. Returns the validated store
    /// on success; otherwise schedules the next attempt or transitions
    /// to `Exhausted` at the ceiling.
    pub fn poll<N: RenderNode>(
        &mut self,
        context: &DiscoveryContext<'_, N>,
        now_ms: f64,
    ) -> Option<SharedStore> {
        if self.status != DiscoveryStatus::Probing || now_ms < self.next_attempt_at_ms {
            return None;
        }
        for strategy in strategies::<N>() {
            if let Some(store) = (strategy.discover)(context) {
                debug!("store discovered via {}", strategy.id);
                self.status = DiscoveryStatus::Found;
                return Some(store);
            }
        }
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            warn!(
                "store discovery gave up after {} attempts",
                self.attempts
            );
            self.status = DiscoveryStatus::Exhausted;
        } else {
            let delay = retry_delay(self.attempts, self.min_delay, self.max_delay);
            self.next_attempt_at_ms = now_ms + delay.as_millis() as f64;
        }
        None
    }

    /// Stops probing without touching a found store.
    pub fn stop(&mut self) {
        if self.status == DiscoveryStatus::Probing {
            self.status = DiscoveryStatus::Stopped;
        }
    }

    /// Explicit restart, also out of `Exhausted`.
    pub fn reenable(&mut self, now_ms: f64) {
        self.status = DiscoveryStatus::Probing;
        self.attempts = 0;
        self.next_attempt_at_ms = now_ms;
    }
}
