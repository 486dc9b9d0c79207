/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Engine tunables.
//!
//! Every policy constant the engine relies on (caps, budgets, windows,
//! retry bounds) lives here rather than being scattered as hard
//! constants. Embedders can override any field from TOML; absent fields
//! keep their defaults.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard cap on nodes visited per tree walk; excess is silently truncated.
    pub node_cap: usize,
    /// Maximum changed-field names carried on a classification; the rest
    /// is folded into an overflow count.
    pub changed_field_cap: usize,
    /// Recursion ceiling for value previews.
    pub preview_depth: usize,
    /// Character ceiling for string previews.
    pub preview_string_cap: usize,
    /// Frame budget; renders above it are flagged as warnings.
    pub frame_budget_ms: f64,
    /// Escalation threshold; renders above it are flagged as errors.
    pub slow_render_error_ms: f64,
    /// Sliding window for the rerender counter.
    pub rerender_window_ms: f64,
    /// Renders inside the window before the rerender detector fires.
    pub rerender_threshold: usize,
    /// Minimum spacing between two analysis passes.
    pub scan_throttle_ms: f64,
    /// Age ceiling for closure records, fired or not.
    pub closure_ttl_ms: f64,
    /// Quiet period before a store change burst is broadcast as one snapshot.
    pub store_debounce_ms: f64,
    /// Store discovery attempt ceiling; afterwards discovery stops until
    /// explicitly re-enabled.
    pub discovery_max_attempts: u32,
    pub discovery_backoff_min_ms: u64,
    pub discovery_backoff_max_ms: u64,
    /// Hard cap on queued timeline events; oldest entries drop first.
    pub queue_cap: usize,
    /// Events/second at which the flush interval shrinks to its shortest tier.
    pub flush_tier_high_rate: u32,
    /// Events/second at which the flush interval shrinks to the middle tier.
    pub flush_tier_mid_rate: u32,
    pub flush_interval_high_ms: f64,
    pub flush_interval_mid_ms: f64,
    pub flush_interval_low_ms: f64,
    /// Lifetime of an on-screen highlight.
    pub highlight_ttl_ms: f64,
    /// Spacing between memory snapshots while monitoring is on.
    pub memory_sample_interval_ms: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_cap: 500,
            changed_field_cap: 5,
            preview_depth: 3,
            preview_string_cap: 40,
            frame_budget_ms: 16.0,
            slow_render_error_ms: 50.0,
            rerender_window_ms: 1_000.0,
            rerender_threshold: 10,
            scan_throttle_ms: 150.0,
            closure_ttl_ms: 60_000.0,
            store_debounce_ms: 100.0,
            discovery_max_attempts: 12,
            discovery_backoff_min_ms: 250,
            discovery_backoff_max_ms: 5_000,
            queue_cap: 100,
            flush_tier_high_rate: 100,
            flush_tier_mid_rate: 20,
            flush_interval_high_ms: 50.0,
            flush_interval_mid_ms: 100.0,
            flush_interval_low_ms: 250.0,
            highlight_ttl_ms: 1_500.0,
            memory_sample_interval_ms: 1_000.0,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}
