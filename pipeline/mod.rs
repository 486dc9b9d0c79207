/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Adaptive, backpressure-aware event transport.
//!
//! `publish` never blocks: events funnel through an unbounded channel
//! into a capped queue that `tick` flushes as `TIMELINE_EVENTS` batches.
//! A small allow-list of critical types bypasses batching and goes out
//! immediately, best-effort. Any failed delivery latches the transport
//! dead; afterwards every publish is silently dropped until `reset`.
//! The flush interval adapts to the observed event rate across three
//! tiers, sampled once per second.

use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::warn;
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::protocol::Envelope;

/// Types delivered immediately, even while batching is saturated.
pub const CRITICAL_EVENT_TYPES: [&str; 6] = [
    "REACT_DETECTED",
    "STORE_DETECTED",
    "STORE_STATE_CHANGE",
    "STORE_OVERRIDES_CLEARED",
    "SCAN_STATUS",
    "DEBUGGER_STATE_CHANGED",
];

pub fn is_critical(event_type: &str) -> bool {
    CRITICAL_EVENT_TYPES.contains(&event_type)
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEvent {
    pub id: Uuid,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: f64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
}

/// Monotonic millisecond stamps; same-millisecond events are tie-broken
/// by a fractional counter so ordering survives serialization.
#[derive(Debug, Default)]
pub struct TimestampAllocator {
    last_whole_ms: u64,
    tie_counter: u32,
}

impl TimestampAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, now_ms: f64) -> f64 {
        let whole = (now_ms.max(0.0) as u64).max(self.last_whole_ms);
        if whole == self.last_whole_ms {
            self.tie_counter += 1;
        } else {
            self.last_whole_ms = whole;
            self.tie_counter = 0;
        }
        whole as f64 + f64::from(self.tie_counter) * 1e-4
    }
}

#[derive(Debug)]
pub struct TransportError(pub String);

/// Delivery seam toward the relay tier.
pub trait Transport {
    fn deliver(&mut self, envelope: &Envelope) -> Result<(), TransportError>;
}

pub struct EventPipeline {
    funnel_tx: Sender<TimelineEvent>,
    funnel_rx: Receiver<TimelineEvent>,
    queue: VecDeque<TimelineEvent>,
    queue_cap: usize,
    dead: bool,
    transport: Box<dyn Transport>,
    stamps: TimestampAllocator,
    last_flush_at_ms: f64,
    flush_interval_ms: f64,
    last_rate_sample_at_ms: f64,
    events_since_sample: u32,
    tier_high_rate: u32,
    tier_mid_rate: u32,
    interval_high_ms: f64,
    interval_mid_ms: f64,
    interval_low_ms: f64,
}

impl EventPipeline {
    pub fn new(transport: Box<dyn Transport>, config: &EngineConfig) -> Self {
        let (funnel_tx, funnel_rx) = unbounded();
        Self {
            funnel_tx,
            funnel_rx,
            queue: VecDeque::new(),
            queue_cap: config.queue_cap.max(1),
            dead: false,
            transport,
            stamps: TimestampAllocator::new(),
            last_flush_at_ms: 0.0,
            flush_interval_ms: config.flush_interval_low_ms,
            last_rate_sample_at_ms: 0.0,
            events_since_sample: 0,
            tier_high_rate: config.flush_tier_high_rate,
            tier_mid_rate: config.flush_tier_mid_rate,
            interval_high_ms: config.flush_interval_high_ms,
            interval_mid_ms: config.flush_interval_mid_ms,
            interval_low_ms: config.flush_interval_low_ms,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len() + self.funnel_rx.len()
    }

    pub fn flush_interval_ms(&self) -> f64 {
        self.flush_interval_ms
    }

    /// Revives a dead transport and drops everything still queued.
    pub fn reset(&mut self) {
        self.dead = false;
        self.queue.clear();
        while self.funnel_rx.try_recv().is_ok() {}
    }

    /// Non-blocking publish. Critical types go straight to the
    /// transport; everything else queues for the next flush. Payload
    /// shape is the producer's responsibility.
    pub fn publish(&mut self, event_type: &str, payload: Value, now_ms: f64) {
        if self.dead {
            return;
        }
        self.events_since_sample = self.events_since_sample.saturating_add(1);
        let event = TimelineEvent {
            id: Uuid::new_v4(),
            timestamp_ms: self.stamps.next(now_ms),
            event_type: event_type.to_string(),
            payload,
        };
        if is_critical(event_type) {
            self.deliver_envelope(&Envelope::page(&event.event_type, Some(event.payload)));
            return;
        }
        let _ = self.funnel_tx.send(event);
    }

    /// Immediate single-envelope delivery outside the batch path; the
    /// legacy commit summary ships this way.
    pub fn publish_eager(&mut self, event_type: &str, payload: Value, now_ms: f64) {
        if self.dead {
            return;
        }
        self.events_since_sample = self.events_since_sample.saturating_add(1);
        let _ = self.stamps.next(now_ms);
        self.deliver_envelope(&Envelope::page(event_type, Some(payload)));
    }

    fn deliver_envelope(&mut self, envelope: &Envelope) {
        if self.transport.deliver(envelope).is_err() {
            warn!(
                "transport rejected {}, pipeline marked dead",
                envelope.message_type
            );
            self.dead = true;
        }
    }

    /// Drains the funnel into the capped queue, re-samples the event
    /// rate once per second, and flushes a batch when the interval
    /// elapsed.
    pub fn tick(&mut self, now_ms: f64) {
        while let Ok(event) = self.funnel_rx.try_recv() {
            if self.dead {
                continue;
            }
            self.queue.push_back(event);
            while self.queue.len() > self.queue_cap {
                self.queue.pop_front();
            }
        }

        if now_ms - self.last_rate_sample_at_ms >= 1_000.0 {
            let rate = self.events_since_sample;
            self.events_since_sample = 0;
            self.last_rate_sample_at_ms = now_ms;
            self.flush_interval_ms = if rate >= self.tier_high_rate {
                self.interval_high_ms
            } else if rate >= self.tier_mid_rate {
                self.interval_mid_ms
            } else {
                self.interval_low_ms
            };
        }

        if self.dead || self.queue.is_empty() {
            return;
        }
        if now_ms - self.last_flush_at_ms < self.flush_interval_ms {
            return;
        }
        self.last_flush_at_ms = now_ms;
        let batch: Vec<TimelineEvent> = self.queue.drain(..).collect();
        let envelope = Envelope::page("TIMELINE_EVENTS", Some(json!({ "events": batch })));
        self.deliver_envelope(&envelope);
    }
}
