/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Transient on-screen highlights for flagged nodes.
//!
//! Consumes rule-engine output only: a flagged path is mapped to a
//! screen region through the host's layout probe and highlighted until
//! its lifetime runs out. Nodes the probe cannot place are skipped.

use euclid::default::Rect;

use crate::detect::{Issue, Severity};

/// Host capability mapping a component path to its on-screen region.
pub trait LayoutProbe {
    fn region_for_path(&self, path: &str) -> Option<Rect<f32>>;
}

#[derive(Debug, Clone)]
pub struct Highlight {
    pub rect: Rect<f32>,
    pub label: String,
    pub severity: Severity,
    pub expires_at_ms: f64,
}

pub struct Annotator {
    highlights: Vec<Highlight>,
    ttl_ms: f64,
}

impl Annotator {
    pub fn new(ttl_ms: f64) -> Self {
        Self {
            highlights: Vec::new(),
            ttl_ms,
        }
    }

    pub fn observe(&mut self, path: &str, issue: &Issue, probe: &dyn LayoutProbe, now_ms: f64) {
        let Some(rect) = probe.region_for_path(path) else {
            return;
        };
        self.highlights.push(Highlight {
            rect,
            label: format!("{}: {}", issue.component_name, issue.message),
            severity: issue.severity,
            expires_at_ms: now_ms + self.ttl_ms,
        });
    }

    /// Live highlights; expired ones are pruned on the way out.
    pub fn active(&mut self, now_ms: f64) -> &[Highlight] {
        self.highlights
            .retain(|highlight| highlight.expires_at_ms > now_ms);
        &self.highlights
    }

    pub fn clear(&mut self) {
        self.highlights.clear();
    }
}
