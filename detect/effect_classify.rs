/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Heuristic classification of an effect's source text.
//!
//! Pattern matching over a function's textual form is approximate by
//! nature; everything lives behind `classify_effect_body` so a stricter
//! static-analysis pass can replace it without touching the detectors.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Timer,
    Interval,
    Listener,
    Subscription,
    Socket,
}

impl ResourceKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Interval => "interval",
            Self::Listener => "event listener",
            Self::Subscription => "subscription",
            Self::Socket => "streaming socket",
        }
    }

    /// Resources whose empty dependency lists are legitimate.
    pub fn excuses_empty_dependencies(self) -> bool {
        matches!(self, Self::Timer | Self::Interval | Self::Listener)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectBodyProfile {
    /// First resource-acquisition pattern found, if any.
    pub resource: Option<ResourceKind>,
    pub sets_state: bool,
    pub reads_external: bool,
}

impl EffectBodyProfile {
    pub fn needs_cleanup(&self) -> bool {
        self.resource.is_some()
    }
}

fn pattern(cell: &'static OnceLock<Regex>, source: &'static str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("classifier pattern compiles"))
}

fn interval_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"\bsetInterval\s*\(")
}

fn timer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"\bsetTimeout\s*\(")
}

fn listener_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"\baddEventListener\s*\(")
}

fn subscription_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"\.subscribe\s*\(")
}

fn socket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"\bnew\s+(WebSocket|EventSource)\b")
}

fn setter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"\bset[A-Z][A-Za-z0-9_]*\s*\(|\bdispatch\s*\(")
}

fn external_read_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(
        &RE,
        r"\b(props|state)\s*\.\s*[A-Za-z_]|\buse[A-Z][A-Za-z0-9_]*\s*\(",
    )
}

pub fn classify_effect_body(text: &str) -> EffectBodyProfile {
    let resource = if interval_re().is_match(text) {
        Some(ResourceKind::Interval)
    } else if timer_re().is_match(text) {
        Some(ResourceKind::Timer)
    } else if listener_re().is_match(text) {
        Some(ResourceKind::Listener)
    } else if subscription_re().is_match(text) {
        Some(ResourceKind::Subscription)
    } else if socket_re().is_match(text) {
        Some(ResourceKind::Socket)
    } else {
        None
    };

    EffectBodyProfile {
        resource,
        sets_state: setter_re().is_match(text),
        reads_external: external_read_re().is_match(text),
    }
}
