/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Live introspection and heuristic analysis for an embedded UI runtime.
//!
//! Core structures:
//! - `tree`: the `RenderNode` capability trait and the bounded walker
//! - `diff`: per-node render-change classification with bounded previews
//! - `detect`: the anti-pattern rule engine
//! - `closure`: closure staleness tracking across render generations
//! - `store`: discovery of and bridge to an external state container
//! - `pipeline`: the adaptive, backpressure-aware event transport
//! - `engine`: the orchestrator tying a host adapter to all of the above
//!
//! Boundary: the engine never owns host tree memory. Everything it reads
//! from the host goes through the narrow capability traits in `tree`,
//! `store`, and `engine`; a read that fails degrades to skipping that
//! node or candidate instead of aborting the pass.

pub mod annotator;
mod clock;
pub mod closure;
pub mod config;
pub mod detect;
pub mod diff;
pub mod engine;
pub mod pipeline;
pub mod protocol;
pub mod store;
pub mod tree;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::EngineConfig;
pub use engine::DebugEngine;
