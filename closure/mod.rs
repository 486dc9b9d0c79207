/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Closure staleness tracking across render generations.
//!
//! The interception layer wraps the host's three scheduling capabilities
//! (deferred call, repeating call, event subscribe). Each wrapped
//! closure is stamped with the render generation active at capture time
//! and consulted exactly once when it first runs; a component that has
//! advanced more than one generation since capture indicates the closure
//! is likely reading stale values. Generation counters are a proxy, not
//! a guarantee.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use uuid::Uuid;

use crate::clock;
use crate::detect::{Issue, IssueKind, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationKind {
    Timer,
    Interval,
    Listener,
}

impl RegistrationKind {
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Interval => "interval",
            Self::Listener => "listener",
        }
    }
}

/// Render-generation context active while a component renders; the host
/// adapter sets it around each render so interceptions can stamp
/// closures.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub component_name: String,
    pub component_path: String,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct ClosureRecord {
    pub id: Uuid,
    pub component_name: String,
    pub component_path: String,
    pub captured_generation: u64,
    pub created_at_ms: f64,
    pub function_name: String,
    pub captured_variables: Vec<String>,
    pub registration_kind: RegistrationKind,
}

pub struct ClosureTracker {
    records: HashMap<Uuid, ClosureRecord>,
    generations: HashMap<String, u64>,
    fired: HashSet<String>,
    ttl_ms: f64,
}

impl ClosureTracker {
    pub fn new(ttl_ms: f64) -> Self {
        Self {
            records: HashMap::new(),
            generations: HashMap::new(),
            fired: HashSet::new(),
            ttl_ms,
        }
    }

    /// Bumps and returns the current generation for a component path.
    pub fn note_render(&mut self, path: &str) -> u64 {
        let generation = self.generations.entry(path.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    pub fn current_generation(&self, path: &str) -> u64 {
        self.generations.get(path).copied().unwrap_or(0)
    }

    pub fn register(
        &mut self,
        context: &RenderContext,
        kind: RegistrationKind,
        function_name: &str,
        captured_variables: Vec<String>,
        now_ms: f64,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.records.insert(
            id,
            ClosureRecord {
                id,
                component_name: context.component_name.clone(),
                component_path: context.component_path.clone(),
                captured_generation: context.generation,
                created_at_ms: now_ms,
                function_name: function_name.to_string(),
                captured_variables,
                registration_kind: kind,
            },
        );
        id
    }

    /// Consults (and consumes) a record when its closure first runs.
    /// Returns an issue when the owning component has advanced more than
    /// one generation since capture, at most once per
    /// `(component, function, registration kind)`.
    pub fn on_invoke(&mut self, id: Uuid, now_ms: f64) -> Option<Issue> {
        let record = self.records.remove(&id)?;
        let current = self.current_generation(&record.component_path);
        if current <= record.captured_generation + 1 {
            return None;
        }
        let fire_key = format!(
            "{}|{}|{}",
            record.component_name,
            record.function_name,
            record.registration_kind.as_tag(),
        );
        if !self.fired.insert(fire_key) {
            return None;
        }
        let drift = current - record.captured_generation;
        Some(Issue::new(
            IssueKind::StaleClosure,
            Severity::Warning,
            &record.component_name,
            format!(
                "{} callback `{}` captured at generation {} ran at generation {current} ({drift} renders behind)",
                record.registration_kind.as_tag(),
                record.function_name,
                record.captured_generation,
            ),
            "Re-register the callback after renders, or read live values inside it",
            now_ms,
            Some(format!(
                "{}:{}",
                record.function_name,
                record.registration_kind.as_tag()
            )),
        ))
    }

    /// Drops records past the age ceiling, fired or not.
    pub fn evict_expired(&mut self, now_ms: f64) {
        let ttl = self.ttl_ms;
        self.records
            .retain(|_, record| now_ms - record.created_at_ms < ttl);
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.generations.clear();
        self.fired.clear();
    }

    pub fn tracked_count(&self) -> usize {
        self.records.len()
    }
}

/// Wraps the host's scheduling entry points so captured closures get
/// stamped and consulted. Independently toggleable; while uninstalled it
/// passes closures through untouched.
pub struct InterceptionLayer {
    tracker: Rc<RefCell<ClosureTracker>>,
    context: Rc<RefCell<Option<RenderContext>>>,
    outbox: Rc<RefCell<Vec<Issue>>>,
    installed: Cell<bool>,
}

impl InterceptionLayer {
    pub fn new(tracker: Rc<RefCell<ClosureTracker>>) -> Self {
        Self {
            tracker,
            context: Rc::new(RefCell::new(None)),
            outbox: Rc::new(RefCell::new(Vec::new())),
            installed: Cell::new(false),
        }
    }

    pub fn install(&self) {
        self.installed.set(true);
    }

    pub fn uninstall(&self) {
        self.installed.set(false);
        *self.context.borrow_mut() = None;
    }

    pub fn is_installed(&self) -> bool {
        self.installed.get()
    }

    /// Host adapters set this around each component render.
    pub fn set_render_context(&self, context: Option<RenderContext>) {
        *self.context.borrow_mut() = context;
    }

    /// Staleness issues raised by wrapped closures since the last drain.
    pub fn drain_issues(&self) -> Vec<Issue> {
        std::mem::take(&mut *self.outbox.borrow_mut())
    }

    fn register_current(
        &self,
        kind: RegistrationKind,
        function_name: &str,
        captured_variables: Vec<String>,
    ) -> Option<Uuid> {
        if !self.installed.get() {
            return None;
        }
        let context = self.context.borrow();
        let context = context.as_ref()?;
        Some(self.tracker.borrow_mut().register(
            context,
            kind,
            function_name,
            captured_variables,
            clock::unix_ms(),
        ))
    }

    pub fn wrap_deferred(
        &self,
        function_name: &str,
        captured_variables: Vec<String>,
        callback: Box<dyn FnOnce()>,
    ) -> Box<dyn FnOnce()> {
        let Some(id) = self.register_current(RegistrationKind::Timer, function_name, captured_variables)
        else {
            return callback;
        };
        let tracker = Rc::clone(&self.tracker);
        let outbox = Rc::clone(&self.outbox);
        Box::new(move || {
            if let Some(issue) = tracker.borrow_mut().on_invoke(id, clock::unix_ms()) {
                outbox.borrow_mut().push(issue);
            }
            callback();
        })
    }

    pub fn wrap_repeating(
        &self,
        function_name: &str,
        captured_variables: Vec<String>,
        callback: Box<dyn FnMut()>,
    ) -> Box<dyn FnMut()> {
        self.wrap_recurring(RegistrationKind::Interval, function_name, captured_variables, callback)
    }

    pub fn wrap_listener(
        &self,
        function_name: &str,
        captured_variables: Vec<String>,
        callback: Box<dyn FnMut()>,
    ) -> Box<dyn FnMut()> {
        self.wrap_recurring(RegistrationKind::Listener, function_name, captured_variables, callback)
    }

    fn wrap_recurring(
        &self,
        kind: RegistrationKind,
        function_name: &str,
        captured_variables: Vec<String>,
        mut callback: Box<dyn FnMut()>,
    ) -> Box<dyn FnMut()> {
        let Some(id) = self.register_current(kind, function_name, captured_variables) else {
            return callback;
        };
        let tracker = Rc::clone(&self.tracker);
        let outbox = Rc::clone(&self.outbox);
        let mut pending = Some(id);
        Box::new(move || {
            if let Some(id) = pending.take()
                && let Some(issue) = tracker.borrow_mut().on_invoke(id, clock::unix_ms())
            {
                outbox.borrow_mut().push(issue);
            }
            callback();
        })
    }
}
