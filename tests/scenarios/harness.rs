/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Shared doubles for the scenario suites.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use renderscope::pipeline::{Transport, TransportError};
use renderscope::protocol::Envelope;
use renderscope::store::SharedStore;
use renderscope::store::discovery::GlobalScope;

/// Transport double capturing every delivered envelope.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub delivered: Rc<RefCell<Vec<Envelope>>>,
}

impl RecordingTransport {
    pub fn envelope_types(&self) -> Vec<String> {
        self.delivered
            .borrow()
            .iter()
            .map(|envelope| envelope.message_type.clone())
            .collect()
    }

    pub fn count_of(&self, message_type: &str) -> usize {
        self.delivered
            .borrow()
            .iter()
            .filter(|envelope| envelope.message_type == message_type)
            .count()
    }

    /// Entry types inside every delivered `TIMELINE_EVENTS` batch, with
    /// the issue kind appended for `issue` entries.
    pub fn timeline_entry_tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        for envelope in self.delivered.borrow().iter() {
            if envelope.message_type != "TIMELINE_EVENTS" {
                continue;
            }
            let Some(events) = envelope
                .payload
                .as_ref()
                .and_then(|payload| payload["events"].as_array())
            else {
                continue;
            };
            for event in events {
                let entry_type = event["type"].as_str().unwrap_or("?");
                match event["payload"]["type"].as_str() {
                    Some(detail) => tags.push(format!("{entry_type}:{detail}")),
                    None => tags.push(entry_type.to_string()),
                }
            }
        }
        tags
    }
}

impl Transport for RecordingTransport {
    fn deliver(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
        self.delivered.borrow_mut().push(envelope.clone());
        Ok(())
    }
}

/// Global-namespace double with plain name→store entries.
#[derive(Clone, Default)]
pub struct FakeScope {
    globals: Rc<RefCell<HashMap<String, SharedStore>>>,
}

impl FakeScope {
    pub fn insert(&self, name: &str, store: SharedStore) {
        self.globals.borrow_mut().insert(name.to_string(), store);
    }
}

impl GlobalScope for FakeScope {
    fn lookup(&self, name: &str) -> Option<SharedStore> {
        self.globals.borrow().get(name).cloned()
    }

    fn property_names(&self) -> Vec<String> {
        self.globals.borrow().keys().cloned().collect()
    }

    fn devtools_stores(&self) -> Vec<SharedStore> {
        Vec::new()
    }
}
