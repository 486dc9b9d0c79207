/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Reducer-driven in-memory store.
//!
//! The reference `StoreHandle` implementation: a single state value, a
//! reducer folding dispatched actions into it, change observers, and the
//! optional one-shot transform hook the override mechanism rides on.
//! Used by the test suites and as a template for real host adapters.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::store::{StateTransform, StoreError, StoreHandle};

pub type Reducer = Box<dyn Fn(&Value, &Value) -> Value>;

#[derive(Clone)]
pub struct MemoryStore {
    state: Rc<RefCell<Value>>,
    reducer: Rc<Reducer>,
    observers: Rc<RefCell<Vec<Box<dyn Fn()>>>>,
    pending_transform: Rc<RefCell<Option<StateTransform>>>,
}

impl MemoryStore {
    /// Store whose reducer keeps state unchanged for every action.
    pub fn new(initial: Value) -> Self {
        Self::with_reducer(initial, Box::new(|state, _| state.clone()))
    }

    pub fn with_reducer(initial: Value, reducer: Reducer) -> Self {
        Self {
            state: Rc::new(RefCell::new(initial)),
            reducer: Rc::new(reducer),
            observers: Rc::new(RefCell::new(Vec::new())),
            pending_transform: Rc::new(RefCell::new(None)),
        }
    }

    pub fn state(&self) -> Value {
        self.state.borrow().clone()
    }
}

impl StoreHandle for MemoryStore {
    fn read_state(&self) -> Result<Value, StoreError> {
        Ok(self.state.borrow().clone())
    }

    fn dispatch(&self, action: Value) -> Result<(), StoreError> {
        let next = {
            let current = self.state.borrow();
            (self.reducer)(&current, &action)
        };
        let next = match self.pending_transform.borrow_mut().take() {
            Some(transform) => transform(next),
            None => next,
        };
        *self.state.borrow_mut() = next;
        for observer in self.observers.borrow().iter() {
            observer();
        }
        Ok(())
    }

    fn subscribe(&self, observer: Box<dyn Fn()>) -> Result<(), StoreError> {
        self.observers.borrow_mut().push(observer);
        Ok(())
    }

    fn install_transform(&self, transform: StateTransform) -> Result<(), StoreError> {
        *self.pending_transform.borrow_mut() = Some(transform);
        Ok(())
    }
}
