// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Variable scopes for rule evaluation.
//!
//! An [`Environment`] is a stack of scopes whose bottom entry is the global
//! scope holding registered actions and constants. The global scope is shared
//! copy-on-write between environments, so every evaluation can own a private
//! environment without copying the action registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::rules::value::Value;

pub type Scope = HashMap<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct Environment {
    globals: Arc<Scope>,
    frames: Vec<Scope>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment whose global scope is `globals`.
    pub fn with_globals(globals: Arc<Scope>) -> Self {
        Self {
            globals,
            frames: Vec::new(),
        }
    }

    /// Number of scopes including the global one; never below 1.
    pub fn depth(&self) -> usize {
        self.frames.len() + 1
    }

    pub fn push(&mut self) {
        self.frames.push(Scope::new());
    }

    /// Pop the innermost scope. The global scope is never popped.
    pub fn pop(&mut self) -> Option<Scope> {
        self.frames.pop()
    }

    /// Bind `name` in the innermost scope. `Null` values are not stored.
    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        if value.is_null() {
            return;
        }
        match self.frames.last_mut() {
            Some(frame) => {
                frame.insert(name.into(), value);
            }
            None => self.set_global_var(name, value),
        }
    }

    pub fn set_global_var(&mut self, name: impl Into<String>, value: Value) {
        Arc::make_mut(&mut self.globals).insert(name.into(), value);
    }

    pub fn get_global_var(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn clear_global_var(&mut self, name: &str) -> Option<Value> {
        Arc::make_mut(&mut self.globals).remove(name)
    }

    pub fn globals(&self) -> &Arc<Scope> {
        &self.globals
    }

    /// Resolve a possibly dotted name (`a.b.c`).
    ///
    /// The first segment is looked up from the innermost scope outwards; each
    /// further segment indexes into a map. Any miss yields `None`.
    pub fn get_var(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let head = segments.next()?;
        let mut current = self.lookup(head)?;
        for key in segments {
            match current {
                Value::Map(map) => current = map.get(key)?,
                _ => return None,
            }
        }
        Some(current)
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.globals.get(name))
    }
}
