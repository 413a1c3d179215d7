// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Downstream emission.
//!
//! Every node and trigger controller owns one [`EmitGate`]. The gate holds
//! the downstream target registered during stream wiring and serializes
//! calls into it: however many units a controller runs, only one of them is
//! inside the downstream call at a time.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::engine::counters::Counter;
use crate::engine::event::{Continuation, Event, Payload};
use crate::errors::NodeError;
use crate::observability::messages::node::EmitTargetMissing;
use crate::observability::messages::StructuredLog;

/// Downstream callback: the next controller's `input`, or a stream output.
pub type Emit = Arc<dyn Fn(Event) + Send + Sync>;

pub struct EmitGate {
    node: String,
    /// `Some(None)` marks the tail of a stream.
    target: OnceLock<Option<Emit>>,
    lock: Mutex<()>,
    emitted: Counter,
    sequence: Counter,
}

impl EmitGate {
    pub fn new(node: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            node: node.into(),
            target: OnceLock::new(),
            lock: Mutex::new(()),
            emitted: Counter::new(),
            sequence: Counter::new(),
        })
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    /// Set the downstream target. `None` makes this the last stage.
    pub fn register(&self, target: Option<Emit>) -> Result<(), NodeError> {
        self.target
            .set(target)
            .map_err(|_| NodeError::EmitAlreadyRegistered(self.node.clone()))
    }

    pub fn is_registered(&self) -> bool {
        self.target.get().is_some()
    }

    /// Hand `event` downstream. At the tail of a stream the event is
    /// reported complete instead.
    pub fn emit(&self, event: Event) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.target.get() {
            Some(Some(target)) => {
                self.emitted.incr();
                target(event);
            }
            Some(None) => {
                self.emitted.incr();
                event.complete();
            }
            None => {
                EmitTargetMissing { node: &self.node }.log();
                event.fail(&NodeError::EmitNotRegistered(self.node.clone()));
            }
        }
    }

    pub fn emitted(&self) -> u64 {
        self.emitted.get()
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.incr()
    }
}

/// The handle a plugin uses to produce events.
#[derive(Clone)]
pub struct Emitter {
    gate: Arc<EmitGate>,
}

impl Emitter {
    pub fn new(gate: Arc<EmitGate>) -> Self {
        Self { gate }
    }

    /// Emit a fresh event carrying `payload`.
    pub fn emit(&self, payload: Payload) {
        let event = Event::new(payload).with_correlation(self.gate.next_sequence());
        self.gate.emit(event);
    }

    /// Emit a fresh event whose fate is reported to `continuation`.
    pub fn emit_with(&self, payload: Payload, continuation: Arc<dyn Continuation>) {
        let event = Event::new(payload)
            .with_correlation(self.gate.next_sequence())
            .with_continuation(continuation);
        self.gate.emit(event);
    }

    /// Forward an existing event, keeping its correlation and continuation.
    pub fn forward(&self, event: Event) {
        self.gate.emit(event);
    }

    pub fn node(&self) -> &str {
        self.gate.node()
    }
}
