// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Test-only plugins with predictable behaviour.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::{Emitter, Payload};
use crate::errors::NodeError;
use crate::traits::{Outcome, Processor, Source};

/// Passes every event through unchanged, counting calls.
#[derive(Default)]
pub struct CountingTransform {
    calls: Arc<AtomicU64>,
}

impl CountingTransform {
    pub fn with_counter(calls: Arc<AtomicU64>) -> Self {
        Self { calls }
    }
}

impl Processor for CountingTransform {
    fn process(&mut self, _payload: &Payload) -> Result<Outcome, NodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Outcome::Continue)
    }
}

/// Sleeps before passing the event through.
pub struct SlowTransform {
    delay: Duration,
}

impl SlowTransform {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Processor for SlowTransform {
    fn process(&mut self, _payload: &Payload) -> Result<Outcome, NodeError> {
        std::thread::sleep(self.delay);
        Ok(Outcome::Continue)
    }
}

/// Fails every `n`th call.
pub struct FailingTransform {
    every: u64,
    calls: u64,
}

impl FailingTransform {
    pub fn every(n: u64) -> Self {
        Self { every: n, calls: 0 }
    }
}

impl Processor for FailingTransform {
    fn process(&mut self, _payload: &Payload) -> Result<Outcome, NodeError> {
        self.calls += 1;
        if self.calls % self.every == 0 {
            return Err(NodeError::processing(format!("call {} failed", self.calls)));
        }
        Ok(Outcome::Continue)
    }
}

/// Panics every `n`th call.
pub struct PanickingTransform {
    every: u64,
    calls: u64,
}

impl PanickingTransform {
    pub fn every(n: u64) -> Self {
        Self { every: n, calls: 0 }
    }
}

impl Processor for PanickingTransform {
    fn process(&mut self, _payload: &Payload) -> Result<Outcome, NodeError> {
        self.calls += 1;
        if self.calls % self.every == 0 {
            panic!("call {} panicked", self.calls);
        }
        Ok(Outcome::Continue)
    }
}

/// Takes `delay` to initialize.
pub struct SlowInitProcessor {
    delay: Duration,
}

impl SlowInitProcessor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Processor for SlowInitProcessor {
    fn initialize(&mut self) -> Result<(), NodeError> {
        std::thread::sleep(self.delay);
        Ok(())
    }

    fn process(&mut self, _payload: &Payload) -> Result<Outcome, NodeError> {
        Ok(Outcome::Continue)
    }
}

/// Sink that stores every payload it sees.
pub struct CollectingSink {
    store: Arc<Mutex<Vec<Payload>>>,
}

impl CollectingSink {
    pub fn new(store: Arc<Mutex<Vec<Payload>>>) -> Self {
        Self { store }
    }
}

impl Processor for CollectingSink {
    fn process(&mut self, payload: &Payload) -> Result<Outcome, NodeError> {
        self.store.lock().unwrap().push(payload.clone());
        Ok(Outcome::Continue)
    }
}

/// Emits a fixed list of payloads, then returns.
pub struct VectorTrigger {
    emitter: Emitter,
    payloads: Vec<Payload>,
}

impl VectorTrigger {
    pub fn new(emitter: Emitter, payloads: Vec<Payload>) -> Self {
        Self { emitter, payloads }
    }
}

impl Source for VectorTrigger {
    fn start(&self) -> Result<(), NodeError> {
        for payload in &self.payloads {
            self.emitter.emit(payload.clone());
        }
        Ok(())
    }
}

/// Takes `delay` to initialize, then emits until stopped.
pub struct SlowInitSource {
    emitter: Emitter,
    delay: Duration,
    entered: Arc<AtomicBool>,
    stopped: AtomicBool,
}

impl SlowInitSource {
    /// `entered` is set once `start` runs.
    pub fn new(emitter: Emitter, delay: Duration, entered: Arc<AtomicBool>) -> Self {
        Self {
            emitter,
            delay,
            entered,
            stopped: AtomicBool::new(false),
        }
    }
}

impl Source for SlowInitSource {
    fn initialize(&self) -> Result<(), NodeError> {
        std::thread::sleep(self.delay);
        Ok(())
    }

    fn start(&self) -> Result<(), NodeError> {
        self.entered.store(true, Ordering::SeqCst);
        let mut n = 0u64;
        while !self.stopped.load(Ordering::SeqCst) {
            self.emitter.emit(serde_json::json!(n));
            n += 1;
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Appends `initialize:<label>` and `finish:<label>` to a shared journal.
pub struct JournalingProcessor {
    label: String,
    journal: Arc<Mutex<Vec<String>>>,
}

impl JournalingProcessor {
    pub fn new(label: &str, journal: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label: label.to_string(),
            journal,
        }
    }
}

impl Processor for JournalingProcessor {
    fn initialize(&mut self) -> Result<(), NodeError> {
        self.journal.lock().unwrap().push(format!("initialize:{}", self.label));
        Ok(())
    }

    fn process(&mut self, _payload: &Payload) -> Result<Outcome, NodeError> {
        Ok(Outcome::Continue)
    }

    fn finish(&mut self) {
        self.journal.lock().unwrap().push(format!("finish:{}", self.label));
    }
}

/// Source counterpart of [`JournalingProcessor`], journaling `initialize`
/// and `stop`. Emits nothing.
pub struct JournalingSource {
    label: String,
    journal: Arc<Mutex<Vec<String>>>,
}

impl JournalingSource {
    pub fn new(label: &str, journal: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label: label.to_string(),
            journal,
        }
    }
}

impl Source for JournalingSource {
    fn initialize(&self) -> Result<(), NodeError> {
        self.journal.lock().unwrap().push(format!("initialize:{}", self.label));
        Ok(())
    }

    fn start(&self) -> Result<(), NodeError> {
        Ok(())
    }

    fn stop(&self) {
        self.journal.lock().unwrap().push(format!("stop:{}", self.label));
    }
}
