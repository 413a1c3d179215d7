// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Execution units: where a processor instance actually runs.
//!
//! A node controller owns one or more units, each with a private processor
//! instance:
//!
//! * [`InlineUnit`] - runs `process` on whichever thread delivered the event
//! * [`ThreadedUnit`] - owns an unbounded queue and a dedicated worker thread
//!
//! # Worker loop
//!
//! ```text
//! initialize() ──ready──► recv_timeout(poll) ─┬─ event ──► process ──► forward
//!                              ▲              ├─ timeout ─► dismissed? ──► finish()
//!                              └──────────────┘  disconnected ──────────► finish()
//! ```
//!
//! Failures and panics inside `process` are reported on the event and
//! counted; the worker keeps serving its queue.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, RecvTimeoutError, Sender};

use crate::engine::counters::{Counter, UnitStats};
use crate::engine::emit::EmitGate;
use crate::engine::event::Event;
use crate::errors::NodeError;
use crate::observability::messages::node::{
    ProcessingFailed, UnitDraining, UnitStarted, UnitStopped, UnitWorkerLost,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{NodeKind, Outcome, Processor};

/// Sleep between in-flight checks while draining.
const DRAIN_POLL: Duration = Duration::from_millis(10);

pub trait ExecutionUnit: Send + Sync {
    fn name(&self) -> &str;

    /// Block until the processor is initialized.
    fn start(&self) -> Result<(), NodeError>;

    fn submit(&self, event: Event) -> Result<(), NodeError>;

    /// Drain, then finish the processor. Does not return while events are in
    /// flight.
    fn stop(&self);

    fn stats(&self) -> UnitStats;
}

/// Routes processing outcomes of one node.
pub struct Dispatcher {
    kind: NodeKind,
    gate: Arc<EmitGate>,
    failed: Arc<Counter>,
}

impl Dispatcher {
    pub fn new(kind: NodeKind, gate: Arc<EmitGate>, failed: Arc<Counter>) -> Arc<Self> {
        Arc::new(Self { kind, gate, failed })
    }

    fn run(&self, unit: &str, processor: &mut dyn Processor, event: Event) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| processor.process(&event.payload)));
        match (outcome, self.kind) {
            (Ok(Ok(Outcome::Continue)), NodeKind::Transform) => self.gate.emit(event),
            (Ok(Ok(Outcome::Update(payload))), NodeKind::Transform) => {
                self.gate.emit(event.with_payload(payload))
            }
            (Ok(Ok(Outcome::Stop(reason))), NodeKind::Transform) => event.stop(&reason),
            // the controller already forwarded the sink's input
            (Ok(Ok(_)), NodeKind::Sink) => {}
            (Ok(Err(error)), _) => self.fail(unit, event, error),
            (Err(panic), _) => self.fail(
                unit,
                event,
                NodeError::Panicked {
                    unit: unit.to_string(),
                    message: panic_message(panic.as_ref()),
                },
            ),
        }
    }

    fn fail(&self, unit: &str, event: Event, error: NodeError) {
        self.failed.incr();
        ProcessingFailed {
            unit,
            correlation: event.correlation,
            error: &error,
        }
        .log();
        event.fail(&error);
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn initialize(unit: &str, processor: &mut dyn Processor) -> Result<(), NodeError> {
    let init_failed = |reason: String| NodeError::InitFailed {
        unit: unit.to_string(),
        reason,
    };
    match panic::catch_unwind(AssertUnwindSafe(|| processor.initialize())) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(init_failed(e.to_string())),
        Err(panic) => Err(init_failed(panic_message(panic.as_ref()))),
    }
}

fn finish(unit: &str, processor: &mut dyn Processor) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| processor.finish())) {
        UnitWorkerLost {
            unit,
            reason: &panic_message(panic.as_ref()),
        }
        .log();
    }
}

#[derive(Default)]
struct UnitCounters {
    received: Counter,
    finished: Counter,
}

impl UnitCounters {
    fn snapshot(&self) -> UnitStats {
        // finished first so a concurrent completion never shows as negative
        let finished = self.finished.get();
        UnitStats {
            received: self.received.get(),
            finished,
        }
    }
}

/// Runs the processor synchronously on the caller's thread.
pub struct InlineUnit {
    name: String,
    processor: Mutex<Box<dyn Processor>>,
    dispatcher: Arc<Dispatcher>,
    running: AtomicBool,
    counters: UnitCounters,
}

impl InlineUnit {
    pub fn new(name: String, processor: Box<dyn Processor>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            name,
            processor: Mutex::new(processor),
            dispatcher,
            running: AtomicBool::new(false),
            counters: UnitCounters::default(),
        }
    }
}

impl ExecutionUnit for InlineUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<(), NodeError> {
        let mut processor = self.processor.lock().unwrap_or_else(PoisonError::into_inner);
        initialize(&self.name, processor.as_mut())?;
        self.running.store(true, Ordering::Release);
        UnitStarted {
            unit: &self.name,
            mode: "single",
        }
        .log();
        Ok(())
    }

    fn submit(&self, event: Event) -> Result<(), NodeError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(NodeError::PoolNotReady(self.name.clone()));
        }
        self.counters.received.incr();
        let mut processor = self.processor.lock().unwrap_or_else(PoisonError::into_inner);
        self.dispatcher.run(&self.name, processor.as_mut(), event);
        self.counters.finished.incr();
        Ok(())
    }

    fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        // taking the lock waits out a concurrent submit
        let mut processor = self.processor.lock().unwrap_or_else(PoisonError::into_inner);
        finish(&self.name, processor.as_mut());
        UnitStopped {
            unit: &self.name,
            processed: self.counters.finished.get(),
        }
        .log();
    }

    fn stats(&self) -> UnitStats {
        self.counters.snapshot()
    }
}

/// Timing knobs of a [`ThreadedUnit`].
#[derive(Debug, Clone, Copy)]
pub struct ThreadedSettings {
    /// How long the worker blocks on its queue per poll.
    pub poll: Duration,
    /// How long `start` waits for `initialize` to return.
    pub init_timeout: Duration,
}

/// Runs the processor on a dedicated worker thread fed by a private queue.
pub struct ThreadedUnit {
    name: String,
    settings: ThreadedSettings,
    processor: Mutex<Option<Box<dyn Processor>>>,
    dispatcher: Arc<Dispatcher>,
    sender: RwLock<Option<Sender<Event>>>,
    dismissed: Arc<AtomicBool>,
    counters: Arc<UnitCounters>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadedUnit {
    pub fn new(
        name: String,
        processor: Box<dyn Processor>,
        dispatcher: Arc<Dispatcher>,
        settings: ThreadedSettings,
    ) -> Self {
        Self {
            name,
            settings,
            processor: Mutex::new(Some(processor)),
            dispatcher,
            sender: RwLock::new(None),
            dismissed: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(UnitCounters::default()),
            worker: Mutex::new(None),
        }
    }

    fn worker_finished(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
    }
}

impl ExecutionUnit for ThreadedUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<(), NodeError> {
        let mut processor = self
            .processor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| NodeError::PoolNotReady(self.name.clone()))?;

        let (tx, rx) = unbounded::<Event>();
        let (ready_tx, ready_rx) = bounded::<Result<(), NodeError>>(1);
        let name = self.name.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        let dismissed = Arc::clone(&self.dismissed);
        let counters = Arc::clone(&self.counters);
        let poll = self.settings.poll;

        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let ready = initialize(&name, processor.as_mut());
                let initialized = ready.is_ok();
                let _ = ready_tx.send(ready);
                if !initialized {
                    return;
                }
                loop {
                    match rx.recv_timeout(poll) {
                        Ok(event) => {
                            dispatcher.run(&name, processor.as_mut(), event);
                            counters.finished.incr();
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            if dismissed.load(Ordering::Acquire) {
                                break;
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                finish(&name, processor.as_mut());
            })
            .map_err(|e| NodeError::Spawn {
                unit: self.name.clone(),
                reason: e.to_string(),
            })?;

        match ready_rx.recv_timeout(self.settings.init_timeout) {
            Ok(Ok(())) => {
                *self.sender.write().unwrap_or_else(PoisonError::into_inner) = Some(tx);
                *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                UnitStarted {
                    unit: &self.name,
                    mode: "thread",
                }
                .log();
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                // the worker exits by itself once initialize returns
                self.dismissed.store(true, Ordering::Release);
                Err(NodeError::InitTimeout {
                    unit: self.name.clone(),
                    timeout: self.settings.init_timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(NodeError::InitFailed {
                unit: self.name.clone(),
                reason: "worker exited before reporting readiness".to_string(),
            }),
        }
    }

    fn submit(&self, event: Event) -> Result<(), NodeError> {
        let sender = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let tx = sender
            .as_ref()
            .ok_or_else(|| NodeError::PoolNotReady(self.name.clone()))?;
        self.counters.received.incr();
        tx.send(event).map_err(|_| {
            self.counters.finished.incr();
            NodeError::PoolNotReady(self.name.clone())
        })
    }

    fn stop(&self) {
        if self
            .sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
        {
            return;
        }

        let mut reported = 0;
        loop {
            let in_flight = self.counters.snapshot().in_flight();
            if in_flight == 0 {
                break;
            }
            if self.worker_finished() {
                UnitWorkerLost {
                    unit: &self.name,
                    reason: "worker exited with events in flight",
                }
                .log();
                break;
            }
            if in_flight != reported {
                UnitDraining {
                    unit: &self.name,
                    in_flight,
                }
                .log();
                reported = in_flight;
            }
            thread::sleep(DRAIN_POLL);
        }

        self.dismissed.store(true, Ordering::Release);
        self.sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if let Err(panic) = handle.join() {
                UnitWorkerLost {
                    unit: &self.name,
                    reason: &panic_message(panic.as_ref()),
                }
                .log();
            }
        }
        UnitStopped {
            unit: &self.name,
            processed: self.counters.finished.get(),
        }
        .log();
    }

    fn stats(&self) -> UnitStats {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::{
        CountingTransform, FailingTransform, PanickingTransform, SlowInitProcessor, SlowTransform,
    };
    use crate::engine::emit::Emit;
    use serde_json::json;
    use std::sync::atomic::AtomicU64;

    fn collecting_gate() -> (Arc<EmitGate>, Arc<Mutex<Vec<Event>>>) {
        let gate = EmitGate::new("test.node");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let emit: Emit = Arc::new(move |e| sink.lock().unwrap().push(e));
        gate.register(Some(emit)).unwrap();
        (gate, seen)
    }

    fn settings() -> ThreadedSettings {
        ThreadedSettings {
            poll: Duration::from_millis(20),
            init_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_inline_unit_runs_on_caller_thread() {
        let (gate, seen) = collecting_gate();
        let failed = Arc::new(Counter::new());
        let unit = InlineUnit::new(
            "test.node-unit1[single]".into(),
            Box::new(CountingTransform::default()),
            Dispatcher::new(NodeKind::Transform, gate, failed),
        );
        assert!(matches!(
            unit.submit(Event::new(json!(1))),
            Err(NodeError::PoolNotReady(_))
        ));

        unit.start().unwrap();
        for i in 0..3 {
            unit.submit(Event::new(json!(i))).unwrap();
        }
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(
            unit.stats(),
            UnitStats {
                received: 3,
                finished: 3
            }
        );
        unit.stop();
    }

    #[test]
    fn test_threaded_unit_drains_before_stop_returns() {
        let (gate, seen) = collecting_gate();
        let unit = ThreadedUnit::new(
            "test.node-unit1[thread]".into(),
            Box::new(SlowTransform::new(Duration::from_millis(5))),
            Dispatcher::new(NodeKind::Transform, gate, Arc::new(Counter::new())),
            settings(),
        );
        unit.start().unwrap();
        for i in 0..20 {
            unit.submit(Event::new(json!(i))).unwrap();
        }
        unit.stop();

        assert_eq!(seen.lock().unwrap().len(), 20);
        assert_eq!(unit.stats().in_flight(), 0);
        assert!(matches!(
            unit.submit(Event::new(json!("late"))),
            Err(NodeError::PoolNotReady(_))
        ));
    }

    #[test]
    fn test_threaded_unit_preserves_order() {
        let (gate, seen) = collecting_gate();
        let unit = ThreadedUnit::new(
            "test.node-unit1[thread]".into(),
            Box::new(CountingTransform::default()),
            Dispatcher::new(NodeKind::Transform, gate, Arc::new(Counter::new())),
            settings(),
        );
        unit.start().unwrap();
        for i in 0..50 {
            unit.submit(Event::new(json!(i))).unwrap();
        }
        unit.stop();

        let order: Vec<_> = seen.lock().unwrap().iter().map(|e| e.payload.clone()).collect();
        assert_eq!(order, (0..50).map(|i| json!(i)).collect::<Vec<_>>());
    }

    #[test]
    fn test_worker_survives_failures_and_panics() {
        let (gate, seen) = collecting_gate();
        let failed = Arc::new(Counter::new());
        for processor in [
            Box::new(FailingTransform::every(2)) as Box<dyn Processor>,
            Box::new(PanickingTransform::every(2)),
        ] {
            let unit = ThreadedUnit::new(
                "test.node-unit1[thread]".into(),
                processor,
                Dispatcher::new(NodeKind::Transform, gate.clone(), failed.clone()),
                settings(),
            );
            unit.start().unwrap();
            for i in 0..6 {
                unit.submit(Event::new(json!(i))).unwrap();
            }
            unit.stop();
            assert_eq!(unit.stats().finished, 6);
        }
        assert_eq!(failed.get(), 6);
        assert_eq!(seen.lock().unwrap().len(), 6);
    }

    #[test]
    fn test_init_timeout() {
        let (gate, _) = collecting_gate();
        let unit = ThreadedUnit::new(
            "test.slow-unit1[thread]".into(),
            Box::new(SlowInitProcessor::new(Duration::from_millis(300))),
            Dispatcher::new(NodeKind::Transform, gate, Arc::new(Counter::new())),
            ThreadedSettings {
                poll: Duration::from_millis(20),
                init_timeout: Duration::from_millis(20),
            },
        );
        assert!(matches!(unit.start(), Err(NodeError::InitTimeout { .. })));
    }

    #[test]
    fn test_sink_outcomes_are_not_forwarded() {
        let (gate, seen) = collecting_gate();
        let calls = Arc::new(AtomicU64::new(0));
        let unit = InlineUnit::new(
            "test.sink-unit1[single]".into(),
            Box::new(CountingTransform::with_counter(calls.clone())),
            Dispatcher::new(NodeKind::Sink, gate, Arc::new(Counter::new())),
        );
        unit.start().unwrap();
        unit.submit(Event::new(json!("x"))).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(seen.lock().unwrap().is_empty());
    }
}
