// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Trigger controllers run [`Source`] instances, one thread per unit.
//!
//! All units of a trigger share one emit gate, so only one of them hands an
//! event downstream at a time and correlation ids are unique per trigger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};

use crate::engine::counters::TriggerStats;
use crate::engine::emit::{Emit, EmitGate, Emitter};
use crate::engine::execution_unit::panic_message;
use crate::errors::NodeError;
use crate::observability::messages::node::{
    SourceFailed, TriggerStarted, TriggerStopped, UnitWorkerLost,
};
use crate::observability::messages::StructuredLog;
use crate::traits::Source;

/// Where a unit's worker stands relative to `Source::start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Launch {
    Pending,
    Started,
    /// `start` gave up waiting; the worker must not run the source.
    Dismissed,
}

struct TriggerUnit {
    name: String,
    source: Arc<dyn Source>,
    running: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TriggerUnit {
    fn start(&self, init_timeout: Duration) -> Result<(), NodeError> {
        let (ready_tx, ready_rx) = bounded::<Result<(), NodeError>>(1);
        let launch = Arc::new(Mutex::new(Launch::Pending));
        let source = Arc::clone(&self.source);
        let name = self.name.clone();
        let worker_launch = Arc::clone(&launch);

        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let ready = source.initialize().map_err(|e| NodeError::InitFailed {
                    unit: name.clone(),
                    reason: e.to_string(),
                });
                let initialized = ready.is_ok();
                let delivered = ready_tx.send(ready).is_ok();
                if !initialized {
                    return;
                }
                {
                    let mut launch = worker_launch.lock().unwrap_or_else(PoisonError::into_inner);
                    if !delivered || *launch == Launch::Dismissed {
                        *launch = Launch::Dismissed;
                        drop(launch);
                        source.finish();
                        return;
                    }
                    *launch = Launch::Started;
                }
                if let Err(error) = source.start() {
                    SourceFailed {
                        unit: &name,
                        error: &error,
                    }
                    .log();
                }
                source.finish();
            })
            .map_err(|e| NodeError::Spawn {
                unit: self.name.clone(),
                reason: e.to_string(),
            })?;

        match ready_rx.recv_timeout(init_timeout) {
            Ok(Ok(())) => {
                self.running.store(true, Ordering::Release);
                *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                let previous = std::mem::replace(
                    &mut *launch.lock().unwrap_or_else(PoisonError::into_inner),
                    Launch::Dismissed,
                );
                if previous == Launch::Started {
                    // initialize finished right after the deadline
                    self.source.stop();
                    self.join(handle);
                }
                // otherwise the worker finishes the source and exits once
                // initialize returns
                Err(NodeError::InitTimeout {
                    unit: self.name.clone(),
                    timeout: init_timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(NodeError::InitFailed {
                unit: self.name.clone(),
                reason: "source thread exited before reporting readiness".to_string(),
            }),
        }
    }

    fn join(&self, handle: JoinHandle<()>) {
        if let Err(panic) = handle.join() {
            UnitWorkerLost {
                unit: &self.name,
                reason: &panic_message(panic.as_ref()),
            }
            .log();
        }
    }

    fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.source.stop();
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            self.join(handle);
        }
    }
}

pub struct TriggerController {
    name: String,
    init_timeout: Duration,
    units: Vec<TriggerUnit>,
    gate: Arc<EmitGate>,
}

impl TriggerController {
    /// Build `pool_size` units, each with a source from `make`.
    pub fn new<F>(
        name: &str,
        pool_size: usize,
        init_timeout: Duration,
        mut make: F,
    ) -> Result<Self, NodeError>
    where
        F: FnMut(Emitter) -> Result<Box<dyn Source>, NodeError>,
    {
        let gate = EmitGate::new(name);
        let units = (1..=pool_size.max(1))
            .map(|i| {
                Ok(TriggerUnit {
                    name: format!("{}-unit{}", name, i),
                    source: Arc::from(make(Emitter::new(Arc::clone(&gate)))?),
                    running: AtomicBool::new(false),
                    worker: Mutex::new(None),
                })
            })
            .collect::<Result<Vec<_>, NodeError>>()?;

        Ok(Self {
            name: name.to_string(),
            init_timeout,
            units,
            gate,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn register_emit(&self, target: Option<Emit>) -> Result<(), NodeError> {
        self.gate.register(target)
    }

    pub fn start(&self) -> Result<(), NodeError> {
        if !self.gate.is_registered() {
            return Err(NodeError::EmitNotRegistered(self.name.clone()));
        }
        for (i, unit) in self.units.iter().enumerate() {
            if let Err(e) = unit.start(self.init_timeout) {
                for started in &self.units[..i] {
                    started.stop();
                }
                return Err(e);
            }
        }
        TriggerStarted {
            trigger: &self.name,
            units: self.units.len(),
        }
        .log();
        Ok(())
    }

    /// Ask every source to stop and join its thread.
    pub fn stop(&self) {
        for unit in &self.units {
            unit.stop();
        }
        TriggerStopped {
            trigger: &self.name,
            emitted: self.gate.emitted(),
        }
        .log();
    }

    pub fn runtime_info(&self) -> TriggerStats {
        TriggerStats {
            emitted: self.gate.emitted(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::{SlowInitSource, VectorTrigger};
    use crate::engine::event::Event;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_units_share_one_gate() {
        let trigger = TriggerController::new("s.vec", 3, Duration::from_secs(2), |emitter| {
            Ok(Box::new(VectorTrigger::new(emitter, vec![json!(1), json!(2)])) as Box<dyn Source>)
        })
        .unwrap();
        let seen = Arc::new(Mutex::new(Vec::<Event>::new()));
        let sink = seen.clone();
        trigger
            .register_emit(Some(Arc::new(move |e| sink.lock().unwrap().push(e))))
            .unwrap();

        trigger.start().unwrap();
        trigger.stop();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 6);
        let ids: HashSet<u64> = seen.iter().map(|e| e.correlation).collect();
        assert_eq!(ids.len(), 6);
        assert_eq!(trigger.runtime_info(), TriggerStats { emitted: 6 });
    }

    #[test]
    fn test_start_requires_emit_target() {
        let trigger = TriggerController::new("s.vec", 1, Duration::from_secs(1), |emitter| {
            Ok(Box::new(VectorTrigger::new(emitter, vec![])) as Box<dyn Source>)
        })
        .unwrap();
        assert!(matches!(
            trigger.start(),
            Err(NodeError::EmitNotRegistered(_))
        ));
    }

    #[test]
    fn test_init_timeout_never_runs_source() {
        let entered = Arc::new(AtomicBool::new(false));
        let flag = entered.clone();
        let trigger = TriggerController::new("s.slow", 1, Duration::from_millis(20), |emitter| {
            Ok(Box::new(SlowInitSource::new(emitter, Duration::from_millis(150), flag.clone()))
                as Box<dyn Source>)
        })
        .unwrap();
        trigger.register_emit(Some(Arc::new(|_| {}))).unwrap();

        assert!(matches!(
            trigger.start(),
            Err(NodeError::InitTimeout { .. })
        ));
        // let initialize complete well past the deadline
        thread::sleep(Duration::from_millis(300));
        trigger.stop();

        assert!(!entered.load(Ordering::SeqCst));
        assert_eq!(trigger.runtime_info(), TriggerStats { emitted: 0 });
    }
}
