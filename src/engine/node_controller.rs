// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-node dispatch: filter, pool, emission.
//!
//! ```text
//! input(event) ──► filter ─┬─ CONTINUE ──────────────────────────► emit
//!                          ├─ DROP / filter error ──► dropped
//!                          └─ ACCEPT ──► unit[i++ % n].submit ──► process ──► emit
//!                                         (sinks also emit the original event)
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ExecutionMode, NodeTemplate};
use crate::engine::counters::{Counter, NodeStats};
use crate::engine::emit::{Emit, EmitGate, Emitter};
use crate::engine::event::Event;
use crate::engine::execution_unit::{
    Dispatcher, ExecutionUnit, InlineUnit, ThreadedSettings, ThreadedUnit,
};
use crate::engine::filter::{Filter, FilterVerdict};
use crate::errors::NodeError;
use crate::observability::messages::node::{
    EventDropped, FilterFailed, NodeStarted, NodeStopped, PoolSizeForced, SubmitRejected,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{NodeKind, Processor};

/// What `input` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Filter said CONTINUE; forwarded without processing.
    Bypassed,
    Dropped,
    Submitted,
    /// No unit accepted the event.
    Rejected,
}

/// How to build a node's execution units.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub kind: NodeKind,
    pub mode: ExecutionMode,
    pub pool_size: usize,
    pub poll_timeout: Duration,
    pub init_timeout: Duration,
    pub filter: Vec<String>,
}

impl NodeSettings {
    pub fn from_template(template: &NodeTemplate, kind: NodeKind, default_init: Duration) -> Self {
        Self {
            kind,
            mode: template.mode,
            pool_size: template.pool_size,
            poll_timeout: template.poll_timeout(),
            init_timeout: template
                .init_timeout
                .and_then(|s| Duration::try_from_secs_f64(s).ok())
                .unwrap_or(default_init),
            filter: template.filter.clone(),
        }
    }
}

pub struct NodeController {
    name: String,
    kind: NodeKind,
    filter: Option<Filter>,
    units: Vec<Box<dyn ExecutionUnit>>,
    next: AtomicUsize,
    gate: Arc<EmitGate>,
    received: Counter,
    dropped: Counter,
    failed: Arc<Counter>,
}

impl NodeController {
    /// Build a controller named `name` whose units each get a processor
    /// from `make`.
    pub fn new<F>(name: &str, settings: NodeSettings, mut make: F) -> Result<Self, NodeError>
    where
        F: FnMut(Emitter) -> Result<Box<dyn Processor>, NodeError>,
    {
        let pool_size = match settings.mode {
            ExecutionMode::Single => {
                if settings.pool_size != 1 {
                    PoolSizeForced {
                        node: name,
                        requested: settings.pool_size,
                    }
                    .log();
                }
                1
            }
            ExecutionMode::Thread => settings.pool_size.max(1),
            ExecutionMode::Process => {
                return Err(NodeError::UnsupportedMode {
                    node: name.to_string(),
                    mode: settings.mode.to_string(),
                })
            }
        };

        let filter = if settings.filter.is_empty() {
            None
        } else {
            Some(
                Filter::compile(&settings.filter).map_err(|source| NodeError::InvalidFilter {
                    node: name.to_string(),
                    source,
                })?,
            )
        };

        let gate = EmitGate::new(name);
        let failed = Arc::new(Counter::new());
        let dispatcher = Dispatcher::new(settings.kind, Arc::clone(&gate), Arc::clone(&failed));
        let threaded = ThreadedSettings {
            poll: settings.poll_timeout,
            init_timeout: settings.init_timeout,
        };

        let mut units: Vec<Box<dyn ExecutionUnit>> = Vec::with_capacity(pool_size);
        for i in 1..=pool_size {
            let unit_name = format!("{}-unit{}[{}]", name, i, settings.mode);
            let processor = make(Emitter::new(Arc::clone(&gate)))?;
            let unit: Box<dyn ExecutionUnit> = match settings.mode {
                ExecutionMode::Thread => Box::new(ThreadedUnit::new(
                    unit_name,
                    processor,
                    Arc::clone(&dispatcher),
                    threaded,
                )),
                _ => Box::new(InlineUnit::new(unit_name, processor, Arc::clone(&dispatcher))),
            };
            units.push(unit);
        }

        Ok(Self {
            name: name.to_string(),
            kind: settings.kind,
            filter,
            units,
            next: AtomicUsize::new(0),
            gate,
            received: Counter::new(),
            dropped: Counter::new(),
            failed,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Set where this node's output goes. `None` makes it the last stage.
    pub fn register_emit(&self, target: Option<Emit>) -> Result<(), NodeError> {
        self.gate.register(target)
    }

    /// Start every unit, blocking until each processor is initialized.
    ///
    /// If a unit fails to start, units already started are stopped again.
    pub fn start(&self) -> Result<(), NodeError> {
        if !self.gate.is_registered() {
            return Err(NodeError::EmitNotRegistered(self.name.clone()));
        }
        for (i, unit) in self.units.iter().enumerate() {
            if let Err(e) = unit.start() {
                for started in &self.units[..i] {
                    started.stop();
                }
                return Err(e);
            }
        }
        NodeStarted {
            node: &self.name,
            units: self.units.len(),
        }
        .log();
        Ok(())
    }

    /// Drain and stop every unit.
    pub fn stop(&self) {
        for unit in &self.units {
            unit.stop();
        }
        NodeStopped {
            node: &self.name,
            stats: &self.runtime_info(),
        }
        .log();
    }

    pub fn input(&self, mut event: Event) -> Dispatch {
        self.received.incr();
        event.hops += 1;

        let verdict = match &self.filter {
            None => FilterVerdict::Accept,
            Some(filter) => match filter.decide(&event.payload) {
                Ok(verdict) => verdict,
                Err(error) => {
                    FilterFailed {
                        node: &self.name,
                        correlation: event.correlation,
                        error: &error,
                    }
                    .log();
                    self.dropped.incr();
                    event.stop(&format!("filter of '{}' failed: {}", self.name, error));
                    return Dispatch::Dropped;
                }
            },
        };

        match verdict {
            FilterVerdict::Continue => {
                self.gate.emit(event);
                Dispatch::Bypassed
            }
            FilterVerdict::Drop => {
                self.dropped.incr();
                EventDropped {
                    node: &self.name,
                    correlation: event.correlation,
                }
                .log();
                event.stop(&format!("dropped by filter of '{}'", self.name));
                Dispatch::Dropped
            }
            FilterVerdict::Accept => self.submit(event),
        }
    }

    fn submit(&self, event: Event) -> Dispatch {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.units.len();
        let forward = (self.kind == NodeKind::Sink).then(|| event.clone());
        if let Err(error) = self.units[index].submit(event) {
            self.failed.incr();
            SubmitRejected {
                node: &self.name,
                error: &error,
            }
            .log();
            return Dispatch::Rejected;
        }
        if let Some(original) = forward {
            self.gate.emit(original);
        }
        Dispatch::Submitted
    }

    /// An emit target that feeds this controller.
    pub fn as_emit(self: &Arc<Self>) -> Emit {
        let node = Arc::clone(self);
        Arc::new(move |event| {
            node.input(event);
        })
    }

    pub fn runtime_info(&self) -> NodeStats {
        let units: BTreeMap<_, _> = self
            .units
            .iter()
            .map(|u| (u.name().to_string(), u.stats()))
            .collect();
        NodeStats {
            received: self.received.get(),
            emitted: self.gate.emitted(),
            dropped: self.dropped.get(),
            failed: self.failed.get(),
            units,
        }
    }
}
