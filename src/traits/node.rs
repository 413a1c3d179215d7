// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Plugin contracts for the nodes of a stream.
//!
//! Lifecycle hooks (`initialize`, `finish`, `stop`) default to no-ops, so a
//! plugin implements only what it needs.

use crate::engine::event::Payload;
use crate::errors::NodeError;

/// What a processor decided about one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Forward the event unchanged.
    Continue,
    /// Forward the event with a replacement payload.
    Update(Payload),
    /// End the event's journey here.
    Stop(String),
}

/// Role of a processor inside a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Forwards per [`Outcome`].
    Transform,
    /// Consumes events; the controller forwards the original event itself.
    Sink,
}

/// A transform or sink. Each execution unit owns its own instance, so
/// `process` takes `&mut self`.
///
/// Returning `Err` (or panicking) reports the event as failed; the unit
/// keeps serving its queue either way.
pub trait Processor: Send {
    fn initialize(&mut self) -> Result<(), NodeError> {
        Ok(())
    }

    fn process(&mut self, payload: &Payload) -> Result<Outcome, NodeError>;

    fn finish(&mut self) {}
}

/// An event producer.
///
/// `start` runs on the unit's own thread and blocks until the source is
/// exhausted or `stop` is called from another thread.
pub trait Source: Send + Sync {
    fn initialize(&self) -> Result<(), NodeError> {
        Ok(())
    }

    fn start(&self) -> Result<(), NodeError>;

    fn stop(&self) {}

    fn finish(&self) {}
}
