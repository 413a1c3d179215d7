// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The pipeline engine.
//!
//! Bottom-up: an [`Event`] travels through [`NodeController`]s, each of
//! which filters it and hands it to one of its [`ExecutionUnit`]s. A
//! [`TriggerController`] runs the sources feeding the head of a
//! [`Stream`], and the [`StreamController`] supervises named streams and
//! fires heartbeats with their aggregated counters.

pub mod counters;
pub mod emit;
pub mod event;
pub mod execution_unit;
pub mod filter;
pub mod heartbeat;
pub mod node_controller;
pub mod stream;
pub mod stream_controller;
pub mod trigger_controller;

#[cfg(test)]
mod integration_tests;

pub use counters::{NodeStats, RuntimeTable, StreamRuntimeInfo, TriggerStats, UnitStats};
pub use emit::{Emit, EmitGate, Emitter};
pub use event::{Continuation, Event, Payload};
pub use execution_unit::{ExecutionUnit, InlineUnit, ThreadedUnit};
pub use filter::{Filter, FilterVerdict};
pub use heartbeat::{HeartBeatContext, HeartBeatTimer};
pub use node_controller::{Dispatch, NodeController, NodeSettings};
pub use stream::{qualified_name, Stream};
pub use stream_controller::{Shutdown, StreamController};
pub use trigger_controller::TriggerController;
