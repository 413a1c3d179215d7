// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for events, execution units and the node and trigger
//! controllers that drive them.

use crate::engine::counters::NodeStats;
use crate::engine::event::Payload;
use crate::errors::NodeError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// An event reached the end of its stream.
///
/// # Log Level
/// `trace!` - One line per event
pub struct EventCompleted {
    pub correlation: u64,
    pub hops: u32,
}

impl Display for EventCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Event {} completed after {} hops",
            self.correlation, self.hops
        )
    }
}

impl StructuredLog for EventCompleted {
    fn log(&self) {
        tracing::trace!(correlation = self.correlation, hops = self.hops, "{}", self);
    }
}

/// An event was stopped before reaching the end of its stream.
///
/// # Log Level
/// `debug!` - Stopping is a normal outcome (filters, processors saying so)
pub struct EventStopped<'a> {
    pub correlation: u64,
    pub hops: u32,
    pub reason: &'a str,
}

impl Display for EventStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Event {} stopped after {} hops: {}",
            self.correlation, self.hops, self.reason
        )
    }
}

impl StructuredLog for EventStopped<'_> {
    fn log(&self) {
        tracing::debug!(
            correlation = self.correlation,
            hops = self.hops,
            reason = self.reason,
            "{}", self
        );
    }
}

/// An event failed.
///
/// # Log Level
/// `warn!` - The event is lost but the stream keeps running
pub struct EventFailed<'a> {
    pub correlation: u64,
    pub hops: u32,
    pub error: &'a NodeError,
}

impl Display for EventFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Event {} failed after {} hops: {}",
            self.correlation, self.hops, self.error
        )
    }
}

impl StructuredLog for EventFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            correlation = self.correlation,
            hops = self.hops,
            error = %self.error,
            "{}", self
        );
    }
}

/// A node emitted before its downstream target was wired.
///
/// # Log Level
/// `error!` - Indicates a wiring bug
pub struct EmitTargetMissing<'a> {
    pub node: &'a str,
}

impl Display for EmitTargetMissing<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' emitted with no registered target", self.node)
    }
}

impl StructuredLog for EmitTargetMissing<'_> {
    fn log(&self) {
        tracing::error!(node = self.node, "{}", self);
    }
}

/// A processor returned an error or panicked while handling an event.
///
/// # Log Level
/// `warn!` - Per-event failure, the unit keeps running
///
/// # Example
/// ```
/// use the_rivulet::errors::NodeError;
/// use the_rivulet::observability::messages::node::ProcessingFailed;
///
/// let error = NodeError::processing("bad payload");
/// let msg = ProcessingFailed {
///     unit: "ingest.upper-unit0[thread]",
///     correlation: 42,
///     error: &error,
/// };
///
/// assert!(msg.to_string().contains("bad payload"));
/// ```
pub struct ProcessingFailed<'a> {
    pub unit: &'a str,
    pub correlation: u64,
    pub error: &'a NodeError,
}

impl Display for ProcessingFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Unit '{}' failed on event {}: {}",
            self.unit, self.correlation, self.error
        )
    }
}

impl StructuredLog for ProcessingFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            unit = self.unit,
            correlation = self.correlation,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "processing",
            span_name = name,
            unit = self.unit,
            correlation = self.correlation,
        )
    }
}

/// A stopping unit is waiting for in-flight events.
///
/// # Log Level
/// `debug!` - Logged each time the in-flight count changes
pub struct UnitDraining<'a> {
    pub unit: &'a str,
    pub in_flight: u64,
}

impl Display for UnitDraining<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Unit '{}' draining, {} events in flight",
            self.unit, self.in_flight
        )
    }
}

impl StructuredLog for UnitDraining<'_> {
    fn log(&self) {
        tracing::debug!(unit = self.unit, in_flight = self.in_flight, "{}", self);
    }
}

/// # Log Level
/// `debug!` - Unit lifecycle
pub struct UnitStarted<'a> {
    pub unit: &'a str,
    pub mode: &'a str,
}

impl Display for UnitStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Unit '{}' started in {} mode", self.unit, self.mode)
    }
}

impl StructuredLog for UnitStarted<'_> {
    fn log(&self) {
        tracing::debug!(unit = self.unit, mode = self.mode, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("unit", span_name = name, unit = self.unit, mode = self.mode)
    }
}

/// # Log Level
/// `debug!` - Unit lifecycle
pub struct UnitStopped<'a> {
    pub unit: &'a str,
    pub processed: u64,
}

impl Display for UnitStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Unit '{}' stopped after processing {} events",
            self.unit, self.processed
        )
    }
}

impl StructuredLog for UnitStopped<'_> {
    fn log(&self) {
        tracing::debug!(unit = self.unit, processed = self.processed, "{}", self);
    }
}

/// A unit's worker ended abnormally.
///
/// # Log Level
/// `error!` - Events handed to the worker may be lost
pub struct UnitWorkerLost<'a> {
    pub unit: &'a str,
    pub reason: &'a str,
}

impl Display for UnitWorkerLost<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Worker of unit '{}' lost: {}", self.unit, self.reason)
    }
}

impl StructuredLog for UnitWorkerLost<'_> {
    fn log(&self) {
        tracing::error!(unit = self.unit, reason = self.reason, "{}", self);
    }
}

/// Single mode ignores a configured pool size above one.
///
/// # Log Level
/// `warn!` - Configuration is silently corrected
pub struct PoolSizeForced<'a> {
    pub node: &'a str,
    pub requested: usize,
}

impl Display for PoolSizeForced<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' runs in single mode, pool size {} forced to 1",
            self.node, self.requested
        )
    }
}

impl StructuredLog for PoolSizeForced<'_> {
    fn log(&self) {
        tracing::warn!(node = self.node, requested = self.requested, "{}", self);
    }
}

/// # Log Level
/// `info!` - Node lifecycle
pub struct NodeStarted<'a> {
    pub node: &'a str,
    pub units: usize,
}

impl Display for NodeStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' started with {} units", self.node, self.units)
    }
}

impl StructuredLog for NodeStarted<'_> {
    fn log(&self) {
        tracing::info!(node = self.node, units = self.units, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("node", span_name = name, node = self.node)
    }
}

/// A node stopped; carries its final counters.
///
/// # Log Level
/// `info!` - Node lifecycle
pub struct NodeStopped<'a> {
    pub node: &'a str,
    pub stats: &'a NodeStats,
}

impl Display for NodeStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' stopped: recv={} emit={} drop={} failed={}",
            self.node, self.stats.received, self.stats.emitted, self.stats.dropped, self.stats.failed
        )
    }
}

impl StructuredLog for NodeStopped<'_> {
    fn log(&self) {
        tracing::info!(
            node = self.node,
            received = self.stats.received,
            emitted = self.stats.emitted,
            dropped = self.stats.dropped,
            failed = self.stats.failed,
            "{}", self
        );
    }
}

/// The node filter could not be evaluated; the event is dropped.
///
/// # Log Level
/// `warn!` - Usually a payload the filter was not written for
pub struct FilterFailed<'a> {
    pub node: &'a str,
    pub correlation: u64,
    pub error: &'a NodeError,
}

impl Display for FilterFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Filter of node '{}' failed on event {}, dropping it: {}",
            self.node, self.correlation, self.error
        )
    }
}

impl StructuredLog for FilterFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            node = self.node,
            correlation = self.correlation,
            error = %self.error,
            "{}", self
        );
    }
}

/// # Log Level
/// `debug!` - Per-event filter decision
pub struct EventDropped<'a> {
    pub node: &'a str,
    pub correlation: u64,
}

impl Display for EventDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Filter of node '{}' dropped event {}",
            self.node, self.correlation
        )
    }
}

impl StructuredLog for EventDropped<'_> {
    fn log(&self) {
        tracing::debug!(node = self.node, correlation = self.correlation, "{}", self);
    }
}

/// A unit refused an accepted event.
///
/// # Log Level
/// `error!` - The node is not running
pub struct SubmitRejected<'a> {
    pub node: &'a str,
    pub error: &'a NodeError,
}

impl Display for SubmitRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' rejected an event: {}", self.node, self.error)
    }
}

impl StructuredLog for SubmitRejected<'_> {
    fn log(&self) {
        tracing::error!(node = self.node, error = %self.error, "{}", self);
    }
}

/// A trigger source returned an error from its run loop.
///
/// # Log Level
/// `error!` - The source produces nothing more
pub struct SourceFailed<'a> {
    pub unit: &'a str,
    pub error: &'a NodeError,
}

impl Display for SourceFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Source of unit '{}' failed: {}", self.unit, self.error)
    }
}

impl StructuredLog for SourceFailed<'_> {
    fn log(&self) {
        tracing::error!(unit = self.unit, error = %self.error, "{}", self);
    }
}

pub struct TriggerStarted<'a> {
    pub trigger: &'a str,
    pub units: usize,
}

impl Display for TriggerStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Trigger '{}' started with {} units",
            self.trigger, self.units
        )
    }
}

impl StructuredLog for TriggerStarted<'_> {
    fn log(&self) {
        tracing::info!(trigger = self.trigger, units = self.units, "{}", self);
    }
}

pub struct TriggerStopped<'a> {
    pub trigger: &'a str,
    pub emitted: u64,
}

impl Display for TriggerStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Trigger '{}' stopped after emitting {} events",
            self.trigger, self.emitted
        )
    }
}

impl StructuredLog for TriggerStopped<'_> {
    fn log(&self) {
        tracing::info!(trigger = self.trigger, emitted = self.emitted, "{}", self);
    }
}

/// Output of the built-in `log` sink.
///
/// # Log Level
/// `info!` - The payload is the point of the message
pub struct PayloadLogged<'a> {
    pub node: &'a str,
    pub payload: &'a Payload,
}

impl Display for PayloadLogged<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[{}] {}", self.node, self.payload)
    }
}

impl StructuredLog for PayloadLogged<'_> {
    fn log(&self) {
        tracing::info!(node = self.node, "{}", self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_stopped_reports_counters() {
        let stats = NodeStats {
            received: 10,
            emitted: 7,
            dropped: 2,
            failed: 1,
            ..Default::default()
        };
        let msg = NodeStopped {
            node: "s.upper",
            stats: &stats,
        };
        assert_eq!(
            msg.to_string(),
            "Node 's.upper' stopped: recv=10 emit=7 drop=2 failed=1"
        );
    }

    #[test]
    fn test_pool_size_forced_names_request() {
        let msg = PoolSizeForced {
            node: "s.upper",
            requested: 4,
        };
        assert!(msg.to_string().contains("pool size 4 forced to 1"));
    }
}
