// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for streams, heartbeats and the stream controller.
//!
//! This module contains message types for logging events related to:
//! * Stream startup and shutdown, graceful or abandoned
//! * Heartbeat timers and their failures
//! * The controller's supervision loop

use crate::errors::StreamError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A stream has all of its nodes and triggers running.
///
/// # Log Level
/// `info!` - Stream lifecycle
///
/// # Example
/// ```
/// use the_rivulet::observability::messages::stream::StreamStarted;
///
/// let msg = StreamStarted {
///     stream: "ingest",
///     triggers: 1,
///     processors: 2,
/// };
///
/// assert_eq!(msg.to_string(), "Stream 'ingest' started: 1 triggers, 2 processors");
/// ```
pub struct StreamStarted<'a> {
    pub stream: &'a str,
    pub triggers: usize,
    pub processors: usize,
}

impl Display for StreamStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stream '{}' started: {} triggers, {} processors",
            self.stream, self.triggers, self.processors
        )
    }
}

impl StructuredLog for StreamStarted<'_> {
    fn log(&self) {
        tracing::info!(
            stream = self.stream,
            triggers = self.triggers,
            processors = self.processors,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("stream", span_name = name, stream = self.stream)
    }
}

/// # Log Level
/// `info!` - Stream lifecycle
pub struct StreamStopped<'a> {
    pub stream: &'a str,
}

impl Display for StreamStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Stream '{}' stopped", self.stream)
    }
}

impl StructuredLog for StreamStopped<'_> {
    fn log(&self) {
        tracing::info!(stream = self.stream, "{}", self);
    }
}

/// A stream could not be built or started.
///
/// # Log Level
/// `error!` - The stream is not running
pub struct StreamStartFailed<'a> {
    pub stream: &'a str,
    pub error: &'a StreamError,
}

impl Display for StreamStartFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Stream '{}' failed to start: {}", self.stream, self.error)
    }
}

impl StructuredLog for StreamStartFailed<'_> {
    fn log(&self) {
        tracing::error!(stream = self.stream, error = %self.error, "{}", self);
    }
}

/// A stream missed its deadline and the controller stopped waiting for it.
///
/// The stream's task is aborted but its node and trigger threads cannot be
/// interrupted; they keep running until the stream's own stop completes.
///
/// # Log Level
/// `warn!` - Threads owned by the stream are left running detached
pub struct StreamAbandoned<'a> {
    pub stream: &'a str,
    pub phase: &'a str,
    pub timeout: Duration,
}

impl Display for StreamAbandoned<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stream '{}' did not {} within {:?}, abandoned with its threads still running",
            self.stream, self.phase, self.timeout
        )
    }
}

impl StructuredLog for StreamAbandoned<'_> {
    fn log(&self) {
        tracing::warn!(
            stream = self.stream,
            phase = self.phase,
            timeout_ms = self.timeout.as_millis() as u64,
            "{}", self
        );
    }
}

/// A stream task ended with a panic.
///
/// # Log Level
/// `error!` - The failure is confined to that stream
pub struct StreamTaskFailed<'a> {
    pub stream: &'a str,
    pub reason: &'a str,
}

impl Display for StreamTaskFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Task of stream '{}' failed: {}", self.stream, self.reason)
    }
}

impl StructuredLog for StreamTaskFailed<'_> {
    fn log(&self) {
        tracing::error!(stream = self.stream, reason = self.reason, "{}", self);
    }
}

/// # Log Level
/// `warn!` - The timer keeps firing
pub struct HeartBeatFailed<'a> {
    pub heartbeat: &'a str,
    pub error: &'a StreamError,
}

impl Display for HeartBeatFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Heartbeat '{}' failed: {}", self.heartbeat, self.error)
    }
}

impl StructuredLog for HeartBeatFailed<'_> {
    fn log(&self) {
        tracing::warn!(heartbeat = self.heartbeat, error = %self.error, "{}", self);
    }
}

pub struct HeartBeatCancelled<'a> {
    pub heartbeat: &'a str,
    pub beats: u64,
}

impl Display for HeartBeatCancelled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Heartbeat '{}' cancelled after {} beats",
            self.heartbeat, self.beats
        )
    }
}

impl StructuredLog for HeartBeatCancelled<'_> {
    fn log(&self) {
        tracing::debug!(heartbeat = self.heartbeat, beats = self.beats, "{}", self);
    }
}

/// The controller has started its streams and heartbeats.
///
/// # Log Level
/// `info!` - Controller lifecycle
pub struct ControllerStarted {
    pub streams: usize,
    pub heartbeats: usize,
}

impl Display for ControllerStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stream controller running {} streams with {} heartbeats",
            self.streams, self.heartbeats
        )
    }
}

impl StructuredLog for ControllerStarted {
    fn log(&self) {
        tracing::info!(
            streams = self.streams,
            heartbeats = self.heartbeats,
            "{}", self
        );
    }
}

/// # Log Level
/// `info!` - Controller lifecycle
pub struct ControllerStopped {
    pub streams: usize,
    pub abandoned: usize,
}

impl Display for ControllerStopped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stream controller stopped {} streams ({} abandoned)",
            self.streams, self.abandoned
        )
    }
}

impl StructuredLog for ControllerStopped {
    fn log(&self) {
        tracing::info!(streams = self.streams, abandoned = self.abandoned, "{}", self);
    }
}

/// Runtime table published by the built-in `logger` heartbeat.
///
/// # Log Level
/// `info!` - Periodic operational summary
pub struct RuntimeReported<'a> {
    pub heartbeat: &'a str,
    pub streams: usize,
    /// Streams still winding down after being abandoned.
    pub abandoned: &'a [String],
    pub table: &'a str,
}

impl Display for RuntimeReported<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Heartbeat '{}': {} streams {}",
            self.heartbeat, self.streams, self.table
        )?;
        if !self.abandoned.is_empty() {
            write!(f, " abandoned={:?}", self.abandoned)?;
        }
        Ok(())
    }
}

impl StructuredLog for RuntimeReported<'_> {
    fn log(&self) {
        tracing::info!(
            heartbeat = self.heartbeat,
            streams = self.streams,
            abandoned = self.abandoned.len(),
            "{}", self
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_abandoned_names_phase() {
        let msg = StreamAbandoned {
            stream: "ingest",
            phase: "stop",
            timeout: Duration::from_secs(15),
        };
        assert_eq!(msg.to_string(), "Stream 'ingest' did not stop within 15s, abandoned with its threads still running");
    }
}
