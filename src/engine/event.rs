// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Events travelling through a stream.

use std::fmt;
use std::sync::Arc;

use crate::errors::NodeError;
use crate::observability::messages::node::{EventCompleted, EventFailed, EventStopped};
use crate::observability::messages::StructuredLog;

/// Event payloads are JSON documents.
pub type Payload = serde_json::Value;

/// Receives the final fate of an event.
///
/// Every hook has a logging default, so implementors only override what
/// they care about.
pub trait Continuation: Send + Sync {
    /// The event left the tail of its stream.
    fn completed(&self, event: &Event) {
        EventCompleted {
            correlation: event.correlation,
            hops: event.hops,
        }
        .log();
    }

    /// A processor or filter ended the event's journey.
    fn stopped(&self, event: &Event, reason: &str) {
        EventStopped {
            correlation: event.correlation,
            hops: event.hops,
            reason,
        }
        .log();
    }

    fn failed(&self, event: &Event, error: &NodeError) {
        EventFailed {
            correlation: event.correlation,
            hops: event.hops,
            error,
        }
        .log();
    }
}

/// A payload plus the bookkeeping needed to report where it ended up.
#[derive(Clone)]
pub struct Event {
    pub payload: Payload,
    /// Sequence number assigned by the emitting trigger.
    pub correlation: u64,
    /// Number of node controllers the event has entered.
    pub hops: u32,
    continuation: Option<Arc<dyn Continuation>>,
}

impl Event {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            correlation: 0,
            hops: 0,
            continuation: None,
        }
    }

    pub fn with_correlation(mut self, correlation: u64) -> Self {
        self.correlation = correlation;
        self
    }

    pub fn with_continuation(mut self, continuation: Arc<dyn Continuation>) -> Self {
        self.continuation = Some(continuation);
        self
    }

    /// Same event, new payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn continuation(&self) -> Option<&Arc<dyn Continuation>> {
        self.continuation.as_ref()
    }

    pub fn complete(&self) {
        if let Some(c) = &self.continuation {
            c.completed(self);
        }
    }

    pub fn stop(&self, reason: &str) {
        if let Some(c) = &self.continuation {
            c.stopped(self, reason);
        }
    }

    pub fn fail(&self, error: &NodeError) {
        if let Some(c) = &self.continuation {
            c.failed(self, error);
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("payload", &self.payload)
            .field("correlation", &self.correlation)
            .field("hops", &self.hops)
            .field("continuation", &self.continuation.is_some())
            .finish()
    }
}

impl From<Payload> for Event {
    fn from(payload: Payload) -> Self {
        Event::new(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Continuation for Recorder {
        fn completed(&self, event: &Event) {
            self.0.lock().unwrap().push(format!("done:{}", event.correlation));
        }

        fn stopped(&self, _event: &Event, reason: &str) {
            self.0.lock().unwrap().push(format!("stop:{}", reason));
        }
    }

    #[test]
    fn test_hooks_reach_continuation() {
        let recorder = Arc::new(Recorder::default());
        let event = Event::new(json!(1))
            .with_correlation(7)
            .with_continuation(recorder.clone());

        event.complete();
        event.stop("filtered");
        // failed() falls back to the logging default
        event.fail(&NodeError::processing("boom"));

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["done:7".to_string(), "stop:filtered".to_string()]
        );
    }

    #[test]
    fn test_with_payload_keeps_bookkeeping() {
        let event = Event::new(json!("a")).with_correlation(3);
        let updated = event.with_payload(json!("b"));
        assert_eq!(updated.payload, json!("b"));
        assert_eq!(updated.correlation, 3);
        assert!(updated.continuation().is_none());
    }
}
