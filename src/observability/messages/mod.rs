// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message is a small struct borrowing the values it reports. It
//! implements `Display` for the human-readable line and [`StructuredLog`]
//! to emit that line with the values attached as tracing fields.
//!
//! # Organization
//!
//! * `ruler` - rule set registration and goto resolution
//! * `node` - events, execution units, node and trigger controllers
//! * `stream` - stream lifecycle, heartbeats and the stream controller
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_rivulet::observability::messages::node::NodeStarted;
//! use the_rivulet::observability::messages::StructuredLog;
//!
//! NodeStarted {
//!     node: "ingest.upper",
//!     units: 4,
//! }
//! .log();
//! ```

use tracing::Span;

pub mod node;
pub mod ruler;
pub mod stream;

/// A message that knows its own log level and fields.
pub trait StructuredLog {
    /// Emit the message at its level with its fields attached.
    fn log(&self);

    /// A span carrying the message's identifying fields.
    fn span(&self, name: &str) -> Span {
        tracing::info_span!("rivulet", span_name = name)
    }
}
