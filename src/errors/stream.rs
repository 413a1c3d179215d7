// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::Duration;
use thiserror::Error;

use super::{ConfigError, NodeError};

/// Errors raised while building, starting or supervising streams.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream '{0}' is not configured")]
    UnknownStream(String),

    #[error("stream '{0}' is already running")]
    AlreadyRunning(String),

    #[error("stream '{0}' is not running")]
    NotRunning(String),

    #[error("stream '{name}' did not report ready within {timeout:?}")]
    StartTimeout { name: String, timeout: Duration },

    /// An earlier copy of the stream was abandoned and its threads have not
    /// finished stopping yet.
    #[error("stream '{0}' was abandoned and is still winding down")]
    StillStopping(String),

    #[error("stream '{name}' failed to start: {reason}")]
    StartFailed { name: String, reason: String },

    /// The controller's operation lock was not acquired in time.
    #[error("stream controller busy: lock not acquired within {0:?}")]
    ControllerBusy(Duration),

    #[error("stream controller is already running")]
    ControllerRunning,

    #[error("heartbeat '{name}' failed: {reason}")]
    HeartBeat { name: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Node(#[from] NodeError),
}
