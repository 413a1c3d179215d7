// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for node plugins, execution units and node controllers.

use std::time::Duration;
use thiserror::Error;

use super::RulerError;

#[derive(Debug, Clone, Error)]
pub enum NodeError {
    /// A unit did not finish `initialize()` within its readiness window.
    #[error("unit '{unit}' did not initialize within {timeout:?}")]
    InitTimeout { unit: String, timeout: Duration },

    #[error("unit '{unit}' failed to initialize: {reason}")]
    InitFailed { unit: String, reason: String },

    #[error("cannot spawn worker for unit '{unit}': {reason}")]
    Spawn { unit: String, reason: String },

    #[error("node '{0}' already has a registered emit target")]
    EmitAlreadyRegistered(String),

    #[error("node '{0}' was started before its emit target was registered")]
    EmitNotRegistered(String),

    #[error("node '{0}' is not accepting events")]
    PoolNotReady(String),

    #[error("node '{node}': execution mode '{mode}' is not supported")]
    UnsupportedMode { node: String, mode: String },

    #[error("node '{node}': invalid arguments: {reason}")]
    InvalidArgs { node: String, reason: String },

    #[error("filter of node '{node}' is invalid: {source}")]
    InvalidFilter {
        node: String,
        #[source]
        source: RulerError,
    },

    #[error("filter returned {0}, expected CONTINUE, ACCEPT or DROP")]
    InvalidFilterResult(String),

    #[error(transparent)]
    Filter(#[from] RulerError),

    /// A plugin reported a failure while handling one event.
    #[error("processing failed: {0}")]
    Processing(String),

    #[error("unit '{unit}' panicked: {message}")]
    Panicked { unit: String, message: String },
}

impl NodeError {
    pub fn processing(reason: impl Into<String>) -> Self {
        NodeError::Processing(reason.into())
    }
}
