// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

use super::RulerError;

/// Errors raised while loading, validating or resolving pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("stream '{0}' is not configured")]
    UnknownStream(String),

    #[error("stream '{0}' must start with at least one trigger")]
    MissingTrigger(String),

    #[error("stream '{stream}' references unknown node '{name}'")]
    UnknownNode { stream: String, name: String },

    #[error("node '{node}': execution mode '{mode}' is not supported")]
    UnsupportedMode { node: String, mode: String },

    #[error("node '{node}': {reason}")]
    InvalidTemplate { node: String, reason: String },

    #[error("node '{node}' has an invalid filter: {source}")]
    InvalidFilter {
        node: String,
        #[source]
        source: RulerError,
    },

    #[error("no {kind} named '{name}' is registered")]
    UnknownPlugin { kind: &'static str, name: String },

    #[error("a {kind} named '{name}' is already registered")]
    DuplicatePlugin { kind: &'static str, name: String },

    #[error("{kind} '{name}' has invalid arguments: {reason}")]
    InvalidArgs {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("cannot set up logging: {0}")]
    Logging(String),

    #[error("configuration validation failed:\n{}", join_errors(.0))]
    Validation(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}
