// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Static checks on a [`PipelineConfig`].
//!
//! Validation collects every problem instead of stopping at the first one:
//!
//! 1. **Streams**: each stream starts with at least one trigger and names only
//!    known templates
//! 2. **Node templates**: supported execution mode, a non-zero pool, a
//!    positive poll timeout and a filter that compiles
//! 3. **Trigger and heartbeat templates**: non-zero pools, positive intervals
//!
//! Plugin names are checked separately against a registry by
//! [`crate::config::Registry::check`], since validation has no registry.

use crate::config::loader::{ExecutionMode, PipelineConfig};
use crate::engine::filter::Filter;
use crate::errors::ConfigError;

pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    for name in config.streams.keys() {
        if let Err(e) = config.stream_layout(name) {
            errors.push(e);
        }
    }

    for (name, node) in &config.node_templates {
        if node.mode == ExecutionMode::Process {
            errors.push(ConfigError::UnsupportedMode {
                node: name.clone(),
                mode: node.mode.to_string(),
            });
        }
        if node.pool_size == 0 {
            errors.push(invalid(name, "pool_size must be at least 1"));
        }
        if !(node.poll_timeout > 0.0) {
            errors.push(invalid(name, "poll_timeout must be positive"));
        }
        if let Err(source) = Filter::compile(&node.filter) {
            errors.push(ConfigError::InvalidFilter {
                node: name.clone(),
                source,
            });
        }
    }

    for (name, trigger) in &config.trigger_templates {
        if trigger.pool_size == 0 {
            errors.push(invalid(name, "pool_size must be at least 1"));
        }
    }

    for (name, heartbeat) in &config.heartbeats {
        if !(heartbeat.interval > 0.0) {
            errors.push(invalid(name, "heartbeat interval must be positive"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn invalid(node: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidTemplate {
        node: node.to_string(),
        reason: reason.to_string(),
    }
}
