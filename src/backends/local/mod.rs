// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in plugins available to every pipeline.

pub mod change_case;
pub mod counter;
pub mod heartbeat;
pub mod log_sink;

pub use change_case::{Case, ChangeCaseArgs, ChangeCaseProcessor};
pub use counter::{CounterArgs, CounterTrigger};
pub use heartbeat::LoggerHeartBeat;
pub use log_sink::LogSink;

use crate::config::Registry;
use crate::errors::ConfigError;

/// Register the built-in plugins under their configuration names.
pub fn register_builtins(registry: &mut Registry) -> Result<(), ConfigError> {
    registry.register_trigger(counter::NAME, CounterTrigger::from_context)?;
    registry.register_transform(change_case::NAME, ChangeCaseProcessor::from_context)?;
    registry.register_sink(log_sink::NAME, LogSink::from_context)?;
    registry.register_heartbeat(heartbeat::NAME, LoggerHeartBeat::from_args)?;
    Ok(())
}
