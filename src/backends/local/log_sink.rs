// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::PluginContext;
use crate::engine::Payload;
use crate::errors::NodeError;
use crate::observability::messages::node::PayloadLogged;
use crate::observability::messages::StructuredLog;
use crate::traits::{Outcome, Processor};

pub const NAME: &str = "log";

/// Sink that writes every payload to the log.
pub struct LogSink {
    node: String,
}

impl LogSink {
    pub fn new(node: impl Into<String>) -> Self {
        Self { node: node.into() }
    }

    pub fn from_context(ctx: PluginContext<'_>) -> Result<Box<dyn Processor>, NodeError> {
        Ok(Box::new(Self::new(ctx.name)))
    }
}

impl Processor for LogSink {
    fn process(&mut self, payload: &Payload) -> Result<Outcome, NodeError> {
        PayloadLogged {
            node: &self.node,
            payload,
        }
        .log();
        Ok(Outcome::Continue)
    }
}
