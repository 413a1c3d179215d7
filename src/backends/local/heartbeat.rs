// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::HeartBeatContext;
use crate::errors::{ConfigError, StreamError};
use crate::observability::messages::stream::RuntimeReported;
use crate::observability::messages::StructuredLog;
use crate::traits::HeartBeat;

pub const NAME: &str = "logger";

/// Logs the runtime table as JSON on every beat.
#[derive(Debug, Default)]
pub struct LoggerHeartBeat;

impl LoggerHeartBeat {
    pub fn from_args(_name: &str, _args: &serde_json::Value) -> Result<Arc<dyn HeartBeat>, ConfigError> {
        Ok(Arc::new(Self))
    }
}

#[async_trait]
impl HeartBeat for LoggerHeartBeat {
    async fn beat(&self, ctx: &HeartBeatContext) -> Result<(), StreamError> {
        let table = serde_json::to_string(&ctx.runtime).map_err(|e| StreamError::HeartBeat {
            name: ctx.name.clone(),
            reason: e.to_string(),
        })?;
        RuntimeReported {
            heartbeat: &ctx.name,
            streams: ctx.runtime.len(),
            abandoned: &ctx.abandoned,
            table: &table,
        }
        .log();
        Ok(())
    }
}
