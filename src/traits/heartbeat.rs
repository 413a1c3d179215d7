// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::engine::heartbeat::HeartBeatContext;
use crate::errors::StreamError;

/// A periodic supervision callback.
///
/// A failing beat is logged; the timer re-arms regardless. A heartbeat whose
/// `initialize` fails never beats. `finish` runs once the timer is cancelled.
#[async_trait]
pub trait HeartBeat: Send + Sync {
    async fn initialize(&self, _name: &str) -> Result<(), StreamError> {
        Ok(())
    }

    async fn beat(&self, ctx: &HeartBeatContext) -> Result<(), StreamError>;

    async fn finish(&self) {}
}
