// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Re-arming heartbeat timers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::counters::RuntimeTable;
use crate::engine::stream_controller::StreamController;
use crate::observability::messages::stream::{HeartBeatCancelled, HeartBeatFailed};
use crate::observability::messages::StructuredLog;
use crate::traits::HeartBeat;

/// What a heartbeat sees when it fires.
pub struct HeartBeatContext {
    pub name: String,
    /// Runtime table snapshot taken just before the beat.
    pub runtime: RuntimeTable,
    /// Streams abandoned with threads still running.
    pub abandoned: Vec<String>,
    /// Handle for acting on streams, e.g. restarting a stalled one.
    pub controller: StreamController,
}

/// Fires a heartbeat every `interval` until cancelled.
pub struct HeartBeatTimer {
    name: String,
    cancel: CancellationToken,
    task: JoinHandle<u64>,
}

impl HeartBeatTimer {
    pub fn spawn(
        name: &str,
        interval: Duration,
        heartbeat: Arc<dyn HeartBeat>,
        controller: StreamController,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let beat_name = name.to_string();
        let task = tokio::spawn(async move {
            let mut beats = 0u64;
            if let Err(error) = heartbeat.initialize(&beat_name).await {
                HeartBeatFailed {
                    heartbeat: &beat_name,
                    error: &error,
                }
                .log();
                return beats;
            }
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                let ctx = HeartBeatContext {
                    name: beat_name.clone(),
                    runtime: controller.runtime_info(),
                    abandoned: controller.abandoned_streams(),
                    controller: controller.clone(),
                };
                beats += 1;
                if let Err(error) = heartbeat.beat(&ctx).await {
                    HeartBeatFailed {
                        heartbeat: &beat_name,
                        error: &error,
                    }
                    .log();
                }
            }
            heartbeat.finish().await;
            beats
        });
        Self {
            name: name.to_string(),
            cancel,
            task,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop re-arming, wait for a beat in progress and for `finish`.
    /// Returns the beat count.
    pub async fn cancel(self) -> u64 {
        self.cancel.cancel();
        let beats = self.task.await.unwrap_or_default();
        HeartBeatCancelled {
            heartbeat: &self.name,
            beats,
        }
        .log();
        beats
    }
}
