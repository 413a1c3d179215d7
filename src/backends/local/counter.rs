// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::PluginContext;
use crate::engine::Emitter;
use crate::errors::NodeError;
use crate::traits::Source;

pub const NAME: &str = "counter";

fn default_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CounterArgs {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Stop after this many events.
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub start: i64,
}

impl Default for CounterArgs {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            limit: None,
            start: 0,
        }
    }
}

/// Emits `start`, `start + 1`, ... once per interval.
pub struct CounterTrigger {
    args: CounterArgs,
    emitter: Emitter,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
}

impl CounterTrigger {
    pub fn new(args: CounterArgs, emitter: Emitter) -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        Self {
            args,
            emitter,
            stop_tx,
            stop_rx,
        }
    }

    pub fn from_context(ctx: PluginContext<'_>) -> Result<Box<dyn Source>, NodeError> {
        let args = ctx.parse_args()?;
        Ok(Box::new(Self::new(args, ctx.emitter)))
    }
}

impl Source for CounterTrigger {
    fn start(&self) -> Result<(), NodeError> {
        let interval = Duration::from_millis(self.args.interval_ms);
        let mut emitted = 0u64;
        loop {
            if self.args.limit.is_some_and(|limit| emitted >= limit) {
                return Ok(());
            }
            match self.stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let value = self.args.start.saturating_add(emitted as i64);
                    self.emitter.emit(json!(value));
                    emitted += 1;
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
    }

    fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Emit, EmitGate, Event};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_counts_up_to_limit() {
        let gate = EmitGate::new("s.count");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let emit: Emit = Arc::new(move |e: Event| sink.lock().unwrap().push(e.payload));
        gate.register(Some(emit)).unwrap();

        let trigger = CounterTrigger::new(
            CounterArgs {
                interval_ms: 1,
                limit: Some(3),
                start: 10,
            },
            Emitter::new(gate),
        );
        trigger.start().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![json!(10), json!(11), json!(12)]);
    }

    #[test]
    fn test_stop_ends_run_loop() {
        let gate = EmitGate::new("s.count");
        gate.register(None).unwrap();
        let trigger = Arc::new(CounterTrigger::new(
            CounterArgs {
                interval_ms: 5,
                ..Default::default()
            },
            Emitter::new(gate.clone()),
        ));
        let runner = trigger.clone();
        let handle = std::thread::spawn(move || runner.start());
        std::thread::sleep(Duration::from_millis(30));
        trigger.stop();
        handle.join().unwrap().unwrap();
        assert!(gate.emitted() > 0);
    }
}
