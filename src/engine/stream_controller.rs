// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Supervision of named streams.
//!
//! Every stream runs in its own tokio task: a panic there ends only that
//! stream. Node and trigger threads are started and stopped from blocking
//! sections of the task. Running streams report their counters over a
//! shared channel, which [`StreamController::run`] folds into the runtime
//! table handed to heartbeats.
//!
//! Starting, stopping and restarting are serialized by an operation lock
//! that is acquired with a timeout. A stream that misses its start or stop
//! deadline is abandoned: its task is aborted, but blocked node threads
//! cannot be interrupted and keep running until the stream's own stop
//! completes. Abandoned streams are listed by
//! [`StreamController::abandoned_streams`] and cannot be started again
//! until they have wound down.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::{PipelineConfig, Registry};
use crate::engine::counters::{RuntimeTable, StreamRuntimeInfo};
use crate::engine::execution_unit::panic_message;
use crate::engine::heartbeat::HeartBeatTimer;
use crate::engine::stream::Stream;
use crate::errors::StreamError;
use crate::observability::messages::stream::{
    ControllerStarted, ControllerStopped, StreamAbandoned, StreamStartFailed, StreamTaskFailed,
};
use crate::observability::messages::StructuredLog;
use crate::traits::HeartBeat;

/// How a stream came down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Graceful,
    /// The stream missed its stop deadline. Its task was aborted and its
    /// threads were left to finish stopping on their own.
    Abandoned,
}

struct StreamReport {
    stream: String,
    info: StreamRuntimeInfo,
}

struct StreamHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    /// Dead once the stream and all of its threads are gone.
    alive: Weak<()>,
}

type StreamMap = BTreeMap<String, StreamHandle>;

struct Inner {
    config: Arc<PipelineConfig>,
    registry: Arc<Registry>,
    streams: Mutex<StreamMap>,
    runtime: RwLock<RuntimeTable>,
    abandoned: std::sync::Mutex<BTreeMap<String, Weak<()>>>,
    reports_tx: mpsc::UnboundedSender<StreamReport>,
    /// Taken by `run` for as long as it runs.
    reports_rx: Mutex<Option<mpsc::UnboundedReceiver<StreamReport>>>,
    shutdown: CancellationToken,
}

/// Cheap to clone; all clones drive the same set of streams.
#[derive(Clone)]
pub struct StreamController {
    inner: Arc<Inner>,
}

impl StreamController {
    pub fn new(config: PipelineConfig, registry: Registry) -> Self {
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                config: Arc::new(config),
                registry: Arc::new(registry),
                streams: Mutex::new(BTreeMap::new()),
                runtime: RwLock::new(RuntimeTable::new()),
                abandoned: std::sync::Mutex::new(BTreeMap::new()),
                reports_tx,
                reports_rx: Mutex::new(Some(reports_rx)),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    async fn lock_streams(&self) -> Result<MutexGuard<'_, StreamMap>, StreamError> {
        let timeout = self.inner.config.runtime.lock_timeout();
        tokio::time::timeout(timeout, self.inner.streams.lock())
            .await
            .map_err(|_| StreamError::ControllerBusy(timeout))
    }

    /// Build and start stream `name`, waiting until it reports ready.
    pub async fn start_stream(&self, name: &str) -> Result<(), StreamError> {
        let mut streams = self.lock_streams().await?;
        self.start_locked(&mut streams, name).await
    }

    /// Stop stream `name`, aborting it if it does not stop in time.
    pub async fn stop_stream(&self, name: &str) -> Result<Shutdown, StreamError> {
        let mut streams = self.lock_streams().await?;
        self.stop_locked(&mut streams, name).await
    }

    /// Stop stream `name` if it is running, then start it again.
    ///
    /// Fails with [`StreamError::StillStopping`] when the stop had to
    /// abandon the stream.
    pub async fn restart_stream(&self, name: &str) -> Result<(), StreamError> {
        let mut streams = self.lock_streams().await?;
        match self.stop_locked(&mut streams, name).await {
            Ok(_) | Err(StreamError::NotRunning(_)) => {}
            Err(e) => return Err(e),
        }
        self.start_locked(&mut streams, name).await
    }

    async fn start_locked(&self, streams: &mut StreamMap, name: &str) -> Result<(), StreamError> {
        if streams.contains_key(name) {
            return Err(StreamError::AlreadyRunning(name.to_string()));
        }
        if !self.inner.config.streams.contains_key(name) {
            return Err(StreamError::UnknownStream(name.to_string()));
        }
        self.check_abandoned(name)?;

        let alive = Arc::new(());
        let lease = Arc::downgrade(&alive);
        let cancel = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel();
        let task = tokio::spawn(supervise(
            StreamTask {
                name: name.to_string(),
                config: Arc::clone(&self.inner.config),
                registry: Arc::clone(&self.inner.registry),
                reports: self.inner.reports_tx.clone(),
                cancel: cancel.clone(),
                alive,
            },
            ready_tx,
        ));

        let timeout = self.inner.config.runtime.start_timeout();
        let error = match tokio::time::timeout(timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => {
                self.inner
                    .runtime
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(name.to_string(), StreamRuntimeInfo::default());
                streams.insert(
                    name.to_string(),
                    StreamHandle {
                        cancel,
                        task,
                        alive: lease,
                    },
                );
                return Ok(());
            }
            Ok(Ok(Err(error))) => {
                let _ = task.await;
                error
            }
            Ok(Err(_)) => {
                let reason = match task.await {
                    Err(e) if e.is_panic() => panic_message(e.into_panic().as_ref()),
                    _ => "stream task ended before reporting ready".to_string(),
                };
                StreamError::StartFailed {
                    name: name.to_string(),
                    reason,
                }
            }
            Err(_) => {
                cancel.cancel();
                task.abort();
                self.abandon(name, lease);
                StreamAbandoned {
                    stream: name,
                    phase: "start",
                    timeout,
                }
                .log();
                StreamError::StartTimeout {
                    name: name.to_string(),
                    timeout,
                }
            }
        };
        StreamStartFailed {
            stream: name,
            error: &error,
        }
        .log();
        Err(error)
    }

    async fn stop_locked(&self, streams: &mut StreamMap, name: &str) -> Result<Shutdown, StreamError> {
        let mut handle = streams
            .remove(name)
            .ok_or_else(|| StreamError::NotRunning(name.to_string()))?;
        handle.cancel.cancel();

        let timeout = self.inner.config.runtime.stop_timeout();
        let shutdown = match tokio::time::timeout(timeout, &mut handle.task).await {
            Ok(Ok(())) => Shutdown::Graceful,
            Ok(Err(e)) => {
                let reason = if e.is_panic() {
                    panic_message(e.into_panic().as_ref())
                } else {
                    e.to_string()
                };
                StreamTaskFailed {
                    stream: name,
                    reason: &reason,
                }
                .log();
                Shutdown::Graceful
            }
            Err(_) => {
                handle.task.abort();
                self.abandon(name, handle.alive);
                StreamAbandoned {
                    stream: name,
                    phase: "stop",
                    timeout,
                }
                .log();
                Shutdown::Abandoned
            }
        };

        self.inner
            .runtime
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        Ok(shutdown)
    }

    fn abandon(&self, name: &str, lease: Weak<()>) {
        if lease.strong_count() > 0 {
            self.inner
                .abandoned
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(name.to_string(), lease);
        }
    }

    fn check_abandoned(&self, name: &str) -> Result<(), StreamError> {
        let mut abandoned = self
            .inner
            .abandoned
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match abandoned.get(name) {
            Some(lease) if lease.strong_count() > 0 => {
                Err(StreamError::StillStopping(name.to_string()))
            }
            Some(_) => {
                abandoned.remove(name);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Streams that were abandoned and whose threads are still running.
    pub fn abandoned_streams(&self) -> Vec<String> {
        let mut abandoned = self
            .inner
            .abandoned
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        abandoned.retain(|_, lease| lease.strong_count() > 0);
        abandoned.keys().cloned().collect()
    }

    /// Start every configured stream and heartbeat, then fold stream
    /// reports into the runtime table until [`stop`](Self::stop) is called.
    /// A stream that fails to start is logged and left out; the others run.
    /// Heartbeats are cancelled before the streams are stopped.
    pub async fn run(&self) -> Result<(), StreamError> {
        let mut reports = self
            .inner
            .reports_rx
            .lock()
            .await
            .take()
            .ok_or(StreamError::ControllerRunning)?;

        let result = self.supervise_all(&mut reports).await;

        *self.inner.reports_rx.lock().await = Some(reports);
        result
    }

    async fn supervise_all(
        &self,
        reports: &mut mpsc::UnboundedReceiver<StreamReport>,
    ) -> Result<(), StreamError> {
        let heartbeats = self.resolve_heartbeats()?;

        let mut started = 0;
        for name in self.inner.config.streams.keys() {
            // failures are logged by start_stream
            if self.start_stream(name).await.is_ok() {
                started += 1;
            }
        }

        let timers: Vec<HeartBeatTimer> = heartbeats
            .into_iter()
            .map(|(name, interval, heartbeat)| {
                HeartBeatTimer::spawn(&name, interval, heartbeat, self.clone())
            })
            .collect();
        ControllerStarted {
            streams: started,
            heartbeats: timers.len(),
        }
        .log();

        loop {
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => break,
                Some(report) = reports.recv() => self.apply(report),
            }
        }

        for timer in timers {
            timer.cancel().await;
        }
        let (streams, abandoned) = self.stop_all().await;
        ControllerStopped { streams, abandoned }.log();
        Ok(())
    }

    fn resolve_heartbeats(&self) -> Result<Vec<(String, Duration, Arc<dyn HeartBeat>)>, StreamError> {
        self.inner
            .config
            .heartbeats
            .iter()
            .map(|(name, template)| {
                let factory = self.inner.registry.heartbeat(&template.module)?;
                let heartbeat = factory(name.as_str(), &template.args)?;
                Ok((name.clone(), template.interval(), heartbeat))
            })
            .collect()
    }

    /// Stop every running stream. Returns how many were stopped and how
    /// many of those had to be abandoned.
    async fn stop_all(&self) -> (usize, usize) {
        let mut streams = self.inner.streams.lock().await;
        let names: Vec<String> = streams.keys().cloned().collect();
        let mut abandoned = 0;
        for name in &names {
            if let Ok(Shutdown::Abandoned) = self.stop_locked(&mut streams, name).await {
                abandoned += 1;
            }
        }
        (names.len(), abandoned)
    }

    fn apply(&self, report: StreamReport) {
        let mut table = self
            .inner
            .runtime
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Reports from a stream that has since been stopped are stale.
        if let Some(slot) = table.get_mut(&report.stream) {
            *slot = report.info;
        }
    }

    /// Ask a running [`run`](Self::run) to tear everything down.
    pub fn stop(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Last reported counters of every running stream.
    pub fn runtime_info(&self) -> RuntimeTable {
        self.inner
            .runtime
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn running_streams(&self) -> Vec<String> {
        self.inner
            .runtime
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

struct StreamTask {
    name: String,
    config: Arc<PipelineConfig>,
    registry: Arc<Registry>,
    reports: mpsc::UnboundedSender<StreamReport>,
    cancel: CancellationToken,
    alive: Arc<()>,
}

/// A started stream plus the lease the controller watches.
struct Running {
    // dropped in declaration order: the stream stops before the lease goes
    stream: Stream,
    _alive: Arc<()>,
}

/// Body of a stream task: start, report until cancelled, stop.
async fn supervise(task: StreamTask, ready: oneshot::Sender<Result<(), StreamError>>) {
    let StreamTask {
        name,
        config,
        registry,
        reports,
        cancel,
        alive,
    } = task;
    let report_interval = config.runtime.report_interval();

    let build_name = name.clone();
    let started = tokio::task::spawn_blocking(move || {
        let stream = Stream::build(&build_name, &config, &registry, None)?;
        stream.start()?;
        Ok::<_, StreamError>(Running {
            stream,
            _alive: alive,
        })
    })
    .await;

    let running = match started {
        Ok(Ok(running)) => running,
        Ok(Err(error)) => {
            let _ = ready.send(Err(error));
            return;
        }
        Err(e) => {
            let _ = ready.send(Err(StreamError::StartFailed {
                name,
                reason: e.to_string(),
            }));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        // Nobody is waiting any more; the start was abandoned.
        stop_blocking(running).await;
        return;
    }

    let mut ticker = tokio::time::interval(report_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let _ = reports.send(StreamReport {
                    stream: name.clone(),
                    info: running.stream.runtime_info(),
                });
            }
        }
    }
    stop_blocking(running).await;
}

async fn stop_blocking(running: Running) {
    let _ = tokio::task::spawn_blocking(move || {
        running.stream.stop();
        drop(running);
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::{SlowInitProcessor, SlowTransform};
    use crate::config::{ExecutionMode, NodeTemplate, PluginContext, TriggerTemplate};
    use crate::errors::NodeError;
    use crate::traits::Processor;
    use serde_json::json;

    fn registry() -> Registry {
        let mut registry = Registry::with_builtins().unwrap();
        registry
            .register_transform("slow_init", |ctx: PluginContext<'_>| {
                let ms: u64 = ctx.parse_args()?;
                Ok(Box::new(SlowInitProcessor::new(Duration::from_millis(ms))) as Box<dyn Processor>)
            })
            .unwrap();
        registry
            .register_transform("stuck", |ctx: PluginContext<'_>| {
                let ms: u64 = ctx.parse_args()?;
                Ok(Box::new(SlowTransform::new(Duration::from_millis(ms))) as Box<dyn Processor>)
            })
            .unwrap();
        registry
    }

    async fn wait_until_wound_down(controller: &StreamController) {
        for _ in 0..150 {
            if controller.abandoned_streams().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("abandoned streams never wound down");
    }

    /// One `counter -> change_case -> log` stream named `ticks`, plus a
    /// `slow` stream whose node takes `init_ms` to initialize.
    fn config(init_ms: u64) -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        let mut counter = TriggerTemplate::new("counter");
        counter.args = json!({"interval_ms": 5});
        cfg.trigger_templates.insert("tick".into(), counter);
        let mut upper = NodeTemplate::new("change_case");
        upper.args = json!({"case": "upper"});
        cfg.node_templates.insert("upper".into(), upper);
        cfg.node_templates.insert("log".into(), NodeTemplate::new("log"));
        let mut slow = NodeTemplate::new("slow_init");
        slow.args = json!(init_ms);
        cfg.node_templates.insert("slow".into(), slow);
        cfg.streams.insert(
            "ticks".into(),
            vec!["tick".into(), "upper".into(), "log".into()],
        );
        cfg.streams
            .insert("slow".into(), vec!["tick".into(), "slow".into()]);
        cfg.runtime.report_interval = 0.01;
        cfg.runtime.stop_timeout = 2.0;
        cfg
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_stop_lifecycle() {
        let controller = StreamController::new(config(0), registry());

        controller.start_stream("ticks").await.unwrap();
        assert_eq!(controller.running_streams(), vec!["ticks".to_string()]);
        assert!(matches!(
            controller.start_stream("ticks").await,
            Err(StreamError::AlreadyRunning(_))
        ));

        controller.restart_stream("ticks").await.unwrap();
        assert_eq!(
            controller.stop_stream("ticks").await.unwrap(),
            Shutdown::Graceful
        );
        assert!(controller.running_streams().is_empty());
        assert!(matches!(
            controller.stop_stream("ticks").await,
            Err(StreamError::NotRunning(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unknown_stream() {
        let controller = StreamController::new(config(0), registry());
        assert!(matches!(
            controller.start_stream("nope").await,
            Err(StreamError::UnknownStream(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_node_init_timeout_fails_start() {
        let mut cfg = config(300);
        cfg.runtime.node_init_timeout = 0.02;
        cfg.node_templates.get_mut("slow").unwrap().mode = ExecutionMode::Thread;
        let controller = StreamController::new(cfg, registry());

        let result = controller.start_stream("slow").await;
        assert!(matches!(
            result,
            Err(StreamError::Node(NodeError::InitTimeout { .. }))
        ));
        assert!(controller.running_streams().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_readiness_timeout_abandons_stream() {
        let mut cfg = config(500);
        cfg.runtime.start_timeout = 0.05;
        let controller = StreamController::new(cfg, registry());

        let result = controller.start_stream("slow").await;
        assert!(matches!(result, Err(StreamError::StartTimeout { .. })));
        assert!(controller.running_streams().is_empty());
        assert_eq!(controller.abandoned_streams(), vec!["slow".to_string()]);
        assert!(matches!(
            controller.start_stream("slow").await,
            Err(StreamError::StillStopping(_))
        ));

        wait_until_wound_down(&controller).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_timeout_abandons_stream() {
        let mut cfg = config(0);
        let mut stuck = NodeTemplate::new("stuck");
        stuck.args = json!(400);
        cfg.node_templates.insert("stuck".into(), stuck);
        cfg.streams
            .insert("stuck".into(), vec!["tick".into(), "stuck".into()]);
        cfg.runtime.stop_timeout = 0.05;
        let controller = StreamController::new(cfg, registry());

        controller.start_stream("stuck").await.unwrap();
        // the first tick is now inside a 400ms process call
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            controller.stop_stream("stuck").await.unwrap(),
            Shutdown::Abandoned
        );
        assert!(!controller.runtime_info().contains_key("stuck"));
        assert_eq!(controller.abandoned_streams(), vec!["stuck".to_string()]);
        assert!(matches!(
            controller.restart_stream("stuck").await,
            Err(StreamError::StillStopping(_))
        ));

        wait_until_wound_down(&controller).await;
        controller.start_stream("stuck").await.unwrap();
        assert_eq!(controller.running_streams(), vec!["stuck".to_string()]);
        let _ = controller.stop_stream("stuck").await.unwrap();
        wait_until_wound_down(&controller).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_operation_lock_times_out() {
        let mut cfg = config(300);
        cfg.runtime.lock_timeout = 0.02;
        let controller = StreamController::new(cfg, registry());

        let starter = controller.clone();
        let pending = tokio::spawn(async move { starter.start_stream("slow").await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(
            controller.stop_stream("slow").await,
            Err(StreamError::ControllerBusy(_))
        ));
        pending.await.unwrap().unwrap();
        controller.stop_stream("slow").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_keeps_streams_that_started() {
        let mut cfg = config(300);
        cfg.runtime.node_init_timeout = 0.02;
        cfg.node_templates.get_mut("slow").unwrap().mode = ExecutionMode::Thread;
        let controller = StreamController::new(cfg, registry());
        let runner = controller.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.running_streams(), vec!["ticks".to_string()]);
        assert!(controller.runtime_info()["ticks"].triggers["ticks.tick"].emitted > 0);

        controller.stop();
        handle.await.unwrap().unwrap();
        assert!(controller.running_streams().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_reports_and_tears_down() {
        let controller = StreamController::new(config(0), registry());
        let runner = controller.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(matches!(
            controller.run().await,
            Err(StreamError::ControllerRunning)
        ));
        let table = controller.runtime_info();
        assert!(table["ticks"].triggers["ticks.tick"].emitted > 0);
        assert!(table["ticks"].processors["ticks.upper"].received > 0);

        controller.stop();
        handle.await.unwrap().unwrap();
        assert!(controller.running_streams().is_empty());
    }
}
