// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Whole-pipeline tests: configuration, registry, streams and controller.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::backends::stub::{CollectingSink, FailingTransform, VectorTrigger};
use crate::config::{
    parse_config, ConfigFormat, ExecutionMode, PipelineConfig, PluginContext, Registry,
};
use crate::engine::{
    Continuation, Emit, Emitter, Event, HeartBeatContext, Payload, RuntimeTable, Stream,
    StreamController,
};
use crate::errors::{NodeError, StreamError};
use crate::traits::{HeartBeat, Processor, Source};

fn registry() -> Registry {
    let mut registry = Registry::with_builtins().unwrap();
    registry
        .register_trigger("vector", |ctx: PluginContext<'_>| {
            let payloads: Vec<Payload> = ctx.parse_args()?;
            Ok(Box::new(VectorTrigger::new(ctx.emitter, payloads)) as Box<dyn Source>)
        })
        .unwrap();
    registry
}

fn collecting_output() -> (Emit, Arc<Mutex<Vec<Payload>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let emit: Emit = Arc::new(move |e: Event| sink.lock().unwrap().push(e.payload));
    (emit, seen)
}

const NOISE_PIPELINE: &str = r#"
TriggerTemplate:
  feed:
    module: vector
    args:
      - { kind: noise }
      - { kind: data, text: hi }
NodeTemplate:
  denoise:
    module: log
    filter:
      - "IF payload.kind == 'noise' THEN DROP"
  upper:
    module: change_case
    args: { case: upper, fields: [text] }
Streams:
  main: [feed, denoise, upper]
"#;

#[test]
fn test_noise_is_dropped_and_survivors_uppercased() {
    let cfg = parse_config(NOISE_PIPELINE, ConfigFormat::Yaml, Path::new("inline.yaml")).unwrap();
    let (output, seen) = collecting_output();
    let stream = Stream::build("main", &cfg, &registry(), Some(output)).unwrap();
    stream.start().unwrap();
    stream.stop();

    assert_eq!(*seen.lock().unwrap(), vec![json!({"kind": "data", "text": "HI"})]);
    let info = stream.runtime_info();
    assert_eq!(info.processors["main.denoise"].dropped, 1);
    assert_eq!(info.processors["main.upper"].received, 1);
}

#[test]
fn test_filter_uses_builtin_actions() {
    let mut cfg = parse_config(NOISE_PIPELINE, ConfigFormat::Yaml, Path::new("inline.yaml")).unwrap();
    cfg.trigger_templates.get_mut("feed").unwrap().args = json!([
        {"kind": "data", "text": "keep", "ip": "10.1.2.3"},
        {"kind": "data", "text": "drop", "ip": "192.168.0.9"},
        {"kind": "data", "text": "pass", "ip": "10.9.9.9", "raw": true}
    ]);
    cfg.node_templates.get_mut("denoise").unwrap().filter = vec![
        "IF exist(payload.raw) THEN CONTINUE".into(),
        "IF !ip_in_net(payload.ip, '10.0.0.0/8') THEN DROP".into(),
    ];
    cfg.node_templates.get_mut("upper").unwrap().filter =
        vec!["IF exist(payload.raw) THEN CONTINUE".into()];

    let (output, seen) = collecting_output();
    let stream = Stream::build("main", &cfg, &registry(), Some(output)).unwrap();
    stream.start().unwrap();
    stream.stop();

    let texts: Vec<_> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|p| p["text"].clone())
        .collect();
    assert_eq!(texts, vec![json!("KEEP"), json!("pass")]);
}

#[derive(Default)]
struct Fates {
    completed: AtomicU64,
    stopped: AtomicU64,
    failed: AtomicU64,
}

impl Continuation for Fates {
    fn completed(&self, _event: &Event) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn stopped(&self, _event: &Event, _reason: &str) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }

    fn failed(&self, _event: &Event, _error: &NodeError) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

struct TrackedTrigger {
    emitter: Emitter,
    fates: Arc<Fates>,
}

impl Source for TrackedTrigger {
    fn start(&self) -> Result<(), NodeError> {
        for i in 1..=6 {
            self.emitter.emit_with(json!(i), self.fates.clone());
        }
        Ok(())
    }
}

#[test]
fn test_every_event_reports_its_fate() {
    let fates = Arc::new(Fates::default());
    let collected = Arc::new(Mutex::new(Vec::new()));

    let mut registry = registry();
    let tracked = fates.clone();
    registry
        .register_trigger("tracked", move |ctx: PluginContext<'_>| {
            Ok(Box::new(TrackedTrigger {
                emitter: ctx.emitter,
                fates: tracked.clone(),
            }) as Box<dyn Source>)
        })
        .unwrap();
    registry
        .register_transform("flaky", |_ctx: PluginContext<'_>| {
            Ok(Box::new(FailingTransform::every(3)) as Box<dyn Processor>)
        })
        .unwrap();
    let store = collected.clone();
    registry
        .register_sink("collect", move |_ctx: PluginContext<'_>| {
            Ok(Box::new(CollectingSink::new(store.clone())) as Box<dyn Processor>)
        })
        .unwrap();

    let cfg = parse_config(
        r#"{
            // 5 is dropped, the flaky node fails its 3rd call (payload 3)
            "TriggerTemplate": {"src": {"module": "tracked"}},
            "NodeTemplate": {
                "flaky": {"module": "flaky", "filter": ["IF payload == 5 THEN DROP"]},
                "out": {"module": "collect"},
            },
            "Streams": {"s": ["src", "flaky", "out"]},
        }"#,
        ConfigFormat::Json,
        Path::new("inline.json"),
    )
    .unwrap();

    let stream = Stream::build("s", &cfg, &registry, None).unwrap();
    stream.start().unwrap();
    stream.stop();

    assert_eq!(fates.stopped.load(Ordering::SeqCst), 1);
    assert_eq!(fates.failed.load(Ordering::SeqCst), 1);
    assert_eq!(fates.completed.load(Ordering::SeqCst), 4);
    assert_eq!(collected.lock().unwrap().len(), 4);
}

struct Capture {
    last: Mutex<Option<RuntimeTable>>,
}

#[async_trait]
impl HeartBeat for Capture {
    async fn beat(&self, ctx: &HeartBeatContext) -> Result<(), StreamError> {
        *self.last.lock().unwrap() = Some(ctx.runtime.clone());
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_controller_feeds_heartbeats() {
    let capture = Arc::new(Capture {
        last: Mutex::new(None),
    });
    let mut registry = registry();
    let hb = capture.clone();
    registry
        .register_heartbeat("capture", move |_name: &str, _args: &serde_json::Value| {
            Ok(hb.clone() as Arc<dyn HeartBeat>)
        })
        .unwrap();

    let cfg: PipelineConfig = parse_config(
        r#"
[TriggerTemplate.tick]
module = "counter"
args = { interval_ms = 5 }

[NodeTemplate.upper]
module = "change_case"
mode = "thread"
pool_size = 2
args = { case = "upper" }

[Streams]
ticks = ["tick", "upper"]

[HeartBeat.capture]
module = "capture"
interval = 0.05

[Runtime]
report_interval = 0.01
"#,
        ConfigFormat::Toml,
        Path::new("inline.toml"),
    )
    .unwrap();
    assert_eq!(cfg.node_templates["upper"].mode, ExecutionMode::Thread);

    let controller = StreamController::new(cfg, registry);
    let runner = controller.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    controller.stop();
    handle.await.unwrap().unwrap();

    let table = capture.last.lock().unwrap().clone().unwrap();
    let ticks = &table["ticks"];
    assert!(ticks.triggers["ticks.tick"].emitted > 0);
    assert_eq!(ticks.processors["ticks.upper"].units.len(), 2);
}
