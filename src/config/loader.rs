// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::consts::{
    DEFAULT_HEARTBEAT_INTERVAL_SECS, DEFAULT_LOCK_TIMEOUT_SECS, DEFAULT_LOG_LEVEL,
    DEFAULT_NODE_INIT_TIMEOUT_SECS, DEFAULT_POLL_TIMEOUT_SECS, DEFAULT_POOL_SIZE,
    DEFAULT_REPORT_INTERVAL_SECS, DEFAULT_START_TIMEOUT_SECS, DEFAULT_STOP_TIMEOUT_SECS,
    DEFAULT_TRIGGER_INIT_TIMEOUT_SECS,
};
use crate::config::validation::validate_config;
use crate::errors::ConfigError;

/// Complete pipeline configuration.
///
/// Top-level keys are PascalCase; every section is optional.
///
/// # Example
/// ```yaml
/// NodeTemplate:
///   upper:
///     module: change_case
///     args: { case: upper }
///     mode: thread
///     pool_size: 2
///     filter:
///       - "IF payload.kind == 'noise' THEN DROP"
/// TriggerTemplate:
///   ticks:
///     module: counter
///     args: { interval_ms: 100, limit: 10 }
/// Streams:
///   main: [ticks, upper]
/// HeartBeat:
///   report:
///     module: logger
///     interval: 5
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(rename = "NodeTemplate", default)]
    pub node_templates: BTreeMap<String, NodeTemplate>,
    #[serde(rename = "TriggerTemplate", default)]
    pub trigger_templates: BTreeMap<String, TriggerTemplate>,
    #[serde(rename = "Streams", default)]
    pub streams: BTreeMap<String, Vec<String>>,
    #[serde(rename = "HeartBeat", default)]
    pub heartbeats: BTreeMap<String, HeartBeatTemplate>,
    #[serde(rename = "Runtime", default)]
    pub runtime: RuntimeOptions,
}

/// Template of a transform or sink node.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NodeTemplate {
    /// Registry name of the processor factory.
    pub module: String,
    #[serde(default = "empty_args")]
    pub args: serde_json::Value,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Seconds a worker waits on its queue before re-checking for dismissal.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout: f64,
    #[serde(default)]
    pub mode: ExecutionMode,
    /// `IF <condition> THEN <CONTINUE|ACCEPT|DROP>` lines, evaluated in order.
    #[serde(default)]
    pub filter: Vec<String>,
    /// Overrides `Runtime.node_init_timeout` for this node.
    #[serde(default)]
    pub init_timeout: Option<f64>,
}

impl NodeTemplate {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            args: empty_args(),
            pool_size: DEFAULT_POOL_SIZE,
            poll_timeout: DEFAULT_POLL_TIMEOUT_SECS,
            mode: ExecutionMode::default(),
            filter: Vec::new(),
            init_timeout: None,
        }
    }

    pub fn poll_timeout(&self) -> Duration {
        seconds(self.poll_timeout)
    }
}

/// How a node runs its processor instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One instance, called on the thread that delivers the event.
    #[default]
    Single,
    /// `pool_size` instances, each with its own queue and worker thread.
    Thread,
    /// Reserved. Rejected at validation and construction.
    Process,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ExecutionMode::Single => "single",
            ExecutionMode::Thread => "thread",
            ExecutionMode::Process => "process",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TriggerTemplate {
    pub module: String,
    #[serde(default = "empty_args")]
    pub args: serde_json::Value,
    /// Number of independent source instances, each on its own thread.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl TriggerTemplate {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            args: empty_args(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HeartBeatTemplate {
    pub module: String,
    #[serde(default = "empty_args")]
    pub args: serde_json::Value,
    /// Seconds between beats.
    #[serde(default = "default_heartbeat_interval")]
    pub interval: f64,
}

impl HeartBeatTemplate {
    pub fn interval(&self) -> Duration {
        seconds(self.interval)
    }
}

/// Supervision timings and logging, all in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// How often a running stream reports its counters.
    pub report_interval: f64,
    pub start_timeout: f64,
    pub stop_timeout: f64,
    pub node_init_timeout: f64,
    pub trigger_init_timeout: f64,
    /// How long start/stop/restart wait for another such operation to finish.
    pub lock_timeout: f64,
    pub log: LogConfig,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            report_interval: DEFAULT_REPORT_INTERVAL_SECS,
            start_timeout: DEFAULT_START_TIMEOUT_SECS,
            stop_timeout: DEFAULT_STOP_TIMEOUT_SECS,
            node_init_timeout: DEFAULT_NODE_INIT_TIMEOUT_SECS,
            trigger_init_timeout: DEFAULT_TRIGGER_INIT_TIMEOUT_SECS,
            lock_timeout: DEFAULT_LOCK_TIMEOUT_SECS,
            log: LogConfig::default(),
        }
    }
}

impl RuntimeOptions {
    pub fn report_interval(&self) -> Duration {
        seconds(self.report_interval)
    }

    pub fn start_timeout(&self) -> Duration {
        seconds(self.start_timeout)
    }

    pub fn stop_timeout(&self) -> Duration {
        seconds(self.stop_timeout)
    }

    pub fn node_init_timeout(&self) -> Duration {
        seconds(self.node_init_timeout)
    }

    pub fn trigger_init_timeout(&self) -> Duration {
        seconds(self.trigger_init_timeout)
    }

    pub fn lock_timeout(&self) -> Duration {
        seconds(self.lock_timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub console: bool,
    /// Append logs to this file through a non-blocking writer.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            console: true,
            file: None,
        }
    }
}

/// Triggers and processors of one stream, in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLayout {
    pub triggers: Vec<String>,
    pub processors: Vec<String>,
}

impl PipelineConfig {
    /// Split stream `name` into its leading triggers and the processors
    /// after them.
    pub fn stream_layout(&self, name: &str) -> Result<StreamLayout, ConfigError> {
        let members = self
            .streams
            .get(name)
            .ok_or_else(|| ConfigError::UnknownStream(name.to_string()))?;

        let split = members
            .iter()
            .position(|m| !self.trigger_templates.contains_key(m))
            .unwrap_or(members.len());
        if split == 0 {
            return Err(ConfigError::MissingTrigger(name.to_string()));
        }

        let (triggers, processors) = members.split_at(split);
        if let Some(unknown) = processors
            .iter()
            .find(|p| !self.node_templates.contains_key(p.as_str()))
        {
            return Err(ConfigError::UnknownNode {
                stream: name.to_string(),
                name: unknown.clone(),
            });
        }

        Ok(StreamLayout {
            triggers: triggers.to_vec(),
            processors: processors.to_vec(),
        })
    }
}

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    /// JSON with `//` comment lines and trailing commas.
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            Some("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());

/// Drop `//` comment lines and trailing commas so serde_json accepts the text.
pub fn strip_json_comments(text: &str) -> String {
    let without_comments = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n");
    TRAILING_COMMA
        .replace_all(&without_comments, "$1")
        .into_owned()
}

/// Parse configuration text. `origin` only labels errors.
pub fn parse_config(
    text: &str,
    format: ConfigFormat,
    origin: &Path,
) -> Result<PipelineConfig, ConfigError> {
    let parse_error = |reason: String| ConfigError::Parse {
        path: origin.to_path_buf(),
        reason,
    };
    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(text).map_err(|e| parse_error(e.to_string())),
        ConfigFormat::Toml => toml::from_str(text).map_err(|e| parse_error(e.to_string())),
        ConfigFormat::Json => serde_json::from_str(&strip_json_comments(text))
            .map_err(|e| parse_error(e.to_string())),
    }
}

/// Load a config, choosing the format from the file extension.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, ConfigFormat::from_path(path), path)
}

/// Load a config and reject it unless every stream and node template is
/// usable.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let cfg = load_config(path)?;
    validate_config(&cfg).map_err(ConfigError::Validation)?;
    Ok(cfg)
}

fn empty_args() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_poll_timeout() -> f64 {
    DEFAULT_POLL_TIMEOUT_SECS
}

fn default_heartbeat_interval() -> f64 {
    DEFAULT_HEARTBEAT_INTERVAL_SECS
}

/// Negative or non-finite values clamp to zero.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
NodeTemplate:
  upper:
    module: change_case
    args: { case: upper }
    mode: thread
    pool_size: 3
    filter:
      - "IF payload.kind == 'noise' THEN DROP"
  out:
    module: log
TriggerTemplate:
  ticks:
    module: counter
Streams:
  main: [ticks, upper, out]
"#;

    #[test]
    fn parse_yaml_with_defaults() {
        let cfg = parse_config(YAML, ConfigFormat::Yaml, Path::new("inline.yaml")).unwrap();

        let upper = &cfg.node_templates["upper"];
        assert_eq!(upper.mode, ExecutionMode::Thread);
        assert_eq!(upper.pool_size, 3);
        assert_eq!(upper.args["case"], "upper");
        assert_eq!(upper.filter.len(), 1);

        let out = &cfg.node_templates["out"];
        assert_eq!(out.mode, ExecutionMode::Single);
        assert_eq!(out.pool_size, 1);
        assert_eq!(out.poll_timeout(), Duration::from_secs(1));
        assert!(out.args.as_object().unwrap().is_empty());

        assert_eq!(cfg.trigger_templates["ticks"].pool_size, 1);
        assert!(cfg.heartbeats.is_empty());
        assert_eq!(cfg.runtime, RuntimeOptions::default());
        assert_eq!(cfg.runtime.start_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.runtime.trigger_init_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn parse_json_with_comments_and_trailing_commas() {
        let json = r#"
{
    // nodes
    "NodeTemplate": {
        "out": { "module": "log", "pool_size": 2, },
    },
    "TriggerTemplate": { "ticks": { "module": "counter" } },
    "Streams": { "main": ["ticks", "out",], },
    "HeartBeat": { "hb": { "module": "logger", "interval": 0.5 } },
}
"#;
        let cfg = parse_config(json, ConfigFormat::Json, Path::new("inline.json")).unwrap();
        assert_eq!(cfg.node_templates["out"].pool_size, 2);
        assert_eq!(cfg.streams["main"], vec!["ticks", "out"]);
        assert_eq!(cfg.heartbeats["hb"].interval(), Duration::from_millis(500));
    }

    #[test]
    fn parse_toml() {
        let text = r#"
[NodeTemplate.out]
module = "log"
mode = "single"

[TriggerTemplate.ticks]
module = "counter"
args = { interval_ms = 10 }

[Streams]
main = ["ticks", "out"]

[Runtime]
start_timeout = 2.5

[Runtime.log]
level = "debug"
"#;
        let cfg = parse_config(text, ConfigFormat::Toml, Path::new("inline.toml")).unwrap();
        assert_eq!(cfg.trigger_templates["ticks"].args["interval_ms"], 10);
        assert_eq!(cfg.runtime.start_timeout(), Duration::from_millis(2500));
        assert_eq!(cfg.runtime.stop_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.runtime.log.level, "debug");
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.conf")), ConfigFormat::Json);
    }

    #[test]
    fn stream_layout_splits_leading_triggers() {
        let mut cfg = parse_config(YAML, ConfigFormat::Yaml, Path::new("inline.yaml")).unwrap();
        assert_eq!(
            cfg.stream_layout("main").unwrap(),
            StreamLayout {
                triggers: vec!["ticks".into()],
                processors: vec!["upper".into(), "out".into()],
            }
        );

        cfg.streams.insert("headless".into(), vec!["upper".into()]);
        assert!(matches!(
            cfg.stream_layout("headless"),
            Err(ConfigError::MissingTrigger(_))
        ));

        cfg.streams
            .insert("broken".into(), vec!["ticks".into(), "ghost".into()]);
        assert!(matches!(
            cfg.stream_layout("broken"),
            Err(ConfigError::UnknownNode { name, .. }) if name == "ghost"
        ));

        assert!(matches!(
            cfg.stream_layout("absent"),
            Err(ConfigError::UnknownStream(_))
        ));
    }

    #[test]
    fn load_reports_missing_file_and_bad_syntax() {
        assert!(matches!(
            load_config("/no/such/pipeline.yaml"),
            Err(ConfigError::Io { .. })
        ));

        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        std::fs::write(file.path(), "Streams: [unclosed").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
