// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Name → factory lookup for every pluggable part of a pipeline.
//!
//! Configuration refers to plugins by `module` name. A [`Registry`] maps
//! those names to factories; built-ins come from [`Registry::with_builtins`]
//! and applications add their own with the `register_*` methods.
//!
//! ```rust
//! use the_rivulet::config::{PluginContext, Registry};
//! use the_rivulet::engine::Payload;
//! use the_rivulet::errors::NodeError;
//! use the_rivulet::traits::{Outcome, Processor};
//!
//! struct Tag;
//!
//! impl Processor for Tag {
//!     fn process(&mut self, payload: &Payload) -> Result<Outcome, NodeError> {
//!         Ok(Outcome::Update(serde_json::json!({ "tagged": payload })))
//!     }
//! }
//!
//! let mut registry = Registry::with_builtins().unwrap();
//! registry
//!     .register_transform("tag", |_ctx: PluginContext<'_>| Ok(Box::new(Tag) as Box<dyn Processor>))
//!     .unwrap();
//! assert!(registry.processor("tag").is_ok());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::loader::PipelineConfig;
use crate::engine::emit::Emitter;
use crate::errors::{ConfigError, NodeError};
use crate::traits::{HeartBeat, NodeKind, Processor, Source};

pub const TRIGGER: &str = "trigger";
pub const PROCESSOR: &str = "processor";
pub const HEARTBEAT: &str = "heartbeat";

/// Everything a factory gets to build one plugin instance.
pub struct PluginContext<'a> {
    /// Qualified node name, `<stream>.<node>`.
    pub name: &'a str,
    pub args: &'a serde_json::Value,
    /// Handle for emitting downstream.
    pub emitter: Emitter,
}

impl PluginContext<'_> {
    /// Deserialize `args` into the plugin's own argument type.
    pub fn parse_args<T: DeserializeOwned>(&self) -> Result<T, NodeError> {
        serde_json::from_value(self.args.clone()).map_err(|e| NodeError::InvalidArgs {
            node: self.name.to_string(),
            reason: e.to_string(),
        })
    }
}

pub type SourceFactory =
    Arc<dyn Fn(PluginContext<'_>) -> Result<Box<dyn Source>, NodeError> + Send + Sync>;
pub type ProcessorFactory =
    Arc<dyn Fn(PluginContext<'_>) -> Result<Box<dyn Processor>, NodeError> + Send + Sync>;
pub type HeartBeatFactory =
    Arc<dyn Fn(&str, &serde_json::Value) -> Result<Arc<dyn HeartBeat>, ConfigError> + Send + Sync>;

/// A processor factory plus the role its instances play.
#[derive(Clone)]
pub struct ProcessorPlugin {
    pub kind: NodeKind,
    pub factory: ProcessorFactory,
}

#[derive(Clone, Default)]
pub struct Registry {
    triggers: HashMap<String, SourceFactory>,
    processors: HashMap<String, ProcessorPlugin>,
    heartbeats: HashMap<String, HeartBeatFactory>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |map: Vec<&String>| {
            let mut v: Vec<_> = map.into_iter().cloned().collect();
            v.sort();
            v
        };
        f.debug_struct("Registry")
            .field("triggers", &names(self.triggers.keys().collect()))
            .field("processors", &names(self.processors.keys().collect()))
            .field("heartbeats", &names(self.heartbeats.keys().collect()))
            .finish()
    }
}

fn insert_unique<V>(
    map: &mut HashMap<String, V>,
    kind: &'static str,
    name: &str,
    value: V,
) -> Result<(), ConfigError> {
    if map.contains_key(name) {
        return Err(ConfigError::DuplicatePlugin {
            kind,
            name: name.to_string(),
        });
    }
    map.insert(name.to_string(), value);
    Ok(())
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in plugins.
    pub fn with_builtins() -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        crate::backends::local::register_builtins(&mut registry)?;
        Ok(registry)
    }

    pub fn register_trigger<F>(&mut self, name: &str, factory: F) -> Result<(), ConfigError>
    where
        F: Fn(PluginContext<'_>) -> Result<Box<dyn Source>, NodeError> + Send + Sync + 'static,
    {
        let factory: SourceFactory = Arc::new(factory);
        insert_unique(&mut self.triggers, TRIGGER, name, factory)
    }

    pub fn register_transform<F>(&mut self, name: &str, factory: F) -> Result<(), ConfigError>
    where
        F: Fn(PluginContext<'_>) -> Result<Box<dyn Processor>, NodeError> + Send + Sync + 'static,
    {
        self.register_processor(name, NodeKind::Transform, Arc::new(factory))
    }

    pub fn register_sink<F>(&mut self, name: &str, factory: F) -> Result<(), ConfigError>
    where
        F: Fn(PluginContext<'_>) -> Result<Box<dyn Processor>, NodeError> + Send + Sync + 'static,
    {
        self.register_processor(name, NodeKind::Sink, Arc::new(factory))
    }

    fn register_processor(
        &mut self,
        name: &str,
        kind: NodeKind,
        factory: ProcessorFactory,
    ) -> Result<(), ConfigError> {
        insert_unique(
            &mut self.processors,
            PROCESSOR,
            name,
            ProcessorPlugin { kind, factory },
        )
    }

    pub fn register_heartbeat<F>(&mut self, name: &str, factory: F) -> Result<(), ConfigError>
    where
        F: Fn(&str, &serde_json::Value) -> Result<Arc<dyn HeartBeat>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        let factory: HeartBeatFactory = Arc::new(factory);
        insert_unique(&mut self.heartbeats, HEARTBEAT, name, factory)
    }

    pub fn trigger(&self, module: &str) -> Result<&SourceFactory, ConfigError> {
        self.triggers.get(module).ok_or_else(|| unknown(TRIGGER, module))
    }

    pub fn processor(&self, module: &str) -> Result<&ProcessorPlugin, ConfigError> {
        self.processors
            .get(module)
            .ok_or_else(|| unknown(PROCESSOR, module))
    }

    pub fn heartbeat(&self, module: &str) -> Result<&HeartBeatFactory, ConfigError> {
        self.heartbeats
            .get(module)
            .ok_or_else(|| unknown(HEARTBEAT, module))
    }

    /// Every `module` named by `config` must be registered.
    pub fn check(&self, config: &PipelineConfig) -> Result<(), Vec<ConfigError>> {
        let errors: Vec<_> = config
            .trigger_templates
            .values()
            .filter_map(|t| self.trigger(&t.module).err())
            .chain(
                config
                    .node_templates
                    .values()
                    .filter_map(|n| self.processor(&n.module).err()),
            )
            .chain(
                config
                    .heartbeats
                    .values()
                    .filter_map(|h| self.heartbeat(&h.module).err()),
            )
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn unknown(kind: &'static str, name: &str) -> ConfigError {
    ConfigError::UnknownPlugin {
        kind,
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::{NodeTemplate, TriggerTemplate};
    use crate::backends::stub::CountingTransform;
    use crate::engine::emit::EmitGate;

    #[test]
    fn test_builtins_are_registered() {
        let registry = Registry::with_builtins().unwrap();
        assert!(registry.trigger("counter").is_ok());
        assert_eq!(registry.processor("change_case").unwrap().kind, NodeKind::Transform);
        assert_eq!(registry.processor("log").unwrap().kind, NodeKind::Sink);
        assert!(registry.heartbeat("logger").is_ok());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = Registry::with_builtins().unwrap();
        let result = registry.register_transform("change_case", |_| {
            Ok(Box::new(CountingTransform::default()) as Box<dyn Processor>)
        });
        assert!(matches!(
            result,
            Err(ConfigError::DuplicatePlugin { kind: PROCESSOR, name }) if name == "change_case"
        ));
    }

    #[test]
    fn test_check_reports_unknown_modules() {
        let registry = Registry::with_builtins().unwrap();
        let mut cfg = PipelineConfig::default();
        cfg.trigger_templates
            .insert("t".into(), TriggerTemplate::new("kafka"));
        cfg.node_templates
            .insert("n".into(), NodeTemplate::new("change_case"));
        cfg.node_templates.insert("m".into(), NodeTemplate::new("nope"));

        let errors = registry.check(&cfg).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            &errors[0],
            ConfigError::UnknownPlugin { kind: TRIGGER, name } if name == "kafka"
        ));
    }

    #[test]
    fn test_parse_args_names_the_node() {
        #[derive(serde::Deserialize, Debug)]
        struct Args {
            #[allow(dead_code)]
            limit: u64,
        }
        let args = serde_json::json!({"limit": "many"});
        let ctx = PluginContext {
            name: "s.t",
            args: &args,
            emitter: Emitter::new(EmitGate::new("s.t")),
        };
        assert!(matches!(
            ctx.parse_args::<Args>(),
            Err(NodeError::InvalidArgs { node, .. }) if node == "s.t"
        ));
    }
}
