// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! One pipeline: triggers feeding a chain of node controllers.
//!
//! Wiring runs tail-to-head. The last processor emits to the stream output
//! (or nowhere), every earlier processor emits into the next one's
//! `input`, and every trigger emits into the head. Start order is
//! tail-to-head so consumers are ready before anything produces; stop order
//! is head-to-tail so producers go quiet before their consumers drain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{NodeTemplate, PipelineConfig, PluginContext, Registry};
use crate::engine::counters::StreamRuntimeInfo;
use crate::engine::emit::Emit;
use crate::engine::event::Event;
use crate::engine::node_controller::{NodeController, NodeSettings};
use crate::engine::trigger_controller::TriggerController;
use crate::errors::{ConfigError, NodeError, StreamError};
use crate::observability::messages::stream::{StreamStarted, StreamStopped};
use crate::observability::messages::StructuredLog;

/// Qualified node name within a stream.
pub fn qualified_name(stream: &str, node: &str) -> String {
    format!("{}.{}", stream, node)
}

pub struct Stream {
    name: String,
    triggers: Vec<TriggerController>,
    /// In stream order, head first.
    processors: Vec<Arc<NodeController>>,
    running: AtomicBool,
}

impl Stream {
    /// Build and wire the stream `name` from `config`.
    ///
    /// Events leaving the last processor are handed to `output` and then
    /// reported complete.
    pub fn build(
        name: &str,
        config: &PipelineConfig,
        registry: &Registry,
        output: Option<Emit>,
    ) -> Result<Self, StreamError> {
        let layout = config.stream_layout(name).map_err(|e| match e {
            ConfigError::UnknownStream(stream) => StreamError::UnknownStream(stream),
            other => StreamError::Config(other),
        })?;
        let runtime = &config.runtime;

        let mut processors = Vec::with_capacity(layout.processors.len());
        for node in &layout.processors {
            let template = config
                .node_templates
                .get(node)
                .ok_or_else(|| unknown_node(name, node))?;
            processors.push(Arc::new(build_node(
                &qualified_name(name, node),
                template,
                registry,
                runtime.node_init_timeout(),
            )?));
        }

        let mut triggers = Vec::with_capacity(layout.triggers.len());
        for trigger in &layout.triggers {
            let template = config
                .trigger_templates
                .get(trigger)
                .ok_or_else(|| unknown_node(name, trigger))?;
            let factory = registry.trigger(&template.module)?;
            let qualified = qualified_name(name, trigger);
            triggers.push(TriggerController::new(
                &qualified,
                template.pool_size,
                runtime.trigger_init_timeout(),
                |emitter| {
                    factory(PluginContext {
                        name: &qualified,
                        args: &template.args,
                        emitter,
                    })
                },
            )?);
        }

        let stream = Self {
            name: name.to_string(),
            triggers,
            processors,
            running: AtomicBool::new(false),
        };
        stream.wire(output)?;
        Ok(stream)
    }

    fn wire(&self, output: Option<Emit>) -> Result<(), NodeError> {
        let mut target: Option<Emit> = output.map(|out| -> Emit {
            Arc::new(move |event: Event| {
                out(event.clone());
                event.complete();
            })
        });
        for node in self.processors.iter().rev() {
            node.register_emit(target.take())?;
            target = Some(node.as_emit());
        }
        for trigger in &self.triggers {
            trigger.register_emit(target.clone())?;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start processors tail-to-head, then triggers.
    ///
    /// On failure everything already started is stopped again.
    pub fn start(&self) -> Result<(), StreamError> {
        for (i, node) in self.processors.iter().enumerate().rev() {
            if let Err(e) = node.start() {
                for started in &self.processors[i + 1..] {
                    started.stop();
                }
                return Err(e.into());
            }
        }
        for (i, trigger) in self.triggers.iter().enumerate() {
            if let Err(e) = trigger.start() {
                for started in &self.triggers[..i] {
                    started.stop();
                }
                for node in &self.processors {
                    node.stop();
                }
                return Err(e.into());
            }
        }
        self.running.store(true, Ordering::Release);
        StreamStarted {
            stream: &self.name,
            triggers: self.triggers.len(),
            processors: self.processors.len(),
        }
        .log();
        Ok(())
    }

    /// Stop triggers, then processors head-to-tail. Only the first call
    /// after a successful start does anything.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        for trigger in &self.triggers {
            trigger.stop();
        }
        for node in &self.processors {
            node.stop();
        }
        StreamStopped {
            stream: &self.name,
        }
        .log();
    }

    pub fn runtime_info(&self) -> StreamRuntimeInfo {
        StreamRuntimeInfo {
            triggers: self
                .triggers
                .iter()
                .map(|t| (t.name().to_string(), t.runtime_info()))
                .collect(),
            processors: self
                .processors
                .iter()
                .map(|p| (p.name().to_string(), p.runtime_info()))
                .collect(),
        }
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn unknown_node(stream: &str, node: &str) -> StreamError {
    StreamError::Config(ConfigError::UnknownNode {
        stream: stream.to_string(),
        name: node.to_string(),
    })
}

fn build_node(
    qualified: &str,
    template: &NodeTemplate,
    registry: &Registry,
    init_timeout: std::time::Duration,
) -> Result<NodeController, StreamError> {
    let plugin = registry.processor(&template.module)?;
    let settings = NodeSettings::from_template(template, plugin.kind, init_timeout);
    let node = NodeController::new(qualified, settings, |emitter| {
        (plugin.factory)(PluginContext {
            name: qualified,
            args: &template.args,
            emitter,
        })
    })?;
    Ok(node)
}
