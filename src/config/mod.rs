// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline configuration: loading, validation and plugin resolution.

mod loader;
mod registry;
mod validation;

pub mod consts;

pub use loader::{
    load_and_validate_config, load_config, parse_config, strip_json_comments, ConfigFormat,
    ExecutionMode, HeartBeatTemplate, LogConfig, NodeTemplate, PipelineConfig, RuntimeOptions,
    StreamLayout, TriggerTemplate,
};
pub use registry::{
    HeartBeatFactory, PluginContext, ProcessorFactory, ProcessorPlugin, Registry, SourceFactory,
};
pub use validation::validate_config;
