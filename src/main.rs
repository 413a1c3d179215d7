// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;

use anyhow::{bail, Context};
use the_rivulet::config::{load_and_validate_config, Registry};
use the_rivulet::engine::StreamController;
use the_rivulet::errors::ConfigError;
use the_rivulet::observability::init_logging;

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [--check] <pipeline.yaml|.toml|.json>\n\
         \x20      --check  validate the pipeline and exit"
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("the-rivulet");

    let (check_only, path) = match args.get(1..).unwrap_or_default() {
        [flag, path] if flag == "--check" => (true, path),
        [path] => (false, path),
        _ => bail!(usage(program)),
    };

    let config = load_and_validate_config(path)
        .with_context(|| format!("loading pipeline {path}"))?;
    let registry = Registry::with_builtins()?;
    registry
        .check(&config)
        .map_err(ConfigError::Validation)
        .with_context(|| format!("resolving plugins of {path}"))?;

    if check_only {
        println!(
            "{path}: {} streams, {} nodes, {} triggers, {} heartbeats",
            config.streams.len(),
            config.node_templates.len(),
            config.trigger_templates.len(),
            config.heartbeats.len()
        );
        return Ok(());
    }

    let _log_guard = init_logging(&config.runtime.log)?;
    tracing::info!(config = %path, "starting the-rivulet");

    let controller = StreamController::new(config, registry);
    let on_signal = controller.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping streams");
            on_signal.stop();
        }
    });

    controller.run().await?;
    Ok(())
}
