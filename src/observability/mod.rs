// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability: structured log messages and subscriber setup.
//!
//! Diagnostic output goes through `tracing`. Operational events are small
//! message structs (see [`messages`]) so call sites never format their own
//! strings. The process-wide subscriber is installed once by
//! [`init_logging`], whose returned [`LogGuard`] scopes the file writer:
//! dropping it flushes and closes the log file.
//!
//! # Usage
//!
//! ```rust,no_run
//! use the_rivulet::config::LogConfig;
//! use the_rivulet::observability::init_logging;
//!
//! let _guard = init_logging(&LogConfig::default()).unwrap();
//! tracing::info!("logging ready");
//! ```

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;
use crate::errors::ConfigError;

pub mod messages;

/// Keeps the log file writer alive. Drop it last.
#[must_use = "dropping the guard closes the log file"]
#[derive(Default)]
pub struct LogGuard {
    file: Option<WorkerGuard>,
}

impl LogGuard {
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }
}

/// The filter directive for `config`; `RUST_LOG` wins when set.
pub fn env_filter(config: &LogConfig) -> Result<EnvFilter, ConfigError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ConfigError::Logging(format!("level '{}': {}", config.level, e))),
    }
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> Result<LogGuard, ConfigError> {
    let filter = env_filter(config)?;

    let console = config.console.then(tracing_subscriber::fmt::layer);

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    Ok(LogGuard { file: guard })
}

fn file_appender(path: &Path) -> Result<tracing_appender::rolling::RollingFileAppender, ConfigError> {
    let name = path
        .file_name()
        .ok_or_else(|| ConfigError::Logging(format!("{} is not a file path", path.display())))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    Ok(tracing_appender::rolling::never(dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_is_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LogConfig {
            level: "rivulet=extreme".into(),
            ..LogConfig::default()
        };
        assert!(matches!(env_filter(&config), Err(ConfigError::Logging(_))));
    }

    #[test]
    fn test_file_appender_requires_file_name() {
        assert!(file_appender(Path::new("/")).is_err());
        let dir = tempfile::tempdir().unwrap();
        assert!(file_appender(&dir.path().join("rivulet.log")).is_ok());
    }
}
