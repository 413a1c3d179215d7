// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod node;
mod rules;
mod stream;

pub use config::ConfigError;
pub use node::NodeError;
pub use rules::{EvalError, LexError, RuleParseError, RulerError};
pub use stream::StreamError;
