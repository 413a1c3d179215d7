// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;      // built-in triggers, processors, heartbeats
pub mod config;        // pipeline config + plugin registry
pub mod engine;        // execution units, node controllers, streams
pub mod errors;        // error handling
pub mod observability; // tracing setup + structured messages
pub mod rules;         // rule language: lexer, evaluator, ruler
pub mod traits;        // plugin contracts
