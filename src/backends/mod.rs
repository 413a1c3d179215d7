// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Plugin implementations.
//!
//! ## Local Backend
//! Built-in plugins registered by [`crate::config::Registry::with_builtins`]:
//! - **`counter`** trigger: emits increasing integers on an interval
//! - **`change_case`** transform: upper, lower, proper and title case
//! - **`log`** sink: writes payloads to the log
//! - **`logger`** heartbeat: logs the runtime table
//!
//! ## Stub Backend (Test-Only)
//! Plugins with scripted behaviour (slow, failing, panicking, collecting)
//! for exercising the engine. Not available in production builds.

pub mod local;
#[cfg(test)]
pub mod stub;
