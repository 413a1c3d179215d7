// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Execution units per node or trigger when `pool_size` is omitted.
pub const DEFAULT_POOL_SIZE: usize = 1;
/// Seconds a worker blocks on its queue per poll.
pub const DEFAULT_POLL_TIMEOUT_SECS: f64 = 1.0;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: f64 = 5.0;
/// Seconds between counter reports from a running stream.
pub const DEFAULT_REPORT_INTERVAL_SECS: f64 = 1.0;
pub const DEFAULT_START_TIMEOUT_SECS: f64 = 15.0;
pub const DEFAULT_STOP_TIMEOUT_SECS: f64 = 15.0;
pub const DEFAULT_NODE_INIT_TIMEOUT_SECS: f64 = 10.0;
pub const DEFAULT_TRIGGER_INIT_TIMEOUT_SECS: f64 = 5.0;
pub const DEFAULT_LOCK_TIMEOUT_SECS: f64 = 10.0;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Rule set name a node filter is registered under.
pub const FILTER_RULE_SET: &str = "local";
