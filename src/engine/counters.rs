// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Event counters and the runtime-info snapshots built from them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A monotonically increasing event counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

/// Counters of one execution unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    pub received: u64,
    pub finished: u64,
}

impl UnitStats {
    pub fn in_flight(&self) -> u64 {
        self.received.saturating_sub(self.finished)
    }
}

/// Counters of one node controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    #[serde(rename = "recv")]
    pub received: u64,
    #[serde(rename = "emit")]
    pub emitted: u64,
    #[serde(rename = "drop")]
    pub dropped: u64,
    pub failed: u64,
    pub units: BTreeMap<String, UnitStats>,
}

impl NodeStats {
    pub fn in_flight(&self) -> u64 {
        self.units.values().map(UnitStats::in_flight).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerStats {
    #[serde(rename = "emit")]
    pub emitted: u64,
}

/// Runtime table of one stream, keyed by qualified node name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRuntimeInfo {
    #[serde(rename = "trigger")]
    pub triggers: BTreeMap<String, TriggerStats>,
    #[serde(rename = "process")]
    pub processors: BTreeMap<String, NodeStats>,
}

/// Runtime tables of every running stream, keyed by stream name.
pub type RuntimeTable = BTreeMap<String, StreamRuntimeInfo>;
