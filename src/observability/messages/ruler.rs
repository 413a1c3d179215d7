// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for rule set registration and goto resolution.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};

/// A rule set compiled and registered with a ruler.
///
/// # Log Level
/// `debug!` - Happens once per rule set, interesting only when tracing rules
///
/// # Example
/// ```
/// use the_rivulet::observability::messages::ruler::RuleSetRegistered;
///
/// let msg = RuleSetRegistered {
///     rule_set: "routing",
///     rule_count: 3,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct RuleSetRegistered<'a> {
    pub rule_set: &'a str,
    pub rule_count: usize,
}

impl Display for RuleSetRegistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Registered rule set '{}' with {} rules",
            self.rule_set, self.rule_count
        )
    }
}

impl StructuredLog for RuleSetRegistered<'_> {
    fn log(&self) {
        tracing::debug!(
            rule_set = self.rule_set,
            rule_count = self.rule_count,
            "{}", self
        );
    }
}

/// Evaluation jumped from one rule set to another.
///
/// # Log Level
/// `debug!` - Per-evaluation detail
pub struct GotoFollowed<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub depth: usize,
}

impl Display for GotoFollowed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rule set '{}' jumped to '{}' (depth {})",
            self.from, self.to, self.depth
        )
    }
}

impl StructuredLog for GotoFollowed<'_> {
    fn log(&self) {
        tracing::debug!(
            from = self.from,
            to = self.to,
            depth = self.depth,
            "{}", self
        );
    }
}
