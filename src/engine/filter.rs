// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-node event filter.
//!
//! A filter is a [`Ruler`] with a single rule set, `local`, evaluated with the
//! event payload bound as `payload`. Actions resolve to one of the bound
//! constants `CONTINUE`, `ACCEPT` or `DROP`:
//!
//! ```text
//! IF payload.kind == 'noise' THEN DROP
//! IF payload.kind == 'audit' THEN CONTINUE
//! ```
//!
//! No matching rule means `ACCEPT`.

use crate::config::consts::FILTER_RULE_SET;
use crate::engine::event::Payload;
use crate::errors::{NodeError, RulerError};
use crate::rules::{Ruler, Value, Verdict};

pub const CONTINUE: i64 = 0;
pub const ACCEPT: i64 = 1;
pub const DROP: i64 = -1;

/// What a node does with an incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    /// Skip the processor and forward the event untouched.
    Continue,
    /// Hand the event to the processor.
    Accept,
    Drop,
}

#[derive(Debug, Clone)]
pub struct Filter {
    ruler: Ruler,
}

impl Filter {
    pub fn compile<S: AsRef<str>>(lines: &[S]) -> Result<Self, RulerError> {
        let mut ruler = Ruler::new();
        ruler.register_constant("CONTINUE", Value::Int(CONTINUE))?;
        ruler.register_constant("ACCEPT", Value::Int(ACCEPT))?;
        ruler.register_constant("DROP", Value::Int(DROP))?;
        ruler.register_rule_set(FILTER_RULE_SET, lines)?;
        Ok(Self { ruler })
    }

    pub fn decide(&self, payload: &Payload) -> Result<FilterVerdict, NodeError> {
        let verdict = self
            .ruler
            .entry(FILTER_RULE_SET, [("payload", Value::from(payload))])?;
        match verdict {
            Verdict::NoMatch => Ok(FilterVerdict::Accept),
            Verdict::Matched {
                value: Value::Int(CONTINUE),
                ..
            } => Ok(FilterVerdict::Continue),
            Verdict::Matched {
                value: Value::Int(ACCEPT),
                ..
            } => Ok(FilterVerdict::Accept),
            Verdict::Matched {
                value: Value::Int(DROP),
                ..
            } => Ok(FilterVerdict::Drop),
            Verdict::Matched { value, .. } => Err(NodeError::InvalidFilterResult(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter(lines: &[&str]) -> Filter {
        Filter::compile(lines).unwrap()
    }

    #[test]
    fn test_no_match_accepts() {
        let f = filter(&["IF payload.kind == 'noise' THEN DROP"]);
        assert_eq!(f.decide(&json!({"kind": "data"})).unwrap(), FilterVerdict::Accept);
        assert_eq!(filter(&[]).decide(&json!(null)).unwrap(), FilterVerdict::Accept);
    }

    #[test]
    fn test_verdicts() {
        let f = filter(&[
            "IF payload.kind == 'noise' THEN DROP",
            "IF payload.kind == 'audit' THEN CONTINUE",
            "IF payload.level > 2 THEN ACCEPT",
            "IF TRUE THEN DROP",
        ]);
        let cases = [
            (json!({"kind": "noise"}), FilterVerdict::Drop),
            (json!({"kind": "audit"}), FilterVerdict::Continue),
            (json!({"kind": "x", "level": 3}), FilterVerdict::Accept),
            (json!({"kind": "x", "level": 1}), FilterVerdict::Drop),
        ];
        for (payload, expected) in cases {
            assert_eq!(f.decide(&payload).unwrap(), expected, "{}", payload);
        }
    }

    #[test]
    fn test_unexpected_result_is_an_error() {
        let f = filter(&["IF TRUE THEN 'yes'"]);
        assert!(matches!(
            f.decide(&json!({})),
            Err(NodeError::InvalidFilterResult(v)) if v == "'yes'"
        ));
    }

    #[test]
    fn test_evaluation_error_surfaces() {
        let f = filter(&["IF payload * 2 THEN DROP"]);
        assert!(matches!(
            f.decide(&json!("text")),
            Err(NodeError::Filter(RulerError::Eval(_)))
        ));
    }

    #[test]
    fn test_compile_rejects_bad_lines() {
        assert!(Filter::compile(&["IF ( THEN DROP"]).is_err());
        assert!(Filter::compile(&["DROP everything"]).is_err());
    }
}
