// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The line-oriented rule-file grammar.
//!
//! ```text
//! classify:
//!     IF payload.level >= 3 THEN 'alert'
//!     # comments and blank lines are skipped
//!     IF TRUE THEN goto('fallback')
//! ```
//!
//! A header line names a rule set; every following line indented by a tab or
//! four spaces and starting with `IF` is a rule of that set.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::RuleParseError;

static HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*):\s*$").unwrap());
static RULE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\t|    )\s*IF\b").unwrap());
static RULE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^IF (.+?) THEN (.+)$").unwrap());

/// A named rule set in file order.
pub type RuleSetSource = (String, Vec<String>);

/// Parse rule-file text into rule sets, preserving file order.
///
/// Rule lines are returned with internal whitespace collapsed to single
/// spaces. Line numbers in errors are 1-based.
pub fn parse_rules(text: &str) -> Result<Vec<RuleSetSource>, RuleParseError> {
    let mut sets: Vec<RuleSetSource> = Vec::new();
    let mut seen = HashSet::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(caps) = HEADER.captures(raw) {
            let name = caps[1].to_string();
            if !seen.insert(name.clone()) {
                return Err(RuleParseError::DuplicateRuleSet { name, line });
            }
            sets.push((name, Vec::new()));
            continue;
        }

        if RULE_LINE.is_match(raw) {
            let (_, rules) = sets
                .last_mut()
                .ok_or(RuleParseError::OrphanRule { line })?;
            rules.push(collapse_whitespace(trimmed));
            continue;
        }

        return Err(RuleParseError::MalformedLine {
            line,
            text: raw.to_string(),
        });
    }

    Ok(sets)
}

pub fn parse_rule_file(path: impl AsRef<Path>) -> Result<Vec<RuleSetSource>, RuleParseError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| RuleParseError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_rules(&text)
}

/// Split `IF <condition> THEN <action>` into its two halves.
///
/// The condition ends at the first ` THEN `.
pub fn split_rule(line: &str) -> Result<(String, String), RuleParseError> {
    let normalized = collapse_whitespace(line.trim());
    let caps = RULE_SHAPE
        .captures(&normalized)
        .ok_or_else(|| RuleParseError::MalformedRule(line.to_string()))?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RULES: &str = "\
# leading comment
classify:
    IF payload.level >= 3 THEN 'alert'

\t# indented comment
\tIF   TRUE    THEN 'info'
fallback:
    IF TRUE THEN goto('classify')
";

    #[test]
    fn test_parse_rules_keeps_order_and_collapses_whitespace() {
        let sets = parse_rules(RULES).unwrap();
        assert_eq!(
            sets,
            vec![
                (
                    "classify".to_string(),
                    vec![
                        "IF payload.level >= 3 THEN 'alert'".to_string(),
                        "IF TRUE THEN 'info'".to_string(),
                    ]
                ),
                (
                    "fallback".to_string(),
                    vec!["IF TRUE THEN goto('classify')".to_string()]
                ),
            ]
        );
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        assert_eq!(
            parse_rules("a:\n    IF TRUE THEN 1\na:\n").unwrap_err(),
            RuleParseError::DuplicateRuleSet {
                name: "a".to_string(),
                line: 3
            }
        );
        assert_eq!(
            parse_rules("\n    IF TRUE THEN 1\n").unwrap_err(),
            RuleParseError::OrphanRule { line: 2 }
        );
        assert_eq!(
            parse_rules("a:\nIF TRUE THEN 1\n").unwrap_err(),
            RuleParseError::MalformedLine {
                line: 2,
                text: "IF TRUE THEN 1".to_string()
            }
        );
    }

    #[test]
    fn test_split_rule() {
        assert_eq!(
            split_rule("IF a == 'x' THEN DROP").unwrap(),
            ("a == 'x'".to_string(), "DROP".to_string())
        );
        assert_eq!(
            split_rule("IF\ta > 1   THEN  goto('b')").unwrap(),
            ("a > 1".to_string(), "goto('b')".to_string())
        );
        assert!(matches!(
            split_rule("WHEN a THEN b"),
            Err(RuleParseError::MalformedRule(_))
        ));
        assert!(split_rule("IF a THEN").is_err());
    }

    #[test]
    fn test_parse_rule_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RULES.as_bytes()).unwrap();
        let sets = parse_rule_file(file.path()).unwrap();
        assert_eq!(sets.len(), 2);

        let missing = parse_rule_file("/definitely/not/here.rules");
        assert!(matches!(missing, Err(RuleParseError::Io { .. })));
    }
}
