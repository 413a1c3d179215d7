// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

use crate::config::PluginContext;
use crate::engine::Payload;
use crate::errors::NodeError;
use crate::traits::{Outcome, Processor};

pub const NAME: &str = "change_case";

/// Words kept lowercase by title case unless they lead the text.
const SMALL_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Case {
    Upper,
    Lower,
    /// First letter of each word capitalized.
    Proper,
    /// Proper case, except for articles and short prepositions.
    Title,
}

/// Configuration for the change case transform
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChangeCaseArgs {
    pub case: Case,
    /// Only rewrite these keys of an object payload. All string values when unset.
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

/// Rewrites the case of string payloads and of string values in object payloads.
pub struct ChangeCaseProcessor {
    args: ChangeCaseArgs,
}

impl ChangeCaseProcessor {
    pub fn new(args: ChangeCaseArgs) -> Self {
        Self { args }
    }

    pub fn upper() -> Self {
        Self::new(ChangeCaseArgs {
            case: Case::Upper,
            fields: None,
        })
    }

    pub fn from_context(ctx: PluginContext<'_>) -> Result<Box<dyn Processor>, NodeError> {
        Ok(Box::new(Self::new(ctx.parse_args()?)))
    }

    fn wants(&self, key: &str) -> bool {
        match &self.args.fields {
            Some(fields) => fields.iter().any(|f| f == key),
            None => true,
        }
    }
}

impl Processor for ChangeCaseProcessor {
    fn process(&mut self, payload: &Payload) -> Result<Outcome, NodeError> {
        let case = self.args.case;
        match payload {
            Payload::String(text) => Ok(Outcome::Update(Payload::String(convert(text, case)))),
            Payload::Object(map) => {
                let mut out = map.clone();
                for (key, value) in out.iter_mut() {
                    if let Payload::String(text) = value {
                        if self.wants(key) {
                            *text = convert(text, case);
                        }
                    }
                }
                Ok(Outcome::Update(Payload::Object(out)))
            }
            _ => Ok(Outcome::Continue),
        }
    }
}

pub fn convert(input: &str, case: Case) -> String {
    match case {
        Case::Upper => input.to_uppercase(),
        Case::Lower => input.to_lowercase(),
        Case::Proper => input
            .split_whitespace()
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" "),
        Case::Title => input
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| {
                let lower = word.to_lowercase();
                if i > 0 && SMALL_WORDS.contains(&lower.as_str()) {
                    lower
                } else {
                    capitalize(word)
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
    }
}
