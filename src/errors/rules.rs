// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised by the rule language: lexing, evaluation, rule-file parsing
//! and rule-set registration.

use thiserror::Error;

/// Errors produced while turning rule text into tokens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("illegal character '{ch}' at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("call '{name}' opened at offset {pos} has no matching ')'")]
    UnterminatedCall { name: String, pos: usize },

    #[error("string literal opened at offset {pos} is not closed")]
    UnterminatedString { pos: usize },

    /// Call arguments are literals, identifiers or nested calls only.
    #[error("argument of call '{name}' at offset {pos} must be a literal, identifier or call")]
    InvalidCallArgument { name: String, pos: usize },

    #[error("number literal '{text}' at offset {pos} is out of range")]
    NumberOutOfRange { text: String, pos: usize },
}

/// Errors produced while evaluating a token sequence against an environment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unbalanced expression: {0}")]
    UnbalancedExpression(String),

    #[error("operator `{0}` is not supported")]
    UnknownOperator(String),

    #[error("operator `{op}` cannot be applied to {left} and {right}")]
    TypeMismatch {
        op: String,
        left: &'static str,
        right: &'static str,
    },

    #[error("unknown callee '{0}'")]
    UnknownCallee(String),

    #[error("'{name}' is a {kind}, not a callable")]
    NotCallable { name: String, kind: &'static str },

    #[error("action '{name}' failed: {reason}")]
    Action { name: String, reason: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in `{0}`")]
    Overflow(String),

    /// `goto` used as an operand instead of a whole condition or action.
    #[error("goto('{0}') must be a whole condition or action, not an operand")]
    GotoOperand(String),
}

impl EvalError {
    pub(crate) fn action(name: &str, reason: impl Into<String>) -> Self {
        EvalError::Action {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors produced while reading the line-oriented rule-file grammar.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleParseError {
    #[error("duplicate rule set '{name}' at line {line}")]
    DuplicateRuleSet { name: String, line: usize },

    #[error("rule at line {line} appears before any rule set header")]
    OrphanRule { line: usize },

    #[error("malformed rule at line {line}: `{text}`")]
    MalformedLine { line: usize, text: String },

    #[error("rule `{0}` does not have the shape `IF <condition> THEN <action>`")]
    MalformedRule(String),

    #[error("cannot read rule file {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Errors raised by a [`crate::rules::Ruler`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RulerError {
    #[error("cannot register rule set '{0}': already exists")]
    DuplicateRuleSet(String),

    #[error("cannot register action '{0}': name already bound")]
    DuplicateAction(String),

    #[error("rule set '{0}' does not exist")]
    NoSuchRuleSet(String),

    #[error("action '{0}' is not registered")]
    NoSuchAction(String),

    #[error("goto chain exceeded {0} nested rule sets")]
    GotoDepthExceeded(usize),

    #[error("in rule `{rule}`: {source}")]
    Lex {
        rule: String,
        #[source]
        source: LexError,
    },

    #[error(transparent)]
    Parse(#[from] RuleParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}
