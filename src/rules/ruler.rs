// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Named rule sets evaluated first-match-wins.
//!
//! A [`Ruler`] owns compiled rule sets and a global scope of actions and
//! constants. [`Ruler::entry`] evaluates one rule set against an input
//! mapping inside a private [`Environment`], so a single `Ruler` can be
//! shared by any number of threads.
//!
//! # Control transfer
//!
//! When a condition or an action evaluates to the value produced by
//! `goto('name')`, evaluation continues in rule set `name` using the same
//! environment. If that set has no matching rule, scanning resumes with the
//! next rule of the set that issued the transfer. A `goto` used as an
//! operand (`goto('b') && x`) is an evaluation error.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{EvalError, RulerError};
use crate::observability::messages::ruler::{GotoFollowed, RuleSetRegistered};
use crate::observability::messages::StructuredLog;
use crate::rules::builtins::builtin_actions;
use crate::rules::environment::{Environment, Scope};
use crate::rules::evaluator::evaluate;
use crate::rules::lexer::tokenize;
use crate::rules::rule_file::{parse_rules, split_rule};
use crate::rules::token::Token;
use crate::rules::value::{Action, Value};

/// Nested `goto` transfers allowed before evaluation is aborted.
pub const MAX_GOTO_DEPTH: usize = 32;

/// A compiled `IF <condition> THEN <action>` line.
#[derive(Debug, Clone)]
pub struct Rule {
    text: String,
    condition: Vec<Token>,
    action: Vec<Token>,
}

impl Rule {
    pub fn compile(line: &str) -> Result<Self, RulerError> {
        let (condition, action) = split_rule(line)?;
        let lex = |src: &str| {
            let tokens = tokenize(src).map_err(|source| RulerError::Lex {
                rule: line.to_string(),
                source,
            })?;
            check_parens(&tokens)?;
            Ok::<_, RulerError>(tokens)
        };
        Ok(Self {
            text: line.trim().to_string(),
            condition: lex(&condition)?,
            action: lex(&action)?,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Parenthesis nesting must resolve; caught at registration rather than on
/// the first event.
fn check_parens(tokens: &[Token]) -> Result<(), EvalError> {
    let mut depth = 0usize;
    for token in tokens {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| EvalError::UnbalancedExpression("unexpected ')'".into()))?
            }
            _ => {}
        }
    }
    if depth == 0 {
        Ok(())
    } else {
        Err(EvalError::UnbalancedExpression(format!("{} unclosed '('", depth)))
    }
}

/// Result of [`Ruler::entry`].
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The first truthy rule: its action value and its source text.
    Matched { value: Value, rule: String },
    NoMatch,
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Matched { .. })
    }
}

/// Outcome of firing one rule.
enum RuleOutcome {
    Matched(Value),
    NoMatch,
    GotoTarget(String),
}

#[derive(Debug, Clone)]
pub struct Ruler {
    rule_sets: HashMap<String, Arc<[Rule]>>,
    globals: Arc<Scope>,
}

impl Default for Ruler {
    fn default() -> Self {
        Self::new()
    }
}

impl Ruler {
    /// A ruler with the built-in actions bound.
    pub fn new() -> Self {
        let mut env = Environment::new();
        for action in builtin_actions() {
            env.set_global_var(action.name().to_string(), Value::Func(action));
        }
        Self {
            rule_sets: HashMap::new(),
            globals: env.globals().clone(),
        }
    }

    /// Compile and register `rules` under `name`.
    ///
    /// Every line is compiled before anything is registered, so a failing
    /// line leaves the ruler unchanged.
    pub fn register_rule_set<I, S>(&mut self, name: &str, rules: I) -> Result<(), RulerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.rule_sets.contains_key(name) {
            return Err(RulerError::DuplicateRuleSet(name.to_string()));
        }
        let compiled = rules
            .into_iter()
            .map(|line| Rule::compile(line.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        RuleSetRegistered {
            rule_set: name,
            rule_count: compiled.len(),
        }
        .log();
        self.rule_sets.insert(name.to_string(), compiled.into());
        Ok(())
    }

    /// Parse rule-file text and register every rule set in it.
    pub fn load_rules(&mut self, text: &str) -> Result<(), RulerError> {
        for (name, rules) in parse_rules(text)? {
            self.register_rule_set(&name, rules)?;
        }
        Ok(())
    }

    pub fn register_action<F>(&mut self, name: &str, func: F) -> Result<(), RulerError>
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.bind_global(name, Value::Func(Action::new(name, func)))
    }

    /// Bind a named constant, such as the filter verdicts.
    pub fn register_constant(&mut self, name: &str, value: Value) -> Result<(), RulerError> {
        self.bind_global(name, value)
    }

    fn bind_global(&mut self, name: &str, value: Value) -> Result<(), RulerError> {
        if self.globals.contains_key(name) {
            return Err(RulerError::DuplicateAction(name.to_string()));
        }
        Arc::make_mut(&mut self.globals).insert(name.to_string(), value);
        Ok(())
    }

    pub fn clear_rule_set(&mut self, name: &str) -> Result<(), RulerError> {
        self.rule_sets
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RulerError::NoSuchRuleSet(name.to_string()))
    }

    pub fn clear_action(&mut self, name: &str) -> Result<(), RulerError> {
        Arc::make_mut(&mut self.globals)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RulerError::NoSuchAction(name.to_string()))
    }

    pub fn has_rule_set(&self, name: &str) -> bool {
        self.rule_sets.contains_key(name)
    }

    pub fn rule_set_names(&self) -> impl Iterator<Item = &str> {
        self.rule_sets.keys().map(String::as_str)
    }

    /// Evaluate rule set `name` with `input` bound in a fresh scope.
    pub fn entry<I, K>(&self, name: &str, input: I) -> Result<Verdict, RulerError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut env = Environment::with_globals(Arc::clone(&self.globals));
        env.push();
        for (key, value) in input {
            env.set_var(key, value);
        }
        let result = self.run_set(&env, name, 0);
        env.pop();
        result
    }

    fn run_set(&self, env: &Environment, name: &str, depth: usize) -> Result<Verdict, RulerError> {
        let rules = self
            .rule_sets
            .get(name)
            .ok_or_else(|| RulerError::NoSuchRuleSet(name.to_string()))?;

        for rule in rules.iter() {
            match fire(env, rule)? {
                RuleOutcome::NoMatch => continue,
                RuleOutcome::Matched(value) => {
                    return Ok(Verdict::Matched {
                        value,
                        rule: rule.text.clone(),
                    })
                }
                RuleOutcome::GotoTarget(target) => {
                    if depth >= MAX_GOTO_DEPTH {
                        return Err(RulerError::GotoDepthExceeded(MAX_GOTO_DEPTH));
                    }
                    GotoFollowed {
                        from: name,
                        to: &target,
                        depth: depth + 1,
                    }
                    .log();
                    match self.run_set(env, &target, depth + 1)? {
                        matched @ Verdict::Matched { .. } => return Ok(matched),
                        Verdict::NoMatch => continue,
                    }
                }
            }
        }
        Ok(Verdict::NoMatch)
    }
}

fn fire(env: &Environment, rule: &Rule) -> Result<RuleOutcome, EvalError> {
    match evaluate(env, &rule.condition)? {
        Value::Goto(target) => return Ok(RuleOutcome::GotoTarget(target)),
        condition if !condition.is_truthy() => return Ok(RuleOutcome::NoMatch),
        _ => {}
    }
    Ok(match evaluate(env, &rule.action)? {
        Value::Goto(target) => RuleOutcome::GotoTarget(target),
        value => RuleOutcome::Matched(value),
    })
}
