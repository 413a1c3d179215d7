// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Operator-precedence evaluation of token sequences.
//!
//! The evaluator keeps one operand stack and one operator stack per nesting
//! level. `(` opens a fresh level, `)` reduces the current level to a single
//! value and pushes it onto the parent level.
//!
//! ```text
//! 2 + 3 * 4
//!   operands: [2]        operators: []
//!   operands: [2]        operators: [+]
//!   operands: [2, 3]     operators: [+, *]      (* binds tighter, pushed)
//!   end of input -> reduce * -> [2, 12] -> reduce + -> [14]
//! ```
//!
//! Identifiers and calls are resolved against the [`Environment`] while the
//! sequence is being evaluated, never earlier, so a compiled rule can be
//! evaluated against any number of environments.

use std::cmp::Ordering;

use crate::errors::EvalError;
use crate::rules::environment::Environment;
use crate::rules::token::{Op, Token};
use crate::rules::value::Value;

#[derive(Default)]
struct Level {
    operands: Vec<Value>,
    operators: Vec<Op>,
}

impl Level {
    fn reduce_top(&mut self) -> Result<(), EvalError> {
        let op = self
            .operators
            .pop()
            .ok_or_else(|| unbalanced("operator stack is empty"))?;
        let result = if op.is_unary() {
            let operand = self.pop_operand(op)?;
            apply_unary(op, operand)?
        } else {
            let right = self.pop_operand(op)?;
            let left = self.pop_operand(op)?;
            apply_binary(op, left, right)?
        };
        self.operands.push(result);
        Ok(())
    }

    fn pop_operand(&mut self, op: Op) -> Result<Value, EvalError> {
        self.operands
            .pop()
            .ok_or_else(|| unbalanced(format!("missing operand for `{}`", op)))
    }

    fn push_operator(&mut self, op: Op) -> Result<(), EvalError> {
        // prefix operators have nothing to their left to reduce
        if op.is_unary() {
            self.operators.push(op);
            return Ok(());
        }
        while let Some(&top) = self.operators.last() {
            if op.precedence() > top.precedence() {
                break;
            }
            self.reduce_top()?;
        }
        self.operators.push(op);
        Ok(())
    }

    /// Reduce everything left and return the single remaining operand.
    fn flush(mut self) -> Result<Value, EvalError> {
        while !self.operators.is_empty() {
            self.reduce_top()?;
        }
        match self.operands.len() {
            1 => Ok(self.operands.pop().unwrap_or(Value::Null)),
            0 => Err(unbalanced("empty expression")),
            n => Err(unbalanced(format!("{} operands left without operators", n))),
        }
    }
}

/// Evaluate `tokens` against `env`.
pub fn evaluate(env: &Environment, tokens: &[Token]) -> Result<Value, EvalError> {
    let mut levels: Vec<Level> = vec![Level::default()];

    for token in tokens {
        match token {
            Token::LParen => levels.push(Level::default()),
            Token::RParen => {
                if levels.len() < 2 {
                    return Err(unbalanced("unexpected ')'"));
                }
                let inner = levels.pop().unwrap_or_default().flush()?;
                current(&mut levels)?.operands.push(inner);
            }
            Token::Operator(op) => current(&mut levels)?.push_operator(*op)?,
            operand => {
                let value = resolve(env, operand)?;
                current(&mut levels)?.operands.push(value);
            }
        }
    }

    if levels.len() != 1 {
        return Err(unbalanced(format!("{} unclosed '('", levels.len() - 1)));
    }
    levels.pop().unwrap_or_default().flush()
}

fn current(levels: &mut [Level]) -> Result<&mut Level, EvalError> {
    levels
        .last_mut()
        .ok_or_else(|| unbalanced("no open nesting level"))
}

/// Value of a single operand token.
fn resolve(env: &Environment, token: &Token) -> Result<Value, EvalError> {
    match token {
        Token::Integer(i) => Ok(Value::Int(*i)),
        Token::Float(f) => Ok(Value::Float(*f)),
        Token::Str(s) => Ok(Value::Str(s.clone())),
        Token::Bool(b) => Ok(Value::Bool(*b)),
        Token::Null => Ok(Value::Null),
        Token::Identifier(name) => Ok(env.get_var(name).cloned().unwrap_or(Value::Null)),
        Token::Call { name, args } => {
            let action = match env.get_var(name) {
                Some(Value::Func(action)) => action.clone(),
                Some(other) => {
                    return Err(EvalError::NotCallable {
                        name: name.clone(),
                        kind: other.type_name(),
                    })
                }
                None => return Err(EvalError::UnknownCallee(name.clone())),
            };
            let values = args
                .iter()
                .map(|arg| evaluate(env, std::slice::from_ref(arg)))
                .collect::<Result<Vec<_>, _>>()?;
            action.call(&values)
        }
        Token::Operator(op) => Err(unbalanced(format!("operator `{}` used as operand", op))),
        Token::LParen | Token::RParen => Err(unbalanced("parenthesis used as operand")),
    }
}

fn unbalanced(detail: impl Into<String>) -> EvalError {
    EvalError::UnbalancedExpression(detail.into())
}

fn mismatch(op: Op, left: &Value, right: &Value) -> EvalError {
    EvalError::TypeMismatch {
        op: op.symbol().to_string(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

fn apply_unary(op: Op, operand: Value) -> Result<Value, EvalError> {
    if let Value::Goto(target) = operand {
        return Err(EvalError::GotoOperand(target));
    }
    match op {
        Op::Not => Ok(Value::Bool(match operand {
            Value::Bool(b) => !b,
            Value::Int(i) => i == 0,
            Value::Float(f) => f == 0.0,
            Value::Null => true,
            _ => false,
        })),
        other => Err(EvalError::UnknownOperator(other.symbol().to_string())),
    }
}

fn apply_binary(op: Op, left: Value, right: Value) -> Result<Value, EvalError> {
    if let Value::Goto(target) = left {
        return Err(EvalError::GotoOperand(target));
    }
    if let Value::Goto(target) = right {
        return Err(EvalError::GotoOperand(target));
    }
    match op {
        Op::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        Op::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
        Op::Eq => Ok(Value::Bool(left.loose_eq(&right))),
        Op::Ne => Ok(Value::Bool(!left.loose_eq(&right))),
        Op::Gt | Op::Ge | Op::Lt | Op::Le => {
            let ordering = compare(op, &left, &right)?;
            Ok(Value::Bool(match op {
                Op::Gt => ordering == Ordering::Greater,
                Op::Ge => ordering != Ordering::Less,
                Op::Lt => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            }))
        }
        Op::In => membership(op, &left, &right).map(Value::Bool),
        Op::Add => match (left, right) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (left, right) => arithmetic(op, &left, &right),
        },
        Op::Sub | Op::Mul | Op::Div => arithmetic(op, &left, &right),
        Op::Assign | Op::Not | Op::Dot | Op::Call | Op::Item => {
            Err(EvalError::UnknownOperator(op.symbol().to_string()))
        }
    }
}

fn compare(op: Op, left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| mismatch(op, left, right)),
            _ => Err(mismatch(op, left, right)),
        },
    }
}

/// `x ~= y`: x is a member of y.
fn membership(op: Op, item: &Value, container: &Value) -> Result<bool, EvalError> {
    match (item, container) {
        (_, Value::List(items)) => Ok(items.iter().any(|v| v.loose_eq(item))),
        (Value::Str(key), Value::Map(map)) => Ok(map.contains_key(key)),
        (Value::Str(needle), Value::Str(haystack)) => Ok(haystack.contains(needle.as_str())),
        _ => Err(mismatch(op, item, container)),
    }
}

fn arithmetic(op: Op, left: &Value, right: &Value) -> Result<Value, EvalError> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        let (a, b) = (*a, *b);
        let result = match op {
            Op::Add => a.checked_add(b),
            Op::Sub => a.checked_sub(b),
            Op::Mul => a.checked_mul(b),
            Op::Div if b == 0 => return Err(EvalError::DivisionByZero),
            Op::Div => a.checked_div(b),
            _ => return Err(EvalError::UnknownOperator(op.symbol().to_string())),
        };
        return result
            .map(Value::Int)
            .ok_or_else(|| EvalError::Overflow(op.symbol().to_string()));
    }

    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(mismatch(op, left, right));
    };
    match op {
        Op::Add => Ok(Value::Float(a + b)),
        Op::Sub => Ok(Value::Float(a - b)),
        Op::Mul => Ok(Value::Float(a * b)),
        Op::Div if b == 0.0 => Err(EvalError::DivisionByZero),
        Op::Div => Ok(Value::Float(a / b)),
        _ => Err(EvalError::UnknownOperator(op.symbol().to_string())),
    }
}
