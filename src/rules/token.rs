// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Operators known to the precedence table.
///
/// The table covers more symbols than the lexer produces: `=`, `.`, call and
/// item access have a precedence slot but no evaluation rule, so applying one
/// fails with [`crate::errors::EvalError::UnknownOperator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Assign,
    Or,
    And,
    Eq,
    Ne,
    In,
    Gt,
    Ge,
    Lt,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    Not,
    Dot,
    Call,
    Item,
}

impl Op {
    /// Precedence level, low to high.
    pub fn precedence(self) -> u8 {
        match self {
            Op::Assign => 0,
            Op::Or => 1,
            Op::And => 2,
            Op::Eq | Op::Ne | Op::In => 3,
            Op::Gt | Op::Ge | Op::Lt | Op::Le => 4,
            Op::Add | Op::Sub => 5,
            Op::Mul | Op::Div => 6,
            Op::Not => 7,
            Op::Dot => 8,
            Op::Call | Op::Item => 9,
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Op::Not)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Op::Assign => "=",
            Op::Or => "||",
            Op::And => "&&",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::In => "~=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Not => "!",
            Op::Dot => ".",
            Op::Call => "call",
            Op::Item => "item",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A lexed unit of rule text.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Identifier(String),
    /// `name(arg, ...)` folded into one token; arguments may be calls too.
    Call { name: String, args: Vec<Token> },
    Operator(Op),
    LParen,
    RParen,
}

impl Token {
    /// True for tokens that stand for a value on their own.
    pub fn is_operand(&self) -> bool {
        matches!(
            self,
            Token::Integer(_)
                | Token::Float(_)
                | Token::Str(_)
                | Token::Bool(_)
                | Token::Null
                | Token::Identifier(_)
                | Token::Call { .. }
        )
    }
}
