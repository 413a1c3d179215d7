// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Tokenizer for rule conditions and actions.
//!
//! The lexer is a pull-based scanner: [`Lexer::next_token`] returns
//! `Ok(None)` at end of input, so callers stop on an explicit end-of-input
//! check. The same lexer can be rewound with [`Lexer::reset`].
//!
//! Two modes exist. In normal mode each call yields one token. When an
//! identifier is immediately followed by `(`, the lexer switches into call
//! mode: it consumes arguments (literals, identifiers and nested calls) up to
//! the matching `)` and folds the whole construct into one [`Token::Call`].
//!
//! ```text
//! re_match('^a', name) && !exist(tags)
//! └── Call(re_match, [Str, Ident]) Op(&&) Op(!) Call(exist, [Ident])
//! ```
//!
//! Spaces, tabs, newlines and commas separate tokens; `#` starts a comment
//! running to the end of the line.

use crate::errors::LexError;
use crate::rules::token::{Op, Token};

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Rewind to the beginning of the input.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Scan the next token, `Ok(None)` once the input is exhausted.
    pub fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_ignored();
        let Some(b) = self.peek() else {
            return Ok(None);
        };
        let start = self.pos;

        let token = match b {
            b'(' => {
                self.pos += 1;
                Token::LParen
            }
            b')' => {
                self.pos += 1;
                Token::RParen
            }
            b'"' | b'\'' => self.scan_string(b)?,
            b'0'..=b'9' => self.scan_number()?,
            b if is_ident_start(b) => self.scan_word()?,
            _ => match self.scan_operator() {
                Some(op) => Token::Operator(op),
                None => {
                    let ch = self.src[start..].chars().next().unwrap_or('\0');
                    return Err(LexError::UnexpectedChar { ch, pos: start });
                }
            },
        };
        Ok(Some(token))
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn skip_ignored(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' | b',' => self.pos += 1,
                b'#' => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_string(&mut self, quote: u8) -> Result<Token, LexError> {
        let start = self.pos;
        self.pos += 1;
        let body_start = self.pos;
        while let Some(b) = self.peek() {
            if b == quote {
                let body = self.src[body_start..self.pos].to_string();
                self.pos += 1;
                return Ok(Token::Str(body));
            }
            self.pos += 1;
        }
        Err(LexError::UnterminatedString { pos: start })
    }

    fn scan_number(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        self.eat_digits();
        let is_float = self.peek() == Some(b'.')
            && matches!(self.peek_at(1), Some(b) if b.is_ascii_digit());
        if is_float {
            self.pos += 1;
            self.eat_digits();
        }
        let text = &self.src[start..self.pos];
        let out_of_range = || LexError::NumberOutOfRange {
            text: text.to_string(),
            pos: start,
        };
        if is_float {
            text.parse::<f64>().map(Token::Float).map_err(|_| out_of_range())
        } else {
            text.parse::<i64>().map(Token::Integer).map_err(|_| out_of_range())
        }
    }

    fn eat_digits(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    /// Identifiers (`a.b-c`, `@meta`), boolean literals and calls.
    fn scan_word(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        self.eat_segment();
        while self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b) if is_ident_start(b)) {
            self.pos += 1;
            self.eat_segment();
        }
        let word = &self.src[start..self.pos];

        if self.peek() == Some(b'(') && is_call_name(word) {
            self.pos += 1;
            return self.scan_call(word.to_string(), start);
        }

        Ok(match word {
            "TRUE" => Token::Bool(true),
            "FALSE" => Token::Bool(false),
            _ => Token::Identifier(word.to_string()),
        })
    }

    fn eat_segment(&mut self) {
        self.pos += 1;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_' || b == b'-') {
            self.pos += 1;
        }
    }

    /// Call mode: everything up to the matching `)` becomes the argument list.
    fn scan_call(&mut self, name: String, start: usize) -> Result<Token, LexError> {
        let mut args = Vec::new();
        loop {
            self.skip_ignored();
            match self.peek() {
                None => return Err(LexError::UnterminatedCall { name, pos: start }),
                Some(b')') => {
                    self.pos += 1;
                    return Ok(Token::Call { name, args });
                }
                Some(_) => {
                    let arg_pos = self.pos;
                    match self.next_token()? {
                        Some(token) if token.is_operand() => args.push(token),
                        _ => {
                            return Err(LexError::InvalidCallArgument {
                                name,
                                pos: arg_pos,
                            })
                        }
                    }
                }
            }
        }
    }

    fn scan_operator(&mut self) -> Option<Op> {
        let next_is_eq = self.peek_at(1) == Some(b'=');
        let (op, width) = match self.peek()? {
            b'!' if next_is_eq => (Op::Ne, 2),
            b'!' => (Op::Not, 1),
            b'=' if next_is_eq => (Op::Eq, 2),
            b'=' => (Op::Assign, 1),
            b'>' if next_is_eq => (Op::Ge, 2),
            b'>' => (Op::Gt, 1),
            b'<' if next_is_eq => (Op::Le, 2),
            b'<' => (Op::Lt, 1),
            b'~' if next_is_eq => (Op::In, 2),
            b'&' if self.peek_at(1) == Some(b'&') => (Op::And, 2),
            b'|' if self.peek_at(1) == Some(b'|') => (Op::Or, 2),
            b'+' => (Op::Add, 1),
            b'-' => (Op::Sub, 1),
            b'*' => (Op::Mul, 1),
            b'/' => (Op::Div, 1),
            _ => return None,
        };
        self.pos += width;
        Some(op)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => None,
            Err(e) => {
                // fuse after the first error
                self.pos = self.src.len();
                Some(Err(e))
            }
        }
    }
}

/// Tokenize a whole condition or action.
pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(src).collect()
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'@'
}

fn is_call_name(word: &str) -> bool {
    let mut bytes = word.bytes();
    matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
