// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The embedded rule language.
//!
//! Rule text flows through three stages:
//!
//! * [`lexer`] - turns condition and action text into [`Token`]s, folding
//!   `name(args)` into a single call token
//! * [`evaluator`] - reduces a token sequence to a [`Value`] with a
//!   per-nesting-level operator-precedence stack
//! * [`ruler`] - holds named rule sets and evaluates them first-match-wins,
//!   following `goto` transfers between sets
//!
//! ```rust
//! use the_rivulet::rules::{Ruler, Value, Verdict};
//!
//! let mut ruler = Ruler::new();
//! ruler
//!     .register_rule_set("severity", ["IF level >= 3 THEN 'alert'", "IF TRUE THEN 'info'"])
//!     .unwrap();
//!
//! let verdict = ruler.entry("severity", [("level", Value::Int(4))]).unwrap();
//! assert!(matches!(verdict, Verdict::Matched { value: Value::Str(ref s), .. } if s == "alert"));
//! ```

pub mod builtins;
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod rule_file;
pub mod ruler;
pub mod token;
pub mod value;

pub use environment::{Environment, Scope};
pub use evaluator::evaluate;
pub use lexer::{tokenize, Lexer};
pub use rule_file::{parse_rule_file, parse_rules, split_rule};
pub use ruler::{Rule, Ruler, Verdict};
pub use token::{Op, Token};
pub use value::{Action, Value};
