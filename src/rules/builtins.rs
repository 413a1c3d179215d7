// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Actions bound in the global scope of every [`crate::rules::Ruler`].

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::EvalError;
use crate::rules::value::{Action, Value};

pub const EXIST: &str = "exist";
pub const RE_MATCH: &str = "re_match";
pub const NUM_IN_RANGE: &str = "num_in_range";
pub const IP_IN_NET: &str = "ip_in_net";
pub const GOTO: &str = "goto";

/// Compiled `re_match` patterns are kept up to this many, then dropped wholesale.
const REGEX_CACHE_LIMIT: usize = 256;

static REGEX_CACHE: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Every built-in action, ready to be bound into a global scope.
pub fn builtin_actions() -> Vec<Action> {
    vec![
        Action::new(EXIST, exist),
        Action::new(RE_MATCH, re_match),
        Action::new(NUM_IN_RANGE, num_in_range),
        Action::new(IP_IN_NET, ip_in_net),
        Action::new(GOTO, goto),
    ]
}

fn arity<'a, const N: usize>(name: &str, args: &'a [Value]) -> Result<&'a [Value; N], EvalError> {
    args.try_into().map_err(|_| {
        EvalError::action(name, format!("expects {} argument(s), got {}", N, args.len()))
    })
}

fn exist(args: &[Value]) -> Result<Value, EvalError> {
    let [value] = arity::<1>(EXIST, args)?;
    Ok(Value::Bool(value.is_truthy()))
}

/// Regex match anchored at the start of the subject.
fn re_match(args: &[Value]) -> Result<Value, EvalError> {
    let [pattern, subject] = arity::<2>(RE_MATCH, args)?;
    let (Some(pattern), Some(subject)) = (pattern.as_str(), subject.as_str()) else {
        return Ok(Value::Bool(false));
    };
    Ok(Value::Bool(anchored_regex(pattern)?.is_match(subject)))
}

fn anchored_regex(pattern: &str) -> Result<Regex, EvalError> {
    let mut cache = REGEX_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(&format!("^(?:{})", pattern))
        .map_err(|e| EvalError::action(RE_MATCH, e.to_string()))?;
    if cache.len() >= REGEX_CACHE_LIMIT {
        cache.clear();
    }
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

fn num_in_range(args: &[Value]) -> Result<Value, EvalError> {
    let [value, low, high] = arity::<3>(NUM_IN_RANGE, args)?;
    match (value.as_f64(), low.as_f64(), high.as_f64()) {
        (Some(v), Some(lo), Some(hi)) => Ok(Value::Bool(lo <= v && v <= hi)),
        _ => Err(EvalError::action(NUM_IN_RANGE, "all arguments must be numeric")),
    }
}

fn ip_in_net(args: &[Value]) -> Result<Value, EvalError> {
    let [ip, net] = arity::<2>(IP_IN_NET, args)?;
    let (Some(ip), Some(net)) = (ip.as_str(), net.as_str()) else {
        return Err(EvalError::action(IP_IN_NET, "arguments must be strings"));
    };
    let ip: Ipv4Addr = ip
        .parse()
        .map_err(|_| EvalError::action(IP_IN_NET, format!("'{}' is not an IPv4 address", ip)))?;
    let (network, prefix) = parse_cidr(net)?;
    let mask = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    Ok(Value::Bool(u32::from(ip) & mask == u32::from(network) & mask))
}

fn parse_cidr(net: &str) -> Result<(Ipv4Addr, u32), EvalError> {
    let malformed = || EvalError::action(IP_IN_NET, format!("'{}' is not an a.b.c.d/len network", net));
    let (addr, prefix) = net.split_once('/').unwrap_or((net, "32"));
    let addr: Ipv4Addr = addr.parse().map_err(|_| malformed())?;
    let prefix: u32 = prefix.parse().map_err(|_| malformed())?;
    if prefix > 32 {
        return Err(malformed());
    }
    Ok((addr, prefix))
}

fn goto(args: &[Value]) -> Result<Value, EvalError> {
    match arity::<1>(GOTO, args)? {
        [Value::Str(target)] => Ok(Value::Goto(target.clone())),
        [other] => Err(EvalError::action(
            GOTO,
            format!("target must be a string, got {}", other.type_name()),
        )),
    }
}
