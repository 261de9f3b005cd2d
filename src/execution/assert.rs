//! Assertion evaluation
//!
//! `assert <actual> <operator> <expected>`. The operand order in the
//! directive is actual-then-expected; resolution happens expected-first so
//! a side-effecting expected operand (a `duration` call, say) is measured
//! before the actual is read. A false predicate is a counted, reported
//! failure; it becomes a fatal [`Error::Assertion`] only under the
//! fail-fast config flag.

use md5::Md5;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::errors::Error;
use crate::reading::Line;

use super::context::Context;
use super::val::Val;
use super::value::Value;

/// Operators recognized by the assertion parser, matched case-insensitively.
pub const OPERATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<>", ">=", "<=", ">", "<", "in", "nin", "isint", "isstring",
    "isbool", "isarray", "isfloat", "contains", "startswith", "endswith", "regex", "sha256", "md5",
];

pub fn is_operator(token: &str) -> bool {
    let token = token.to_lowercase();
    OPERATORS.iter().any(|op| *op == token)
}

pub struct AssertRunner {
    pub line: Line,
    pub actual: Value,
    pub operator: String,
    pub expected: Value,
}

impl AssertRunner {
    pub(super) fn run(&self, ctx: &mut Context) -> Result<(), Error> {
        let expected = self.expected.resolve(&self.line, ctx)?;
        let actual = self.actual.resolve(&self.line, ctx)?;

        let passed = self.evaluate(&actual, &expected)?;

        let expected_desc = format!("{} {}", self.operator, expected.stringify());
        let actual_desc = actual.stringify();

        if passed {
            ctx.assertions_passed += 1;
            ctx.reporter
                .assertion_success(&self.line, &expected_desc, &actual_desc);
            return Ok(());
        }

        ctx.assertions_failed += 1;
        ctx.reporter
            .assertion_failure(&self.line, &expected_desc, &actual_desc);

        if ctx.config.fail_on_assertion_error {
            return Err(Error::Assertion {
                line: self.line.clone(),
                expected: expected_desc,
                actual: actual_desc,
            });
        }
        Ok(())
    }

    fn evaluate(&self, actual: &Val, expected: &Val) -> Result<bool, Error> {
        use std::cmp::Ordering::{Equal, Greater, Less};

        Ok(match self.operator.to_lowercase().as_str() {
            "===" => actual == expected,
            "!==" => actual != expected,
            "==" => actual.loose_eq(expected),
            "!=" | "<>" => !actual.loose_eq(expected),
            ">" => actual.compare(expected) == Some(Greater),
            ">=" => matches!(actual.compare(expected), Some(Greater | Equal)),
            "<" => actual.compare(expected) == Some(Less),
            "<=" => matches!(actual.compare(expected), Some(Less | Equal)),
            "in" => self.membership(actual, expected)?,
            "nin" => !self.membership(actual, expected)?,
            "isint" => match actual {
                Val::Int(_) => true,
                Val::Str(s) => s.trim().parse::<i64>().is_ok(),
                _ => false,
            },
            "isfloat" => match actual {
                Val::Float(_) => true,
                Val::Str(s) => {
                    s.trim().parse::<f64>().is_ok() && s.trim().parse::<i64>().is_err()
                }
                _ => false,
            },
            "isstring" => matches!(actual, Val::Str(_)),
            "isbool" => match actual {
                // the boolean itself is the verdict, so `assert false isBool`
                // fails
                Val::Bool(b) => *b,
                // boolean-shaped strings count as booleans
                Val::Str(s) => {
                    let s = s.trim();
                    s.eq_ignore_ascii_case("true")
                        || s.eq_ignore_ascii_case("false")
                        || s == "1"
                        || s == "0"
                }
                _ => false,
            },
            "isarray" => matches!(actual, Val::Map(_)),
            "contains" => match (actual, expected) {
                (Val::Str(a), Val::Str(e)) => a.contains(e.as_str()),
                _ => false,
            },
            "startswith" => match (actual, expected) {
                (Val::Str(a), Val::Str(e)) => a.starts_with(e.as_str()),
                _ => false,
            },
            "endswith" => match (actual, expected) {
                (Val::Str(a), Val::Str(e)) => a.ends_with(e.as_str()),
                _ => false,
            },
            "regex" => match (actual, expected) {
                (Val::Str(a), Val::Str(e)) => {
                    let pattern = strip_delimiters(e);
                    let re = Regex::new(pattern).map_err(|err| {
                        Error::execution(
                            format!("invalid regex pattern [{pattern}]: {err}"),
                            &self.line,
                        )
                    })?;
                    re.is_match(a)
                }
                _ => false,
            },
            "sha256" => match (actual, expected) {
                (Val::Str(a), Val::Str(e)) => {
                    ct_eq(&format!("{:x}", Sha256::digest(a.as_bytes())), e)
                }
                _ => false,
            },
            "md5" => match (actual, expected) {
                (Val::Str(a), Val::Str(e)) => {
                    ct_eq(&format!("{:x}", Md5::digest(a.as_bytes())), e)
                }
                _ => false,
            },
            other => {
                return Err(Error::syntax(
                    format!("Unknown assert operator: {other}"),
                    &self.line,
                ))
            }
        })
    }

    /// `in` / `nin`: the expected operand must be a collection; membership
    /// uses loose equality against entry values.
    fn membership(&self, actual: &Val, expected: &Val) -> Result<bool, Error> {
        let Val::Map(entries) = expected else {
            return Err(Error::execution(
                format!(
                    "operator {} expects a collection operand, got {}",
                    self.operator,
                    expected.stringify()
                ),
                &self.line,
            ));
        };
        Ok(entries.iter().any(|(_, v)| actual.loose_eq(v)))
    }
}

/// PCRE-style patterns arrive wrapped in `/` delimiters; bare patterns
/// pass through.
fn strip_delimiters(pattern: &str) -> &str {
    pattern
        .strip_prefix('/')
        .and_then(|p| p.strip_suffix('/'))
        .unwrap_or(pattern)
}

/// Length check plus a full xor fold, so the comparison touches every byte
/// regardless of where the first mismatch sits.
fn ct_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}
