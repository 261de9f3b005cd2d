//! Assertion parser
//!
//! `assert <actual> <operator> <expected>`. Neither operand may contain
//! the operator token, so the split scans left to right for the first
//! whitespace-delimited token matching a known operator, skipping tokens
//! inside quotes or brackets. Type-predicate operators (`isInt` and
//! friends) take no expected operand.

use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::Error;
use crate::execution::{is_operator, AssertRunner, Runner, Value};
use crate::reading::{Line, LineReader};

use super::{DirectiveParser, ParserRegistry};

pub struct AssertParser;

impl DirectiveParser for AssertParser {
    fn is_applicable(&self, line: &Line) -> bool {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"^\s*assert(\s|$)").expect("static regex"))
            .is_match(&line.content)
    }

    fn parse(
        &self,
        line: Line,
        _reader: &mut LineReader,
        _registry: &Rc<ParserRegistry>,
    ) -> Result<Vec<Runner>, Error> {
        let text = line
            .content
            .trim()
            .strip_prefix("assert")
            .unwrap_or("")
            .trim()
            .to_string();

        let Some((actual, operator, expected)) = split_on_operator(&text) else {
            return Err(Error::syntax(
                format!("No known operator in assertion: {text}"),
                &line,
            ));
        };
        if actual.is_empty() {
            return Err(Error::syntax("Assertion is missing its actual operand", &line));
        }

        Ok(vec![Runner::Assert(AssertRunner {
            line,
            actual: Value::new(actual),
            operator,
            expected: Value::new(expected),
        })])
    }
}

/// First whitespace-delimited token, outside quotes and brackets, that
/// matches a known operator. Returns (actual, operator, expected).
fn split_on_operator(text: &str) -> Option<(String, String, String)> {
    for (start, end) in token_spans(text) {
        let token = &text[start..end];
        if is_operator(token) {
            return Some((
                text[..start].trim().to_string(),
                token.to_string(),
                text[end..].trim().to_string(),
            ));
        }
    }
    None
}

/// Byte spans of whitespace-delimited tokens at the top level: whitespace
/// inside double quotes or brackets does not break a token.
fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() && !in_string && depth == 0 {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
            escaped = false;
            continue;
        }
        if start.is_none() {
            start = Some(i);
        }
        match c {
            '"' if !escaped => in_string = !in_string,
            '[' | '{' if !in_string => depth += 1,
            ']' | '}' if !in_string => depth = depth.saturating_sub(1),
            _ => {}
        }
        escaped = c == '\\' && !escaped;
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::super::test_support::parse_script;
    use super::*;

    fn parts(content: &str) -> (String, String, String) {
        let mut runners = parse_script(content).unwrap();
        match runners.remove(0) {
            Runner::Assert(a) => (a.actual.expression, a.operator, a.expected.expression),
            _ => panic!("expected assert runner"),
        }
    }

    #[test]
    fn test_simple_split() {
        assert_eq!(
            parts("assert status === 200\n"),
            ("status".into(), "===".into(), "200".into())
        );
    }

    #[test]
    fn test_operands_with_spaces() {
        assert_eq!(
            parts("assert jsonpath $.name, text == \"John Doe\"\n"),
            (
                "jsonpath $.name, text".into(),
                "==".into(),
                "\"John Doe\"".into()
            )
        );
    }

    #[test]
    fn test_operator_token_inside_quotes_is_skipped() {
        assert_eq!(
            parts("assert body contains \"a == b\"\n"),
            ("body".into(), "contains".into(), "\"a == b\"".into())
        );
    }

    #[test]
    fn test_collection_operand() {
        assert_eq!(
            parts("assert status in [200, 201, 204]\n"),
            ("status".into(), "in".into(), "[200, 201, 204]".into())
        );
    }

    #[test]
    fn test_predicate_without_expected_operand() {
        assert_eq!(
            parts("assert jsonpath $.age isInt\n"),
            ("jsonpath $.age".into(), "isInt".into(), String::new())
        );
    }

    #[test]
    fn test_missing_operator_is_syntax_error() {
        assert!(matches!(
            parse_script("assert status equals 200\n"),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn test_token_spans_respect_brackets() {
        let text = r#"x in [1, 2] y"#;
        let tokens: Vec<&str> = token_spans(text)
            .into_iter()
            .map(|(s, e)| &text[s..e])
            .collect();
        assert_eq!(tokens, vec!["x", "in", "[1, 2]", "y"]);
    }
}
