//! Single-line directive parsers
//!
//! Everything here parses one line into one runner: comments, `config`,
//! `include`, `echo`, `duration`, and the catch-all `name = value`
//! variable binding.

use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::Error;
use crate::execution::{
    CommentRunner, ConfigRunner, DurationRunner, EchoRunner, IncludeRunner, Runner, Value,
    VariableRunner,
};
use crate::reading::{Line, LineReader};

use super::{DirectiveParser, ParserRegistry};

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

pub struct CommentParser;

impl DirectiveParser for CommentParser {
    fn is_applicable(&self, line: &Line) -> bool {
        line.content.trim_start().starts_with('#')
    }

    fn parse(
        &self,
        line: Line,
        _reader: &mut LineReader,
        _registry: &Rc<ParserRegistry>,
    ) -> Result<Vec<Runner>, Error> {
        Ok(vec![Runner::Comment(CommentRunner { line })])
    }
}

pub struct ConfigParser;

impl ConfigParser {
    fn pattern() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        regex(&RE, r"^\s*config\s+([A-Za-z0-9_]+)\s*=\s*(.*?)\s*$")
    }
}

impl DirectiveParser for ConfigParser {
    fn is_applicable(&self, line: &Line) -> bool {
        static RE: OnceLock<Regex> = OnceLock::new();
        regex(&RE, r"^\s*config(\s|$)").is_match(&line.content)
    }

    fn parse(
        &self,
        line: Line,
        _reader: &mut LineReader,
        _registry: &Rc<ParserRegistry>,
    ) -> Result<Vec<Runner>, Error> {
        let caps = Self::pattern()
            .captures(&line.content)
            .ok_or_else(|| Error::syntax("Invalid config syntax, expected: config <name> = <value>", &line))?;
        let name = caps[1].to_string();
        let value = Value::new(&caps[2]);
        Ok(vec![Runner::Config(ConfigRunner { line, name, value })])
    }
}

pub struct IncludeParser;

impl DirectiveParser for IncludeParser {
    fn is_applicable(&self, line: &Line) -> bool {
        static RE: OnceLock<Regex> = OnceLock::new();
        regex(&RE, r"^\s*include(\s|$)").is_match(&line.content)
    }

    fn parse(
        &self,
        line: Line,
        _reader: &mut LineReader,
        registry: &Rc<ParserRegistry>,
    ) -> Result<Vec<Runner>, Error> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let caps = regex(&RE, r"^\s*include\s+(.+?)\s*$")
            .captures(&line.content)
            .ok_or_else(|| Error::syntax("Invalid include syntax, expected: include <path>", &line))?;
        let path = caps[1].to_string();
        Ok(vec![Runner::Include(IncludeRunner {
            line,
            path,
            registry: registry.clone(),
        })])
    }
}

pub struct EchoParser;

impl DirectiveParser for EchoParser {
    fn is_applicable(&self, line: &Line) -> bool {
        static RE: OnceLock<Regex> = OnceLock::new();
        regex(&RE, r"^\s*echo(\s|$)").is_match(&line.content)
    }

    fn parse(
        &self,
        line: Line,
        _reader: &mut LineReader,
        _registry: &Rc<ParserRegistry>,
    ) -> Result<Vec<Runner>, Error> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let text = regex(&RE, r"^\s*echo\s+(.*?)\s*$")
            .captures(&line.content)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        Ok(vec![Runner::Echo(EchoRunner {
            line,
            text: Value::new(text),
        })])
    }
}

pub struct DurationParser;

impl DirectiveParser for DurationParser {
    fn is_applicable(&self, line: &Line) -> bool {
        static RE: OnceLock<Regex> = OnceLock::new();
        regex(&RE, r"^\s*duration(\s|$)").is_match(&line.content)
    }

    fn parse(
        &self,
        line: Line,
        _reader: &mut LineReader,
        _registry: &Rc<ParserRegistry>,
    ) -> Result<Vec<Runner>, Error> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let format = regex(&RE, r"^\s*duration\s+(.+?)\s*$")
            .captures(&line.content)
            .map(|c| c[1].to_string());
        Ok(vec![Runner::Duration(DurationRunner { line, format })])
    }
}

/// `name = value`. Registered last: anything shaped like an assignment that
/// no other parser claimed becomes a variable binding.
pub struct VariableParser;

impl VariableParser {
    fn pattern() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        regex(&RE, r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*?)\s*$")
    }
}

impl DirectiveParser for VariableParser {
    fn is_applicable(&self, line: &Line) -> bool {
        Self::pattern().is_match(&line.content)
    }

    fn parse(
        &self,
        line: Line,
        _reader: &mut LineReader,
        _registry: &Rc<ParserRegistry>,
    ) -> Result<Vec<Runner>, Error> {
        let caps = Self::pattern()
            .captures(&line.content)
            .ok_or_else(|| Error::syntax("Invalid variable syntax, expected: <name> = <value>", &line))?;
        let name = caps[1].to_string();
        let value = Value::new(&caps[2]);
        Ok(vec![Runner::Variable(VariableRunner { line, name, value })])
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::parse_script;
    use super::*;

    fn one(content: &str) -> Runner {
        let mut runners = parse_script(content).unwrap();
        assert_eq!(runners.len(), 1);
        runners.remove(0)
    }

    #[test]
    fn test_config_parser() {
        let Runner::Config(r) = one("config baseUri = http://localhost:8888\n") else {
            panic!("expected config runner");
        };
        assert_eq!(r.name, "baseUri");
        assert_eq!(r.value.expression, "http://localhost:8888");
    }

    #[test]
    fn test_config_without_value_is_syntax_error() {
        assert!(matches!(
            parse_script("config baseUri\n"),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn test_variable_parser() {
        let Runner::Variable(r) = one("token = 42\n") else {
            panic!("expected variable runner");
        };
        assert_eq!(r.name, "token");
        assert_eq!(r.value.expression, "42");
    }

    #[test]
    fn test_include_parser() {
        let Runner::Include(r) = one("include common/{{env}}.rest\n") else {
            panic!("expected include runner");
        };
        assert_eq!(r.path, "common/{{env}}.rest");
    }

    #[test]
    fn test_echo_parser() {
        let Runner::Echo(r) = one("echo Hello {{world}}\n") else {
            panic!("expected echo runner");
        };
        assert_eq!(r.text.expression, "Hello {{world}}");
    }

    #[test]
    fn test_duration_parser() {
        let Runner::Duration(r) = one("duration\n") else {
            panic!("expected duration runner");
        };
        assert_eq!(r.format, None);

        let Runner::Duration(r) = one("duration elapsed %s.%f\n") else {
            panic!("expected duration runner");
        };
        assert_eq!(r.format.as_deref(), Some("elapsed %s.%f"));
    }

    #[test]
    fn test_echo_prefix_does_not_shadow_variables() {
        // "echoes" is an identifier, not the echo directive
        let Runner::Variable(r) = one("echoes = 1\n") else {
            panic!("expected variable runner");
        };
        assert_eq!(r.name, "echoes");
    }
}
