//! Directive parsing
//!
//! A [`ParserRegistry`] holds the directive parsers in registration order;
//! the first parser whose `is_applicable` accepts a line parses it, so more
//! specific directives register ahead of the catch-all variable parser. A
//! line no parser accepts is a syntax error naming the file and line.
//!
//! [`parse_file`] drives the reader/registry loop. It is shared by the
//! top-level run and by `include`, which parses its target at run time with
//! the same registry.

mod assert;
mod code;
mod directives;
mod request;

use std::path::Path;
use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::Error;
use crate::execution::Runner;
use crate::reading::{Line, LineReader};

pub use assert::AssertParser;
pub use code::CodeParser;
pub use directives::{
    CommentParser, ConfigParser, DurationParser, EchoParser, IncludeParser, VariableParser,
};
pub use request::RequestParser;

pub trait DirectiveParser {
    /// Cheap pattern check; the registry probes parsers in order with this.
    fn is_applicable(&self, line: &Line) -> bool;

    /// Parse the directive starting at `line`, consuming continuation lines
    /// from the reader as needed. Multi-block lines may yield several
    /// runners.
    fn parse(
        &self,
        line: Line,
        reader: &mut LineReader,
        registry: &Rc<ParserRegistry>,
    ) -> Result<Vec<Runner>, Error>;
}

pub struct ParserRegistry {
    parsers: Vec<Box<dyn DirectiveParser>>,
}

impl ParserRegistry {
    /// The standard directive set, most specific first. The variable parser
    /// goes last: its `name = value` shape would shadow `config` otherwise.
    pub fn standard() -> Rc<Self> {
        Rc::new(Self {
            parsers: vec![
                Box::new(CommentParser),
                Box::new(ConfigParser),
                Box::new(IncludeParser),
                Box::new(EchoParser),
                Box::new(DurationParser),
                Box::new(CodeParser),
                Box::new(RequestParser),
                Box::new(AssertParser),
                Box::new(VariableParser),
            ],
        })
    }

    pub fn find(&self, line: &Line) -> Result<&dyn DirectiveParser, Error> {
        self.parsers
            .iter()
            .map(|p| p.as_ref())
            .find(|p| p.is_applicable(line))
            .ok_or_else(|| {
                Error::syntax(format!("Unknown token: {}", line.content.trim()), line)
            })
    }

    /// Whether any parser accepts the line. The request body reader uses
    /// this to know where free text ends.
    pub fn matches(&self, line: &Line) -> bool {
        self.parsers.iter().any(|p| p.is_applicable(line))
    }
}

/// Parse one script file into its runners, in file order.
pub fn parse_file(
    path: impl AsRef<Path>,
    registry: &Rc<ParserRegistry>,
) -> Result<Vec<Runner>, Error> {
    let mut reader = LineReader::open(path.as_ref())?;
    let mut runners = Vec::new();
    while let Some(line) = reader.next_token() {
        let parser = registry.find(&line)?;
        runners.extend(parser.parse(line, &mut reader, registry)?);
    }
    Ok(runners)
}

/// `Name: value` shape shared by header, `[Options]`, `[form]` and
/// `[multipart]` blocks.
pub(crate) fn key_value(line: &Line) -> Option<(String, String)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z0-9_-]+)\s*:\s*(.*?)\s*$").expect("static regex")
    });
    re.captures(&line.content)
        .map(|c| (c[1].to_string(), c[2].to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;

    use super::*;

    /// Write a script to a temp file and parse it with the standard
    /// registry.
    pub fn parse_script(content: &str) -> Result<Vec<Runner>, Error> {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        parse_file(f.path(), &ParserRegistry::standard())
    }
}
