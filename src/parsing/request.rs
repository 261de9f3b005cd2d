//! Request parser
//!
//! A request directive opens with `<METHOD> <uri>` and may continue with a
//! headers block, an `[Options]` block, and a body. `[form]` and
//! `[multipart]` bodies are key/value blocks; anything else is free text
//! accumulated until a line some parser recognizes (that line is pushed
//! back) and classified at run time.

use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::Error;
use crate::execution::{BodySpec, MultipartSpec, RequestRunner, Runner, Value};
use crate::reading::{Line, LineReader};

use super::{key_value, DirectiveParser, ParserRegistry};

pub struct RequestParser;

impl RequestParser {
    fn pattern() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r"^\s*(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\s+(\S.*?)\s*$")
                .expect("static regex")
        })
    }
}

impl DirectiveParser for RequestParser {
    fn is_applicable(&self, line: &Line) -> bool {
        Self::pattern().is_match(&line.content)
    }

    fn parse(
        &self,
        line: Line,
        reader: &mut LineReader,
        registry: &Rc<ParserRegistry>,
    ) -> Result<Vec<Runner>, Error> {
        let caps = Self::pattern()
            .captures(&line.content)
            .ok_or_else(|| Error::syntax("Invalid request syntax, expected: <METHOD> <uri>", &line))?;
        let method = caps[1].to_string();
        let uri = caps[2].to_string();

        let headers = read_key_values(reader);
        let options = read_options_block(reader);
        let body = read_body(reader, registry)?;

        Ok(vec![Runner::Request(RequestRunner {
            line,
            method,
            uri,
            headers,
            options,
            body,
        })])
    }
}

/// Consecutive `Name: value` lines; the first non-matching line is pushed
/// back. Blank lines before the block are skipped.
fn read_key_values(reader: &mut LineReader) -> Vec<(String, Value)> {
    let mut entries = Vec::new();
    while let Some(line) = reader.next_token() {
        match key_value(&line) {
            Some((name, value)) => entries.push((name, Value::new(value))),
            None => {
                reader.back(line);
                break;
            }
        }
    }
    entries
}

fn read_options_block(reader: &mut LineReader) -> Vec<(String, Value)> {
    match reader.next_token() {
        Some(line) if line.content.trim().eq_ignore_ascii_case("[options]") => {
            read_key_values(reader)
        }
        Some(line) => {
            reader.back(line);
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn read_body(reader: &mut LineReader, registry: &Rc<ParserRegistry>) -> Result<BodySpec, Error> {
    let Some(first) = reader.next_token() else {
        return Ok(BodySpec::None);
    };

    match first.content.trim().to_lowercase().as_str() {
        "[form]" => return Ok(BodySpec::Form(read_key_values(reader))),
        "[multipart]" => return read_multipart(&first, reader),
        _ => {}
    }

    if registry.matches(&first) {
        reader.back(first);
        return Ok(BodySpec::None);
    }

    // free text until the next recognizable directive
    let mut text = first.content.clone();
    while let Some(line) = reader.next() {
        if !line.is_empty() && registry.matches(&line) {
            reader.back(line);
            break;
        }
        text.push_str(&line.content);
    }

    Ok(BodySpec::Text {
        line: first,
        text: text.trim().to_string(),
    })
}

/// `[multipart]` parts are `key: value` runs; every `name` key opens a new
/// part. Each part must carry `name` and `contents`.
fn read_multipart(block_line: &Line, reader: &mut LineReader) -> Result<BodySpec, Error> {
    let entries = read_key_values(reader);

    let mut parts: Vec<Vec<(String, Value)>> = Vec::new();
    for (key, value) in entries {
        if key == "name" || parts.is_empty() {
            parts.push(Vec::new());
        }
        parts.last_mut().expect("part just pushed").push((key, value));
    }

    let mut specs = Vec::with_capacity(parts.len());
    for part in parts {
        let mut name = None;
        let mut contents = None;
        let mut filename = None;
        for (key, value) in part {
            match key.as_str() {
                "name" => name = Some(value),
                "contents" => contents = Some(value),
                "filename" => filename = Some(value),
                other => {
                    return Err(Error::syntax(
                        format!("Unknown multipart field: {other}"),
                        block_line,
                    ))
                }
            }
        }
        let (Some(name), Some(contents)) = (name, contents) else {
            return Err(Error::syntax(
                "Each multipart part requires name and contents fields",
                block_line,
            ));
        };
        specs.push(MultipartSpec {
            name,
            contents,
            filename,
        });
    }

    Ok(BodySpec::Multipart(specs))
}
