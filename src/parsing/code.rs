//! Embedded-code block parser
//!
//! Blocks are delimited by `<%` and `%>`. A line may hold several complete
//! blocks; an unterminated opener swallows following lines verbatim until
//! the line carrying `%>`, whose remainder may open further blocks. Each
//! block becomes one runner tagged with the line it opened on.

use std::rc::Rc;

use crate::errors::Error;
use crate::execution::{CodeRunner, Runner};
use crate::reading::{Line, LineReader};

use super::{DirectiveParser, ParserRegistry};

pub struct CodeParser;

impl DirectiveParser for CodeParser {
    fn is_applicable(&self, line: &Line) -> bool {
        line.content.trim_start().starts_with("<%")
    }

    fn parse(
        &self,
        line: Line,
        reader: &mut LineReader,
        _registry: &Rc<ParserRegistry>,
    ) -> Result<Vec<Runner>, Error> {
        let mut runners = Vec::new();
        // blocks are tagged with the line holding their closer, so errors in
        // a multi-line block point at where it ended
        let mut current = line;
        let mut rest = current.content.trim().to_string();

        loop {
            let Some(start) = rest.find("<%") else {
                if !rest.trim().is_empty() {
                    return Err(Error::syntax(
                        format!("Unexpected text after code block: {}", rest.trim()),
                        &current,
                    ));
                }
                break;
            };
            if !rest[..start].trim().is_empty() {
                return Err(Error::syntax(
                    format!("Unexpected text before code block: {}", rest[..start].trim()),
                    &current,
                ));
            }

            let after = rest[start + 2..].to_string();
            match after.find("%>") {
                Some(end) => {
                    runners.push(Runner::Code(CodeRunner {
                        line: current.clone(),
                        code: after[..end].trim().to_string(),
                    }));
                    rest = after[end + 2..].to_string();
                }
                None => {
                    // multi-line block: accumulate verbatim until the closer
                    let mut code = after;
                    loop {
                        let Some(next) = reader.next() else {
                            return Err(Error::syntax(
                                "Unterminated code block, expected %>",
                                &current,
                            ));
                        };
                        match next.content.find("%>") {
                            Some(end) => {
                                code.push_str(&next.content[..end]);
                                rest = next.content[end + 2..].to_string();
                                current = next;
                                break;
                            }
                            None => code.push_str(&next.content),
                        }
                    }
                    runners.push(Runner::Code(CodeRunner {
                        line: current.clone(),
                        code: code.trim().to_string(),
                    }));
                }
            }
        }

        Ok(runners)
    }
}
