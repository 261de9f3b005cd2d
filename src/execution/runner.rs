//! Directive runners
//!
//! Parsing turns each directive into one runner; a run executes them in
//! file order against the shared [`Context`]. The set of runners is a
//! closed enum, so the run loop and the include machinery dispatch without
//! dynamic registration.

use std::path::PathBuf;
use std::rc::Rc;

use crate::errors::Error;
use crate::parsing::ParserRegistry;
use crate::reading::Line;

use super::assert::AssertRunner;
use super::context::Context;
use super::request::RequestRunner;
use super::value::{replace_placeholders, Value};

pub enum Runner {
    Comment(CommentRunner),
    Config(ConfigRunner),
    Variable(VariableRunner),
    Include(IncludeRunner),
    Echo(EchoRunner),
    Duration(DurationRunner),
    Code(CodeRunner),
    Request(RequestRunner),
    Assert(AssertRunner),
}

impl Runner {
    pub fn run(&self, ctx: &mut Context) -> Result<(), Error> {
        match self {
            Runner::Comment(r) => r.run(ctx),
            Runner::Config(r) => r.run(ctx),
            Runner::Variable(r) => r.run(ctx),
            Runner::Include(r) => r.run(ctx),
            Runner::Echo(r) => r.run(ctx),
            Runner::Duration(r) => r.run(ctx),
            Runner::Code(r) => r.run(ctx),
            Runner::Request(r) => r.run(ctx),
            Runner::Assert(r) => r.run(ctx),
        }
    }

    /// Line the runner was parsed from.
    pub fn line(&self) -> &Line {
        match self {
            Runner::Comment(r) => &r.line,
            Runner::Config(r) => &r.line,
            Runner::Variable(r) => &r.line,
            Runner::Include(r) => &r.line,
            Runner::Echo(r) => &r.line,
            Runner::Duration(r) => &r.line,
            Runner::Code(r) => &r.line,
            Runner::Request(r) => &r.line,
            Runner::Assert(r) => &r.line,
        }
    }
}

/// Attach a source line to errors that lack one.
pub(super) fn with_line(err: Error, line: &Line) -> Error {
    match err {
        Error::Context(message) => Error::Execution {
            message,
            line: line.clone(),
        },
        other => other,
    }
}

/* ===================== Reporting-only directives ===================== */

pub struct CommentRunner {
    pub line: Line,
}

impl CommentRunner {
    fn run(&self, ctx: &mut Context) -> Result<(), Error> {
        ctx.reporter.comment(&self.line);
        Ok(())
    }
}

pub struct EchoRunner {
    pub line: Line,
    pub text: Value,
}

impl EchoRunner {
    fn run(&self, ctx: &mut Context) -> Result<(), Error> {
        let text = self.text.resolve(&self.line, ctx)?.stringify();
        ctx.reporter.echo(&text);
        Ok(())
    }
}

pub struct DurationRunner {
    pub line: Line,
    pub format: Option<String>,
}

impl DurationRunner {
    fn run(&self, ctx: &mut Context) -> Result<(), Error> {
        let format = self.format.as_deref().unwrap_or("%s.%f sec");
        let text = ctx.duration(format);
        ctx.reporter.duration(&text);
        Ok(())
    }
}

/* ===================== State-writing directives ===================== */

pub struct ConfigRunner {
    pub line: Line,
    pub name: String,
    pub value: Value,
}

impl ConfigRunner {
    fn run(&self, ctx: &mut Context) -> Result<(), Error> {
        let value = self.value.resolve(&self.line, ctx)?;
        ctx.config
            .set(&self.name, value.clone())
            .map_err(|e| with_line(e, &self.line))?;
        ctx.reporter.config_set(&self.name, &value.stringify());
        Ok(())
    }
}

pub struct VariableRunner {
    pub line: Line,
    pub name: String,
    pub value: Value,
}

impl VariableRunner {
    fn run(&self, ctx: &mut Context) -> Result<(), Error> {
        let value = self.value.resolve(&self.line, ctx)?;
        ctx.set_var(&self.name, value.clone());
        ctx.reporter.var_set(&self.name, &value.stringify());
        Ok(())
    }
}

/* ===================== Include ===================== */

/// Inline another script file, depth-first, against the same context.
///
/// The path is resolved when the runner executes, so placeholders may refer
/// to variables set earlier in the run, and relative paths anchor at the
/// directory of the including file.
pub struct IncludeRunner {
    pub line: Line,
    pub path: String,
    pub registry: Rc<ParserRegistry>,
}

impl IncludeRunner {
    fn run(&self, ctx: &mut Context) -> Result<(), Error> {
        let path = replace_placeholders(&self.path, ctx, &self.line)?;
        let resolved = if std::path::Path::new(&path).is_absolute() {
            PathBuf::from(&path)
        } else {
            self.line.dir().join(&path)
        };

        ctx.reporter.include(&resolved.display().to_string());

        let runners = crate::parsing::parse_file(&resolved, &self.registry).map_err(|e| {
            match e {
                Error::File(message) => Error::syntax(message, &self.line),
                other => other,
            }
        })?;
        for runner in &runners {
            runner.run(ctx)?;
        }
        Ok(())
    }
}

/* ===================== Embedded code ===================== */

pub struct CodeRunner {
    pub line: Line,
    pub code: String,
}

impl CodeRunner {
    fn run(&self, ctx: &mut Context) -> Result<(), Error> {
        ctx.reporter.eval_start(&self.line);

        let Some(engine) = ctx.engine.clone() else {
            return Err(Error::Evaluation {
                message: "no script engine configured for code blocks".into(),
                line: self.line.clone(),
            });
        };
        engine.execute(&self.code, ctx).map_err(|message| Error::Evaluation {
            message,
            line: self.line.clone(),
        })?;

        ctx.reporter.eval_success(&self.line);
        Ok(())
    }
}
