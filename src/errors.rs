//! Error taxonomy for parsing and execution
//!
//! One closed enum, organized by kind rather than by raising site. Every
//! directive-level error carries the [`Line`] it originated from so the
//! reporter can name the offending file and line. Assertion failures are the
//! only soft errors: they stay recoverable unless the fail-fast config flag
//! escalates them.

use thiserror::Error;

use crate::reading::Line;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or unrecognized directive/expression text. Always fatal.
    #[error("syntax error at {line}: {message}")]
    Syntax { message: String, line: Line },

    /// Reference to an undefined variable, config field, extraction mode or
    /// cookie attribute. Fatal unless a caller re-wraps it as `Execution`.
    #[error("context error: {0}")]
    Context(String),

    /// A directive failed to run for reasons other than assertion mismatch.
    #[error("execution error at {line}: {message}")]
    Execution { message: String, line: Line },

    /// An assertion predicate evaluated false. Fatal only under fail-fast.
    #[error("assertion failed at {line}: expected {expected}, actual value is '{actual}'")]
    Assertion {
        line: Line,
        expected: String,
        actual: String,
    },

    /// Unreadable or missing file, either the initial script or an embed.
    #[error("file error: {0}")]
    File(String),

    /// Transport-level HTTP failure. Always fatal, reported before re-raise.
    #[error("http client error at {line}: {message}")]
    HttpClient { message: String, line: Line },

    /// Embedded code raised an error.
    #[error("code evaluation error at {line}: {message}")]
    Evaluation { message: String, line: Line },
}

impl Error {
    pub fn syntax(message: impl Into<String>, line: &Line) -> Self {
        Error::Syntax {
            message: message.into(),
            line: line.clone(),
        }
    }

    pub fn execution(message: impl Into<String>, line: &Line) -> Self {
        Error::Execution {
            message: message.into(),
            line: line.clone(),
        }
    }

    /// Line the error originated from, when it carries one.
    pub fn line(&self) -> Option<&Line> {
        match self {
            Error::Syntax { line, .. }
            | Error::Execution { line, .. }
            | Error::Assertion { line, .. }
            | Error::HttpClient { line, .. }
            | Error::Evaluation { line, .. } => Some(line),
            Error::Context(_) | Error::File(_) => None,
        }
    }
}
