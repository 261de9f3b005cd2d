//! Reporting sink
//!
//! Human-facing presentation is an external collaborator: the engine only
//! notifies a [`Reporter`] of directive-level events. [`ConsoleReporter`]
//! is the plain-text implementation used by the CLI; tests swap in
//! [`SilentReporter`] or their own recorder.

use serde::Serialize;

use crate::errors::Error;
use crate::http::{HttpResponse, RequestOptions};
use crate::reading::Line;

/// End-of-run counters shown in test mode.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub elapsed_secs: f64,
}

#[allow(unused_variables)]
pub trait Reporter {
    fn comment(&self, line: &Line) {}
    fn config_set(&self, name: &str, value: &str) {}
    fn var_set(&self, name: &str, value: &str) {}
    fn include(&self, path: &str) {}
    fn echo(&self, text: &str) {}
    fn duration(&self, text: &str) {}
    fn request(&self, method: &str, uri: &str, options: &RequestOptions) {}
    fn response(&self, response: &HttpResponse) {}
    fn assertion_success(&self, line: &Line, expected: &str, actual: &str) {}
    fn assertion_failure(&self, line: &Line, expected: &str, actual: &str) {}
    fn eval_start(&self, line: &Line) {}
    fn eval_success(&self, line: &Line) {}
    fn error(&self, error: &Error) {}
    fn summary(&self, path: &str, summary: &Summary) {}
    fn final_body(&self, body: &str) {}
}

/// Plain-text console reporter. Verbosity 0 keeps request/response traffic
/// quiet; anything higher prints it.
pub struct ConsoleReporter {
    pub verbosity: i64,
}

impl ConsoleReporter {
    pub fn new(verbosity: i64) -> Self {
        Self { verbosity }
    }
}

impl Reporter for ConsoleReporter {
    fn comment(&self, line: &Line) {
        if self.verbosity > 0 {
            println!("{}", line.content.trim_end());
        }
    }

    fn config_set(&self, name: &str, value: &str) {
        if self.verbosity > 0 {
            println!("config {name} = {value}");
        }
    }

    fn include(&self, path: &str) {
        if self.verbosity > 0 {
            println!("include {path}");
        }
    }

    fn echo(&self, text: &str) {
        println!("{text}");
    }

    fn duration(&self, text: &str) {
        println!("duration: {text}");
    }

    fn request(&self, method: &str, uri: &str, _options: &RequestOptions) {
        tracing::debug!(method, uri, "sending request");
        if self.verbosity > 0 {
            println!("> {method} {uri}");
        }
    }

    fn response(&self, response: &HttpResponse) {
        tracing::debug!(status = response.status, "received response");
        if self.verbosity > 0 {
            println!("< {}", response.status);
        }
    }

    fn assertion_success(&self, line: &Line, expected: &str, _actual: &str) {
        if self.verbosity > 0 {
            println!("PASS {}: {}", line, expected);
        }
    }

    fn assertion_failure(&self, line: &Line, expected: &str, actual: &str) {
        println!(
            "FAIL {}: expected {expected}, actual value is '{actual}'",
            line
        );
    }

    fn eval_start(&self, line: &Line) {
        tracing::debug!(%line, "evaluating code block");
    }

    fn error(&self, error: &Error) {
        eprintln!("{error}");
    }

    fn summary(&self, path: &str, summary: &Summary) {
        println!(
            "{path}: {} passed, {} failed ({:.3}s)",
            summary.passed, summary.failed, summary.elapsed_secs
        );
    }

    fn final_body(&self, body: &str) {
        println!("{body}");
    }
}

/// Machine-readable reporter: one JSON object per event on stdout, quiet
/// about everything that is not an outcome.
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn assertion_failure(&self, line: &Line, expected: &str, actual: &str) {
        println!(
            "{}",
            serde_json::json!({
                "event": "assertion_failure",
                "line": line.to_string(),
                "expected": expected,
                "actual": actual,
            })
        );
    }

    fn error(&self, error: &Error) {
        println!(
            "{}",
            serde_json::json!({ "event": "error", "message": error.to_string() })
        );
    }

    fn summary(&self, path: &str, summary: &Summary) {
        println!(
            "{}",
            serde_json::json!({ "event": "summary", "file": path, "result": summary })
        );
    }

    fn final_body(&self, body: &str) {
        println!("{}", serde_json::json!({ "event": "body", "body": body }));
    }
}

/// Reporter that swallows everything. Used by tests.
pub struct SilentReporter;

impl Reporter for SilentReporter {}
