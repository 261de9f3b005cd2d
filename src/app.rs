//! Top-level run orchestration
//!
//! [`DotRest`] ties the pieces together: parse the script with the
//! standard registry, execute the runners in order against one context,
//! flush deferred cleanup exactly once, then close the run with either a
//! test-mode summary or the final response body.

use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

use crate::config::Config;
use crate::errors::Error;
use crate::execution::Context;
use crate::output::{Reporter, Summary};
use crate::parsing::{parse_file, ParserRegistry};

pub struct DotRest {
    registry: Rc<ParserRegistry>,
    pub context: Context,
}

impl DotRest {
    pub fn new(config: Config, reporter: Rc<dyn Reporter>) -> Self {
        Self {
            registry: ParserRegistry::standard(),
            context: Context::new(config, reporter),
        }
    }

    /// Run one script file. Returns `true` when the run succeeded: no fatal
    /// error, and in test mode additionally zero failed assertions.
    pub fn run(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let started = Instant::now();

        let result = self.execute(path);
        self.flush_deferred();

        if let Err(err) = &result {
            // transport failures were already reported at the request site
            if !matches!(err, Error::HttpClient { .. }) {
                self.context.reporter.error(err);
            }
        }

        if self.context.config.test_mode {
            let summary = Summary {
                passed: self.context.assertions_passed,
                failed: self.context.assertions_failed,
                elapsed_secs: started.elapsed().as_secs_f64(),
            };
            self.context
                .reporter
                .summary(&path.display().to_string(), &summary);
            result.is_ok() && summary.failed == 0
        } else {
            if result.is_ok() && self.context.has_response() {
                if let Ok(body) = self.context.body() {
                    self.context.reporter.final_body(&body);
                }
            }
            result.is_ok()
        }
    }

    fn execute(&mut self, path: &Path) -> Result<(), Error> {
        let runners = parse_file(path, &self.registry)?;
        for runner in &runners {
            runner.run(&mut self.context)?;
        }
        Ok(())
    }

    /// Deferred cleanup snippets run once, after the last directive,
    /// whatever the run's outcome. Their failures are logged, not fatal.
    fn flush_deferred(&mut self) {
        let snippets = self.context.take_deferred();
        if snippets.is_empty() {
            return;
        }
        let Some(engine) = self.context.engine.clone() else {
            return;
        };
        for snippet in snippets {
            if let Err(message) = engine.execute(&snippet, &mut self.context) {
                tracing::warn!(%message, "deferred cleanup failed");
            }
        }
    }
}
