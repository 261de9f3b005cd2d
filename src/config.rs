//! Run configuration
//!
//! Typed settings mutated by `config <name> = <value>` directives. Field
//! access goes through an explicit name table rather than reflection: every
//! script-visible field is enumerated in [`Config::get`] / [`Config::set`],
//! and an unknown name is a context error.

use crate::errors::Error;
use crate::execution::Val;

/// Script-visible configuration for one run.
///
/// Script field names keep their original camelCase spelling (`baseUri`,
/// `failOnAssertionError`, ...) so existing scripts keep working.
#[derive(Debug, Clone)]
pub struct Config {
    /// Verify mode: print a summary and fail the run on assertion failures
    /// instead of printing the final response body.
    pub test_mode: bool,
    /// Fail-fast policy: abort the run on the first failed assertion.
    pub fail_on_assertion_error: bool,
    pub verbosity: i64,
    pub base_uri: Option<String>,
    pub allow_redirects: bool,
    pub connection_timeout: f64,
    pub timeout: f64,
    pub read_timeout: f64,
    /// TLS certificate verification.
    pub verify: bool,
    pub proxy: Option<String>,
    /// Basic auth as `user:password`.
    pub auth: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            test_mode: false,
            fail_on_assertion_error: true,
            verbosity: 0,
            base_uri: None,
            allow_redirects: true,
            connection_timeout: 10.0,
            timeout: 10.0,
            read_timeout: 10.0,
            verify: true,
            proxy: None,
            auth: None,
        }
    }
}

impl Config {
    /// Read a field by its script name.
    pub fn get(&self, name: &str) -> Result<Val, Error> {
        Ok(match name {
            "testMode" => Val::Bool(self.test_mode),
            "failOnAssertionError" => Val::Bool(self.fail_on_assertion_error),
            "verbosity" => Val::Int(self.verbosity),
            "baseUri" => opt_str(&self.base_uri),
            "allowRedirects" => Val::Bool(self.allow_redirects),
            "connectionTimeout" => Val::Float(self.connection_timeout),
            "timeout" => Val::Float(self.timeout),
            "readTimeout" => Val::Float(self.read_timeout),
            "verify" => Val::Bool(self.verify),
            "proxy" => opt_str(&self.proxy),
            "auth" => opt_str(&self.auth),
            _ => return Err(Error::Context(format!("Undefined config variable: {name}"))),
        })
    }

    /// Write a field by its script name, coercing the resolved value to the
    /// field's type.
    pub fn set(&mut self, name: &str, value: Val) -> Result<Val, Error> {
        match name {
            "testMode" => self.test_mode = as_bool(name, &value)?,
            "failOnAssertionError" => self.fail_on_assertion_error = as_bool(name, &value)?,
            "verbosity" => self.verbosity = as_int(name, &value)?,
            "baseUri" => self.base_uri = as_opt_str(&value),
            "allowRedirects" => self.allow_redirects = as_bool(name, &value)?,
            "connectionTimeout" => self.connection_timeout = as_float(name, &value)?,
            "timeout" => self.timeout = as_float(name, &value)?,
            "readTimeout" => self.read_timeout = as_float(name, &value)?,
            "verify" => self.verify = as_bool(name, &value)?,
            "proxy" => self.proxy = as_opt_str(&value),
            "auth" => self.auth = as_opt_str(&value),
            _ => return Err(Error::Context(format!("Undefined config variable: {name}"))),
        }
        Ok(value)
    }
}

fn opt_str(v: &Option<String>) -> Val {
    match v {
        Some(s) => Val::Str(s.clone()),
        None => Val::Null,
    }
}

fn as_opt_str(v: &Val) -> Option<String> {
    match v {
        Val::Null => None,
        other => Some(other.stringify()),
    }
}

fn as_bool(name: &str, v: &Val) -> Result<bool, Error> {
    match v {
        Val::Bool(b) => Ok(*b),
        Val::Int(i) => Ok(*i != 0),
        _ => Err(Error::Context(format!(
            "Config variable {name} expects a boolean, got {}",
            v.stringify()
        ))),
    }
}

fn as_int(name: &str, v: &Val) -> Result<i64, Error> {
    match v {
        Val::Int(i) => Ok(*i),
        _ => Err(Error::Context(format!(
            "Config variable {name} expects an integer, got {}",
            v.stringify()
        ))),
    }
}

fn as_float(name: &str, v: &Val) -> Result<f64, Error> {
    match v {
        Val::Int(i) => Ok(*i as f64),
        Val::Float(f) => Ok(*f),
        _ => Err(Error::Context(format!(
            "Config variable {name} expects a number, got {}",
            v.stringify()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_round_trip() {
        let mut cfg = Config::default();
        cfg.set("baseUri", Val::Str("http://localhost:8888".into()))
            .unwrap();
        assert_eq!(
            cfg.get("baseUri").unwrap(),
            Val::Str("http://localhost:8888".into())
        );

        cfg.set("timeout", Val::Int(30)).unwrap();
        assert_eq!(cfg.get("timeout").unwrap(), Val::Float(30.0));
    }

    #[test]
    fn test_unknown_field_is_context_error() {
        let mut cfg = Config::default();
        assert!(matches!(cfg.get("nope"), Err(Error::Context(_))));
        assert!(matches!(
            cfg.set("nope", Val::Int(1)),
            Err(Error::Context(_))
        ));
    }

    #[test]
    fn test_type_mismatch_is_context_error() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("testMode", Val::Str("yes".into())),
            Err(Error::Context(_))
        ));
    }
}
