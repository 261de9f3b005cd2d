//! Per-run execution context
//!
//! All mutable state shared by the directives of one run: variable
//! bindings, config, the lazily built HTTP client, response-derived caches,
//! assertion counters, the duration timer, and the run-scoped deferred
//! cleanup list. Also home of the built-in functions callable from value
//! expressions.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use serde_json::Value as JsonValue;

use crate::config::Config;
use crate::errors::Error;
use crate::http::{HttpClient, HttpResponse, ReqwestClient};
use crate::output::Reporter;
use crate::scripting::ScriptEngine;

use super::val::{Key, Val};

/// Built-in function names recognized inside value expressions, in the
/// order the resolver probes them.
pub const FUNCTIONS: &[&str] = &[
    "env", "var", "unset", "config", "status", "body", "header", "cookie", "jsonbody",
    "jsonpath", "xpath", "duration",
];

pub struct Context {
    pub config: Config,
    pub reporter: Rc<dyn Reporter>,
    pub engine: Option<Rc<dyn ScriptEngine>>,
    pub assertions_passed: usize,
    pub assertions_failed: usize,
    vars: HashMap<String, Val>,
    client: Option<Box<dyn HttpClient>>,
    response: Option<HttpResponse>,
    body_cache: Option<String>,
    json_cache: Option<JsonValue>,
    duration_started: Instant,
    deferred: Vec<String>,
}

impl Context {
    pub fn new(config: Config, reporter: Rc<dyn Reporter>) -> Self {
        Self {
            config,
            reporter,
            engine: None,
            assertions_passed: 0,
            assertions_failed: 0,
            vars: HashMap::new(),
            client: None,
            response: None,
            body_cache: None,
            json_cache: None,
            duration_started: Instant::now(),
            deferred: Vec::new(),
        }
    }

    pub fn with_engine(mut self, engine: Rc<dyn ScriptEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /* ===================== Variables ===================== */

    pub fn var(&self, name: &str) -> Result<Val, Error> {
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Context(format!("Undefined variable: {name}")))
    }

    pub fn set_var(&mut self, name: &str, value: Val) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn unset(&mut self, name: &str) {
        self.vars.remove(name);
    }

    pub fn has(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /* ===================== Response state ===================== */

    /// Store a fresh response, dropping the decoded-body caches.
    pub fn set_response(&mut self, response: HttpResponse) {
        self.invalidate_caches();
        self.response = Some(response);
    }

    pub fn invalidate_caches(&mut self) {
        self.body_cache = None;
        self.json_cache = None;
    }

    pub fn response(&self) -> Result<&HttpResponse, Error> {
        self.response
            .as_ref()
            .ok_or_else(|| Error::Context("No response available: no request was made yet".into()))
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// The transport, built lazily from the current config on first use.
    pub fn client(&mut self) -> Result<&dyn HttpClient, String> {
        if self.client.is_none() {
            self.client = Some(Box::new(ReqwestClient::build(&self.config)?));
        }
        Ok(self.client.as_deref().expect("client just built"))
    }

    /// Inject a transport, bypassing the lazy reqwest construction.
    pub fn set_client(&mut self, client: Box<dyn HttpClient>) {
        self.client = Some(client);
    }

    /* ===================== Deferred cleanup ===================== */

    /// Register a script snippet to run once when the top-level run
    /// completes, success or failure.
    pub fn defer_script(&mut self, snippet: String) {
        self.deferred.push(snippet);
    }

    pub fn take_deferred(&mut self) -> Vec<String> {
        std::mem::take(&mut self.deferred)
    }

    /* ===================== Built-in dispatch ===================== */

    /// Dispatch a built-in function call from a value expression. Arity is
    /// validated by the resolver; names outside [`FUNCTIONS`] never get
    /// here.
    pub fn call(&mut self, name: &str, args: &[Val]) -> Result<Val, Error> {
        let arg = |i: usize| args.get(i).cloned();
        let str_arg = |i: usize| args.get(i).map(Val::stringify);

        match name {
            "env" => {
                let key = str_arg(0)
                    .ok_or_else(|| Error::Context("env() expects a variable name".into()))?;
                Ok(match std::env::var(&key) {
                    Ok(v) if !v.is_empty() => Val::Str(v),
                    _ => arg(1).unwrap_or(Val::Null),
                })
            }
            "var" => {
                let key = str_arg(0)
                    .ok_or_else(|| Error::Context("var() expects a variable name".into()))?;
                match arg(1) {
                    Some(value) => {
                        self.set_var(&key, value.clone());
                        Ok(value)
                    }
                    None => self.var(&key),
                }
            }
            "unset" => {
                let key = str_arg(0)
                    .ok_or_else(|| Error::Context("unset() expects a variable name".into()))?;
                self.unset(&key);
                Ok(Val::Null)
            }
            "config" => {
                let key = str_arg(0)
                    .ok_or_else(|| Error::Context("config() expects a field name".into()))?;
                match arg(1) {
                    Some(value) => self.config.set(&key, value),
                    None => self.config.get(&key),
                }
            }
            "status" => Ok(Val::Int(self.response()?.status as i64)),
            "header" => {
                let key = str_arg(0)
                    .ok_or_else(|| Error::Context("header() expects a header name".into()))?;
                Ok(Val::Str(self.response()?.header_line(&key)))
            }
            "cookie" => {
                let key = str_arg(0)
                    .ok_or_else(|| Error::Context("cookie() expects a cookie name".into()))?;
                let attribute = str_arg(1).unwrap_or_else(|| "value".to_string());
                self.cookie(&key, &attribute)
            }
            "body" => Ok(Val::Str(self.body()?)),
            "jsonbody" => {
                let extract = str_arg(0).unwrap_or_else(|| "all".to_string());
                self.jsonbody(&extract)
            }
            "jsonpath" => {
                let selector = str_arg(0)
                    .ok_or_else(|| Error::Context("jsonpath() expects a selector".into()))?;
                let extract = str_arg(1).unwrap_or_else(|| "text".to_string());
                self.jsonpath(&selector, &extract)
            }
            "xpath" => {
                let selector = str_arg(0)
                    .ok_or_else(|| Error::Context("xpath() expects a selector".into()))?;
                let extract = str_arg(1).unwrap_or_else(|| "text".to_string());
                self.xpath(&selector, &extract)
            }
            "duration" => {
                let format = str_arg(0).unwrap_or_else(|| "%s.%f sec".to_string());
                Ok(Val::Str(self.duration(&format)))
            }
            other => Err(Error::Context(format!("Undefined function: {other}"))),
        }
    }

    /* ===================== Built-in implementations ===================== */

    /// Decoded body text of the last response, cached.
    pub fn body(&mut self) -> Result<String, Error> {
        if self.body_cache.is_none() {
            self.body_cache = Some(self.response()?.body_string());
        }
        Ok(self.body_cache.clone().expect("body just cached"))
    }

    fn json_body(&mut self) -> Result<JsonValue, Error> {
        if self.json_cache.is_none() {
            let body = self.body()?;
            let json = serde_json::from_str(&body)
                .map_err(|e| Error::Context(format!("Can't decode json body: {e}")))?;
            self.json_cache = Some(json);
        }
        Ok(self.json_cache.clone().expect("json just cached"))
    }

    fn jsonbody(&mut self, extract: &str) -> Result<Val, Error> {
        let json = self.json_body()?;
        // Top-level children form the result set; a scalar body has none.
        let entries: Vec<(Key, Val)> = match &json {
            JsonValue::Object(obj) => obj
                .iter()
                .map(|(k, v)| (Key::Name(k.clone()), Val::from_json(v)))
                .collect(),
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Key::Index(i), Val::from_json(v)))
                .collect(),
            _ => Vec::new(),
        };
        let exists = !entries.is_empty();
        extract_entries(entries, extract, exists)
    }

    fn jsonpath(&mut self, selector: &str, extract: &str) -> Result<Val, Error> {
        let json = self.json_body()?;
        let path = serde_json_path::JsonPath::parse(selector)
            .map_err(|e| Error::Context(format!("Invalid jsonpath selector {selector}: {e}")))?;
        let entries: Vec<(Key, Val)> = path
            .query(&json)
            .all()
            .into_iter()
            .enumerate()
            .map(|(i, node)| (Key::Index(i), Val::from_json(node)))
            .collect();
        let exists = !entries.is_empty();
        extract_entries(entries, extract, exists)
    }

    fn xpath(&mut self, selector: &str, extract: &str) -> Result<Val, Error> {
        use sxd_xpath::Value as XValue;

        let body = self.body()?;
        let package = sxd_document::parser::parse(&body)
            .map_err(|e| Error::Context(format!("Can't parse xml body: {e}")))?;
        let document = package.as_document();

        let xpath = sxd_xpath::Factory::new()
            .build(selector)
            .map_err(|e| Error::Context(format!("Invalid xpath selector {selector}: {e}")))?
            .ok_or_else(|| Error::Context(format!("Empty xpath selector: {selector}")))?;

        let xctx = sxd_xpath::Context::new();
        let value = xpath
            .evaluate(&xctx, document.root())
            .map_err(|e| Error::Context(format!("Xpath evaluation failed: {e}")))?;

        let entries: Vec<(Key, Val)> = match value {
            XValue::Nodeset(nodes) => nodes
                .document_order()
                .into_iter()
                .enumerate()
                .map(|(i, node)| (Key::Index(i), Val::Str(node.string_value())))
                .collect(),
            XValue::Boolean(b) => vec![(Key::Index(0), Val::Bool(b))],
            XValue::Number(n) => {
                let val = if n.fract() == 0.0 && n.is_finite() {
                    Val::Int(n as i64)
                } else {
                    Val::Float(n)
                };
                vec![(Key::Index(0), val)]
            }
            XValue::String(s) => vec![(Key::Index(0), Val::Str(s))],
        };
        let exists = !entries.is_empty();
        extract_entries(entries, extract, exists)
    }

    fn cookie(&mut self, name: &str, attribute: &str) -> Result<Val, Error> {
        let headers: Vec<String> = self
            .response()?
            .set_cookie_headers()
            .iter()
            .map(|s| s.to_string())
            .collect();

        for header in headers {
            let Some(cookie) = SetCookie::parse(&header) else {
                continue;
            };
            if cookie.name != name {
                continue;
            }
            return Ok(match attribute {
                "value" => Val::Str(cookie.value),
                "domain" => cookie.attr("domain").map(Val::Str).unwrap_or(Val::Null),
                "path" => cookie.attr("path").map(Val::Str).unwrap_or(Val::Null),
                "expires" => cookie.attr("expires").map(Val::Str).unwrap_or(Val::Null),
                "max-age" => cookie
                    .attr("max-age")
                    .and_then(|v| v.parse::<i64>().ok())
                    .map(Val::Int)
                    .unwrap_or(Val::Null),
                "secure" => Val::Bool(cookie.flag("secure")),
                "httponly" => Val::Bool(cookie.flag("httponly")),
                "exists" => Val::Bool(true),
                other => {
                    return Err(Error::Context(format!("Undefined cookie attribute: {other}")))
                }
            });
        }

        // Cookie not present at all.
        Ok(Val::Bool(false))
    }

    /// Elapsed time since the previous `duration` call (or context
    /// creation), formatted, then the timer restarts.
    pub fn duration(&mut self, format: &str) -> String {
        let elapsed = self.duration_started.elapsed();
        self.duration_started = Instant::now();

        format
            .replace("%s", &elapsed.as_secs().to_string())
            .replace("%S", &elapsed.as_secs().to_string())
            .replace("%f", &format!("{:06}", elapsed.subsec_micros()))
    }
}

/// Apply an extraction mode to a result set.
///
/// Shared by `jsonbody`/`jsonpath`/`xpath`. `text` renders a single scalar
/// as itself, a single collection as JSON, and multiple matches as a JSON
/// array of all match values.
fn extract_entries(entries: Vec<(Key, Val)>, extract: &str, exists: bool) -> Result<Val, Error> {
    let text = |entries: &[(Key, Val)]| -> Val {
        match entries.len() {
            0 => Val::Null,
            1 => match &entries[0].1 {
                v @ Val::Map(_) => Val::Str(v.stringify()),
                v => v.clone(),
            },
            _ => {
                let list = Val::Map(
                    entries
                        .iter()
                        .enumerate()
                        .map(|(i, (_, v))| (Key::Index(i), v.clone()))
                        .collect(),
                );
                Val::Str(list.stringify())
            }
        }
    };

    Ok(match extract {
        "text" => text(&entries),
        "first" => entries.first().map(|(_, v)| v.clone()).unwrap_or(Val::Null),
        "last" => entries.last().map(|(_, v)| v.clone()).unwrap_or(Val::Null),
        "all" => Val::Map(entries),
        "count" => Val::Int(entries.len() as i64),
        "len" | "length" => match text(&entries) {
            Val::Null => Val::Int(0),
            v => Val::Int(v.stringify().chars().count() as i64),
        },
        "exists" => Val::Bool(exists),
        other => {
            return Err(Error::Context(format!(
                "Unknown (json/x)path result type: {other}"
            )))
        }
    })
}

/// One parsed `Set-Cookie` header.
struct SetCookie {
    name: String,
    value: String,
    attributes: Vec<(String, Option<String>)>,
}

impl SetCookie {
    fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;

        let attributes = parts
            .map(|part| match part.split_once('=') {
                Some((k, v)) => (k.trim().to_lowercase(), Some(v.trim().to_string())),
                None => (part.trim().to_lowercase(), None),
            })
            .collect();

        Some(Self {
            name: name.trim().to_string(),
            value: value.trim().to_string(),
            attributes,
        })
    }

    fn attr(&self, key: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.clone())
    }

    fn flag(&self, key: &str) -> bool {
        self.attributes.iter().any(|(k, _)| k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SilentReporter;

    fn ctx_with_body(body: &str) -> Context {
        ctx_with_response(HttpResponse {
            status: 200,
            headers: vec![],
            body: body.as_bytes().to_vec(),
        })
    }

    fn ctx_with_response(response: HttpResponse) -> Context {
        let mut ctx = Context::new(Config::default(), Rc::new(SilentReporter));
        ctx.set_response(response);
        ctx
    }

    #[test]
    fn test_var_get_set_unset() {
        let mut ctx = Context::new(Config::default(), Rc::new(SilentReporter));
        assert!(matches!(ctx.var("x"), Err(Error::Context(_))));

        ctx.set_var("x", Val::Int(1));
        assert_eq!(ctx.var("x").unwrap(), Val::Int(1));
        ctx.set_var("x", Val::Int(2));
        assert_eq!(ctx.var("x").unwrap(), Val::Int(2));

        ctx.unset("x");
        assert!(ctx.var("x").is_err());
    }

    #[test]
    fn test_status_and_header() {
        let mut ctx = ctx_with_response(HttpResponse {
            status: 404,
            headers: vec![("Content-Type".into(), "text/plain".into())],
            body: vec![],
        });
        assert_eq!(ctx.call("status", &[]).unwrap(), Val::Int(404));
        assert_eq!(
            ctx.call("header", &[Val::Str("content-type".into())]).unwrap(),
            Val::Str("text/plain".into())
        );
    }

    #[test]
    fn test_status_without_response_is_context_error() {
        let mut ctx = Context::new(Config::default(), Rc::new(SilentReporter));
        assert!(matches!(ctx.call("status", &[]), Err(Error::Context(_))));
    }

    #[test]
    fn test_jsonpath_count_and_exists() {
        let mut ctx = ctx_with_body(r#"{"a":[1,2,3]}"#);
        assert_eq!(
            ctx.jsonpath("$.a[*]", "count").unwrap(),
            Val::Int(3)
        );
        assert_eq!(
            ctx.jsonpath("$.missing", "exists").unwrap(),
            Val::Bool(false)
        );
        assert_eq!(
            ctx.jsonpath("$.a[*]", "exists").unwrap(),
            Val::Bool(true)
        );
    }

    #[test]
    fn test_jsonpath_text_shapes() {
        let mut ctx = ctx_with_body(r#"{"a":[1,2,3],"s":"x"}"#);
        // single scalar match
        assert_eq!(ctx.jsonpath("$.s", "text").unwrap(), Val::Str("x".into()));
        // multiple matches render as a JSON array string
        assert_eq!(
            ctx.jsonpath("$.a[*]", "text").unwrap(),
            Val::Str("[1,2,3]".into())
        );
        // zero matches
        assert_eq!(ctx.jsonpath("$.missing", "text").unwrap(), Val::Null);
        // first/last
        assert_eq!(ctx.jsonpath("$.a[*]", "first").unwrap(), Val::Int(1));
        assert_eq!(ctx.jsonpath("$.a[*]", "last").unwrap(), Val::Int(3));
        // len of the text rendering
        assert_eq!(ctx.jsonpath("$.a[*]", "len").unwrap(), Val::Int(7));
    }

    #[test]
    fn test_unknown_extract_mode_is_context_error() {
        let mut ctx = ctx_with_body(r#"{"a":1}"#);
        assert!(matches!(
            ctx.jsonpath("$.a", "whatever"),
            Err(Error::Context(_))
        ));
    }

    #[test]
    fn test_jsonbody_all_and_count() {
        let mut ctx = ctx_with_body(r#"{"a":1,"b":2}"#);
        assert_eq!(ctx.jsonbody("count").unwrap(), Val::Int(2));
        assert_eq!(
            ctx.jsonbody("all").unwrap(),
            Val::Map(vec![
                (Key::Name("a".into()), Val::Int(1)),
                (Key::Name("b".into()), Val::Int(2)),
            ])
        );
    }

    #[test]
    fn test_jsonbody_decode_failure() {
        let mut ctx = ctx_with_body("not json");
        assert!(matches!(ctx.jsonbody("all"), Err(Error::Context(_))));
    }

    #[test]
    fn test_body_is_cached_until_new_response() {
        let mut ctx = ctx_with_body("first");
        assert_eq!(ctx.body().unwrap(), "first");

        ctx.set_response(HttpResponse {
            status: 200,
            headers: vec![],
            body: b"second".to_vec(),
        });
        assert_eq!(ctx.body().unwrap(), "second");
    }

    #[test]
    fn test_xpath_text() {
        let mut ctx = ctx_with_body("<root><item>a</item><item>b</item></root>");
        assert_eq!(
            ctx.xpath("/root/item", "count").unwrap(),
            Val::Int(2)
        );
        assert_eq!(
            ctx.xpath("/root/item[1]", "text").unwrap(),
            Val::Str("a".into())
        );
    }

    #[test]
    fn test_cookie_attributes() {
        let mut ctx = ctx_with_response(HttpResponse {
            status: 200,
            headers: vec![(
                "Set-Cookie".into(),
                "session=abc123; Domain=example.com; Path=/; Max-Age=3600; Secure; HttpOnly".into(),
            )],
            body: vec![],
        });

        assert_eq!(
            ctx.cookie("session", "value").unwrap(),
            Val::Str("abc123".into())
        );
        assert_eq!(
            ctx.cookie("session", "domain").unwrap(),
            Val::Str("example.com".into())
        );
        assert_eq!(ctx.cookie("session", "max-age").unwrap(), Val::Int(3600));
        assert_eq!(ctx.cookie("session", "secure").unwrap(), Val::Bool(true));
        assert_eq!(ctx.cookie("session", "exists").unwrap(), Val::Bool(true));
        assert_eq!(ctx.cookie("missing", "value").unwrap(), Val::Bool(false));
        assert!(matches!(
            ctx.cookie("session", "nonsense"),
            Err(Error::Context(_))
        ));
    }

    #[test]
    fn test_env_with_default() {
        let mut ctx = Context::new(Config::default(), Rc::new(SilentReporter));
        let val = ctx
            .call(
                "env",
                &[
                    Val::Str("DOTREST_SURELY_UNSET_VAR".into()),
                    Val::Str("fallback".into()),
                ],
            )
            .unwrap();
        assert_eq!(val, Val::Str("fallback".into()));
    }

    #[test]
    fn test_duration_resets_timer() {
        let mut ctx = Context::new(Config::default(), Rc::new(SilentReporter));
        let first = ctx.duration("%s.%f");
        assert!(first.parse::<f64>().is_ok());
    }
}
