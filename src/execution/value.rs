//! Textual value expressions
//!
//! A [`Value`] wraps one textual expression and resolves it lazily into a
//! [`Val`]. The grammar probes a fixed priority order: null, number,
//! quoted string, boolean, collection, variable reference, function call
//! (bare or `{wrapped}`), file embed, and finally the literal text with
//! placeholders substituted.
//!
//! Resolution is memoized per instance: the first result is frozen and
//! every later `resolve` on the same `Value` returns it unchanged, even if
//! context state moved on. Callers rely on this to compare one operand
//! several times within a single directive without re-firing side effects
//! (a `duration` call, say).

use std::cell::RefCell;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::Error;
use crate::reading::Line;

use super::context::{Context, FUNCTIONS};
use super::val::{Key, Val};

pub struct Value {
    pub expression: String,
    resolved: RefCell<Option<Val>>,
}

impl Value {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            resolved: RefCell::new(None),
        }
    }

    /// Resolve the expression, caching the result on first call.
    pub fn resolve(&self, line: &Line, ctx: &mut Context) -> Result<Val, Error> {
        if let Some(v) = self.resolved.borrow().as_ref() {
            return Ok(v.clone());
        }

        let result = self.classify(line, ctx).map_err(|e| {
            Error::syntax(
                format!(
                    "Failed to resolve value [{}]. Reason: {e}",
                    self.expression.trim()
                ),
                line,
            )
        })?;

        *self.resolved.borrow_mut() = Some(result.clone());
        Ok(result)
    }

    fn classify(&self, line: &Line, ctx: &mut Context) -> Result<Val, Error> {
        let expr = self.expression.as_str();

        if expr.eq_ignore_ascii_case("null") {
            return Ok(Val::Null);
        }
        if let Some(num) = parse_number(expr) {
            return Ok(num);
        }
        if let Some(inner) = quoted(expr) {
            return Ok(Val::Str(inner.to_string()));
        }
        if expr.eq_ignore_ascii_case("true") {
            return Ok(Val::Bool(true));
        }
        if expr.eq_ignore_ascii_case("false") {
            return Ok(Val::Bool(false));
        }
        if expr.starts_with('[') && expr.ends_with(']') {
            return self.to_collection(line, ctx);
        }
        if let Some(name) = expr.strip_prefix("{{").and_then(|e| e.strip_suffix("}}")) {
            return ctx.var(name.trim());
        }
        if let Some((name, args)) = match_function(expr) {
            return call_function(expr, name, args, line, ctx);
        }
        if let Some(inner) = expr.strip_prefix('{').and_then(|e| e.strip_suffix('}')) {
            let inner = inner.trim();
            if let Some((name, args)) = match_function(inner) {
                return call_function(inner, name, args, line, ctx);
            }
        }
        if let Some(path) = file_embed_path(expr) {
            return read_embedded_file(path, line, ctx);
        }

        // `\<` escapes the file-embed marker; unescape it in the literal
        let text = replace_placeholders(expr, ctx, line)?;
        Ok(Val::Str(text.replace("\\<", "<")))
    }

    /// `[a, b => c, ...]` — split on top-level unescaped commas, resolve
    /// both sides of each `=>` pair, key positional entries by their index
    /// among all entries.
    fn to_collection(&self, line: &Line, ctx: &mut Context) -> Result<Val, Error> {
        let inner = &self.expression[1..self.expression.len() - 1];
        if inner.trim().is_empty() {
            return Ok(Val::Map(Vec::new()));
        }

        let mut entries = Vec::new();
        for (i, token) in split_unescaped_commas(inner).into_iter().enumerate() {
            let token = unescape_commas(token.trim());
            match token.split_once("=>") {
                Some((key, value)) => {
                    let key = Value::new(key.trim()).resolve(line, ctx)?.stringify();
                    let value = Value::new(value.trim()).resolve(line, ctx)?;
                    entries.push((Key::Name(key), value));
                }
                None => {
                    let value = Value::new(token).resolve(line, ctx)?;
                    entries.push((Key::Index(i), value));
                }
            }
        }
        Ok(Val::Map(entries))
    }
}

/* ===================== Grammar probes ===================== */

/// Numeric literal. Integer when the value round-trips through an integer
/// cast (`42`, but also `42.0`), float otherwise.
fn parse_number(expr: &str) -> Option<Val> {
    let t = expr.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(i) = t.parse::<i64>() {
        return Some(Val::Int(i));
    }
    let f = t.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(Val::Int(f as i64))
    } else {
        Some(Val::Float(f))
    }
}

/// Boundary quotes stripped, inner content untouched.
fn quoted(expr: &str) -> Option<&str> {
    if expr.len() >= 2 && expr.starts_with('"') && expr.ends_with('"') {
        Some(&expr[1..expr.len() - 1])
    } else {
        None
    }
}

/// Bare built-in call: a known function name alone, or followed by
/// whitespace and an argument string.
fn match_function(expr: &str) -> Option<(&'static str, &str)> {
    for name in FUNCTIONS {
        if expr == *name {
            return Some((name, ""));
        }
        if let Some(rest) = expr.strip_prefix(name) {
            if rest.starts_with(char::is_whitespace) {
                return Some((name, rest.trim()));
            }
        }
    }
    None
}

/// `< path` — leading whitespace allowed, the `<` must not be escaped.
pub fn file_embed_path(expr: &str) -> Option<&str> {
    let t = expr.trim_start();
    let rest = t.strip_prefix('<')?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let path = rest.trim();
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

/* ===================== Dispatch ===================== */

fn call_function(
    expr: &str,
    name: &str,
    args: &str,
    line: &Line,
    ctx: &mut Context,
) -> Result<Val, Error> {
    let mut resolved = Vec::new();
    if !args.trim().is_empty() {
        let tokens = split_unescaped_commas(args);
        if tokens.len() > 2 {
            return Err(Error::syntax(
                format!(
                    "Too many arguments for function [{expr}]. \
                     NOTE! The comma character must be escaped in a string argument."
                ),
                line,
            ));
        }
        for token in tokens {
            let token = unescape_commas(token.trim());
            resolved.push(Value::new(token).resolve(line, ctx)?);
        }
    }
    ctx.call(name, &resolved)
}

/// Resolve a file embed: placeholders substituted in the path, relative
/// paths anchored at the directory of the line's source file.
fn read_embedded_file(path: &str, line: &Line, ctx: &mut Context) -> Result<Val, Error> {
    let path = replace_placeholders(path, ctx, line)?;
    let resolved = if Path::new(&path).is_absolute() {
        Path::new(&path).to_path_buf()
    } else {
        line.dir().join(&path)
    };

    let content = std::fs::read_to_string(&resolved)
        .map_err(|e| Error::syntax(format!("{}: {e}", resolved.display()), line))?;
    Ok(Val::Str(content))
}

/* ===================== Placeholder substitution ===================== */

fn var_placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\w+\}\}").expect("static regex"))
}

fn func_placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let names = FUNCTIONS.join("|");
        Regex::new(&format!(r"\{{\s*(?:{names})\b[^}}]*\}}")).expect("static regex")
    })
}

/// Substitute every `{{variable}}` and `{ function ... }` placeholder in a
/// string with its resolved, stringified value.
pub fn replace_placeholders(text: &str, ctx: &mut Context, line: &Line) -> Result<String, Error> {
    let pass = |re: &Regex, text: &str, ctx: &mut Context| -> Result<String, Error> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in re.find_iter(text) {
            out.push_str(&text[last..m.start()]);
            out.push_str(&Value::new(m.as_str()).resolve(line, ctx)?.stringify());
            last = m.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    };

    let text = pass(var_placeholder_re(), text, ctx)?;
    pass(func_placeholder_re(), &text, ctx)
}

/* ===================== Comma splitting ===================== */

/// Split on commas that are not backslash-escaped, not inside double
/// quotes, and not inside nested brackets. Shared by collections, function
/// arguments, and the assertion parser.
pub fn split_unescaped_commas(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for c in s.chars() {
        if c == ',' && !escaped && !in_string && depth == 0 {
            parts.push(std::mem::take(&mut current));
            escaped = false;
            continue;
        }
        match c {
            '"' if !escaped => in_string = !in_string,
            '[' | '{' if !in_string => depth += 1,
            ']' | '}' if !in_string => depth = depth.saturating_sub(1),
            _ => {}
        }
        escaped = c == '\\' && !escaped;
        current.push(c);
    }
    parts.push(current);
    parts
}

pub fn unescape_commas(s: &str) -> String {
    s.replace("\\,", ",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::output::SilentReporter;
    use std::io::Write;
    use std::rc::Rc;

    fn ctx() -> Context {
        Context::new(Config::default(), Rc::new(SilentReporter))
    }

    fn line() -> Line {
        Line::new("test.rest", 1, "")
    }

    fn resolve(expr: &str, ctx: &mut Context) -> Val {
        Value::new(expr).resolve(&line(), ctx).unwrap()
    }

    #[test]
    fn test_resolve_null() {
        let mut c = ctx();
        assert_eq!(resolve("null", &mut c), Val::Null);
        assert_eq!(resolve("NULL", &mut c), Val::Null);
    }

    #[test]
    fn test_resolve_int() {
        let mut c = ctx();
        assert_eq!(resolve("42", &mut c), Val::Int(42));
        assert_eq!(resolve("-7", &mut c), Val::Int(-7));
        // integral floats round-trip through the integer cast
        assert_eq!(resolve("42.0", &mut c), Val::Int(42));
    }

    #[test]
    fn test_resolve_float() {
        let mut c = ctx();
        assert_eq!(resolve("4.2", &mut c), Val::Float(4.2));
    }

    #[test]
    fn test_resolve_bool() {
        let mut c = ctx();
        assert_eq!(resolve("true", &mut c), Val::Bool(true));
        assert_eq!(resolve("TRUE", &mut c), Val::Bool(true));
        assert_eq!(resolve("fAlSe", &mut c), Val::Bool(false));
    }

    #[test]
    fn test_resolve_quoted_string_keeps_inner_raw() {
        let mut c = ctx();
        assert_eq!(resolve(r#""42""#, &mut c), Val::Str("42".into()));
        assert_eq!(
            resolve(r#""my "q" s'tring""#, &mut c),
            Val::Str(r#"my "q" s'tring"#.into())
        );
    }

    #[test]
    fn test_resolve_list() {
        let mut c = ctx();
        assert_eq!(
            resolve(r#"[1, "str", true]"#, &mut c),
            Val::Map(vec![
                (Key::Index(0), Val::Int(1)),
                (Key::Index(1), Val::Str("str".into())),
                (Key::Index(2), Val::Bool(true)),
            ])
        );
    }

    #[test]
    fn test_resolve_map_mixed_keys() {
        let mut c = ctx();
        // positional entries take their index among all entries
        assert_eq!(
            resolve(r#"[a => 1, "b c" => 2, d]"#, &mut c),
            Val::Map(vec![
                (Key::Name("a".into()), Val::Int(1)),
                (Key::Name("b c".into()), Val::Int(2)),
                (Key::Index(2), Val::Str("d".into())),
            ])
        );
    }

    #[test]
    fn test_escaped_comma_is_literal() {
        let mut c = ctx();
        assert_eq!(
            resolve(r#"[a\,b, c]"#, &mut c),
            Val::Map(vec![
                (Key::Index(0), Val::Str("a,b".into())),
                (Key::Index(1), Val::Str("c".into())),
            ])
        );
    }

    #[test]
    fn test_nested_collection() {
        let mut c = ctx();
        assert_eq!(
            resolve("[1, [2, 3]]", &mut c),
            Val::Map(vec![
                (Key::Index(0), Val::Int(1)),
                (
                    Key::Index(1),
                    Val::Map(vec![
                        (Key::Index(0), Val::Int(2)),
                        (Key::Index(1), Val::Int(3)),
                    ])
                ),
            ])
        );
    }

    #[test]
    fn test_resolve_var() {
        let mut c = ctx();
        c.set_var("myVar1", Val::Int(42));
        assert_eq!(resolve("{{myVar1}}", &mut c), Val::Int(42));
    }

    #[test]
    fn test_undefined_var_is_syntax_error_with_line() {
        let mut c = ctx();
        let err = Value::new("{{nope}}").resolve(&line(), &mut c).unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_resolve_func_variants() {
        let mut c = ctx();
        c.set_var("myVar1", Val::Int(42));
        c.set_var("myVar2", Val::Str("myVar1".into()));

        assert_eq!(resolve("var myVar1", &mut c), Val::Int(42));
        assert_eq!(resolve(r#"var "myVar1""#, &mut c), Val::Int(42));
        // argument itself resolves through the grammar
        assert_eq!(resolve("var {{myVar2}}", &mut c), Val::Int(42));
        // wrapped form
        assert_eq!(resolve("{var myVar1}", &mut c), Val::Int(42));
    }

    #[test]
    fn test_func_set_variant() {
        let mut c = ctx();
        assert_eq!(resolve("var token, 99", &mut c), Val::Int(99));
        assert_eq!(c.var("token").unwrap(), Val::Int(99));
    }

    #[test]
    fn test_too_many_args_is_syntax_error() {
        let mut c = ctx();
        let err = Value::new("var a, b, c").resolve(&line(), &mut c).unwrap_err();
        assert!(err.to_string().contains("escaped"));
    }

    #[test]
    fn test_bare_name_prefix_is_not_a_func() {
        let mut c = ctx();
        // "variable" starts with "var" but is not a call
        assert_eq!(resolve("variable", &mut c), Val::Str("variable".into()));
    }

    #[test]
    fn test_fallback_substitutes_placeholders() {
        let mut c = ctx();
        c.set_var("world", Val::Str("World".into()));
        assert_eq!(
            resolve("Hello {{world}}!", &mut c),
            Val::Str("Hello World!".into())
        );
        assert_eq!(
            resolve("Hello {var world}!", &mut c),
            Val::Str("Hello World!".into())
        );
        assert_eq!(
            resolve("Hello {{world}} {var world}!", &mut c),
            Val::Str("Hello World World!".into())
        );
    }

    #[test]
    fn test_memoization_freezes_first_result() {
        let mut c = ctx();
        c.set_var("x", Val::Int(1));

        let value = Value::new("{{x}}");
        assert_eq!(value.resolve(&line(), &mut c).unwrap(), Val::Int(1));

        c.set_var("x", Val::Int(2));
        // same instance: cached result, not the new binding
        assert_eq!(value.resolve(&line(), &mut c).unwrap(), Val::Int(1));
        // a fresh instance sees the new state
        assert_eq!(Value::new("{{x}}").resolve(&line(), &mut c).unwrap(), Val::Int(2));
    }

    #[test]
    fn test_file_embed_relative_to_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("data.txt")).unwrap();
        f.write_all(b"text file content").unwrap();

        let script_line = Line::new(dir.path().join("test.rest"), 1, "");
        let mut c = ctx();
        let val = Value::new("< data.txt").resolve(&script_line, &mut c).unwrap();
        assert_eq!(val, Val::Str("text file content".into()));
    }

    #[test]
    fn test_missing_embed_is_syntax_error() {
        let mut c = ctx();
        let err = Value::new("< nope.txt").resolve(&line(), &mut c).unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
    }

    #[test]
    fn test_escaped_embed_marker_is_literal() {
        let mut c = ctx();
        assert_eq!(
            resolve(r"\< not-a-file", &mut c),
            Val::Str("< not-a-file".into())
        );
    }

    #[test]
    fn test_file_embed_pattern() {
        assert_eq!(file_embed_path("< a.txt"), Some("a.txt"));
        assert_eq!(file_embed_path("  < a.txt"), Some("a.txt"));
        assert_eq!(file_embed_path("\\< a.txt"), None);
        assert_eq!(file_embed_path("<a.txt"), None);
        assert_eq!(file_embed_path("< "), None);
    }

    #[test]
    fn test_split_unescaped_commas() {
        assert_eq!(split_unescaped_commas("a, b"), vec!["a", " b"]);
        assert_eq!(split_unescaped_commas(r"a\,b, c"), vec![r"a\,b", " c"]);
        assert_eq!(split_unescaped_commas(r#""a,b", c"#), vec![r#""a,b""#, " c"]);
        assert_eq!(split_unescaped_commas("[1,2], 3"), vec!["[1,2]", " 3"]);
    }
}
