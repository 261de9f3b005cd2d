//! Resolved runtime values

use serde_json::Value as JsonValue;

/// Key of one collection entry.
///
/// Entries written as `key => value` get a `Name` key; positional entries
/// are keyed by their zero-based index among *all* entries of the
/// collection, keyed entries included.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl Key {
    pub fn as_string(&self) -> String {
        match self {
            Key::Index(i) => i.to_string(),
            Key::Name(n) => n.clone(),
        }
    }
}

/// Runtime value produced by resolving a textual expression.
///
/// A closed set: every value a script can observe is one of these variants.
/// Collections preserve insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Map(Vec<(Key, Val)>),
}

impl Val {
    /// Render the value the way it is written into strings: placeholders,
    /// echo output, header values, error messages.
    pub fn stringify(&self) -> String {
        match self {
            Val::Null => "null".to_string(),
            Val::Int(i) => i.to_string(),
            Val::Float(f) => f.to_string(),
            Val::Bool(b) => b.to_string(),
            Val::Str(s) => s.clone(),
            Val::Map(_) => serde_json::to_string(&self.to_json()).unwrap_or_default(),
        }
    }

    /// Numeric view, tolerating numeric strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Val::Int(i) => Some(*i as f64),
            Val::Float(f) => Some(*f),
            Val::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Loose equality: numeric comparison when both sides are numeric (so
    /// `"42" == 42` and `42 == 42.0` hold), plain equality otherwise.
    pub fn loose_eq(&self, other: &Val) -> bool {
        if self == other {
            return true;
        }
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a == b;
        }
        match (self, other) {
            (Val::Bool(b), v) | (v, Val::Bool(b)) => *b == v.is_truthy(),
            _ => false,
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            Val::Null => false,
            Val::Bool(b) => *b,
            Val::Int(i) => *i != 0,
            Val::Float(f) => *f != 0.0,
            Val::Str(s) => !s.is_empty() && s != "0",
            Val::Map(m) => !m.is_empty(),
        }
    }

    /// Ordering comparison for `>` / `>=` / `<` / `<=`: numeric when both
    /// sides are numeric, lexicographic when both are strings.
    pub fn compare(&self, other: &Val) -> Option<std::cmp::Ordering> {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.partial_cmp(&b);
        }
        match (self, other) {
            (Val::Str(a), Val::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Convert to a JSON value. A map whose keys are the contiguous indices
    /// `0..n` renders as a JSON array, anything else as an object.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Val::Null => JsonValue::Null,
            Val::Int(i) => JsonValue::from(*i),
            Val::Float(f) => JsonValue::from(*f),
            Val::Bool(b) => JsonValue::from(*b),
            Val::Str(s) => JsonValue::from(s.clone()),
            Val::Map(entries) => {
                let is_list = entries
                    .iter()
                    .enumerate()
                    .all(|(i, (k, _))| matches!(k, Key::Index(n) if *n == i));
                if is_list {
                    JsonValue::Array(entries.iter().map(|(_, v)| v.to_json()).collect())
                } else {
                    let mut obj = serde_json::Map::new();
                    for (k, v) in entries {
                        obj.insert(k.as_string(), v.to_json());
                    }
                    JsonValue::Object(obj)
                }
            }
        }
    }

    pub fn from_json(json: &JsonValue) -> Val {
        match json {
            JsonValue::Null => Val::Null,
            JsonValue::Bool(b) => Val::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Val::Int(i)
                } else {
                    Val::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Val::Str(s.clone()),
            JsonValue::Array(items) => Val::Map(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (Key::Index(i), Val::from_json(v)))
                    .collect(),
            ),
            JsonValue::Object(obj) => Val::Map(
                obj.iter()
                    .map(|(k, v)| (Key::Name(k.clone()), Val::from_json(v)))
                    .collect(),
            ),
        }
    }
}
