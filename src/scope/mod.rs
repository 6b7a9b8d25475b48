//! Capability scopes: the only way sandboxed scripts reach the outside
//! world.
//!
//! A [`Scope`] is a bundle of named values and functions deliberately
//! exposed to untrusted code. Scripts never see ambient globals; every
//! capability they can touch appears in the ordered scope list a cell
//! assembles at construction. Resolution searches that list front to
//! back and the first binding wins: host scopes (listed first) have
//! the highest shadowing priority, the component's own `view` scope
//! sits in the middle, and the built-in default scope (listed last)
//! has the lowest. This precedence is part of the public contract.

pub mod builtins;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::markup::NodeId;
use crate::script::ScriptError;

/// A capability function. Receives evaluated arguments, returns a
/// value or a script-level error.
pub type CapFn = Arc<dyn Fn(&[Value]) -> Result<Value, ScriptError> + Send + Sync>;

/// Values that cross the sandbox boundary.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// Opaque handle into the cell's isolated subtree. Only the `dom`
    /// capability can do anything with it.
    Node(NodeId),
    Map(HashMap<String, Value>),
    Func(CapFn),
}

impl Value {
    pub fn func(f: impl Fn(&[Value]) -> Result<Value, ScriptError> + Send + Sync + 'static) -> Self {
        Value::Func(Arc::new(f))
    }

    pub fn map(entries: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Node(_) => "node",
            Value::Map(_) => "map",
            Value::Func(_) => "function",
        }
    }

    /// Numeric coercion: numbers pass through, booleans become 0/1,
    /// text parses as a float. Everything else is not coercible.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(t) => t.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(t) => write!(f, "{t:?}"),
            Value::Node(id) => write!(f, "node({})", id.0),
            Value::Map(m) => {
                let mut keys: Vec<&str> = m.keys().map(String::as_str).collect();
                keys.sort_unstable();
                write!(f, "map{{{}}}", keys.join(", "))
            }
            Value::Func(_) => write!(f, "<function>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            _ => false,
        }
    }
}

/// One bundle of capabilities: a flat mapping from name to value.
#[derive(Clone, Default)]
pub struct Scope {
    bindings: HashMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_tuple("Scope").field(&names).finish()
    }
}

/// Resolves `name` against an ordered scope list. First binding wins.
pub fn resolve<'a>(scopes: &'a [Scope], name: &str) -> Option<&'a Value> {
    scopes.iter().find_map(|scope| scope.get(name))
}

/// Binding names must be plain identifiers so every capability is
/// reachable from script source.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_first_binding_wins() {
        let scopes = vec![
            Scope::new().with("x", Value::Number(1.0)),
            Scope::new().with("x", Value::Number(2.0)),
        ];
        assert_eq!(resolve(&scopes, "x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_resolve_falls_through() {
        let scopes = vec![
            Scope::new().with("x", Value::Number(1.0)),
            Scope::new().with("y", Value::Text("hi".to_string())),
        ];
        assert_eq!(resolve(&scopes, "y"), Some(&Value::Text("hi".to_string())));
        assert_eq!(resolve(&scopes, "z"), None);
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::Number(5.0).as_number(), Some(5.0));
        assert_eq!(Value::Bool(true).as_number(), Some(1.0));
        assert_eq!(Value::Text(" 2.5 ".to_string()).as_number(), Some(2.5));
        assert_eq!(Value::Text("x".to_string()).as_number(), None);
        assert_eq!(Value::Null.as_number(), None);
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("view"));
        assert!(is_valid_name("_private"));
        assert!(is_valid_name("dom2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("2fast"));
        assert!(!is_valid_name("a-b"));
        assert!(!is_valid_name("a.b"));
    }
}
