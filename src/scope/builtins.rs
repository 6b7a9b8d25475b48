//! The built-in default scope.
//!
//! Always appended last in a cell's scope list, so every binding here
//! can be shadowed by the host. `dom` is the bounded mutation surface
//! over the isolated subtree (create, append, query; no raw access).
//! `math` is the standard numeric set plus `clamp` and `factorial`.

use std::collections::HashMap;

use crate::cell::view::View;
use crate::markup::MarkupError;
use crate::script::ScriptError;

use super::{Scope, Value};

/// Builds the default scope bound to `view`'s subtree.
pub fn default_scope(view: &View) -> Scope {
    Scope::new()
        .with("dom", dom_map(view))
        .with("math", math_map())
}

// ── dom.* ────────────────────────────────────────────────

fn dom_map(view: &View) -> Value {
    Value::map([
        ("append", dom_append(view.clone())),
        ("appendChild", dom_append_child(view.clone())),
        ("createElement", dom_create_element(view.clone())),
        ("query", dom_query(view.clone())),
    ])
}

fn node_arg(args: &[Value], index: usize, fn_name: &str) -> Result<crate::markup::NodeId, ScriptError> {
    match args.get(index) {
        Some(Value::Node(id)) => Ok(*id),
        Some(other) => Err(ScriptError::Type(format!(
            "`{fn_name}` expected a node argument, got `{}`",
            other.type_name()
        ))),
        None => Err(ScriptError::Type(format!(
            "`{fn_name}` is missing a node argument"
        ))),
    }
}

fn text_arg(args: &[Value], index: usize, fn_name: &str) -> Result<String, ScriptError> {
    match args.get(index) {
        Some(Value::Text(t)) => Ok(t.clone()),
        Some(other) => Err(ScriptError::Type(format!(
            "`{fn_name}` expected a text argument, got `{}`",
            other.type_name()
        ))),
        None => Err(ScriptError::Type(format!(
            "`{fn_name}` is missing a text argument"
        ))),
    }
}

fn dom_fault(e: MarkupError) -> ScriptError {
    ScriptError::Fault(format!("dom operation failed: {e}"))
}

/// `dom.append(parent, ...children)`. Text children become text nodes.
fn dom_append(view: View) -> Value {
    Value::func(move |args| {
        let parent = node_arg(args, 0, "dom.append")?;
        for child in &args[1..] {
            let child = match child {
                Value::Node(id) => *id,
                Value::Text(text) => view.create_text(text),
                other => {
                    return Err(ScriptError::Type(format!(
                        "`dom.append` children must be nodes or text, got `{}`",
                        other.type_name()
                    )))
                }
            };
            view.append_child(parent, child).map_err(dom_fault)?;
        }
        Ok(Value::Null)
    })
}

/// `dom.appendChild(parent, child)`
fn dom_append_child(view: View) -> Value {
    Value::func(move |args| {
        let parent = node_arg(args, 0, "dom.appendChild")?;
        let child = node_arg(args, 1, "dom.appendChild")?;
        view.append_child(parent, child).map_err(dom_fault)?;
        Ok(Value::Node(child))
    })
}

/// `dom.createElement(name, options)`. `options` is accepted for
/// surface compatibility and ignored.
fn dom_create_element(view: View) -> Value {
    Value::func(move |args| {
        let name = text_arg(args, 0, "dom.createElement")?;
        let id = view.create_element(&name).map_err(dom_fault)?;
        Ok(Value::Node(id))
    })
}

/// `dom.query(parent, selector)`. Tag name or `#id`; null on miss.
fn dom_query(view: View) -> Value {
    Value::func(move |args| {
        let parent = node_arg(args, 0, "dom.query")?;
        let selector = text_arg(args, 1, "dom.query")?;
        match view.query(parent, &selector).map_err(dom_fault)? {
            Some(id) => Ok(Value::Node(id)),
            None => Ok(Value::Null),
        }
    })
}

// ── math.* ───────────────────────────────────────────────

fn math_map() -> Value {
    let mut map = HashMap::new();
    map.insert("pi".to_string(), Value::Number(std::f64::consts::PI));
    map.insert("e".to_string(), Value::Number(std::f64::consts::E));

    let unary: [(&str, fn(f64) -> f64); 21] = [
        ("abs", f64::abs),
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("round", f64::round),
        ("trunc", f64::trunc),
        ("sqrt", f64::sqrt),
        ("cbrt", f64::cbrt),
        ("sign", f64::signum),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("sinh", f64::sinh),
        ("cosh", f64::cosh),
        ("tanh", f64::tanh),
        ("exp", f64::exp),
        ("log", f64::ln),
        ("log2", f64::log2),
        ("log10", f64::log10),
    ];
    for (name, f) in unary {
        map.insert(name.to_string(), math_unary(name, f));
    }

    map.insert("pow".to_string(), math_pow());
    map.insert("atan2".to_string(), math_binary("atan2", f64::atan2));
    map.insert("hypot".to_string(), math_binary("hypot", f64::hypot));
    map.insert("min".to_string(), math_fold("min", f64::min, f64::INFINITY));
    map.insert(
        "max".to_string(),
        math_fold("max", f64::max, f64::NEG_INFINITY),
    );
    map.insert("clamp".to_string(), math_clamp());
    map.insert("factorial".to_string(), math_factorial());
    Value::Map(map)
}

fn num_arg(args: &[Value], index: usize, arg_name: &str, fn_name: &str) -> Result<f64, ScriptError> {
    args.get(index)
        .and_then(Value::as_number)
        .ok_or_else(|| {
            ScriptError::Type(format!(
                "invalid data type for the `{arg_name}` argument of `{fn_name}`: expected `number`"
            ))
        })
}

fn math_unary(name: &'static str, f: fn(f64) -> f64) -> Value {
    Value::func(move |args| {
        let v = num_arg(args, 0, "value", &format!("math.{name}"))?;
        Ok(Value::Number(f(v)))
    })
}

fn math_pow() -> Value {
    Value::func(|args| {
        let base = num_arg(args, 0, "base", "math.pow")?;
        let exp = num_arg(args, 1, "exponent", "math.pow")?;
        Ok(Value::Number(base.powf(exp)))
    })
}

fn math_binary(name: &'static str, f: fn(f64, f64) -> f64) -> Value {
    Value::func(move |args| {
        let a = num_arg(args, 0, "a", &format!("math.{name}"))?;
        let b = num_arg(args, 1, "b", &format!("math.{name}"))?;
        Ok(Value::Number(f(a, b)))
    })
}

fn math_fold(name: &'static str, f: fn(f64, f64) -> f64, seed: f64) -> Value {
    Value::func(move |args| {
        let mut acc = seed;
        for (i, arg) in args.iter().enumerate() {
            let v = arg.as_number().ok_or_else(|| {
                ScriptError::Type(format!(
                    "argument {i} of `math.{name}` is not numeric-coercible"
                ))
            })?;
            acc = f(acc, v);
        }
        Ok(Value::Number(acc))
    })
}

/// `math.clamp(value, min = -∞, max = +∞)`. NaN is not a valid
/// argument, whether passed directly or coerced from text.
fn math_clamp() -> Value {
    fn arg(
        args: &[Value],
        index: usize,
        arg_name: &str,
        default: Option<f64>,
    ) -> Result<f64, ScriptError> {
        let type_error = || {
            ScriptError::Type(format!(
                "invalid data type for the `{arg_name}` argument of `math.clamp`: expected `number`"
            ))
        };
        match args.get(index) {
            Some(v) => v
                .as_number()
                .filter(|n| !n.is_nan())
                .ok_or_else(type_error),
            None => default.ok_or_else(type_error),
        }
    }
    Value::func(|args| {
        let value = arg(args, 0, "value", None)?;
        let min = arg(args, 1, "min", Some(f64::NEG_INFINITY))?;
        let max = arg(args, 2, "max", Some(f64::INFINITY))?;
        Ok(Value::Number(if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        }))
    })
}

/// `math.factorial(n)`. Integer-valued numbers only, `1` for `n <= 1`.
/// Unlike `clamp`, non-number inputs are rejected outright, never
/// coerced.
fn math_factorial() -> Value {
    Value::func(|args| {
        let n = match args.first() {
            Some(Value::Number(n)) if n.is_finite() => *n,
            Some(other) => {
                return Err(ScriptError::Type(format!(
                    "`math.factorial` expected argument of type `number`, got `{}`",
                    other.type_name()
                )))
            }
            None => {
                return Err(ScriptError::Type(
                    "`math.factorial` is missing its argument".to_string(),
                ))
            }
        };
        if n.fract() != 0.0 {
            return Err(ScriptError::Type(
                "`math.factorial` requires an integer value".to_string(),
            ));
        }
        let mut acc = 1.0;
        if n > 1.0 {
            let mut i = 2.0;
            while i <= n {
                acc *= i;
                i += 1.0;
            }
        }
        Ok(Value::Number(acc))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::resolve;

    fn call(scope: &Scope, path: [&str; 2], args: &[Value]) -> Result<Value, ScriptError> {
        let Some(Value::Map(map)) = scope.get(path[0]) else {
            panic!("missing map {}", path[0]);
        };
        let Some(Value::Func(f)) = map.get(path[1]) else {
            panic!("missing function {}", path[1]);
        };
        f(args)
    }

    fn scope() -> (Scope, View) {
        let (view, _rx) = View::new();
        (default_scope(&view), view)
    }

    // ── math.clamp ──────────────────────────────────────

    #[test]
    fn test_clamp_within_range() {
        let (s, _v) = scope();
        let args = [Value::Number(5.0), Value::Number(0.0), Value::Number(10.0)];
        assert_eq!(call(&s, ["math", "clamp"], &args).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn test_clamp_below_and_above() {
        let (s, _v) = scope();
        assert_eq!(
            call(
                &s,
                ["math", "clamp"],
                &[Value::Number(-1.0), Value::Number(0.0), Value::Number(10.0)]
            )
            .unwrap(),
            Value::Number(0.0)
        );
        assert_eq!(
            call(
                &s,
                ["math", "clamp"],
                &[Value::Number(11.0), Value::Number(0.0), Value::Number(10.0)]
            )
            .unwrap(),
            Value::Number(10.0)
        );
    }

    #[test]
    fn test_clamp_defaults_are_unbounded() {
        let (s, _v) = scope();
        assert_eq!(
            call(&s, ["math", "clamp"], &[Value::Number(1e9)]).unwrap(),
            Value::Number(1e9)
        );
    }

    #[test]
    fn test_clamp_rejects_non_numeric() {
        let (s, _v) = scope();
        let err = call(
            &s,
            ["math", "clamp"],
            &[
                Value::Text("x".to_string()),
                Value::Number(0.0),
                Value::Number(10.0),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::Type(_)));
    }

    #[test]
    fn test_clamp_rejects_nan() {
        let (s, _v) = scope();
        for nan in [Value::Number(f64::NAN), Value::Text("NaN".to_string())] {
            let err = call(
                &s,
                ["math", "clamp"],
                &[nan.clone(), Value::Number(0.0), Value::Number(10.0)],
            )
            .unwrap_err();
            assert!(matches!(err, ScriptError::Type(_)), "value {nan:?}");
            let err = call(
                &s,
                ["math", "clamp"],
                &[Value::Number(5.0), nan.clone(), Value::Number(10.0)],
            )
            .unwrap_err();
            assert!(matches!(err, ScriptError::Type(_)), "min {nan:?}");
        }
        // NaN produced inside the language, not just passed in.
        let inner = call(&s, ["math", "sqrt"], &[Value::Number(-1.0)]).unwrap();
        assert!(matches!(inner, Value::Number(n) if n.is_nan()));
        assert!(call(&s, ["math", "clamp"], &[inner, Value::Number(0.0)]).is_err());
    }

    // ── math.factorial ──────────────────────────────────

    #[test]
    fn test_factorial() {
        let (s, _v) = scope();
        assert_eq!(
            call(&s, ["math", "factorial"], &[Value::Number(5.0)]).unwrap(),
            Value::Number(120.0)
        );
        assert_eq!(
            call(&s, ["math", "factorial"], &[Value::Number(0.0)]).unwrap(),
            Value::Number(1.0)
        );
        assert_eq!(
            call(&s, ["math", "factorial"], &[Value::Number(-3.0)]).unwrap(),
            Value::Number(1.0)
        );
    }

    #[test]
    fn test_factorial_rejects_fractions_and_text() {
        let (s, _v) = scope();
        assert!(matches!(
            call(&s, ["math", "factorial"], &[Value::Number(2.5)]).unwrap_err(),
            ScriptError::Type(_)
        ));
        assert!(matches!(
            call(&s, ["math", "factorial"], &[Value::Text("5".to_string())]).unwrap_err(),
            ScriptError::Type(_)
        ));
    }

    // ── math misc ───────────────────────────────────────

    #[test]
    fn test_unary_and_fold() {
        let (s, _v) = scope();
        assert_eq!(
            call(&s, ["math", "abs"], &[Value::Number(-4.0)]).unwrap(),
            Value::Number(4.0)
        );
        assert_eq!(
            call(
                &s,
                ["math", "min"],
                &[Value::Number(3.0), Value::Number(1.0), Value::Number(2.0)]
            )
            .unwrap(),
            Value::Number(1.0)
        );
        assert_eq!(
            call(&s, ["math", "pow"], &[Value::Number(2.0), Value::Number(10.0)]).unwrap(),
            Value::Number(1024.0)
        );
    }

    #[test]
    fn test_standard_function_surface() {
        let (s, _v) = scope();
        assert_eq!(
            call(&s, ["math", "sin"], &[Value::Number(0.0)]).unwrap(),
            Value::Number(0.0)
        );
        assert_eq!(
            call(&s, ["math", "log2"], &[Value::Number(8.0)]).unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(
            call(&s, ["math", "cbrt"], &[Value::Number(27.0)]).unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(
            call(
                &s,
                ["math", "hypot"],
                &[Value::Number(3.0), Value::Number(4.0)]
            )
            .unwrap(),
            Value::Number(5.0)
        );
        assert_eq!(
            call(
                &s,
                ["math", "atan2"],
                &[Value::Number(0.0), Value::Number(1.0)]
            )
            .unwrap(),
            Value::Number(0.0)
        );
    }

    // ── dom.* ───────────────────────────────────────────

    #[test]
    fn test_dom_create_and_append() {
        let (s, view) = scope();
        let el = call(&s, ["dom", "createElement"], &[Value::Text("p".to_string())]).unwrap();
        call(&s, ["dom", "appendChild"], &[Value::Node(view.root()), el]).unwrap();
        assert_eq!(view.content(), "<p/>");
    }

    #[test]
    fn test_dom_append_text_children() {
        let (s, view) = scope();
        let el = call(&s, ["dom", "createElement"], &[Value::Text("p".to_string())]).unwrap();
        call(
            &s,
            ["dom", "append"],
            &[Value::Node(view.root()), el.clone(), Value::Text("hi".to_string())],
        )
        .unwrap();
        assert_eq!(view.content(), "<p/>hi");
    }

    #[test]
    fn test_dom_query() {
        let (s, view) = scope();
        view.set_content("<div><span id=\"x\"/></div>").unwrap();
        let found = call(
            &s,
            ["dom", "query"],
            &[Value::Node(view.root()), Value::Text("#x".to_string())],
        )
        .unwrap();
        assert!(matches!(found, Value::Node(_)));
        let missing = call(
            &s,
            ["dom", "query"],
            &[Value::Node(view.root()), Value::Text("em".to_string())],
        )
        .unwrap();
        assert_eq!(missing, Value::Null);
    }

    #[test]
    fn test_dom_type_errors() {
        let (s, _view) = scope();
        assert!(matches!(
            call(&s, ["dom", "createElement"], &[Value::Number(1.0)]).unwrap_err(),
            ScriptError::Type(_)
        ));
        assert!(matches!(
            call(&s, ["dom", "appendChild"], &[Value::Null, Value::Null]).unwrap_err(),
            ScriptError::Type(_)
        ));
    }

    #[test]
    fn test_default_scope_resolves_last() {
        let (view, _rx) = View::new();
        let scopes = vec![
            Scope::new().with("math", Value::Text("shadowed".to_string())),
            default_scope(&view),
        ];
        // Host binding listed first wins the collision.
        assert_eq!(
            resolve(&scopes, "math"),
            Some(&Value::Text("shadowed".to_string()))
        );
        assert!(matches!(resolve(&scopes, "dom"), Some(Value::Map(_))));
    }
}
