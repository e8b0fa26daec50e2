//! Core types for spark-bind.
//!
//! View models are dynamically shaped: a binding expression such as
//! `$parents[1].name` has to walk whatever the application hands us. Every
//! piece of view-model data is therefore a [`Value`].
//!
//! Objects and arrays are shared handles with interior mutability, so a view
//! model can change an object in place and then force its observable to
//! re-notify (see [`crate::state::Observable::value_has_mutated`]).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::state::Observable;

// =============================================================================
// Handles
// =============================================================================

/// Shared, mutable, insertion-ordered object.
pub type Object = Rc<RefCell<IndexMap<String, Value>>>;

/// Shared, mutable array.
pub type Array = Rc<RefCell<Vec<Value>>>;

/// A callable view-model member (click handlers and the like).
#[derive(Clone)]
pub struct Function(Rc<dyn Fn(&[Value]) -> Value>);

impl Function {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke with positional arguments.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({:p})", Rc::as_ptr(&self.0))
    }
}

// =============================================================================
// Value
// =============================================================================

/// A dynamically typed view-model value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(Object),
    Array(Array),
    Observable(Observable),
    Function(Function),
}

impl Value {
    /// Build an object from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let map: IndexMap<String, Value> = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Object(Rc::new(RefCell::new(map)))
    }

    /// Build an array.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// Build a string value.
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    /// Build a function value.
    pub fn function(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Value::Function(Function::new(f))
    }

    /// Convert JSON into a value. Objects keep their key order.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from_json)),
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from_json(v))))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Classification
    // -------------------------------------------------------------------------

    /// Primitive values compare by content; everything else by identity.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Truthiness. Observables are judged by their current value (untracked).
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Observable(obs) => obs.peek().is_truthy(),
            Value::Object(_) | Value::Array(_) | Value::Function(_) => true,
        }
    }

    /// Both values are primitives and equal. Mirrors the write-suppression
    /// rule observables use: objects are never "equal", so writing one always
    /// notifies.
    pub fn primitive_eq(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::String(x), Value::String(y)) => x == y,
            _ => false,
        }
    }

    /// Same primitive content, or the same shared allocation.
    pub fn identical(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
            (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(x, y),
            (Value::Observable(x), Value::Observable(y)) => x.ptr_eq(y),
            (Value::Function(x), Value::Function(y)) => x.ptr_eq(y),
            _ => Value::primitive_eq(a, b),
        }
    }

    // -------------------------------------------------------------------------
    // Access
    // -------------------------------------------------------------------------

    /// Read through an observable (tracked); other values are returned as is.
    pub fn read(&self) -> Value {
        match self {
            Value::Observable(obs) => obs.get(),
            other => other.clone(),
        }
    }

    /// Read through an observable without registering a dependency.
    pub fn peek(&self) -> Value {
        match self {
            Value::Observable(obs) => obs.peek(),
            other => other.clone(),
        }
    }

    pub fn as_observable(&self) -> Option<&Observable> {
        match self {
            Value::Observable(obs) => Some(obs),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Property of an object. Anything else has no properties.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(map) => map.borrow().get(key).cloned().unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    /// Set a property on an object in place. Returns false for non-objects.
    pub fn set(&self, key: impl Into<String>, value: Value) -> bool {
        match self {
            Value::Object(map) => {
                map.borrow_mut().insert(key.into(), value);
                true
            }
            _ => false,
        }
    }

    /// Text form used by the `text` and `value` bindings.
    pub fn to_text(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Array(items) => items
                .borrow()
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(","),
            Value::Observable(obs) => obs.peek().to_text(),
            Value::Function(_) => "function".to_string(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(map) => match map.try_borrow() {
                Ok(map) => f.debug_map().entries(map.iter()).finish(),
                Err(_) => write!(f, "{{<borrowed>}}"),
            },
            Value::Array(items) => match items.try_borrow() {
                Ok(items) => f.debug_list().entries(items.iter()).finish(),
                Err(_) => write!(f, "[<borrowed>]"),
            },
            Value::Observable(obs) => write!(f, "{:?}", obs),
            Value::Function(func) => write!(f, "{:?}", func),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<Observable> for Value {
    fn from(value: Observable) -> Self {
        Value::Observable(value)
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Value::Function(value)
    }
}

// =============================================================================
// Tests
// =============================================================================
