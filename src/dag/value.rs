//! Option values attached to graph nodes.
//!
//! `Options` keeps insertion order because it is also the rendering order of
//! both code generators. `Value` compares and hashes structurally; floats
//! compare by bit pattern so a `Value` can live inside a hashed node.

use crate::dag::error::{GraphError, GraphResult};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single option value.
#[derive(Debug, Clone)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Expression over sibling options, evaluated when the node is emitted.
    Lazy(LazyValue),
}

impl Value {
    /// Numeric view used by lazy evaluation. Booleans count as 0/1.
    fn as_number(&self) -> Option<Number> {
        match self {
            Value::Int(v) => Some(Number::Int(*v)),
            Value::Float(v) => Some(Number::Float(*v)),
            Value::Bool(v) => Some(Number::Int(i64::from(*v))),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Lazy(a), Value::Lazy(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Str(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Bool(v) => v.hash(state),
            Value::Lazy(v) => v.hash(state),
        }
    }
}

/// Plain textual form, as the external tool expects it.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(v) => f.write_str(v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Lazy(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<LazyValue> for Value {
    fn from(v: LazyValue) -> Self {
        Value::Lazy(v)
    }
}

// ==================== Lazy expressions ====================

/// A deferred arithmetic expression over the other options of the same node.
///
/// `LazyValue::reference("n").mul(2)` renders as `2 * n` once the node's
/// `n` option is known.
#[derive(Debug, Clone)]
pub enum LazyValue {
    Ref(String),
    Int(i64),
    Float(f64),
    Add(Box<LazyValue>, Box<LazyValue>),
    Sub(Box<LazyValue>, Box<LazyValue>),
    Mul(Box<LazyValue>, Box<LazyValue>),
    Div(Box<LazyValue>, Box<LazyValue>),
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Number::Int(v) => Value::Int(v),
            Number::Float(v) => Value::Float(v),
        }
    }
}

impl LazyValue {
    pub fn reference(key: impl Into<String>) -> Self {
        LazyValue::Ref(key.into())
    }

    pub fn add(self, rhs: impl Into<LazyValue>) -> Self {
        LazyValue::Add(Box::new(self), Box::new(rhs.into()))
    }

    pub fn sub(self, rhs: impl Into<LazyValue>) -> Self {
        LazyValue::Sub(Box::new(self), Box::new(rhs.into()))
    }

    pub fn mul(self, rhs: impl Into<LazyValue>) -> Self {
        LazyValue::Mul(Box::new(self), Box::new(rhs.into()))
    }

    pub fn div(self, rhs: impl Into<LazyValue>) -> Self {
        LazyValue::Div(Box::new(self), Box::new(rhs.into()))
    }

    /// Evaluate against `options`. `key` names the option being resolved and
    /// is only used for error reporting.
    pub fn eval(&self, key: &str, options: &Options) -> GraphResult<Value> {
        self.eval_number(key, options, 0).map(Number::into_value)
    }

    fn eval_number(&self, key: &str, options: &Options, depth: usize) -> GraphResult<Number> {
        // A reference chain longer than the option list must loop back on itself.
        if depth > options.len() + 1 {
            return Err(lazy_error(key, "self-referencing expression"));
        }

        let binary = |a: &LazyValue, b: &LazyValue| -> GraphResult<(Number, Number)> {
            Ok((
                a.eval_number(key, options, depth)?,
                b.eval_number(key, options, depth)?,
            ))
        };

        match self {
            LazyValue::Int(v) => Ok(Number::Int(*v)),
            LazyValue::Float(v) => Ok(Number::Float(*v)),
            LazyValue::Ref(name) => match options.get(name) {
                None => Err(lazy_error(key, format!("unknown option '{}'", name))),
                Some(Value::Lazy(inner)) => inner.eval_number(key, options, depth + 1),
                Some(value) => value
                    .as_number()
                    .ok_or_else(|| lazy_error(key, format!("option '{}' is not numeric", name))),
            },
            LazyValue::Add(a, b) => {
                let (a, b) = binary(a, b)?;
                Ok(arith(a, b, i64::checked_add, |x, y| x + y))
            }
            LazyValue::Sub(a, b) => {
                let (a, b) = binary(a, b)?;
                Ok(arith(a, b, i64::checked_sub, |x, y| x - y))
            }
            LazyValue::Mul(a, b) => {
                let (a, b) = binary(a, b)?;
                Ok(arith(a, b, i64::checked_mul, |x, y| x * y))
            }
            LazyValue::Div(a, b) => {
                let (a, b) = binary(a, b)?;
                match (a, b) {
                    (_, Number::Int(0)) => Err(lazy_error(key, "division by zero")),
                    (Number::Int(x), Number::Int(y)) if x % y == 0 => Ok(Number::Int(x / y)),
                    (x, y) => Ok(Number::Float(x.as_f64() / y.as_f64())),
                }
            }
        }
    }
}

fn arith(
    a: Number,
    b: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Number {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => match int_op(x, y) {
            Some(v) => Number::Int(v),
            None => Number::Float(float_op(x as f64, y as f64)),
        },
        (x, y) => Number::Float(float_op(x.as_f64(), y.as_f64())),
    }
}

fn lazy_error(key: &str, message: impl Into<String>) -> GraphError {
    GraphError::LazyEval {
        key: key.to_string(),
        message: message.into(),
    }
}

impl From<i64> for LazyValue {
    fn from(v: i64) -> Self {
        LazyValue::Int(v)
    }
}

impl From<i32> for LazyValue {
    fn from(v: i32) -> Self {
        LazyValue::Int(i64::from(v))
    }
}

impl From<f64> for LazyValue {
    fn from(v: f64) -> Self {
        LazyValue::Float(v)
    }
}

impl PartialEq for LazyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LazyValue::Ref(a), LazyValue::Ref(b)) => a == b,
            (LazyValue::Int(a), LazyValue::Int(b)) => a == b,
            (LazyValue::Float(a), LazyValue::Float(b)) => a.to_bits() == b.to_bits(),
            (LazyValue::Add(a1, b1), LazyValue::Add(a2, b2))
            | (LazyValue::Sub(a1, b1), LazyValue::Sub(a2, b2))
            | (LazyValue::Mul(a1, b1), LazyValue::Mul(a2, b2))
            | (LazyValue::Div(a1, b1), LazyValue::Div(a2, b2)) => a1 == a2 && b1 == b2,
            _ => false,
        }
    }
}

impl Eq for LazyValue {}

impl Hash for LazyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            LazyValue::Ref(v) => v.hash(state),
            LazyValue::Int(v) => v.hash(state),
            LazyValue::Float(v) => v.to_bits().hash(state),
            LazyValue::Add(a, b)
            | LazyValue::Sub(a, b)
            | LazyValue::Mul(a, b)
            | LazyValue::Div(a, b) => {
                a.hash(state);
                b.hash(state);
            }
        }
    }
}

/// Call-style rendering, shared with the source emitter: `mul(ref("n"), 2)`.
impl fmt::Display for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LazyValue::Ref(name) => write!(f, "ref({:?})", name),
            LazyValue::Int(v) => write!(f, "{}", v),
            LazyValue::Float(v) => write!(f, "{:?}", v),
            LazyValue::Add(a, b) => write!(f, "add({}, {})", a, b),
            LazyValue::Sub(a, b) => write!(f, "sub({}, {})", a, b),
            LazyValue::Mul(a, b) => write!(f, "mul({}, {})", a, b),
            LazyValue::Div(a, b) => write!(f, "div({}, {})", a, b),
        }
    }
}

// ==================== Options ====================

/// Ordered `(key, value)` option list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Options {
    entries: Vec<(String, Value)>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace `key`. A replaced key keeps its original position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy with every lazy entry evaluated against the concrete ones.
    pub fn resolved(&self) -> GraphResult<Options> {
        let mut out = Options::new();
        for (key, value) in &self.entries {
            let value = match value {
                Value::Lazy(expr) => expr.eval(key, self)?,
                other => other.clone(),
            };
            out.entries.push((key.clone(), value));
        }
        Ok(out)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Options::new();
        for (k, v) in iter {
            options.set(k, v);
        }
        options
    }
}
