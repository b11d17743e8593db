//! # Uniform Values
//!
//! Every payload that crosses the capability or the bus travels as a
//! [`Value`]: the uniform, reference-typed form of "any". Typed Rust data
//! converts in and out through [`Dynamic`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The uniform representation of member values and call arguments.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(String),
    List(Vec<Value>),
    Pair(Box<Value>, Box<Value>),
    /// An opaque shared reference. Compared by identity.
    Object(ObjectRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Pair(_, _) => "pair",
            Value::Object(_) => "object",
        }
    }

    pub fn pair(key: Value, value: Value) -> Self {
        Value::Pair(Box::new(key), Box::new(value))
    }

    /// Reads a non-negative position argument.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::I32(i) => usize::try_from(*i).ok(),
            Value::I64(i) => usize::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Encodes a position argument.
    pub fn index(index: usize) -> Self {
        match i32::try_from(index) {
            Ok(i) => Value::I32(i),
            Err(_) => Value::I64(index as i64),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I32(i) => write!(f, "{}", i),
            Value::I64(i) => write!(f, "{}", i),
            Value::F64(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Pair(k, v) => write!(f, "[{}, {}]", k, v),
            Value::Object(_) => f.write_str("<object>"),
        }
    }
}

/// Shared handle to an arbitrary object carried inside a [`Value`].
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn Any + Send + Sync>);

impl ObjectRef {
    pub fn new<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        Self(object)
    }

    /// Returns the underlying object if it has type `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.clone().downcast::<T>().ok()
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:p})", self.addr())
    }
}

/// Conversion between typed data and the uniform [`Value`] form.
pub trait Dynamic: Sized {
    fn to_value(&self) -> Value;
    fn from_value(value: &Value) -> Option<Self>;
}

impl Dynamic for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl Dynamic for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl Dynamic for i32 {
    fn to_value(&self) -> Value {
        Value::I32(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::I32(i) => Some(*i),
            Value::I64(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl Dynamic for i64 {
    fn to_value(&self) -> Value {
        Value::I64(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::I64(i) => Some(*i),
            Value::I32(i) => Some(i64::from(*i)),
            _ => None,
        }
    }
}

impl Dynamic for f64 {
    fn to_value(&self) -> Value {
        Value::F64(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::F64(x) => Some(*x),
            Value::I32(i) => Some(f64::from(*i)),
            _ => None,
        }
    }
}

impl Dynamic for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl<T: Dynamic> Dynamic for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(Dynamic::to_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl<A: Dynamic, B: Dynamic> Dynamic for (A, B) {
    fn to_value(&self) -> Value {
        Value::pair(self.0.to_value(), self.1.to_value())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Pair(a, b) => Some((A::from_value(a)?, B::from_value(b)?)),
            _ => None,
        }
    }
}
