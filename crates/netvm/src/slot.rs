//! # Slots
//!
//! What lives on the operand stack, in locals, arguments, fields and array
//! elements. Arrays and instances are shared references; everything else is
//! a plain value.
//!
//! Slots convert to and from [`netsync::Value`] at the capability boundary:
//! arrays become lists, instances become opaque objects.

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use netsync::NetworkInterceptor;
use netsync::ObjectRef;
use netsync::Value;
use netweave::il::TypeRef;

use crate::error::Error;
use crate::error::Result;
use crate::instance::Instance;

/// A shared, fixed-length array.
#[derive(Clone)]
pub struct ArrayRef(Arc<Mutex<Vec<Slot>>>);

impl ArrayRef {
    pub fn new(items: Vec<Slot>) -> Self {
        Self(Arc::new(Mutex::new(items)))
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: i64) -> Result<Slot> {
        let items = self.items();
        let len = items.len();
        usize::try_from(index)
            .ok()
            .and_then(|i| items.get(i).cloned())
            .ok_or(Error::IndexOutOfRange { index, len })
    }

    pub fn set(&self, index: i64, value: Slot) -> Result<()> {
        let mut items = self.items();
        let len = items.len();
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| items.get_mut(i))
            .ok_or(Error::IndexOutOfRange { index, len })?;
        *slot = value;
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<Slot> {
        self.items().clone()
    }

    fn items(&self) -> std::sync::MutexGuard<'_, Vec<Slot>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Clone, Default)]
pub enum Slot {
    #[default]
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(String),
    Array(ArrayRef),
    Object(Arc<Instance>),
    Capability(Arc<dyn NetworkInterceptor>),
    /// A value from outside the machine with no slot form of its own.
    Foreign(Value),
}

impl Slot {
    /// Initial value of a field, local or array element of type `ty`.
    pub fn default_for(ty: &TypeRef) -> Self {
        match ty {
            TypeRef::Bool => Slot::Bool(false),
            TypeRef::I32 => Slot::I32(0),
            TypeRef::I64 => Slot::I64(0),
            TypeRef::F64 => Slot::F64(0.0),
            _ => Slot::Null,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Slot::Null => "null",
            Slot::Bool(_) => "bool",
            Slot::I32(_) => "int32",
            Slot::I64(_) => "int64",
            Slot::F64(_) => "float64",
            Slot::Str(_) => "string",
            Slot::Array(_) => "array",
            Slot::Object(_) => "object",
            Slot::Capability(_) => "capability",
            Slot::Foreign(_) => "foreign",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Slot::Null)
    }

    /// Branch condition: non-zero numbers, `true`, and non-null references.
    pub fn is_truthy(&self) -> bool {
        match self {
            Slot::Null => false,
            Slot::Bool(b) => *b,
            Slot::I32(i) => *i != 0,
            Slot::I64(i) => *i != 0,
            Slot::F64(x) => *x != 0.0,
            _ => true,
        }
    }

    /// Value equality for primitives, identity for references.
    pub fn same(&self, other: &Slot) -> bool {
        match (self, other) {
            (Slot::Null, Slot::Null) => true,
            (Slot::Bool(a), Slot::Bool(b)) => a == b,
            (Slot::Str(a), Slot::Str(b)) => a == b,
            (Slot::Array(a), Slot::Array(b)) => a.ptr_eq(b),
            (Slot::Object(a), Slot::Object(b)) => Arc::ptr_eq(a, b),
            (Slot::Capability(a), Slot::Capability(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Slot::Foreign(a), Slot::Foreign(b)) => a == b,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Slot::I32(i) => Some(i64::from(*i)),
            Slot::I64(i) => Some(*i),
            Slot::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Slot::F64(x) => Some(*x),
            other => other.as_i64().map(|i| i as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Slot::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Converts to the declared type `ty`, widening or narrowing numbers
    /// when the value fits.
    pub fn coerce(self, ty: &TypeRef) -> Result<Slot> {
        let mismatch = |found: &Slot| Error::TypeMismatch { op: "coerce", expected: type_label(ty), found: found.kind().to_string() };
        match (ty, self) {
            (TypeRef::Bool, Slot::Bool(b)) => Ok(Slot::Bool(b)),
            (TypeRef::Bool, Slot::I32(i)) => Ok(Slot::Bool(i != 0)),
            (TypeRef::I32, Slot::I32(i)) => Ok(Slot::I32(i)),
            (TypeRef::I32, Slot::I64(i)) => i32::try_from(i).map(Slot::I32).map_err(|_| mismatch(&Slot::I64(i))),
            (TypeRef::I32, Slot::Bool(b)) => Ok(Slot::I32(i32::from(b))),
            (TypeRef::I64, slot @ (Slot::I32(_) | Slot::I64(_))) => Ok(Slot::I64(slot.as_i64().unwrap_or_default())),
            (TypeRef::F64, slot @ (Slot::I32(_) | Slot::I64(_) | Slot::F64(_))) => {
                Ok(Slot::F64(slot.as_f64().unwrap_or_default()))
            }
            (TypeRef::String, slot @ (Slot::Str(_) | Slot::Null)) => Ok(slot),
            (TypeRef::Array(_), slot @ (Slot::Array(_) | Slot::Null)) => Ok(slot),
            (TypeRef::Array(elem), Slot::Foreign(Value::List(items))) => {
                let items: Result<Vec<Slot>> = items.into_iter().map(|v| Slot::from_value(v).coerce(elem)).collect();
                Ok(Slot::Array(ArrayRef::new(items?)))
            }
            (TypeRef::Object | TypeRef::Named(_), slot) => Ok(slot),
            (_, slot) => Err(mismatch(&slot)),
        }
    }

    /// The uniform form handed to the capability.
    pub fn to_value(&self) -> Value {
        match self {
            Slot::Null => Value::Null,
            Slot::Bool(b) => Value::Bool(*b),
            Slot::I32(i) => Value::I32(*i),
            Slot::I64(i) => Value::I64(*i),
            Slot::F64(x) => Value::F64(*x),
            Slot::Str(s) => Value::Str(s.clone()),
            Slot::Array(a) => Value::List(a.snapshot().iter().map(Slot::to_value).collect()),
            Slot::Object(o) => Value::Object(ObjectRef::new(o.clone())),
            Slot::Capability(c) => Value::Object(ObjectRef::new(Arc::new(c.clone()))),
            Slot::Foreign(v) => v.clone(),
        }
    }

    pub fn from_value(value: Value) -> Slot {
        match value {
            Value::Null => Slot::Null,
            Value::Bool(b) => Slot::Bool(b),
            Value::I32(i) => Slot::I32(i),
            Value::I64(i) => Slot::I64(i),
            Value::F64(x) => Slot::F64(x),
            Value::Str(s) => Slot::Str(s),
            Value::Object(o) => match o.downcast::<Instance>() {
                Some(instance) => Slot::Object(instance),
                None => Slot::Foreign(Value::Object(o)),
            },
            other => Slot::Foreign(other),
        }
    }
}

fn type_label(ty: &TypeRef) -> &'static str {
    match ty {
        TypeRef::Void => "void",
        TypeRef::Bool => "bool",
        TypeRef::I32 => "int32",
        TypeRef::I64 => "int64",
        TypeRef::F64 => "float64",
        TypeRef::String => "string",
        TypeRef::Object | TypeRef::Named(_) => "object",
        TypeRef::Array(_) => "array",
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Null => Ok(()),
            Slot::Bool(b) => write!(f, "{}", b),
            Slot::I32(i) => write!(f, "{}", i),
            Slot::I64(i) => write!(f, "{}", i),
            Slot::F64(x) => write!(f, "{}", x),
            Slot::Str(s) => f.write_str(s),
            Slot::Array(a) => write!(f, "array[{}]", a.len()),
            Slot::Object(o) => f.write_str(o.type_name()),
            Slot::Capability(_) => f.write_str("capability"),
            Slot::Foreign(v) => write!(f, "{}", v),
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Str(s) => write!(f, "Str({:?})", s),
            Slot::Foreign(v) => write!(f, "Foreign({:?})", v),
            _ => write!(f, "{}({})", self.kind(), self),
        }
    }
}
