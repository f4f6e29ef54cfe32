// packages/intercept/src/object/value.rs
//! Dynamic values exchanged with the system under test

use crate::gate::CallContext;
use crate::object::{Args, Object};
use crate::protocol::literal;
use crate::utils::errors::{InterceptError, Result};
use std::fmt;
use std::sync::Arc;

/// A primitive, a container, or a reference to an object
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Key/value pairs in insertion order
    Dict(Vec<(Value, Value)>),
    Object(Arc<dyn Object>),
}

impl Value {
    pub fn object(obj: impl Object + 'static) -> Self {
        Value::Object(Arc::new(obj))
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Object(obj) => obj.type_name(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn Object>> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Remote name of a proxied object
    pub fn remote_name(&self) -> Option<String> {
        self.as_object().and_then(|obj| obj.remote_name())
    }

    /// Attribute lookup; primitives and containers expose no attributes
    pub fn get_attr(&self, cx: &CallContext, name: &str) -> Result<Value> {
        match self {
            Value::Object(obj) => obj.get_attr(cx, name),
            other => Err(InterceptError::attribute_not_found(other.type_name(), name)),
        }
    }

    pub fn set_attr(&self, cx: &CallContext, name: &str, value: Value) -> Result<()> {
        match self {
            Value::Object(obj) => obj.set_attr(cx, name, value),
            other => Err(InterceptError::read_only(other.type_name(), name)),
        }
    }

    pub fn call(&self, cx: &CallContext, args: Args) -> Result<Value> {
        match self {
            Value::Object(obj) => obj.call(cx, args),
            other => Err(InterceptError::NotCallable(other.type_name().to_string())),
        }
    }

    /// Literal form as sent on the wire
    pub fn repr(&self) -> String {
        literal::encode_value(self)
    }

    /// String form, resolving objects through their own `to_str`
    pub fn to_str(&self, cx: &CallContext) -> Result<String> {
        match self {
            Value::Object(obj) => obj.to_str(cx),
            other => Ok(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Object(obj) => match obj.remote_name() {
                Some(name) => write!(f, "<{} {}>", obj.type_name(), name),
                None => write!(f, "<{} object>", obj.type_name()),
            },
            other => f.write_str(&other.repr()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Object(_) => fmt::Display::fmt(self, f),
            other => f.write_str(&other.repr()),
        }
    }
}

/// Objects compare by identity, everything else structurally
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
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

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<Arc<dyn Object>> for Value {
    fn from(v: Arc<dyn Object>) -> Self {
        Value::Object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}
