// packages/intercept/src/proxy/exception.rs
//! Exceptions raised by the remote side

use crate::gate::CallContext;
use crate::object::{Object, Value};
use crate::proxy::instance_proxy::InstanceProxy;
use crate::utils::errors::{InterceptError, Result};
use std::fmt;
use std::sync::Arc;

/// Payload of a `raise` response, surfaced as `InterceptError::Remote`
#[derive(Debug, Clone)]
pub enum RemoteException {
    /// A remote exception object; its fields live remotely
    Instance(Arc<InstanceProxy>),

    /// `raise Name(args...)`
    Native { type_name: String, args: Vec<Value> },

    /// A bare literal was raised
    Value(Value),
}

impl RemoteException {
    pub fn type_name(&self) -> &str {
        match self {
            RemoteException::Instance(proxy) => proxy.type_name(),
            RemoteException::Native { type_name, .. } => type_name,
            RemoteException::Value(value) => value.type_name(),
        }
    }

    /// The exception's message; remote exception objects are asked for it
    pub fn message(&self, cx: &CallContext) -> Result<String> {
        match self {
            RemoteException::Instance(proxy) => proxy.to_str(cx),
            other => Ok(other.to_string()),
        }
    }

    /// Attribute of a raised remote exception object
    pub fn get_attr(&self, cx: &CallContext, name: &str) -> Result<Value> {
        match self {
            RemoteException::Instance(proxy) => proxy.get_attr(cx, name),
            RemoteException::Native { args, .. } if name == "args" => {
                Ok(Value::Tuple(args.clone()))
            }
            RemoteException::Native { type_name, .. } => {
                Err(InterceptError::attribute_not_found(type_name.as_str(), name))
            }
            RemoteException::Value(value) => value.get_attr(cx, name),
        }
    }
}

impl fmt::Display for RemoteException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteException::Instance(proxy) => {
                write!(f, "{} ({})", proxy.type_name(), proxy.handle())
            }
            RemoteException::Native { args, .. } => match args.as_slice() {
                [] => Ok(()),
                [single] => write!(f, "{}", single),
                many => f.write_str(&Value::Tuple(many.to_vec()).repr()),
            },
            RemoteException::Value(value) => write!(f, "{}", value),
        }
    }
}
