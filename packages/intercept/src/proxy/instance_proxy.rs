// packages/intercept/src/proxy/instance_proxy.rs
//! Proxies for remote objects and the classes they belong to

use crate::gate::CallContext;
use crate::object::{Args, Object, Value};
use crate::protocol::{Expr, Response};
use crate::proxy::attribute_proxy::AttributeProxy;
use crate::proxy::backend::ProxyBackend;
use crate::proxy::class_registry::{ClassSpec, InstanceKind};
use crate::utils::errors::{InterceptError, Result};
use std::fmt;
use std::sync::Arc;

/// A remote object known by its handle.
///
/// Instance proxies hold no local state beyond the handle: every attribute
/// read, write and call is forwarded through a path rooted at the handle.
pub struct InstanceProxy {
    class: Arc<ClassSpec>,
    handle: String,
    backend: Arc<ProxyBackend>,
}

impl InstanceProxy {
    pub fn new(class: Arc<ClassSpec>, handle: impl Into<String>, backend: Arc<ProxyBackend>) -> Self {
        Self {
            class,
            handle: handle.into(),
            backend,
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn class(&self) -> &Arc<ClassSpec> {
        &self.class
    }

    pub fn kind(&self) -> InstanceKind {
        self.class.kind
    }

    fn path(&self, name: &str) -> Arc<AttributeProxy> {
        Arc::new(AttributeProxy::new(
            &self.handle,
            &self.class.module,
            name,
            Arc::clone(&self.backend),
        ))
    }

    /// Call one of the string hooks the host resolves on the type
    fn forward_hook(&self, cx: &CallContext, hook: &str) -> Result<String> {
        let result = self.get_attr(cx, hook)?.call(cx, Args::new())?;
        match result {
            Value::Str(s) => Ok(s),
            other => Err(InterceptError::Protocol(format!(
                "{}.{} returned {} instead of a string",
                self.handle,
                hook,
                other.type_name()
            ))),
        }
    }
}

impl Object for InstanceProxy {
    fn type_name(&self) -> &str {
        &self.class.name
    }

    fn get_attr(&self, _cx: &CallContext, name: &str) -> Result<Value> {
        self.path(name).try_evaluate()
    }

    fn set_attr(&self, _cx: &CallContext, name: &str, value: Value) -> Result<()> {
        self.backend.set_attr(&self.handle, name, &value)
    }

    fn call(&self, cx: &CallContext, args: Args) -> Result<Value> {
        self.get_attr(cx, "__call__")?.call(cx, args)
    }

    fn remote_name(&self) -> Option<String> {
        Some(self.handle.clone())
    }

    fn to_str(&self, cx: &CallContext) -> Result<String> {
        self.forward_hook(cx, "__str__")
    }

    fn to_repr(&self, cx: &CallContext) -> Result<String> {
        self.forward_hook(cx, "__repr__")
    }
}

impl fmt::Debug for InstanceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceProxy")
            .field("class", &self.class.name)
            .field("module", &self.class.module)
            .field("kind", &self.class.kind)
            .field("handle", &self.handle)
            .finish()
    }
}

/// A remote class the module proxy has already seen an instance of.
///
/// Calling it constructs a new remote instance: `CALL:<module><SEP><Class>`
/// answered by an instance marker (or a bare handle string).
pub struct ProxyClass {
    class: Arc<ClassSpec>,
    backend: Arc<ProxyBackend>,
}

impl ProxyClass {
    pub fn new(class: Arc<ClassSpec>, backend: Arc<ProxyBackend>) -> Self {
        Self { class, backend }
    }

    pub fn spec(&self) -> &Arc<ClassSpec> {
        &self.class
    }
}

impl Object for ProxyClass {
    fn type_name(&self) -> &str {
        "type"
    }

    fn get_attr(&self, _cx: &CallContext, name: &str) -> Result<Value> {
        Arc::new(AttributeProxy::new(
            &self.class.module,
            &self.class.module,
            format!("{}.{}", self.class.name, name),
            Arc::clone(&self.backend),
        ))
        .try_evaluate()
    }

    fn call(&self, _cx: &CallContext, args: Args) -> Result<Value> {
        let module = &self.class.module;
        let handle = match self.backend.call_response(module, &self.class.name, &args)? {
            Response::Value(Expr::Instance { handle, .. }) | Response::Value(Expr::Str(handle)) => {
                handle
            }
            Response::Raise(expr) => {
                return Err(InterceptError::Remote(self.backend.exception(module, expr)?))
            }
            Response::Empty => {
                return Err(InterceptError::Protocol(format!(
                    "No handle returned when constructing {}.{}",
                    module, self.class.name
                )))
            }
            Response::Value(other) => {
                return Err(InterceptError::Protocol(format!(
                    "Expected an instance of {}.{}, got {:?}",
                    module, self.class.name, other
                )))
            }
        };

        Ok(Value::object(InstanceProxy::new(
            Arc::clone(&self.class),
            handle,
            Arc::clone(&self.backend),
        )))
    }

    fn remote_name(&self) -> Option<String> {
        Some(format!("{}.{}", self.class.module, self.class.name))
    }

    fn to_repr(&self, _cx: &CallContext) -> Result<String> {
        Ok(format!("<class '{}.{}'>", self.class.module, self.class.name))
    }
}
