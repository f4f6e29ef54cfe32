// packages/intercept/src/object/native.rs
//! Building blocks for real (non-proxied) libraries

use crate::gate::CallContext;
use crate::object::{Args, Object, Value};
use crate::utils::errors::{InterceptError, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Attribute bag standing for a module, class or plain object
pub struct Namespace {
    name: String,
    attrs: RwLock<BTreeMap<String, Value>>,
    frozen: bool,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: RwLock::new(BTreeMap::new()),
            frozen: false,
        }
    }

    /// A namespace whose attributes cannot be rebound once built
    pub fn frozen(name: impl Into<String>) -> Self {
        Self {
            frozen: true,
            ..Self::new(name)
        }
    }

    /// Builder-style insert, allowed on frozen namespaces too
    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.write().insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attrs.read().keys().cloned().collect()
    }
}

impl Object for Namespace {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn get_attr(&self, _cx: &CallContext, name: &str) -> Result<Value> {
        self.attrs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| InterceptError::attribute_not_found(&self.name, name))
    }

    fn set_attr(&self, _cx: &CallContext, name: &str, value: Value) -> Result<()> {
        if self.frozen {
            return Err(InterceptError::read_only(&self.name, name));
        }
        self.attrs.write().insert(name.to_string(), value);
        Ok(())
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("attrs", &self.attribute_names())
            .field("frozen", &self.frozen)
            .finish()
    }
}

type NativeFn = dyn Fn(&CallContext, Args) -> Result<Value> + Send + Sync;

/// Callable backed by a Rust closure
#[derive(Clone)]
pub struct NativeFunction {
    name: String,
    func: Arc<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&CallContext, Args) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Object for NativeFunction {
    fn type_name(&self) -> &str {
        "function"
    }

    fn get_attr(&self, _cx: &CallContext, name: &str) -> Result<Value> {
        match name {
            "__name__" => Ok(Value::Str(self.name.clone())),
            _ => Err(InterceptError::attribute_not_found(&self.name, name)),
        }
    }

    fn call(&self, cx: &CallContext, args: Args) -> Result<Value> {
        (self.func)(cx, args)
    }

    fn to_repr(&self, _cx: &CallContext) -> Result<String> {
        Ok(format!("<function {}>", self.name))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_get_set() {
        let cx = CallContext::runtime();
        let ns = Namespace::new("config").with("debug", false);
        assert_eq!(ns.get_attr(&cx, "debug").unwrap(), Value::Bool(false));

        ns.set_attr(&cx, "debug", Value::Bool(true)).unwrap();
        assert_eq!(ns.get_attr(&cx, "debug").unwrap(), Value::Bool(true));
        assert!(ns.get_attr(&cx, "missing").is_err());
    }

    #[test]
    fn test_frozen_namespace_rejects_rebinding() {
        let cx = CallContext::runtime();
        let ns = Namespace::frozen("builtins").with("len", 1);
        let err = ns.set_attr(&cx, "len", Value::Int(2)).unwrap_err();
        assert!(matches!(err, InterceptError::ReadOnlyAttribute { .. }));
        assert_eq!(ns.get_attr(&cx, "len").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_native_function_call() {
        let cx = CallContext::runtime();
        let double = NativeFunction::new("double", |_cx, args| match args.positional.first() {
            Some(Value::Int(n)) => Ok(Value::Int(n * 2)),
            _ => Err(InterceptError::Local("expected an int".to_string())),
        });

        assert_eq!(double.call(&cx, Args::new().arg(21)).unwrap(), Value::Int(42));
        assert!(double.call(&cx, Args::new()).is_err());
        assert_eq!(double.to_repr(&cx).unwrap(), "<function double>");
    }
}
