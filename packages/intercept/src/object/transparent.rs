// packages/intercept/src/object/transparent.rs
//! Pass-through wrapper for objects that refuse attribute rebinding
//!
//! Lookups fall through to the wrapped object unless an attribute has been
//! rebound on the wrapper itself.

use crate::gate::CallContext;
use crate::object::{Args, Object, Value};
use crate::utils::errors::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub struct TransparentProxy {
    inner: Arc<dyn Object>,
    overrides: RwLock<HashMap<String, Value>>,
}

impl TransparentProxy {
    pub fn new(inner: Arc<dyn Object>) -> Self {
        Self {
            inner,
            overrides: RwLock::new(HashMap::new()),
        }
    }
}

impl Object for TransparentProxy {
    fn type_name(&self) -> &str {
        self.inner.type_name()
    }

    fn get_attr(&self, cx: &CallContext, name: &str) -> Result<Value> {
        if let Some(value) = self.overrides.read().get(name) {
            return Ok(value.clone());
        }
        self.inner.get_attr(cx, name)
    }

    fn set_attr(&self, _cx: &CallContext, name: &str, value: Value) -> Result<()> {
        self.overrides.write().insert(name.to_string(), value);
        Ok(())
    }

    fn call(&self, cx: &CallContext, args: Args) -> Result<Value> {
        self.inner.call(cx, args)
    }

    fn remote_name(&self) -> Option<String> {
        self.inner.remote_name()
    }

    fn to_str(&self, cx: &CallContext) -> Result<String> {
        self.inner.to_str(cx)
    }

    fn to_repr(&self, cx: &CallContext) -> Result<String> {
        self.inner.to_repr(cx)
    }
}
