// packages/intercept/src/interception/partial.rs
//! In-place patching of attributes on real modules

use crate::gate::{CallContext, CallerGate};
use crate::object::{Object, TransparentProxy, Value};
use crate::proxy::{AttributeProxy, ProxyBackend};
use crate::utils::errors::{InterceptError, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// An attribute rebinding made while patching, kept so it can be undone
#[derive(Debug)]
struct Patch {
    target: Value,
    name: String,
    original: Value,
}

/// Attribute rebindings made on one module, undone by [`PatchSet::restore`]
#[derive(Debug)]
pub struct PatchSet {
    module: String,
    patches: Vec<Patch>,
}

impl PatchSet {
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Put back the original attributes, most recent rebinding first
    pub fn restore(self, cx: &CallContext) {
        for patch in self.patches.into_iter().rev() {
            if let Err(e) = patch.target.set_attr(cx, &patch.name, patch.original) {
                warn!(
                    module = %self.module,
                    attribute = %patch.name,
                    error = %e,
                    "Failed to restore patched attribute"
                );
            }
        }
    }
}

/// Replaces selected attributes of one real module with proxies
pub struct PartialInterceptor {
    module: String,
    backend: Arc<ProxyBackend>,
    gate: Arc<CallerGate>,
}

impl PartialInterceptor {
    pub fn new(module: impl Into<String>, backend: Arc<ProxyBackend>, gate: Arc<CallerGate>) -> Self {
        Self {
            module: module.into(),
            backend,
            gate,
        }
    }

    /// Patch each dotted `path` under `real_module`.
    ///
    /// Either every path is patched or, on the first failure, the module is
    /// restored to how it was before the call.
    pub fn intercept_attributes<S: AsRef<str>>(
        &self,
        cx: &CallContext,
        real_module: &Value,
        paths: &[S],
    ) -> Result<PatchSet> {
        let mut applied = PatchSet {
            module: self.module.clone(),
            patches: Vec::new(),
        };
        for path in paths {
            let path = path.as_ref();
            let proxy = Arc::new(AttributeProxy::partial(
                &self.module,
                path,
                Arc::clone(&self.backend),
                Arc::clone(&self.gate),
            ));
            let patched = self.intercept_attribute(cx, &proxy, real_module, path, &mut applied.patches);
            if let Err(e) = patched {
                applied.restore(cx);
                return Err(e);
            }
        }
        Ok(applied)
    }

    fn intercept_attribute(
        &self,
        cx: &CallContext,
        proxy: &Arc<AttributeProxy>,
        target: &Value,
        path: &str,
        applied: &mut Vec<Patch>,
    ) -> Result<()> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        // Nothing to stand in for if the real object lacks the attribute
        let current = match target.get_attr(cx, head) {
            Ok(value) => value,
            Err(InterceptError::AttributeNotFound { .. }) => {
                warn!(
                    module = %self.module,
                    attribute = %proxy.path(),
                    "Skipping partial target missing from the real module"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let Some(rest) = rest else {
            proxy.set_real(current.clone());
            let replacement = Arc::clone(proxy).try_evaluate()?;
            target.set_attr(cx, head, replacement)?;
            applied.push(Patch {
                target: target.clone(),
                name: head.to_string(),
                original: current,
            });
            debug!(module = %self.module, attribute = %proxy.path(), "Attribute intercepted");
            return Ok(());
        };

        match self.intercept_attribute(cx, proxy, &current, rest, applied) {
            Err(InterceptError::ReadOnlyAttribute { .. }) => {
                let inner = match &current {
                    Value::Object(inner) => Arc::clone(inner),
                    other => return Err(InterceptError::read_only(other.type_name(), rest)),
                };
                let wrapper: Arc<dyn Object> = Arc::new(TransparentProxy::new(inner));
                let wrapper = Value::Object(wrapper);
                self.intercept_attribute(cx, proxy, &wrapper, rest, applied)?;
                target.set_attr(cx, head, wrapper)?;
                applied.push(Patch {
                    target: target.clone(),
                    name: head.to_string(),
                    original: current,
                });
                Ok(())
            }
            other => other,
        }
    }
}
