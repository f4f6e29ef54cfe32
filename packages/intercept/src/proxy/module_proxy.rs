// packages/intercept/src/proxy/module_proxy.rs
//! Module proxies

use crate::gate::{CallContext, CallerGate};
use crate::interception::ModuleLoader;
use crate::object::{Object, Value};
use crate::proxy::attribute_proxy::AttributeProxy;
use crate::proxy::backend::ProxyBackend;
use crate::proxy::instance_proxy::ProxyClass;
use crate::utils::errors::{InterceptError, Result};
use once_cell::sync::OnceCell;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Stands in for a module on the remote side.
///
/// Attribute reads resolve previously seen remote classes locally and
/// otherwise go out as `GETATTR`. Gate-excluded callers get the real module
/// instead, loaded at most once.
pub struct ModuleProxy {
    name: String,
    backend: Arc<ProxyBackend>,
    loader: Weak<ModuleLoader>,
    gate: Arc<CallerGate>,
    real: OnceCell<Value>,
}

impl ModuleProxy {
    /// Performs the `IMPORT` round trip immediately
    pub fn full(
        name: impl Into<String>,
        backend: Arc<ProxyBackend>,
        loader: Weak<ModuleLoader>,
        gate: Arc<CallerGate>,
    ) -> Result<Self> {
        let name = name.into();
        // Only a raised response matters here; any value is discarded
        backend.import(&name)?;
        debug!(module = %name, "Remote module imported");

        Ok(Self {
            name,
            backend,
            loader,
            gate,
            real: OnceCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The real module, for callers the gate excludes
    fn real_for(&self, cx: &CallContext) -> Result<Option<&Value>> {
        if !self.gate.caller_excluded(cx) {
            return Ok(None);
        }

        self.real
            .get_or_try_init(|| {
                let loader = self.loader.upgrade().ok_or_else(|| {
                    InterceptError::Local(format!("Loader for '{}' no longer exists", self.name))
                })?;
                loader.import_real(&self.name)
            })
            .map(Some)
    }
}

impl Object for ModuleProxy {
    fn type_name(&self) -> &str {
        "module"
    }

    fn get_attr(&self, cx: &CallContext, name: &str) -> Result<Value> {
        if let Some(real) = self.real_for(cx)? {
            return real.get_attr(cx, name);
        }

        if let Some(class) = self.backend.classes().lookup(&self.name, name) {
            return Ok(Value::object(ProxyClass::new(class, Arc::clone(&self.backend))));
        }

        Arc::new(AttributeProxy::new(
            &self.name,
            &self.name,
            name,
            Arc::clone(&self.backend),
        ))
        .try_evaluate()
    }

    fn set_attr(&self, cx: &CallContext, name: &str, value: Value) -> Result<()> {
        if let Some(real) = self.real_for(cx)? {
            return real.set_attr(cx, name, value);
        }
        self.backend.set_attr(&self.name, name, &value)
    }

    fn remote_name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn to_repr(&self, _cx: &CallContext) -> Result<String> {
        Ok(format!("<module '{}' (proxy)>", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::Caller;
    use crate::object::{Args, Namespace};
    use crate::transport::ScriptedTransport;

    fn setup(transport: ScriptedTransport) -> (Arc<ProxyBackend>, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        (Arc::new(ProxyBackend::new(transport.clone())), transport)
    }

    fn sut() -> CallContext {
        CallContext::new(Caller::module("app"))
    }

    fn module_proxy(name: &str, backend: Arc<ProxyBackend>) -> (ModuleProxy, Arc<ModuleLoader>) {
        let loader = ModuleLoader::new();
        let proxy = ModuleProxy::full(
            name,
            backend,
            Arc::downgrade(&loader),
            Arc::new(CallerGate::new(["harness"])),
        )
        .unwrap();
        (proxy, loader)
    }

    #[test]
    fn test_full_proxy_imports_eagerly() {
        let (backend, transport) = setup(ScriptedTransport::new());
        let loader = ModuleLoader::new();
        let proxy = ModuleProxy::full(
            "widgets",
            backend,
            Arc::downgrade(&loader),
            Arc::new(CallerGate::default()),
        )
        .unwrap();
        assert_eq!(proxy.name(), "widgets");
        assert_eq!(transport.sent(), vec!["IMPORT:widgets"]);
    }

    #[test]
    fn test_raised_import_fails() {
        let (backend, _) = setup(
            ScriptedTransport::new().respond("IMPORT:widgets", "raise ImportError('No module named widgets')"),
        );
        let loader = ModuleLoader::new();
        let err = ModuleProxy::full(
            "widgets",
            backend,
            Arc::downgrade(&loader),
            Arc::new(CallerGate::default()),
        )
        .err()
        .unwrap();
        assert_eq!(err.remote().unwrap().type_name(), "ImportError");
        assert_eq!(err.to_string(), "No module named widgets");
    }

    #[test]
    fn test_known_class_resolved_locally() {
        let (backend, transport) = setup(
            ScriptedTransport::new()
                .respond("GETATTR:widgets:SEP:default_button", "Instance(Button, btn-1)")
                .respond("CALL:widgets:SEP:Button:SEP:():SEP:{}", "Instance(Button, btn-2)"),
        );
        let (proxy, _loader) = module_proxy("widgets", backend);
        let cx = sut();

        proxy.get_attr(&cx, "default_button").unwrap();
        let class = proxy.get_attr(&cx, "Button").unwrap();
        assert_eq!(class.type_name(), "type");

        let instance = class.call(&cx, Args::new()).unwrap();
        assert_eq!(instance.remote_name().as_deref(), Some("btn-2"));
        assert_eq!(
            transport.sent(),
            vec![
                "IMPORT:widgets",
                "GETATTR:widgets:SEP:default_button",
                "CALL:widgets:SEP:Button:SEP:():SEP:{}"
            ]
        );
    }

    #[test]
    fn test_excluded_caller_sees_real_module() {
        let (backend, transport) = setup(ScriptedTransport::new());
        let loader = ModuleLoader::new();
        loader.register_module(
            "widgets",
            Value::object(Namespace::new("widgets").with("VERSION", "1.2")),
        );
        let proxy = ModuleProxy::full(
            "widgets",
            backend,
            Arc::downgrade(&loader),
            Arc::new(CallerGate::new(["harness"])),
        )
        .unwrap();

        let harness = CallContext::new(Caller::module("harness"));
        assert_eq!(proxy.get_attr(&harness, "VERSION").unwrap(), Value::from("1.2"));
        assert_eq!(proxy.get_attr(&harness, "VERSION").unwrap(), Value::from("1.2"));
        assert_eq!(transport.sent(), vec!["IMPORT:widgets"]);

        let remote = proxy.get_attr(&sut(), "VERSION").unwrap();
        assert_eq!(remote.remote_name().as_deref(), Some("widgets.VERSION"));
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn test_set_attr_forwards() {
        let (backend, transport) = setup(ScriptedTransport::new());
        let (proxy, _loader) = module_proxy("cfg", backend);
        proxy.set_attr(&sut(), "debug", Value::Bool(true)).unwrap();
        assert_eq!(
            transport.sent(),
            vec!["IMPORT:cfg", "SETATTR:cfg:SEP:debug:SEP:True"]
        );
    }
}
