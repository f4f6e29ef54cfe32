// packages/intercept/src/proxy/attribute_proxy.rs
//! Dotted-path proxies

use crate::gate::{CallContext, CallerGate};
use crate::object::{Args, Object, Value};
use crate::proxy::backend::ProxyBackend;
use crate::utils::errors::Result;
use parking_lot::RwLock;
use std::sync::Arc;

/// A dotted path rooted at a module or instance name.
///
/// Reads extend the path, calls issue `CALL`, and assignments issue a posted
/// `SETATTR`. A proxy created by partial interception also remembers the real
/// attribute it replaced; gate-excluded callers read, assign and call through
/// that instead. Child paths inherit the gate and the matching real attribute.
pub struct AttributeProxy {
    owner: String,
    module: String,
    path: String,
    backend: Arc<ProxyBackend>,
    real: RwLock<Option<Value>>,
    gate: Option<Arc<CallerGate>>,
}

impl AttributeProxy {
    pub fn new(
        owner: impl Into<String>,
        module: impl Into<String>,
        path: impl Into<String>,
        backend: Arc<ProxyBackend>,
    ) -> Self {
        Self {
            owner: owner.into(),
            module: module.into(),
            path: path.into(),
            backend,
            real: RwLock::new(None),
            gate: None,
        }
    }

    /// Proxy standing in for an attribute patched on a real module
    pub fn partial(
        module: impl Into<String>,
        path: impl Into<String>,
        backend: Arc<ProxyBackend>,
        gate: Arc<CallerGate>,
    ) -> Self {
        let module = module.into();
        Self {
            gate: Some(gate),
            ..Self::new(module.clone(), module, path, backend)
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_real(&self, value: Value) {
        *self.real.write() = Some(value);
    }

    pub fn real(&self) -> Option<Value> {
        self.real.read().clone()
    }

    /// Ask the remote side for the path's value.
    ///
    /// An empty answer means nothing is bound remotely, so the unresolved
    /// proxy itself is returned and can be chained further.
    pub fn try_evaluate(self: Arc<Self>) -> Result<Value> {
        match self.backend.get_attr(&self.owner, &self.path, &self.module)? {
            Some(value) => Ok(value),
            None => Ok(Value::Object(self)),
        }
    }

    /// Assign the path's value remotely
    pub fn set_value(&self, value: &Value) -> Result<()> {
        self.backend.set_attr(&self.owner, &self.path, value)
    }

    fn child(&self, name: &str) -> Arc<AttributeProxy> {
        let real = self
            .real()
            .and_then(|real| real.get_attr(&CallContext::machinery(), name).ok());
        Arc::new(AttributeProxy {
            owner: self.owner.clone(),
            module: self.module.clone(),
            path: format!("{}.{}", self.path, name),
            backend: Arc::clone(&self.backend),
            real: RwLock::new(real),
            gate: self.gate.clone(),
        })
    }

    fn bypass(&self, cx: &CallContext) -> Option<Value> {
        let gate = self.gate.as_ref()?;
        let real = self.real()?;
        gate.caller_excluded(cx).then_some(real)
    }
}

impl Object for AttributeProxy {
    fn type_name(&self) -> &str {
        "AttributeProxy"
    }

    fn get_attr(&self, cx: &CallContext, name: &str) -> Result<Value> {
        if let Some(real) = self.bypass(cx) {
            return real.get_attr(cx, name);
        }
        self.child(name).try_evaluate()
    }

    fn set_attr(&self, cx: &CallContext, name: &str, value: Value) -> Result<()> {
        if let Some(real) = self.bypass(cx) {
            return real.set_attr(cx, name, value);
        }
        self.child(name).set_value(&value)
    }

    fn call(&self, cx: &CallContext, args: Args) -> Result<Value> {
        if let Some(real) = self.bypass(cx) {
            return real.call(cx, args);
        }
        let result = self
            .backend
            .call(&self.owner, &self.path, &args, &self.module)?;
        Ok(result.unwrap_or(Value::None))
    }

    fn remote_name(&self) -> Option<String> {
        Some(format!("{}.{}", self.owner, self.path))
    }

    fn to_repr(&self, _cx: &CallContext) -> Result<String> {
        Ok(format!("<AttributeProxy {}.{}>", self.owner, self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::NativeFunction;
    use crate::transport::ScriptedTransport;

    fn setup(transport: ScriptedTransport) -> (Arc<ProxyBackend>, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        (Arc::new(ProxyBackend::new(transport.clone())), transport)
    }

    #[test]
    fn test_empty_getattr_returns_self() {
        let (backend, transport) = setup(ScriptedTransport::new());
        let cx = CallContext::runtime();
        let proxy = Arc::new(AttributeProxy::new("os", "os", "path", backend));

        let value = Arc::clone(&proxy).try_evaluate().unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.remote_name().as_deref(), Some("os.path"));

        let joined = value.get_attr(&cx, "join").unwrap();
        assert_eq!(joined.remote_name().as_deref(), Some("os.path.join"));
        assert_eq!(
            transport.sent(),
            vec!["GETATTR:os:SEP:path", "GETATTR:os:SEP:path.join"]
        );
    }

    #[test]
    fn test_getattr_literal() {
        let (backend, _) = setup(ScriptedTransport::new().respond("GETATTR:config:SEP:retries", "3"));
        let proxy = Arc::new(AttributeProxy::new("config", "config", "retries", backend));
        assert_eq!(proxy.try_evaluate().unwrap(), Value::Int(3));
    }

    #[test]
    fn test_call_encodes_proxy_arguments_by_name() {
        let (backend, transport) = setup(ScriptedTransport::new().respond(
            "CALL:db:SEP:save:SEP:({'row': [db.cursor, 1]},):SEP:{}",
            "'ok'",
        ));
        let cx = CallContext::runtime();
        let cursor: Value = Value::object(AttributeProxy::new("db", "db", "cursor", Arc::clone(&backend)));
        let save = AttributeProxy::new("db", "db", "save", backend);

        let arg = Value::Dict(vec![(
            Value::from("row"),
            Value::List(vec![cursor, Value::Int(1)]),
        )]);
        assert_eq!(save.call(&cx, Args::new().arg(arg)).unwrap(), Value::from("ok"));
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn test_empty_call_returns_none() {
        let (backend, _) = setup(ScriptedTransport::new());
        let proxy = AttributeProxy::new("log", "log", "flush", backend);
        assert_eq!(
            proxy.call(&CallContext::runtime(), Args::new()).unwrap(),
            Value::None
        );
    }

    #[test]
    fn test_set_value_and_nested_set() {
        let (backend, transport) = setup(ScriptedTransport::new());
        let proxy = AttributeProxy::new("cfg", "cfg", "limits", backend);
        proxy.set_value(&Value::Int(5)).unwrap();
        proxy
            .set_attr(&CallContext::runtime(), "max", Value::Float(1.5))
            .unwrap();
        assert_eq!(
            transport.sent(),
            vec![
                "SETATTR:cfg:SEP:limits:SEP:5",
                "SETATTR:cfg:SEP:limits.max:SEP:1.5"
            ]
        );
    }

    #[test]
    fn test_gate_excluded_caller_uses_real_callable() {
        use crate::gate::Caller;

        let (backend, transport) = setup(ScriptedTransport::new());
        let gate = Arc::new(CallerGate::new(["harness"]));
        let proxy = AttributeProxy::partial("clock", "now", backend, gate);
        proxy.set_real(Value::object(NativeFunction::new("now", |_, _| Ok(Value::Int(42)))));

        let harness = CallContext::new(Caller::module("harness"));
        assert_eq!(proxy.call(&harness, Args::new()).unwrap(), Value::Int(42));
        assert!(transport.sent().is_empty());

        let sut = CallContext::new(Caller::module("app.main"));
        assert_eq!(proxy.call(&sut, Args::new()).unwrap(), Value::None);
        assert_eq!(transport.sent(), vec!["CALL:clock:SEP:now:SEP:():SEP:{}"]);
    }

    #[test]
    fn test_gate_excluded_caller_reads_and_assigns_real_attributes() {
        use crate::gate::Caller;
        use crate::object::Namespace;

        let (backend, transport) = setup(ScriptedTransport::new());
        let gate = Arc::new(CallerGate::new(["harness"]));
        let zone = Value::object(
            Namespace::new("zone")
                .with("name", Value::object(NativeFunction::new("name", |_, _| Ok(Value::from("UTC")))))
                .with("offset", 0),
        );
        let proxy = AttributeProxy::partial("clock", "zone", backend, gate);
        proxy.set_real(zone.clone());

        let harness = CallContext::new(Caller::module("harness"));
        let name = proxy.get_attr(&harness, "name").unwrap();
        assert_eq!(name.call(&harness, Args::new()).unwrap(), Value::from("UTC"));
        proxy.set_attr(&harness, "offset", Value::Int(60)).unwrap();
        assert_eq!(zone.get_attr(&harness, "offset").unwrap(), Value::Int(60));
        assert!(transport.sent().is_empty());

        // A child path handed out to the system under test still honours the gate
        let sut = CallContext::new(Caller::module("app.main"));
        let remote_name = proxy.get_attr(&sut, "name").unwrap();
        assert_eq!(remote_name.remote_name().as_deref(), Some("clock.zone.name"));
        assert_eq!(transport.sent(), vec!["GETATTR:clock:SEP:zone.name"]);
        assert_eq!(remote_name.call(&harness, Args::new()).unwrap(), Value::from("UTC"));
        assert_eq!(transport.sent().len(), 1);
    }
}
