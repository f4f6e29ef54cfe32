// packages/intercept/src/proxy/backend.rs
//! Shared plumbing behind every proxy: encode, exchange, decode, materialize

use crate::object::{Args, Value};
use crate::protocol::{Expr, InstanceStyle, Request, Response, WireCodec};
use crate::proxy::class_registry::{ClassRegistry, InstanceKind};
use crate::proxy::exception::RemoteException;
use crate::proxy::instance_proxy::InstanceProxy;
use crate::transport::{TcpTransport, Transport};
use crate::utils::config::InterceptConfig;
use crate::utils::errors::{InterceptError, Result};
use std::sync::Arc;
use tracing::trace;

pub struct ProxyBackend {
    transport: Arc<dyn Transport>,
    codec: WireCodec,
    classes: Arc<ClassRegistry>,
}

impl ProxyBackend {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_parts(transport, WireCodec::default(), Arc::new(ClassRegistry::new()))
    }

    pub fn with_parts(
        transport: Arc<dyn Transport>,
        codec: WireCodec,
        classes: Arc<ClassRegistry>,
    ) -> Self {
        Self {
            transport,
            codec,
            classes,
        }
    }

    pub fn from_config(config: &InterceptConfig) -> Result<Self> {
        let transport = TcpTransport::from_config(&config.transport);
        let codec = WireCodec::from_config(&config.wire)?;
        Ok(Self::with_parts(
            Arc::new(transport),
            codec,
            Arc::new(ClassRegistry::new()),
        ))
    }

    pub fn classes(&self) -> &Arc<ClassRegistry> {
        &self.classes
    }

    pub fn codec(&self) -> &WireCodec {
        &self.codec
    }

    /// `IMPORT`; `None` when nothing is bound remotely
    pub fn import(self: &Arc<Self>, module: &str) -> Result<Option<Value>> {
        let response = self.exchange(&Request::import(module))?;
        self.into_value(module, response)
    }

    /// `GETATTR`; `None` when nothing is bound remotely
    pub fn get_attr(self: &Arc<Self>, owner: &str, attr: &str, module: &str) -> Result<Option<Value>> {
        let response = self.exchange(&Request::get_attr(owner, attr))?;
        self.into_value(module, response)
    }

    /// `SETATTR`, posted without waiting for a reply
    pub fn set_attr(&self, owner: &str, attr: &str, value: &Value) -> Result<()> {
        let request = Request::set_attr(owner, attr, value);
        record(&request);
        self.transport.post(&self.codec.encode(&request))
    }

    /// `CALL`; `None` when nothing is bound remotely
    pub fn call(self: &Arc<Self>, owner: &str, attr: &str, args: &Args, module: &str) -> Result<Option<Value>> {
        let response = self.call_response(owner, attr, args)?;
        self.into_value(module, response)
    }

    /// `CALL` returning the undecoded response
    pub fn call_response(&self, owner: &str, attr: &str, args: &Args) -> Result<Response> {
        self.exchange(&Request::call(owner, attr, args))
    }

    fn exchange(&self, request: &Request) -> Result<Response> {
        record(request);
        let message = self.codec.encode(request);
        let reply = self.transport.exchange(&message)?;
        trace!(request = %message, reply = %reply, "Exchanged");
        self.codec.decode_response(&reply)
    }

    fn into_value(self: &Arc<Self>, module: &str, response: Response) -> Result<Option<Value>> {
        match response {
            Response::Empty => Ok(None),
            Response::Value(expr) => self.materialize(module, expr, false).map(Some),
            Response::Raise(expr) => Err(InterceptError::Remote(self.exception(module, expr)?)),
        }
    }

    /// Turn a decoded expression into a local value.
    ///
    /// Instance markers become [`InstanceProxy`] values; their classes are
    /// registered under `module`.
    pub fn materialize(self: &Arc<Self>, module: &str, expr: Expr, raised: bool) -> Result<Value> {
        let value = match expr {
            Expr::None => Value::None,
            Expr::Bool(b) => Value::Bool(b),
            Expr::Int(i) => Value::Int(i),
            Expr::Float(f) => Value::Float(f),
            Expr::Str(s) => Value::Str(s),
            Expr::List(items) => Value::List(self.materialize_all(module, items)?),
            Expr::Tuple(items) => Value::Tuple(self.materialize_all(module, items)?),
            Expr::Dict(pairs) => Value::Dict(
                pairs
                    .into_iter()
                    .map(|(k, v)| {
                        Ok((
                            self.materialize(module, k, false)?,
                            self.materialize(module, v, false)?,
                        ))
                    })
                    .collect::<Result<_>>()?,
            ),
            Expr::Instance {
                style,
                class_name,
                handle,
            } => Value::Object(self.instance(module, style, &class_name, handle, raised)?),
            Expr::Construct { callee, .. } => {
                return Err(InterceptError::Protocol(format!(
                    "Constructor '{}' is only valid in a raised response",
                    callee
                )))
            }
        };
        Ok(value)
    }

    fn materialize_all(self: &Arc<Self>, module: &str, items: Vec<Expr>) -> Result<Vec<Value>> {
        items
            .into_iter()
            .map(|item| self.materialize(module, item, false))
            .collect()
    }

    fn instance(
        self: &Arc<Self>,
        module: &str,
        style: InstanceStyle,
        class_name: &str,
        handle: String,
        raised: bool,
    ) -> Result<Arc<InstanceProxy>> {
        let kind = match (style, raised) {
            (_, true) => InstanceKind::Exception,
            (InstanceStyle::NewStyle, false) => InstanceKind::NewStyle,
            (InstanceStyle::Classic, false) => InstanceKind::Plain,
        };
        let class = self.classes.resolve(module, class_name, kind)?;
        Ok(Arc::new(InstanceProxy::new(class, handle, Arc::clone(self))))
    }

    /// Rebuild the payload of a `raise` response
    pub fn exception(self: &Arc<Self>, module: &str, expr: Expr) -> Result<RemoteException> {
        match expr {
            Expr::Construct { callee, args } => Ok(RemoteException::Native {
                type_name: callee,
                args: self.materialize_all(module, args)?,
            }),
            Expr::Instance {
                style,
                class_name,
                handle,
            } => Ok(RemoteException::Instance(
                self.instance(module, style, &class_name, handle, true)?,
            )),
            other => Ok(RemoteException::Value(self.materialize(module, other, false)?)),
        }
    }
}

fn record(request: &Request) {
    metrics::counter!("sut_intercept_requests_total", "kind" => request.kind().tag()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::CallContext;
    use crate::transport::ScriptedTransport;
    use proptest::prelude::*;

    fn backend(transport: ScriptedTransport) -> (Arc<ProxyBackend>, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        let backend = Arc::new(ProxyBackend::new(transport.clone()));
        (backend, transport)
    }

    #[test]
    fn test_literal_values() {
        let (backend, transport) = backend(
            ScriptedTransport::new().respond("GETATTR:clock:SEP:now", "[1, 'two', (3.5,)]"),
        );
        let value = backend.get_attr("clock", "now", "clock").unwrap().unwrap();
        assert_eq!(
            value,
            Value::List(vec![
                Value::Int(1),
                Value::from("two"),
                Value::Tuple(vec![Value::Float(3.5)]),
            ])
        );
        assert_eq!(transport.sent(), vec!["GETATTR:clock:SEP:now"]);
    }

    #[test]
    fn test_empty_is_none() {
        let (backend, _) = backend(ScriptedTransport::new());
        assert!(backend.import("widgets").unwrap().is_none());
    }

    #[test]
    fn test_instance_registers_class() {
        let (backend, _) = backend(
            ScriptedTransport::new().respond("GETATTR:widgets:SEP:main", "Instance(Window, win-1)"),
        );
        let value = backend.get_attr("widgets", "main", "widgets").unwrap().unwrap();
        assert_eq!(value.remote_name().as_deref(), Some("win-1"));
        assert_eq!(value.type_name(), "Window");

        let spec = backend.classes().lookup("widgets", "Window").unwrap();
        assert_eq!(spec.kind, InstanceKind::Plain);
    }

    #[test]
    fn test_raise_native() {
        let (backend, _) = backend(
            ScriptedTransport::new()
                .respond("CALL:widgets:SEP:Button:SEP:():SEP:{}", "raise ValueError('bad label')"),
        );
        let err = backend
            .call("widgets", "Button", &Args::new(), "widgets")
            .unwrap_err();
        let exc = err.remote().unwrap();
        assert_eq!(exc.type_name(), "ValueError");
        assert_eq!(err.to_string(), "bad label");
    }

    #[test]
    fn test_raise_instance_is_exception_kind() {
        let (backend, _) = backend(
            ScriptedTransport::new()
                .respond("GETATTR:net:SEP:fetch", "raise Instance(Timeout, Timeout1)")
                .respond("GETATTR:Timeout1:SEP:__str__", "")
                .respond("CALL:Timeout1:SEP:__str__:SEP:():SEP:{}", "'took too long'"),
        );
        let err = backend.get_attr("net", "fetch", "net").unwrap_err();
        let exc = err.remote().unwrap();
        assert_eq!(exc.type_name(), "Timeout");
        assert_eq!(exc.message(&CallContext::runtime()).unwrap(), "took too long");
        assert!(backend.classes().lookup("net", "Timeout").unwrap().is_exception());

        assert_eq!(err.to_string(), "Timeout (Timeout1)");
        assert_eq!(err.message(&CallContext::runtime()), "took too long");
    }

    #[test]
    fn test_error_message_falls_back_to_display() {
        let (backend, transport) = backend(
            ScriptedTransport::new().respond("GETATTR:net:SEP:fetch", "raise Instance(Timeout, Timeout2)"),
        );
        let err = backend.get_attr("net", "fetch", "net").unwrap_err();
        transport.refuse_connections(true);
        assert_eq!(err.message(&CallContext::runtime()), "Timeout (Timeout2)");
    }

    #[test]
    fn test_construct_outside_raise_rejected() {
        let (backend, _) = backend(ScriptedTransport::new());
        let expr = Expr::Construct {
            callee: "ValueError".to_string(),
            args: vec![],
        };
        assert!(matches!(
            backend.materialize("m", expr, false),
            Err(InterceptError::Protocol(_))
        ));
    }

    #[test]
    fn test_malformed_reply_fails() {
        let (backend, _) =
            backend(ScriptedTransport::new().respond("GETATTR:clock:SEP:now", "[1, 2"));
        assert!(matches!(
            backend.get_attr("clock", "now", "clock"),
            Err(InterceptError::Decode { .. })
        ));
    }

    #[test]
    fn test_set_attr_is_posted() {
        let (backend, transport) = backend(ScriptedTransport::new());
        backend
            .set_attr("btn-17", "label", &Value::from("Stop"))
            .unwrap();
        assert_eq!(transport.sent(), vec!["SETATTR:btn-17:SEP:label:SEP:'Stop'"]);
    }

    fn value_tree() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::None),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|i| Value::Int(i.into())),
            (-1.0e9f64..1.0e9).prop_map(Value::Float),
            "\\PC{0,12}".prop_map(Value::Str),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Tuple),
                prop::collection::vec(("[a-z_]{1,6}", inner), 0..4).prop_map(|pairs| {
                    Value::Dict(pairs.into_iter().map(|(k, v)| (Value::Str(k), v)).collect())
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_echoed_containers_rebuild(value in value_tree()) {
            let (backend, _) = backend(ScriptedTransport::new());
            let expr = match Response::parse(&value.repr()).unwrap() {
                Response::Value(expr) => expr,
                other => panic!("expected a value, got {:?}", other),
            };
            prop_assert_eq!(backend.materialize("echo", expr, false).unwrap(), value);
        }
    }
}
