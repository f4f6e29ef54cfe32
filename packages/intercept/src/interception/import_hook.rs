// packages/intercept/src/interception/import_hook.rs
//! Import hooks

use crate::gate::{CallContext, CallerGate};
use crate::interception::module_loader::ModuleLoader;
use crate::object::Value;
use crate::proxy::{ModuleProxy, ProxyBackend};
use crate::utils::errors::Result;
use std::sync::Arc;
use tracing::debug;

/// Consulted by [`ModuleLoader::import`] for every module not yet loaded
pub trait ImportHook: Send + Sync {
    fn should_intercept(&self, name: &str) -> bool;

    fn load(&self, loader: &Arc<ModuleLoader>, cx: &CallContext, name: &str) -> Result<Value>;
}

/// Replaces fully intercepted modules with [`ModuleProxy`] values
pub struct ProxyImportHook {
    targets: Vec<String>,
    backend: Arc<ProxyBackend>,
    gate: Arc<CallerGate>,
}

impl ProxyImportHook {
    pub fn new(targets: Vec<String>, backend: Arc<ProxyBackend>, gate: Arc<CallerGate>) -> Self {
        Self {
            targets,
            backend,
            gate,
        }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }
}

impl ImportHook for ProxyImportHook {
    fn should_intercept(&self, name: &str) -> bool {
        self.targets.iter().any(|target| {
            name == target
                || name
                    .strip_prefix(target.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    fn load(&self, loader: &Arc<ModuleLoader>, cx: &CallContext, name: &str) -> Result<Value> {
        if self.gate.caller_excluded(cx) {
            // Not cached, so the next import is decided afresh
            debug!(module = name, caller = %cx.caller(), "Loading real module for excluded caller");
            return loader.import_real(name);
        }

        let proxy = ModuleProxy::full(
            name,
            Arc::clone(&self.backend),
            Arc::downgrade(loader),
            Arc::clone(&self.gate),
        )?;
        Ok(loader.insert_if_absent(name, Value::object(proxy)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::Caller;
    use crate::object::Namespace;
    use crate::transport::ScriptedTransport;

    fn hook(transport: &Arc<ScriptedTransport>) -> ProxyImportHook {
        ProxyImportHook::new(
            vec!["widgets".to_string(), "net.http".to_string()],
            Arc::new(ProxyBackend::new(transport.clone())),
            Arc::new(CallerGate::new(["harness"])),
        )
    }

    #[test]
    fn test_should_intercept_descendants() {
        let transport = Arc::new(ScriptedTransport::new());
        let hook = hook(&transport);
        assert!(hook.should_intercept("widgets"));
        assert!(hook.should_intercept("widgets.dialogs"));
        assert!(hook.should_intercept("net.http"));
        assert!(!hook.should_intercept("widgetsx"));
        assert!(!hook.should_intercept("net"));
    }

    #[test]
    fn test_proxy_cached_for_sut() {
        let transport = Arc::new(ScriptedTransport::new());
        let loader = ModuleLoader::new();
        loader.install_hook(Arc::new(hook(&transport)));

        let cx = CallContext::new(Caller::module("app"));
        let first = loader.import(&cx, "widgets").unwrap();
        let second = loader.import(&cx, "widgets").unwrap();
        assert_eq!(first.type_name(), "module");
        assert_eq!(first, second);
        assert_eq!(transport.sent(), vec!["IMPORT:widgets"]);
    }

    #[test]
    fn test_excluded_caller_gets_uncached_real_module() {
        let transport = Arc::new(ScriptedTransport::new());
        let loader = ModuleLoader::new();
        let real = Value::object(Namespace::new("widgets"));
        loader.register_module("widgets", real.clone());
        loader.install_hook(Arc::new(hook(&transport)));

        let harness = CallContext::new(Caller::module("harness"));
        assert_eq!(loader.import(&harness, "widgets").unwrap(), real);
        assert!(loader.loaded("widgets").is_none());
        assert!(transport.sent().is_empty());

        let sut = CallContext::new(Caller::module("app"));
        assert_ne!(loader.import(&sut, "widgets").unwrap(), real);
    }
}
