// packages/intercept/src/interception/bootstrap.rs
//! Interception bootstrap
//!
//! Splits the configured targets into full and partial interception and
//! installs both against a single [`CallerGate`].

use crate::gate::{CallContext, CallerGate};
use crate::interception::import_hook::ProxyImportHook;
use crate::interception::module_loader::ModuleLoader;
use crate::interception::partial::{PartialInterceptor, PatchSet};
use crate::proxy::ProxyBackend;
use crate::utils::config::InterceptConfig;
use crate::utils::errors::{InterceptError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// How each target will be intercepted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterceptionPlan {
    /// Modules replaced wholesale at import time
    pub full: Vec<String>,

    /// Real module name -> dotted attribute paths patched on it
    pub partial: BTreeMap<String, Vec<String>>,
}

impl InterceptionPlan {
    /// Classify targets against what the loader can import.
    ///
    /// A target that is itself importable, or that has no importable parent,
    /// is intercepted in full. A dotted target under an importable module is
    /// patched onto that module.
    pub fn resolve<S: AsRef<str>>(loader: &ModuleLoader, targets: &[S]) -> Result<Self> {
        let mut plan = Self::default();

        for target in targets {
            let target = target.as_ref();
            if target.is_empty() {
                return Err(InterceptError::Config(
                    "Empty interception target".to_string(),
                ));
            }

            match split_by_module(loader, target) {
                Some((module, attr)) if !attr.is_empty() => {
                    let attrs = plan.partial.entry(module).or_default();
                    if !attrs.contains(&attr) {
                        attrs.push(attr);
                    }
                }
                _ => {
                    if !plan.full.iter().any(|f| f == target) {
                        plan.full.push(target.to_string());
                    }
                }
            }
        }

        plan.check_conflicts()?;
        Ok(plan)
    }

    fn check_conflicts(&self) -> Result<()> {
        for module in self.partial.keys() {
            let covered = self.full.iter().find(|full| {
                module == *full
                    || module
                        .strip_prefix(full.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            });
            if let Some(full) = covered {
                return Err(InterceptError::ConflictingTargets(format!(
                    "'{}' is intercepted in full, so attributes of '{}' cannot also be patched",
                    full, module
                )));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty() && self.partial.is_empty()
    }
}

/// Longest importable prefix of `name` and the attribute path below it
fn split_by_module(loader: &ModuleLoader, name: &str) -> Option<(String, String)> {
    if loader.can_import(name) {
        return Some((name.to_string(), String::new()));
    }

    let (parent, local) = name.rsplit_once('.')?;
    let (module, attr) = split_by_module(loader, parent)?;
    let attr = if attr.is_empty() {
        local.to_string()
    } else {
        format!("{}.{}", attr, local)
    };
    Some((module, attr))
}

/// An installed interception
pub struct Interception {
    plan: InterceptionPlan,
    backend: Arc<ProxyBackend>,
    gate: Arc<CallerGate>,
}

impl Interception {
    pub fn plan(&self) -> &InterceptionPlan {
        &self.plan
    }

    pub fn backend(&self) -> &Arc<ProxyBackend> {
        &self.backend
    }

    pub fn gate(&self) -> &Arc<CallerGate> {
        &self.gate
    }
}

/// Install interception of `targets` on `loader`.
///
/// Must run before any fully intercepted module is first imported; modules
/// already in the loaded cache keep their real implementation.
pub fn intercept<I, S, J, T>(
    loader: &Arc<ModuleLoader>,
    backend: Arc<ProxyBackend>,
    targets: I,
    excluded_callers: J,
) -> Result<Interception>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    J: IntoIterator<Item = T>,
    T: Into<String>,
{
    let targets: Vec<S> = targets.into_iter().collect();
    intercept_with_gate(loader, backend, &targets, CallerGate::new(excluded_callers))
}

/// Install interception using settings from `config`
pub fn intercept_from_config(
    loader: &Arc<ModuleLoader>,
    config: &InterceptConfig,
) -> Result<Interception> {
    let backend = Arc::new(ProxyBackend::from_config(config)?);
    let mut gate = CallerGate::new(config.gate.excluded_callers.iter().cloned());
    if let Some(dir) = &config.gate.runtime_dir {
        gate = gate.with_runtime_dir(dir);
    }
    intercept_with_gate(loader, backend, &config.targets, gate)
}

pub fn intercept_with_gate<S: AsRef<str>>(
    loader: &Arc<ModuleLoader>,
    backend: Arc<ProxyBackend>,
    targets: &[S],
    gate: CallerGate,
) -> Result<Interception> {
    let plan = InterceptionPlan::resolve(loader, targets)?;
    loader.mark_installed()?;
    let gate = Arc::new(gate);

    // Patch first: a failure here leaves the loader unclaimed and untouched
    if let Err(e) = patch_partial_targets(loader, &backend, &gate, &plan) {
        loader.release_installation();
        return Err(e);
    }

    if !plan.full.is_empty() {
        loader.install_hook(Arc::new(ProxyImportHook::new(
            plan.full.clone(),
            Arc::clone(&backend),
            Arc::clone(&gate),
        )));
    }

    info!(
        full = ?plan.full,
        partial = ?plan.partial,
        excluded = ?gate.excluded_callers().collect::<Vec<_>>(),
        "Interception installed"
    );

    Ok(Interception {
        plan,
        backend,
        gate,
    })
}

fn patch_partial_targets(
    loader: &ModuleLoader,
    backend: &Arc<ProxyBackend>,
    gate: &Arc<CallerGate>,
    plan: &InterceptionPlan,
) -> Result<()> {
    let cx = CallContext::machinery();
    let mut applied: Vec<PatchSet> = Vec::new();

    for (module, attrs) in &plan.partial {
        let patched = loader.import_real(module).and_then(|real| {
            PartialInterceptor::new(module, Arc::clone(backend), Arc::clone(gate))
                .intercept_attributes(&cx, &real, attrs)
        });
        match patched {
            Ok(patches) => applied.push(patches),
            Err(e) => {
                for patches in applied.into_iter().rev() {
                    patches.restore(&cx);
                }
                return Err(e);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::Caller;
    use crate::object::{Args, Namespace, NativeFunction, Value};
    use crate::transport::ScriptedTransport;

    fn loader() -> Arc<ModuleLoader> {
        let loader = ModuleLoader::new();
        loader.register("clock", || {
            Ok(Value::object(
                Namespace::new("clock")
                    .with(
                        "now",
                        Value::object(NativeFunction::new("now", |_, _| Ok(Value::Int(1000)))),
                    )
                    .with("zone", Value::object(Namespace::frozen("zone").with("name", "UTC"))),
            ))
        });
        loader.register_module("os.path", Value::object(Namespace::new("os.path")));
        loader
    }

    fn backend() -> (Arc<ProxyBackend>, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new());
        (Arc::new(ProxyBackend::new(transport.clone())), transport)
    }

    #[test]
    fn test_plan_classification() {
        let loader = loader();
        let plan = InterceptionPlan::resolve(
            &loader,
            &["widgets", "clock.now", "clock.zone.name", "os.path", "ghost.attr", "clock.now"],
        )
        .unwrap();

        assert_eq!(plan.full, vec!["widgets", "os.path", "ghost.attr"]);
        assert_eq!(
            plan.partial.get("clock").unwrap(),
            &vec!["now".to_string(), "zone.name".to_string()]
        );
    }

    #[test]
    fn test_conflicting_targets() {
        let loader = loader();
        let err = InterceptionPlan::resolve(&loader, &["clock", "clock.now"]).unwrap_err();
        assert!(matches!(err, InterceptError::ConflictingTargets(_)));
    }

    #[test]
    fn test_intercept_installs_both_kinds() {
        let loader = loader();
        let (backend, transport) = backend();
        let interception =
            intercept(&loader, backend, ["widgets", "clock.now"], ["harness"]).unwrap();
        assert_eq!(interception.plan().full, vec!["widgets"]);
        assert_eq!(loader.hook_count(), 1);
        assert_eq!(transport.sent(), vec!["GETATTR:clock:SEP:now"]);

        let sut = CallContext::new(Caller::module("app"));
        let clock = loader.import(&sut, "clock").unwrap();
        let now = clock.get_attr(&sut, "now").unwrap();
        assert_eq!(now.call(&sut, Args::new()).unwrap(), Value::None);

        let harness = CallContext::new(Caller::module("harness"));
        assert_eq!(now.call(&harness, Args::new()).unwrap(), Value::Int(1000));

        loader.import(&sut, "widgets").unwrap();
        assert_eq!(
            transport.sent(),
            vec![
                "GETATTR:clock:SEP:now",
                "CALL:clock:SEP:now:SEP:():SEP:{}",
                "IMPORT:widgets"
            ]
        );
    }

    #[test]
    fn test_second_bootstrap_rejected() {
        let loader = loader();
        let (backend, _) = backend();
        intercept(&loader, Arc::clone(&backend), ["widgets"], Vec::<String>::new()).unwrap();
        assert!(matches!(
            intercept(&loader, backend, ["other"], Vec::<String>::new()),
            Err(InterceptError::AlreadyInstalled)
        ));
    }

    #[test]
    fn test_failed_plan_does_not_claim_loader() {
        let loader = loader();
        let (backend, _) = backend();
        assert!(intercept(&loader, Arc::clone(&backend), [""], Vec::<String>::new()).is_err());
        assert!(intercept(&loader, backend, ["widgets"], Vec::<String>::new()).is_ok());
    }

    #[test]
    fn test_failed_patching_leaves_loader_reusable() {
        let loader = loader();
        let transport = Arc::new(ScriptedTransport::new());
        let backend = Arc::new(ProxyBackend::new(transport.clone()));
        transport.refuse_connections(true);

        let err = intercept(&loader, Arc::clone(&backend), ["widgets", "clock.now"], ["harness"])
            .err()
            .unwrap();
        assert!(matches!(err, InterceptError::Transport { .. }));
        assert_eq!(loader.hook_count(), 0);
        assert!(!loader.is_installed());

        let cx = CallContext::runtime();
        let clock = loader.import_real("clock").unwrap();
        assert_eq!(clock.get_attr(&cx, "now").unwrap().type_name(), "function");

        transport.refuse_connections(false);
        intercept(&loader, backend, ["widgets", "clock.now"], ["harness"]).unwrap();
        assert_eq!(loader.hook_count(), 1);
        assert!(loader.is_installed());
        assert_eq!(
            clock.get_attr(&cx, "now").unwrap().remote_name().as_deref(),
            Some("clock.now")
        );
    }

    #[test]
    fn test_excluded_caller_reads_through_partial_path() {
        let loader = loader();
        let (backend, transport) = backend();
        intercept(&loader, backend, ["clock.zone"], ["harness"]).unwrap();
        assert_eq!(transport.sent(), vec!["GETATTR:clock:SEP:zone"]);

        let harness = CallContext::new(Caller::module("harness"));
        let clock = loader.import(&harness, "clock").unwrap();
        let zone = clock.get_attr(&harness, "zone").unwrap();
        assert_eq!(zone.get_attr(&harness, "name").unwrap(), Value::from("UTC"));
        assert_eq!(transport.sent().len(), 1);

        let sut = CallContext::new(Caller::module("app"));
        let name = zone.get_attr(&sut, "name").unwrap();
        assert_eq!(name.remote_name().as_deref(), Some("clock.zone.name"));
        assert_eq!(
            transport.sent(),
            vec!["GETATTR:clock:SEP:zone", "GETATTR:clock:SEP:zone.name"]
        );
    }

    #[test]
    fn test_intercept_from_config() {
        use crate::stub::{spawn_background, ReplayScript};

        let stub = spawn_background(ReplayScript::new().on("GETATTR:clock:SEP:now", "")).unwrap();
        std::env::set_var("SUT_INTERCEPT_BOOTSTRAP_SERVER", stub.endpoint());

        let mut config = InterceptConfig::default();
        config.transport.endpoint_var = "SUT_INTERCEPT_BOOTSTRAP_SERVER".to_string();
        config.targets = vec!["widgets".to_string(), "clock.now".to_string()];
        config.gate.excluded_callers = vec!["harness".to_string()];
        config.gate.runtime_dir = Some("/usr/lib/platform".into());

        let loader = loader();
        let interception = intercept_from_config(&loader, &config).unwrap();
        assert_eq!(interception.plan().full, vec!["widgets"]);
        assert_eq!(loader.hook_count(), 1);
        assert_eq!(
            stub.wait_for_requests(1, std::time::Duration::from_secs(5)),
            vec!["GETATTR:clock:SEP:now"]
        );

        let gate = interception.gate();
        assert!(gate.caller_excluded(&CallContext::new(Caller::module("harness.bridge"))));
        assert!(gate.caller_excluded(&CallContext::new(Caller::from_source_path(
            "/usr/lib/platform/socket.py"
        ))));
        assert!(!gate.caller_excluded(&CallContext::new(Caller::from_source_path(
            "/srv/app/main.py"
        ))));
    }
}
