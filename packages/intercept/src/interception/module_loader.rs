// packages/intercept/src/interception/module_loader.rs
//! Module loader and its hook chain

use crate::gate::CallContext;
use crate::interception::import_hook::ImportHook;
use crate::object::Value;
use crate::utils::errors::{InterceptError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Builds a real module the first time it is needed
pub type ModuleFactory = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

/// Where the system under test acquires modules.
///
/// `import` consults the loaded-module cache, then the installed hooks in
/// order, then the real modules. Real modules are instantiated once, so
/// in-place patches made by partial interception are seen by every import.
pub struct ModuleLoader {
    available: RwLock<HashMap<String, ModuleFactory>>,
    real: RwLock<HashMap<String, Value>>,
    loaded: RwLock<HashMap<String, Value>>,
    hooks: RwLock<Vec<Arc<dyn ImportHook>>>,
    installed: AtomicBool,
}

impl ModuleLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            available: RwLock::new(HashMap::new()),
            real: RwLock::new(HashMap::new()),
            loaded: RwLock::new(HashMap::new()),
            hooks: RwLock::new(Vec::new()),
            installed: AtomicBool::new(false),
        })
    }

    /// Make a real module importable, built lazily by `factory`
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        self.available.write().insert(name.into(), Arc::new(factory));
    }

    /// Make an already built module importable
    pub fn register_module(&self, name: impl Into<String>, module: Value) {
        self.register(name, move || Ok(module.clone()));
    }

    pub fn can_import(&self, name: &str) -> bool {
        self.available.read().contains_key(name)
    }

    /// Acquire a module the way the system under test does
    pub fn import(self: &Arc<Self>, cx: &CallContext, name: &str) -> Result<Value> {
        if let Some(module) = self.loaded(name) {
            return Ok(module);
        }

        let hook = self
            .hooks
            .read()
            .iter()
            .find(|hook| hook.should_intercept(name))
            .cloned();
        if let Some(hook) = hook {
            debug!(module = name, caller = %cx.caller(), "Import intercepted");
            return hook.load(self, cx, name);
        }

        let module = self.import_real(name)?;
        Ok(self.insert_if_absent(name, module))
    }

    /// The real module, ignoring hooks and leaving the loaded cache alone
    pub fn import_real(&self, name: &str) -> Result<Value> {
        if let Some(module) = self.real.read().get(name) {
            return Ok(module.clone());
        }

        let factory = self
            .available
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| InterceptError::ModuleNotFound(name.to_string()))?;
        let module = factory()?;

        Ok(self
            .real
            .write()
            .entry(name.to_string())
            .or_insert(module)
            .clone())
    }

    pub fn install_hook(&self, hook: Arc<dyn ImportHook>) {
        self.hooks.write().push(hook);
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn loaded(&self, name: &str) -> Option<Value> {
        self.loaded.read().get(name).cloned()
    }

    /// Cache `module` unless another import got there first; returns the cached one
    pub fn insert_if_absent(&self, name: &str, module: Value) -> Value {
        self.loaded
            .write()
            .entry(name.to_string())
            .or_insert(module)
            .clone()
    }

    /// Claim the loader for a single interception bootstrap
    pub(crate) fn mark_installed(&self) -> Result<()> {
        self.installed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| InterceptError::AlreadyInstalled)
    }

    /// Give up a claim after a bootstrap that failed part way
    pub(crate) fn release_installation(&self) {
        self.installed.store(false, Ordering::SeqCst);
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }
}
