// packages/intercept/src/interception/mod.rs
//! Import interception
//!
//! The [`ModuleLoader`] is where the system under test acquires modules.
//! Bootstrapping installs a [`ProxyImportHook`] for fully intercepted modules
//! and patches partially intercepted attributes onto the real modules in
//! place.

pub mod bootstrap;
pub mod import_hook;
pub mod module_loader;
pub mod partial;

pub use bootstrap::{intercept, intercept_from_config, intercept_with_gate, Interception, InterceptionPlan};
pub use import_hook::{ImportHook, ProxyImportHook};
pub use module_loader::{ModuleFactory, ModuleLoader};
pub use partial::{PartialInterceptor, PatchSet};
