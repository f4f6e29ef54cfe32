// packages/intercept/src/proxy/mod.rs
//! Proxy object model
//!
//! Proxies stand in for remote modules, attribute paths, objects and
//! classes. Each operation on a proxy is one blocking round trip through the
//! shared [`ProxyBackend`]; decoded instance markers become
//! [`InstanceProxy`] values whose classes are tracked in the
//! [`ClassRegistry`].

pub mod attribute_proxy;
pub mod backend;
pub mod class_registry;
pub mod exception;
pub mod instance_proxy;
pub mod module_proxy;

pub use attribute_proxy::AttributeProxy;
pub use backend::ProxyBackend;
pub use class_registry::{ClassRegistry, ClassSpec, InstanceKind};
pub use exception::RemoteException;
pub use instance_proxy::{InstanceProxy, ProxyClass};
pub use module_proxy::ModuleProxy;
