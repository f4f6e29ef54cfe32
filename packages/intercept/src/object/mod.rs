// packages/intercept/src/object/mod.rs
//! Local object model
//!
//! Everything the system under test touches is a [`Value`]; anything with
//! attributes or behavior is an [`Object`]. Real library modules and the
//! proxies standing in for them implement the same trait, which is what lets
//! a proxy be substituted without the caller noticing.

pub mod args;
pub mod native;
pub mod transparent;
pub mod value;

pub use args::Args;
pub use native::{Namespace, NativeFunction};
pub use transparent::TransparentProxy;
pub use value::Value;

use crate::gate::CallContext;
use crate::utils::errors::{InterceptError, Result};

/// Behavior shared by local objects and remote proxies
pub trait Object: Send + Sync {
    /// Type name used in messages and default representations
    fn type_name(&self) -> &str;

    /// Look up an attribute
    fn get_attr(&self, cx: &CallContext, name: &str) -> Result<Value>;

    /// Rebind an attribute
    fn set_attr(&self, _cx: &CallContext, name: &str, _value: Value) -> Result<()> {
        Err(InterceptError::read_only(self.type_name(), name))
    }

    /// Invoke the object
    fn call(&self, _cx: &CallContext, _args: Args) -> Result<Value> {
        Err(InterceptError::NotCallable(self.type_name().to_string()))
    }

    /// Name the remote side knows this object by; `None` for local objects
    fn remote_name(&self) -> Option<String> {
        None
    }

    /// Human-readable form
    fn to_str(&self, cx: &CallContext) -> Result<String> {
        self.to_repr(cx)
    }

    /// Unambiguous form
    fn to_repr(&self, _cx: &CallContext) -> Result<String> {
        Ok(format!("<{} object>", self.type_name()))
    }
}
