// packages/intercept/src/proxy/class_registry.rs
//! Registry of locally mirrored remote classes
//!
//! Deferred-instance responses name a class. Rather than synthesizing a type
//! from that name, the registry records a [`ClassSpec`] drawn from a closed
//! set of kinds and hands out the shared spec to every instance of it.

use crate::utils::errors::{InterceptError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Which proxy variant instances of a class become
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceKind {
    /// Plain remote object
    Plain,
    /// Object whose string hooks are resolved on its type
    NewStyle,
    /// Remote exception type; instances can be raised
    Exception,
}

/// A remote class as known locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSpec {
    pub module: String,
    pub name: String,
    pub kind: InstanceKind,
}

impl ClassSpec {
    pub fn is_exception(&self) -> bool {
        self.kind == InstanceKind::Exception
    }
}

#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: RwLock<HashMap<(String, String), Arc<ClassSpec>>>,
    declared: RwLock<HashMap<String, InstanceKind>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a kind for every class called `name`, whatever marker announces it
    pub fn declare(&self, name: &str, kind: InstanceKind) -> Result<()> {
        validate_class_name(name)?;
        self.declared.write().insert(name.to_string(), kind);
        Ok(())
    }

    /// Register (or reuse) the class named by a deferred-instance response
    pub fn resolve(&self, module: &str, name: &str, kind: InstanceKind) -> Result<Arc<ClassSpec>> {
        validate_class_name(name)?;
        let kind = self.declared.read().get(name).copied().unwrap_or(kind);
        let key = (module.to_string(), name.to_string());

        if let Some(spec) = self.classes.read().get(&key) {
            if spec.kind == kind {
                return Ok(Arc::clone(spec));
            }
        }

        let mut classes = self.classes.write();
        let spec = classes
            .entry(key)
            .and_modify(|existing| {
                if existing.kind != kind {
                    *existing = Arc::new(ClassSpec {
                        module: module.to_string(),
                        name: name.to_string(),
                        kind,
                    });
                }
            })
            .or_insert_with(|| {
                Arc::new(ClassSpec {
                    module: module.to_string(),
                    name: name.to_string(),
                    kind,
                })
            });
        Ok(Arc::clone(spec))
    }

    pub fn lookup(&self, module: &str, name: &str) -> Option<Arc<ClassSpec>> {
        self.classes
            .read()
            .get(&(module.to_string(), name.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }
}

fn validate_class_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(InterceptError::Protocol(format!(
            "Invalid class name '{}' in response",
            name
        )))
    }
}
