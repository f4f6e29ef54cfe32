// packages/intercept/src/gate/context.rs
//! Caller identity and the context token passed through forwarding calls

use std::fmt;
use std::path::{Path, PathBuf};

/// Name under which the interception machinery identifies itself
pub const MACHINERY_CALLER: &str = "sut_intercept";

/// Who is performing an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// Platform runtime internals
    Runtime,

    /// A module, optionally with the directory its source lives in
    Module {
        name: String,
        directory: Option<PathBuf>,
    },
}

impl Caller {
    /// Caller identified by a (possibly dotted) module name
    pub fn module(name: impl Into<String>) -> Self {
        Caller::Module {
            name: name.into(),
            directory: None,
        }
    }

    /// Caller identified by the source file it runs from.
    ///
    /// A package initializer (`pkg/__init__.*`) is named after its package
    /// directory and located in the package's parent directory.
    pub fn from_source_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (name, directory) = if stem == "__init__" {
            let package_dir = path.parent().unwrap_or_else(|| Path::new(""));
            let name = package_dir
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            (name, package_dir.parent().map(Path::to_path_buf))
        } else {
            (stem, path.parent().map(Path::to_path_buf))
        };

        Caller::Module { name, directory }
    }

    /// Last component of the module name
    pub fn leaf(&self) -> Option<&str> {
        match self {
            Caller::Runtime => None,
            Caller::Module { name, .. } => name.rsplit('.').next(),
        }
    }

    /// Enclosing package: the directory basename when known, else the
    /// parent component of a dotted name
    pub fn package(&self) -> Option<&str> {
        match self {
            Caller::Runtime => None,
            Caller::Module {
                directory: Some(dir),
                ..
            } => dir.file_name().and_then(|s| s.to_str()),
            Caller::Module {
                name,
                directory: None,
            } => name.rsplit_once('.').and_then(|(parent, _)| parent.rsplit('.').next()),
        }
    }

    pub fn directory(&self) -> Option<&Path> {
        match self {
            Caller::Module {
                directory: Some(dir),
                ..
            } => Some(dir),
            _ => None,
        }
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Caller::Runtime => f.write_str("<runtime>"),
            Caller::Module { name, .. } => f.write_str(name),
        }
    }
}

/// Originating caller of the current operation chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    caller: Caller,
}

impl CallContext {
    pub fn new(caller: Caller) -> Self {
        Self { caller }
    }

    /// Context for the interception machinery's own operations
    pub fn machinery() -> Self {
        Self::new(Caller::module(MACHINERY_CALLER))
    }

    /// Context for platform runtime internals
    pub fn runtime() -> Self {
        Self::new(Caller::Runtime)
    }

    pub fn caller(&self) -> &Caller {
        &self.caller
    }
}
