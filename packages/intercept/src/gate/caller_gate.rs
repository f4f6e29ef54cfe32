// packages/intercept/src/gate/caller_gate.rs
//! Exclusion decision for callers that must bypass interception

use crate::gate::context::{CallContext, Caller, MACHINERY_CALLER};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::trace;

/// Immutable exclusion set, built once at bootstrap
#[derive(Debug, Clone)]
pub struct CallerGate {
    excluded: BTreeSet<String>,
    runtime_dir: Option<PathBuf>,
}

impl CallerGate {
    /// The machinery's own name is always part of the exclusion set
    pub fn new<I, S>(excluded_callers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut excluded: BTreeSet<String> =
            excluded_callers.into_iter().map(Into::into).collect();
        excluded.insert(MACHINERY_CALLER.to_string());

        Self {
            excluded,
            runtime_dir: None,
        }
    }

    /// Treat callers whose source lives in `dir` as platform runtime code
    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = Some(dir.into());
        self
    }

    pub fn excluded_callers(&self) -> impl Iterator<Item = &str> {
        self.excluded.iter().map(String::as_str)
    }

    /// True when the originating caller must see the real implementation
    pub fn caller_excluded(&self, cx: &CallContext) -> bool {
        let caller = cx.caller();
        let excluded = match caller {
            Caller::Runtime => true,
            Caller::Module { .. } => {
                let in_runtime_dir = match (&self.runtime_dir, caller.directory()) {
                    (Some(runtime), Some(dir)) => runtime.as_path() == dir,
                    _ => false,
                };
                in_runtime_dir
                    || caller.package().is_some_and(|p| self.excluded.contains(p))
                    || caller.leaf().is_some_and(|m| self.excluded.contains(m))
            }
        };

        if excluded {
            trace!(caller = %caller, "Caller excluded from interception");
            metrics::counter!("sut_intercept_gate_bypass_total").increment(1);
        }
        excluded
    }
}

impl Default for CallerGate {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}
