//! Re-execution strategies
//!
//! A module is only re-run when something it depends on changed. What counts
//! as "changed" is decided per module by a pluggable `ReexecutionStrategy`
//! looking at the module's `ReexecutionFlags`. Skipping is a cache: forcing
//! execution is always possible.

use std::fmt;
use std::sync::Arc;

/// Change flags tracked per module between passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReexecutionFlags {
    /// Caller explicitly requested execution
    pub forced: bool,
    /// An upstream module produced new output
    pub inputs_changed: bool,
    /// A parameter was modified
    pub parameters_changed: bool,
    /// The module completed successfully and nothing changed since
    pub has_completed: bool,
}

impl ReexecutionFlags {
    /// Reset after a successful execution
    pub(crate) fn completed() -> Self {
        Self {
            has_completed: true,
            ..Self::default()
        }
    }
}

/// Decides whether a module must run again
pub trait ReexecutionStrategy: Send + Sync {
    /// Strategy name, used in logs and snapshots
    fn name(&self) -> &'static str;

    /// Whether the module needs to execute given its change flags
    fn needs_execution(&self, flags: &ReexecutionFlags) -> bool;
}

impl fmt::Debug for dyn ReexecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Default strategy: run when forced, when inputs or parameters changed,
/// or when the module has not completed since its last change
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicReexecutionStrategy;

impl ReexecutionStrategy for DynamicReexecutionStrategy {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn needs_execution(&self, flags: &ReexecutionFlags) -> bool {
        flags.forced || flags.inputs_changed || flags.parameters_changed || !flags.has_completed
    }
}

/// Always run when selected for a pass
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReexecuteStrategy;

impl ReexecutionStrategy for AlwaysReexecuteStrategy {
    fn name(&self) -> &'static str {
        "always"
    }

    fn needs_execution(&self, _flags: &ReexecutionFlags) -> bool {
        true
    }
}

/// A built-in strategy by its `name()`
pub fn strategy_by_name(name: &str) -> Option<Arc<dyn ReexecutionStrategy>> {
    match name {
        "dynamic" => Some(Arc::new(DynamicReexecutionStrategy)),
        "always" => Some(Arc::new(AlwaysReexecuteStrategy)),
        _ => None,
    }
}
