//! Action kind → executor binding.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::debug;

use ghosthand_contracts::{
    action::ActionKind,
    error::{GhosthandError, GhosthandResult},
};

use crate::traits::ActionExecutor;

/// Maps each action kind to the executor responsible for it.
///
/// A kind can be schema-valid yet unbound in a given deployment; resolving
/// it yields `NoExecutorRegistered`, which the orchestrator degrades to a
/// skipped step. The registry is shared read-mostly between concurrent
/// runs.
#[derive(Default)]
pub struct CapabilityRegistry {
    pub(crate) executors: RwLock<HashMap<ActionKind, Arc<dyn ActionExecutor>>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style binding used while wiring a deployment.
    pub fn with_executor(mut self, kind: ActionKind, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executors
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, executor);
        self
    }

    /// Bind (or rebind) `kind` to `executor`.
    pub fn register(
        &self,
        kind: ActionKind,
        executor: Arc<dyn ActionExecutor>,
    ) -> GhosthandResult<()> {
        let mut executors = self.executors.write().map_err(|e| GhosthandError::IntegrityFailure {
            reason: format!("capability registry lock poisoned: {e}"),
        })?;
        debug!(kind = %kind, "executor registered");
        executors.insert(kind, executor);
        Ok(())
    }

    /// Find the executor bound to `kind`.
    ///
    /// Returns `NoExecutorRegistered` for an unbound kind, and
    /// `IntegrityFailure` if the registry itself is unusable.
    pub fn resolve(&self, kind: ActionKind) -> GhosthandResult<Arc<dyn ActionExecutor>> {
        let executors = self.executors.read().map_err(|e| GhosthandError::IntegrityFailure {
            reason: format!("capability registry lock poisoned: {e}"),
        })?;
        executors
            .get(&kind)
            .cloned()
            .ok_or_else(|| GhosthandError::NoExecutorRegistered {
                kind: kind.as_str().to_string(),
            })
    }

    /// Kinds with a bound executor, in schema declaration order.
    pub fn registered_kinds(&self) -> Vec<ActionKind> {
        let executors = self.executors.read().unwrap_or_else(PoisonError::into_inner);
        ActionKind::ALL
            .into_iter()
            .filter(|kind| executors.contains_key(kind))
            .collect()
    }
}
