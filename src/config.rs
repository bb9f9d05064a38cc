//! Tunables for the reconcile loop. Requeue intervals and the condition
//! history cap are the only things that vary by deployment; everything
//! else about the loop's behavior is fixed by the step/component
//! contracts themselves.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long to ask the caller to wait before the next tick once a
    /// rolling sync has been kicked off for not-ready components.
    pub sync_requeue_interval: Duration,
    /// How long to wait once the cluster is steady (all components
    /// ready, nothing to sync).
    pub steady_requeue_interval: Duration,
    /// How long to wait after a full-update possibility check fails, or
    /// after the full-update sequence reports itself blocked.
    pub blocked_requeue_interval: Duration,
    /// How many committed conditions `InMemoryConditionStore` keeps per
    /// name before dropping the oldest transition history. Conditions
    /// store only their current value plus the last transition, so this
    /// bounds a future history-log feature rather than today's state.
    pub max_condition_history: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            sync_requeue_interval: Duration::from_secs(1),
            steady_requeue_interval: Duration::from_secs(5),
            blocked_requeue_interval: Duration::from_secs(30),
            max_condition_history: 1000,
        }
    }
}
