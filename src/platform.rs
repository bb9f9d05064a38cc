//! The orchestration platform: pod/workload/service/config-map CRUD,
//! event emission and requeue hints. Deliberately out of scope per the
//! purpose statement — this module pins down only the interface a
//! component's server embedding needs, the real implementation (talking
//! to Kubernetes or an equivalent) lives outside this crate.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::observed::ObservedState;

/// What the orchestrator returns to its caller after a tick: whether to
/// requeue immediately, and/or after a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequeueHint {
    pub requeue: bool,
    pub requeue_after: Option<Duration>,
}

impl RequeueHint {
    pub const NONE: Self = Self { requeue: false, requeue_after: None };

    pub fn immediate() -> Self {
        Self { requeue: true, requeue_after: None }
    }

    pub fn after(d: Duration) -> Self {
        Self { requeue: false, requeue_after: Some(d) }
    }
}

/// A component's server embedding: workload (stateful replicas),
/// headless service, and config-map projection, expressed as the
/// minimal operations a flow-driven component needs from the platform.
#[async_trait]
pub trait ServerEmbedding: Send + Sync {
    /// Apply the config-map and (re-)create the workload at the desired
    /// replica count. Must be idempotent: calling it again with the same
    /// `desired_replicas`/`config_hash` is a no-op on the platform side.
    async fn apply(&self, desired_replicas: u32, config_hash: &str) -> Result<()>;

    /// Delete all pods owned by this component's workload, without
    /// deleting the workload object itself.
    async fn delete_pods(&self) -> Result<()>;

    /// Read-only, side-effect-free fetch of observed state.
    async fn fetch(&self) -> Result<ObservedState>;

    async fn emit_event(&self, _message: &str) {}
}

/// In-memory stand-in for the orchestration platform, used by tests and
/// the demo binary. Each component gets its own slot; `mark_pods_ready`
/// lets a test advance a scenario one "platform tick" at a time without
/// needing a real control plane.
pub mod mock {
    use std::collections::HashMap;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Slot {
        exists: bool,
        desired_replicas: u32,
        applied_config_hash: Option<String>,
        ready: bool,
    }

    #[derive(Default)]
    pub struct MockPlatform {
        slots: Mutex<HashMap<String, Slot>>,
    }

    impl MockPlatform {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Simulates the platform finishing a rollout: all pods for
        /// `component` become ready. Tests call this between reconcile
        /// ticks to move a scenario forward.
        pub fn mark_pods_ready(&self, component: &str) {
            if let Some(slot) = self.slots.lock().get_mut(component) {
                slot.ready = true;
            }
        }

        pub fn embedding(self: &Arc<Self>, component: &str) -> MockServerEmbedding {
            MockServerEmbedding { platform: self.clone(), component: component.to_string() }
        }
    }

    pub struct MockServerEmbedding {
        platform: Arc<MockPlatform>,
        component: String,
    }

    #[async_trait]
    impl ServerEmbedding for MockServerEmbedding {
        async fn apply(&self, desired_replicas: u32, config_hash: &str) -> Result<()> {
            let mut slots = self.platform.slots.lock();
            let slot = slots.entry(self.component.clone()).or_default();
            let changed = !slot.exists
                || slot.desired_replicas != desired_replicas
                || slot.applied_config_hash.as_deref() != Some(config_hash);
            slot.exists = true;
            slot.desired_replicas = desired_replicas;
            slot.applied_config_hash = Some(config_hash.to_string());
            if changed {
                slot.ready = false;
            }
            Ok(())
        }

        async fn delete_pods(&self) -> Result<()> {
            let mut slots = self.platform.slots.lock();
            let slot = slots.entry(self.component.clone()).or_default();
            slot.ready = false;
            Ok(())
        }

        async fn fetch(&self) -> Result<ObservedState> {
            let slots = self.platform.slots.lock();
            let slot = slots.get(&self.component).cloned().unwrap_or_default();
            let replica_count = if slot.ready { slot.desired_replicas } else { 0 };
            Ok(ObservedState {
                pod_count: replica_count,
                ready_pod_count: replica_count,
                applied_config_hash: slot.applied_config_hash,
                workload_exists: slot.exists,
                workload_replicas: slot.desired_replicas,
            })
        }
    }
}
