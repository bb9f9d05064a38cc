use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::condition::ConditionStore;
use crate::error::Result;
use crate::observed::ObservedState;
use crate::platform::ServerEmbedding;
use crate::state::{ClusterState, ComponentStatus, SyncStatus};

use super::Component;

/// Master is the one component whose own config change requires a
/// cluster-wide full update rather than an in-place rolling restart —
/// every other stateful role's data depends on master-assigned cell IDs
/// surviving a master restart, so a plain rolling update isn't safe.
pub struct Master<E: ServerEmbedding> {
    name: String,
    embedding: Arc<E>,
    desired_replicas: u32,
    config_hash: String,
    cluster_state: Arc<RwLock<ClusterState>>,
    observed: RwLock<ObservedState>,
}

impl<E: ServerEmbedding + 'static> Master<E> {
    pub fn new(
        embedding: Arc<E>,
        desired_replicas: u32,
        config_hash: impl Into<String>,
        cluster_state: Arc<RwLock<ClusterState>>,
    ) -> Self {
        Self {
            name: "Master".to_string(),
            embedding,
            desired_replicas,
            config_hash: config_hash.into(),
            cluster_state,
            observed: RwLock::new(ObservedState::default()),
        }
    }

    fn needs_full_update(&self) -> bool {
        let observed = self.observed.read();
        observed.workload_exists && observed.applied_config_hash.as_deref() != Some(self.config_hash.as_str())
    }
}

#[async_trait]
impl<E: ServerEmbedding + 'static> Component for Master<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<()> {
        *self.observed.write() = self.embedding.fetch().await?;
        Ok(())
    }

    fn status(&self) -> ComponentStatus {
        let in_update_flow = *self.cluster_state.read() == ClusterState::Updating;
        if self.needs_full_update() && !in_update_flow {
            return ComponentStatus::new(SyncStatus::NeedFullUpdate, "master config changed");
        }
        let observed = self.observed.read();
        if !observed.workload_exists {
            return ComponentStatus::new(SyncStatus::Pending, "not built yet");
        }
        if !observed.all_pods_ready(self.desired_replicas) {
            return ComponentStatus::new(SyncStatus::Updating, "rolling out");
        }
        ComponentStatus::ready()
    }

    async fn sync(&self, _conds: &dyn ConditionStore) -> Result<()> {
        let observed = self.observed.read().clone();
        if !observed.workload_exists || !observed.all_pods_ready(self.desired_replicas) {
            self.embedding.apply(self.desired_replicas, &self.config_hash).await?;
        }
        Ok(())
    }
}
