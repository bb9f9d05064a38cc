use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::condition::{names, Condition, ConditionStore};
use crate::error::Result;
use crate::live_client::BundleClient;
use crate::observed::ObservedState;
use crate::platform::ServerEmbedding;
use crate::spec::BootstrapSpec;
use crate::state::{ComponentStatus, SyncStatus};

use super::Component;

const SYS_BUNDLE: &str = "sys";
const DEFAULT_BUNDLE: &str = "default";

/// The tablet-node role, on top of the standard build/update flow, owns
/// one-time bundle bootstrap (`sys` and `default` tablet-cell bundles):
/// only the first tablet-node group in the spec runs it, mirroring the
/// `doInitialization` flag the original controller passes to exactly one
/// `TabletNode` instance.
pub struct TabletNode<E: ServerEmbedding, C: BundleClient> {
    name: String,
    embedding: Arc<E>,
    bundle_client: Arc<C>,
    desired_replicas: u32,
    config_hash: String,
    bootstrap: BootstrapSpec,
    do_initialization: bool,
    depends_on: Vec<Arc<dyn Component>>,
    observed: RwLock<ObservedState>,
}

impl<E: ServerEmbedding + 'static, C: BundleClient + 'static> TabletNode<E, C> {
    pub fn new(
        name: impl Into<String>,
        embedding: Arc<E>,
        bundle_client: Arc<C>,
        desired_replicas: u32,
        config_hash: impl Into<String>,
        bootstrap: BootstrapSpec,
        do_initialization: bool,
        depends_on: Vec<Arc<dyn Component>>,
    ) -> Self {
        Self {
            name: name.into(),
            embedding,
            bundle_client,
            desired_replicas,
            config_hash: config_hash.into(),
            bootstrap,
            do_initialization,
            depends_on,
            observed: RwLock::new(ObservedState::default()),
        }
    }

    fn init_bundles_condition(&self) -> String {
        names::init_completed(&format!("{}Bundles", self.name))
    }

    fn dependencies_ready(&self) -> bool {
        self.depends_on.iter().all(|c| c.status().sync_status == SyncStatus::Ready)
    }

    async fn initialize_bundles(&self) -> Result<()> {
        let sys_path = format!("//sys/tablet_cell_bundles/{SYS_BUNDLE}");
        if !self.bundle_client.node_exists(&sys_path).await? {
            let mut options = vec![
                ("changelog_account".to_string(), "sys".to_string()),
                ("snapshot_account".to_string(), "sys".to_string()),
            ];
            if let Some(b) = self.bootstrap.tablet_cell_bundles.get(SYS_BUNDLE) {
                if let Some(m) = &b.changelog_primary_medium {
                    options.push(("changelog_primary_medium".to_string(), m.clone()));
                }
                if let Some(m) = &b.snapshot_primary_medium {
                    options.push(("snapshot_primary_medium".to_string(), m.clone()));
                }
            }
            self.bundle_client.create_tablet_cell_bundle(SYS_BUNDLE, options).await?;
        }

        if let Some(b) = self.bootstrap.tablet_cell_bundles.get(DEFAULT_BUNDLE) {
            let path = format!("//sys/tablet_cell_bundles/{DEFAULT_BUNDLE}");
            if let Some(m) = &b.changelog_primary_medium {
                self.bundle_client
                    .set_node(&format!("{path}/@options/changelog_primary_medium"), m.clone())
                    .await?;
            }
            if let Some(m) = &b.snapshot_primary_medium {
                self.bundle_client
                    .set_node(&format!("{path}/@options/snapshot_primary_medium"), m.clone())
                    .await?;
            }
        }

        for bundle in [DEFAULT_BUNDLE, SYS_BUNDLE] {
            let tablet_cell_count =
                self.bootstrap.tablet_cell_bundles.get(bundle).and_then(|b| b.tablet_cell_count).unwrap_or(1);
            self.bundle_client.create_tablet_cells(bundle, tablet_cell_count).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<E: ServerEmbedding + 'static, C: BundleClient + 'static> Component for TabletNode<E, C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on_names(&self) -> Vec<String> {
        self.depends_on.iter().map(|c| c.name().to_string()).collect()
    }

    async fn fetch(&self) -> Result<()> {
        *self.observed.write() = self.embedding.fetch().await?;
        Ok(())
    }

    fn status(&self) -> ComponentStatus {
        if !self.dependencies_ready() {
            return ComponentStatus::new(SyncStatus::Blocked, "waiting on a dependency");
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

    async fn sync(&self, conds: &dyn ConditionStore) -> Result<()> {
        if !self.dependencies_ready() {
            return Ok(());
        }
        let observed = self.observed.read().clone();
        if !observed.workload_exists || !observed.all_pods_ready(self.desired_replicas) {
            self.embedding.apply(self.desired_replicas, &self.config_hash).await?;
            return Ok(());
        }
        if !self.do_initialization {
            return Ok(());
        }
        let init_cond = self.init_bundles_condition();
        if conds.is_satisfied(&init_cond) {
            return Ok(());
        }
        self.initialize_bundles().await?;
        conds.set_cond(Condition::new(init_cond, true, "InitBundlesCompleted", "init bundles successfully completed"));
        Ok(())
    }
}
