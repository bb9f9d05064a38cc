//! The reconcile loop proper: fetch every component's observed state,
//! aggregate it into a cluster-wide view, decide what (if anything)
//! needs to run this tick, run it, then persist conditions and status.
//! Exclusive `&mut self` access to [`Orchestrator::reconcile`] is what
//! enforces "at most one tick runs at a time" — there is no internal
//! locking because the caller (a single-threaded or externally
//! serialized reconcile queue) already guarantees it.

mod full_update;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::component::Component;
use crate::condition::{names, Condition, ConditionStore, InMemoryConditionStore};
use crate::config::OrchestratorConfig;
use crate::dependency_graph::DependencyGraph;
use crate::error::Result;
use crate::live_client::LiveClusterClient;
use crate::platform::RequeueHint;
use crate::state::{ClusterState, ClusterSyncStatus, SyncStatus, UpdateFlow, UpdateStatus};
use crate::step::Step;

/// Everything the orchestrator needs at construction time: the
/// already-wired component graph (narrow capability handles baked in at
/// construction, per the no-dynamic-lookup design) plus the two
/// external collaborators it drives directly. `cluster_state` is shared
/// with the master component, which needs to read it to tell "config
/// changed, need a full update" apart from "config changed, a full
/// update is already running".
pub struct Orchestrator {
    components: Vec<Arc<dyn Component>>,
    ytsaurus_client: Arc<dyn Component>,
    master: Arc<dyn Component>,
    live_client: Arc<dyn LiveClusterClient>,
    conds: Arc<InMemoryConditionStore>,
    cluster_state: Arc<RwLock<ClusterState>>,
    flow: UpdateFlow,
    blocked_message: String,
    last_aggregate: ClusterSyncStatus,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Validates the component dependency graph (constructed elsewhere,
    /// via concrete handles) is acyclic before accepting it, then builds
    /// an orchestrator ready to reconcile.
    pub fn new(
        components: Vec<Arc<dyn Component>>,
        ytsaurus_client: Arc<dyn Component>,
        master: Arc<dyn Component>,
        live_client: Arc<dyn LiveClusterClient>,
        cluster_state: Arc<RwLock<ClusterState>>,
    ) -> Result<Self> {
        let mut graph = DependencyGraph::new();
        for c in &components {
            graph.add_component(c.name());
            for dep in c.depends_on_names() {
                graph.add_dependency(c.name(), dep);
            }
        }
        graph.validate()?;

        Ok(Self {
            components,
            ytsaurus_client,
            master,
            live_client,
            conds: Arc::new(InMemoryConditionStore::new()),
            cluster_state,
            flow: UpdateFlow::None,
            blocked_message: String::new(),
            last_aggregate: ClusterSyncStatus::default(),
            config: OrchestratorConfig::default(),
        })
    }

    /// Overrides the default requeue intervals and condition history cap.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn status(&self) -> UpdateStatus {
        UpdateStatus {
            state: *self.cluster_state.read(),
            flow: self.flow,
            blocked_message: self.blocked_message.clone(),
            conditions: self.conds.snapshot(),
        }
    }

    pub fn conditions(&self) -> Vec<Condition> {
        self.conds.snapshot()
    }

    /// The per-component breakdown computed by the last `reconcile`
    /// call's aggregate phase, for status reporting.
    pub fn last_aggregate(&self) -> &ClusterSyncStatus {
        &self.last_aggregate
    }

    /// Read-only fetch phase: calls `fetch` on every component. Never
    /// mutates the platform, so it is always safe to retry.
    async fn fetch_all(&self) -> Result<()> {
        for c in &self.components {
            c.fetch().await?;
        }
        Ok(())
    }

    /// Folds each component's status into one cluster-wide view,
    /// mirroring `ComponentManager.FetchAll`'s bookkeeping loop.
    fn aggregate(&self) -> ClusterSyncStatus {
        let mut agg = ClusterSyncStatus { all_ready_or_updating: true, ..ClusterSyncStatus::default() };
        for c in &self.components {
            let status = c.status();
            match status.sync_status {
                SyncStatus::NeedFullUpdate => agg.need_full_update = true,
                SyncStatus::NeedLocalUpdate => agg.need_local_update.push(c.name().to_string()),
                _ => {}
            }
            if !status.sync_status.is_running() {
                agg.need_init = true;
            }
            if !status.sync_status.is_ready_or_updating() {
                agg.all_ready_or_updating = false;
            }
            if status.sync_status == SyncStatus::Ready {
                agg.ready_components.push(c.name().to_string());
            } else {
                agg.not_ready_components.push(c.name().to_string());
                agg.need_sync = true;
            }
        }
        agg
    }

    /// One reconcile tick. Returns a requeue hint the caller should
    /// honor (immediate retry, retry after a delay, or none while
    /// steady).
    pub async fn reconcile(&mut self) -> Result<RequeueHint> {
        self.fetch_all().await?;
        let agg = self.aggregate();
        for c in &self.components {
            c.set_ready_condition(self.conds.as_ref());
        }

        info!(
            ready = agg.ready_components.len(),
            not_ready = agg.not_ready_components.len(),
            need_full_update = agg.need_full_update,
            "aggregated cluster sync status"
        );

        let current_state = *self.cluster_state.read();
        let hint = match current_state {
            ClusterState::Updating if self.flow == UpdateFlow::Full => self.drive_full_update().await?,
            _ if agg.need_full_update => self.start_full_update().await?,
            _ if agg.need_sync => {
                self.sync_not_ready(&agg).await?;
                RequeueHint::after(self.config.sync_requeue_interval)
            }
            _ => {
                *self.cluster_state.write() = ClusterState::Running;
                RequeueHint::after(self.config.steady_requeue_interval)
            }
        };

        self.last_aggregate = agg;

        let changed = self.conds.flush();
        if !changed.is_empty() {
            info!(changed = changed.len(), "flushed condition updates");
        }
        Ok(hint)
    }

    async fn sync_not_ready(&self, agg: &ClusterSyncStatus) -> Result<()> {
        for c in &self.components {
            if agg.not_ready_components.iter().any(|n| n == c.name()) {
                c.sync(self.conds.as_ref()).await?;
                c.set_ready_condition(self.conds.as_ref());
            }
        }
        Ok(())
    }

    async fn start_full_update(&mut self) -> Result<RequeueHint> {
        let (possible, reason) = self.live_client.handle_possibility_check().await?;
        if !possible {
            warn!(reason = %reason, "full update requested but not currently possible");
            *self.cluster_state.write() = ClusterState::ReconfigurationRequired;
            self.blocked_message = reason;
            return Ok(RequeueHint::after(self.config.blocked_requeue_interval));
        }
        *self.cluster_state.write() = ClusterState::Updating;
        self.flow = UpdateFlow::Full;
        self.blocked_message.clear();
        self.drive_full_update().await
    }

    async fn drive_full_update(&mut self) -> Result<RequeueHint> {
        // Re-checked every tick, not just before entering `Updating`: a
        // cluster that was possible to update can become impossible
        // mid-sequence (e.g. a quorum member dying between steps), and
        // every gated step downstream shares this one condition to park
        // at `Blocked` rather than keep issuing RPCs.
        let (possible, reason) = self.live_client.handle_possibility_check().await?;
        self.conds
            .set_cond(Condition::new(names::FULL_UPDATE_IMPOSSIBLE, !possible, "PossibilityCheck", reason.clone()));

        let others: Vec<Arc<dyn Component>> = self
            .components
            .iter()
            .filter(|c| c.name() != self.master.name() && c.name() != self.ytsaurus_client.name())
            .cloned()
            .collect();
        let sequence = full_update::build(
            self.live_client.clone(),
            self.ytsaurus_client.clone(),
            self.master.clone(),
            others,
        );

        let (st, msg) = sequence.status(self.conds.as_ref()).await?;
        if st.is_settled() {
            info!("full update sequence complete");
            *self.cluster_state.write() = ClusterState::Running;
            self.flow = UpdateFlow::None;
            return Ok(RequeueHint::after(self.config.steady_requeue_interval));
        }
        if st == crate::state::StepSyncStatus::Blocked {
            // A settled earlier step can also report `Blocked` while
            // `FULL_UPDATE_IMPOSSIBLE` is set (its `blocked_while` gate is
            // checked unconditionally), so the possibility-check reason is
            // the trustworthy source here, not whichever step's generic
            // gate message happened to surface first.
            self.blocked_message = if possible { msg } else { reason };
            warn!(reason = %self.blocked_message, "full update sequence blocked mid-sequence");
            return Ok(RequeueHint::after(self.config.blocked_requeue_interval));
        }
        info!(step_status = ?st, msg = %msg, "advancing full update sequence");
        if sequence.run(self.conds.as_ref()).await? {
            sequence.post_run(self.conds.as_ref()).await?;
        }
        Ok(RequeueHint::immediate())
    }
}
