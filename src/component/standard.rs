use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::condition::{names, Condition, ConditionGate, ConditionStore};
use crate::error::Result;
use crate::observed::ObservedState;
use crate::platform::ServerEmbedding;
use crate::state::{ComponentStatus, SyncStatus};
use crate::step::{ActionStep, CheckStep, CompositeStep, Step, StepMeta};

use super::Component;

/// Generic implementation of the role shared by discovery, both proxy
/// kinds, data/exec nodes, the controller agent, the YQL agent, the UI
/// and the master cache: build once, then roll on config change. Roles
/// with extra lifecycle (master, tablet nodes, the admin client, ...)
/// get their own type instead of parameterizing this one further.
pub struct StandardComponent<E: ServerEmbedding> {
    name: String,
    embedding: Arc<E>,
    desired_replicas: u32,
    config_hash: String,
    depends_on: Vec<Arc<dyn Component>>,
    observed: RwLock<ObservedState>,
    needs_update: RwLock<bool>,
}

impl<E: ServerEmbedding + 'static> StandardComponent<E> {
    pub fn new(
        name: impl Into<String>,
        embedding: Arc<E>,
        desired_replicas: u32,
        config_hash: impl Into<String>,
        depends_on: Vec<Arc<dyn Component>>,
    ) -> Self {
        Self {
            name: name.into(),
            embedding,
            desired_replicas,
            config_hash: config_hash.into(),
            depends_on,
            observed: RwLock::new(ObservedState::default()),
            needs_update: RwLock::new(false),
        }
    }

    fn built_condition(&self) -> String {
        format!("{}Built", self.name)
    }

    fn pods_removed_condition(&self) -> String {
        names::pods_removed(&self.name)
    }

    fn pods_gone_condition(&self) -> String {
        format!("{}PodsGone", self.name)
    }

    fn pods_created_condition(&self) -> String {
        format!("{}PodsCreated", self.name)
    }

    fn rebuilt_condition(&self) -> String {
        format!("{}Rebuilt", self.name)
    }

    fn dependencies_ready(&self) -> bool {
        self.depends_on.iter().all(|c| c.status().sync_status == SyncStatus::Ready)
    }

    /// Start-build, wait-for-rollout, then (only while `needs_update` is
    /// set) a rebuild block that deletes pods before recreating them —
    /// the one blocking-on-removal step a rolling, in-place update can't
    /// skip.
    fn flow(&self) -> CompositeStep {
        let embedding = self.embedding.clone();
        let replicas = self.desired_replicas;
        let hash = self.config_hash.clone();
        let built_cond = self.built_condition();

        let start_build = ActionStep::new(
            StepMeta::new("StartBuild")
                .run_if(ConditionGate::requires_absent(built_cond.clone()))
                .on_success_set(built_cond.clone()),
            {
                let embedding = embedding.clone();
                let hash = hash.clone();
                move || {
                    let embedding = embedding.clone();
                    let hash = hash.clone();
                    async move { embedding.apply(replicas, &hash).await }
                }
            },
        );

        let wait_build = CheckStep::new(
            StepMeta::new("WaitBuildFinished").run_if(ConditionGate::requires_absent(built_cond.clone())),
            {
                let embedding = embedding.clone();
                move || {
                    let embedding = embedding.clone();
                    async move { Ok(embedding.fetch().await?.all_pods_ready(replicas)) }
                }
            },
        );

        // Each child below self-settles on the absence of its own
        // completion condition, same as `start_build`/`wait_build` above —
        // without it `CompositeStep::first_unsettled` would never advance
        // past the first one. The three transient conditions are reset in
        // `sync` at the start of a later update cycle, once `rebuilt_cond`
        // shows a previous cycle already finished.
        let pods_removed_cond = self.pods_removed_condition();
        let start_rebuild = ActionStep::new(
            StepMeta::new("StartRebuild")
                .run_if(ConditionGate::requires_absent(pods_removed_cond.clone()))
                .on_success_set(pods_removed_cond.clone()),
            {
                let embedding = embedding.clone();
                move || {
                    let embedding = embedding.clone();
                    async move { embedding.delete_pods().await }
                }
            },
        );

        let pods_gone_cond = self.pods_gone_condition();
        let wait_pods_removed = CheckStep::new(
            StepMeta::new("WaitPodsRemoved")
                .run_if(ConditionGate::requires_absent(pods_gone_cond.clone()))
                .on_success_set(pods_gone_cond.clone()),
            {
                let embedding = embedding.clone();
                move || {
                    let embedding = embedding.clone();
                    async move { Ok(embedding.fetch().await?.no_pods()) }
                }
            },
        );

        let pods_created_cond = self.pods_created_condition();
        let pods_create = ActionStep::new(
            StepMeta::new("PodsCreate")
                .run_if(ConditionGate::requires_absent(pods_created_cond.clone()))
                .on_success_set(pods_created_cond.clone()),
            {
                let embedding = embedding.clone();
                let hash = hash.clone();
                move || {
                    let embedding = embedding.clone();
                    let hash = hash.clone();
                    async move { embedding.apply(replicas, &hash).await }
                }
            },
        );

        let rebuilt_cond = self.rebuilt_condition();
        let wait_rebuild = CheckStep::new(
            StepMeta::new("WaitRebuildFinished")
                .run_if(ConditionGate::requires_absent(rebuilt_cond.clone()))
                .on_success_set(rebuilt_cond),
            {
                let embedding = embedding.clone();
                move || {
                    let embedding = embedding.clone();
                    async move { Ok(embedding.fetch().await?.all_pods_ready(replicas)) }
                }
            },
        );

        let update_block = CompositeStep::new(
            StepMeta::new("UpdateBlock").run_if(ConditionGate::requires(format!("{}NeedsUpdate", self.name))),
            vec![
                Box::new(start_rebuild),
                Box::new(wait_pods_removed),
                Box::new(pods_create),
                Box::new(wait_rebuild),
            ],
        );

        CompositeStep::new(
            StepMeta::new(format!("{}Flow", self.name)),
            vec![Box::new(start_build), Box::new(wait_build), Box::new(update_block)],
        )
    }
}

#[async_trait]
impl<E: ServerEmbedding + 'static> Component for StandardComponent<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on_names(&self) -> Vec<String> {
        self.depends_on.iter().map(|c| c.name().to_string()).collect()
    }

    async fn fetch(&self) -> Result<()> {
        let observed = self.embedding.fetch().await?;
        let mismatched = observed.workload_exists
            && observed.applied_config_hash.as_deref() != Some(self.config_hash.as_str());
        *self.needs_update.write() = mismatched;
        *self.observed.write() = observed;
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
        if *self.needs_update.read() {
            return ComponentStatus::new(SyncStatus::NeedLocalUpdate, "config changed");
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
        let needs_update = *self.needs_update.read();
        let update_gate = format!("{}NeedsUpdate", self.name);

        // A second config change can arrive after a prior rebuild cycle
        // already finished; `UpdateBlock`'s four children self-settle on
        // their own completion conditions, so those need resetting here
        // or the new cycle would see every child as already done.
        if needs_update && conds.is_satisfied(&self.rebuilt_condition()) {
            conds.set_cond(Condition::new(self.rebuilt_condition(), false, "NewUpdateCycle", ""));
            conds.set_cond(Condition::new(self.pods_removed_condition(), false, "NewUpdateCycle", ""));
            conds.set_cond(Condition::new(self.pods_gone_condition(), false, "NewUpdateCycle", ""));
            conds.set_cond(Condition::new(self.pods_created_condition(), false, "NewUpdateCycle", ""));
        }

        conds.set_cond(Condition::new(update_gate, needs_update, "ConfigHashChanged", ""));

        let flow = self.flow();
        let (st, _) = flow.status(conds).await?;
        if st.is_settled() {
            return Ok(());
        }
        if flow.run(conds).await? {
            flow.post_run(conds).await?;
        }
        Ok(())
    }
}
