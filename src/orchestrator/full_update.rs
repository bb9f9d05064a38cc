//! The cluster-wide full-update sequence: a fixed, ordered
//! [`CompositeStep`] run once the master flags `NeedFullUpdate` and the
//! possibility check has passed. One child advances per reconcile tick,
//! so the sequence survives across ticks (and process restarts, since
//! progress lives entirely in the condition store) without needing a
//! long-lived in-memory cursor.

use std::sync::Arc;

use async_trait::async_trait;

use crate::component::Component;
use crate::condition::{names, ConditionGate, ConditionStore};
use crate::error::Result;
use crate::live_client::LiveClusterClient;
use crate::state::StepSyncStatus;
use crate::step::{ActionStep, CheckStep, CompositeStep, Step, StepMeta};

/// Wraps a component's own `sync` as a step, so the full-update sequence
/// can interleave "let this component roll itself" with the
/// cluster-wide admin RPCs without the orchestrator special-casing it.
struct ComponentSyncStep {
    component: Arc<dyn Component>,
}

#[async_trait]
impl Step for ComponentSyncStep {
    fn name(&self) -> &str {
        self.component.name()
    }

    async fn status(&self, _conds: &dyn ConditionStore) -> Result<(StepSyncStatus, String)> {
        use crate::state::SyncStatus;
        let st = match self.component.status().sync_status {
            SyncStatus::Ready => StepSyncStatus::Done,
            SyncStatus::Blocked => StepSyncStatus::Blocked,
            _ => StepSyncStatus::NeedRun,
        };
        Ok((st, format!("{} is {:?}", self.component.name(), st)))
    }

    async fn run(&self, conds: &dyn ConditionStore) -> Result<bool> {
        self.component.sync(conds).await?;
        Ok(true)
    }
}

/// `DisableSafeMode` clears the whole update status on success instead
/// of setting its own condition and relying on a later cleanup pass —
/// there is nothing left to gate once safe mode comes back off.
struct DisableSafeMode {
    live_client: Arc<dyn LiveClusterClient>,
}

#[async_trait]
impl Step for DisableSafeMode {
    fn name(&self) -> &str {
        "DisableSafeMode"
    }

    async fn status(&self, conds: &dyn ConditionStore) -> Result<(StepSyncStatus, String)> {
        if conds.is_not_satisfied(names::TABLET_CELLS_RECOVERED) {
            return Ok((StepSyncStatus::Skip, "tablet cells not yet recovered".into()));
        }
        Ok((StepSyncStatus::NeedRun, "disabling safe mode".into()))
    }

    async fn run(&self, _conds: &dyn ConditionStore) -> Result<bool> {
        self.live_client.disable_safe_mode().await?;
        Ok(true)
    }

    async fn post_run(&self, conds: &dyn ConditionStore) -> Result<()> {
        conds.clear_update_status();
        Ok(())
    }
}

/// A placeholder for the two legacy post-recovery steps (operations
/// archive and query-tracker state updates) which this engine does not
/// implement; it always reports done so the sequence can still reach
/// `DisableSafeMode`.
struct UnimplementedSkip {
    name: &'static str,
}

#[async_trait]
impl Step for UnimplementedSkip {
    fn name(&self) -> &str {
        self.name
    }

    async fn status(&self, _conds: &dyn ConditionStore) -> Result<(StepSyncStatus, String)> {
        Ok((StepSyncStatus::Skip, format!("{} is not implemented", self.name)))
    }

    async fn run(&self, _conds: &dyn ConditionStore) -> Result<bool> {
        Ok(true)
    }
}

pub fn build(
    live_client: Arc<dyn LiveClusterClient>,
    ytsaurus_client: Arc<dyn Component>,
    master: Arc<dyn Component>,
    other_components: Vec<Arc<dyn Component>>,
) -> CompositeStep {
    // Each step below gates on the *absence* of its own success condition,
    // the same self-settling pattern `StandardComponent` uses for
    // `StartBuild`/`WaitBuild`: once `on_success_set` fires, `run_if`
    // reports `Skip` from then on, which is what lets
    // `CompositeStep::first_unsettled` move on to the next child. A gate
    // on the *predecessor's* condition would never let a step settle in
    // its own right; ordering between children is already enforced by
    // their position in the composite's child list.
    let lc = live_client.clone();
    let enable_safe_mode = ActionStep::new(
        StepMeta::new("EnableSafeMode")
            .run_if(ConditionGate::requires_absent(names::SAFE_MODE_ENABLED))
            .blocked_while(names::FULL_UPDATE_IMPOSSIBLE)
            .on_success_set(names::SAFE_MODE_ENABLED),
        {
            let lc = lc.clone();
            move || {
                let lc = lc.clone();
                async move { lc.enable_safe_mode().await }
            }
        },
    );

    let lc2 = live_client.clone();
    let save_tablet_cells = ActionStep::new(
        StepMeta::new("SaveTabletCells")
            .run_if(ConditionGate::requires_absent(names::TABLET_CELLS_SAVED))
            .blocked_while(names::FULL_UPDATE_IMPOSSIBLE)
            .on_success_set(names::TABLET_CELLS_SAVED),
        move || {
            let lc = lc2.clone();
            async move { lc.save_tablet_cells().await }
        },
    );

    let lc3 = live_client.clone();
    let remove_tablet_cells = ActionStep::new(
        StepMeta::new("RemoveTabletCells")
            .run_if(ConditionGate::requires_absent(names::TABLET_CELLS_REMOVED))
            .blocked_while(names::FULL_UPDATE_IMPOSSIBLE)
            .on_success_set(names::TABLET_CELLS_REMOVED),
        move || {
            let lc = lc3.clone();
            async move { lc.remove_tablet_cells().await }
        },
    );

    let lc4 = live_client.clone();
    let save_monitoring_paths = ActionStep::new(
        StepMeta::new("SaveMasterMonitoringPaths")
            .run_if(ConditionGate::requires_absent(names::SNAPSHOTS_MONITORING_INFO_SAVED))
            .blocked_while(names::FULL_UPDATE_IMPOSSIBLE)
            .on_success_set(names::SNAPSHOTS_MONITORING_INFO_SAVED),
        move || {
            let lc = lc4.clone();
            async move { lc.save_master_monitoring_paths().await }
        },
    );

    let lc5 = live_client.clone();
    let start_building_snapshots = ActionStep::new(
        StepMeta::new("StartBuildingMasterSnapshots")
            .run_if(ConditionGate::requires_absent(names::SNAPSHOTS_BUILDING_STARTED))
            .blocked_while(names::FULL_UPDATE_IMPOSSIBLE)
            .on_success_set(names::SNAPSHOTS_BUILDING_STARTED),
        move || {
            let lc = lc5.clone();
            async move { lc.start_building_master_snapshots().await }
        },
    );

    let lc6 = live_client.clone();
    let finish_building_snapshots = CheckStep::new(
        StepMeta::new("FinishBuildingMasterSnapshots")
            .run_if(ConditionGate::requires_absent(names::MASTER_SNAPSHOTS_BUILT))
            .blocked_while(names::FULL_UPDATE_IMPOSSIBLE)
            .on_success_set(names::MASTER_SNAPSHOTS_BUILT),
        move || {
            let lc = lc6.clone();
            async move { lc.are_master_snapshots_built().await }
        },
    );

    let mut component_steps: Vec<Box<dyn Step>> = vec![Box::new(ComponentSyncStep { component: master.clone() })];
    for c in other_components {
        component_steps.push(Box::new(ComponentSyncStep { component: c }));
    }
    let resync_components = CompositeStep::new(
        StepMeta::new("ResyncComponents").run_if(ConditionGate::requires(names::MASTER_SNAPSHOTS_BUILT)),
        component_steps,
    );

    let lc7 = live_client.clone();
    let do_exit_read_only = ActionStep::new(
        StepMeta::new("DoMasterExitReadOnly")
            .run_if(ConditionGate::requires_absent(names::MASTER_EXIT_READ_ONLY_REQUESTED))
            .on_success_set(names::MASTER_EXIT_READ_ONLY_REQUESTED),
        move || {
            let lc = lc7.clone();
            async move { lc.do_exit_read_only().await }
        },
    );
    let lc8 = live_client.clone();
    let wait_exit_read_only = CheckStep::new(
        StepMeta::new("WaitMasterExitReadOnly")
            .run_if(ConditionGate::requires_absent(names::MASTER_EXITED_READ_ONLY))
            .on_success_set(names::MASTER_EXITED_READ_ONLY),
        move || {
            let lc = lc8.clone();
            async move { lc.is_exit_read_only_done().await }
        },
    );
    let master_exit_read_only = CompositeStep::new(
        StepMeta::new("MasterExitReadOnly"),
        vec![Box::new(do_exit_read_only), Box::new(wait_exit_read_only)],
    );

    let lc9 = live_client.clone();
    let recover_tablet_cells = ActionStep::new(
        StepMeta::new("RecoverTabletCells")
            .run_if(ConditionGate::requires_absent(names::TABLET_CELLS_RECOVERED))
            .on_success_set(names::TABLET_CELLS_RECOVERED),
        move || {
            let lc = lc9.clone();
            async move { lc.recover_tablet_cells().await }
        },
    );

    let reserved_op_archive = UnimplementedSkip { name: "UpdateOpArchive" };
    let reserved_qt_state = UnimplementedSkip { name: "UpdateQTState" };

    let disable_safe_mode = DisableSafeMode { live_client: live_client.clone() };

    CompositeStep::new(
        StepMeta::new("FullUpdate"),
        vec![
            Box::new(ComponentSyncStep { component: ytsaurus_client }),
            Box::new(enable_safe_mode),
            Box::new(save_tablet_cells),
            Box::new(remove_tablet_cells),
            Box::new(save_monitoring_paths),
            Box::new(start_building_snapshots),
            Box::new(finish_building_snapshots),
            Box::new(resync_components),
            Box::new(master_exit_read_only),
            Box::new(recover_tablet_cells),
            Box::new(reserved_op_archive),
            Box::new(reserved_qt_state),
            Box::new(disable_safe_mode),
        ],
    )
}
