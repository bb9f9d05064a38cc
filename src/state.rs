//! Cluster- and component-level state enums, per the data model.

use serde::{Deserialize, Serialize};

use crate::condition::Condition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterState {
    Created,
    Initializing,
    Running,
    Updating,
    ReconfigurationRequired,
    CancelUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateFlow {
    None,
    Full,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatus {
    pub state: ClusterState,
    pub flow: UpdateFlow,
    pub blocked_message: String,
    pub conditions: Vec<Condition>,
}

impl Default for UpdateStatus {
    fn default() -> Self {
        Self {
            state: ClusterState::Created,
            flow: UpdateFlow::None,
            blocked_message: String::new(),
            conditions: Vec::new(),
        }
    }
}

/// Per-component sync status, per the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    Pending,
    Ready,
    Updating,
    NeedSync,
    NeedLocalUpdate,
    NeedFullUpdate,
    Blocked,
}

impl SyncStatus {
    /// A component counts as "running" for `needInit` purposes once it
    /// is no longer in its initial pending state, mirroring
    /// `components.IsRunningStatus` in the original controller.
    pub fn is_running(&self) -> bool {
        !matches!(self, SyncStatus::Pending)
    }

    pub fn is_ready_or_updating(&self) -> bool {
        matches!(self, SyncStatus::Ready | SyncStatus::Updating)
    }
}

/// Status of a single step in the step algebra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepSyncStatus {
    NeedRun,
    Updating,
    Done,
    Skip,
    Blocked,
}

impl StepSyncStatus {
    /// A composite step considers a child finished-for-now once it is
    /// `Done` or `Skip`; anything else makes it the next child to run.
    pub fn is_settled(&self) -> bool {
        matches!(self, StepSyncStatus::Done | StepSyncStatus::Skip)
    }
}

#[derive(Debug, Clone)]
pub struct ComponentStatus {
    pub sync_status: SyncStatus,
    pub message: String,
}

impl ComponentStatus {
    pub fn new(sync_status: SyncStatus, message: impl Into<String>) -> Self {
        Self { sync_status, message: message.into() }
    }

    pub fn ready() -> Self {
        Self::new(SyncStatus::Ready, "")
    }
}

/// Aggregate view across all components for a single reconcile tick,
/// computed by the orchestrator's `Aggregate` phase.
#[derive(Debug, Clone, Default)]
pub struct ClusterSyncStatus {
    pub need_sync: bool,
    pub need_init: bool,
    pub need_full_update: bool,
    pub need_local_update: Vec<String>,
    pub all_ready_or_updating: bool,
    pub ready_components: Vec<String>,
    pub not_ready_components: Vec<String>,
}
