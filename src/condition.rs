//! Condition store: persisted boolean facts keyed by name, attached to the
//! desired-state object. This is the only cross-step, cross-tick
//! communication channel in the engine (see orchestration design notes).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Reserved condition names for the cluster-wide full-update sequence.
pub mod names {
    pub const SAFE_MODE_ENABLED: &str = "SafeModeEnabled";
    pub const TABLET_CELLS_SAVED: &str = "TabletCellsSaved";
    pub const TABLET_CELLS_REMOVED: &str = "TabletCellsRemoved";
    pub const SNAPSHOTS_MONITORING_INFO_SAVED: &str = "SnapshotsMonitoringInfoSaved";
    pub const SNAPSHOTS_BUILDING_STARTED: &str = "SnapshotsBuildingStarted";
    pub const MASTER_SNAPSHOTS_BUILT: &str = "MasterSnapshotsBuilt";
    pub const MASTER_EXITED_READ_ONLY: &str = "MasterExitedReadOnly";
    pub const TABLET_CELLS_RECOVERED: &str = "TabletCellsRecovered";
    pub const SAFE_MODE_DISABLED: &str = "SafeModeDisabled";

    /// Marks that the exit-read-only RPC has been issued, separate from
    /// [`MASTER_EXITED_READ_ONLY`] (which tracks completion) so the
    /// request step can settle without waiting on the poll step.
    pub const MASTER_EXIT_READ_ONLY_REQUESTED: &str = "MasterExitReadOnlyRequested";

    /// Set (and re-evaluated every tick) while a full update is in
    /// progress: true once `handle_possibility_check` reports the
    /// cluster can no longer complete the sequence, parking every
    /// gated step at `Blocked` until it clears.
    pub const FULL_UPDATE_IMPOSSIBLE: &str = "FullUpdateImpossible";

    /// `<name>PodsRemoved` for the component named `name`.
    pub fn pods_removed(component: &str) -> String {
        format!("{component}PodsRemoved")
    }

    /// `<name>InitCompleted` for the component named `name`.
    pub fn init_completed(component: &str) -> String {
        format!("{component}InitCompleted")
    }

    /// `<name>Ready`, the user-facing per-component condition.
    pub fn ready(component: &str) -> String {
        format!("{component}Ready")
    }

    /// Fixed order in which the full-update conditions must become
    /// satisfied; the engine must never set a later one while an earlier
    /// one is unset.
    pub const FULL_UPDATE_ORDER: &[&str] = &[
        SAFE_MODE_ENABLED,
        TABLET_CELLS_SAVED,
        TABLET_CELLS_REMOVED,
        SNAPSHOTS_MONITORING_INFO_SAVED,
        SNAPSHOTS_BUILDING_STARTED,
        MASTER_SNAPSHOTS_BUILT,
        MASTER_EXITED_READ_ONLY,
        TABLET_CELLS_RECOVERED,
        SAFE_MODE_DISABLED,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub status: bool,
    pub reason: String,
    pub message: String,
    pub last_transition: DateTime<Utc>,
}

impl Condition {
    pub fn new(name: impl Into<String>, status: bool, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition: Utc::now(),
        }
    }
}

/// A gate on a named condition, used by `StepMeta::run_if_condition`.
/// `negate = false` models a plain "requires this condition" gate;
/// `negate = true` models the "¬condition" gates used by the standard
/// per-component flow (e.g. `StartBuild` runs only while `Built` hasn't
/// been set yet).
#[derive(Debug, Clone)]
pub struct ConditionGate {
    pub name: String,
    pub negate: bool,
}

impl ConditionGate {
    pub fn requires(name: impl Into<String>) -> Self {
        Self { name: name.into(), negate: false }
    }

    pub fn requires_absent(name: impl Into<String>) -> Self {
        Self { name: name.into(), negate: true }
    }
}

/// Read/write interface used by every other layer. `IsSatisfied` and
/// `IsNotSatisfied` are deliberately not complements of each other: a
/// condition that was never set answers `false` to both, so gates default
/// to "not yet blocked" rather than "blocked" when nothing has run yet.
pub trait ConditionStore: Send + Sync {
    fn is_satisfied(&self, name: &str) -> bool;
    fn is_not_satisfied(&self, name: &str) -> bool;
    fn get(&self, name: &str) -> Option<Condition>;
    fn set_cond(&self, cond: Condition);
    /// Removes all update-related conditions (the nine in
    /// `names::FULL_UPDATE_ORDER`) and any per-component `PodsRemoved`
    /// conditions, returning the cluster to `UpdateFlow::None`.
    fn clear_update_status(&self);
    /// Flushes buffered writes into the committed set, returning
    /// everything that changed this tick. Readers within a tick already
    /// see their own writes; `flush` is only about the atomic persistence
    /// boundary described in the concurrency model.
    fn flush(&self) -> Vec<Condition>;
    /// All currently-committed-or-pending conditions, for status
    /// reporting.
    fn snapshot(&self) -> Vec<Condition>;

    fn is_gate_blocked(&self, gate: &ConditionGate) -> bool {
        if gate.negate {
            self.is_satisfied(&gate.name)
        } else {
            self.is_not_satisfied(&gate.name)
        }
    }
}

/// In-memory condition store. Writes within a tick land in `pending` and
/// are visible immediately to `is_satisfied`/`is_not_satisfied`; `flush`
/// merges `pending` into `committed` in one step, modeling the single
/// atomic status write per spec's ordering guarantees.
#[derive(Default)]
pub struct InMemoryConditionStore {
    committed: RwLock<HashMap<String, Condition>>,
    pending: RwLock<HashMap<String, Condition>>,
}

impl InMemoryConditionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, name: &str) -> Option<Condition> {
        if let Some(c) = self.pending.read().get(name) {
            return Some(c.clone());
        }
        self.committed.read().get(name).cloned()
    }
}

impl ConditionStore for InMemoryConditionStore {
    fn is_satisfied(&self, name: &str) -> bool {
        self.lookup(name).map(|c| c.status).unwrap_or(false)
    }

    fn is_not_satisfied(&self, name: &str) -> bool {
        self.lookup(name).map(|c| !c.status).unwrap_or(false)
    }

    fn get(&self, name: &str) -> Option<Condition> {
        self.lookup(name)
    }

    fn set_cond(&self, cond: Condition) {
        // Idempotent: skip the write if nothing would change apart from
        // the timestamp, so repeated ticks don't thrash last_transition.
        if let Some(existing) = self.lookup(&cond.name) {
            if existing.status == cond.status
                && existing.reason == cond.reason
                && existing.message == cond.message
            {
                return;
            }
        }
        self.pending.write().insert(cond.name.clone(), cond);
    }

    fn clear_update_status(&self) {
        let mut names_to_clear: Vec<String> = names::FULL_UPDATE_ORDER.iter().map(|s| s.to_string()).collect();
        names_to_clear.push(names::FULL_UPDATE_IMPOSSIBLE.to_string());
        names_to_clear.push(names::MASTER_EXIT_READ_ONLY_REQUESTED.to_string());
        // Per-component rebuild-cycle bookkeeping (`StandardComponent`'s
        // `UpdateBlock`) is reset too: a full update subsumes any local
        // rolling restart in flight, and leaving one of these set would
        // make that component's next `UpdateBlock` see a stale cycle as
        // already done.
        let cycle_suffixes = ["PodsRemoved", "PodsGone", "PodsCreated", "Rebuilt"];
        for store in [&self.committed, &self.pending] {
            let keys: Vec<String> = store
                .read()
                .keys()
                .filter(|k| cycle_suffixes.iter().any(|suffix| k.ends_with(suffix)))
                .cloned()
                .collect();
            names_to_clear.extend(keys);
        }
        let mut pending = self.pending.write();
        let mut committed = self.committed.write();
        for name in names_to_clear {
            pending.remove(&name);
            committed.remove(&name);
        }
    }

    fn flush(&self) -> Vec<Condition> {
        let mut pending = self.pending.write();
        if pending.is_empty() {
            return Vec::new();
        }
        let mut committed = self.committed.write();
        let changed: Vec<Condition> = pending.values().cloned().collect();
        for (k, v) in pending.drain() {
            committed.insert(k, v);
        }
        changed
    }

    fn snapshot(&self) -> Vec<Condition> {
        let mut all: HashMap<String, Condition> = self.committed.read().clone();
        for (k, v) in self.pending.read().iter() {
            all.insert(k.clone(), v.clone());
        }
        all.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_condition_is_neither_satisfied_nor_unsatisfied() {
        let store = InMemoryConditionStore::new();
        assert!(!store.is_satisfied("Foo"));
        assert!(!store.is_not_satisfied("Foo"));
    }

    #[test]
    fn pending_writes_are_visible_to_readers_in_the_same_tick() {
        let store = InMemoryConditionStore::new();
        store.set_cond(Condition::new(names::SAFE_MODE_ENABLED, true, "Enabled", ""));
        assert!(store.is_satisfied(names::SAFE_MODE_ENABLED));
        let flushed = store.flush();
        assert_eq!(flushed.len(), 1);
        assert!(store.is_satisfied(names::SAFE_MODE_ENABLED));
    }

    #[test]
    fn negated_gate_blocks_once_condition_is_set() {
        let store = InMemoryConditionStore::new();
        let gate = ConditionGate::requires_absent("Built");
        assert!(!store.is_gate_blocked(&gate));
        store.set_cond(Condition::new("Built", true, "Built", ""));
        assert!(store.is_gate_blocked(&gate));
    }

    #[test]
    fn clear_update_status_removes_full_update_and_pods_removed_conditions() {
        let store = InMemoryConditionStore::new();
        for name in names::FULL_UPDATE_ORDER {
            store.set_cond(Condition::new(*name, true, "x", ""));
        }
        store.set_cond(Condition::new(names::pods_removed("Master"), true, "x", ""));
        store.flush();
        store.clear_update_status();
        for name in names::FULL_UPDATE_ORDER {
            assert!(!store.is_satisfied(name));
        }
        assert!(!store.is_satisfied(&names::pods_removed("Master")));
    }
}
