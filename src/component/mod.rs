//! Components: one per cluster role (master, discovery, proxies, nodes,
//! schedulers, ...), each wrapping a [`crate::step::Step`] flow over its
//! own [`crate::platform::ServerEmbedding`]. Most roles share the
//! standard build/update flow via [`StandardComponent`]; a handful with
//! extra behavior get dedicated types in sibling modules.

mod master;
mod standard;
mod tablet_node;
mod ytsaurus_client;

pub use master::Master;
pub use standard::StandardComponent;
pub use tablet_node::TabletNode;
pub use ytsaurus_client::YtsaurusClient;

use async_trait::async_trait;

use crate::condition::{names, Condition, ConditionStore};
use crate::error::Result;
use crate::state::{ComponentStatus, SyncStatus};

/// A single cluster role. The orchestrator drives every component the
/// same way regardless of role: `fetch` then `status` then, if sync is
/// needed, `sync` — mirroring the fetch/status/sync split in the
/// original component manager, which keeps the read (`fetch`) and
/// write (`sync`) phases of a tick strictly separate.
#[async_trait]
pub trait Component: Send + Sync {
    fn name(&self) -> &str;

    /// Refreshes this component's cached view of observed state. Must not
    /// mutate the platform.
    async fn fetch(&self) -> Result<()>;

    /// Cheap, synchronous read of the status computed by the last
    /// `fetch`. Never touches the platform.
    fn status(&self) -> ComponentStatus;

    /// Advances this component's flow by at most one step, mutating the
    /// platform and/or condition store as needed.
    async fn sync(&self, conds: &dyn ConditionStore) -> Result<()>;

    /// Whether this role participates in rolling/full updates at all
    /// (the discovery service, for instance, never needs one).
    fn is_updatable(&self) -> bool {
        true
    }

    /// Names of the components this one was constructed with a handle
    /// to. Used only to validate the dependency graph is acyclic at
    /// startup — reconcile-time readiness checks go through the handles
    /// directly, never through this list.
    fn depends_on_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Publishes the user-facing `<Name>Ready` condition derived from
    /// this component's current `status`. Every role shares the same
    /// derivation, so this has one default implementation instead of
    /// needing to be written per role.
    fn set_ready_condition(&self, conds: &dyn ConditionStore) {
        let status = self.status();
        let is_ready = status.sync_status == SyncStatus::Ready;
        conds.set_cond(Condition::new(
            names::ready(self.name()),
            is_ready,
            format!("{:?}", status.sync_status),
            status.message,
        ));
    }
}

/// Whether `status` counts as "the component has started up at least
/// once", used by the orchestrator's `need_init` aggregate.
pub fn is_running_status(status: SyncStatus) -> bool {
    status.is_running()
}
