//! The live-cluster admin client: out of scope per the purpose
//! statement, specified only at its interface. Narrow capability traits
//! (e.g. `TabletCellClient`) let a component depend on exactly the RPCs
//! it needs instead of the full client, per the "no cyclic references"
//! design note.

use async_trait::async_trait;

use crate::error::Result;

/// Bundle-level operations used by tablet-node bundle bootstrap.
#[async_trait]
pub trait BundleClient: Send + Sync {
    async fn node_exists(&self, path: &str) -> Result<bool>;
    async fn create_tablet_cell_bundle(&self, name: &str, options: Vec<(String, String)>) -> Result<()>;
    async fn set_node(&self, path: &str, value: String) -> Result<()>;
    async fn create_tablet_cells(&self, bundle: &str, count: u32) -> Result<()>;
}

/// Tablet-cell save/remove/recover, used by the full-update sequence.
#[async_trait]
pub trait TabletCellClient: Send + Sync {
    async fn save_tablet_cells(&self) -> Result<()>;
    async fn remove_tablet_cells(&self) -> Result<()>;
    async fn are_tablet_cells_removed(&self) -> Result<bool>;
    async fn recover_tablet_cells(&self) -> Result<()>;
}

/// Master snapshot lifecycle, used by the full-update sequence.
#[async_trait]
pub trait SnapshotClient: Send + Sync {
    async fn save_master_monitoring_paths(&self) -> Result<()>;
    async fn start_building_master_snapshots(&self) -> Result<()>;
    async fn are_master_snapshots_built(&self) -> Result<bool>;
}

/// Safe-mode toggling and the pre-flight possibility check.
#[async_trait]
pub trait SafeModeClient: Send + Sync {
    async fn handle_possibility_check(&self) -> Result<(bool, String)>;
    async fn enable_safe_mode(&self) -> Result<()>;
    async fn disable_safe_mode(&self) -> Result<()>;
}

/// The full live-cluster admin client, composed of the narrower
/// capability traits above plus master exit-read-only, which only the
/// master component itself invokes.
#[async_trait]
pub trait LiveClusterClient: BundleClient + TabletCellClient + SnapshotClient + SafeModeClient {
    async fn is_exit_read_only_done(&self) -> Result<bool>;
    async fn do_exit_read_only(&self) -> Result<()>;
}

pub mod mock {
    use std::collections::HashSet;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// Deterministic in-memory client: every RPC succeeds immediately
    /// unless a test arranges otherwise via the `fail_next_*` knobs, and
    /// polling predicates (`are_tablet_cells_removed`, etc.) become true
    /// as soon as the corresponding action has been invoked at least
    /// once, simulating an eventually-consistent external system.
    #[derive(Default)]
    struct State {
        safe_mode: bool,
        tablet_cells_saved: bool,
        tablet_cells_removed: bool,
        tablet_cells_recovered: bool,
        monitoring_paths_saved: bool,
        snapshots_building_started: bool,
        snapshots_built: bool,
        exit_read_only_requested: bool,
        exit_read_only_done: bool,
        bundles: HashSet<String>,
        bundle_options: Vec<(String, Vec<(String, String)>)>,
        nodes: std::collections::HashMap<String, String>,
        possible: bool,
        impossibility_reason: String,
        fail_remove_tablet_cells_once: bool,
    }

    #[derive(Default)]
    pub struct MockLiveClusterClient {
        state: Mutex<State>,
    }

    impl MockLiveClusterClient {
        pub fn new() -> Arc<Self> {
            let client = Self::default();
            client.state.lock().possible = true;
            Arc::new(client)
        }

        pub fn set_possibility(&self, possible: bool, reason: impl Into<String>) {
            let mut s = self.state.lock();
            s.possible = possible;
            s.impossibility_reason = reason.into();
        }

        pub fn fail_remove_tablet_cells_once(&self) {
            self.state.lock().fail_remove_tablet_cells_once = true;
        }

        pub fn is_safe_mode_enabled(&self) -> bool {
            self.state.lock().safe_mode
        }
    }

    #[async_trait]
    impl BundleClient for MockLiveClusterClient {
        async fn node_exists(&self, path: &str) -> Result<bool> {
            let s = self.state.lock();
            Ok(s.bundles.iter().any(|b| path.contains(b.as_str())) || s.nodes.contains_key(path))
        }

        async fn create_tablet_cell_bundle(&self, name: &str, options: Vec<(String, String)>) -> Result<()> {
            let mut s = self.state.lock();
            s.bundles.insert(name.to_string());
            s.bundle_options.push((name.to_string(), options));
            Ok(())
        }

        async fn set_node(&self, path: &str, value: String) -> Result<()> {
            self.state.lock().nodes.insert(path.to_string(), value);
            Ok(())
        }

        async fn create_tablet_cells(&self, _bundle: &str, _count: u32) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl TabletCellClient for MockLiveClusterClient {
        async fn save_tablet_cells(&self) -> Result<()> {
            self.state.lock().tablet_cells_saved = true;
            Ok(())
        }

        async fn remove_tablet_cells(&self) -> Result<()> {
            let mut s = self.state.lock();
            if s.fail_remove_tablet_cells_once {
                s.fail_remove_tablet_cells_once = false;
                return Err(crate::error::ReconcileError::Transient(
                    "remove tablet cells: transient RPC failure".into(),
                ));
            }
            s.tablet_cells_removed = true;
            Ok(())
        }

        async fn are_tablet_cells_removed(&self) -> Result<bool> {
            Ok(self.state.lock().tablet_cells_removed)
        }

        async fn recover_tablet_cells(&self) -> Result<()> {
            self.state.lock().tablet_cells_recovered = true;
            Ok(())
        }
    }

    #[async_trait]
    impl SnapshotClient for MockLiveClusterClient {
        async fn save_master_monitoring_paths(&self) -> Result<()> {
            self.state.lock().monitoring_paths_saved = true;
            Ok(())
        }

        async fn start_building_master_snapshots(&self) -> Result<()> {
            self.state.lock().snapshots_building_started = true;
            Ok(())
        }

        async fn are_master_snapshots_built(&self) -> Result<bool> {
            let mut s = self.state.lock();
            if s.snapshots_building_started {
                s.snapshots_built = true;
            }
            Ok(s.snapshots_built)
        }
    }

    #[async_trait]
    impl SafeModeClient for MockLiveClusterClient {
        async fn handle_possibility_check(&self) -> Result<(bool, String)> {
            let s = self.state.lock();
            Ok((s.possible, s.impossibility_reason.clone()))
        }

        async fn enable_safe_mode(&self) -> Result<()> {
            self.state.lock().safe_mode = true;
            Ok(())
        }

        async fn disable_safe_mode(&self) -> Result<()> {
            self.state.lock().safe_mode = false;
            Ok(())
        }
    }

    #[async_trait]
    impl LiveClusterClient for MockLiveClusterClient {
        async fn is_exit_read_only_done(&self) -> Result<bool> {
            let mut s = self.state.lock();
            if s.exit_read_only_requested {
                s.exit_read_only_done = true;
            }
            Ok(s.exit_read_only_done)
        }

        async fn do_exit_read_only(&self) -> Result<()> {
            self.state.lock().exit_read_only_requested = true;
            Ok(())
        }
    }
}
