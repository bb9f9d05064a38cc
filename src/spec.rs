//! Desired-state (input) types. This is the user-authored spec; the
//! engine never mutates it, only reads it to build components and
//! compares it against observed state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Per-instance replica/image/resource spec shared by every node-shaped
/// component (discovery, proxies, data/exec/tablet nodes, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub instance_count: u32,
    pub image: String,
    #[serde(default)]
    pub monitoring_port: Option<u16>,
}

impl InstanceSpec {
    pub fn new(instance_count: u32, image: impl Into<String>) -> Self {
        Self { instance_count, image: image.into(), monitoring_port: None }
    }

    /// Deterministic hash of the fields a rebuild must react to. Two
    /// specs that hash equal need no config roll; this stands in for
    /// the original controller's config-map-content hash.
    pub fn config_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.image.as_bytes());
        hasher.update(self.instance_count.to_le_bytes());
        if let Some(port) = self.monitoring_port {
            hasher.update(port.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedInstanceSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub instance_spec: InstanceSpec,
}

/// Tablet-cell-bundle bootstrap defaults, applied once during the
/// cluster's initial build.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TabletCellBundleSpec {
    #[serde(default)]
    pub tablet_cell_count: Option<u32>,
    #[serde(default)]
    pub changelog_primary_medium: Option<String>,
    #[serde(default)]
    pub snapshot_primary_medium: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BootstrapSpec {
    #[serde(default)]
    pub tablet_cell_bundles: HashMap<String, TabletCellBundleSpec>,
}

/// The desired-state spec for one cluster object. The master sub-spec is
/// mandatory; everything else is optional, matching the original
/// controller's conditional component construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtsaurusSpec {
    pub master: InstanceSpec,
    #[serde(default)]
    pub discovery: Option<InstanceSpec>,
    #[serde(default)]
    pub http_proxies: Vec<NamedInstanceSpec>,
    #[serde(default)]
    pub rpc_proxies: Vec<NamedInstanceSpec>,
    #[serde(default)]
    pub tcp_proxies: Vec<NamedInstanceSpec>,
    #[serde(default)]
    pub data_nodes: Vec<NamedInstanceSpec>,
    #[serde(default)]
    pub exec_nodes: Vec<NamedInstanceSpec>,
    #[serde(default)]
    pub tablet_nodes: Vec<NamedInstanceSpec>,
    #[serde(default)]
    pub schedulers: Option<InstanceSpec>,
    #[serde(default)]
    pub controller_agents: Option<InstanceSpec>,
    #[serde(default)]
    pub query_trackers: Option<InstanceSpec>,
    #[serde(default)]
    pub queue_agents: Option<InstanceSpec>,
    #[serde(default)]
    pub yql_agents: Option<InstanceSpec>,
    #[serde(default)]
    pub ui: Option<InstanceSpec>,
    #[serde(default)]
    pub strawberry_controller: Option<InstanceSpec>,
    #[serde(default)]
    pub master_caches: Option<InstanceSpec>,
    #[serde(default)]
    pub bootstrap: BootstrapSpec,
}

impl YtsaurusSpec {
    /// A minimal spec with just a master, for tests and the demo binary.
    pub fn minimal(master_image: impl Into<String>) -> Self {
        Self {
            master: InstanceSpec::new(1, master_image),
            discovery: None,
            http_proxies: Vec::new(),
            rpc_proxies: Vec::new(),
            tcp_proxies: Vec::new(),
            data_nodes: Vec::new(),
            exec_nodes: Vec::new(),
            tablet_nodes: Vec::new(),
            schedulers: None,
            controller_agents: None,
            query_trackers: None,
            queue_agents: None,
            yql_agents: None,
            ui: None,
            strawberry_controller: None,
            master_caches: None,
            bootstrap: BootstrapSpec::default(),
        }
    }
}
