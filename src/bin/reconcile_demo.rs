//! Runs a handful of reconcile ticks against an in-memory platform and
//! live-cluster client, printing the cluster state after each one. Not a
//! test: a quick way to watch the engine work without a real cluster.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing_subscriber::EnvFilter;
use ytreconciler::build::build_components;
use ytreconciler::live_client::mock::MockLiveClusterClient;
use ytreconciler::orchestrator::Orchestrator;
use ytreconciler::platform::mock::MockPlatform;
use ytreconciler::spec::{InstanceSpec, NamedInstanceSpec, YtsaurusSpec};
use ytreconciler::state::ClusterState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let platform = MockPlatform::new();
    let live_client = MockLiveClusterClient::new();
    let cluster_state = Arc::new(RwLock::new(ClusterState::Created));

    let mut spec = YtsaurusSpec::minimal("ytsaurus/master:config-v1");
    spec.http_proxies.push(NamedInstanceSpec {
        name: None,
        instance_spec: InstanceSpec::new(2, "ytsaurus/http-proxy:config-v1"),
    });

    let built = build_components(&spec, |role| platform.embedding(role), live_client.clone(), cluster_state.clone())
        .expect("spec satisfies every component's dependency rules");
    let mut orchestrator = Orchestrator::new(
        built.components,
        built.ytsaurus_client,
        built.master,
        live_client,
        cluster_state.clone(),
    )
    .expect("acyclic component graph");

    for tick in 1..=8 {
        let hint = orchestrator.reconcile().await.expect("reconcile tick failed");
        tracing::info!(tick, state = ?orchestrator.status().state, ?hint, "tick complete");
        platform.mark_pods_ready("Master");
        platform.mark_pods_ready("YtsaurusClient");
        platform.mark_pods_ready("HttpProxy");
    }
}
