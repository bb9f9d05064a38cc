use std::sync::Arc;

use parking_lot::RwLock;

use ytreconciler::component::{Component, Master, StandardComponent, TabletNode, YtsaurusClient};
use ytreconciler::condition::{names, ConditionStore};
use ytreconciler::live_client::mock::MockLiveClusterClient;
use ytreconciler::live_client::BundleClient;
use ytreconciler::orchestrator::Orchestrator;
use ytreconciler::platform::mock::MockPlatform;
use ytreconciler::platform::ServerEmbedding;
use ytreconciler::spec::BootstrapSpec;
use ytreconciler::state::{ClusterState, SyncStatus};

fn make_cluster(
    platform: &Arc<MockPlatform>,
) -> (Arc<dyn Component>, Arc<dyn Component>, Arc<dyn Component>, Arc<RwLock<ClusterState>>) {
    let cluster_state = Arc::new(RwLock::new(ClusterState::Created));
    let master: Arc<dyn Component> =
        Arc::new(Master::new(Arc::new(platform.embedding("Master")), 1, "master-v1", cluster_state.clone()));
    let http_proxy: Arc<dyn Component> = Arc::new(StandardComponent::new(
        "HttpProxy",
        Arc::new(platform.embedding("HttpProxy")),
        2,
        "proxy-v1",
        vec![master.clone()],
    ));
    let ytsaurus_client: Arc<dyn Component> = Arc::new(YtsaurusClient::new(
        Arc::new(platform.embedding("YtsaurusClient")),
        1,
        "ytclient-v1",
        http_proxy.clone(),
    ));
    (master, ytsaurus_client, http_proxy, cluster_state)
}

#[tokio::test]
async fn cold_start_reaches_running() {
    let platform = MockPlatform::new();
    let live_client = MockLiveClusterClient::new();
    let (master, ytsaurus_client, http_proxy, cluster_state) = make_cluster(&platform);
    let components = vec![master.clone(), ytsaurus_client.clone(), http_proxy.clone()];
    let mut orchestrator =
        Orchestrator::new(components, ytsaurus_client, master, live_client, cluster_state).unwrap();

    for _ in 0..10 {
        orchestrator.reconcile().await.unwrap();
        platform.mark_pods_ready("Master");
        platform.mark_pods_ready("YtsaurusClient");
        platform.mark_pods_ready("HttpProxy");
    }
    orchestrator.reconcile().await.unwrap();

    assert_eq!(orchestrator.status().state, ClusterState::Running);
}

#[tokio::test]
async fn local_update_is_detected_without_touching_other_components() {
    let platform = MockPlatform::new();
    let embedding = Arc::new(platform.embedding("HttpProxy"));
    embedding.apply(2, "proxy-v1").await.unwrap();
    platform.mark_pods_ready("HttpProxy");

    let stale = StandardComponent::new("HttpProxy", embedding.clone(), 2, "proxy-v2", Vec::new());
    stale.fetch().await.unwrap();
    assert_eq!(stale.status().sync_status, SyncStatus::NeedLocalUpdate);
}

#[tokio::test]
async fn master_config_change_triggers_full_update_sequence() {
    let platform = MockPlatform::new();
    let live_client = MockLiveClusterClient::new();
    let cluster_state = Arc::new(RwLock::new(ClusterState::Created));

    let master_embedding = Arc::new(platform.embedding("Master"));
    master_embedding.apply(1, "master-v1").await.unwrap();
    platform.mark_pods_ready("Master");

    let master: Arc<dyn Component> = Arc::new(Master::new(master_embedding, 1, "master-v2", cluster_state.clone()));
    let http_proxy: Arc<dyn Component> = Arc::new(StandardComponent::new(
        "HttpProxy",
        Arc::new(platform.embedding("HttpProxy")),
        1,
        "proxy-v1",
        vec![master.clone()],
    ));
    let ytsaurus_client: Arc<dyn Component> = Arc::new(YtsaurusClient::new(
        Arc::new(platform.embedding("YtsaurusClient")),
        1,
        "ytclient-v1",
        http_proxy.clone(),
    ));
    let components = vec![master.clone(), http_proxy.clone(), ytsaurus_client.clone()];
    let mut orchestrator =
        Orchestrator::new(components, ytsaurus_client, master, live_client.clone(), cluster_state.clone()).unwrap();

    for _ in 0..40 {
        orchestrator.reconcile().await.unwrap();
        platform.mark_pods_ready("Master");
        platform.mark_pods_ready("HttpProxy");
        platform.mark_pods_ready("YtsaurusClient");
        if *cluster_state.read() == ClusterState::Running {
            break;
        }
    }

    assert_eq!(*cluster_state.read(), ClusterState::Running);
    assert!(!live_client.is_safe_mode_enabled(), "safe mode should have been disabled again at the end");
}

#[tokio::test]
async fn full_update_is_blocked_when_the_possibility_check_fails() {
    let platform = MockPlatform::new();
    let live_client = MockLiveClusterClient::new();
    live_client.set_possibility(false, "master quorum not healthy");
    let cluster_state = Arc::new(RwLock::new(ClusterState::Created));

    let master_embedding = Arc::new(platform.embedding("Master"));
    master_embedding.apply(1, "master-v1").await.unwrap();
    platform.mark_pods_ready("Master");

    let master: Arc<dyn Component> = Arc::new(Master::new(master_embedding, 1, "master-v2", cluster_state.clone()));
    let http_proxy: Arc<dyn Component> = Arc::new(StandardComponent::new(
        "HttpProxy",
        Arc::new(platform.embedding("HttpProxy")),
        1,
        "proxy-v1",
        Vec::new(),
    ));
    let ytsaurus_client: Arc<dyn Component> = Arc::new(YtsaurusClient::new(
        Arc::new(platform.embedding("YtsaurusClient")),
        1,
        "ytclient-v1",
        http_proxy.clone(),
    ));
    let components = vec![master.clone(), http_proxy.clone(), ytsaurus_client.clone()];
    let mut orchestrator =
        Orchestrator::new(components, ytsaurus_client, master, live_client, cluster_state.clone()).unwrap();

    orchestrator.reconcile().await.unwrap();

    assert_eq!(*cluster_state.read(), ClusterState::ReconfigurationRequired);
    assert!(orchestrator.status().blocked_message.contains("quorum"));
}

#[tokio::test]
async fn transient_rpc_failure_is_retried_on_the_next_tick() {
    let platform = MockPlatform::new();
    let live_client = MockLiveClusterClient::new();
    live_client.fail_remove_tablet_cells_once();
    let cluster_state = Arc::new(RwLock::new(ClusterState::Created));

    let master_embedding = Arc::new(platform.embedding("Master"));
    master_embedding.apply(1, "master-v1").await.unwrap();
    platform.mark_pods_ready("Master");

    let master: Arc<dyn Component> = Arc::new(Master::new(master_embedding, 1, "master-v2", cluster_state.clone()));
    let http_proxy: Arc<dyn Component> = Arc::new(StandardComponent::new(
        "HttpProxy",
        Arc::new(platform.embedding("HttpProxy")),
        1,
        "proxy-v1",
        Vec::new(),
    ));
    let ytsaurus_client: Arc<dyn Component> = Arc::new(YtsaurusClient::new(
        Arc::new(platform.embedding("YtsaurusClient")),
        1,
        "ytclient-v1",
        http_proxy.clone(),
    ));
    let components = vec![master.clone(), http_proxy.clone(), ytsaurus_client.clone()];
    let mut orchestrator =
        Orchestrator::new(components, ytsaurus_client, master, live_client, cluster_state.clone()).unwrap();

    let mut saw_error = false;
    for _ in 0..40 {
        if orchestrator.reconcile().await.is_err() {
            saw_error = true;
        }
        platform.mark_pods_ready("Master");
        platform.mark_pods_ready("HttpProxy");
        platform.mark_pods_ready("YtsaurusClient");
        if *cluster_state.read() == ClusterState::Running {
            break;
        }
    }

    assert!(saw_error, "expected the injected transient failure to surface once");
    assert_eq!(*cluster_state.read(), ClusterState::Running);
}

#[tokio::test]
async fn full_update_parks_blocked_if_the_cluster_becomes_impossible_mid_sequence() {
    let platform = MockPlatform::new();
    let live_client = MockLiveClusterClient::new();
    let cluster_state = Arc::new(RwLock::new(ClusterState::Created));

    let master_embedding = Arc::new(platform.embedding("Master"));
    master_embedding.apply(1, "master-v1").await.unwrap();
    platform.mark_pods_ready("Master");

    let master: Arc<dyn Component> = Arc::new(Master::new(master_embedding, 1, "master-v2", cluster_state.clone()));
    let http_proxy: Arc<dyn Component> = Arc::new(StandardComponent::new(
        "HttpProxy",
        Arc::new(platform.embedding("HttpProxy")),
        1,
        "proxy-v1",
        Vec::new(),
    ));
    let ytsaurus_client: Arc<dyn Component> = Arc::new(YtsaurusClient::new(
        Arc::new(platform.embedding("YtsaurusClient")),
        1,
        "ytclient-v1",
        http_proxy.clone(),
    ));
    let components = vec![master.clone(), http_proxy.clone(), ytsaurus_client.clone()];
    let mut orchestrator =
        Orchestrator::new(components, ytsaurus_client, master, live_client.clone(), cluster_state.clone()).unwrap();

    // Drives the sequence forward, one admin step at a time, until it is
    // past `EnableSafeMode`, then flips the possibility check mid-sequence.
    for _ in 0..40 {
        orchestrator.reconcile().await.unwrap();
        platform.mark_pods_ready("Master");
        platform.mark_pods_ready("HttpProxy");
        platform.mark_pods_ready("YtsaurusClient");
        if orchestrator.conditions().iter().any(|c| c.name == names::SAFE_MODE_ENABLED && c.status) {
            break;
        }
    }
    assert_eq!(*cluster_state.read(), ClusterState::Updating);
    assert!(
        orchestrator.conditions().iter().any(|c| c.name == names::SAFE_MODE_ENABLED && c.status),
        "expected the sequence to have enabled safe mode before the mid-sequence check"
    );

    live_client.set_possibility(false, "master quorum lost mid-update");
    orchestrator.reconcile().await.unwrap();

    assert_eq!(*cluster_state.read(), ClusterState::Updating, "a mid-sequence block parks, it doesn't abandon");
    assert!(orchestrator.status().blocked_message.contains("quorum"));

    live_client.set_possibility(true, "");
    for _ in 0..40 {
        orchestrator.reconcile().await.unwrap();
        platform.mark_pods_ready("Master");
        platform.mark_pods_ready("HttpProxy");
        platform.mark_pods_ready("YtsaurusClient");
        if *cluster_state.read() == ClusterState::Running {
            break;
        }
    }
    assert_eq!(*cluster_state.read(), ClusterState::Running, "the sequence should resume once possible again");
}

#[tokio::test]
async fn tablet_node_bootstraps_sys_and_default_bundles_once() {
    let platform = MockPlatform::new();
    let bundle_client = MockLiveClusterClient::new();

    let mut bootstrap = BootstrapSpec::default();
    bootstrap.tablet_cell_bundles.insert(
        "sys".to_string(),
        ytreconciler::spec::TabletCellBundleSpec { tablet_cell_count: Some(2), ..Default::default() },
    );

    let tablet_node = TabletNode::new(
        "TabletNode",
        Arc::new(platform.embedding("TabletNode")),
        bundle_client.clone(),
        1,
        "tnode-v1",
        bootstrap,
        true,
        Vec::new(),
    );

    tablet_node.fetch().await.unwrap();
    let conds = ytreconciler::condition::InMemoryConditionStore::new();
    tablet_node.sync(&conds).await.unwrap();
    platform.mark_pods_ready("TabletNode");

    tablet_node.fetch().await.unwrap();
    tablet_node.sync(&conds).await.unwrap();

    assert!(bundle_client.node_exists("//sys/tablet_cell_bundles/sys").await.unwrap());
    assert!(conds.is_satisfied(&ytreconciler::condition::names::init_completed("TabletNodeBundles")));

    tablet_node.sync(&conds).await.unwrap();
    assert!(conds.is_satisfied(&ytreconciler::condition::names::init_completed("TabletNodeBundles")));
}
