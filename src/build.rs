//! Build phase: instantiate a component graph from a [`YtsaurusSpec`],
//! the first step of every reconcile tick. Grounded on
//! `component_manager.go`'s conditional, dependency-ordered
//! construction of `componentsStructured` — optional roles are only
//! built when their sub-spec is present, and each one is wired with the
//! concrete handles its construction-time dependency rule names rather
//! than a generic lookup.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::component::{Component, Master, StandardComponent, TabletNode, YtsaurusClient};
use crate::error::{ReconcileError, Result};
use crate::live_client::BundleClient;
use crate::platform::ServerEmbedding;
use crate::spec::{NamedInstanceSpec, YtsaurusSpec};
use crate::state::ClusterState;

/// The component graph built from a spec, plus the two handles the
/// orchestrator needs by name rather than by position in `components`.
pub struct BuiltComponents {
    pub components: Vec<Arc<dyn Component>>,
    pub master: Arc<dyn Component>,
    pub ytsaurus_client: Arc<dyn Component>,
}

impl std::fmt::Debug for BuiltComponents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltComponents")
            .field(
                "components",
                &self.components.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("master", &self.master.name())
            .field("ytsaurus_client", &self.ytsaurus_client.name())
            .finish()
    }
}

fn instance_name(named: &NamedInstanceSpec, role: &str, idx: usize) -> String {
    named.name.clone().unwrap_or_else(|| if idx == 0 { role.to_string() } else { format!("{role}{idx}") })
}

fn require(present: bool, component: &str, requires: &str) -> Result<()> {
    if present {
        Ok(())
    } else {
        Err(ReconcileError::DependencyUnsatisfied { component: component.to_string(), requires: requires.to_string() })
    }
}

/// Instantiates every component named in `spec` and validates the
/// dependency rules: UI, RPC/TCP proxies and exec nodes depend on
/// master; tablet nodes depend on master and the admin client; the
/// scheduler depends on master, exec nodes and tablet nodes; query
/// trackers, queue agents and strawberry each require their own
/// combination of optional roles to be configured at all. A violated
/// rule returns `DependencyUnsatisfied` instead of silently building a
/// half-wired component.
pub fn build_components<E, C>(
    spec: &YtsaurusSpec,
    embedding_for: impl Fn(&str) -> E,
    bundle_client: Arc<C>,
    cluster_state: Arc<RwLock<ClusterState>>,
) -> Result<BuiltComponents>
where
    E: ServerEmbedding + 'static,
    C: BundleClient + 'static,
{
    let mut components: Vec<Arc<dyn Component>> = Vec::new();

    let master: Arc<dyn Component> = Arc::new(Master::new(
        Arc::new(embedding_for("Master")),
        spec.master.instance_count,
        spec.master.config_hash(),
        cluster_state,
    ));
    components.push(master.clone());

    if let Some(discovery) = &spec.discovery {
        let c: Arc<dyn Component> = Arc::new(StandardComponent::new(
            "Discovery",
            Arc::new(embedding_for("Discovery")),
            discovery.instance_count,
            discovery.config_hash(),
            Vec::new(),
        ));
        components.push(c);
    }

    let mut http_proxies: Vec<Arc<dyn Component>> = Vec::new();
    for (idx, named) in spec.http_proxies.iter().enumerate() {
        let name = instance_name(named, "HttpProxy", idx);
        let c: Arc<dyn Component> = Arc::new(StandardComponent::new(
            name,
            Arc::new(embedding_for("HttpProxy")),
            named.instance_spec.instance_count,
            named.instance_spec.config_hash(),
            vec![master.clone()],
        ));
        components.push(c.clone());
        http_proxies.push(c);
    }

    require(!http_proxies.is_empty(), "YtsaurusClient", "http_proxies")?;
    let ytsaurus_client: Arc<dyn Component> = Arc::new(YtsaurusClient::new(
        Arc::new(embedding_for("YtsaurusClient")),
        1,
        "ytsaurus-client",
        http_proxies[0].clone(),
    ));
    components.push(ytsaurus_client.clone());

    for (idx, named) in spec.rpc_proxies.iter().enumerate() {
        let name = instance_name(named, "RpcProxy", idx);
        let c: Arc<dyn Component> = Arc::new(StandardComponent::new(
            name,
            Arc::new(embedding_for("RpcProxy")),
            named.instance_spec.instance_count,
            named.instance_spec.config_hash(),
            vec![master.clone()],
        ));
        components.push(c);
    }

    for (idx, named) in spec.tcp_proxies.iter().enumerate() {
        let name = instance_name(named, "TcpProxy", idx);
        let c: Arc<dyn Component> = Arc::new(StandardComponent::new(
            name,
            Arc::new(embedding_for("TcpProxy")),
            named.instance_spec.instance_count,
            named.instance_spec.config_hash(),
            vec![master.clone()],
        ));
        components.push(c);
    }

    let mut exec_nodes: Vec<Arc<dyn Component>> = Vec::new();
    for (idx, named) in spec.exec_nodes.iter().enumerate() {
        let name = instance_name(named, "ExecNode", idx);
        let c: Arc<dyn Component> = Arc::new(StandardComponent::new(
            name,
            Arc::new(embedding_for("ExecNode")),
            named.instance_spec.instance_count,
            named.instance_spec.config_hash(),
            vec![master.clone()],
        ));
        components.push(c.clone());
        exec_nodes.push(c);
    }

    let mut data_nodes: Vec<Arc<dyn Component>> = Vec::new();
    for (idx, named) in spec.data_nodes.iter().enumerate() {
        let name = instance_name(named, "DataNode", idx);
        let c: Arc<dyn Component> = Arc::new(StandardComponent::new(
            name,
            Arc::new(embedding_for("DataNode")),
            named.instance_spec.instance_count,
            named.instance_spec.config_hash(),
            Vec::new(),
        ));
        components.push(c.clone());
        data_nodes.push(c);
    }

    let mut tablet_nodes: Vec<Arc<dyn Component>> = Vec::new();
    for (idx, named) in spec.tablet_nodes.iter().enumerate() {
        let name = instance_name(named, "TabletNode", idx);
        let c: Arc<dyn Component> = Arc::new(TabletNode::new(
            name,
            Arc::new(embedding_for("TabletNode")),
            bundle_client.clone(),
            named.instance_spec.instance_count,
            named.instance_spec.config_hash(),
            spec.bootstrap.clone(),
            idx == 0,
            vec![master.clone(), ytsaurus_client.clone()],
        ));
        components.push(c.clone());
        tablet_nodes.push(c);
    }

    if let Some(controller_agents) = &spec.controller_agents {
        let c: Arc<dyn Component> = Arc::new(StandardComponent::new(
            "ControllerAgent",
            Arc::new(embedding_for("ControllerAgent")),
            controller_agents.instance_count,
            controller_agents.config_hash(),
            vec![master.clone()],
        ));
        components.push(c);
    }

    let scheduler: Option<Arc<dyn Component>> = if let Some(schedulers) = &spec.schedulers {
        require(!exec_nodes.is_empty(), "Scheduler", "exec_nodes")?;
        require(!tablet_nodes.is_empty(), "Scheduler", "tablet_nodes")?;
        let mut depends_on = vec![master.clone()];
        depends_on.extend(exec_nodes.iter().cloned());
        depends_on.extend(tablet_nodes.iter().cloned());
        let c: Arc<dyn Component> = Arc::new(StandardComponent::new(
            "Scheduler",
            Arc::new(embedding_for("Scheduler")),
            schedulers.instance_count,
            schedulers.config_hash(),
            depends_on,
        ));
        components.push(c.clone());
        Some(c)
    } else {
        None
    };

    if let Some(query_trackers) = &spec.query_trackers {
        require(!tablet_nodes.is_empty(), "QueryTracker", "tablet_nodes")?;
        require(scheduler.is_some(), "QueryTracker", "schedulers")?;
        let mut depends_on = vec![ytsaurus_client.clone(), scheduler.clone().unwrap()];
        depends_on.extend(tablet_nodes.iter().cloned());
        let c: Arc<dyn Component> = Arc::new(StandardComponent::new(
            "QueryTracker",
            Arc::new(embedding_for("QueryTracker")),
            query_trackers.instance_count,
            query_trackers.config_hash(),
            depends_on,
        ));
        components.push(c);
    }

    if let Some(queue_agents) = &spec.queue_agents {
        require(!tablet_nodes.is_empty(), "QueueAgent", "tablet_nodes")?;
        let mut depends_on = vec![ytsaurus_client.clone(), master.clone()];
        depends_on.extend(tablet_nodes.iter().cloned());
        let c: Arc<dyn Component> = Arc::new(StandardComponent::new(
            "QueueAgent",
            Arc::new(embedding_for("QueueAgent")),
            queue_agents.instance_count,
            queue_agents.config_hash(),
            depends_on,
        ));
        components.push(c);
    }

    if let Some(yql_agents) = &spec.yql_agents {
        let c: Arc<dyn Component> = Arc::new(StandardComponent::new(
            "YqlAgent",
            Arc::new(embedding_for("YqlAgent")),
            yql_agents.instance_count,
            yql_agents.config_hash(),
            vec![master.clone()],
        ));
        components.push(c);
    }

    if let Some(ui) = &spec.ui {
        let c: Arc<dyn Component> = Arc::new(StandardComponent::new(
            "Ui",
            Arc::new(embedding_for("Ui")),
            ui.instance_count,
            ui.config_hash(),
            vec![master.clone()],
        ));
        components.push(c);
    }

    if let Some(strawberry) = &spec.strawberry_controller {
        require(scheduler.is_some(), "Strawberry", "schedulers")?;
        require(!data_nodes.is_empty(), "Strawberry", "data_nodes")?;
        let mut depends_on = vec![master.clone(), scheduler.clone().unwrap()];
        depends_on.extend(data_nodes.iter().cloned());
        let c: Arc<dyn Component> = Arc::new(StandardComponent::new(
            "Strawberry",
            Arc::new(embedding_for("Strawberry")),
            strawberry.instance_count,
            strawberry.config_hash(),
            depends_on,
        ));
        components.push(c);
    }

    if let Some(master_caches) = &spec.master_caches {
        let c: Arc<dyn Component> = Arc::new(StandardComponent::new(
            "MasterCache",
            Arc::new(embedding_for("MasterCache")),
            master_caches.instance_count,
            master_caches.config_hash(),
            vec![master.clone()],
        ));
        components.push(c);
    }

    Ok(BuiltComponents { components, master, ytsaurus_client })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_client::mock::MockLiveClusterClient;
    use crate::platform::mock::MockPlatform;
    use crate::spec::{InstanceSpec, NamedInstanceSpec};

    fn named(image: &str) -> NamedInstanceSpec {
        NamedInstanceSpec { name: None, instance_spec: InstanceSpec::new(1, image) }
    }

    #[test]
    fn minimal_spec_builds_master_and_ytsaurus_client_only() {
        let platform = MockPlatform::new();
        let bundle_client = MockLiveClusterClient::new();
        let mut spec = YtsaurusSpec::minimal("ytsaurus/master:stable");
        spec.http_proxies.push(named("ytsaurus/proxy:stable"));
        let cluster_state = Arc::new(RwLock::new(ClusterState::Created));

        let built = build_components(
            &spec,
            |role| platform.embedding(role),
            bundle_client,
            cluster_state,
        )
        .unwrap();

        let names: Vec<&str> = built.components.iter().map(|c| c.name()).collect();
        assert!(names.contains(&"Master"));
        assert!(names.contains(&"HttpProxy"));
        assert!(names.contains(&"YtsaurusClient"));
        assert_eq!(built.ytsaurus_client.name(), "YtsaurusClient");
    }

    #[test]
    fn ytsaurus_client_without_any_http_proxy_is_rejected() {
        let platform = MockPlatform::new();
        let bundle_client = MockLiveClusterClient::new();
        let spec = YtsaurusSpec::minimal("ytsaurus/master:stable");
        let cluster_state = Arc::new(RwLock::new(ClusterState::Created));

        let err = build_components(&spec, |role| platform.embedding(role), bundle_client, cluster_state)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::DependencyUnsatisfied { component, .. } if component == "YtsaurusClient"));
    }

    #[test]
    fn query_tracker_without_scheduler_is_rejected() {
        let platform = MockPlatform::new();
        let bundle_client = MockLiveClusterClient::new();
        let mut spec = YtsaurusSpec::minimal("ytsaurus/master:stable");
        spec.http_proxies.push(named("ytsaurus/proxy:stable"));
        spec.tablet_nodes.push(named("ytsaurus/tablet-node:stable"));
        spec.query_trackers = Some(InstanceSpec::new(1, "ytsaurus/query-tracker:stable"));
        let cluster_state = Arc::new(RwLock::new(ClusterState::Created));

        let err = build_components(&spec, |role| platform.embedding(role), bundle_client, cluster_state)
            .unwrap_err();
        assert!(
            matches!(err, ReconcileError::DependencyUnsatisfied { component, requires } if component == "QueryTracker" && requires == "schedulers")
        );
    }

    #[test]
    fn full_spec_wires_scheduler_and_query_tracker() {
        let platform = MockPlatform::new();
        let bundle_client = MockLiveClusterClient::new();
        let mut spec = YtsaurusSpec::minimal("ytsaurus/master:stable");
        spec.http_proxies.push(named("ytsaurus/proxy:stable"));
        spec.exec_nodes.push(named("ytsaurus/exec-node:stable"));
        spec.tablet_nodes.push(named("ytsaurus/tablet-node:stable"));
        spec.schedulers = Some(InstanceSpec::new(1, "ytsaurus/scheduler:stable"));
        spec.query_trackers = Some(InstanceSpec::new(1, "ytsaurus/query-tracker:stable"));
        let cluster_state = Arc::new(RwLock::new(ClusterState::Created));

        let built =
            build_components(&spec, |role| platform.embedding(role), bundle_client, cluster_state).unwrap();

        let names: Vec<&str> = built.components.iter().map(|c| c.name()).collect();
        assert!(names.contains(&"Scheduler"));
        assert!(names.contains(&"QueryTracker"));
    }
}
