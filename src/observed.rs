//! Observed state: for each component, the current child-resource set
//! plus component-specific probes.

#[derive(Debug, Clone, Default)]
pub struct ObservedState {
    /// Number of pods the orchestration platform currently reports for
    /// this component's workload.
    pub pod_count: u32,
    /// Number of those pods that are ready.
    pub ready_pod_count: u32,
    /// Hash of the config-map actually applied to the workload.
    pub applied_config_hash: Option<String>,
    /// Whether the workload (StatefulSet-equivalent) exists at all.
    pub workload_exists: bool,
    /// Desired replica count currently set on the live workload, used to
    /// detect an in-place scale that hasn't rolled yet.
    pub workload_replicas: u32,
}

impl ObservedState {
    pub fn all_pods_ready(&self, desired_replicas: u32) -> bool {
        self.workload_exists
            && self.pod_count == desired_replicas
            && self.ready_pod_count == desired_replicas
    }

    pub fn no_pods(&self) -> bool {
        self.pod_count == 0
    }
}
