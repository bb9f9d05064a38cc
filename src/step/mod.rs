//! Step algebra: the unit of work inside a component's flow. A step
//! answers whether it needs to run before it is run, so composing steps
//! can always ask "what's next" without re-running finished work.

use async_trait::async_trait;

use crate::condition::{Condition, ConditionGate, ConditionStore};
use crate::error::Result;
use crate::state::StepSyncStatus;

#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// `Done`/`Skip` mean nothing left to do; `NeedRun` means `run` should
    /// be called; `Blocked` means it can't run yet and callers must not
    /// call `run`.
    async fn status(&self, conds: &dyn ConditionStore) -> Result<(StepSyncStatus, String)>;

    /// Only called when `status` returned `NeedRun`. Returns whether the
    /// run succeeded; `post_run` only fires on success.
    async fn run(&self, conds: &dyn ConditionStore) -> Result<bool>;

    async fn post_run(&self, _conds: &dyn ConditionStore) -> Result<()> {
        Ok(())
    }
}

/// Gating and bookkeeping shared by every leaf step. A step whose
/// `run_if_condition` gate is blocked reports `Skip` without consulting
/// the step body — the gate models "this step has nothing to do while
/// X", not "this step is waiting on X". A step settles for good once its
/// own `run_if` gate watches the same condition its `on_success_set`
/// writes (see `requires_absent` usage below); gating on some other
/// step's condition only orders *when* it first runs, not whether it
/// ever stops reporting `NeedRun` once it has.
pub struct StepMeta {
    pub name: String,
    pub run_if_condition: Option<ConditionGate>,
    pub blocked_while_condition: Option<String>,
    pub on_success_condition: Option<String>,
}

impl StepMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), run_if_condition: None, blocked_while_condition: None, on_success_condition: None }
    }

    pub fn run_if(mut self, gate: ConditionGate) -> Self {
        self.run_if_condition = Some(gate);
        self
    }

    /// Reports `Blocked` instead of running while `condition_name` is
    /// satisfied, re-checked on every `status` call (unlike
    /// `run_if`/`Skip`, which only means "nothing to do"). Used by steps
    /// that must park mid-sequence if an external possibility check
    /// flips against them.
    pub fn blocked_while(mut self, condition_name: impl Into<String>) -> Self {
        self.blocked_while_condition = Some(condition_name.into());
        self
    }

    pub fn on_success_set(mut self, condition_name: impl Into<String>) -> Self {
        self.on_success_condition = Some(condition_name.into());
        self
    }

    fn gate_says_done(&self, conds: &dyn ConditionStore) -> Option<(StepSyncStatus, String)> {
        if let Some(name) = &self.blocked_while_condition {
            if conds.is_satisfied(name) {
                return Some((StepSyncStatus::Blocked, format!("blocked while {name} is set")));
            }
        }
        match &self.run_if_condition {
            Some(gate) if conds.is_gate_blocked(gate) => {
                Some((StepSyncStatus::Skip, format!("gate {} is blocking this step", gate.name)))
            }
            _ => None,
        }
    }

    async fn post_run(&self, conds: &dyn ConditionStore) -> Result<()> {
        if let Some(name) = &self.on_success_condition {
            conds.set_cond(Condition::new(name.clone(), true, "StepSucceeded", ""));
        }
        Ok(())
    }
}

type ActionBody = Box<dyn Fn() -> futures_core_result::BoxFuture + Send + Sync>;

// A tiny hand-rolled boxed-future alias so `ActionStep`/`CheckStep` can
// store an async closure without pulling in futures just for this.
mod futures_core_result {
    use std::future::Future;
    use std::pin::Pin;

    use crate::error::Result;

    pub type BoxFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// A step whose body either fully succeeds or returns an error; there is
/// no partial-success notion, matching `StepRun` in the original flow.
pub struct ActionStep {
    meta: StepMeta,
    body: ActionBody,
}

impl ActionStep {
    pub fn new<F, Fut>(meta: StepMeta, body: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        Self { meta, body: Box::new(move || Box::pin(body())) }
    }
}

#[async_trait]
impl Step for ActionStep {
    fn name(&self) -> &str {
        &self.meta.name
    }

    async fn status(&self, conds: &dyn ConditionStore) -> Result<(StepSyncStatus, String)> {
        if let Some(done) = self.meta.gate_says_done(conds) {
            return Ok(done);
        }
        Ok((StepSyncStatus::NeedRun, format!("{} needs to run", self.meta.name)))
    }

    async fn run(&self, _conds: &dyn ConditionStore) -> Result<bool> {
        (self.body)().await?;
        Ok(true)
    }

    async fn post_run(&self, conds: &dyn ConditionStore) -> Result<()> {
        self.meta.post_run(conds).await
    }
}

type CheckBody = Box<dyn Fn() -> futures_core_check::BoxFuture + Send + Sync>;

mod futures_core_check {
    use std::future::Future;
    use std::pin::Pin;

    use crate::error::Result;

    pub type BoxFuture = Pin<Box<dyn Future<Output = Result<bool>> + Send>>;
}

/// A step whose body is a poll: `run` reports whether the awaited
/// condition has become true yet, without that being an error either way.
/// Typical use is waiting for an external system to settle (e.g. "are
/// tablet cells removed").
pub struct CheckStep {
    meta: StepMeta,
    body: CheckBody,
}

impl CheckStep {
    pub fn new<F, Fut>(meta: StepMeta, body: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<bool>> + Send + 'static,
    {
        Self { meta, body: Box::new(move || Box::pin(body())) }
    }
}

#[async_trait]
impl Step for CheckStep {
    fn name(&self) -> &str {
        &self.meta.name
    }

    async fn status(&self, conds: &dyn ConditionStore) -> Result<(StepSyncStatus, String)> {
        if let Some(done) = self.meta.gate_says_done(conds) {
            return Ok(done);
        }
        Ok((StepSyncStatus::NeedRun, format!("{} is being polled", self.meta.name)))
    }

    async fn run(&self, _conds: &dyn ConditionStore) -> Result<bool> {
        (self.body)().await
    }

    async fn post_run(&self, conds: &dyn ConditionStore) -> Result<()> {
        self.meta.post_run(conds).await
    }
}

/// An ordered sequence of steps run one at a time: at most one child
/// advances per call to `run`, which is what makes a cluster-wide
/// full-update sequence resumable across reconcile ticks instead of
/// needing to run to completion in a single tick.
pub struct CompositeStep {
    meta: StepMeta,
    children: Vec<Box<dyn Step>>,
}

impl CompositeStep {
    pub fn new(meta: StepMeta, children: Vec<Box<dyn Step>>) -> Self {
        Self { meta, children }
    }

    /// The first child that isn't settled yet, along with its status.
    async fn first_unsettled(
        &self,
        conds: &dyn ConditionStore,
    ) -> Result<Option<(&Box<dyn Step>, StepSyncStatus, String)>> {
        for child in &self.children {
            let (st, msg) = child.status(conds).await?;
            if !st.is_settled() {
                return Ok(Some((child, st, msg)));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Step for CompositeStep {
    fn name(&self) -> &str {
        &self.meta.name
    }

    async fn status(&self, conds: &dyn ConditionStore) -> Result<(StepSyncStatus, String)> {
        if let Some(done) = self.meta.gate_says_done(conds) {
            return Ok(done);
        }
        match self.first_unsettled(conds).await? {
            None => Ok((StepSyncStatus::Done, format!("{}: all sub-steps are done", self.meta.name))),
            Some((_, st, msg)) => Ok((st, msg)),
        }
    }

    async fn run(&self, conds: &dyn ConditionStore) -> Result<bool> {
        let Some((child, st, _)) = self.first_unsettled(conds).await? else {
            return Ok(true);
        };
        if st == StepSyncStatus::Blocked {
            return Ok(false);
        }
        let ok = child.run(conds).await?;
        if ok {
            child.post_run(conds).await?;
        }
        Ok(ok)
    }

    async fn post_run(&self, conds: &dyn ConditionStore) -> Result<()> {
        self.meta.post_run(conds).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::condition::InMemoryConditionStore;

    #[tokio::test]
    async fn action_step_runs_once_and_sets_condition() {
        let conds = InMemoryConditionStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let step = ActionStep::new(StepMeta::new("Enable").on_success_set("Enabled"), move || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let (st, _) = step.status(&conds).await.unwrap();
        assert_eq!(st, StepSyncStatus::NeedRun);
        assert!(step.run(&conds).await.unwrap());
        step.post_run(&conds).await.unwrap();
        assert!(conds.is_satisfied("Enabled"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gated_step_needs_run_while_gate_condition_is_unset() {
        let conds = InMemoryConditionStore::new();
        let step = ActionStep::new(StepMeta::new("Recover").run_if(ConditionGate::requires("Removed")), || async {
            Ok(())
        });
        let (st, _) = step.status(&conds).await.unwrap();
        assert_eq!(st, StepSyncStatus::NeedRun);
    }

    #[tokio::test]
    async fn gated_step_reports_skip_once_condition_is_explicitly_false() {
        let conds = InMemoryConditionStore::new();
        conds.set_cond(Condition::new("Removed", false, "NotYet", ""));
        let step = ActionStep::new(StepMeta::new("Recover").run_if(ConditionGate::requires("Removed")), || async {
            Ok(())
        });
        let (st, _) = step.status(&conds).await.unwrap();
        assert_eq!(st, StepSyncStatus::Skip);
    }

    #[tokio::test]
    async fn composite_advances_one_child_at_a_time() {
        let conds = InMemoryConditionStore::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let make_step = |name: &'static str, order: Arc<parking_lot::Mutex<Vec<&'static str>>>| {
            let done_cond = format!("{name}Done");
            ActionStep::new(
                StepMeta::new(name)
                    .run_if(ConditionGate::requires_absent(done_cond.clone()))
                    .on_success_set(done_cond),
                move || {
                    let order = order.clone();
                    async move {
                        order.lock().push(name);
                        Ok(())
                    }
                },
            )
        };
        let composite = CompositeStep::new(
            StepMeta::new("Composite"),
            vec![
                Box::new(make_step("A", order.clone())),
                Box::new(make_step("B", order.clone())),
            ],
        );

        assert!(composite.run(&conds).await.unwrap());
        assert_eq!(*order.lock(), vec!["A"]);

        assert!(composite.run(&conds).await.unwrap());
        assert_eq!(*order.lock(), vec!["A", "B"]);

        let (st, _) = composite.status(&conds).await.unwrap();
        assert_eq!(st, StepSyncStatus::Done);
    }
}
