use std::sync::Arc;

use async_trait::async_trait;

use crate::condition::ConditionStore;
use crate::error::Result;
use crate::platform::ServerEmbedding;
use crate::state::ComponentStatus;

use super::{Component, StandardComponent};

/// The admin-API client role: `component_manager.go`'s
/// `NewYtsaurusClient(cfgen, ytsaurus, hps[0])` takes a specific HTTP
/// proxy handle rather than a generic dependency list, because every
/// admin RPC it issues is routed through that one proxy. Everything
/// else about its lifecycle is the standard build/wait/update flow, so
/// this wraps a `StandardComponent` instead of duplicating it.
pub struct YtsaurusClient<E: ServerEmbedding> {
    inner: StandardComponent<E>,
    http_proxy: Arc<dyn Component>,
}

impl<E: ServerEmbedding + 'static> YtsaurusClient<E> {
    pub fn new(
        embedding: Arc<E>,
        desired_replicas: u32,
        config_hash: impl Into<String>,
        http_proxy: Arc<dyn Component>,
    ) -> Self {
        Self {
            inner: StandardComponent::new(
                "YtsaurusClient",
                embedding,
                desired_replicas,
                config_hash,
                vec![http_proxy.clone()],
            ),
            http_proxy,
        }
    }
}

#[async_trait]
impl<E: ServerEmbedding + 'static> Component for YtsaurusClient<E> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn depends_on_names(&self) -> Vec<String> {
        vec![self.http_proxy.name().to_string()]
    }

    async fn fetch(&self) -> Result<()> {
        self.inner.fetch().await
    }

    fn status(&self) -> ComponentStatus {
        self.inner.status()
    }

    async fn sync(&self, conds: &dyn ConditionStore) -> Result<()> {
        self.inner.sync(conds).await
    }
}
