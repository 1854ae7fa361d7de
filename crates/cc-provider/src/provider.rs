//! `ComponentProvider` (spec.md §6): the narrow capability surface the core
//! consumes from whatever actually deploys workers (Docker, Kubernetes,
//! ...). Modeled on `node_executor`'s `local.rs`/`noop.rs` split: one
//! trait, a deterministic test/demo double, real drivers left external.

use async_trait::async_trait;
use cc_proto::Resources;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Connected,
    Disconnected,
}

#[async_trait]
pub trait ComponentProvider: Send + Sync {
    fn id(&self) -> &str;
    fn status(&self) -> ProviderStatus;
    /// The provider's current spare capacity, compared dimension-wise
    /// against a deploy request (spec.md §4.3 step 4).
    fn available(&self) -> Resources;
    /// Attempts to deploy `image` under `id` with `request`'s resources
    /// reserved. A provider error here is not fatal to the deploy as a
    /// whole -- the caller moves on to the next provider (spec.md §4.3
    /// step 5).
    async fn deploy(&self, id: &str, image: &str, request: Resources) -> anyhow::Result<()>;
}

/// A deterministic test/demo provider: reports a fixed `Available()` and
/// always succeeds (or always fails, for `NoCapacity`/provider-error
/// scenarios). Analogous to `node_executor::noop::NoopNodeExecutor`.
pub struct StaticProvider {
    id: String,
    status: ProviderStatus,
    available: Resources,
    deploy_should_fail: bool,
}

impl StaticProvider {
    pub fn new(id: impl Into<String>, available: Resources) -> Self {
        Self {
            id: id.into(),
            status: ProviderStatus::Connected,
            available,
            deploy_should_fail: false,
        }
    }

    pub fn disconnected(mut self) -> Self {
        self.status = ProviderStatus::Disconnected;
        self
    }

    pub fn failing_deploys(mut self) -> Self {
        self.deploy_should_fail = true;
        self
    }
}

#[async_trait]
impl ComponentProvider for StaticProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> ProviderStatus {
        self.status
    }

    fn available(&self) -> Resources {
        self.available
    }

    async fn deploy(&self, _id: &str, _image: &str, _request: Resources) -> anyhow::Result<()> {
        if self.deploy_should_fail {
            anyhow::bail!("provider {} refused the deploy", self.id);
        }
        Ok(())
    }
}
