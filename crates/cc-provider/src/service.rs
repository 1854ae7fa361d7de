//! Component Service (spec.md §4.3, C3): resolves a runtime environment to
//! an image, mints a component id, registers it with the Worker Transport,
//! and deploys it onto the first provider (in registration order) whose
//! capacity dominates the request.

use std::{collections::HashMap, sync::Arc};

use cc_errors::ErrorMetadata;
use cc_proto::{ids, Resources};
use tracing::{info, warn};

use crate::{
    provider::{ComponentProvider, ProviderStatus},
    transport::WorkerTransport,
};

/// A successfully deployed worker component (spec.md §4.3: "return the
/// component").
#[derive(Debug, Clone)]
pub struct Component {
    pub id: String,
}

pub struct ComponentService {
    images: HashMap<String, String>,
    providers: Vec<Arc<dyn ComponentProvider>>,
    transport: Arc<dyn WorkerTransport>,
}

impl ComponentService {
    /// `providers` must be supplied in the order they should be tried --
    /// spec.md §4.3/§4.4 fixes first-fit tie-break by registration order,
    /// not by any score.
    pub fn new(
        images: HashMap<String, String>,
        providers: Vec<Arc<dyn ComponentProvider>>,
        transport: Arc<dyn WorkerTransport>,
    ) -> Self {
        Self {
            images,
            providers,
            transport,
        }
    }

    /// `Deploy(function_name, runtime_env, request) -> Component`
    /// (spec.md §4.3).
    pub async fn deploy(
        &self,
        function_name: &str,
        runtime_env: &str,
        request: Resources,
    ) -> anyhow::Result<Component> {
        let image = self.images.get(runtime_env).ok_or_else(|| {
            anyhow::anyhow!(ErrorMetadata::not_found(format!(
                "no image mapped for runtime environment {runtime_env:?}"
            )))
        })?;

        let id = ids::new_component_id();
        self.transport.register_worker(&id)?;

        for provider in &self.providers {
            if provider.status() != ProviderStatus::Connected {
                continue;
            }
            if !provider.available().dominates(&request) {
                continue;
            }
            match provider.deploy(&id, image, request).await {
                Ok(()) => {
                    info!(
                        component_id = %id,
                        provider = provider.id(),
                        function = function_name,
                        "deployed worker component"
                    );
                    return Ok(Component { id });
                },
                Err(err) => {
                    warn!(
                        component_id = %id,
                        provider = provider.id(),
                        error = %err,
                        "provider declined deploy, trying next"
                    );
                },
            }
        }

        anyhow::bail!(ErrorMetadata::no_capacity(format!(
            "no provider with sufficient capacity to deploy {function_name} ({request:?})"
        )))
    }
}
