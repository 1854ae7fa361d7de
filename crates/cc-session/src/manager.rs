//! Controller Manager (spec.md §4.7, C8): owns the `appID -> Controller`
//! map. Spec.md §5 fixes the discipline here precisely -- "reader-writer
//! mutex around controllers" -- unlike the owning-task pattern used for
//! Store/ActorPool/Controller, so we use one directly, the same way
//! `local_backend::subs` guards its last-seen timestamps with
//! `parking_lot::Mutex`.

use std::{collections::HashMap, sync::Arc};

use cc_controller::Controller;
use cc_errors::ErrorMetadata;
use parking_lot::RwLock;

#[derive(Clone, Default)]
pub struct Manager {
    controllers: Arc<RwLock<HashMap<String, Controller>>>,
}

impl Manager {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Add(c)` (spec.md §4.7): inserts if absent, else `AlreadyExists`.
    pub fn add(&self, controller: Controller) -> anyhow::Result<()> {
        let mut controllers = self.controllers.write();
        if controllers.contains_key(controller.app_id()) {
            anyhow::bail!(ErrorMetadata::already_exists(format!(
                "a controller for application {:?} is already registered",
                controller.app_id()
            )));
        }
        controllers.insert(controller.app_id().to_string(), controller);
        Ok(())
    }

    pub fn get(&self, app_id: &str) -> Option<Controller> {
        self.controllers.read().get(app_id).cloned()
    }

    pub fn remove(&self, app_id: &str) -> Option<Controller> {
        self.controllers.write().remove(app_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc as StdArc;

    use cc_provider::{ChannelWorkerTransport, ComponentService};
    use cc_store::Store;

    use super::*;

    fn controller(app_id: &str) -> Controller {
        let transport = StdArc::new(ChannelWorkerTransport::new());
        let service = StdArc::new(ComponentService::new(HashMap::new(), vec![], transport.clone()));
        Controller::spawn(app_id.to_string(), Store::spawn(), service, transport)
    }

    #[test]
    fn add_rejects_a_duplicate_app_id() {
        let manager = Manager::new();
        manager.add(controller("A")).unwrap();
        let err = manager.add(controller("A")).unwrap_err();
        assert_eq!(cc_errors::ErrorMetadataExt::code(&err), cc_errors::ErrorCode::AlreadyExists);
    }

    #[test]
    fn get_and_remove_round_trip() {
        let manager = Manager::new();
        manager.add(controller("A")).unwrap();
        assert!(manager.get("A").is_some());
        assert!(manager.remove("A").is_some());
        assert!(manager.get("A").is_none());
    }
}
