//! Demo wiring: the in-process `ComponentProvider`/`WorkerTransport` stand-ins
//! (spec.md §1 names the real deploy/messaging backends as out of scope)
//! plus one pre-registered Controller so a client can attach and run
//! `AppendPyFunc`/`Invoke` against this binary with nothing else running.

use std::{collections::HashMap, sync::Arc};

use cc_controller::Controller;
use cc_proto::Resources;
use cc_provider::{ChannelWorkerTransport, ComponentService, StaticProvider};
use cc_session::Manager;
use cc_store::Store;

/// Generous enough that the demo never hits `NoCapacity` by accident; a
/// real provider's capacity comes from whatever backend it wraps.
const DEMO_PROVIDER_CAPACITY: Resources = Resources {
    cpu: 64_000,
    memory: 64 << 30,
    gpu: 0,
};

/// Registers one application's Controller against in-process demo
/// infrastructure and returns the shared Manager a `cc-server` bind
/// serves sessions out of.
pub fn bootstrap(demo_app_id: &str) -> Manager {
    let manager = Manager::new();

    let transport = Arc::new(ChannelWorkerTransport::new());
    let provider = Arc::new(StaticProvider::new("demo-provider", DEMO_PROVIDER_CAPACITY));
    let images = HashMap::from([
        ("python".to_string(), "golem/python:3.11".to_string()),
        ("go".to_string(), "golem/go:1.22".to_string()),
        ("json".to_string(), "golem/json-echo:latest".to_string()),
    ]);
    let service = Arc::new(ComponentService::new(images, vec![provider], transport.clone()));

    let controller = Controller::spawn(demo_app_id.to_string(), Store::spawn(), service, transport);
    manager
        .add(controller)
        .expect("demo app id is registered exactly once at startup");

    manager
}
