pub mod provider;
pub mod service;
pub mod transport;

pub use provider::{ComponentProvider, ProviderStatus, StaticProvider};
pub use service::{Component, ComponentService};
pub use transport::{ChannelWorkerTransport, WorkerTransport, INBOUND_BUFFER_DEPTH};
