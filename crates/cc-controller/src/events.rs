//! Lifecycle event hub (spec.md §6 `EventHub`, supplemented per SPEC_FULL.md
//! §4.6): fire-and-forget observability events a Controller emits alongside
//! its client-facing responses. Modeled on `golem-shard-manager`'s
//! shard-assignment broadcast and `sync`'s log-sink fan-out -- a
//! `tokio::sync::broadcast` channel that subscribers may ignore entirely
//! without affecting the command path.

use tokio::sync::broadcast;

/// Default ring buffer depth; lagging subscribers drop the oldest events
/// rather than block the Controller's owning task.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    FunctionDeployed { name: String, replicas: u32 },
    RuntimeCompleted { runtime_id: String },
    RuntimeFailed { runtime_id: String, error: String },
}

/// Owned by a `ControllerWorker`; cloning the `Sender` is how a Controller
/// hands out new subscriptions without holding a list of receivers itself.
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<ControllerEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.tx.subscribe()
    }

    /// No subscribers is the common case and not an error.
    pub fn publish(&self, event: ControllerEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
