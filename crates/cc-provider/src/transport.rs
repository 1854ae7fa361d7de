//! Worker Transport (spec.md §4.2, §6): a named, bidirectional message
//! channel per worker. Modeled on `node_executor`'s trait/impl split
//! (`NodeExecutor` with `local.rs`/`noop.rs` implementations) -- one trait,
//! swappable backends, no assumption baked into callers about which
//! backend is in play.
//!
//! The contract only requires "deliver to/from a named worker"; how bytes
//! actually cross a process boundary is exactly the "messaging transport
//! to worker processes" spec.md §1 names as out of scope. `ChannelWorkerTransport`
//! is the in-process stand-in used by `cc-server`'s demo wiring and by every
//! test in this workspace.
//!
//! Per spec.md §4.2, a worker is unattached until it sends `Ready`; sends
//! before that point queue locally rather than reaching the worker's
//! channel, and are flushed in order once `Ready` is observed.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use cc_errors::ErrorMetadata;
use cc_proto::{WorkerInbound, WorkerOutbound};
use tokio::sync::mpsc;

/// Bounded depth for a worker's inbound-from-worker buffer (spec.md §4.2:
/// "a per-worker inbound buffer of bounded depth (>= 100)").
pub const INBOUND_BUFFER_DEPTH: usize = 128;

#[async_trait]
pub trait WorkerTransport: Send + Sync {
    /// Creates the named worker's inbound buffer and outbound sender
    /// (spec.md §4.3 step 3, "Register the component with Worker Transport").
    fn register_worker(&self, worker_id: &str) -> anyhow::Result<()>;

    /// Enqueues `msg` for delivery to `worker_id`. Non-blocking for the
    /// caller beyond a local buffer write; best-effort, in order per
    /// worker id (spec.md §4.2).
    fn send(&self, worker_id: &str, msg: WorkerInbound) -> anyhow::Result<()>;

    /// Awaits the next inbound frame from `worker_id`, or `None` once the
    /// worker's channel is closed. The Controller runs one of these loops
    /// per deployed actor (spec.md §4.6, §5: "Each deployed Actor has its
    /// own inbound-message reader task").
    async fn recv(&self, worker_id: &str) -> Option<WorkerOutbound>;

    /// Test/production ingress point: delivers a frame as if `worker_id`
    /// had sent it. A real transport's single wire-reading loop
    /// (spec.md §4.2 `StartReceiver`) would call this once per frame after
    /// parsing; our in-memory transport lets callers (tests, or a future
    /// wire adapter) call it directly.
    async fn deliver_from_worker(&self, worker_id: &str, msg: WorkerOutbound) -> anyhow::Result<()>;
}

struct WorkerChannel {
    to_worker: mpsc::UnboundedSender<WorkerInbound>,
    from_worker_tx: mpsc::Sender<WorkerOutbound>,
    /// Flips once the worker's `Ready` frame has been observed (spec.md
    /// §4.2: "until then, Send may be queued but not serviced").
    attached: bool,
    /// Messages sent before `Ready`, flushed in order once it arrives.
    pending: VecDeque<WorkerInbound>,
}

/// In-process, channel-backed [`WorkerTransport`].
pub struct ChannelWorkerTransport {
    workers: Mutex<HashMap<String, WorkerChannel>>,
    // Owned receivers are handed out exactly once via `recv`'s first call;
    // kept behind a second map so `register_worker` can run independently
    // of whoever eventually calls `recv`.
    from_worker_rx: Mutex<HashMap<String, mpsc::Receiver<WorkerOutbound>>>,
    to_worker_rx: Mutex<HashMap<String, mpsc::UnboundedReceiver<WorkerInbound>>>,
}

impl ChannelWorkerTransport {
    pub fn new() -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
            from_worker_rx: Mutex::new(HashMap::new()),
            to_worker_rx: Mutex::new(HashMap::new()),
        }
    }

    /// Test/demo hook: takes ownership of the receiving end of the
    /// messages sent *to* a worker, so a simulated worker can answer them.
    pub fn take_inbound(&self, worker_id: &str) -> Option<mpsc::UnboundedReceiver<WorkerInbound>> {
        self.to_worker_rx.lock().unwrap().remove(worker_id)
    }
}

impl Default for ChannelWorkerTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerTransport for ChannelWorkerTransport {
    fn register_worker(&self, worker_id: &str) -> anyhow::Result<()> {
        let mut workers = self.workers.lock().unwrap();
        if workers.contains_key(worker_id) {
            anyhow::bail!(ErrorMetadata::already_exists(format!(
                "worker {worker_id} is already registered"
            )));
        }
        let (to_worker, to_worker_rx) = mpsc::unbounded_channel();
        let (from_worker_tx, from_worker_rx) = mpsc::channel(INBOUND_BUFFER_DEPTH);
        workers.insert(
            worker_id.to_string(),
            WorkerChannel {
                to_worker,
                from_worker_tx,
                attached: false,
                pending: VecDeque::new(),
            },
        );
        self.to_worker_rx
            .lock()
            .unwrap()
            .insert(worker_id.to_string(), to_worker_rx);
        self.from_worker_rx
            .lock()
            .unwrap()
            .insert(worker_id.to_string(), from_worker_rx);
        Ok(())
    }

    fn send(&self, worker_id: &str, msg: WorkerInbound) -> anyhow::Result<()> {
        let mut workers = self.workers.lock().unwrap();
        let channel = workers
            .get_mut(worker_id)
            .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::not_found(format!("unknown worker {worker_id}"))))?;
        // spec.md §4.2: before `Ready`, Send may be queued but not
        // serviced -- hold the frame rather than pushing it to the
        // worker's channel.
        if !channel.attached {
            channel.pending.push_back(msg);
            return Ok(());
        }
        channel
            .to_worker
            .send(msg)
            .map_err(|_| anyhow::anyhow!(ErrorMetadata::internal(format!("worker {worker_id} receiver dropped"))))
    }

    async fn recv(&self, worker_id: &str) -> Option<WorkerOutbound> {
        let rx = self.from_worker_rx.lock().unwrap().remove(worker_id);
        let mut rx = rx?;
        let result = rx.recv().await;
        self.from_worker_rx
            .lock()
            .unwrap()
            .insert(worker_id.to_string(), rx);
        result
    }

    async fn deliver_from_worker(&self, worker_id: &str, msg: WorkerOutbound) -> anyhow::Result<()> {
        let sender = {
            let mut workers = self.workers.lock().unwrap();
            let channel = workers
                .get_mut(worker_id)
                .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::not_found(format!("unknown worker {worker_id}"))))?;
            // spec.md §4.2: `Ready` marks the worker attached and releases
            // anything queued by `send` beforehand, in order.
            if matches!(msg, WorkerOutbound::Ready) && !channel.attached {
                channel.attached = true;
                for queued in channel.pending.drain(..) {
                    channel.to_worker.send(queued).map_err(|_| {
                        anyhow::anyhow!(ErrorMetadata::internal(format!("worker {worker_id} receiver dropped")))
                    })?;
                }
            }
            channel.from_worker_tx.clone()
        };
        // Blocks if the bounded buffer is full -- this is the backpressure
        // spec.md §4.2 requires ("excess blocks the receiver").
        sender
            .send(msg)
            .await
            .map_err(|_| anyhow::anyhow!(ErrorMetadata::internal(format!("worker {worker_id} reader dropped"))))
    }
}
