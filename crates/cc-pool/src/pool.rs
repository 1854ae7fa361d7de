//! Actor Pool (spec.md §4.4, C4): a min-heap of replicated workers for one
//! function, ranked by `score = 2*link_latency + calc_latency` (spec.md
//! §4.4 rationale: the link is traversed both directions, compute once).
//!
//! Implemented as a single owning task reached through a cheap `Clone`
//! handle -- the same shape as [`cc_store::Store`] and grounded on the
//! same `database::subscription` pattern -- rather than a raw mutex +
//! condition variable, so `Select`'s blocking wait is just an `.await` on
//! a oneshot reply.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, VecDeque},
};

use tokio::sync::{mpsc, oneshot};

use crate::metrics;

/// Latency sample for one actor (spec.md §3 "Actor").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Latency {
    pub calc_latency_ms: u64,
    pub link_latency_ms: u64,
}

impl Latency {
    /// `score = 2*link_latency + calc_latency` (spec.md §4.4).
    pub fn score(&self) -> u64 {
        2 * self.link_latency_ms + self.calc_latency_ms
    }
}

/// A replicated worker bound to one function, transiently loaned to a
/// Runtime between `Select` and `Return` (spec.md §3 "Actor").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub worker_id: String,
    pub latency: Latency,
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct ScoredActor(Actor);

impl Ord for ScoredActor {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the lowest score surfaces
        // first, giving us a min-heap by score (spec.md §4.4, §8 P9).
        other.0.latency.score().cmp(&self.0.latency.score())
    }
}

impl PartialOrd for ScoredActor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

enum PoolCommand {
    Push(Actor),
    Select(oneshot::Sender<Actor>),
    Len(oneshot::Sender<usize>),
}

/// A cheap, `Clone`-able handle to one function's actor pool.
#[derive(Clone)]
pub struct ActorPool {
    function_name: String,
    tx: mpsc::UnboundedSender<PoolCommand>,
}

impl ActorPool {
    /// Spawns the owning task, pre-populated with `actors` (spec.md §4.6:
    /// `AppendPyFunc` builds a pool of the deployed replicas).
    pub fn spawn(function_name: impl Into<String>, actors: Vec<Actor>) -> Self {
        let function_name = function_name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = PoolWorker {
            function_name: function_name.clone(),
            heap: actors.into_iter().map(ScoredActor).collect(),
            waiters: VecDeque::new(),
        };
        tokio::spawn(worker.run(rx));
        ActorPool { function_name, tx }
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// `Push(actor)`: inserts into the min-heap and signals one waiter
    /// (spec.md §4.4).
    pub fn push(&self, actor: Actor) {
        let _ = self.tx.send(PoolCommand::Push(actor));
    }

    /// `Select() -> actor`: blocks while empty, then removes and returns
    /// the minimum-score actor (spec.md §4.4, §8 P9).
    pub async fn select(&self) -> anyhow::Result<Actor> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PoolCommand::Select(reply_tx))
            .map_err(|_| anyhow::anyhow!("actor pool worker for {} is gone", self.function_name))?;
        reply_rx
            .await
            .map_err(|_| anyhow::anyhow!("actor pool worker for {} is gone", self.function_name))
    }

    /// Actors currently idle in the pool (not bound to any Runtime).
    pub async fn len(&self) -> anyhow::Result<usize> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PoolCommand::Len(reply_tx))
            .map_err(|_| anyhow::anyhow!("actor pool worker for {} is gone", self.function_name))?;
        reply_rx
            .await
            .map_err(|_| anyhow::anyhow!("actor pool worker for {} is gone", self.function_name))
    }
}

struct PoolWorker {
    function_name: String,
    heap: BinaryHeap<ScoredActor>,
    waiters: VecDeque<oneshot::Sender<Actor>>,
}

impl PoolWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<PoolCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                PoolCommand::Push(actor) => self.push(actor),
                PoolCommand::Select(reply) => self.select(reply),
                PoolCommand::Len(reply) => {
                    let _ = reply.send(self.heap.len());
                },
            }
            metrics::POOL_DEPTH
                .with_label_values(&[self.function_name.as_str()])
                .set(self.heap.len() as i64);
        }
    }

    fn push(&mut self, actor: Actor) {
        self.heap.push(ScoredActor(actor));
        // Spec.md §4.4: Push signals exactly one waiter, not a broadcast
        // like the Store's Save -- drain at most one, always taking the
        // current minimum so a blocked Select still observes P9.
        if let Some(waiter) = self.waiters.pop_front() {
            if let Some(ScoredActor(actor)) = self.heap.pop() {
                if let Err(actor) = waiter.send(actor) {
                    // Receiver went away (e.g. its `select()` future was
                    // dropped); put the actor back rather than lose it.
                    self.heap.push(ScoredActor(actor));
                }
            }
        }
    }

    fn select(&mut self, reply: oneshot::Sender<Actor>) {
        if let Some(ScoredActor(actor)) = self.heap.pop() {
            let _ = reply.send(actor);
            return;
        }
        self.waiters.push_back(reply);
    }
}
