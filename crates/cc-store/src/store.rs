//! The object store (spec.md §4.1): a process-wide in-memory container
//! mutated by a single owning task, mirroring
//! `database::subscription::SubscriptionsWorker`/`SubscriptionsClient` --
//! a cheap `Clone`-able handle sends commands over an `mpsc::Sender`, and
//! the worker task resolves blocked readers with `oneshot` replies instead
//! of a raw mutex + condition variable. This gives the same "single mutex,
//! broadcast on save" semantics spec.md §5 describes, rendered in the
//! async idiom the rest of the corpus uses for owned mutable state.

use std::{
    collections::HashMap,
    time::Duration,
};

use cc_errors::ErrorMetadata;
use cc_proto::{ids, Object, ObjectRef, StreamChunk};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::metrics;

/// Default deadline for a blocking `GetObject` when the caller doesn't
/// supply one (spec.md §4.1, §5).
pub const DEFAULT_GET_DEADLINE: Duration = Duration::from_secs(30);

enum StoreCommand {
    SaveObject {
        object: Object,
        reply: oneshot::Sender<anyhow::Result<ObjectRef>>,
    },
    GetObject {
        id: String,
        reply: oneshot::Sender<Object>,
    },
    SaveStreamChunk {
        chunk: StreamChunk,
        reply: oneshot::Sender<anyhow::Result<()>>,
    },
    GetStreamChunk {
        object_id: String,
        offset: u64,
        reply: oneshot::Sender<StreamChunk>,
    },
}

/// A cheap, `Clone`-able handle to a running [`StoreWorker`]. This is what
/// the rest of the core holds as "the Store".
#[derive(Clone)]
pub struct Store {
    store_id: String,
    tx: mpsc::UnboundedSender<StoreCommand>,
}

impl Store {
    /// Spawns the owning task and returns a handle to it. The store's id is
    /// embedded in every `ObjectRef` it issues (spec.md §3 "Store").
    pub fn spawn() -> Self {
        let store_id = ids::new_store_id();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(StoreWorker::new().run(rx));
        Store { store_id, tx }
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    /// `SaveObject(obj) -> ObjectRef` (spec.md §4.1). Fails synchronously if
    /// `obj.id` is empty; a newer save with the same id overwrites the
    /// older one.
    pub async fn save_object(&self, object: Object) -> anyhow::Result<ObjectRef> {
        if object.id.is_empty() {
            anyhow::bail!(ErrorMetadata::protocol_violation(
                "SaveObject requires a non-empty object id"
            ));
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::SaveObject {
                object,
                reply: reply_tx,
            })
            .map_err(|_| anyhow::anyhow!(ErrorMetadata::internal("store worker is gone")))?;
        let mut object_ref = reply_rx
            .await
            .map_err(|_| anyhow::anyhow!(ErrorMetadata::internal("store worker is gone")))??;
        object_ref.source = self.store_id.clone();
        Ok(object_ref)
    }

    /// `GetObject(id, deadline) -> Object | NotFound | Canceled`
    /// (spec.md §4.1). Returns immediately if present; otherwise blocks
    /// until saved, `deadline` elapses, or `cancel` fires.
    pub async fn get_object(
        &self,
        id: impl Into<String>,
        deadline: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> anyhow::Result<Object> {
        let id = id.into();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::GetObject { id: id.clone(), reply: reply_tx })
            .map_err(|_| anyhow::anyhow!(ErrorMetadata::internal("store worker is gone")))?;

        let deadline = deadline.unwrap_or(DEFAULT_GET_DEADLINE);
        let cancel_fut = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            result = reply_rx => {
                result.map_err(|_| anyhow::anyhow!(ErrorMetadata::internal("store worker is gone")))
            }
            _ = tokio::time::sleep(deadline) => {
                Err(anyhow::anyhow!(ErrorMetadata::deadline_exceeded(format!(
                    "GetObject({id}) timed out after {deadline:?}"
                ))))
            }
            _ = cancel_fut => {
                Err(anyhow::anyhow!(ErrorMetadata::canceled(format!(
                    "GetObject({id}) canceled"
                ))))
            }
        }
    }

    /// `SaveStreamChunk(chunk)` (spec.md §4.1). Fails if `object_id` is
    /// empty.
    pub async fn save_stream_chunk(&self, chunk: StreamChunk) -> anyhow::Result<()> {
        if chunk.object_id.is_empty() {
            anyhow::bail!(ErrorMetadata::protocol_violation(
                "SaveStreamChunk requires a non-empty object_id"
            ));
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::SaveStreamChunk {
                chunk,
                reply: reply_tx,
            })
            .map_err(|_| anyhow::anyhow!(ErrorMetadata::internal("store worker is gone")))?;
        reply_rx
            .await
            .map_err(|_| anyhow::anyhow!(ErrorMetadata::internal("store worker is gone")))?
    }

    /// `GetStreamChunk(object_id, offset) -> Chunk` (spec.md §4.1). Blocks
    /// until the chunk at that exact offset exists; no default deadline --
    /// the caller is expected to propagate its own cancellation.
    pub async fn get_stream_chunk(
        &self,
        object_id: impl Into<String>,
        offset: u64,
        cancel: Option<&CancellationToken>,
    ) -> anyhow::Result<StreamChunk> {
        let object_id = object_id.into();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::GetStreamChunk {
                object_id: object_id.clone(),
                offset,
                reply: reply_tx,
            })
            .map_err(|_| anyhow::anyhow!(ErrorMetadata::internal("store worker is gone")))?;

        let cancel_fut = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            result = reply_rx => {
                result.map_err(|_| anyhow::anyhow!(ErrorMetadata::internal("store worker is gone")))
            }
            _ = cancel_fut => {
                Err(anyhow::anyhow!(ErrorMetadata::canceled(format!(
                    "GetStreamChunk({object_id}, {offset}) canceled"
                ))))
            }
        }
    }
}

struct StoreWorker {
    objects: HashMap<String, Object>,
    stream_chunks: HashMap<(String, u64), StreamChunk>,
    object_waiters: HashMap<String, Vec<oneshot::Sender<Object>>>,
    chunk_waiters: HashMap<(String, u64), Vec<oneshot::Sender<StreamChunk>>>,
}

impl StoreWorker {
    fn new() -> Self {
        Self {
            objects: HashMap::new(),
            stream_chunks: HashMap::new(),
            object_waiters: HashMap::new(),
            chunk_waiters: HashMap::new(),
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<StoreCommand>) {
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        tracing::debug!("store worker shutting down, no more handles live");
    }

    fn handle(&mut self, command: StoreCommand) {
        match command {
            StoreCommand::SaveObject { object, reply } => {
                let result = self.save_object(object);
                let _ = reply.send(result);
            },
            StoreCommand::GetObject { id, reply } => self.get_object(id, reply),
            StoreCommand::SaveStreamChunk { chunk, reply } => {
                let result = self.save_stream_chunk(chunk);
                let _ = reply.send(result);
            },
            StoreCommand::GetStreamChunk {
                object_id,
                offset,
                reply,
            } => self.get_stream_chunk(object_id, offset, reply),
        }
        metrics::OBJECTS_RESIDENT.set(self.objects.len() as i64);
        metrics::PENDING_GETS.set(
            (self.object_waiters.values().map(Vec::len).sum::<usize>()
                + self.chunk_waiters.values().map(Vec::len).sum::<usize>()) as i64,
        );
    }

    fn save_object(&mut self, object: Object) -> anyhow::Result<ObjectRef> {
        let id = object.id.clone();
        metrics::OBJECTS_SAVED.inc();
        // Newer overwrites older (spec.md §4.1); the store doesn't
        // distinguish "insert" from "overwrite" for waiter wakeup purposes.
        self.objects.insert(id.clone(), object);
        if let Some(waiters) = self.object_waiters.remove(&id) {
            let saved = self.objects.get(&id).cloned().expect("just inserted");
            for waiter in waiters {
                let _ = waiter.send(saved.clone());
            }
        }
        // store_id is not known to the worker itself -- callers stamp it on
        // the way out, since it's a property of the `Store` handle, not the
        // per-object record.
        Ok(ObjectRef {
            id,
            source: String::new(),
        })
    }

    fn get_object(&mut self, id: String, reply: oneshot::Sender<Object>) {
        if let Some(object) = self.objects.get(&id) {
            let _ = reply.send(object.clone());
            return;
        }
        self.object_waiters.entry(id).or_default().push(reply);
    }

    fn save_stream_chunk(&mut self, chunk: StreamChunk) -> anyhow::Result<()> {
        metrics::STREAM_CHUNKS_SAVED.inc();
        let key = (chunk.object_id.clone(), chunk.offset);
        self.stream_chunks.insert(key.clone(), chunk.clone());
        if let Some(waiters) = self.chunk_waiters.remove(&key) {
            for waiter in waiters {
                let _ = waiter.send(chunk.clone());
            }
        }
        Ok(())
    }

    fn get_stream_chunk(
        &mut self,
        object_id: String,
        offset: u64,
        reply: oneshot::Sender<StreamChunk>,
    ) {
        let key = (object_id, offset);
        if let Some(chunk) = self.stream_chunks.get(&key) {
            let _ = reply.send(chunk.clone());
            return;
        }
        self.chunk_waiters.entry(key).or_default().push(reply);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cc_proto::Language;

    use super::*;

    fn obj(id: &str, data: &[u8]) -> Object {
        Object {
            id: id.to_string(),
            language: Language::Json,
            data: data.to_vec(),
        }
    }

    #[tokio::test]
    async fn save_then_get_returns_immediately() {
        let store = Store::spawn();
        store.save_object(obj("obj.k", b"[1]")).await.unwrap();
        let got = store.get_object("obj.k", None, None).await.unwrap();
        assert_eq!(got.data, b"[1]");
    }

    // P4: a blocking Get started before the Save is unblocked and returns
    // the saved object.
    #[tokio::test]
    async fn get_before_save_unblocks_on_save() {
        let store = Store::spawn();
        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.get_object("obj.k", None, None).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.save_object(obj("obj.k", b"[2]")).await.unwrap();
        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got.data, b"[2]");
    }

    // S4: two concurrent Gets with no saver both time out past the
    // deadline.
    #[tokio::test(start_paused = true)]
    async fn get_times_out_without_a_save() {
        let store = Store::spawn();
        let deadline = Duration::from_millis(50);
        let a = store.get_object("obj.missing", Some(deadline), None);
        let b = store.get_object("obj.missing", Some(deadline), None);
        let (a, b) = tokio::join!(a, b);
        assert!(a.is_err());
        assert!(b.is_err());
    }

    #[tokio::test]
    async fn save_object_rejects_empty_id() {
        let store = Store::spawn();
        let err = store
            .save_object(obj("", b"x"))
            .await
            .expect_err("empty id must fail synchronously");
        assert!(err.to_string().contains("non-empty"));
    }

    #[tokio::test]
    async fn save_stream_chunk_rejects_empty_object_id() {
        let store = Store::spawn();
        let chunk = StreamChunk {
            object_id: String::new(),
            offset: 0,
            data: vec![1],
            terminal: false,
        };
        assert!(store.save_stream_chunk(chunk).await.is_err());
    }

    // P5: stream chunk addressability.
    #[tokio::test]
    async fn stream_chunk_addressed_by_exact_offset() {
        let store = Store::spawn();
        let chunk = StreamChunk {
            object_id: "obj.s".to_string(),
            offset: 4,
            data: vec![9, 9],
            terminal: false,
        };
        store.save_stream_chunk(chunk.clone()).await.unwrap();
        let got = store.get_stream_chunk("obj.s", 4, None).await.unwrap();
        assert_eq!(got.data, chunk.data);
    }

    #[tokio::test]
    async fn get_stream_chunk_blocks_on_other_offsets() {
        let store = Store::spawn();
        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.get_stream_chunk("obj.s", 8, None).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        store
            .save_stream_chunk(StreamChunk {
                object_id: "obj.s".to_string(),
                offset: 8,
                data: vec![1],
                terminal: true,
            })
            .await
            .unwrap();
        let got = waiter.await.unwrap().unwrap();
        assert!(got.terminal);
    }
}
