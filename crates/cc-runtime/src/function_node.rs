//! Function Node (spec.md §3, §4.5, C6): factory for Runtimes, one per
//! deployed function. Created by `AppendPyFunc`; persists for the
//! Controller's lifetime.

use std::collections::HashMap;

use cc_pool::ActorPool;
use cc_proto::ids::runtime_id;
use tracing::warn;

use crate::runtime::Runtime;

/// `Function Node` (spec.md §3): unique function name within a Controller,
/// ordered parameter names, and the pool of replicas deployed for it.
pub struct FunctionNode {
    pub name: String,
    pub params: Vec<String>,
    pub requirements: Vec<String>,
    pub language: cc_proto::Language,
    pub pool: ActorPool,
    runtimes: HashMap<String, Runtime>,
}

impl FunctionNode {
    pub fn new(
        name: impl Into<String>,
        params: Vec<String>,
        requirements: Vec<String>,
        language: cc_proto::Language,
        pool: ActorPool,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            requirements,
            language,
            pool,
            runtimes: HashMap::new(),
        }
    }

    /// `Runtime(session_id, instance_id) -> runtime_id` (spec.md §4.5): at
    /// most one Runtime per `(name, session, instance)` triple. A second
    /// call for the same triple is a `DuplicateRuntime` per the resolved
    /// open question: log and return the existing id, no reassignment.
    ///
    /// Creation captures one Actor via `pool.select()`, which may block if
    /// the pool is empty; the returned future resolves once a runtime
    /// exists, new or old.
    pub async fn runtime(&mut self, session_id: &str, instance_id: &str) -> anyhow::Result<String> {
        let id = runtime_id(&self.name, session_id, instance_id);
        if self.runtimes.contains_key(&id) {
            warn!(runtime_id = %id, "duplicate runtime creation request, returning existing id");
            return Ok(id);
        }
        let actor = self.pool.select().await.ok();
        let rt = Runtime::new(
            id.clone(),
            self.name.clone(),
            session_id,
            instance_id,
            self.params.clone(),
            actor,
        );
        self.runtimes.insert(id.clone(), rt);
        Ok(id)
    }

    pub fn get_mut(&mut self, runtime_id: &str) -> Option<&mut Runtime> {
        self.runtimes.get_mut(runtime_id)
    }

    pub fn contains(&self, runtime_id: &str) -> bool {
        self.runtimes.contains_key(runtime_id)
    }

    /// Removes a completed or failed Runtime (spec.md §4.5 `Completed`
    /// entry: "self-destruct").
    pub fn remove(&mut self, runtime_id: &str) -> Option<Runtime> {
        self.runtimes.remove(runtime_id)
    }

    pub fn runtime_count(&self) -> usize {
        self.runtimes.len()
    }
}
