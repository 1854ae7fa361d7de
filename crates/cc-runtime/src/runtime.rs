//! Runtime (spec.md §4.5, C5): per-invocation state machine, created on
//! first `AddArg`/`Invoke` for a `(function, session, instance)` triple and
//! destroyed on `Complete`.
//!
//! Mirrors `sync::state::SyncState` in shape: a plain struct mutated
//! directly by its single owner (the Controller's owning task), not a
//! task of its own -- there is exactly one writer, so there is nothing to
//! hand a channel to.

use std::{
    collections::{HashSet, VecDeque},
    time::Instant,
};

use cc_errors::ErrorMetadata;
use cc_pool::Actor;
use cc_proto::ObjectRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Collecting,
    Ready,
    Dispatched,
}

/// `Runtime` (spec.md §3, §4.5).
pub struct Runtime {
    pub runtime_id: String,
    pub function_name: String,
    pub session_id: String,
    pub instance_id: String,
    actor: Option<Actor>,
    params: Vec<String>,
    deps: HashSet<String>,
    args: Vec<(String, ObjectRef)>,
    state: RuntimeState,
    invoke_time: Option<Instant>,
    /// Set when `Invoke()` was requested before the Ready condition held
    /// (spec.md §8 S3); the Controller checks this after every `AddArg`
    /// that flips the runtime to Ready so it can dispatch without the
    /// caller blocking on a condition variable.
    invoke_requested: bool,
}

impl Runtime {
    /// Creation captures one Actor via `pool.Select()`, which the caller
    /// (the Function Node) performs before constructing this value -- it
    /// may block if the pool is empty (spec.md §4.5).
    pub fn new(
        runtime_id: impl Into<String>,
        function_name: impl Into<String>,
        session_id: impl Into<String>,
        instance_id: impl Into<String>,
        params: Vec<String>,
        actor: Option<Actor>,
    ) -> Self {
        let deps: HashSet<String> = params.iter().cloned().collect();
        let state = if deps.is_empty() {
            RuntimeState::Ready
        } else {
            RuntimeState::Collecting
        };
        Self {
            runtime_id: runtime_id.into(),
            function_name: function_name.into(),
            session_id: session_id.into(),
            instance_id: instance_id.into(),
            actor,
            params,
            deps,
            args: Vec::new(),
            state,
            invoke_time: None,
            invoke_requested: false,
        }
    }

    pub fn request_invoke(&mut self) {
        self.invoke_requested = true;
    }

    pub fn take_invoke_requested(&mut self) -> bool {
        std::mem::take(&mut self.invoke_requested)
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, RuntimeState::Ready)
    }

    pub fn bound_worker_id(&self) -> Option<&str> {
        self.actor.as_ref().map(|a| a.worker_id.as_str())
    }

    /// `AddArg(param, ref)` (spec.md §4.5 table): records the value and,
    /// while still `Collecting`, clears the dependency; extra args past
    /// the declared set are still recorded (P6: extras allowed once
    /// Ready, "delivered as-is").
    pub fn add_arg(&mut self, param: impl Into<String>, value: ObjectRef) {
        let param = param.into();
        if self.state == RuntimeState::Collecting {
            self.deps.remove(&param);
        }
        if let Some(slot) = self.args.iter_mut().find(|(p, _)| p == &param) {
            slot.1 = value;
        } else {
            self.args.push((param, value));
        }
        if self.state == RuntimeState::Collecting && self.deps.is_empty() {
            self.state = RuntimeState::Ready;
        }
    }

    /// `Invoke()` (spec.md §4.5): assembles the argument list in declared
    /// parameter order, appending extras in the order they were recorded
    /// (P6), and emits one `InvokeRequest`. Callers must check
    /// [`Runtime::is_ready`] first -- the condition-variable wait from the
    /// source is modeled here by the Controller not calling `invoke` until
    /// `Ready`, rather than by blocking inside this method.
    pub fn invoke(&mut self) -> anyhow::Result<Vec<(String, ObjectRef)>> {
        anyhow::ensure!(
            self.is_ready(),
            ErrorMetadata::protocol_violation(format!(
                "runtime {} invoked before all declared parameters arrived",
                self.runtime_id
            ))
        );
        let Some(_actor) = self.actor.as_ref() else {
            anyhow::bail!(ErrorMetadata::no_actor());
        };

        let mut ordered = Vec::with_capacity(self.args.len());
        let mut remaining: VecDeque<(String, ObjectRef)> = self.args.clone().into();
        for param in &self.params {
            if let Some(pos) = remaining.iter().position(|(p, _)| p == param) {
                ordered.push(remaining.remove(pos).unwrap());
            }
        }
        ordered.extend(remaining);

        self.invoke_time = Some(Instant::now());
        self.state = RuntimeState::Dispatched;
        Ok(ordered)
    }

    /// `Complete(actor_info)` (spec.md §4.5): updates the bound actor's
    /// latency by moving average and hands it back to the caller, who is
    /// responsible for returning it to the pool. Integer division
    /// truncation is preserved to stay compatible with P8.
    pub fn complete(&mut self, calc_latency_ms: u64) -> Option<Actor> {
        let mut actor = self.actor.take()?;
        let total_ms = self
            .invoke_time
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(calc_latency_ms);
        let link_ms = total_ms.saturating_sub(calc_latency_ms);
        if actor.latency.calc_latency_ms == 0 {
            actor.latency.calc_latency_ms = calc_latency_ms;
            actor.latency.link_latency_ms = link_ms;
        } else {
            actor.latency.calc_latency_ms = (actor.latency.calc_latency_ms + calc_latency_ms) / 2;
            actor.latency.link_latency_ms = (actor.latency.link_latency_ms + link_ms) / 2;
        }
        Some(actor)
    }
}
