//! Client <-> Controller wire protocol (spec.md §6) and the Worker
//! Transport payloads exchanged between a Controller and a deployed worker.
//!
//! Frames are tagged, internally-adjacent enums, serialized as JSON text —
//! the same shape `local_backend::subs` parses `ClientMessage` as off a
//! WebSocket text frame.

use serde::{Deserialize, Serialize};

use crate::model::{EncodedObject, Language, ObjectRef, Resources};

/// One request/response value: either a materialized reference or an
/// inlined payload (spec.md §6 `value: oneof`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgValue {
    Ref(ObjectRef),
    Encoded(EncodedObject),
}

/// The outcome of an invocation: a value or an error string
/// (spec.md §6 `ReturnResult.result: oneof`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvokeOutcome {
    Value(ObjectRef),
    Error(String),
}

/// Every frame a client sends carries a non-empty `app_id` alongside one
/// command (spec.md §6). Frames flowing client -> server use
/// [`ClientCommand`]; frames flowing server -> client use [`ServerCommand`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    pub app_id: String,
    pub command: ClientCommand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerFrame {
    pub command: ServerCommand,
}

impl ServerFrame {
    pub fn new(command: ServerCommand) -> Self {
        Self { command }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    AppendData {
        session_id: String,
        object: EncodedObject,
    },
    AppendPyFunc {
        name: String,
        params: Vec<String>,
        requirements: Vec<String>,
        pickled_object: Vec<u8>,
        language: Language,
        replicas: u32,
        resources: Resources,
    },
    /// Reserved, unused (spec.md §6, §9 open question): acknowledged as a
    /// no-op, no scheduling semantics implemented.
    AppendPyClass { name: String },
    AppendArg {
        session_id: String,
        instance_id: String,
        name: String,
        param: String,
        value: ArgValue,
    },
    /// Reserved, unused: see `AppendPyClass`.
    AppendClassMethodArg { name: String },
    Invoke {
        session_id: String,
        instance_id: String,
        name: String,
    },
    /// Present in the protocol but not implemented in the core paths
    /// (spec.md §9 open question): acknowledged as a no-op.
    MarkDAGNodeDone {
        node_id: String,
        session_id: String,
    },
    RequestObject {
        id: String,
        source: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerCommand {
    Ack {
        error: Option<String>,
    },
    Ready,
    ReturnResult {
        session_id: String,
        instance_id: String,
        name: String,
        result: InvokeOutcome,
    },
    ResponseObject {
        id: String,
        value: Option<EncodedObject>,
        error: Option<String>,
    },
}

impl ServerCommand {
    pub fn ack_ok() -> Self {
        ServerCommand::Ack { error: None }
    }

    pub fn ack_err(msg: impl Into<String>) -> Self {
        ServerCommand::Ack {
            error: Some(msg.into()),
        }
    }

    pub fn return_result(
        session_id: impl Into<String>,
        instance_id: impl Into<String>,
        name: impl Into<String>,
        result: InvokeOutcome,
    ) -> Self {
        ServerCommand::ReturnResult {
            session_id: session_id.into(),
            instance_id: instance_id.into(),
            name: name.into(),
            result,
        }
    }
}

/// Worker Transport payloads (spec.md §6): pushed to a deployed Actor on
/// deploy, then one `InvokeRequest` per call; the worker answers with
/// `InvokeResponse` and a one-time `Ready` at attach.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerInbound {
    /// Function-code upload, sent once per actor right after deploy.
    Function {
        name: String,
        params: Vec<String>,
        requirements: Vec<String>,
        pickled_object: Vec<u8>,
        language: Language,
    },
    InvokeRequest {
        runtime_id: String,
        args: Vec<InvokeArg>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeArg {
    pub param: String,
    pub value: ObjectRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerOutbound {
    Ready,
    InvokeResponse {
        /// Echoes the runtime id the request was addressed to
        /// (`session_id` in spec.md's wording, spec.md §4.6).
        session_id: String,
        result: Option<ObjectRef>,
        actor_info: crate::model::ActorInfo,
        error: Option<String>,
    },
}
