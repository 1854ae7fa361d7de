pub mod ids;
pub mod model;
pub mod wire;

pub use model::{ActorInfo, EncodedObject, Language, Object, ObjectRef, Resources, StreamChunk};
pub use wire::{
    ArgValue, ClientCommand, ClientFrame, InvokeArg, InvokeOutcome, ServerCommand, ServerFrame,
    WorkerInbound, WorkerOutbound,
};
