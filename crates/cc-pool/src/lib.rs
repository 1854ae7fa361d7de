mod metrics;
pub mod pool;

pub use pool::{Actor, ActorPool, Latency};
