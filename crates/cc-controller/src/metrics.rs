//! A handful of prometheus counters for the Controller, in the same spirit
//! as `cc-store`/`cc-pool`'s `metrics.rs` -- registered directly against
//! `prometheus` rather than through an internal macro-generating wrapper
//! (see DESIGN.md).

use std::sync::LazyLock;

use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

pub static FUNCTIONS_DEPLOYED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("cc_controller_functions_deployed_total", "AppendPyFunc calls that succeeded")
        .expect("metric registration")
});

pub static INVOCATIONS_DISPATCHED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("cc_controller_invocations_dispatched_total", "InvokeRequests sent to a worker")
        .expect("metric registration")
});

pub static INVOCATIONS_COMPLETED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "cc_controller_invocations_completed_total",
        "Invocations that reached a terminal ReturnResult, labeled by outcome",
        &["outcome"]
    )
    .expect("metric registration")
});
