use std::sync::LazyLock;

use prometheus::{register_int_gauge_vec, IntGaugeVec};

/// Actors currently idle in a pool, labeled by function name. Mirrors the
/// teacher's practice of a per-crate `metrics.rs` exposing a handful of
/// directly-relevant gauges (see `sync::metrics::connect_timer` and
/// friends) rather than a generic catch-all.
pub static POOL_DEPTH: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "cc_pool_idle_actors",
        "Actors currently idle (not bound to a runtime) in a pool",
        &["function"]
    )
    .expect("metric registration")
});
