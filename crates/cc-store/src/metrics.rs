//! A handful of prometheus gauges/counters for the object store, in the
//! spirit of the teacher's per-crate `metrics.rs` files (e.g.
//! `sync::metrics`) but registered directly against the `prometheus` crate
//! rather than through an internal macro-generating wrapper (see
//! DESIGN.md for why).

use std::sync::LazyLock;

use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

pub static OBJECTS_SAVED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("cc_store_objects_saved_total", "Objects saved into the store")
        .expect("metric registration")
});

pub static STREAM_CHUNKS_SAVED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "cc_store_stream_chunks_saved_total",
        "Stream chunks saved into the store"
    )
    .expect("metric registration")
});

pub static OBJECTS_RESIDENT: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("cc_store_objects_resident", "Objects currently held in the store")
        .expect("metric registration")
});

pub static PENDING_GETS: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "cc_store_pending_gets",
        "GetObject/GetStreamChunk calls currently blocked"
    )
    .expect("metric registration")
});
