//! Process-level bootstrap flags (SPEC_FULL.md §6: ambient CLI bootstrap).
//! Deliberately minimal -- a bind address and a log filter, nothing
//! resembling the YAML/admin configuration layer spec.md's Non-goals
//! exclude.

use std::net::SocketAddr;

use clap::Parser;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "Compute-control core server")]
pub struct ServerConfig {
    /// Address the WebSocket front door binds to.
    #[clap(long, default_value = "127.0.0.1:8787")]
    pub bind: SocketAddr,

    /// `tracing-subscriber` env-filter directive, e.g. "info" or "cc_controller=debug".
    #[clap(long, default_value = "info")]
    pub log: String,

    /// Application id pre-registered at startup so a client can attach
    /// immediately without a separate admin call (demo convenience; see
    /// `demo` module).
    #[clap(long, default_value = "demo")]
    pub demo_app_id: String,
}
