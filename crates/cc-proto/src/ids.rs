//! Id minting for the core's content-addressed identifiers.
//!
//! The spec fixes the *shape* of ids (`obj.<22-char-base57>`,
//! `store.<...>`, `comp-<rand>`, `name::session::instance`) but leaves the
//! generator unspecified (spec.md §6, §9 open questions). We mint the
//! random suffix the way the teacher mints document ids: a fixed alphabet
//! sampled uniformly with `rand`, kept in one place so the scheme is
//! trivially swappable.

use rand::Rng;

/// Lowercase alphanumeric alphabet, 36 symbols — "base57" in the spec's own
/// words is a rough description of the source system's alphabet; any
/// collision-resistant alphabet satisfies the contract, so we use one that
/// is trivial to type in tests and logs.
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn random_suffix(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}

pub fn new_object_id() -> String {
    format!("obj.{}", random_suffix(22))
}

pub fn new_store_id() -> String {
    format!("store.{}", random_suffix(16))
}

pub fn new_component_id() -> String {
    format!("comp-{}", random_suffix(12))
}

pub const RUNTIME_ID_SEP: &str = "::";

/// `name::session::instance`, per spec.md §3 and §6.
pub fn runtime_id(function_name: &str, session_id: &str, instance_id: &str) -> String {
    format!("{function_name}{RUNTIME_ID_SEP}{session_id}{RUNTIME_ID_SEP}{instance_id}")
}

/// Splits a runtime id back into its three parts, as `HandleWorker` does
/// when a worker's `InvokeResponse.session_id` echoes it back (spec.md
/// §4.6).
pub fn split_runtime_id(runtime_id: &str) -> anyhow::Result<(&str, &str, &str)> {
    let mut parts = runtime_id.splitn(3, RUNTIME_ID_SEP);
    let (Some(name), Some(session), Some(instance)) = (parts.next(), parts.next(), parts.next())
    else {
        anyhow::bail!("malformed runtime id: {runtime_id:?}");
    };
    Ok((name, session, instance))
}
