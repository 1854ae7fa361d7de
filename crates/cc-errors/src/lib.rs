//! Error taxonomy shared across the compute-control core.
//!
//! Every fallible operation in this workspace returns `anyhow::Result<T>`.
//! Call sites that need to classify a failure (to decide whether it
//! terminates a session, gets surfaced to the client as a `ReturnResult`
//! error, or is purely operational) attach an [`ErrorMetadata`] to the
//! error chain with `.context(...)` and recover it later with
//! [`ErrorMetadataExt::error_metadata`].

use std::borrow::Cow;

/// Coarse classification of a failure, matching the taxonomy in the core
/// specification (kinds, not concrete Rust types).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ProtocolViolation,
    SessionAlreadyActive,
    ControllerNotFound,
    NoCapacity,
    NotFound,
    Deadline,
    Canceled,
    WorkerError,
    NoActor,
    DuplicateRuntime,
    AlreadyExists,
    Internal,
}

/// Structured error information attached to an `anyhow::Error` chain.
///
/// `short_msg` is a stable, ScreamingCamelCase tag usable in tests and
/// metrics; `msg` is the human-readable, developer-facing description that
/// may be forwarded to a client inside a `ReturnResult`/`ResponseObject`
/// error field.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{msg}")]
pub struct ErrorMetadata {
    pub code: ErrorCode,
    pub short_msg: Cow<'static, str>,
    pub msg: Cow<'static, str>,
}

impl ErrorMetadata {
    fn new(
        code: ErrorCode,
        short_msg: impl Into<Cow<'static, str>>,
        msg: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code,
            short_msg: short_msg.into(),
            msg: msg.into(),
        }
    }

    pub fn protocol_violation(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::ProtocolViolation, "ProtocolViolation", msg)
    }

    pub fn session_already_active() -> Self {
        Self::new(
            ErrorCode::SessionAlreadyActive,
            "SessionAlreadyActive",
            "a session is already bound to this application",
        )
    }

    pub fn controller_not_found(app_id: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::ControllerNotFound,
            "ControllerNotFound",
            format!("no controller registered for application {app_id}"),
        )
    }

    pub fn no_capacity(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::NoCapacity, "NoCapacity", msg)
    }

    pub fn not_found(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::NotFound, "NotFound", msg)
    }

    pub fn deadline_exceeded(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::Deadline, "Deadline", msg)
    }

    pub fn canceled(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::Canceled, "Canceled", msg)
    }

    pub fn worker_error(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::WorkerError, "WorkerError", msg)
    }

    pub fn no_actor() -> Self {
        Self::new(
            ErrorCode::NoActor,
            "NoActor",
            "runtime has no actor bound at invoke time",
        )
    }

    pub fn already_exists(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::AlreadyExists, "AlreadyExists", msg)
    }

    pub fn internal(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::Internal, "InternalError", msg)
    }

    /// Whether this error is appropriate to forward verbatim to a client
    /// (as opposed to being collapsed into a generic internal error).
    pub fn is_client_facing(&self) -> bool {
        !matches!(self.code, ErrorCode::Internal)
    }
}

/// Extension trait for pulling an [`ErrorMetadata`] back out of an
/// `anyhow::Error` chain, mirroring how the core attaches it with
/// `.context(...)`.
pub trait ErrorMetadataExt {
    fn error_metadata(&self) -> Option<&ErrorMetadata>;
    fn code(&self) -> ErrorCode {
        self.error_metadata()
            .map(|m| m.code)
            .unwrap_or(ErrorCode::Internal)
    }
}

impl ErrorMetadataExt for anyhow::Error {
    fn error_metadata(&self) -> Option<&ErrorMetadata> {
        self.chain().find_map(|cause| cause.downcast_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcasts_through_context_chain() {
        let base = anyhow::anyhow!("save failed").context(ErrorMetadata::not_found(
            "object obj.missing was not saved before the deadline",
        ));
        let wrapped = base.context("while handling RequestObject");
        assert_eq!(wrapped.code(), ErrorCode::NotFound);
    }

    #[test]
    fn defaults_to_internal_without_metadata() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(err.code(), ErrorCode::Internal);
    }
}
