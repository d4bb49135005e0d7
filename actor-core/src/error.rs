//! Error types used across the runtime.
//!
//! Two tiers: a typed [`RuntimeError`] for conditions the core itself
//! needs to match on (invalid worker index, exhausted local-id space,
//! ...), and a catch-all [`AnyError`]/[`AnyResult`] pair for everything
//! else, the same `anyhow`-based convenience the rest of the crate (and
//! `actor-runtime`) leans on for config loading, service `init` failures,
//! and so on.

use thiserror::Error;

/// A type alias for `anyhow::Error`, representing any error type.
pub type AnyError = anyhow::Error;

/// A type alias for `Result<T, E>` where `E` defaults to [`AnyError`].
pub type AnyResult<T, E = AnyError> = std::result::Result<T, E>;

/// Structured errors the core raises and matches on internally.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("worker index {0} is out of range [1, {1}]")]
    InvalidWorker(u32, u8),

    #[error("service type `{0}` was not registered")]
    UnknownServiceType(String),

    #[error("worker {0} has no more local ids available")]
    LocalIdExhausted(u8),

    #[error("service {0:#X} not found")]
    ServiceNotFound(u32),

    #[error("unique name `{0}` is already registered")]
    UniqueNameTaken(String),

    #[error("runtime already has {0} workers, which exceeds the 255 limit")]
    TooManyWorkers(usize),
}
