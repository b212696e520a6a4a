//! Error taxonomy shared across Rekindle crates.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RekindleError>;

/// Outcome of a single send attempt against the messaging channel.
pub type SendResult = std::result::Result<(), SendError>;

#[derive(Debug, Error)]
pub enum RekindleError {
    /// Missing or invalid configuration. Fatal at startup; the process
    /// must not begin scheduling.
    #[error("config error: {0}")]
    Config(String),

    /// Persistence layer failure. Aborts the current stage batch; the
    /// scheduler loop continues on the next tick.
    #[error("store error: {0}")]
    Store(String),

    /// Messaging channel plumbing failure (polling, bot identity).
    #[error("channel error: {0}")]
    Channel(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why a single send attempt failed.
#[derive(Debug, Error)]
pub enum SendError {
    /// The recipient closed the conduit for good. Terminal: the record is
    /// blocked and never contacted again.
    #[error("recipient unreachable")]
    Unreachable,

    /// Network, timeout, or rate-limit trouble. The record is left
    /// untouched and retried on a later tick.
    #[error("transient send failure: {0}")]
    Transient(String),
}
