//! Error kinds for the session protocol engine.

use thiserror::Error;

/// Core error sum type. No variant here unwinds the process; every caller
/// that observes one of these either retries, closes a connection, or
/// surfaces an operator event.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Codec/framing/protocol violation. Closes the current connection,
    /// never the Session.
    #[error("malformed packet: {0}")]
    Malformed(&'static str),

    /// I/O error from the underlying connection. Retried on next tick.
    #[error("transport error: {0}")]
    Transport(String),

    /// Wrapper authentication failure. Treated as `Malformed` by callers.
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    /// Profile exhausted. Fatal to the current attempt; caller retries later.
    #[error("no host available in profile")]
    NoHost,

    /// Migration pipe peer did not connect in time. Fatal to the migration;
    /// the Session continues.
    #[error("no connection from migration peer")]
    NoConn,

    /// Buffer size cap exceeded. Fatal to that packet; connection closed.
    #[error("size limit exceeded: {0}")]
    Limit(&'static str),

    /// Context/cancel token tripped. Propagated.
    #[error("operation canceled")]
    Canceled,

    /// Operation on a closed Session/Proxy.
    #[error("operation on closed session")]
    Closed,

    /// Internal invariant violation. Reserved per §9; should be surfaced
    /// but never crash the process.
    #[error("internal invariant violated: {0}")]
    Bug(&'static str),
}

impl CoreError {
    /// True if this error should never be treated as fatal to the Session
    /// itself (only to the in-flight exchange or attempt).
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, CoreError::Closed)
    }
}
