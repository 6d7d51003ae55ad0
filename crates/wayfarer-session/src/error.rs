//! Session-layer errors, layered over [`CoreError`].

use std::time::Duration;

use thiserror::Error;
use wayfarer_core::CoreError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Migration pipe peer did not connect within the configured timeout.
    #[error("migration peer did not connect within {0:?}")]
    MigrationTimeout(Duration),

    /// Migration frame failed to parse.
    #[error("migration frame malformed: {0}")]
    MigrationMalformed(&'static str),
}
