//! `wayfarerd` — the server half of the session protocol engine.

pub mod dispatch;
pub mod route;
pub mod server;

pub use server::{Server, ServerEvent, MAX_BODY_LEN};
