//! Session protocol engine: the Session state machine, its supporting
//! fragment/job tracking, the connection exchange turn, migration, and the
//! Proxy relay.

pub mod error;
pub mod exchange;
pub mod job_table;
pub mod migration;
pub mod profile;
pub mod proxy;
pub mod session;
pub mod state;

pub use error::SessionError;
pub use exchange::run_exchange;
pub use profile::{select_next, Profile, SelectorPolicy};
pub use proxy::{Proxy, ProxyClient};
pub use session::{new_session_table, peel_multi, Session, SessionTable, SEND_QUEUE_CAPACITY};
