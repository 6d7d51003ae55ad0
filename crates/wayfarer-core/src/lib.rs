//! wayfarer-core — shared wire types, codec, and data model.
//! All other Wayfarer crates depend on this one.

pub mod body;
pub mod cluster;
pub mod config;
pub mod device;
pub mod error;
pub mod flags;
pub mod ids;
pub mod job;
pub mod wire;

pub use device::Device;
pub use error::CoreError;
pub use flags::Flags;
pub use job::{Job, JobStatus};
pub use wire::Packet;
