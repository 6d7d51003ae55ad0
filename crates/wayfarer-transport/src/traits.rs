//! Capability interfaces, selected by the Profile at runtime. `async-trait`
//! is used for the async methods rather than hand-rolled boxed futures.

use async_trait::async_trait;
use wayfarer_core::CoreError;

/// One established byte-oriented connection. Frames are whole application
/// messages — this trait owns delimiting them on the wire (length-prefix
/// framing for a stream transport, datagram boundaries for a packet one).
#[async_trait]
pub trait Conn: Send + Sync {
    async fn read_frame(&mut self) -> Result<Vec<u8>, CoreError>;
    async fn write_frame(&mut self, data: &[u8]) -> Result<(), CoreError>;
    async fn close(&mut self) -> Result<(), CoreError>;
}

/// Accepts inbound connections for one bound address.
#[async_trait]
pub trait Listener: Send + Sync {
    async fn accept(&mut self) -> Result<Box<dyn Conn>, CoreError>;
}

/// Pluggable byte-stream/datagram factory.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, host_addr: &str) -> Result<Box<dyn Conn>, CoreError>;
    async fn listen(&self, bind_addr: &str) -> Result<Box<dyn Listener>, CoreError>;
}

/// A symmetric byte-level codec layered over the raw transport
/// (compression, encryption). Spec describes this as `wrap(writer)`/
/// `unwrap(reader)`; this workspace operates on whole frames rather than
/// streaming writers/readers, which is the coarser-grained but equivalent
/// shape for a framed transport (see DESIGN.md).
pub trait Wrapper: Send + Sync {
    fn wrap(&self, data: &[u8]) -> Result<Vec<u8>, CoreError>;
    fn unwrap(&self, data: &[u8]) -> Result<Vec<u8>, CoreError>;
    fn name(&self) -> &'static str;
}

/// An optional byte-level reshaping layer run outside the wrapper (e.g. to
/// make traffic look like DNS labels or HTTP bodies).
pub trait Transform: Send + Sync {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CoreError>;
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CoreError>;
    fn name(&self) -> &'static str;
}
