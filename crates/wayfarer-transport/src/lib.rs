//! Transport/Wrapper/Transform capability interfaces plus minimal
//! reference implementations.
//!
//! The protocol core treats these as pluggable collaborators selected by a
//! Profile; real deployments would bring their own transport (TLS, UDP,
//! named pipe, HTTP-mimicking...) and wrapper (AES, Gzip...)
//! implementations. This crate ships only what's needed to exercise the
//! engine end to end: a TCP transport and the identity/XOR wrappers.

pub mod tcp;
pub mod transform;
pub mod traits;
pub mod wrapper;

pub use traits::{Conn, Listener, Transform, Transport, Wrapper};
pub use transform::NoneTransform;
pub use wrapper::{IdentityWrapper, XorWrapper};
