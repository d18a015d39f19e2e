//! Controller-side plumbing: wire messages, the TCP link and its errors.
//!
//! The controller itself (relay board, load-cell bridge) is an opaque peer;
//! this crate only speaks its line protocol.
pub mod error;
pub mod link;
pub mod wire;

pub use error::HwError;
pub use link::{ControllerLink, LinkFeed, LinkOptions, LinkRelays};
