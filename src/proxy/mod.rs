//! Forwarding proxy functionality
//!
//! This module implements the cache-miss path: rebuilding the request for
//! the origin, relaying the response and capturing it for the cache.

pub mod capture;
pub mod upstream;

pub use capture::CaptureBuffer;
pub use upstream::{Forwarder, RelayOutcome};
