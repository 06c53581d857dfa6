//! HTTP protocol implementation.
//!
//! The proxy's client side speaks a deliberately small subset of HTTP/1.0:
//! one request per connection, absolute-URI request targets, no request
//! bodies and no keep-alive.
//!
//! # Architecture
//!
//! - **`connection`**: The per-connection worker and its state machine
//! - **`parser`**: Reads the request line and header block from the client
//! - **`request`**: Parsed request representation and its cache identity
//! - **`response`**: Responses generated by the proxy itself (error pages)
//! - **`writer`**: Serializes and writes those responses to the client
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Request line and headers
//!        └──────┬──────┘
//!               │ Request parsed        ── parse error ──┐
//!               ▼                                         │
//!        ┌──────────────────┐                             │
//!        │     Serving      │ ← Cache hit, or origin relay│
//!        └──────┬───────────┘                             │
//!               │                       ── origin error ─┤
//!               │                                         ▼
//!               │                              ┌──────────────────┐
//!               │                              │     Failing      │ ← Error page
//!               │                              └─────────┬────────┘
//!               ▼                                        │
//!        ┌──────────────────┐                            │
//!        │      Closed      │ ◄──────────────────────────┘
//!        └──────────────────┘
//! ```

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
