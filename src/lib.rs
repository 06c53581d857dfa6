//! caching-proxy - Forwarding HTTP proxy with a response cache
//!
//! Core library for request parsing, forwarding and caching.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod proxy;
pub mod server;
