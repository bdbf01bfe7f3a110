//! # Service Introspection
//!
//! This module contains the logic necessary to understand the self-description a service
//! returns from `JSONRPC.Introspect`.
//!
//! It enables the client to learn the remote method, notification and type catalogue at
//! runtime, allowing `kodirpc` to call and validate methods it was never compiled against.
mod cache;
mod types;

pub use cache::*;
pub use types::*;

/// The reflection method every compatible service exposes.
pub const INTROSPECT_METHOD: &str = "JSONRPC.Introspect";
