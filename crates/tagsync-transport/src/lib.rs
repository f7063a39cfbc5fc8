//! tagsync Transport Layer
//!
//! This crate provides:
//! - UDP transport for encoded envelopes
//! - In-process channel hub (ordered, reliable) for tests and embedding

pub mod udp;
pub mod channel;

pub use udp::*;
pub use channel::*;
