//! tagsync Wire Protocol - Binary message format
//!
//! Every datagram is:
//! - Sender node ID (8 bytes)
//! - Fixed header (16 bytes)
//! - Payload: length-prefixed tags

pub mod header;
pub mod message;

pub use header::*;
pub use message::*;
