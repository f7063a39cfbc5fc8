//! tagsync State Engine - Authority-gated tag replication
//!
//! This crate implements the mutation protocol for one entity's tags:
//! - Routing (apply locally on the authority, forward from observers)
//! - Validation gate
//! - Idempotent set mutation
//! - Dirty marking on authoritative change
//! - Snapshot application on observers
//! - Change notification
//!
//! The core is synchronous. The only asynchrony is in the host transport
//! behind [`ReplicationLink`], which is called fire-and-forget.

pub mod validator;
pub mod gate;
pub mod host;
pub mod engine;
pub mod notifier;
pub mod bridge;
pub mod component;
pub mod registry;

pub use validator::*;
pub use gate::*;
pub use host::*;
pub use engine::*;
pub use notifier::*;
pub use bridge::*;
pub use component::*;
pub use registry::*;
