//! tagsync Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every tagsync layer:
//! - Identifiers (EntityId, NodeId, SubscriptionId)
//! - Tags and tag sets
//! - Participant roles
//! - Mutation requests and their outcomes
//! - Error types

pub mod id;
pub mod tag;
pub mod set;
pub mod role;
pub mod request;
pub mod error;

pub use id::*;
pub use tag::*;
pub use set::*;
pub use role::*;
pub use request::*;
pub use error::*;
