//! tagsync Test Harness - Replication simulation and convergence scenarios
//!
//! This crate provides:
//! - Seeded link conditions (delay, duplication) over the wire codec
//! - A lockstep multi-replica cluster
//! - End-to-end replication scenarios

pub mod network;
pub mod scenarios;
pub mod simulator;

pub use network::*;
pub use scenarios::*;
pub use simulator::*;
