//! tagsync Runtime - Replica hosting and tick loop
//!
//! A [`Replica`] hosts one participant's tag components and plays both host
//! roles the components need: it answers ownership questions and it carries
//! their replication traffic. The tick loop:
//!
//! 1. Apply incoming mutation requests and snapshots
//! 2. Route requests forwarded by local observers to their owners
//! 3. Snapshot every dirty owned entity to all peers
//!
//! [`driver::run_udp`] runs the loop over UDP; tests and simulations call
//! [`Replica::tick`] directly.

pub mod config;
pub mod driver;
pub mod observability;
pub mod outbox;
pub mod ownership;
pub mod replica;

pub use config::*;
pub use driver::*;
pub use observability::*;
pub use outbox::*;
pub use ownership::*;
pub use replica::*;
