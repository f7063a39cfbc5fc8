//! Error types for tagsync
//!
//! Protocol rejections (validation, authority, no-op) are not errors; they
//! travel as [`MutationOutcome`](crate::MutationOutcome) values. The variants
//! here cover malformed input and transport failures only.

use thiserror::Error;

use crate::NodeId;

/// Why a string is not a well-formed tag
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagFault {
    #[error("tag is empty")]
    Empty,

    #[error("tag is {0} bytes, limit is {max}", max = crate::MAX_TAG_LEN)]
    TooLong(usize),

    #[error("tag contains forbidden character {0:?}")]
    ForbiddenChar(char),

    #[error("tag has an empty segment")]
    EmptySegment,
}

/// Core tagsync errors
#[derive(Error, Debug)]
pub enum TagSyncError {
    // Tag errors
    #[error("Invalid tag {tag:?}: {fault}")]
    InvalidTag { tag: String, fault: TagFault },

    // Wire errors
    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Unknown message kind: {0}")]
    UnknownMessageKind(u8),

    #[error("Unknown mutation op: {0}")]
    UnknownMutationOp(u8),

    #[error("Unsupported wire version: {0}")]
    UnsupportedVersion(u8),

    // Routing errors
    #[error("No route to node {0}")]
    NoRoute(NodeId),

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for tagsync operations
pub type TagSyncResult<T> = Result<T, TagSyncError>;
