//! Fixed header for tagsync messages
//!
//! Fixed header is 16 bytes:
//! - Byte 0: Version (4 bits) + Message kind (4 bits)
//! - Byte 1: Mutation op (0 for snapshots)
//! - Bytes 2-3: Tag count (LE)
//! - Bytes 4-11: Entity ID (LE)
//! - Bytes 12-15: Payload length (LE)

use tagsync_core::{EntityId, MutationOp, TagSyncError, TagSyncResult};

/// Fixed header size in bytes
pub const FIXED_HEADER_SIZE: usize = 16;

/// Current wire protocol version
pub const WIRE_VERSION: u8 = 1;

/// Message kind identifiers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Observer to authority: please apply this mutation
    Mutation = 1,
    /// Authority to observers: full tag set
    Snapshot = 2,
}

impl MessageKind {
    pub fn from_nibble(n: u8) -> Option<Self> {
        match n {
            1 => Some(MessageKind::Mutation),
            2 => Some(MessageKind::Snapshot),
            _ => None,
        }
    }

    #[inline]
    pub fn to_nibble(self) -> u8 {
        self as u8
    }
}

/// Fixed header structure
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedHeader {
    /// Wire protocol version (4 bits, 0-15)
    pub version: u8,
    pub kind: MessageKind,
    /// Present for mutation messages only
    pub op: Option<MutationOp>,
    pub tag_count: u16,
    pub entity: EntityId,
    /// Payload bytes following the header
    pub payload_len: u32,
}

impl FixedHeader {
    pub fn new(kind: MessageKind, entity: EntityId) -> Self {
        FixedHeader {
            version: WIRE_VERSION,
            kind,
            op: None,
            tag_count: 0,
            entity,
            payload_len: 0,
        }
    }

    /// Parse header from bytes
    pub fn parse(buf: &[u8]) -> TagSyncResult<Self> {
        if buf.len() < FIXED_HEADER_SIZE {
            return Err(TagSyncError::BufferTooShort {
                expected: FIXED_HEADER_SIZE,
                actual: buf.len(),
            });
        }

        // Byte 0: Version + Kind
        let version = buf[0] >> 4;
        if version != WIRE_VERSION {
            return Err(TagSyncError::UnsupportedVersion(version));
        }
        let kind = MessageKind::from_nibble(buf[0] & 0x0F)
            .ok_or(TagSyncError::UnknownMessageKind(buf[0] & 0x0F))?;

        // Byte 1: Op
        let op = match (kind, buf[1]) {
            (MessageKind::Snapshot, 0) => None,
            (MessageKind::Snapshot, b) => {
                return Err(TagSyncError::InvalidWireFormat(format!(
                    "Snapshot carries mutation op {b}"
                )))
            }
            (MessageKind::Mutation, b) => {
                Some(MutationOp::from_byte(b).ok_or(TagSyncError::UnknownMutationOp(b))?)
            }
        };

        // Bytes 2-3: Tag count
        let tag_count = u16::from_le_bytes([buf[2], buf[3]]);

        // Bytes 4-11: Entity ID
        let mut entity = [0u8; 8];
        entity.copy_from_slice(&buf[4..12]);
        let entity = EntityId::from_bytes(entity);

        // Bytes 12-15: Payload length
        let payload_len = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);

        Ok(FixedHeader {
            version,
            kind,
            op,
            tag_count,
            entity,
            payload_len,
        })
    }

    pub fn to_bytes(&self) -> [u8; FIXED_HEADER_SIZE] {
        let mut buf = [0u8; FIXED_HEADER_SIZE];
        buf[0] = (self.version << 4) | self.kind.to_nibble();
        buf[1] = self.op.map(MutationOp::to_byte).unwrap_or(0);
        buf[2..4].copy_from_slice(&self.tag_count.to_le_bytes());
        buf[4..12].copy_from_slice(&self.entity.to_bytes());
        buf[12..16].copy_from_slice(&self.payload_len.to_le_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = FixedHeader {
            version: WIRE_VERSION,
            kind: MessageKind::Mutation,
            op: Some(MutationOp::RemoveBatch),
            tag_count: 3,
            entity: EntityId::new(0xDEADBEEF_CAFEBABE),
            payload_len: 42,
        };

        let parsed = FixedHeader::parse(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_too_short() {
        let buf = [0u8; 10];
        let result = FixedHeader::parse(&buf);
        assert!(matches!(result, Err(TagSyncError::BufferTooShort { .. })));
    }

    #[test]
    fn test_header_rejects_unknown_kind() {
        let mut bytes = FixedHeader::new(MessageKind::Snapshot, EntityId::ZERO).to_bytes();
        bytes[0] = (WIRE_VERSION << 4) | 0x0F;
        assert!(matches!(
            FixedHeader::parse(&bytes),
            Err(TagSyncError::UnknownMessageKind(0x0F))
        ));
    }

    #[test]
    fn test_header_rejects_other_version() {
        let mut bytes = FixedHeader::new(MessageKind::Snapshot, EntityId::ZERO).to_bytes();
        bytes[0] = (3 << 4) | MessageKind::Snapshot.to_nibble();
        assert!(matches!(
            FixedHeader::parse(&bytes),
            Err(TagSyncError::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn test_mutation_header_requires_known_op() {
        let mut header = FixedHeader::new(MessageKind::Mutation, EntityId::new(7));
        header.op = Some(MutationOp::Add);
        let mut bytes = header.to_bytes();
        bytes[1] = 0;
        assert!(matches!(
            FixedHeader::parse(&bytes),
            Err(TagSyncError::UnknownMutationOp(0))
        ));
    }
}
