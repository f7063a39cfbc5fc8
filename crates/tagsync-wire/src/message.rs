//! Messages exchanged between replicas
//!
//! Envelope = Sender node ID + Fixed Header + Tag payload.
//! Each tag is a 1-byte length followed by its UTF-8 bytes, and is
//! re-validated on decode.

use bytes::{Buf, BufMut, BytesMut};

use tagsync_core::{
    EntityId, MutationRequest, NodeId, Tag, TagSet, TagSyncError, TagSyncResult, MAX_TAG_LEN,
};

use crate::{FixedHeader, MessageKind, FIXED_HEADER_SIZE};

/// Sender prefix size
pub const ENVELOPE_PREFIX_SIZE: usize = 8;

/// Smallest valid envelope (prefix + header, empty payload)
pub const MIN_ENVELOPE_SIZE: usize = ENVELOPE_PREFIX_SIZE + FIXED_HEADER_SIZE;

/// Maximum envelope size (MTU-friendly)
pub const MAX_FRAME_SIZE: usize = 1400;

/// Tag payload that still fits one frame
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - MIN_ENVELOPE_SIZE;

/// Encoded payload size of `tags`: one length byte per tag plus its bytes
pub fn payload_len<'a>(tags: impl IntoIterator<Item = &'a Tag>) -> usize {
    tags.into_iter().map(|tag| 1 + tag.as_str().len()).sum()
}

/// Replication message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// Mutation forwarded from an observer to the authority
    Mutation {
        entity: EntityId,
        request: MutationRequest,
    },
    /// Full tag set pushed from the authority to observers
    Snapshot { entity: EntityId, tags: TagSet },
}

impl Message {
    pub fn entity(&self) -> EntityId {
        match self {
            Message::Mutation { entity, .. } | Message::Snapshot { entity, .. } => *entity,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Mutation { .. } => MessageKind::Mutation,
            Message::Snapshot { .. } => MessageKind::Snapshot,
        }
    }
}

/// A message plus the node that sent it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub from: NodeId,
    pub message: Message,
}

impl Envelope {
    pub fn new(from: NodeId, message: Message) -> Self {
        Envelope { from, message }
    }

    /// Size of the encoded envelope in bytes
    pub fn encoded_len(&self) -> usize {
        MIN_ENVELOPE_SIZE + payload_len(self.tags())
    }

    fn tags(&self) -> Box<dyn Iterator<Item = &Tag> + '_> {
        match &self.message {
            Message::Mutation { request, .. } => request.tags(),
            Message::Snapshot { tags, .. } => Box::new(tags.iter()),
        }
    }

    /// Encode to bytes. Envelopes over [`MAX_FRAME_SIZE`] are refused.
    pub fn encode(&self) -> TagSyncResult<Vec<u8>> {
        let total = self.encoded_len();
        if total > MAX_FRAME_SIZE {
            return Err(TagSyncError::InvalidWireFormat(format!(
                "Frame too large: {} > {}",
                total, MAX_FRAME_SIZE
            )));
        }

        let op = match &self.message {
            Message::Mutation { request, .. } => Some(request.op()),
            Message::Snapshot { .. } => None,
        };
        let tags = self.tags();

        let mut payload = BytesMut::new();
        let mut count: usize = 0;
        for tag in tags {
            let bytes = tag.as_str().as_bytes();
            debug_assert!(bytes.len() <= MAX_TAG_LEN);
            payload.put_u8(bytes.len() as u8);
            payload.put_slice(bytes);
            count += 1;
        }

        let tag_count = u16::try_from(count).map_err(|_| {
            TagSyncError::InvalidWireFormat(format!("Too many tags: {count}"))
        })?;
        let payload_len = u32::try_from(payload.len()).map_err(|_| {
            TagSyncError::InvalidWireFormat(format!("Payload too large: {}", payload.len()))
        })?;

        let mut header = FixedHeader::new(self.message.kind(), self.message.entity());
        header.op = op;
        header.tag_count = tag_count;
        header.payload_len = payload_len;

        let mut buf = BytesMut::with_capacity(MIN_ENVELOPE_SIZE + payload.len());
        buf.put_slice(&self.from.to_bytes());
        buf.put_slice(&header.to_bytes());
        buf.put(payload);
        Ok(buf.to_vec())
    }

    /// Decode from bytes
    pub fn decode(buf: &[u8]) -> TagSyncResult<Self> {
        if buf.len() < MIN_ENVELOPE_SIZE {
            return Err(TagSyncError::BufferTooShort {
                expected: MIN_ENVELOPE_SIZE,
                actual: buf.len(),
            });
        }

        let mut cursor = buf;
        let from = NodeId::new(cursor.get_u64_le());

        let header = FixedHeader::parse(cursor)?;
        cursor.advance(FIXED_HEADER_SIZE);

        if cursor.len() != header.payload_len as usize {
            return Err(TagSyncError::InvalidWireFormat(format!(
                "Payload length {} does not match header {}",
                cursor.len(),
                header.payload_len
            )));
        }

        let tags = decode_tags(&mut cursor, header.tag_count)?;
        if cursor.has_remaining() {
            return Err(TagSyncError::InvalidWireFormat(
                "Trailing bytes after tags".into(),
            ));
        }

        let message = match header.kind {
            MessageKind::Snapshot => Message::Snapshot {
                entity: header.entity,
                tags,
            },
            MessageKind::Mutation => {
                let op = header.op.ok_or_else(|| {
                    TagSyncError::InvalidWireFormat("Mutation without op".into())
                })?;
                let request = MutationRequest::from_parts(op, tags).ok_or_else(|| {
                    TagSyncError::InvalidWireFormat(format!(
                        "{op:?} expects exactly one tag, got {}",
                        header.tag_count
                    ))
                })?;
                Message::Mutation {
                    entity: header.entity,
                    request,
                }
            }
        };

        Ok(Envelope { from, message })
    }
}

fn decode_tags(cursor: &mut &[u8], count: u16) -> TagSyncResult<TagSet> {
    let mut tags = TagSet::new();
    for _ in 0..count {
        if !cursor.has_remaining() {
            return Err(TagSyncError::BufferTooShort {
                expected: 1,
                actual: 0,
            });
        }
        let len = cursor.get_u8() as usize;
        if cursor.remaining() < len {
            return Err(TagSyncError::BufferTooShort {
                expected: len,
                actual: cursor.remaining(),
            });
        }
        let name = std::str::from_utf8(&cursor[..len])
            .map_err(|_| TagSyncError::InvalidWireFormat("Tag is not UTF-8".into()))?;
        let tag = Tag::new(name)?;
        cursor.advance(len);

        if !tags.add(tag) {
            return Err(TagSyncError::InvalidWireFormat(format!(
                "Duplicate tag {name:?}"
            )));
        }
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tag(name: &str) -> Tag {
        Tag::new(name).unwrap()
    }

    fn set(names: &[&str]) -> TagSet {
        names.iter().map(|n| tag(n)).collect()
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let envelope = Envelope::new(
            NodeId::new(1),
            Message::Snapshot {
                entity: EntityId::new(42),
                tags: set(&["Status.Stunned", "Team.Red"]),
            },
        );

        let bytes = envelope.encode().unwrap();
        assert_eq!(Envelope::decode(&bytes).unwrap(), envelope);
    }

    #[test]
    fn test_empty_snapshot_is_header_only() {
        let envelope = Envelope::new(
            NodeId::new(1),
            Message::Snapshot {
                entity: EntityId::new(42),
                tags: TagSet::new(),
            },
        );

        let bytes = envelope.encode().unwrap();
        assert_eq!(bytes.len(), MIN_ENVELOPE_SIZE);
        assert_eq!(Envelope::decode(&bytes).unwrap(), envelope);
    }

    #[test]
    fn test_mutation_roundtrip() {
        let envelope = Envelope::new(
            NodeId::new(9),
            Message::Mutation {
                entity: EntityId::new(3),
                request: MutationRequest::Remove(tag("Status.Stunned")),
            },
        );

        let bytes = envelope.encode().unwrap();
        assert_eq!(Envelope::decode(&bytes).unwrap(), envelope);
    }

    #[test]
    fn test_frame_size_limit() {
        // 17-byte names cost 18 payload bytes each
        let names: Vec<String> = (0..80).map(|i| format!("Status.Effect.{:03}", i)).collect();
        let fits = MAX_PAYLOAD_SIZE / 18;

        let snapshot = |count: usize| {
            Envelope::new(
                NodeId::new(1),
                Message::Snapshot {
                    entity: EntityId::new(1),
                    tags: names[..count].iter().map(|n| tag(n)).collect(),
                },
            )
        };

        let largest = snapshot(fits);
        let bytes = largest.encode().unwrap();
        assert_eq!(bytes.len(), largest.encoded_len());
        assert!(bytes.len() <= MAX_FRAME_SIZE);

        let oversized = snapshot(80);
        assert!(oversized.encoded_len() > MAX_FRAME_SIZE);
        assert!(matches!(
            oversized.encode(),
            Err(TagSyncError::InvalidWireFormat(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let envelope = Envelope::new(
            NodeId::new(1),
            Message::Snapshot {
                entity: EntityId::new(1),
                tags: set(&["A", "B"]),
            },
        );
        let bytes = envelope.encode().unwrap();
        let result = Envelope::decode(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(TagSyncError::InvalidWireFormat(_))));
    }

    #[test]
    fn test_decode_revalidates_tags() {
        let envelope = Envelope::new(
            NodeId::new(1),
            Message::Snapshot {
                entity: EntityId::new(1),
                tags: set(&["AB"]),
            },
        );
        let mut bytes = envelope.encode().unwrap();
        // Replace "AB" with "A " in place
        let last = bytes.len() - 1;
        bytes[last] = b' ';
        assert!(matches!(
            Envelope::decode(&bytes),
            Err(TagSyncError::InvalidTag { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_duplicate_tags() {
        let envelope = Envelope::new(
            NodeId::new(1),
            Message::Snapshot {
                entity: EntityId::new(1),
                tags: set(&["AB", "CD"]),
            },
        );
        let mut bytes = envelope.encode().unwrap();
        let last = bytes.len();
        bytes[last - 2..].copy_from_slice(b"AB");
        assert!(matches!(
            Envelope::decode(&bytes),
            Err(TagSyncError::InvalidWireFormat(_))
        ));
    }

    #[test]
    fn test_single_op_with_two_tags_is_rejected() {
        let batch = Envelope::new(
            NodeId::new(1),
            Message::Mutation {
                entity: EntityId::new(1),
                request: MutationRequest::AddBatch(set(&["A", "B"])),
            },
        );
        let mut bytes = batch.encode().unwrap();
        // Rewrite the op byte to a single-tag Add
        bytes[ENVELOPE_PREFIX_SIZE + 1] = tagsync_core::MutationOp::Add.to_byte();
        assert!(matches!(
            Envelope::decode(&bytes),
            Err(TagSyncError::InvalidWireFormat(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..128)) {
            let _ = Envelope::decode(&data);
        }
    }
}
