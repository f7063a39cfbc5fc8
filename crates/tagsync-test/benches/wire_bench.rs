//! Benchmarks for the envelope codec

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tagsync_core::{EntityId, MutationRequest, NodeId, Tag, TagSet};
use tagsync_wire::{Envelope, Message};

fn snapshot_envelope(tags: usize) -> Envelope {
    let tags: TagSet = (0..tags)
        .map(|i| Tag::new(format!("Status.Effect{}", i)).unwrap())
        .collect();
    Envelope::new(
        NodeId::new(1),
        Message::Snapshot {
            entity: EntityId::new(7),
            tags,
        },
    )
}

fn bench_encode_snapshot(c: &mut Criterion) {
    let envelope = snapshot_envelope(32);

    c.bench_function("encode_snapshot_32", |b| {
        b.iter(|| black_box(&envelope).encode().unwrap())
    });
}

fn bench_decode_snapshot(c: &mut Criterion) {
    let bytes = snapshot_envelope(32).encode().unwrap();

    c.bench_function("decode_snapshot_32", |b| {
        b.iter(|| Envelope::decode(black_box(&bytes)).unwrap())
    });
}

fn bench_encode_mutation(c: &mut Criterion) {
    let envelope = Envelope::new(
        NodeId::new(2),
        Message::Mutation {
            entity: EntityId::new(7),
            request: MutationRequest::Add(Tag::new("Status.Stunned").unwrap()),
        },
    );

    c.bench_function("encode_mutation_add", |b| {
        b.iter(|| black_box(&envelope).encode().unwrap())
    });
}

criterion_group!(
    benches,
    bench_encode_snapshot,
    bench_decode_snapshot,
    bench_encode_mutation
);
criterion_main!(benches);
