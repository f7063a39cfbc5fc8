//! Benchmarks for tag set and mutation hot paths

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use tagsync_core::{EntityId, MutationRequest, Role, Tag, TagSet};
use tagsync_state::{MutationEngine, NamespaceAllowList};

fn tag_pool(n: usize) -> Vec<Tag> {
    (0..n)
        .map(|i| Tag::new(format!("Status.Effect{}", i)).unwrap())
        .collect()
}

fn bench_tag_new(c: &mut Criterion) {
    c.bench_function("tag_new", |b| {
        b.iter(|| Tag::new(black_box("Ability.Fire.Projectile")))
    });
}

fn bench_tagset_contains(c: &mut Criterion) {
    let set: TagSet = tag_pool(64).into_iter().collect();
    let needle = Tag::new("Status.Effect40").unwrap();

    c.bench_function("tagset_contains_64", |b| {
        b.iter(|| black_box(set.contains(black_box(&needle))))
    });
}

fn bench_tagset_contains_all(c: &mut Criterion) {
    let set: TagSet = tag_pool(64).into_iter().collect();
    let query: TagSet = tag_pool(64).into_iter().step_by(8).collect();

    c.bench_function("tagset_contains_all_8_of_64", |b| {
        b.iter(|| black_box(set.contains_all(black_box(&query))))
    });
}

fn bench_engine_add_batch(c: &mut Criterion) {
    let engine = MutationEngine::new(Arc::new(NamespaceAllowList::new([
        Tag::new("Status").unwrap()
    ])));
    let request = MutationRequest::AddBatch(tag_pool(16).into_iter().collect());

    c.bench_function("engine_add_batch_16", |b| {
        b.iter_batched(
            TagSet::new,
            |mut set| {
                black_box(engine.apply(EntityId::new(1), Role::Authority, &mut set, &request))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_snapshot_diff(c: &mut Criterion) {
    let pool = tag_pool(64);
    let before: TagSet = pool.iter().take(48).cloned().collect();
    let after: TagSet = pool.iter().skip(16).cloned().collect();

    c.bench_function("tagset_diff_64", |b| {
        b.iter(|| black_box(before.diff(black_box(&after))))
    });
}

criterion_group!(
    benches,
    bench_tag_new,
    bench_tagset_contains,
    bench_tagset_contains_all,
    bench_engine_add_batch,
    bench_snapshot_diff
);
criterion_main!(benches);
