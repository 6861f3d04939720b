use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use drift_check::{Identity, TetherRegistry, WeakHandle};
use std::hint::black_box;
use std::rc::Rc;

/// Benchmark: Tethering N objects to one anchor and draining them
///
/// Mirrors a screen that tethers its view models and is then evaluated: every
/// object is registered once, then popped until the anchor is empty.
fn bench_register_and_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("register_and_drain");

    for item_count in [10, 100, 1000, 5000].iter() {
        let anchor = Rc::new(0u8);
        let items: Vec<Rc<u64>> = (0..*item_count as u64).map(Rc::new).collect();

        group.bench_with_input(
            BenchmarkId::new("items", item_count),
            item_count,
            |b, _| {
                b.iter(|| {
                    let mut registry = TetherRegistry::new();
                    let anchor_id = Identity::of_rc(&anchor);
                    for item in &items {
                        registry.register(WeakHandle::new(item), anchor_id);
                    }
                    while let Some(handle) = registry.pop_from(anchor_id) {
                        black_box(handle.is_alive());
                    }
                    black_box(&registry);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: Shared objects held by many anchors
///
/// Each object is tethered to every anchor, so draining one anchor has to keep
/// the reverse index of the others intact.
fn bench_shared_items(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared_items");

    for anchor_count in [2, 8, 32].iter() {
        let anchors: Vec<Rc<u8>> = (0..*anchor_count).map(|_| Rc::new(0u8)).collect();
        let items: Vec<Rc<u64>> = (0..100u64).map(Rc::new).collect();

        group.bench_with_input(
            BenchmarkId::new("anchors", anchor_count),
            anchor_count,
            |b, _| {
                b.iter(|| {
                    let mut registry = TetherRegistry::new();
                    for anchor in &anchors {
                        for item in &items {
                            registry.register(WeakHandle::new(item), Identity::of_rc(anchor));
                        }
                    }
                    for anchor in &anchors {
                        black_box(registry.release_anchor(Identity::of_rc(anchor)));
                    }
                    black_box(registry.is_empty());
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: Repeated tethering of the same object
///
/// Registration is idempotent; this measures the cost of the duplicate path.
fn bench_idempotent_register(c: &mut Criterion) {
    let mut group = c.benchmark_group("idempotent_register");
    let anchor = Rc::new(0u8);
    let item = Rc::new(7u64);

    group.bench_function("same_pair_1000x", |b| {
        b.iter(|| {
            let mut registry = TetherRegistry::new();
            for _ in 0..1000 {
                registry.register(WeakHandle::new(&item), Identity::of_rc(&anchor));
            }
            black_box(registry.item_count());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_register_and_drain,
    bench_shared_items,
    bench_idempotent_register
);
criterion_main!(benches);
