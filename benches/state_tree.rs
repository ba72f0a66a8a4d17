//! Hot-path benchmarks: interning, child navigation and assignment.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use statehist::state::{SinkPaths, StateHistorySink, Value};
use statehist::types::Time;
use tempfile::tempdir;

fn bench_intern(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let mut sink = StateHistorySink::open(SinkPaths::in_dir(dir.path()), Time::ZERO).unwrap();

    let keys: Vec<String> = (0..1024).map(|i| format!("thread-{i}")).collect();
    for key in &keys {
        sink.intern_subpath(key);
    }

    c.bench_function("intern_hot", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let quark = sink.intern_subpath(&keys[i & 1023]);
            i += 1;
            black_box(quark)
        });
    });
}

fn bench_assign(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let mut sink = StateHistorySink::open(SinkPaths::in_dir(dir.path()), Time::ZERO).unwrap();

    // warm the tree so the bench measures lookup, not creation
    for tid in 0..256i64 {
        sink.root_mut()
            .child_str("threads")
            .child_int(tid)
            .child_str("status")
            .set(Value::U32(0))
            .unwrap();
    }

    c.bench_function("navigate_and_assign", |b| {
        let mut ts = 1u64;
        let mut tid = 0i64;
        b.iter(|| {
            sink.set_ts(Time::from_nanos(ts)).unwrap();
            sink.root_mut()
                .child_str("threads")
                .child_int(black_box(tid & 255))
                .child_str("status")
                .set(Value::U32(ts as u32))
                .unwrap();
            ts += 1;
            tid += 1;
        });
    });
}

criterion_group!(benches, bench_intern, bench_assign);
criterion_main!(benches);
