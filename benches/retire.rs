use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, Ordering::Relaxed};

use criterion::{criterion_group, criterion_main, Criterion};

use hazptr::{Collector, Config, ConfigBuilder, ScanType};

fn guard(c: &mut Criterion) {
    let collector = Collector::new(Config::new());
    let local = collector.attach();

    c.bench_function("guard", |b| b.iter(|| local.guard()));
}

fn protect(c: &mut Criterion) {
    let collector = Collector::new(Config::new());
    let local = collector.attach();

    let shared = AtomicPtr::new(Box::into_raw(Box::new(1)));
    let guard = local.guard();

    c.bench_function("protect", |b| b.iter(|| guard.protect(&shared)));

    drop(guard);
    drop(unsafe { Box::from_raw(shared.load(Relaxed)) });
}

fn retire(c: &mut Criterion) {
    for (name, scan_type) in [("retire/classic", ScanType::Classic), ("retire/inplace", ScanType::Inplace)]
    {
        let collector = Collector::new(ConfigBuilder::new().scan_type(scan_type).build());
        let local = collector.attach();

        c.bench_function(name, |b| {
            b.iter(|| unsafe { local.retire(NonNull::from(Box::leak(Box::new(1u64)))) })
        });
    }
}

criterion_group!(benches, guard, protect, retire);
criterion_main!(benches);
