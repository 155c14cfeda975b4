use criterion::{black_box, criterion_group, criterion_main, Criterion};
use calibration_relay::{CalibrationArtifact, ConnectionHub, SendStrategy, Transmitter};
use std::sync::Arc;

fn benchmark_small_frame(c: &mut Criterion) {
    let artifact = CalibrationArtifact::from(br#"{"a":1}"#.to_vec());

    c.bench_function("frame_small_calibration", |b| {
        b.iter(|| Transmitter::frame_calibration(black_box(&artifact)));
    });
}

fn benchmark_large_frame(c: &mut Criterion) {
    let artifact = CalibrationArtifact::from(vec![b'x'; 256 * 1024]);

    c.bench_function("frame_256k_calibration", |b| {
        b.iter(|| Transmitter::frame_calibration(black_box(&artifact)));
    });
}

fn benchmark_send_attempt(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let hub = Arc::new(ConnectionHub::new());
    let _outbound = hub.outbound();
    let store = Arc::new(calibration_relay::MemoryArtifactStore::new());
    store.put(calibration_relay::CALIBRATION_DATA_NAME, vec![b'x'; 4096]);
    let strategy = SendStrategy::Active { store, notifier: hub };

    c.bench_function("send_attempt_4k", |b| {
        b.iter(|| runtime.block_on(strategy.attempt()));
    });
}

criterion_group!(
    benches,
    benchmark_small_frame,
    benchmark_large_frame,
    benchmark_send_attempt
);
criterion_main!(benches);
