//! Benchmarks for packet decoding and sample ingestion
//!
//! The sensor delivers ~100 packets/s of 10 samples each; decode and
//! ingest must stay far below that budget.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use emgstream::protocol::decoder::PacketDecoder;
use emgstream::protocol::packet::Sample;
use emgstream::stream::processor::StreamProcessor;

/// The sensor's usual notification: sequence header plus 10 records
fn typical_payload(sequence: u16) -> Vec<u8> {
    let mut bytes = sequence.to_le_bytes().to_vec();
    for n in 0..10i16 {
        for value in [n * 100, -n * 100, 4096, n * 16, -n * 16, 0, 2000 + n] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

fn bench_decode(c: &mut Criterion) {
    let payload = typical_payload(0);

    // A fresh decoder per iteration keeps gap accounting out of the measurement
    c.bench_function("decode_10_sample_packet", |b| {
        b.iter_batched(
            PacketDecoder::new,
            |mut decoder| decoder.decode(black_box(&payload)).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

fn bench_ingest(c: &mut Criterion) {
    let sample = Sample {
        timestamp_ms: 1.0,
        accel: [0.1, -0.2, 0.98],
        gyro: [12.0, -7.5, 0.25],
        emg: 2048,
    };

    // Full buffers: every derived metric window is active
    let mut processor = StreamProcessor::new();
    for n in 0..1000 {
        let mut warm = sample;
        warm.timestamp_ms = n as f64;
        processor.ingest(warm);
    }

    c.bench_function("ingest_with_full_windows", |b| {
        b.iter(|| processor.ingest(black_box(sample)))
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let mut processor = StreamProcessor::new();
    for n in 0..1000 {
        processor.ingest(Sample {
            timestamp_ms: n as f64,
            accel: [0.0, 0.0, 1.0],
            gyro: [0.0; 3],
            emg: 2048,
        });
    }

    c.bench_function("snapshot_full_history", |b| {
        b.iter(|| processor.snapshot(black_box(None)))
    });
}

criterion_group!(benches, bench_decode, bench_ingest, bench_snapshot);
criterion_main!(benches);
