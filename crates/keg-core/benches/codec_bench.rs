//! Criterion benchmarks for the keg device codec and telemetry pipeline.
//!
//! Run with:
//! ```bash
//! cargo bench --package keg-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keg_core::protocol::interpreter::decode_list;
use keg_core::protocol::{decode, encode_command, MessageKind};
use keg_core::telemetry::TelemetryMapper;

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn telemetry_burst(frames: u16) -> Vec<u8> {
    let mut buf = Vec::new();
    for i in 0..frames {
        let body = format!("vw\u{0}48\u{0}{}.5", i % 100);
        buf.extend(
            encode_command(MessageKind::Hardware, i.wrapping_add(1), body.as_bytes())
                .expect("fixture body fits in a frame"),
        );
    }
    buf
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    c.bench_function("encode_hardware_command", |b| {
        b.iter(|| encode_command(MessageKind::Hardware, black_box(7), black_box(b"vw\x0088\x0001")))
    });
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_burst");
    for frames in [1u16, 16, 256] {
        let buf = telemetry_burst(frames);
        group.bench_with_input(BenchmarkId::from_parameter(frames), &buf, |b, buf| {
            b.iter(|| decode(black_box(buf)))
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let buf = telemetry_burst(64);
    let mapper = TelemetryMapper::new();
    c.bench_function("decode_interpret_map_64", |b| {
        b.iter(|| {
            let events = decode_list(&decode(black_box(&buf)));
            mapper.decode_list(&events)
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_pipeline);
criterion_main!(benches);
