//! Envelope crypto benchmark: both schemes over a telemetry-sized payload.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vigil_server::crypto::{at_rest, channel};

fn payload() -> Vec<u8> {
    let disks: Vec<serde_json::Value> = (0..16)
        .map(|i| {
            serde_json::json!({
                "name": format!("sd{}", i),
                "total": 512_000_000_000u64,
                "free": 128_000_000_000u64
            })
        })
        .collect();
    serde_json::to_vec(&disks).unwrap()
}

fn bench_channel(c: &mut Criterion) {
    let key = [0x42u8; 32];
    let data = payload();
    let encrypted = channel::encrypt(&data, b"agent-bench", &key).unwrap();

    c.bench_function("channel_encrypt", |b| {
        b.iter(|| black_box(channel::encrypt(black_box(&data), b"agent-bench", &key)).unwrap())
    });
    c.bench_function("channel_decrypt", |b| {
        b.iter(|| black_box(channel::decrypt(black_box(&encrypted), b"agent-bench", &key)).unwrap())
    });
}

fn bench_at_rest(c: &mut Criterion) {
    let key = [0x51u8; 32];
    let data = payload();
    let encrypted = at_rest::encrypt(&data, &key).unwrap();

    c.bench_function("at_rest_encrypt", |b| {
        b.iter(|| black_box(at_rest::encrypt(black_box(&data), &key)).unwrap())
    });
    c.bench_function("at_rest_decrypt", |b| {
        b.iter(|| black_box(at_rest::decrypt(black_box(&encrypted), &key)).unwrap())
    });
}

criterion_group!(benches, bench_channel, bench_at_rest);
criterion_main!(benches);
