// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire codec benchmarks
//!
//! Measures encode/decode cost of discovery datagrams and data-plane frames,
//! the two hot paths of every spin turn.

#![allow(clippy::uninlined_format_args)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dzmq::protocol::{decode_datagram, Advertisement, DiscoveryHeader, MessageType};
use dzmq::transport::frame_codec::{decode_multipart, encode_multipart};
use dzmq::Guid;

fn bench_discovery_datagram(c: &mut Criterion) {
    let guid = Guid::from_bytes([0xAB; 16]);
    let adv = Advertisement::new(
        DiscoveryHeader::new(guid, "sensors/front/lidar", MessageType::Adv),
        "tcp://192.168.1.10:40123",
    )
    .encode()
    .expect("encode adv");
    let sub = DiscoveryHeader::new(guid, "sensors/front/lidar", MessageType::Sub)
        .encode()
        .expect("encode sub");

    let mut group = c.benchmark_group("discovery_datagram");
    group.bench_function("encode_adv", |b| {
        b.iter(|| {
            Advertisement::new(
                DiscoveryHeader::new(guid, black_box("sensors/front/lidar"), MessageType::Adv),
                black_box("tcp://192.168.1.10:40123"),
            )
            .encode()
        })
    });
    group.bench_function("decode_adv", |b| b.iter(|| decode_datagram(black_box(&adv))));
    group.bench_function("decode_sub", |b| b.iter(|| decode_datagram(black_box(&sub))));
    group.finish();
}

fn bench_multipart_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("multipart_frame");
    for size in [64usize, 1024, 64 * 1024] {
        let payload = vec![0x5Au8; size];
        let parts: [&[u8]; 3] = [b"sensors/front/lidar", b"tcp://192.168.1.10:40123", &payload];
        let body = encode_multipart(&parts).expect("encode");

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), &parts, |b, parts| {
            b.iter(|| encode_multipart(black_box(parts)))
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &body, |b, body| {
            b.iter(|| decode_multipart(black_box(body)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_discovery_datagram, bench_multipart_frame);
criterion_main!(benches);
