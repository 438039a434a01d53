//! Benchmark tests for playdeck-core operations
//!
//! Run with: cargo bench -p playdeck-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use playdeck_core::backend::SimulatedPlayer;
use playdeck_core::dispatch::CommandDispatcher;
use playdeck_core::source::parse_iso_duration;
use playdeck_core::speed::{normalize_label, speed_to_string, SpeedMap, SpeedRegistry};
use playdeck_core::store::MemoryStore;
use playdeck_core::types::*;
use playdeck_core::{Config, PageServices, ResolvedSource, VideoPlayer};

// ============================================================================
// Helpers
// ============================================================================

/// Generate a hosted stream list with N entries, half of them in legacy order
fn generate_stream_list(entries: usize) -> String {
    let speeds = ["0.50", "0.75", "1", "1.25", "1.5", "2.0"];
    (0..entries)
        .map(|i| {
            let speed = speeds[i % speeds.len()];
            if i % 2 == 0 {
                format!("stream{:04}:{}", i, speed)
            } else {
                format!("{}:stream{:04}", speed, i)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

// ============================================================================
// Speed Benchmarks
// ============================================================================

fn bench_stream_list_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Stream List Parsing");

    for &count in &[3, 6, 24, 96] {
        let list = generate_stream_list(count);
        group.bench_with_input(BenchmarkId::new("SpeedMap::parse", count), &list, |b, list| {
            b.iter(|| black_box(SpeedMap::parse(black_box(list))))
        });
    }

    group.finish();
}

fn bench_speed_normalisation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Speed Normalisation");

    group.bench_function("speed_to_string", |b| {
        b.iter(|| {
            for speed in [0.5, 0.75, 1.0, 1.25, 1.5, 2.0] {
                black_box(speed_to_string(black_box(speed)));
            }
        })
    });

    group.bench_function("normalize_label", |b| {
        b.iter(|| {
            for label in ["1", "1.50", "0.75", "abc", "-1"] {
                black_box(normalize_label(black_box(label)));
            }
        })
    });

    group.bench_function("SpeedRegistry::select", |b| {
        let mut registry = SpeedRegistry::new(SpeedMap::file_backed(), Arc::new(MemoryStore::new()));
        b.iter(|| {
            black_box(registry.select(black_box("1.50"), false).len());
            black_box(registry.select(black_box("3.0"), false).len());
        })
    });

    group.finish();
}

// ============================================================================
// Clock Benchmarks
// ============================================================================

fn bench_time_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("Time Formatting");

    for &seconds in &[59.4, 3725.0, 86_399.9] {
        group.bench_with_input(BenchmarkId::new("vcr_label", seconds), &seconds, |b, &seconds| {
            let time = PlayTime::new(seconds, seconds + 30.0);
            b.iter(|| black_box(time.vcr_label()))
        });
    }

    group.bench_function("parse_iso_duration", |b| {
        b.iter(|| black_box(parse_iso_duration(black_box("PT1H2M3.5S"))))
    });

    group.finish();
}

fn bench_command_dispatch(c: &mut Criterion) {
    let backing = Arc::new(SimulatedPlayer::new(SourceKind::File, 600.0));
    backing.mark_ready();
    let source = ResolvedSource {
        kind: SourceKind::File,
        speeds: SpeedMap::file_backed(),
        files: Default::default(),
        metadata: None,
        degraded: false,
        fell_back: false,
    };
    let player = VideoPlayer::new(Config::default(), &source, backing, &PageServices::default());
    let dispatcher = CommandDispatcher::for_player(&player);
    let args = serde_json::json!({ "time": 42.0 });

    let mut group = c.benchmark_group("Command Dispatch");

    group.bench_function("seek", |b| {
        b.iter(|| black_box(dispatcher.dispatch(black_box("videoPlayer.seek"), &args)))
    });

    group.bench_function("miss", |b| {
        b.iter(|| black_box(dispatcher.dispatch(black_box("videoPlayer.rewind"), &args)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_stream_list_parsing,
    bench_speed_normalisation,
    bench_time_formatting,
    bench_command_dispatch,
);
criterion_main!(benches);
