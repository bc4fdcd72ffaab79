//! Benchmark suite for avro-explorer read throughput
//!
//! Measures, over generated in-memory files:
//! - Record decoding with the `null` and `deflate` codecs
//! - Decoding plus flattening
//! - Integrity scans, full and framing-only
//! - CSV conversion
//!
//! # Configuration
//!
//! Benchmark behavior can be configured via environment variables:
//!
//! - `BENCH_SAMPLE_SIZE`: Number of samples to collect (default: 100)
//! - `BENCH_MEASUREMENT_TIME`: Measurement time in seconds (default: 5)
//! - `BENCH_WARM_UP_TIME`: Warm-up time in seconds (default: 3)
//! - `BENCH_RECORDS`: Records per generated file (default: 50,000)
//!
//! # Examples
//!
//! ```bash
//! # Quick run with fewer samples
//! BENCH_SAMPLE_SIZE=20 BENCH_MEASUREMENT_TIME=3 cargo bench
//! ```

#[path = "../tests/common/mod.rs"]
mod common;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;

use avro_explorer::{
    check_integrity, convert_to_csv, decode_records, parse_header, ConvertOptions, Flattener,
    IntegrityOptions,
};

use common::{users, ContainerBuilder, USER_SCHEMA};

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            eprintln!("Warning: Invalid {} value: {}", name, raw);
            None
        }
    }
}

/// Configure Criterion based on environment variables
fn configure_criterion() -> Criterion {
    let mut criterion = Criterion::default();

    if let Some(size) = env_parse::<usize>("BENCH_SAMPLE_SIZE") {
        criterion = criterion.sample_size(size);
        eprintln!("Configured sample size: {}", size);
    }
    if let Some(secs) = env_parse::<u64>("BENCH_MEASUREMENT_TIME") {
        criterion = criterion.measurement_time(Duration::from_secs(secs));
        eprintln!("Configured measurement time: {}s", secs);
    }
    if let Some(secs) = env_parse::<u64>("BENCH_WARM_UP_TIME") {
        criterion = criterion.warm_up_time(Duration::from_secs(secs));
        eprintln!("Configured warm-up time: {}s", secs);
    }

    criterion
}

fn record_count() -> usize {
    env_parse("BENCH_RECORDS").unwrap_or(50_000)
}

fn generate(codec: &str, records: usize) -> Vec<u8> {
    ContainerBuilder::new(USER_SCHEMA)
        .codec(codec)
        .block_size(4_000)
        .build(&users(records))
}

/// Benchmark decoding with each supported codec
fn bench_codecs(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_throughput");
    let records = record_count();

    for codec in ["null", "deflate"] {
        let bytes = generate(codec, records);
        let file = parse_header(bytes.clone()).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("decode", codec), &file, |b, file| {
            b.iter(|| {
                let mut n = 0;
                for record in decode_records(file, None) {
                    black_box(record.unwrap());
                    n += 1;
                }
                n
            });
        });
    }

    group.finish();
}

/// Benchmark decoding followed by flattening
fn bench_flatten(c: &mut Criterion) {
    let mut group = c.benchmark_group("flatten");
    let records = record_count();
    let file = parse_header(generate("null", records)).unwrap();
    let flattener = Flattener::default();
    group.throughput(Throughput::Elements(records as u64));

    group.bench_function("decode_and_flatten", |b| {
        b.iter(|| {
            for record in decode_records(&file, None) {
                black_box(flattener.flatten(&record.unwrap()));
            }
        });
    });

    group.finish();
}

/// Benchmark integrity scans
fn bench_integrity(c: &mut Criterion) {
    let mut group = c.benchmark_group("integrity");
    let bytes = bytes::Bytes::from(generate("deflate", record_count()));
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    let full = IntegrityOptions::default();
    let framing = IntegrityOptions::new().framing_only();
    for (name, options) in [("full", &full), ("framing_only", &framing)] {
        group.bench_with_input(BenchmarkId::new("scan", name), options, |b, options| {
            b.iter(|| black_box(check_integrity(bytes.clone(), options)));
        });
    }

    group.finish();
}

/// Benchmark whole-file CSV conversion
fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");
    let bytes = bytes::Bytes::from(generate("null", 10_000));
    group.throughput(Throughput::Elements(10_000));

    group.bench_function("csv", |b| {
        b.iter(|| black_box(convert_to_csv(bytes.clone(), &ConvertOptions::default()).unwrap()));
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = bench_codecs, bench_flatten, bench_integrity, bench_convert
}
criterion_main!(benches);
