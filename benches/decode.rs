//! Benchmarks for the per-reading hot path: payload extraction, decoding and
//! output formatting.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use mijia_listener::backend::tools::extract_payload;
use mijia_listener::{
    InfluxDbFormatter, JsonFormatter, OutputFormatter, RawNotification, Reading, SensorAddress,
    TemperatureUnit, TextFormatter, decode_battery, decode_humidity, decode_temperature,
};
use std::time::SystemTime;

const TEST_ADDRESS: SensorAddress = SensorAddress([0xA4, 0xC1, 0x38, 0x0B, 0x2E, 0x01]);

const GATTTOOL_LINE: &str = "Notification handle = 0x0036 value: 46 08 44 c0 0a ";

fn notification() -> RawNotification {
    RawNotification::from_bytes(&[0x46, 0x08, 0x44, 0xC0, 0x0A]).unwrap()
}

fn reading() -> Reading {
    let mut reading =
        Reading::from_notification(TEST_ADDRESS, &notification(), TemperatureUnit::Celsius);
    reading.timestamp = SystemTime::UNIX_EPOCH;
    reading
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(1));

    let raw = notification();

    group.bench_function("extract_payload", |b| {
        b.iter(|| extract_payload(black_box(GATTTOOL_LINE)))
    });

    group.bench_function("fields_celsius", |b| {
        b.iter(|| {
            let raw = black_box(&raw);
            (
                decode_humidity(raw),
                decode_temperature(raw, false),
                decode_battery(raw),
            )
        })
    });

    group.bench_function("fields_fahrenheit", |b| {
        b.iter(|| decode_temperature(black_box(&raw), true))
    });

    group.finish();
}

fn bench_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("format");
    group.throughput(Throughput::Elements(1));

    let reading = reading();
    let formatters: [(&str, Box<dyn OutputFormatter>); 3] = [
        ("text", Box::new(TextFormatter)),
        ("json", Box::new(JsonFormatter)),
        (
            "influxdb",
            Box::new(InfluxDbFormatter::new("mijia_measurement".to_string())),
        ),
    ];

    for (name, formatter) in &formatters {
        group.bench_function(*name, |b| {
            b.iter(|| formatter.format(black_box(&reading), black_box("Kitchen")))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode, bench_format);
criterion_main!(benches);
