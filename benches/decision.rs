//! Benchmark for response parsing and the ejection decision
//!
//! Both run on the processing task between inference and actuation, so
//! they sit on the latency path of every piece.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use inspector::config::EjectionThresholds;
use inspector::imaging::{parse_response, BoundingBox, Prediction, PredictionSet};
use inspector::policy;
use serde_json::json;

fn prediction_set(count: usize) -> PredictionSet {
    let predictions = (0..count)
        .map(|i| {
            let offset = (i % 10) as f64 * 0.05;
            Prediction::new(
                "scratch",
                0.3 + (i % 7) as f64 * 0.1,
                BoundingBox {
                    x1: offset,
                    y1: offset,
                    x2: offset + 0.04,
                    y2: offset + 0.04,
                },
            )
        })
        .collect();
    PredictionSet::new(predictions)
}

fn bench_decide(c: &mut Criterion) {
    // Strict enough that every rule is evaluated before a verdict.
    let thresholds = EjectionThresholds {
        confidence_min: 0.99,
        area_max: 0.5,
        critical_count: 1000,
        major_count: 1000,
        total_defects_min: 1000,
        fail_safe_eject: true,
    };

    let mut group = c.benchmark_group("decide");
    for count in [0, 10, 100] {
        let set = prediction_set(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &set, |b, set| {
            b.iter(|| policy::decide(black_box(set), black_box(&thresholds)));
        });
    }
    group.finish();
}

fn bench_parse_response(c: &mut Criterion) {
    let entries: Vec<_> = (0..50)
        .map(|i| {
            if i % 2 == 0 {
                json!({"class": "scratch", "confidence": 0.8, "bbox": [10, 10, 60, 40]})
            } else {
                json!({"class_name": "dent", "confidence": 0.4, "x": 0.5, "y": 0.5, "width": 0.1, "height": 0.1})
            }
        })
        .collect();
    let body = json!({
        "image": {"width": 640, "height": 480},
        "predictions": entries
    });

    c.bench_function("parse_response_50", |b| {
        b.iter(|| parse_response(black_box(&body), Some((640, 480))));
    });
}

criterion_group!(benches, bench_decide, bench_parse_response);
criterion_main!(benches);
