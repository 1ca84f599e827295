use std::fs;

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;

use flag_core::{
    flags::{evaluate, evaluate_details},
    Configuration, EvaluationContext,
};

fn criterion_benchmark(c: &mut Criterion) {
    let configuration =
        Configuration::from_json(&fs::read("tests/data/flags-v1.json").unwrap()).unwrap();
    let now = Utc::now();

    let cases = [
        ("new-checkout", json!({"key": "subject1", "plan": "pro"})),
        ("beta-banner", json!({"key": "subject1", "email": "s1@beta.example"})),
        (
            "pricing-tier",
            json!({"key": "subject1", "appVersion": "2.1.0", "lifetimeSpend": 5000, "country": "DE"}),
        ),
        ("staff-tools", json!({"key": "subject1", "email": "jane.doe@acme.com"})),
        ("org-rollout", json!({"key": "subject1", "orgId": "acme"})),
    ];

    for (flag_key, context) in cases {
        let flag = configuration.get_flag(flag_key).unwrap();
        let segments = configuration.segments();
        let context: EvaluationContext = serde_json::from_value(context).unwrap();

        let mut group = c.benchmark_group(flag_key);
        group.throughput(Throughput::Elements(1));
        group.bench_function("evaluate", |b| {
            b.iter(|| evaluate(black_box(flag), black_box(&context), black_box(segments)))
        });
        group.bench_function("evaluate_details", |b| {
            b.iter(|| {
                evaluate_details(
                    black_box(flag),
                    black_box(&context),
                    black_box(segments),
                    black_box(now),
                )
            })
        });
        group.finish();
    }
}

criterion_group!(
    name = benches;
    config = Criterion::default().noise_threshold(0.02);
    targets = criterion_benchmark);
criterion_main!(benches);
