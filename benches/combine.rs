//! Combine-path benchmarks: the per-query hot path on the entry node.

use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use flowgate_cluster::combine::combine_stat_responses;
use flowgate_cluster::query::NamesBlob;
use flowgate_cluster::{StatFilter, StatQuery, StatResponse};

fn value_partials(count: usize) -> Vec<(String, StatResponse)> {
    (0..count)
        .map(|i| {
            (
                format!("node-{i:03}"),
                StatResponse::with_value(format!("{{\"Value\":{i}}}").into_bytes()),
            )
        })
        .collect()
}

fn names_partials(count: usize) -> Vec<(String, StatResponse)> {
    (0..count)
        .map(|i| {
            let names: Vec<String> = (0..32).map(|j| format!("INDICATOR_{}", (i + j) % 48)).collect();
            let blob = serde_json::to_vec(&NamesBlob { names }).unwrap();
            (format!("node-{i:03}"), StatResponse::with_names(blob))
        })
        .collect()
}

fn bench_combine(c: &mut Criterion) {
    let value_query = StatQuery::new(
        StatFilter::PipelineIndicatorValue {
            pipeline_name: "orders".to_string(),
            indicator_name: "EXECUTION_COUNT_ALL".to_string(),
        },
        Duration::from_secs(10),
    );
    let names_query = StatQuery::new(
        StatFilter::PipelineIndicatorNames {
            pipeline_name: "orders".to_string(),
        },
        Duration::from_secs(10),
    );

    c.bench_function("combine_sum_64_members", |b| {
        let partials = value_partials(64);
        b.iter(|| combine_stat_responses(black_box(&value_query), black_box(partials.clone())))
    });

    c.bench_function("combine_names_union_64_members", |b| {
        let partials = names_partials(64);
        b.iter(|| combine_stat_responses(black_box(&names_query), black_box(partials.clone())))
    });
}

criterion_group!(benches, bench_combine);
criterion_main!(benches);
