use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};

use dev_utils::{build_example_request, get_example_scenario};
use raptor::{raptor_search, RaptorProfile};

fn mc_raptor_benchmark(c: &mut Criterion) {
    let (network, start, start_time, end) = get_example_scenario();
    let request = build_example_request(RaptorProfile::MultiCriteria, start, start_time, end);
    c.bench_function("McRaptor", |b| b.iter(|| raptor_search(&network, black_box(&request))));
}

fn mc_raptor_heuristics_benchmark(c: &mut Criterion) {
    let (network, start, start_time, end) = get_example_scenario();
    let mut request = build_example_request(RaptorProfile::MultiCriteria, start, start_time, end);
    request.optimizations.heuristic_pruning = true;
    c.bench_function("McRaptor with heuristics", |b| b.iter(|| raptor_search(&network, black_box(&request))));
}

criterion_group!(benches, mc_raptor_benchmark, mc_raptor_heuristics_benchmark);
criterion_main!(benches);
