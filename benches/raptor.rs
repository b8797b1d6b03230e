use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use dev_utils::{build_example_request, get_example_scenario, random_requests};
use raptor::{raptor_search, RaptorProfile, RaptorRequest, RaptorService};

fn raptor_benchmark(c: &mut Criterion) {
    let (network, start, start_time, end) = get_example_scenario();
    let request = build_example_request(RaptorProfile::Standard, start, start_time, end);
    c.bench_function("Raptor", |b| b.iter(|| raptor_search(&network, black_box(&request))));
}

fn reverse_raptor_benchmark(c: &mut Criterion) {
    let (network, start, start_time, end) = get_example_scenario();
    let forward = build_example_request(RaptorProfile::Standard, start, start_time, end);
    let request = RaptorRequest::builder()
        .latest_arrival_time(start_time + 90 * 60)
        .search_window(30 * 60)
        .add_access(forward.search_params.access_paths[0].clone())
        .add_egress(forward.search_params.egress_paths[0].clone())
        .build()
        .unwrap();
    c.bench_function("Reverse Raptor", |b| b.iter(|| raptor_search(&network, black_box(&request))));
}

fn batch_benchmark(c: &mut Criterion) {
    let (network, ..) = get_example_scenario();
    let requests = random_requests(&network, RaptorProfile::Standard, 64, 11);
    let service = RaptorService::new(network);
    c.bench_function("Raptor batch of 64", |b| b.iter(|| service.route_all(black_box(&requests))));
}

criterion_group!(benches, raptor_benchmark, reverse_raptor_benchmark, batch_benchmark);
criterion_main!(benches);
