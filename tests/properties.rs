mod common;

use dev_utils::{build_grid_network, random_requests};
use raptor::request::CancellationToken;
use raptor::{raptor_search, Network, Path, RaptorProfile, RaptorRequest, RaptorService};

const SEEDS: [u64; 3] = [1, 2, 3];
const GRID_SIZE: usize = 5;
const REQUESTS_PER_NETWORK: usize = 8;

fn scenarios(profile: RaptorProfile) -> impl Iterator<Item = (Network, Vec<RaptorRequest>)> {
    SEEDS.into_iter().map(move |seed| {
        let network = build_grid_network(GRID_SIZE, seed);
        let requests = random_requests(&network, profile, REQUESTS_PER_NETWORK, seed + 100);
        (network, requests)
    })
}

// Arrival time, transfers and duration, smaller is better.
fn criteria(path: &Path) -> (i32, u32, i32) {
    (path.arrival_time, path.number_of_transfers, path.duration())
}

fn weakly_dominates(l: &Path, r: &Path) -> bool {
    let (l, r) = (criteria(l), criteria(r));
    l.0 <= r.0 && l.1 <= r.1 && l.2 <= r.2
}

#[test]
fn standard_front_is_pareto_optimal() {
    for (network, requests) in scenarios(RaptorProfile::Standard) {
        for request in &requests {
            let paths = raptor_search(&network, request).unwrap().paths;
            for (i, l) in paths.iter().enumerate() {
                for (j, r) in paths.iter().enumerate() {
                    assert!(i == j || !weakly_dominates(l, r), "{:?} dominates {:?}", criteria(l), criteria(r));
                }
            }
        }
    }
}

#[test]
fn multi_criteria_front_is_pareto_optimal() {
    for (network, requests) in scenarios(RaptorProfile::MultiCriteria) {
        for request in &requests {
            let paths = raptor_search(&network, request).unwrap().paths;
            for (i, l) in paths.iter().enumerate() {
                for (j, r) in paths.iter().enumerate() {
                    let dominated = weakly_dominates(l, r) && l.c1 <= r.c1;
                    assert!(i == j || !dominated, "{} dominates {}", l.display(&network), r.display(&network));
                }
            }
        }
    }
}

#[test]
fn multi_criteria_paths_are_consistent() {
    for (network, requests) in scenarios(RaptorProfile::MultiCriteria) {
        for request in &requests {
            for path in raptor_search(&network, request).unwrap().paths {
                assert_eq!(path.c1, path.legs.iter().map(|leg| leg.c1()).sum::<i32>());
                for pair in path.legs.windows(2) {
                    assert!(pair[0].arrival_time() <= pair[1].departure_time(), "{}", path.display(&network));
                }
                let rides = path.transit_legs().count() as u32;
                assert_eq!(path.number_of_transfers, rides.saturating_sub(1));
            }
        }
    }
}

#[test]
fn repeated_searches_give_the_same_paths() {
    for profile in [RaptorProfile::Standard, RaptorProfile::MultiCriteria] {
        for (network, requests) in scenarios(profile) {
            for request in &requests {
                let first = raptor_search(&network, request).unwrap();
                let second = raptor_search(&network, request).unwrap();
                assert_eq!(first, second);
            }
        }
    }
}

#[test]
fn more_additional_transfers_never_lose_a_path() {
    for (network, requests) in scenarios(RaptorProfile::Standard) {
        for request in &requests {
            let mut previous: Option<Vec<Path>> = None;
            for additional in 0..3 {
                let mut request = request.clone();
                request.search_params.number_of_additional_transfers = additional;
                let paths = raptor_search(&network, &request).unwrap().paths;
                if let Some(previous) = &previous {
                    for path in previous {
                        assert!(
                            paths.iter().any(|p| weakly_dominates(p, path)),
                            "{} lost with {additional} additional transfers",
                            path.display(&network)
                        );
                    }
                }
                previous = Some(paths);
            }
        }
    }
}

#[test]
fn heuristic_pruning_does_not_change_the_front() {
    for (network, requests) in scenarios(RaptorProfile::Standard) {
        for request in &requests {
            let mut pruned = request.clone();
            pruned.optimizations.heuristic_pruning = true;
            let mut expected: Vec<_> = raptor_search(&network, request).unwrap().paths.iter().map(criteria).collect();
            let mut actual: Vec<_> = raptor_search(&network, &pruned).unwrap().paths.iter().map(criteria).collect();
            expected.sort();
            actual.sort();
            assert_eq!(actual, expected);
        }
    }
}

#[test]
fn batch_routing_matches_single_searches() {
    let network = build_grid_network(GRID_SIZE, 9);
    let requests = random_requests(&network, RaptorProfile::Standard, REQUESTS_PER_NETWORK, 9);
    let expected: Vec<_> = requests.iter().map(|request| raptor_search(&network, request)).collect();
    let service = RaptorService::new(network);
    assert_eq!(service.route_all(&requests), expected);
}

#[test]
fn cancelled_search_returns_a_partial_result() {
    let network = build_grid_network(GRID_SIZE, 4);
    for profile in [RaptorProfile::Standard, RaptorProfile::MultiCriteria] {
        let mut request = random_requests(&network, profile, 1, 4).remove(0);
        let token = CancellationToken::new();
        token.cancel();
        request.cancellation = Some(token);
        let response = raptor_search(&network, &request).unwrap();
        assert!(response.timed_out);
        assert!(response.paths.is_empty());

        request.cancellation = None;
        request.search_params.timeout = Some(std::time::Duration::ZERO);
        assert!(raptor_search(&network, &request).unwrap().timed_out);
    }
}
