use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::calculator::TransitCalculator;
use crate::destination::{DestinationArrivals, DestinationComparator};
use crate::error::{RaptorError, RaptorResult};
use crate::heuristic::Heuristics;
use crate::journey::{Path, PathMapper};
use crate::multicriteria::McRangeRaptorWorker;
use crate::network::{Duration, Timestamp};
use crate::pass_through::PassThroughPoints;
use crate::raptor::{SearchOutcome, StdRangeRaptorWorker};
use crate::request::{C2DominanceFn, RaptorProfile, RaptorRequest, SearchDirection};
use crate::transit::TransitDataProvider;
use crate::via::ViaStages;

/// Search window used when the earliest departure time is derived from the latest arrival
/// time and the request did not give one.
pub const DYNAMIC_SEARCH_WINDOW: Duration = 60 * 60;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RaptorResponse {
    pub paths: Vec<Path>,
    /// The search stopped early on its timeout or cancellation; `paths` holds what was found.
    pub timed_out: bool,
    /// Range raptor iterations run.
    pub iterations: usize,
    pub search_direction: SearchDirection,
    /// Start of the departure window that was searched, if known.
    pub earliest_departure_time: Option<Timestamp>,
}

impl RaptorResponse {
    fn empty(search_direction: SearchDirection) -> Self {
        Self { paths: Vec::new(), timed_out: false, iterations: 0, search_direction, earliest_departure_time: None }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn check_connection_stops<T: TransitDataProvider>(transit: &T, request: &RaptorRequest) -> RaptorResult<()> {
    let num_stops = transit.number_of_stops();
    let params = &request.search_params;
    for connection in params.access_paths.iter().chain(&params.egress_paths) {
        if connection.stop() as usize >= num_stops {
            return Err(RaptorError::UnknownStop { stop: connection.stop(), num_stops });
        }
    }
    Ok(())
}

fn destination_arrivals(
    request: &RaptorRequest,
    calculator: TransitCalculator,
    pass_through: Option<&PassThroughPoints>,
    via: Option<&ViaStages>,
) -> DestinationArrivals {
    let params = &request.search_params;
    if request.profile == RaptorProfile::Standard {
        return DestinationArrivals::new(DestinationComparator::new(calculator, params.timetable, None, None));
    }
    let c2 = match (pass_through, via) {
        (Some(_), _) => Some(PassThroughPoints::dominance as C2DominanceFn),
        (None, Some(_)) => Some(ViaStages::dominance as C2DominanceFn),
        (None, None) => params.transit_group_priority,
    };
    let comparator = DestinationComparator::new(calculator, params.timetable, Some(params.relax_c1), c2);
    let arrivals = DestinationArrivals::new(comparator);
    match (pass_through, via) {
        (Some(points), _) => {
            let points = points.clone();
            arrivals.with_c2_acceptance(move |c2| points.accept_c2_at_destination(c2))
        }
        (None, Some(stages)) => {
            let stages = stages.clone();
            arrivals.with_c2_acceptance(move |c2| stages.accept_c2_at_destination(c2))
        }
        (None, None) => arrivals,
    }
}

/// Runs one journey search.
///
/// Checks the request, then runs a standard or multi-criteria range raptor search in the
/// direction the request asks for and maps the destination arrivals to paths. When heuristic
/// pruning is on, the lower bounds to the destination are computed on the rayon pool while
/// the search runs.
pub fn raptor_search<T: TransitDataProvider>(transit: &T, request: &RaptorRequest) -> RaptorResult<RaptorResponse> {
    request.validate()?;
    check_connection_stops(transit, request)?;

    let direction = request.search_direction();
    let calculator = match direction {
        SearchDirection::Forward => TransitCalculator::forward(),
        SearchDirection::Reverse => TransitCalculator::reverse(),
    };
    let params = &request.search_params;
    let pass_through = if params.pass_through_points.is_empty() {
        None
    } else {
        Some(PassThroughPoints::new(&params.pass_through_points, transit.number_of_stops())?)
    };
    let via = if params.via_locations.is_empty() {
        None
    } else {
        Some(ViaStages::new(&params.via_locations, transit.number_of_stops())?)
    };

    let dynamic_departure =
        request.profile == RaptorProfile::MultiCriteria && params.earliest_departure_time.is_none();
    let prune = request.optimizations.heuristic_pruning && direction == SearchDirection::Forward;
    let heuristics = Heuristics::new(transit.number_of_stops());
    let cancel_heuristics = AtomicBool::new(false);
    let max_rounds = params.max_number_of_transfers as usize + 1;

    let compute_heuristics = || heuristics.compute(transit, &params.egress_paths, max_rounds, &cancel_heuristics);

    let resolved;
    let request = if dynamic_departure {
        compute_heuristics();
        let Some(latest_arrival_time) = params.latest_arrival_time else {
            return Err(RaptorError::NoSearchTime);
        };
        let Some(min_duration) = heuristics.min_travel_duration_from(&params.access_paths) else {
            info!("Destination is not reachable from any access, nothing to search.");
            return Ok(RaptorResponse::empty(direction));
        };
        let window = if params.search_window == 0 { DYNAMIC_SEARCH_WINDOW } else { params.search_window };
        let earliest_departure_time = latest_arrival_time - min_duration - window;
        debug!(
            "Derived earliest departure {earliest_departure_time} from latest arrival {latest_arrival_time} \
             and minimum travel time {min_duration}."
        );
        let mut dynamic = request.clone();
        dynamic.search_params.earliest_departure_time = Some(earliest_departure_time);
        dynamic.search_params.search_window = window;
        resolved = dynamic;
        &resolved
    } else {
        request
    };
    let params = &request.search_params;
    let start = match direction {
        SearchDirection::Forward => params.earliest_departure_time,
        SearchDirection::Reverse => params.latest_arrival_time,
    }
    .ok_or(RaptorError::NoSearchTime)?;

    let destination = destination_arrivals(request, calculator, pass_through.as_ref(), via.as_ref());
    let pruning = prune.then_some(&heuristics);
    let run_worker = || {
        let outcome = match request.profile {
            RaptorProfile::Standard => {
                StdRangeRaptorWorker::new(transit, request, calculator, destination, pruning).run(start)
            }
            RaptorProfile::MultiCriteria => {
                McRangeRaptorWorker::new(transit, request, destination, pass_through, via, pruning).run(start)
            }
        };
        cancel_heuristics.store(true, Ordering::Relaxed);
        outcome
    };
    // The worker prunes with whatever bounds are ready, so the heuristics run beside it.
    let outcome = if prune && !dynamic_departure {
        rayon::join(run_worker, compute_heuristics).0
    } else {
        run_worker()
    };

    let SearchOutcome { arena, destination, iterations, timed_out } = outcome?;
    let mapper = PathMapper::new(
        transit,
        calculator,
        &params.access_paths,
        &params.egress_paths,
        request.profile == RaptorProfile::Standard,
        request.uses_c2(),
    );
    let mut paths =
        destination.iter().map(|arrival| mapper.map(&arena, arrival)).collect::<Result<Vec<_>, _>>()?;
    paths.sort_by_key(|path| {
        (path.arrival_time, path.number_of_transfers, Reverse(path.departure_time), path.c1, path.c2)
    });

    if timed_out {
        warn!("Search timed out after {iterations} iterations with {} paths.", paths.len());
    } else {
        info!("Search found {} paths in {iterations} iterations.", paths.len());
    }
    Ok(RaptorResponse {
        paths,
        timed_out,
        iterations,
        search_direction: direction,
        earliest_departure_time: params.earliest_departure_time,
    })
}

/// Transit data that can be replaced while searches run. A search holds on to the snapshot it
/// started with.
pub struct SwappableTransitData<T> {
    data: RwLock<Arc<T>>,
}

impl<T> SwappableTransitData<T> {
    pub fn new(data: T) -> Self {
        Self { data: RwLock::new(Arc::new(data)) }
    }

    pub fn current(&self) -> Arc<T> {
        self.data.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Installs `data` for new searches, returning the previous snapshot.
    pub fn swap(&self, data: T) -> Arc<T> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(data))
    }
}

/// Journey planning over swappable transit data.
pub struct RaptorService<T> {
    transit: SwappableTransitData<T>,
}

impl<T: TransitDataProvider + Send> RaptorService<T> {
    pub fn new(transit: T) -> Self {
        Self { transit: SwappableTransitData::new(transit) }
    }

    pub fn transit_data(&self) -> &SwappableTransitData<T> {
        &self.transit
    }

    pub fn route(&self, request: &RaptorRequest) -> RaptorResult<RaptorResponse> {
        let transit = self.transit.current();
        raptor_search(transit.as_ref(), request)
    }

    /// Runs independent requests in parallel, all against the same snapshot.
    pub fn route_all(&self, requests: &[RaptorRequest]) -> Vec<RaptorResult<RaptorResponse>> {
        let transit = self.transit.current();
        debug!("Routing {} requests in parallel.", requests.len());
        requests.par_iter().map(|request| raptor_search(transit.as_ref(), request)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Network, NetworkBuilder, StopIndex};
    use crate::transit::AccessEgress;

    fn line() -> (Network, StopIndex, StopIndex) {
        let mut builder = NetworkBuilder::new();
        let a = builder.add_stop("A");
        let b = builder.add_stop("B");
        let r1 = builder.add_route("R1", &[a, b]);
        builder.add_trip_times(r1, &[36_000, 37_200]);
        (builder.build().unwrap(), a, b)
    }

    #[test]
    fn unknown_access_stop_is_rejected() {
        let (network, _, b) = line();
        let request = RaptorRequest::builder()
            .earliest_departure_time(35_000)
            .add_access(AccessEgress::walk(17, 60))
            .add_egress(AccessEgress::walk(b, 60))
            .build()
            .unwrap();
        assert_eq!(raptor_search(&network, &request), Err(RaptorError::UnknownStop { stop: 17, num_stops: 2 }));
    }

    #[test]
    fn multi_criteria_search_derives_its_departure_from_the_arrival_time() {
        let (network, a, b) = line();
        let request = RaptorRequest::builder()
            .profile(RaptorProfile::MultiCriteria)
            .latest_arrival_time(37_500)
            .add_access(AccessEgress::walk(a, 60))
            .add_egress(AccessEgress::walk(b, 60))
            .build()
            .unwrap();
        let response = raptor_search(&network, &request).unwrap();
        // 37_500 - (60 + 1_200 + 60) - 3_600
        assert_eq!(response.earliest_departure_time, Some(32_580));
        assert_eq!(response.search_direction, SearchDirection::Forward);
        assert_eq!(response.paths.len(), 1);
        assert_eq!(response.paths[0].arrival_time, 37_260);
    }

    #[test]
    fn pruned_search_finishes_on_a_single_thread_pool() {
        let (network, a, b) = line();
        let request = RaptorRequest::builder()
            .earliest_departure_time(35_000)
            .heuristic_pruning(true)
            .add_access(AccessEgress::walk(a, 60))
            .add_egress(AccessEgress::walk(b, 60))
            .build()
            .unwrap();
        let expected = raptor_search(&network, &request).unwrap();
        assert_eq!(expected.paths.len(), 1);

        // The heuristics can only run after the worker here, and must not hold it up.
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let service = RaptorService::new(network);
        let responses = pool.install(|| service.route_all(&[request.clone(), request]));
        for response in responses {
            assert_eq!(response.unwrap(), expected);
        }
    }

    #[test]
    fn unreachable_destination_gives_an_empty_response() {
        let (network, a, b) = line();
        let request = RaptorRequest::builder()
            .profile(RaptorProfile::MultiCriteria)
            .latest_arrival_time(37_500)
            .add_access(AccessEgress::walk(b, 60))
            .add_egress(AccessEgress::walk(a, 60))
            .build()
            .unwrap();
        assert!(raptor_search(&network, &request).unwrap().is_empty());
    }

    #[test]
    fn swapped_data_is_used_by_new_searches_only() {
        let (network, a, b) = line();
        let service = RaptorService::new(network);
        let before = service.transit_data().current();

        let mut builder = NetworkBuilder::new();
        let c = builder.add_stop("C");
        let d = builder.add_stop("D");
        let r1 = builder.add_route("R1", &[c, d]);
        builder.add_trip_times(r1, &[36_000, 36_600]);
        let old = service.transit_data().swap(builder.build().unwrap());

        assert!(Arc::ptr_eq(&before, &old));
        let request = RaptorRequest::builder()
            .earliest_departure_time(35_000)
            .add_access(AccessEgress::walk(a, 60))
            .add_egress(AccessEgress::walk(b, 60))
            .build()
            .unwrap();
        let responses = service.route_all(&[request.clone(), request]);
        assert_eq!(responses.len(), 2);
        for response in responses {
            assert_eq!(response.unwrap().paths[0].arrival_time, 36_660);
        }
    }
}
