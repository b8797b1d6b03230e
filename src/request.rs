use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::cost::C2;
use crate::error::{RaptorError, RaptorResult};
use crate::network::{Duration, Timestamp};
use crate::pass_through::{PassThroughPoint, MAX_PASS_THROUGH_POINTS};
use crate::transit::AccessEgress;
use crate::via::ViaLocation;

/// Caller supplied dominance function for c2; `true` if `left` is better in c2 than `right`.
pub type C2DominanceFn = fn(C2, C2) -> bool;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RaptorProfile {
    /// Best arrival time per stop and round.
    #[default]
    Standard,
    /// Pareto optimal arrivals on time, transfers, c1 and c2.
    MultiCriteria,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchDirection {
    Forward,
    Reverse,
}

/// Shared flag for aborting a running search from another thread.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug)]
pub struct SearchParams {
    pub earliest_departure_time: Option<Timestamp>,
    pub latest_arrival_time: Option<Timestamp>,
    /// Width of the departure (or arrival, when searching in reverse) window; 0 runs one iteration.
    pub search_window: Duration,
    /// Rounds to keep going after the last round that improved the destination arrivals.
    pub number_of_additional_transfers: u32,
    pub max_number_of_transfers: u32,
    /// Destination arrivals are compared on `c1 < round(other.c1 * relax_c1)`.
    pub relax_c1: f64,
    /// Keep every departure in the window (later departures are better, not shorter trips).
    pub timetable: bool,
    pub constrained_transfers: bool,
    pub prefer_late_arrival: bool,
    pub pass_through_points: Vec<PassThroughPoint>,
    /// Locations every path must get off at, in order.
    pub via_locations: Vec<ViaLocation>,
    pub transit_group_priority: Option<C2DominanceFn>,
    pub access_paths: Vec<AccessEgress>,
    pub egress_paths: Vec<AccessEgress>,
    pub timeout: Option<std::time::Duration>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            earliest_departure_time: None,
            latest_arrival_time: None,
            search_window: 0,
            number_of_additional_transfers: 5,
            max_number_of_transfers: 12,
            relax_c1: 1.0,
            timetable: false,
            constrained_transfers: false,
            prefer_late_arrival: false,
            pass_through_points: Vec::new(),
            via_locations: Vec::new(),
            transit_group_priority: None,
            access_paths: Vec::new(),
            egress_paths: Vec::new(),
            timeout: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Optimizations {
    /// Compute lower bounds to the destination and prune arrivals that can not improve the result.
    pub heuristic_pruning: bool,
}

#[derive(Clone, Debug, Default)]
pub struct RaptorRequest {
    pub profile: RaptorProfile,
    pub search_params: SearchParams,
    pub optimizations: Optimizations,
    pub cancellation: Option<CancellationToken>,
}

impl RaptorRequest {
    pub fn builder() -> RaptorRequestBuilder {
        RaptorRequestBuilder::default()
    }

    pub fn validate(&self) -> RaptorResult<()> {
        let params = &self.search_params;
        if params.access_paths.is_empty() {
            return Err(RaptorError::NoAccessPaths);
        }
        if params.egress_paths.is_empty() {
            return Err(RaptorError::NoEgressPaths);
        }
        if params.earliest_departure_time.is_none() && params.latest_arrival_time.is_none() {
            return Err(RaptorError::NoSearchTime);
        }
        if params.prefer_late_arrival && params.latest_arrival_time.is_none() {
            return Err(RaptorError::PreferLateArrivalWithoutLatestArrival);
        }
        if params.prefer_late_arrival && params.timetable {
            return Err(RaptorError::PreferLateArrivalWithTimetable);
        }
        if self.profile == RaptorProfile::MultiCriteria && params.prefer_late_arrival {
            return Err(RaptorError::MultiCriteriaReverseSearch);
        }
        if params.search_window < 0 {
            return Err(RaptorError::InvalidSearchParameter(format!(
                "negative search window: {}",
                params.search_window
            )));
        }
        if params.relax_c1.is_nan() || params.relax_c1 < 1.0 {
            return Err(RaptorError::InvalidSearchParameter(format!(
                "relax c1 must be 1.0 or more, not {}",
                params.relax_c1
            )));
        }
        if params.pass_through_points.len() > MAX_PASS_THROUGH_POINTS {
            return Err(RaptorError::InvalidSearchParameter(format!(
                "at most {MAX_PASS_THROUGH_POINTS} pass-through points are supported"
            )));
        }
        if self.uses_c2() && self.profile != RaptorProfile::MultiCriteria {
            return Err(RaptorError::InvalidSearchParameter(
                "pass-through points, via locations and transit-group priority need the multi-criteria profile"
                    .to_string(),
            ));
        }
        let c2_features = [
            !params.pass_through_points.is_empty(),
            !params.via_locations.is_empty(),
            params.transit_group_priority.is_some(),
        ];
        if c2_features.iter().filter(|&&used| used).count() > 1 {
            return Err(RaptorError::InvalidSearchParameter(
                "only one of pass-through points, via locations and transit-group priority can be used".to_string(),
            ));
        }
        Ok(())
    }

    /// Standard searches run in reverse when asked to arrive as late as possible or when only
    /// the latest arrival time is known. Multi-criteria searches always run forward.
    pub fn search_direction(&self) -> SearchDirection {
        let params = &self.search_params;
        let arrive_by = params.prefer_late_arrival || params.earliest_departure_time.is_none();
        if self.profile == RaptorProfile::Standard && arrive_by {
            SearchDirection::Reverse
        } else {
            SearchDirection::Forward
        }
    }

    pub(crate) fn uses_c2(&self) -> bool {
        let params = &self.search_params;
        !params.pass_through_points.is_empty()
            || !params.via_locations.is_empty()
            || params.transit_group_priority.is_some()
    }
}

#[derive(Default)]
pub struct RaptorRequestBuilder {
    request: RaptorRequest,
}

impl RaptorRequestBuilder {
    pub fn profile(mut self, profile: RaptorProfile) -> Self {
        self.request.profile = profile;
        self
    }

    pub fn earliest_departure_time(mut self, time: Timestamp) -> Self {
        self.request.search_params.earliest_departure_time = Some(time);
        self
    }

    pub fn latest_arrival_time(mut self, time: Timestamp) -> Self {
        self.request.search_params.latest_arrival_time = Some(time);
        self
    }

    pub fn search_window(mut self, window: Duration) -> Self {
        self.request.search_params.search_window = window;
        self
    }

    pub fn add_access(mut self, access: AccessEgress) -> Self {
        self.request.search_params.access_paths.push(access);
        self
    }

    pub fn add_egress(mut self, egress: AccessEgress) -> Self {
        self.request.search_params.egress_paths.push(egress);
        self
    }

    pub fn number_of_additional_transfers(mut self, n: u32) -> Self {
        self.request.search_params.number_of_additional_transfers = n;
        self
    }

    pub fn max_number_of_transfers(mut self, n: u32) -> Self {
        self.request.search_params.max_number_of_transfers = n;
        self
    }

    pub fn relax_c1(mut self, factor: f64) -> Self {
        self.request.search_params.relax_c1 = factor;
        self
    }

    pub fn timetable(mut self, enable: bool) -> Self {
        self.request.search_params.timetable = enable;
        self
    }

    pub fn constrained_transfers(mut self, enable: bool) -> Self {
        self.request.search_params.constrained_transfers = enable;
        self
    }

    pub fn prefer_late_arrival(mut self, enable: bool) -> Self {
        self.request.search_params.prefer_late_arrival = enable;
        self
    }

    pub fn add_pass_through_point(mut self, point: PassThroughPoint) -> Self {
        self.request.search_params.pass_through_points.push(point);
        self
    }

    pub fn add_via_location(mut self, location: ViaLocation) -> Self {
        self.request.search_params.via_locations.push(location);
        self
    }

    pub fn transit_group_priority(mut self, dominance: C2DominanceFn) -> Self {
        self.request.search_params.transit_group_priority = Some(dominance);
        self
    }

    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.request.search_params.timeout = Some(timeout);
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.request.cancellation = Some(token);
        self
    }

    pub fn heuristic_pruning(mut self, enable: bool) -> Self {
        self.request.optimizations.heuristic_pruning = enable;
        self
    }

    pub fn build(self) -> RaptorResult<RaptorRequest> {
        self.request.validate()?;
        Ok(self.request)
    }
}

/// Combines the request timeout and cancellation token into one check.
#[derive(Clone, Debug)]
pub(crate) struct Deadline {
    until: Option<Instant>,
    token: Option<CancellationToken>,
}

impl Deadline {
    pub fn new(request: &RaptorRequest) -> Self {
        Self {
            until: request.search_params.timeout.map(|timeout| Instant::now() + timeout),
            token: request.cancellation.clone(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.token.as_ref().is_some_and(CancellationToken::is_cancelled)
            || self.until.is_some_and(|until| Instant::now() >= until)
    }
}
