use crate::constrained::ConstrainedBoardingSearch;
use crate::cost::{Cost, CostCalculator, RaptorCostConverter};
use crate::network::{
    BoardAlight, Duration, GlobalTripIndex, RouteIndex, StopIndex, StopPosition, StopTime, Timestamp, TripIndex,
};
use crate::slack::SlackProvider;

/// Reluctance applied to walking when a transfer or access/egress is created without an explicit cost.
pub const WALK_RELUCTANCE: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub from_stop: StopIndex,
    pub to_stop: StopIndex,
    pub duration: Duration,
    pub c1: Cost,
}

impl Transfer {
    pub fn walk(from_stop: StopIndex, to_stop: StopIndex, duration: Duration) -> Self {
        let c1 = RaptorCostConverter::to_raptor_cost(duration as f64 * WALK_RELUCTANCE);
        Self { from_stop, to_stop, duration, c1 }
    }

    // Used to pareto-filter transfers between the same pair of stops.
    pub(crate) fn dominates(&self, other: &Transfer) -> bool {
        self.duration <= other.duration && self.c1 <= other.c1
    }
}

/// The period in which a time restricted access/egress can be *started*, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpeningHours {
    pub opens: Timestamp,
    pub closes: Timestamp,
}

/// A connection from the origin to a stop (access) or from a stop to the destination (egress).
///
/// Time restrictions are a pure function of the requested time, so the engine can ask again
/// for every iteration without caching anything.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessEgress {
    stop: StopIndex,
    duration: Duration,
    c1: Cost,
    number_of_rides: u32,
    opening_hours: Option<OpeningHours>,
}

impl AccessEgress {
    pub fn new(stop: StopIndex, duration: Duration, c1: Cost) -> Self {
        Self { stop, duration, c1, number_of_rides: 0, opening_hours: None }
    }

    pub fn walk(stop: StopIndex, duration: Duration) -> Self {
        let c1 = RaptorCostConverter::to_raptor_cost(duration as f64 * WALK_RELUCTANCE);
        Self::new(stop, duration, c1)
    }

    /// A connection containing rides of its own (e.g. flex), reaching the stop on-board.
    pub fn with_rides(mut self, number_of_rides: u32) -> Self {
        self.number_of_rides = number_of_rides;
        self
    }

    pub fn with_opening_hours(mut self, opens: Timestamp, closes: Timestamp) -> Self {
        self.opening_hours = Some(OpeningHours { opens, closes });
        self
    }

    pub fn stop(&self) -> StopIndex {
        self.stop
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn c1(&self) -> Cost {
        self.c1
    }

    pub fn number_of_rides(&self) -> u32 {
        self.number_of_rides
    }

    pub fn has_rides(&self) -> bool {
        self.number_of_rides > 0
    }

    pub fn has_opening_hours(&self) -> bool {
        self.opening_hours.is_some()
    }

    pub fn opening_hours(&self) -> Option<OpeningHours> {
        self.opening_hours
    }

    /// The earliest time at or after `requested` the connection can be started, `None` if it
    /// is closed for the rest of the day.
    pub fn earliest_departure_time(&self, requested: Timestamp) -> Option<Timestamp> {
        match self.opening_hours {
            None => Some(requested),
            Some(OpeningHours { opens, .. }) if requested < opens => Some(opens),
            Some(OpeningHours { closes, .. }) if requested > closes => None,
            Some(_) => Some(requested),
        }
    }

    /// The latest time at or before `requested` the connection can be completed, `None` if it
    /// was not open early enough.
    pub fn latest_arrival_time(&self, requested: Timestamp) -> Option<Timestamp> {
        let start = requested - self.duration;
        match self.opening_hours {
            None => Some(requested),
            Some(OpeningHours { closes, .. }) if start > closes => Some(closes + self.duration),
            Some(OpeningHours { opens, .. }) if start < opens => None,
            Some(_) => Some(requested),
        }
    }
}

#[derive(Clone, Copy)]
pub struct Pattern<'a> {
    pub(crate) route: RouteIndex,
    pub(crate) name: &'a str,
    pub(crate) stops: &'a [StopIndex],
    pub(crate) board_alight: &'a [BoardAlight],
    pub(crate) slack_index: usize,
    pub(crate) transit_reluctance_index: usize,
    pub(crate) priority_group: u32,
}

impl<'a> Pattern<'a> {
    pub fn route_index(&self) -> RouteIndex {
        self.route
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn stops(&self) -> &'a [StopIndex] {
        self.stops
    }

    pub fn stop_index(&self, pos: StopPosition) -> StopIndex {
        self.stops[pos as usize]
    }

    pub fn number_of_stops(&self) -> usize {
        self.stops.len()
    }

    pub fn slack_index(&self) -> usize {
        self.slack_index
    }

    pub fn transit_reluctance_index(&self) -> usize {
        self.transit_reluctance_index
    }

    pub fn priority_group(&self) -> u32 {
        self.priority_group
    }

    pub fn boarding_possible_at(&self, pos: StopPosition) -> bool {
        self.board_alight[pos as usize].board
    }

    pub fn alighting_possible_at(&self, pos: StopPosition) -> bool {
        self.board_alight[pos as usize].alight
    }

    /// First position of `stop` at or after `start`.
    pub fn find_stop_position_after(&self, start: StopPosition, stop: StopIndex) -> Option<StopPosition> {
        self.stops
            .iter()
            .enumerate()
            .skip(start as usize)
            .find_map(|(pos, &s)| (s == stop).then_some(pos as StopPosition))
    }
}

#[derive(Clone, Copy)]
pub struct Timetable<'a> {
    pub(crate) pattern: Pattern<'a>,
    pub(crate) stop_times: &'a [StopTime],
}

impl<'a> Timetable<'a> {
    pub fn number_of_trips(&self) -> usize {
        self.stop_times.len() / self.pattern.number_of_stops()
    }

    pub fn trip(&self, trip: TripIndex) -> TripSchedule<'a> {
        let num_stops = self.pattern.number_of_stops();
        let start = trip as usize * num_stops;
        TripSchedule {
            trip: GlobalTripIndex { route_idx: self.pattern.route, trip_idx: trip },
            stop_times: &self.stop_times[start..start + num_stops],
            pattern: self.pattern,
        }
    }

    pub fn departure(&self, trip: TripIndex, pos: StopPosition) -> Timestamp {
        self.stop_times[trip as usize * self.pattern.number_of_stops() + pos as usize].departure_time
    }

    pub fn arrival(&self, trip: TripIndex, pos: StopPosition) -> Timestamp {
        self.stop_times[trip as usize * self.pattern.number_of_stops() + pos as usize].arrival_time
    }
}

#[derive(Clone, Copy)]
pub struct TripSchedule<'a> {
    pub(crate) trip: GlobalTripIndex,
    pub(crate) stop_times: &'a [StopTime],
    pub(crate) pattern: Pattern<'a>,
}

impl<'a> TripSchedule<'a> {
    pub fn trip(&self) -> GlobalTripIndex {
        self.trip
    }

    /// Position of the trip in its (sorted) timetable.
    pub fn trip_sort_index(&self) -> TripIndex {
        self.trip.trip_idx
    }

    pub fn pattern(&self) -> Pattern<'a> {
        self.pattern
    }

    pub fn arrival(&self, pos: StopPosition) -> Timestamp {
        self.stop_times[pos as usize].arrival_time
    }

    pub fn departure(&self, pos: StopPosition) -> Timestamp {
        self.stop_times[pos as usize].departure_time
    }
}

#[derive(Clone, Copy)]
pub struct RouteView<'a> {
    pub pattern: Pattern<'a>,
    pub timetable: Timetable<'a>,
}

/// Read-only transit data the engine routes on.
///
/// Implementations must not change while a search runs; swap the whole provider between
/// searches instead (see [`crate::service::SwappableTransitData`]).
pub trait TransitDataProvider: Sync {
    fn number_of_stops(&self) -> usize;

    fn number_of_routes(&self) -> usize;

    fn routes_for_stop(&self, stop: StopIndex) -> &[RouteIndex];

    /// Every route visiting at least one of `stops`, each route once.
    fn route_index_iterator(&self, stops: &[StopIndex]) -> Vec<RouteIndex> {
        let mut seen = vec![false; self.number_of_routes()];
        let mut routes = Vec::new();
        for &stop in stops {
            for &route in self.routes_for_stop(stop) {
                if !seen[route as usize] {
                    seen[route as usize] = true;
                    routes.push(route);
                }
            }
        }
        routes
    }

    fn route(&self, route: RouteIndex) -> RouteView<'_>;

    fn transfers_from_stop(&self, stop: StopIndex) -> &[Transfer];

    fn transfers_to_stop(&self, stop: StopIndex) -> &[Transfer];

    /// Constraints for boarding `route` when searching forward in time.
    fn transfer_constraints_forward_search(&self, route: RouteIndex) -> ConstrainedBoardingSearch<'_>;

    /// Constraints for alighting `route` when searching backward in time.
    fn transfer_constraints_reverse_search(&self, route: RouteIndex) -> ConstrainedBoardingSearch<'_>;

    fn cost_calculator(&self) -> &CostCalculator;

    fn slack_provider(&self) -> &SlackProvider;

    fn valid_transit_data_start_time(&self) -> Timestamp;

    fn valid_transit_data_end_time(&self) -> Timestamp;

    fn stop_name(&self, stop: StopIndex) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_without_opening_hours_is_always_available() {
        let access = AccessEgress::walk(3, 120);
        assert_eq!(access.earliest_departure_time(100), Some(100));
        assert_eq!(access.latest_arrival_time(100), Some(100));
        assert_eq!(access.c1(), 24_000);
        assert!(!access.has_opening_hours());
    }

    #[test]
    fn opening_hours_shift_or_reject_the_departure() {
        let access = AccessEgress::walk(3, 600).with_opening_hours(36_000, 39_600);
        assert_eq!(access.earliest_departure_time(35_000), Some(36_000));
        assert_eq!(access.earliest_departure_time(37_000), Some(37_000));
        assert_eq!(access.earliest_departure_time(39_600), Some(39_600));
        assert_eq!(access.earliest_departure_time(39_601), None);
    }

    #[test]
    fn opening_hours_shift_or_reject_the_arrival() {
        let egress = AccessEgress::walk(3, 600).with_opening_hours(36_000, 39_600);
        // Starting after closing, so we must start at closing time.
        assert_eq!(egress.latest_arrival_time(41_000), Some(40_200));
        assert_eq!(egress.latest_arrival_time(37_000), Some(37_000));
        // Would have to start before it opens.
        assert_eq!(egress.latest_arrival_time(36_500), None);
    }

    #[test]
    fn transfer_dominance_is_on_duration_and_cost() {
        let fast = Transfer { from_stop: 0, to_stop: 1, duration: 60, c1: 500 };
        let cheap = Transfer { from_stop: 0, to_stop: 1, duration: 90, c1: 100 };
        assert!(!fast.dominates(&cheap));
        assert!(!cheap.dominates(&fast));
        assert!(fast.dominates(&Transfer { duration: 60, c1: 600, ..fast }));
    }
}
