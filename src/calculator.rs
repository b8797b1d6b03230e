use crate::constrained::ConstrainedBoardingSearch;
use crate::network::{Duration, RouteIndex, StopIndex, StopPosition, Timestamp, TripIndex};
use crate::slack::SlackProvider;
use crate::transit::{Pattern, Timetable, TransitDataProvider, Transfer};
use crate::trip_search::TripScheduleSearch;

/// Length of the step between two range raptor iterations.
pub const ITERATION_STEP: Duration = 60;

/// Hides the search direction from the workers. "Board", "alight" and "arrival" are in the
/// direction of the search: a reverse search boards at a trip's arrival and alights at its
/// departure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitCalculator {
    forward: bool,
}

impl TransitCalculator {
    pub fn forward() -> Self {
        Self { forward: true }
    }

    pub fn reverse() -> Self {
        Self { forward: false }
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    pub fn plus_duration(&self, time: Timestamp, duration: Duration) -> Timestamp {
        if self.forward { time + duration } else { time - duration }
    }

    pub fn minus_duration(&self, time: Timestamp, duration: Duration) -> Timestamp {
        if self.forward { time - duration } else { time + duration }
    }

    /// The (positive) time between `from` and a later (in search direction) `to`.
    pub fn duration(&self, from: Timestamp, to: Timestamp) -> Duration {
        if self.forward { to - from } else { from - to }
    }

    pub fn is_better(&self, subject: Timestamp, candidate: Timestamp) -> bool {
        if self.forward { subject < candidate } else { subject > candidate }
    }

    pub fn unreached_time(&self) -> Timestamp {
        if self.forward { Timestamp::MAX } else { Timestamp::MIN }
    }

    /// Stop positions of a pattern in the order a trip is ridden in.
    pub fn stop_positions(&self, number_of_stops: usize) -> Box<dyn Iterator<Item = StopPosition>> {
        let positions = 0..number_of_stops as StopPosition;
        if self.forward { Box::new(positions) } else { Box::new(positions.rev()) }
    }

    pub fn board_slack(&self, slack: &SlackProvider, slack_index: usize) -> Duration {
        if self.forward { slack.board_slack(slack_index) } else { slack.alight_slack(slack_index) }
    }

    pub fn alight_slack(&self, slack: &SlackProvider, slack_index: usize) -> Duration {
        if self.forward { slack.alight_slack(slack_index) } else { slack.board_slack(slack_index) }
    }

    pub fn board_time(&self, timetable: &Timetable, trip: TripIndex, pos: StopPosition) -> Timestamp {
        if self.forward { timetable.departure(trip, pos) } else { timetable.arrival(trip, pos) }
    }

    pub fn alight_time(&self, timetable: &Timetable, trip: TripIndex, pos: StopPosition) -> Timestamp {
        if self.forward { timetable.arrival(trip, pos) } else { timetable.departure(trip, pos) }
    }

    pub fn boarding_possible_at(&self, pattern: &Pattern, pos: StopPosition) -> bool {
        if self.forward { pattern.boarding_possible_at(pos) } else { pattern.alighting_possible_at(pos) }
    }

    pub fn alighting_possible_at(&self, pattern: &Pattern, pos: StopPosition) -> bool {
        if self.forward { pattern.alighting_possible_at(pos) } else { pattern.boarding_possible_at(pos) }
    }

    /// `true` if `subject` is a trip we would rather ride than `current`.
    pub fn is_better_trip(&self, subject: TripIndex, current: Option<TripIndex>) -> bool {
        match current {
            None => true,
            Some(current) if self.forward => subject < current,
            Some(current) => subject > current,
        }
    }

    pub fn trip_search<'a>(&self, timetable: Timetable<'a>) -> TripScheduleSearch<'a> {
        if self.forward { TripScheduleSearch::forward(timetable) } else { TripScheduleSearch::reverse(timetable) }
    }

    pub fn transfer_constraints_search<'a, T: TransitDataProvider>(
        &self,
        transit: &'a T,
        route: RouteIndex,
    ) -> ConstrainedBoardingSearch<'a> {
        if self.forward {
            transit.transfer_constraints_forward_search(route)
        } else {
            transit.transfer_constraints_reverse_search(route)
        }
    }

    pub fn transfers<'a, T: TransitDataProvider>(&self, transit: &'a T, stop: StopIndex) -> &'a [Transfer] {
        if self.forward { transit.transfers_from_stop(stop) } else { transit.transfers_to_stop(stop) }
    }

    /// The stop a transfer leads to in this direction.
    pub fn transfer_target(&self, transfer: &Transfer) -> StopIndex {
        if self.forward { transfer.to_stop } else { transfer.from_stop }
    }

    /// Iteration start times, latest departure first (forward) or earliest arrival first (reverse).
    pub fn iteration_times(&self, start: Timestamp, search_window: Duration) -> Vec<Timestamp> {
        let steps = search_window.max(0) / ITERATION_STEP;
        (0..=steps)
            .rev()
            .map(|step| self.plus_duration(start, step * ITERATION_STEP))
            .collect()
    }
}
