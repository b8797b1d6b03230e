use crate::constrained::TransferConstraint;
use crate::network::{StopPosition, Timestamp, TripIndex};
use crate::transit::Timetable;

// Timetables with more trips than this are binary searched when the search is unbounded.
const BINARY_SEARCH_THRESHOLD: usize = 50;

/// The result of a trip search: the trip to board (forward) or alight (reverse) and when.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardAlightEvent {
    pub trip_index: Option<TripIndex>,
    pub stop_pos: StopPosition,
    /// Departure (forward) or arrival (reverse) of the trip at `stop_pos`.
    pub time: Timestamp,
    pub earliest_board_time: Timestamp,
    pub transfer_constraint: Option<TransferConstraint>,
}

impl BoardAlightEvent {
    pub fn empty(stop_pos: StopPosition, time_bound: Timestamp) -> Self {
        Self {
            trip_index: None,
            stop_pos,
            time: time_bound,
            earliest_board_time: time_bound,
            transfer_constraint: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trip_index.is_none()
    }
}

pub struct TripScheduleSearch<'a> {
    timetable: Timetable<'a>,
    forward: bool,
}

impl<'a> TripScheduleSearch<'a> {
    pub fn forward(timetable: Timetable<'a>) -> Self {
        Self { timetable, forward: true }
    }

    pub fn reverse(timetable: Timetable<'a>) -> Self {
        Self { timetable, forward: false }
    }

    /// Forward: the earliest trip departing at or after `time_bound` with an index below
    /// `trip_index_limit`. Reverse: the latest trip arriving at or before `time_bound` with an
    /// index above `trip_index_limit`.
    pub fn search(
        &self,
        time_bound: Timestamp,
        stop_pos: StopPosition,
        trip_index_limit: Option<TripIndex>,
    ) -> BoardAlightEvent {
        let found = if self.forward {
            self.find_departure(time_bound, stop_pos, trip_index_limit)
        } else {
            self.find_arrival(time_bound, stop_pos, trip_index_limit)
        };
        match found {
            Some((trip_index, time)) => BoardAlightEvent {
                trip_index: Some(trip_index),
                stop_pos,
                time,
                earliest_board_time: time_bound,
                transfer_constraint: None,
            },
            None => BoardAlightEvent::empty(stop_pos, time_bound),
        }
    }

    fn find_departure(
        &self,
        time_bound: Timestamp,
        stop_pos: StopPosition,
        limit: Option<TripIndex>,
    ) -> Option<(TripIndex, Timestamp)> {
        let num_trips = self.timetable.number_of_trips();
        let departure = |trip: usize| self.timetable.departure(trip as TripIndex, stop_pos);

        if limit.is_none() && num_trips > BINARY_SEARCH_THRESHOLD {
            // Trips never overtake, so departures at a stop are sorted like the trips.
            let (mut lo, mut hi) = (0, num_trips);
            while lo < hi {
                let mid = (lo + hi) / 2;
                if departure(mid) < time_bound {
                    lo = mid + 1;
                } else {
                    hi = mid;
                }
            }
            return (lo < num_trips).then(|| (lo as TripIndex, departure(lo)));
        }

        // The limit only ever decreases within a route scan, so every trip is looked at
        // no more than once per round.
        let upper = limit.map_or(num_trips, |limit| (limit as usize).min(num_trips));
        (0..upper)
            .rev()
            .map(|trip| (trip as TripIndex, departure(trip)))
            .take_while(|&(_, time)| time >= time_bound)
            .last()
    }

    fn find_arrival(
        &self,
        time_bound: Timestamp,
        stop_pos: StopPosition,
        limit: Option<TripIndex>,
    ) -> Option<(TripIndex, Timestamp)> {
        let num_trips = self.timetable.number_of_trips();
        let arrival = |trip: usize| self.timetable.arrival(trip as TripIndex, stop_pos);

        if limit.is_none() && num_trips > BINARY_SEARCH_THRESHOLD {
            let (mut lo, mut hi) = (0, num_trips);
            while lo < hi {
                let mid = (lo + hi) / 2;
                if arrival(mid) <= time_bound {
                    lo = mid + 1;
                } else {
                    hi = mid;
                }
            }
            return (lo > 0).then(|| ((lo - 1) as TripIndex, arrival(lo - 1)));
        }

        let lower = limit.map_or(0, |limit| limit as usize + 1);
        (lower..num_trips)
            .map(|trip| (trip as TripIndex, arrival(trip)))
            .take_while(|&(_, time)| time <= time_bound)
            .last()
    }
}
