use std::fmt::Display;

use crate::error::{RaptorError, RaptorResult};
use crate::network::{GlobalTripIndex, StopPosition, Timestamp, TripIndex};
use crate::transit::Timetable;
use crate::trip_search::BoardAlightEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransferConstraint {
    Regular,
    StaySeated,
    Guaranteed,
    NotAllowed,
}

impl TransferConstraint {
    /// Stay-seated and guaranteed transfers are kept regardless of slack.
    pub fn is_facilitated(self) -> bool {
        matches!(self, TransferConstraint::StaySeated | TransferConstraint::Guaranteed)
    }

    pub fn is_stay_seated(self) -> bool {
        self == TransferConstraint::StaySeated
    }

    pub fn is_guaranteed(self) -> bool {
        self == TransferConstraint::Guaranteed
    }

    pub fn is_not_allowed(self) -> bool {
        self == TransferConstraint::NotAllowed
    }
}

impl Display for TransferConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransferConstraint::Regular => "regular",
            TransferConstraint::StaySeated => "stay-seated",
            TransferConstraint::Guaranteed => "guaranteed",
            TransferConstraint::NotAllowed => "not-allowed",
        };
        write!(f, "{name}")
    }
}

/// A transfer between two specific trips.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstrainedTransfer {
    pub from_trip: GlobalTripIndex,
    pub from_stop_pos: StopPosition,
    pub to_trip: GlobalTripIndex,
    pub to_stop_pos: StopPosition,
    pub constraint: TransferConstraint,
}

/// The constrained transfers *into* one route, in search order.
///
/// In a forward search the route is the `to` side of the transfers, in a reverse search the
/// `from` side; "source" and "target" below are relative to the search direction.
pub struct ConstrainedBoardingSearch<'a> {
    transfers: &'a [ConstrainedTransfer],
    forward: bool,
}

impl<'a> ConstrainedBoardingSearch<'a> {
    pub fn new(transfers: &'a [ConstrainedTransfer], forward: bool) -> Self {
        Self { transfers, forward }
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    fn source(&self, tx: &ConstrainedTransfer) -> (GlobalTripIndex, StopPosition) {
        if self.forward { (tx.from_trip, tx.from_stop_pos) } else { (tx.to_trip, tx.to_stop_pos) }
    }

    fn target(&self, tx: &ConstrainedTransfer) -> (GlobalTripIndex, StopPosition) {
        if self.forward { (tx.to_trip, tx.to_stop_pos) } else { (tx.from_trip, tx.from_stop_pos) }
    }

    pub fn transfer_exist_target_stop(&self, target_stop_pos: StopPosition) -> bool {
        self.transfers.iter().any(|tx| self.target(tx).1 == target_stop_pos)
    }

    fn constraint_for(
        &self,
        source: (GlobalTripIndex, StopPosition),
        target: (GlobalTripIndex, StopPosition),
    ) -> RaptorResult<Option<TransferConstraint>> {
        let mut matching = self
            .transfers
            .iter()
            .filter(|tx| self.source(tx) == source && self.target(tx) == target);
        let found = matching.next().map(|tx| tx.constraint);
        if matching.next().is_some() {
            return Err(RaptorError::DuplicateConstrainedTransfer {
                route: target.0.route_idx,
                source_trip: source.0.trip_idx,
                source_pos: source.1,
                target_trip: target.0.trip_idx,
                target_pos: target.1,
            });
        }
        Ok(found)
    }

    /// Finds the trip to board (forward) or alight (reverse) at `target_stop_pos` coming from
    /// `source_trip`.
    ///
    /// Facilitated transfers only need the trips to connect at `source_arrival_time`, other
    /// trips must be reachable at `earliest_board_time`. Trips the source is not allowed to
    /// transfer to are skipped. Returns `None` when the constraints do not change the result
    /// of a regular trip search, and an empty event tagged `NotAllowed` when every reachable
    /// trip is blocked or the target stop does not allow boarding.
    pub fn find(
        &self,
        timetable: Timetable,
        source_trip: GlobalTripIndex,
        source_stop_pos: StopPosition,
        target_stop_pos: StopPosition,
        source_arrival_time: Timestamp,
        earliest_board_time: Timestamp,
    ) -> RaptorResult<Option<BoardAlightEvent>> {
        let possible = if self.forward {
            timetable.pattern.boarding_possible_at(target_stop_pos)
        } else {
            timetable.pattern.alighting_possible_at(target_stop_pos)
        };
        if !possible {
            return Ok(Some(BoardAlightEvent {
                transfer_constraint: Some(TransferConstraint::NotAllowed),
                ..BoardAlightEvent::empty(target_stop_pos, earliest_board_time)
            }));
        }
        let route = timetable.pattern.route;
        let num_trips = timetable.number_of_trips() as TripIndex;
        let trips: Box<dyn Iterator<Item = TripIndex>> =
            if self.forward { Box::new(0..num_trips) } else { Box::new((0..num_trips).rev()) };

        let mut blocked = false;
        for trip in trips {
            let (time, connects, boardable) = if self.forward {
                let time = timetable.departure(trip, target_stop_pos);
                (time, time >= source_arrival_time, time >= earliest_board_time)
            } else {
                let time = timetable.arrival(trip, target_stop_pos);
                (time, time <= source_arrival_time, time <= earliest_board_time)
            };
            if !connects {
                continue;
            }
            let target = (GlobalTripIndex { route_idx: route, trip_idx: trip }, target_stop_pos);
            let constraint = self.constraint_for((source_trip, source_stop_pos), target)?;
            let event = |constraint| BoardAlightEvent {
                trip_index: Some(trip),
                stop_pos: target_stop_pos,
                time,
                earliest_board_time,
                transfer_constraint: Some(constraint),
            };
            match constraint {
                Some(TransferConstraint::NotAllowed) => blocked = true,
                Some(c) if c.is_facilitated() => return Ok(Some(event(c))),
                _ if !boardable => {}
                Some(_) => return Ok(Some(event(TransferConstraint::Regular))),
                None if blocked => return Ok(Some(event(TransferConstraint::Regular))),
                None => return Ok(None),
            }
        }
        if blocked {
            return Ok(Some(BoardAlightEvent {
                transfer_constraint: Some(TransferConstraint::NotAllowed),
                ..BoardAlightEvent::empty(target_stop_pos, earliest_board_time)
            }));
        }
        Ok(None)
    }
}
