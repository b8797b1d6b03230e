use std::fmt::Display;

use crate::calculator::TransitCalculator;
use crate::constrained::TransferConstraint;
use crate::cost::{Cost, RaptorCostConverter, C2};
use crate::destination::DestinationArrival;
use crate::network::{Duration, GlobalTripIndex, StopIndex, StopPosition, Timestamp};
use crate::transit::{AccessEgress, Transfer, TransitDataProvider};
use crate::utils;

pub(crate) type ArrivalIndex = u32;

/// How a stop arrival was reached. Times and positions are stored as they happen on the
/// street or trip, i.e. departure before arrival, whatever the direction of the search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum ArrivalKind {
    /// Seeded from the access (forward) or egress (reverse) at `connection`.
    Seed {
        connection: usize,
        departure_time: Timestamp,
        arrival_time: Timestamp,
        rides: u32,
    },
    Transit {
        trip: GlobalTripIndex,
        board_pos: StopPosition,
        alight_pos: StopPosition,
        board_time: Timestamp,
        alight_time: Timestamp,
        constraint: Option<TransferConstraint>,
    },
    Transfer {
        transfer: Transfer,
        departure_time: Timestamp,
        arrival_time: Timestamp,
    },
}

/// A stop arrival kept in the arena. `previous` points towards the origin of the search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ArrivalRecord {
    pub stop: StopIndex,
    /// Arrival time in the direction of the search.
    pub time: Timestamp,
    pub round: u32,
    pub c1: Cost,
    pub c2: C2,
    pub previous: Option<ArrivalIndex>,
    pub kind: ArrivalKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessEgressLeg {
    pub stop: StopIndex,
    pub departure_time: Timestamp,
    pub arrival_time: Timestamp,
    pub number_of_rides: u32,
    pub c1: Cost,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitLeg {
    pub trip: GlobalTripIndex,
    pub route_name: Box<str>,
    pub board_stop: StopIndex,
    pub board_stop_pos: StopPosition,
    pub board_time: Timestamp,
    pub alight_stop: StopIndex,
    pub alight_stop_pos: StopPosition,
    pub alight_time: Timestamp,
    /// The constraint of the transfer onto this trip, if any.
    pub constraint: Option<TransferConstraint>,
    pub c1: Cost,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferLeg {
    pub from_stop: StopIndex,
    pub to_stop: StopIndex,
    pub departure_time: Timestamp,
    pub arrival_time: Timestamp,
    /// Part of a constrained transfer between the surrounding trips.
    pub constrained: bool,
    pub c1: Cost,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathLeg {
    Access(AccessEgressLeg),
    Transit(TransitLeg),
    Transfer(TransferLeg),
    Egress(AccessEgressLeg),
}

impl PathLeg {
    pub fn departure_time(&self) -> Timestamp {
        match self {
            PathLeg::Access(leg) | PathLeg::Egress(leg) => leg.departure_time,
            PathLeg::Transit(leg) => leg.board_time,
            PathLeg::Transfer(leg) => leg.departure_time,
        }
    }

    pub fn arrival_time(&self) -> Timestamp {
        match self {
            PathLeg::Access(leg) | PathLeg::Egress(leg) => leg.arrival_time,
            PathLeg::Transit(leg) => leg.alight_time,
            PathLeg::Transfer(leg) => leg.arrival_time,
        }
    }

    pub fn c1(&self) -> Cost {
        match self {
            PathLeg::Access(leg) | PathLeg::Egress(leg) => leg.c1,
            PathLeg::Transit(leg) => leg.c1,
            PathLeg::Transfer(leg) => leg.c1,
        }
    }

    pub fn is_transit(&self) -> bool {
        matches!(self, PathLeg::Transit(_))
    }
}

/// A journey from origin to destination: access, transit and transfer legs, then egress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    pub legs: Vec<PathLeg>,
    pub departure_time: Timestamp,
    pub arrival_time: Timestamp,
    pub number_of_transfers: u32,
    pub c1: Cost,
    pub c2: Option<C2>,
    /// Start time of the range raptor iteration that found the path.
    pub iteration_departure_time: Timestamp,
}

impl Path {
    pub fn duration(&self) -> Duration {
        self.arrival_time - self.departure_time
    }

    pub fn transit_legs(&self) -> impl Iterator<Item = &TransitLeg> {
        self.legs.iter().filter_map(|leg| match leg {
            PathLeg::Transit(leg) => Some(leg),
            _ => None,
        })
    }

    pub fn access_leg(&self) -> Option<&AccessEgressLeg> {
        match self.legs.first() {
            Some(PathLeg::Access(leg)) => Some(leg),
            _ => None,
        }
    }

    pub fn egress_leg(&self) -> Option<&AccessEgressLeg> {
        match self.legs.last() {
            Some(PathLeg::Egress(leg)) => Some(leg),
            _ => None,
        }
    }

    /// Formats the path with stop names looked up in `transit`.
    pub fn display<'a, T: TransitDataProvider>(&'a self, transit: &'a T) -> PathDisplay<'a, T> {
        PathDisplay { path: self, transit }
    }
}

pub struct PathDisplay<'a, T> {
    path: &'a Path,
    transit: &'a T,
}

fn street_leg_str(duration: Duration, rides: u32) -> String {
    if rides > 0 {
        format!("Flex {} {}x", utils::get_duration_str(duration), rides)
    } else {
        format!("Walk {}", utils::get_duration_str(duration))
    }
}

impl<T: TransitDataProvider> Display for PathDisplay<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = self.path;
        for (i, leg) in path.legs.iter().enumerate() {
            if i > 0 {
                write!(f, " ~ ")?;
            }
            match leg {
                PathLeg::Access(leg) => {
                    let street = street_leg_str(leg.arrival_time - leg.departure_time, leg.number_of_rides);
                    write!(f, "{street} ~ {}", self.transit.stop_name(leg.stop))?
                }
                PathLeg::Transit(leg) => {
                    let (board, alight) = (utils::get_time_str(leg.board_time), utils::get_time_str(leg.alight_time));
                    write!(f, "{} {board} {alight}", leg.route_name)?;
                    if let Some(constraint) = leg.constraint.filter(|c| *c != TransferConstraint::Regular) {
                        write!(f, " ({constraint})")?;
                    }
                    write!(f, " ~ {}", self.transit.stop_name(leg.alight_stop))?;
                }
                PathLeg::Transfer(leg) => {
                    let walk = utils::get_duration_str(leg.arrival_time - leg.departure_time);
                    write!(f, "Walk {walk} ~ {}", self.transit.stop_name(leg.to_stop))?
                }
                PathLeg::Egress(leg) => {
                    write!(f, "{}", street_leg_str(leg.arrival_time - leg.departure_time, leg.number_of_rides))?
                }
            }
        }
        write!(
            f,
            " [{} {} {} Tₓ{} C₁{}",
            utils::get_time_str(path.departure_time),
            utils::get_time_str(path.arrival_time),
            utils::get_duration_str(path.duration()),
            path.number_of_transfers,
            RaptorCostConverter::to_string(path.c1),
        )?;
        if let Some(c2) = path.c2 {
            write!(f, " C₂{c2}")?;
        }
        write!(f, "]")
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum JourneyError {
    #[error("Arrival chain does not start with an access or egress.")]
    BrokenArrivalChain,
    #[error("Infinite loop in journey reconstruction.")]
    InfiniteLoop,
}

/// Maps destination arrivals back through the arena to paths.
pub(crate) struct PathMapper<'a, T> {
    transit: &'a T,
    calculator: TransitCalculator,
    access: &'a [AccessEgress],
    egress: &'a [AccessEgress],
    /// Recompute c1 leg by leg, for searches that do not track cost.
    compute_costs: bool,
    include_c2: bool,
}

impl<'a, T: TransitDataProvider> PathMapper<'a, T> {
    pub fn new(
        transit: &'a T,
        calculator: TransitCalculator,
        access: &'a [AccessEgress],
        egress: &'a [AccessEgress],
        compute_costs: bool,
        include_c2: bool,
    ) -> Self {
        Self { transit, calculator, access, egress, compute_costs, include_c2 }
    }

    fn chain(
        &self,
        arena: &[ArrivalRecord],
        destination: &DestinationArrival,
    ) -> Result<Vec<ArrivalRecord>, JourneyError> {
        let mut chain = Vec::new();
        let mut current = Some(destination.previous);
        while let Some(idx) = current {
            if chain.len() > arena.len() {
                return Err(JourneyError::InfiniteLoop);
            }
            let record = arena.get(idx as usize).ok_or(JourneyError::BrokenArrivalChain)?;
            chain.push(*record);
            current = record.previous;
        }
        if !chain.last().is_some_and(|record| matches!(record.kind, ArrivalKind::Seed { .. })) {
            return Err(JourneyError::BrokenArrivalChain);
        }
        // Forward chains are found destination first.
        if self.calculator.is_forward() {
            chain.reverse();
        }
        Ok(chain)
    }

    pub fn map(&self, arena: &[ArrivalRecord], destination: &DestinationArrival) -> Result<Path, JourneyError> {
        let chain = self.chain(arena, destination)?;
        let forward = self.calculator.is_forward();

        let seed_connection = match chain.iter().find(|record| matches!(record.kind, ArrivalKind::Seed { .. })) {
            Some(ArrivalRecord { kind: ArrivalKind::Seed { connection, .. }, .. }) => *connection,
            _ => return Err(JourneyError::BrokenArrivalChain),
        };
        let (access, egress) = if forward {
            (&self.access[seed_connection], &self.egress[destination.connection])
        } else {
            (&self.access[destination.connection], &self.egress[seed_connection])
        };

        let mut legs = Vec::with_capacity(chain.len() + 1);
        if !forward {
            let c1 = destination.c1 - chain.first().map_or(0, |first| first.c1);
            legs.push(PathLeg::Access(street_leg(access, destination.departure_time, destination.arrival_time, c1)));
        }
        for (i, record) in chain.iter().enumerate() {
            // c1 of a leg is the difference to the previous record in search order.
            let leg_c1 = if forward {
                record.c1 - if i > 0 { chain[i - 1].c1 } else { 0 }
            } else {
                record.c1 - chain.get(i + 1).map_or(0, |next| next.c1)
            };
            let leg = match record.kind {
                ArrivalKind::Seed { departure_time, arrival_time, .. } => {
                    if forward {
                        PathLeg::Access(street_leg(access, departure_time, arrival_time, leg_c1))
                    } else {
                        PathLeg::Egress(street_leg(egress, departure_time, arrival_time, leg_c1))
                    }
                }
                ArrivalKind::Transit { trip, board_pos, alight_pos, board_time, alight_time, constraint } => {
                    let pattern = self.transit.route(trip.route_idx).pattern;
                    PathLeg::Transit(TransitLeg {
                        trip,
                        route_name: pattern.name().into(),
                        board_stop: pattern.stop_index(board_pos),
                        board_stop_pos: board_pos,
                        board_time,
                        alight_stop: pattern.stop_index(alight_pos),
                        alight_stop_pos: alight_pos,
                        alight_time,
                        constraint,
                        c1: leg_c1,
                    })
                }
                ArrivalKind::Transfer { transfer, departure_time, arrival_time } => PathLeg::Transfer(TransferLeg {
                    from_stop: transfer.from_stop,
                    to_stop: transfer.to_stop,
                    departure_time,
                    arrival_time,
                    constrained: false,
                    c1: if self.compute_costs { transfer.c1 } else { leg_c1 },
                }),
            };
            legs.push(leg);
        }
        if forward {
            let c1 = destination.c1 - chain.last().map_or(0, |last| last.c1);
            legs.push(PathLeg::Egress(street_leg(egress, destination.departure_time, destination.arrival_time, c1)));
        }

        if !forward {
            move_constraints_to_next_ride(&mut legs);
        }
        mark_constrained_transfers(&mut legs);
        if self.compute_costs {
            self.compute_leg_costs(&mut legs, access, egress);
        }

        let departure_time = legs.first().map_or(0, PathLeg::departure_time);
        let arrival_time = legs.last().map_or(0, PathLeg::arrival_time);
        let c1 = legs.iter().map(PathLeg::c1).sum();
        Ok(Path {
            legs,
            departure_time,
            arrival_time,
            number_of_transfers: destination.number_of_transfers,
            c1,
            c2: self.include_c2.then_some(destination.c2),
            iteration_departure_time: destination.iteration_time,
        })
    }

    /// Prices the legs the way a forward multi-criteria search would.
    fn compute_leg_costs(&self, legs: &mut [PathLeg], access: &AccessEgress, egress: &AccessEgress) {
        let costs = self.transit.cost_calculator();
        let slack = self.transit.slack_provider();
        let mut prev_arrival_time = 0;
        let mut first_boarding = true;
        for leg in legs.iter_mut() {
            match leg {
                PathLeg::Access(leg) => {
                    leg.c1 = access.c1();
                    first_boarding = !access.has_rides();
                    prev_arrival_time = leg.arrival_time;
                }
                PathLeg::Transit(leg) => {
                    let route = self.transit.route(leg.trip.route_idx);
                    let trip = route.timetable.trip(leg.trip.trip_idx);
                    let alight_slack = slack.alight_slack(route.pattern.slack_index());
                    let board_c1 = costs.boarding_cost(
                        first_boarding,
                        prev_arrival_time,
                        leg.board_stop,
                        leg.board_time,
                        &trip,
                        leg.constraint,
                    );
                    leg.c1 = costs.transit_arrival_cost(
                        board_c1,
                        alight_slack,
                        leg.alight_time - leg.board_time,
                        &trip,
                        leg.alight_stop,
                    );
                    first_boarding = false;
                    prev_arrival_time = leg.alight_time + alight_slack;
                }
                PathLeg::Transfer(leg) => prev_arrival_time = leg.arrival_time,
                PathLeg::Egress(leg) => {
                    leg.c1 = costs.cost_egress(egress) + costs.wait_cost(leg.departure_time - prev_arrival_time);
                }
            }
        }
    }
}

fn street_leg(
    connection: &AccessEgress,
    departure_time: Timestamp,
    arrival_time: Timestamp,
    c1: Cost,
) -> AccessEgressLeg {
    AccessEgressLeg {
        stop: connection.stop(),
        departure_time,
        arrival_time,
        number_of_rides: connection.number_of_rides(),
        c1,
    }
}

/// A reverse search meets a transfer constraint when it boards the earlier trip, so the
/// constraint is stored on that ride. Moves each one to the ride boarded after it in time.
fn move_constraints_to_next_ride(legs: &mut [PathLeg]) {
    let mut carried = None;
    for leg in legs.iter_mut() {
        if let PathLeg::Transit(leg) = leg {
            carried = std::mem::replace(&mut leg.constraint, carried);
        }
    }
}

/// Flags transfer legs that connect two trips joined by a transfer constraint.
fn mark_constrained_transfers(legs: &mut [PathLeg]) {
    for i in 1..legs.len() {
        let next_is_constrained = matches!(
            legs.get(i + 1),
            Some(PathLeg::Transit(TransitLeg { constraint: Some(c), .. })) if *c != TransferConstraint::Regular
        );
        if let PathLeg::Transfer(leg) = &mut legs[i] {
            leg.constrained = next_is_constrained;
        }
    }
}
