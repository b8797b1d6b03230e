use log::{debug, trace, warn};

use crate::calculator::TransitCalculator;
use crate::constrained::TransferConstraint;
use crate::cost::{Cost, CostCalculator, C2};
use crate::destination::{DestinationArrival, DestinationArrivals};
use crate::error::RaptorResult;
use crate::heuristic::{Heuristics, LowerBound};
use crate::journey::{ArrivalIndex, ArrivalKind, ArrivalRecord};
use crate::network::{GlobalTripIndex, RouteIndex, StopIndex, StopPosition, Timestamp, TripIndex};
use crate::pareto::{ParetoComparator, ParetoSet};
use crate::pass_through::{merge_transit_group, PassThroughPoints};
use crate::raptor::{SearchOutcome, TouchedStops, DEADLINE_CHECK_INTERVAL};
use crate::request::{C2DominanceFn, Deadline, RaptorRequest};
use crate::transit::{AccessEgress, TransitDataProvider};
use crate::trip_search::TripScheduleSearch;
use crate::via::ViaStages;

/// The criteria of an arrival at a stop, pointing to the full record in the arena.
#[derive(Clone, Copy, Debug)]
struct Label {
    idx: ArrivalIndex,
    iteration: usize,
    time: Timestamp,
    round: u32,
    c1: Cost,
    c2: C2,
    on_board: bool,
    // Reached by walking from the origin, so the next boarding is the first.
    first_boarding: bool,
}

struct LabelComparator {
    c2: Option<C2DominanceFn>,
}

impl ParetoComparator<Label> for LabelComparator {
    fn left_dominance_exist(&self, l: &Label, r: &Label) -> bool {
        l.time < r.time
            || l.round < r.round
            || l.c1 < r.c1
            || (l.on_board && !r.on_board)
            || self.c2.is_some_and(|dominates| dominates(l.c2, r.c2))
    }
}

type Bag = ParetoSet<Label, LabelComparator>;

// A boarded trip carried along a route scan.
#[derive(Clone, Copy, Debug)]
struct Ride {
    previous: ArrivalIndex,
    trip: TripIndex,
    board_pos: StopPosition,
    board_time: Timestamp,
    board_c1: Cost,
    // Only comparable between rides on the same trip.
    relative_c1: Cost,
    c2: C2,
    constraint: Option<TransferConstraint>,
}

struct RideComparator {
    c2: Option<C2DominanceFn>,
}

impl ParetoComparator<Ride> for RideComparator {
    fn left_dominance_exist(&self, l: &Ride, r: &Ride) -> bool {
        l.trip < r.trip || l.relative_c1 < r.relative_c1 || self.c2.is_some_and(|dominates| dominates(l.c2, r.c2))
    }
}

/// Multi-criteria range raptor: a pareto set of arrivals per stop on arrival time, round,
/// c1, on-board arrival and (optionally) c2. Forward only.
pub(crate) struct McRangeRaptorWorker<'a, T> {
    transit: &'a T,
    request: &'a RaptorRequest,
    costs: &'a CostCalculator,
    heuristics: Option<&'a Heuristics>,
    deadline: Deadline,
    arena: Vec<ArrivalRecord>,
    bags: Vec<Bag>,
    touched: TouchedStops,
    touched_previous: TouchedStops,
    destination: DestinationArrivals,
    // Set when the current round adds to the destination front.
    destination_improved: bool,
    pass_through: Option<PassThroughPoints>,
    via: Option<ViaStages>,
    transit_groups: bool,
    c2_dominance: Option<C2DominanceFn>,
    // Destination pruning needs a lower bound on the remaining c1 and c2. Neither is known when
    // c2 is in use or when constrained transfers can make a boarding free.
    prune_on_destination: bool,
    cut_off: Option<Timestamp>,
    iteration: usize,
    iteration_time: Timestamp,
}

impl<'a, T: TransitDataProvider> McRangeRaptorWorker<'a, T> {
    pub fn new(
        transit: &'a T,
        request: &'a RaptorRequest,
        destination: DestinationArrivals,
        pass_through: Option<PassThroughPoints>,
        via: Option<ViaStages>,
        heuristics: Option<&'a Heuristics>,
    ) -> Self {
        let params = &request.search_params;
        let c2_dominance = if pass_through.is_some() {
            Some(PassThroughPoints::dominance as C2DominanceFn)
        } else if via.is_some() {
            Some(ViaStages::dominance as C2DominanceFn)
        } else {
            params.transit_group_priority
        };
        let num_stops = transit.number_of_stops();
        Self {
            transit,
            request,
            costs: transit.cost_calculator(),
            heuristics,
            deadline: Deadline::new(request),
            arena: Vec::new(),
            bags: (0..num_stops).map(|_| ParetoSet::new(LabelComparator { c2: c2_dominance })).collect(),
            touched: TouchedStops::new(num_stops),
            touched_previous: TouchedStops::new(num_stops),
            destination,
            destination_improved: false,
            pass_through,
            via,
            transit_groups: params.transit_group_priority.is_some(),
            c2_dominance,
            prune_on_destination: c2_dominance.is_none() && !params.constrained_transfers,
            cut_off: params.latest_arrival_time,
            iteration: 0,
            iteration_time: 0,
        }
    }

    fn max_rounds(&self) -> u32 {
        self.request.search_params.max_number_of_transfers + 1
    }

    pub fn run(mut self, earliest_departure_time: Timestamp) -> RaptorResult<SearchOutcome> {
        let calculator = TransitCalculator::forward();
        let times = calculator.iteration_times(earliest_departure_time, self.request.search_params.search_window);
        let mut timed_out = false;
        for time in times {
            if self.deadline.is_expired() {
                timed_out = true;
                break;
            }
            self.iteration += 1;
            if self.run_iteration(time)? {
                timed_out = true;
                break;
            }
        }
        debug!(
            "Multi-criteria search finished {} iterations with {} destination arrivals and {} stop arrivals.",
            self.iteration,
            self.destination.len(),
            self.arena.len()
        );
        Ok(SearchOutcome {
            arena: self.arena,
            destination: self.destination.into_arrivals(),
            iterations: self.iteration,
            timed_out,
        })
    }

    // Returns true if the deadline expired.
    fn run_iteration(&mut self, time: Timestamp) -> RaptorResult<bool> {
        self.iteration_time = time;
        self.destination_improved = false;
        self.touched.clear();
        self.touched_previous.clear();
        trace!("Iteration at {time}.");

        let request = self.request;
        let access = &request.search_params.access_paths;
        for (connection, seed) in access.iter().enumerate() {
            if !seed.has_rides() {
                self.add_seed(0, connection, seed);
            }
        }
        self.arrivals_at_destination(0);

        let max_rides = access.iter().map(AccessEgress::number_of_rides).max().unwrap_or(0);
        let mut last_improved_round = self.destination_improved.then_some(0);
        for round in 1..=self.max_rounds() {
            self.destination_improved = false;
            std::mem::swap(&mut self.touched, &mut self.touched_previous);
            self.touched.clear();
            if self.touched_previous.is_empty() && round > max_rides {
                break;
            }
            if self.deadline.is_expired() {
                return Ok(true);
            }
            for (connection, seed) in access.iter().enumerate() {
                if seed.number_of_rides() == round {
                    self.add_seed(round, connection, seed);
                }
            }

            let routes = self.transit.route_index_iterator(&self.touched_previous.stops);
            for (i, route) in routes.into_iter().enumerate() {
                if i % DEADLINE_CHECK_INTERVAL == DEADLINE_CHECK_INTERVAL - 1 && self.deadline.is_expired() {
                    return Ok(true);
                }
                self.scan_route(round, route)?;
            }
            self.relax_transfers(round);
            self.arrivals_at_destination(round);

            if self.destination_improved {
                last_improved_round = Some(round);
            }
            let additional = self.request.search_params.number_of_additional_transfers;
            if last_improved_round.is_some_and(|last| round >= last + additional) {
                break;
            }
        }
        Ok(false)
    }

    // Applies the pass-through point at `stop`, if any, to `c2`.
    fn c2_at_stop(&mut self, stop: StopIndex, c2: C2) -> C2 {
        let mut c2_out = c2;
        if let Some(points) = self.pass_through.as_mut() {
            if points.is_pass_through_point(stop) {
                points.update_c2_value(c2, |value| c2_out = value);
            }
        }
        c2_out
    }

    /// Lower-bound check of an arrival against the cut-off and the destination arrivals
    /// found so far.
    fn passes_heuristics(&self, label: &Label, stop: StopIndex) -> bool {
        let Some(heuristics) = self.heuristics else { return true };
        let min_duration = match heuristics.min_travel_duration(stop) {
            LowerBound::NotComputed => return true,
            LowerBound::Unreachable => return false,
            LowerBound::Value(duration) => duration,
        };
        let arrival_time = label.time + min_duration;
        if self.cut_off.is_some_and(|cut_off| arrival_time > cut_off) {
            return false;
        }
        if !self.prune_on_destination {
            return true;
        }
        let min_rides = match heuristics.min_number_of_rides(stop) {
            LowerBound::Value(rides) => rides as u32,
            _ => 0,
        };
        let remaining_c1 = self.costs.calculate_remaining_min_cost(0, min_rides.checked_sub(1));
        let candidate = DestinationArrival {
            previous: label.idx,
            connection: 0,
            departure_time: self.iteration_time,
            arrival_time,
            search_arrival_time: arrival_time,
            number_of_transfers: (label.round + min_rides).saturating_sub(1),
            c1: label.c1 + remaining_c1,
            c2: label.c2,
            iteration_time: self.iteration_time,
            duration: arrival_time - self.iteration_time,
        };
        self.destination.qualify(&candidate)
    }

    fn add_arrival(&mut self, label: Label, record: ArrivalRecord) {
        let stop = record.stop;
        // Completing a via stage adds a label one stage on, leaving after the minimum wait.
        let next_stage = self.via.as_ref().and_then(|via| via.completes_stage(label.c2, stop)).map(|wait| Label {
            time: label.time + wait,
            c1: label.c1 + self.costs.wait_cost(wait),
            c2: label.c2 + 1,
            ..label
        });
        let mut record_idx = None;
        for label in std::iter::once(label).chain(next_stage) {
            if self.cut_off.is_some_and(|cut_off| label.time > cut_off) {
                continue;
            }
            if !self.passes_heuristics(&label, stop) || !self.bags[stop as usize].qualify(&label) {
                continue;
            }
            let idx = match record_idx {
                Some(idx) => idx,
                None => {
                    self.arena.push(record);
                    let idx = (self.arena.len() - 1) as ArrivalIndex;
                    record_idx = Some(idx);
                    idx
                }
            };
            self.bags[stop as usize].add(Label { idx, ..label });
            self.touched.insert(stop);
        }
    }

    fn add_seed(&mut self, round: u32, connection: usize, seed: &AccessEgress) {
        let Some(departure_time) = seed.earliest_departure_time(self.iteration_time) else { return };
        let arrival_time = departure_time + seed.duration();
        let stop = seed.stop();
        let c2 = self.c2_at_stop(stop, 0);
        let label = Label {
            idx: 0,
            iteration: self.iteration,
            time: arrival_time,
            round,
            c1: seed.c1(),
            c2,
            on_board: seed.has_rides(),
            first_boarding: !seed.has_rides(),
        };
        let record = ArrivalRecord {
            stop,
            time: arrival_time,
            round,
            c1: seed.c1(),
            c2,
            previous: None,
            kind: ArrivalKind::Seed { connection, departure_time, arrival_time, rides: seed.number_of_rides() },
        };
        self.add_arrival(label, record);
    }

    // Labels of this iteration at `stop` reached in `round`.
    fn labels(&self, stop: StopIndex, round: u32, on_board_only: bool) -> Vec<Label> {
        self.bags[stop as usize]
            .iter()
            .filter(|l| l.iteration == self.iteration && l.round == round && (l.on_board || !on_board_only))
            .copied()
            .collect()
    }

    // The transit arrival a boarding from `idx` transfers from, walking back over a transfer.
    fn source_transit(&self, idx: ArrivalIndex) -> Option<ArrivalRecord> {
        let record = self.arena[idx as usize];
        match record.kind {
            ArrivalKind::Transit { .. } => Some(record),
            ArrivalKind::Transfer { .. } => {
                let previous = self.arena[record.previous? as usize];
                matches!(previous.kind, ArrivalKind::Transit { .. }).then_some(previous)
            }
            ArrivalKind::Seed { .. } => None,
        }
    }

    fn scan_route(&mut self, round: u32, route: RouteIndex) -> RaptorResult<()> {
        let transit = self.transit;
        let costs = self.costs;
        let view = transit.route(route);
        let (pattern, timetable) = (view.pattern, view.timetable);
        if timetable.number_of_trips() == 0 {
            return Ok(());
        }
        let slack = transit.slack_provider();
        let board_slack = slack.board_slack(pattern.slack_index());
        let alight_slack = slack.alight_slack(pattern.slack_index());
        let transfer_slack = if round > 1 { slack.transfer_slack() } else { 0 };
        let constraints = self
            .request
            .search_params
            .constrained_transfers
            .then(|| transit.transfer_constraints_forward_search(route))
            .filter(|constraints| !constraints.is_empty());
        let search = TripScheduleSearch::forward(timetable);
        let mut rides = ParetoSet::new(RideComparator { c2: self.c2_dominance });

        for pos in 0..pattern.number_of_stops() as StopPosition {
            let stop = pattern.stop_index(pos);

            if !rides.is_empty() && self.pass_through.is_some() {
                let updated: Vec<Ride> = rides
                    .iter()
                    .map(|ride: &Ride| Ride { c2: self.c2_at_stop(stop, ride.c2), ..*ride })
                    .collect();
                rides.clear();
                for ride in updated {
                    rides.add(ride);
                }
            }

            let can_alight = pattern.alighting_possible_at(pos);
            for ride in rides.iter().filter(|_| can_alight) {
                let trip = timetable.trip(ride.trip);
                let alight_time = trip.arrival(pos);
                let arrival_time = alight_time + alight_slack;
                let ride_time = alight_time - ride.board_time;
                let c1 = costs.transit_arrival_cost(ride.board_c1, alight_slack, ride_time, &trip, stop);
                let label = Label {
                    idx: 0,
                    iteration: self.iteration,
                    time: arrival_time,
                    round,
                    c1,
                    c2: ride.c2,
                    on_board: true,
                    first_boarding: false,
                };
                let record = ArrivalRecord {
                    stop,
                    time: arrival_time,
                    round,
                    c1,
                    c2: ride.c2,
                    previous: Some(ride.previous),
                    kind: ArrivalKind::Transit {
                        trip: GlobalTripIndex { route_idx: route, trip_idx: ride.trip },
                        board_pos: ride.board_pos,
                        alight_pos: pos,
                        board_time: ride.board_time,
                        alight_time,
                        constraint: ride.constraint,
                    },
                };
                self.add_arrival(label, record);
            }

            if !self.touched_previous.contains(stop) || !pattern.boarding_possible_at(pos) {
                continue;
            }
            for previous in self.labels(stop, round - 1, false) {
                let earliest_board_time = previous.time + board_slack + transfer_slack;

                let mut event = None;
                if let Some(constraints) = constraints.as_ref().filter(|c| c.transfer_exist_target_stop(pos)) {
                    if let Some(source) = self.source_transit(previous.idx) {
                        if let ArrivalKind::Transit { trip, alight_pos, alight_time, .. } = source.kind {
                            event =
                                constraints.find(timetable, trip, alight_pos, pos, alight_time, earliest_board_time)?;
                        }
                    }
                }
                let event = match event {
                    Some(event) if event.transfer_constraint == Some(TransferConstraint::NotAllowed) => continue,
                    Some(event) => event,
                    None => search.search(earliest_board_time, pos, None),
                };
                let Some(trip_index) = event.trip_index else { continue };

                let trip = timetable.trip(trip_index);
                let board_c1 = previous.c1
                    + costs.boarding_cost(
                        previous.first_boarding,
                        previous.time,
                        stop,
                        event.time,
                        &trip,
                        event.transfer_constraint,
                    );
                let c2 = if self.transit_groups {
                    merge_transit_group(previous.c2, pattern.priority_group())
                } else {
                    previous.c2
                };
                rides.add(Ride {
                    previous: previous.idx,
                    trip: trip_index,
                    board_pos: pos,
                    board_time: event.time,
                    board_c1,
                    relative_c1: board_c1 + costs.on_trip_relative_riding_cost(event.time, &trip),
                    c2,
                    constraint: event.transfer_constraint,
                });
            }
        }
        Ok(())
    }

    fn relax_transfers(&mut self, round: u32) {
        let transit = self.transit;
        let reached = self.touched.stops.clone();
        for stop in reached {
            for from in self.labels(stop, round, true) {
                for transfer in transit.transfers_from_stop(stop) {
                    if transfer.duration < 0 {
                        warn!(
                            "Ignoring transfer with negative duration from stop {} to {}.",
                            transfer.from_stop, transfer.to_stop
                        );
                        continue;
                    }
                    if transfer.to_stop == stop {
                        continue;
                    }
                    let arrival_time = from.time + transfer.duration;
                    let c1 = from.c1 + transfer.c1;
                    let c2 = self.c2_at_stop(transfer.to_stop, from.c2);
                    let label = Label {
                        idx: 0,
                        iteration: self.iteration,
                        time: arrival_time,
                        round,
                        c1,
                        c2,
                        on_board: false,
                        first_boarding: false,
                    };
                    let record = ArrivalRecord {
                        stop: transfer.to_stop,
                        time: arrival_time,
                        round,
                        c1,
                        c2,
                        previous: Some(from.idx),
                        kind: ArrivalKind::Transfer { transfer: *transfer, departure_time: from.time, arrival_time },
                    };
                    self.add_arrival(label, record);
                }
            }
        }
    }

    fn arrivals_at_destination(&mut self, round: u32) {
        let request = self.request;
        let egress_paths = &request.search_params.egress_paths;
        for (connection, egress) in egress_paths.iter().enumerate() {
            if !self.touched.contains(egress.stop()) {
                continue;
            }
            // Walking egress needs an on-board arrival, egress with rides does not.
            for label in self.labels(egress.stop(), round, !egress.has_rides()) {
                let Some(departure_time) = egress.earliest_departure_time(label.time) else { continue };
                let arrival_time = departure_time + egress.duration();
                if self.cut_off.is_some_and(|cut_off| arrival_time > cut_off) {
                    continue;
                }
                if !self.destination.accepts_c2(label.c2) {
                    continue;
                }
                let c1 = label.c1
                    + self.costs.wait_cost(departure_time - label.time)
                    + self.costs.cost_egress(egress);
                let arrival = DestinationArrival {
                    previous: label.idx,
                    connection,
                    departure_time,
                    arrival_time,
                    search_arrival_time: arrival_time,
                    number_of_transfers: (round + egress.number_of_rides()).saturating_sub(1),
                    c1,
                    c2: label.c2,
                    iteration_time: self.iteration_time,
                    duration: arrival_time - self.iteration_time,
                };
                if self.destination.add(arrival) {
                    trace!("New destination arrival at {arrival_time} with c1 {c1} in round {round}.");
                    self.destination_improved = true;
                }
            }
        }
    }
}
