use log::{debug, trace, warn};

use crate::calculator::TransitCalculator;
use crate::constrained::TransferConstraint;
use crate::destination::{DestinationArrival, DestinationArrivals};
use crate::error::RaptorResult;
use crate::heuristic::{Heuristics, LowerBound};
use crate::journey::{ArrivalIndex, ArrivalKind, ArrivalRecord};
use crate::network::{GlobalTripIndex, RouteIndex, StopIndex, StopPosition, Timestamp, TripIndex};
use crate::request::{Deadline, RaptorRequest};
use crate::transit::{AccessEgress, TransitDataProvider};

/// Routes scanned between two checks of the deadline.
pub(crate) const DEADLINE_CHECK_INTERVAL: usize = 64;

/// What a worker hands over for path mapping.
pub(crate) struct SearchOutcome {
    pub arena: Vec<ArrivalRecord>,
    pub destination: Vec<DestinationArrival>,
    pub iterations: usize,
    pub timed_out: bool,
}

/// The stop arrivals of one round, for one stop.
#[derive(Clone, Copy, Default)]
struct StopArrivals {
    on_board: Option<ArrivalIndex>,
    on_street: Option<ArrivalIndex>,
}

// The trip currently ridden in a route scan.
#[derive(Clone, Copy)]
struct Ride {
    trip: TripIndex,
    board_pos: StopPosition,
    board_time: Timestamp,
    previous: ArrivalIndex,
    constraint: Option<TransferConstraint>,
}

/// Stops touched in the current round, without duplicates.
pub(crate) struct TouchedStops {
    pub stops: Vec<StopIndex>,
    flags: Vec<bool>,
}

impl TouchedStops {
    pub fn new(num_stops: usize) -> Self {
        Self { stops: Vec::new(), flags: vec![false; num_stops] }
    }

    pub fn insert(&mut self, stop: StopIndex) {
        if !self.flags[stop as usize] {
            self.flags[stop as usize] = true;
            self.stops.push(stop);
        }
    }

    pub fn contains(&self, stop: StopIndex) -> bool {
        self.flags[stop as usize]
    }

    pub fn clear(&mut self) {
        for &stop in &self.stops {
            self.flags[stop as usize] = false;
        }
        self.stops.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

/// Range raptor keeping the best arrival time per stop and round.
///
/// Each iteration is a full raptor search from one minute of the search window; all
/// iterations add to the same destination pareto set. Forward searches minimize arrival time,
/// reverse searches maximize departure time, and the calculator hides the difference.
pub(crate) struct StdRangeRaptorWorker<'a, T> {
    transit: &'a T,
    request: &'a RaptorRequest,
    calculator: TransitCalculator,
    // Access when searching forward, egress in reverse.
    seeds: &'a [AccessEgress],
    // Egress when searching forward, access in reverse.
    targets: &'a [AccessEgress],
    heuristics: Option<&'a Heuristics>,
    deadline: Deadline,
    arena: Vec<ArrivalRecord>,
    rounds: Vec<Vec<StopArrivals>>,
    best_times: Vec<Timestamp>,
    best_transit_times: Vec<Timestamp>,
    touched: TouchedStops,
    touched_previous: TouchedStops,
    transit_touched: TouchedStops,
    destination: DestinationArrivals,
    best_destination_time: Timestamp,
    // Set when the current round adds to the destination front or beats its best time.
    destination_improved: bool,
    cut_off: Option<Timestamp>,
    iteration_time: Timestamp,
}

impl<'a, T: TransitDataProvider> StdRangeRaptorWorker<'a, T> {
    pub fn new(
        transit: &'a T,
        request: &'a RaptorRequest,
        calculator: TransitCalculator,
        destination: DestinationArrivals,
        heuristics: Option<&'a Heuristics>,
    ) -> Self {
        let params = &request.search_params;
        let (seeds, targets, cut_off) = if calculator.is_forward() {
            (&params.access_paths[..], &params.egress_paths[..], params.latest_arrival_time)
        } else {
            (&params.egress_paths[..], &params.access_paths[..], params.earliest_departure_time)
        };
        let num_stops = transit.number_of_stops();
        Self {
            transit,
            request,
            calculator,
            seeds,
            targets,
            heuristics,
            deadline: Deadline::new(request),
            arena: Vec::new(),
            rounds: Vec::new(),
            best_times: vec![calculator.unreached_time(); num_stops],
            best_transit_times: vec![calculator.unreached_time(); num_stops],
            touched: TouchedStops::new(num_stops),
            touched_previous: TouchedStops::new(num_stops),
            transit_touched: TouchedStops::new(num_stops),
            destination,
            best_destination_time: calculator.unreached_time(),
            destination_improved: false,
            cut_off,
            iteration_time: 0,
        }
    }

    fn max_rounds(&self) -> u32 {
        self.request.search_params.max_number_of_transfers + 1
    }

    pub fn run(mut self, start: Timestamp) -> RaptorResult<SearchOutcome> {
        let times = self.calculator.iteration_times(start, self.request.search_params.search_window);
        let mut iterations = 0;
        let mut timed_out = false;
        for time in times {
            if self.deadline.is_expired() {
                timed_out = true;
                break;
            }
            iterations += 1;
            if self.run_iteration(time)? {
                timed_out = true;
                break;
            }
        }
        debug!(
            "Standard search finished {iterations} iterations with {} destination arrivals and {} stop arrivals.",
            self.destination.len(),
            self.arena.len()
        );
        Ok(SearchOutcome {
            arena: self.arena,
            destination: self.destination.into_arrivals(),
            iterations,
            timed_out,
        })
    }

    fn reset_iteration(&mut self, time: Timestamp) {
        let unreached = self.calculator.unreached_time();
        self.iteration_time = time;
        self.best_times.fill(unreached);
        self.best_transit_times.fill(unreached);
        self.best_destination_time = unreached;
        self.destination_improved = false;
        self.touched.clear();
        self.touched_previous.clear();
        self.transit_touched.clear();
        for round in &mut self.rounds {
            round.fill(StopArrivals::default());
        }
    }

    fn round_arrivals(&mut self, round: u32) -> &mut [StopArrivals] {
        while self.rounds.len() <= round as usize {
            self.rounds.push(vec![StopArrivals::default(); self.transit.number_of_stops()]);
        }
        &mut self.rounds[round as usize]
    }

    // Returns true if the deadline expired.
    fn run_iteration(&mut self, time: Timestamp) -> RaptorResult<bool> {
        self.reset_iteration(time);
        trace!("Iteration at {time}.");

        let seeds = self.seeds;
        self.round_arrivals(0);
        for (connection, seed) in seeds.iter().enumerate() {
            if !seed.has_rides() {
                self.add_seed(0, connection, seed);
            }
        }
        self.arrivals_at_destination(0);

        let max_rides = seeds.iter().map(AccessEgress::number_of_rides).max().unwrap_or(0);
        let mut last_improved_round = self.destination_improved.then_some(0);
        for round in 1..=self.max_rounds() {
            self.destination_improved = false;
            std::mem::swap(&mut self.touched, &mut self.touched_previous);
            self.touched.clear();
            self.transit_touched.clear();
            if self.touched_previous.is_empty() && round > max_rides {
                break;
            }
            if self.deadline.is_expired() {
                return Ok(true);
            }
            self.round_arrivals(round);

            for (connection, seed) in seeds.iter().enumerate() {
                if seed.number_of_rides() == round {
                    self.add_seed(round, connection, seed);
                }
            }
            if self.scan_routes(round)? {
                return Ok(true);
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

    /// Arrivals that can not beat the best destination arrival of this iteration, or that
    /// are past the cut-off, are dropped.
    fn within_limits(&self, stop: StopIndex, time: Timestamp) -> bool {
        let calc = &self.calculator;
        if self.cut_off.is_some_and(|cut_off| calc.is_better(cut_off, time)) {
            return false;
        }
        let optimistic = match self.heuristics.map(|h| h.min_travel_duration(stop)) {
            Some(LowerBound::Unreachable) => return false,
            Some(LowerBound::Value(duration)) => calc.plus_duration(time, duration),
            _ => time,
        };
        calc.is_better(optimistic, self.best_destination_time)
    }

    fn push(&mut self, record: ArrivalRecord) -> ArrivalIndex {
        self.arena.push(record);
        (self.arena.len() - 1) as ArrivalIndex
    }

    fn add_seed(&mut self, round: u32, connection: usize, seed: &AccessEgress) {
        let calc = self.calculator;
        let (departure_time, arrival_time, stop_time) = if calc.is_forward() {
            let Some(departure) = seed.earliest_departure_time(self.iteration_time) else { return };
            let arrival = departure + seed.duration();
            (departure, arrival, arrival)
        } else {
            let Some(arrival) = seed.latest_arrival_time(self.iteration_time) else { return };
            let departure = arrival - seed.duration();
            (departure, arrival, departure)
        };
        let stop = seed.stop();
        if !calc.is_better(stop_time, self.best_times[stop as usize]) || !self.within_limits(stop, stop_time) {
            return;
        }
        let idx = self.push(ArrivalRecord {
            stop,
            time: stop_time,
            round,
            c1: 0,
            c2: 0,
            previous: None,
            kind: ArrivalKind::Seed { connection, departure_time, arrival_time, rides: seed.number_of_rides() },
        });
        let arrivals = &mut self.round_arrivals(round)[stop as usize];
        if seed.has_rides() {
            arrivals.on_board = Some(idx);
            self.best_transit_times[stop as usize] = stop_time;
            self.transit_touched.insert(stop);
        } else {
            arrivals.on_street = Some(idx);
        }
        self.best_times[stop as usize] = stop_time;
        self.touched.insert(stop);
    }

    // The better of the on-board and on-street arrival at `stop` in `round`.
    fn best_arrival(&self, round: u32, stop: StopIndex) -> Option<ArrivalIndex> {
        let arrivals = self.rounds.get(round as usize)?[stop as usize];
        match (arrivals.on_board, arrivals.on_street) {
            (Some(b), Some(s)) => {
                let (street_time, board_time) = (self.arena[s as usize].time, self.arena[b as usize].time);
                let on_street_better = self.calculator.is_better(street_time, board_time);
                Some(if on_street_better { s } else { b })
            }
            (b, s) => b.or(s),
        }
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

    fn scan_routes(&mut self, round: u32) -> RaptorResult<bool> {
        let transit = self.transit;
        let routes = transit.route_index_iterator(&self.touched_previous.stops);
        for (i, route) in routes.into_iter().enumerate() {
            if i % DEADLINE_CHECK_INTERVAL == DEADLINE_CHECK_INTERVAL - 1 && self.deadline.is_expired() {
                return Ok(true);
            }
            self.scan_route(round, route)?;
        }
        Ok(false)
    }

    fn scan_route(&mut self, round: u32, route: RouteIndex) -> RaptorResult<()> {
        let transit = self.transit;
        let calc = self.calculator;
        let view = transit.route(route);
        let (pattern, timetable) = (view.pattern, view.timetable);
        if timetable.number_of_trips() == 0 {
            return Ok(());
        }
        let slack = transit.slack_provider();
        let board_slack = calc.board_slack(slack, pattern.slack_index());
        let alight_slack = calc.alight_slack(slack, pattern.slack_index());
        let transfer_slack = if round > 1 { slack.transfer_slack() } else { 0 };
        let search = calc.trip_search(timetable);
        let constraints = self
            .request
            .search_params
            .constrained_transfers
            .then(|| calc.transfer_constraints_search(transit, route))
            .filter(|constraints| !constraints.is_empty());

        let mut ride: Option<Ride> = None;
        for pos in calc.stop_positions(pattern.number_of_stops()) {
            let stop = pattern.stop_index(pos);

            if let Some(current) = ride.filter(|_| calc.alighting_possible_at(&pattern, pos)) {
                let alight_time = calc.alight_time(&timetable, current.trip, pos);
                let arrival_time = calc.plus_duration(alight_time, alight_slack);
                self.transit_arrival(round, stop, route, current, pos, alight_time, arrival_time);
            }

            if !self.touched_previous.contains(stop) || !calc.boarding_possible_at(&pattern, pos) {
                continue;
            }
            let Some(previous) = self.best_arrival(round - 1, stop) else { continue };
            let previous_time = self.arena[previous as usize].time;
            let earliest_board_time =
                calc.plus_duration(calc.plus_duration(previous_time, board_slack), transfer_slack);

            if let Some(constraints) = constraints.as_ref().filter(|c| c.transfer_exist_target_stop(pos)) {
                if let Some(source) = self.source_transit(previous) {
                    let ArrivalKind::Transit { trip, board_pos, alight_pos, board_time, alight_time, .. } = source.kind
                    else {
                        continue;
                    };
                    let (source_pos, source_time) =
                        if calc.is_forward() { (alight_pos, alight_time) } else { (board_pos, board_time) };
                    let event = constraints.find(timetable, trip, source_pos, pos, source_time, earliest_board_time)?;
                    if let Some(event) = event {
                        if event.transfer_constraint == Some(TransferConstraint::NotAllowed) {
                            trace!("Boarding route {} at stop {stop} is not allowed.", pattern.name());
                            continue;
                        }
                        if let Some(trip_index) = event.trip_index {
                            if calc.is_better_trip(trip_index, ride.map(|r| r.trip)) {
                                ride = Some(Ride {
                                    trip: trip_index,
                                    board_pos: pos,
                                    board_time: event.time,
                                    previous,
                                    constraint: event.transfer_constraint,
                                });
                            }
                        }
                        continue;
                    }
                }
            }

            let event = search.search(earliest_board_time, pos, ride.map(|r| r.trip));
            if let Some(trip_index) = event.trip_index {
                ride =
                    Some(Ride { trip: trip_index, board_pos: pos, board_time: event.time, previous, constraint: None });
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn transit_arrival(
        &mut self,
        round: u32,
        stop: StopIndex,
        route: RouteIndex,
        ride: Ride,
        pos: StopPosition,
        alight_time: Timestamp,
        arrival_time: Timestamp,
    ) {
        let calc = self.calculator;
        if !calc.is_better(arrival_time, self.best_transit_times[stop as usize])
            || !self.within_limits(stop, arrival_time)
        {
            return;
        }
        let trip = GlobalTripIndex { route_idx: route, trip_idx: ride.trip };
        let kind = if calc.is_forward() {
            ArrivalKind::Transit {
                trip,
                board_pos: ride.board_pos,
                alight_pos: pos,
                board_time: ride.board_time,
                alight_time,
                constraint: ride.constraint,
            }
        } else {
            ArrivalKind::Transit {
                trip,
                board_pos: pos,
                alight_pos: ride.board_pos,
                board_time: alight_time,
                alight_time: ride.board_time,
                // Belongs to the ride after this one in time; moved there when mapping the path.
                constraint: ride.constraint,
            }
        };
        let idx = self.push(ArrivalRecord {
            stop,
            time: arrival_time,
            round,
            c1: 0,
            c2: 0,
            previous: Some(ride.previous),
            kind,
        });
        self.round_arrivals(round)[stop as usize].on_board = Some(idx);
        self.best_transit_times[stop as usize] = arrival_time;
        self.transit_touched.insert(stop);
        if calc.is_better(arrival_time, self.best_times[stop as usize]) {
            self.best_times[stop as usize] = arrival_time;
            self.touched.insert(stop);
        }
    }

    fn relax_transfers(&mut self, round: u32) {
        let transit = self.transit;
        let calc = self.calculator;
        for i in 0..self.transit_touched.stops.len() {
            let stop = self.transit_touched.stops[i];
            let Some(from) = self.rounds[round as usize][stop as usize].on_board else { continue };
            let from_time = self.arena[from as usize].time;
            for transfer in calc.transfers(transit, stop) {
                if transfer.duration < 0 {
                    warn!(
                        "Ignoring transfer with negative duration from stop {} to {}.",
                        transfer.from_stop, transfer.to_stop
                    );
                    continue;
                }
                let target = calc.transfer_target(transfer);
                if target == stop {
                    continue;
                }
                let arrival_time = calc.plus_duration(from_time, transfer.duration);
                if !calc.is_better(arrival_time, self.best_times[target as usize])
                    || !self.within_limits(target, arrival_time)
                {
                    continue;
                }
                let (departure_time, arrival) =
                    if calc.is_forward() { (from_time, arrival_time) } else { (arrival_time, from_time) };
                let idx = self.push(ArrivalRecord {
                    stop: target,
                    time: arrival_time,
                    round,
                    c1: 0,
                    c2: 0,
                    previous: Some(from),
                    kind: ArrivalKind::Transfer { transfer: *transfer, departure_time, arrival_time: arrival },
                });
                self.rounds[round as usize][target as usize].on_street = Some(idx);
                self.best_times[target as usize] = arrival_time;
                self.touched.insert(target);
            }
        }
    }

    fn arrivals_at_destination(&mut self, round: u32) {
        let targets = self.targets;
        for (connection, target) in targets.iter().enumerate() {
            let arrivals = self.rounds[round as usize][target.stop() as usize];
            if let Some(idx) = arrivals.on_board {
                self.add_destination_arrival(idx, connection);
            }
            // Walking between a street arrival and a walking target is not a path.
            if let Some(idx) = arrivals.on_street.filter(|_| target.has_rides()) {
                self.add_destination_arrival(idx, connection);
            }
        }
    }

    fn add_destination_arrival(&mut self, idx: ArrivalIndex, connection: usize) {
        let calc = self.calculator;
        let target = &self.targets[connection];
        let target_rides = target.number_of_rides();
        let record = self.arena[idx as usize];
        let (departure_time, arrival_time, search_arrival_time) = if calc.is_forward() {
            let Some(departure) = target.earliest_departure_time(record.time) else { return };
            let arrival = departure + target.duration();
            (departure, arrival, arrival)
        } else {
            let Some(arrival) = target.latest_arrival_time(record.time) else { return };
            let departure = arrival - target.duration();
            (departure, arrival, departure)
        };
        if self.cut_off.is_some_and(|cut_off| calc.is_better(cut_off, search_arrival_time)) {
            return;
        }
        let rides = record.round + target_rides;
        let arrival = DestinationArrival {
            previous: idx,
            connection,
            departure_time,
            arrival_time,
            search_arrival_time,
            number_of_transfers: rides.saturating_sub(1),
            c1: 0,
            c2: 0,
            iteration_time: self.iteration_time,
            duration: calc.duration(self.iteration_time, search_arrival_time),
        };
        if self.destination.add(arrival) {
            trace!("New destination arrival at {search_arrival_time} in round {}.", record.round);
            self.destination_improved = true;
        }
        if calc.is_better(search_arrival_time, self.best_destination_time) {
            self.best_destination_time = search_arrival_time;
            self.destination_improved = true;
        }
    }
}
