use std::collections::HashMap;

use log::debug;

use crate::constrained::{ConstrainedBoardingSearch, ConstrainedTransfer, TransferConstraint};
use crate::cost::{CostCalculator, CostParams};
use crate::error::{RaptorError, RaptorResult};
use crate::slack::SlackProvider;
use crate::transit::{Pattern, RouteView, Timetable, TransitDataProvider, Transfer};
use crate::utils;

// Timestamp is seconds since midnight of the service day.
pub type Timestamp = i32;
pub type Duration = i32;
pub type StopIndex = u32;
pub type RouteIndex = u32;
pub type TripIndex = u32;
pub type StopPosition = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlobalTripIndex {
    pub route_idx: RouteIndex,
    pub trip_idx: TripIndex,
}

/// Handle to a trip given out by [`NetworkBuilder`]; trips are re-ordered when the network
/// is built, so use [`Network::trip`] to find where it ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TripId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopTime {
    pub arrival_time: Timestamp,
    pub departure_time: Timestamp,
}

/// Whether passengers may get on or off at one stop of a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardAlight {
    pub board: bool,
    pub alight: bool,
}

impl BoardAlight {
    pub const BOTH: Self = Self { board: true, alight: true };
    pub const BOARD_ONLY: Self = Self { board: true, alight: false };
    pub const ALIGHT_ONLY: Self = Self { board: false, alight: true };
    pub const NONE: Self = Self { board: false, alight: false };
}

impl Default for BoardAlight {
    fn default() -> Self {
        Self::BOTH
    }
}

pub struct Route {
    pub name: Box<str>,
    pub num_stops: usize,
    pub num_trips: usize,
    pub route_stops_idx: usize,
    pub stop_times_idx: usize,
    pub slack_index: usize,
    pub transit_reluctance_index: usize,
    pub priority_group: u32,
}

impl Route {
    pub fn get_stops<'a>(&self, route_stops: &'a [StopIndex]) -> &'a [StopIndex] {
        &route_stops[self.route_stops_idx..(self.route_stops_idx + self.num_stops)]
    }

    // Laid out like `route_stops`.
    pub fn get_board_alight<'a>(&self, route_board_alight: &'a [BoardAlight]) -> &'a [BoardAlight] {
        &route_board_alight[self.route_stops_idx..(self.route_stops_idx + self.num_stops)]
    }

    pub fn get_stop_times<'a>(&self, stop_times: &'a [StopTime]) -> &'a [StopTime] {
        &stop_times[self.stop_times_idx..(self.stop_times_idx + self.num_stops * self.num_trips)]
    }
}

pub struct Stop {
    pub name: Box<str>,
    pub routes_idx: usize,
    pub num_routes: usize,
    pub transfers_from_idx: usize,
    pub num_transfers_from: usize,
    pub transfers_to_idx: usize,
    pub num_transfers_to: usize,
}

impl Stop {
    pub fn get_routes<'a>(&self, stop_routes: &'a [RouteIndex]) -> &'a [RouteIndex] {
        &stop_routes[self.routes_idx..(self.routes_idx + self.num_routes)]
    }
}

/// An in-memory timetable, the reference [`TransitDataProvider`].
pub struct Network {
    pub routes: Vec<Route>,
    pub stops: Vec<Stop>,
    pub stop_index: HashMap<Box<str>, StopIndex>,
    pub stop_times: Vec<StopTime>,
    pub stop_routes: Vec<RouteIndex>,
    pub route_stops: Vec<StopIndex>,
    pub route_board_alight: Vec<BoardAlight>,
    transfers_from: Vec<Transfer>,
    transfers_to: Vec<Transfer>,
    constraints_to_route: Vec<Vec<ConstrainedTransfer>>,
    constraints_from_route: Vec<Vec<ConstrainedTransfer>>,
    trip_ids: Vec<GlobalTripIndex>,
    cost_calculator: CostCalculator,
    slack_provider: SlackProvider,
    valid_start_time: Timestamp,
    valid_end_time: Timestamp,
}

impl Network {
    pub fn get_stop_idx(&self, name: &str) -> Option<StopIndex> {
        self.stop_index.get(name).copied()
    }

    pub fn num_stops(&self) -> usize {
        self.stops.len()
    }

    pub fn num_routes(&self) -> usize {
        self.routes.len()
    }

    /// Where a trip added through the builder ended up after sorting.
    pub fn trip(&self, id: TripId) -> GlobalTripIndex {
        self.trip_ids[id.0]
    }
}

impl TransitDataProvider for Network {
    fn number_of_stops(&self) -> usize {
        self.stops.len()
    }

    fn number_of_routes(&self) -> usize {
        self.routes.len()
    }

    fn routes_for_stop(&self, stop: StopIndex) -> &[RouteIndex] {
        self.stops[stop as usize].get_routes(&self.stop_routes)
    }

    fn route(&self, route_idx: RouteIndex) -> RouteView<'_> {
        let route = &self.routes[route_idx as usize];
        let pattern = Pattern {
            route: route_idx,
            name: &route.name,
            stops: route.get_stops(&self.route_stops),
            board_alight: route.get_board_alight(&self.route_board_alight),
            slack_index: route.slack_index,
            transit_reluctance_index: route.transit_reluctance_index,
            priority_group: route.priority_group,
        };
        let timetable = Timetable { pattern, stop_times: route.get_stop_times(&self.stop_times) };
        RouteView { pattern, timetable }
    }

    fn transfers_from_stop(&self, stop: StopIndex) -> &[Transfer] {
        let stop = &self.stops[stop as usize];
        &self.transfers_from[stop.transfers_from_idx..(stop.transfers_from_idx + stop.num_transfers_from)]
    }

    fn transfers_to_stop(&self, stop: StopIndex) -> &[Transfer] {
        let stop = &self.stops[stop as usize];
        &self.transfers_to[stop.transfers_to_idx..(stop.transfers_to_idx + stop.num_transfers_to)]
    }

    fn transfer_constraints_forward_search(&self, route: RouteIndex) -> ConstrainedBoardingSearch<'_> {
        ConstrainedBoardingSearch::new(&self.constraints_to_route[route as usize], true)
    }

    fn transfer_constraints_reverse_search(&self, route: RouteIndex) -> ConstrainedBoardingSearch<'_> {
        ConstrainedBoardingSearch::new(&self.constraints_from_route[route as usize], false)
    }

    fn cost_calculator(&self) -> &CostCalculator {
        &self.cost_calculator
    }

    fn slack_provider(&self) -> &SlackProvider {
        &self.slack_provider
    }

    fn valid_transit_data_start_time(&self) -> Timestamp {
        self.valid_start_time
    }

    fn valid_transit_data_end_time(&self) -> Timestamp {
        self.valid_end_time
    }

    fn stop_name(&self, stop: StopIndex) -> &str {
        &self.stops[stop as usize].name
    }
}

struct RouteDraft {
    name: String,
    stops: Vec<StopIndex>,
    board_alight: Vec<BoardAlight>,
    trips: Vec<(TripId, Vec<StopTime>)>,
    slack_index: usize,
    transit_reluctance_index: usize,
    priority_group: u32,
}

struct ConstraintDraft {
    from_trip: TripId,
    from_stop: StopIndex,
    to_trip: TripId,
    to_stop: StopIndex,
    constraint: TransferConstraint,
}

/// Collects stops, routes, trips and transfers and turns them into a [`Network`].
#[derive(Default)]
pub struct NetworkBuilder {
    stops: Vec<String>,
    routes: Vec<RouteDraft>,
    trip_routes: Vec<RouteIndex>,
    transfers: Vec<Transfer>,
    constraints: Vec<ConstraintDraft>,
    cost_params: CostParams,
    slack_provider: SlackProvider,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stop(&mut self, name: &str) -> StopIndex {
        self.stops.push(name.to_string());
        (self.stops.len() - 1) as StopIndex
    }

    pub fn add_route(&mut self, name: &str, stops: &[StopIndex]) -> RouteIndex {
        self.routes.push(RouteDraft {
            name: name.to_string(),
            stops: stops.to_vec(),
            board_alight: vec![BoardAlight::BOTH; stops.len()],
            trips: Vec::new(),
            slack_index: 0,
            transit_reluctance_index: 0,
            priority_group: 0,
        });
        (self.routes.len() - 1) as RouteIndex
    }

    pub fn set_slack_index(&mut self, route: RouteIndex, slack_index: usize) -> &mut Self {
        self.routes[route as usize].slack_index = slack_index;
        self
    }

    pub fn set_transit_reluctance_index(&mut self, route: RouteIndex, index: usize) -> &mut Self {
        self.routes[route as usize].transit_reluctance_index = index;
        self
    }

    pub fn set_priority_group(&mut self, route: RouteIndex, group: u32) -> &mut Self {
        self.routes[route as usize].priority_group = group;
        self
    }

    /// Restricts boarding or alighting at stop position `pos` of `route`, for every trip.
    pub fn set_board_alight(&mut self, route: RouteIndex, pos: StopPosition, board_alight: BoardAlight) -> &mut Self {
        self.routes[route as usize].board_alight[pos as usize] = board_alight;
        self
    }

    pub fn add_trip(&mut self, route: RouteIndex, stop_times: Vec<StopTime>) -> TripId {
        let id = TripId(self.trip_routes.len());
        self.trip_routes.push(route);
        self.routes[route as usize].trips.push((id, stop_times));
        id
    }

    /// Adds a trip without dwell times, arriving and departing at the same time at every stop.
    pub fn add_trip_times(&mut self, route: RouteIndex, times: &[Timestamp]) -> TripId {
        let stop_times = times
            .iter()
            .map(|&time| StopTime { arrival_time: time, departure_time: time })
            .collect();
        self.add_trip(route, stop_times)
    }

    /// Adds a trip from a schedule like `"10:00 10:10 10:20"`.
    pub fn add_trip_schedule(&mut self, route: RouteIndex, schedule: &str) -> RaptorResult<TripId> {
        let times = schedule
            .split_whitespace()
            .map(|token| {
                utils::parse_time(token)
                    .ok_or_else(|| RaptorError::InvalidNetwork(format!("invalid time '{token}'")))
            })
            .collect::<RaptorResult<Vec<_>>>()?;
        Ok(self.add_trip_times(route, &times))
    }

    pub fn add_transfer(&mut self, from: StopIndex, to: StopIndex, duration: Duration) -> &mut Self {
        self.transfers.push(Transfer::walk(from, to, duration));
        self
    }

    pub fn add_transfer_with_cost(&mut self, transfer: Transfer) -> &mut Self {
        self.transfers.push(transfer);
        self
    }

    /// Constrains the transfer from `from_trip` at `from_stop` to `to_trip` at `to_stop`. The
    /// first visit of each stop in the trip's route is used.
    pub fn add_constrained_transfer(
        &mut self,
        from_trip: TripId,
        from_stop: StopIndex,
        to_trip: TripId,
        to_stop: StopIndex,
        constraint: TransferConstraint,
    ) -> &mut Self {
        self.constraints.push(ConstraintDraft { from_trip, from_stop, to_trip, to_stop, constraint });
        self
    }

    pub fn cost_params(&mut self, cost_params: CostParams) -> &mut Self {
        self.cost_params = cost_params;
        self
    }

    pub fn slack_provider(&mut self, slack_provider: SlackProvider) -> &mut Self {
        self.slack_provider = slack_provider;
        self
    }

    pub fn build(self) -> RaptorResult<Network> {
        let num_stops = self.stops.len();
        let check_stop = |stop: StopIndex| {
            if (stop as usize) < num_stops {
                Ok(())
            } else {
                Err(RaptorError::InvalidNetwork(format!("stop {stop} does not exist")))
            }
        };

        let mut stops: Vec<Stop> = self
            .stops
            .iter()
            .map(|name| Stop {
                name: name.as_str().into(),
                routes_idx: 0,
                num_routes: 0,
                transfers_from_idx: 0,
                num_transfers_from: 0,
                transfers_to_idx: 0,
                num_transfers_to: 0,
            })
            .collect();
        let stop_index: HashMap<Box<str>, StopIndex> = self
            .stops
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str().into(), i as StopIndex))
            .collect();

        // Construct routes, which point to a series of stops and stop times.
        let mut routes = Vec::with_capacity(self.routes.len());
        let mut route_stops = Vec::new();
        let mut route_board_alight = Vec::new();
        let mut stop_times = Vec::new();
        let mut trip_ids = vec![GlobalTripIndex { route_idx: 0, trip_idx: 0 }; self.trip_routes.len()];
        let mut routes_by_stop: Vec<Vec<RouteIndex>> = vec![Vec::new(); num_stops];
        for (route_idx, mut draft) in self.routes.into_iter().enumerate() {
            let route_idx = route_idx as RouteIndex;
            if draft.stops.len() < 2 {
                return Err(RaptorError::InvalidNetwork(format!("route {} has less than two stops", draft.name)));
            }
            for &stop in &draft.stops {
                check_stop(stop)?;
                if !routes_by_stop[stop as usize].contains(&route_idx) {
                    routes_by_stop[stop as usize].push(route_idx);
                }
            }
            for (_, trip) in &draft.trips {
                validate_trip(&draft.name, draft.stops.len(), trip)?;
            }

            // Sort trips in route based on departure from the first stop.
            draft.trips.sort_by_key(|(_, trip)| (trip[0].departure_time, trip[trip.len() - 1].arrival_time));
            for pair in draft.trips.windows(2) {
                let overtakes = pair[0].1.iter().zip(pair[1].1.iter()).any(|(a, b)| {
                    a.departure_time > b.departure_time || a.arrival_time > b.arrival_time
                });
                if overtakes {
                    return Err(RaptorError::InvalidNetwork(format!(
                        "trips overtake each other on route {}",
                        draft.name
                    )));
                }
            }

            routes.push(Route {
                name: draft.name.into_boxed_str(),
                num_stops: draft.stops.len(),
                num_trips: draft.trips.len(),
                route_stops_idx: route_stops.len(),
                stop_times_idx: stop_times.len(),
                slack_index: draft.slack_index,
                transit_reluctance_index: draft.transit_reluctance_index,
                priority_group: draft.priority_group,
            });
            route_stops.extend_from_slice(&draft.stops);
            route_board_alight.extend_from_slice(&draft.board_alight);
            for (trip_idx, (id, trip)) in draft.trips.into_iter().enumerate() {
                trip_ids[id.0] = GlobalTripIndex { route_idx, trip_idx: trip_idx as TripIndex };
                stop_times.extend(trip);
            }
        }

        // Index the routes for a given stop.
        let mut stop_routes = Vec::new();
        for (stop, routes_at_stop) in stops.iter_mut().zip(routes_by_stop) {
            stop.routes_idx = stop_routes.len();
            stop.num_routes = routes_at_stop.len();
            stop_routes.extend(routes_at_stop);
        }

        for transfer in &self.transfers {
            check_stop(transfer.from_stop)?;
            check_stop(transfer.to_stop)?;
        }
        let transfers_from = pareto_filter_transfers(self.transfers);
        for (stop_idx, stop) in stops.iter_mut().enumerate() {
            stop.transfers_from_idx = transfers_from.partition_point(|t| (t.from_stop as usize) < stop_idx);
            stop.num_transfers_from = transfers_from[stop.transfers_from_idx..]
                .iter()
                .take_while(|t| t.from_stop as usize == stop_idx)
                .count();
        }
        let mut transfers_to = transfers_from.clone();
        transfers_to.sort_by_key(|t| (t.to_stop, t.from_stop));
        for (stop_idx, stop) in stops.iter_mut().enumerate() {
            stop.transfers_to_idx = transfers_to.partition_point(|t| (t.to_stop as usize) < stop_idx);
            stop.num_transfers_to = transfers_to[stop.transfers_to_idx..]
                .iter()
                .take_while(|t| t.to_stop as usize == stop_idx)
                .count();
        }

        let mut constraints_to_route = vec![Vec::new(); routes.len()];
        let mut constraints_from_route = vec![Vec::new(); routes.len()];
        for draft in &self.constraints {
            let from_trip = trip_ids[draft.from_trip.0];
            let to_trip = trip_ids[draft.to_trip.0];
            let position = |trip: GlobalTripIndex, stop: StopIndex| {
                let route = &routes[trip.route_idx as usize];
                route
                    .get_stops(&route_stops)
                    .iter()
                    .position(|&s| s == stop)
                    .map(|pos| pos as StopPosition)
                    .ok_or_else(|| {
                        RaptorError::InvalidNetwork(format!("stop {stop} is not on route {}", route.name))
                    })
            };
            let transfer = ConstrainedTransfer {
                from_trip,
                from_stop_pos: position(from_trip, draft.from_stop)?,
                to_trip,
                to_stop_pos: position(to_trip, draft.to_stop)?,
                constraint: draft.constraint,
            };
            constraints_to_route[to_trip.route_idx as usize].push(transfer);
            constraints_from_route[from_trip.route_idx as usize].push(transfer);
        }

        let valid_start_time = stop_times.iter().map(|st| st.departure_time).min().unwrap_or(0);
        let valid_end_time = stop_times.iter().map(|st| st.arrival_time).max().unwrap_or(0);

        debug!(
            "Built network with {} stops, {} routes, {} trips and {} transfers.",
            stops.len(),
            routes.len(),
            trip_ids.len(),
            transfers_from.len()
        );

        Ok(Network {
            routes,
            stops,
            stop_index,
            stop_times,
            stop_routes,
            route_stops,
            route_board_alight,
            transfers_from,
            transfers_to,
            constraints_to_route,
            constraints_from_route,
            trip_ids,
            cost_calculator: CostCalculator::new(&self.cost_params),
            slack_provider: self.slack_provider,
            valid_start_time,
            valid_end_time,
        })
    }
}

fn validate_trip(route: &str, num_stops: usize, trip: &[StopTime]) -> RaptorResult<()> {
    if trip.len() != num_stops {
        return Err(RaptorError::InvalidNetwork(format!(
            "trip on route {route} has {} stop times, expected {num_stops}",
            trip.len()
        )));
    }
    let decreasing = trip.iter().any(|st| st.arrival_time > st.departure_time)
        || trip.windows(2).any(|pair| pair[0].departure_time > pair[1].arrival_time);
    if decreasing {
        return Err(RaptorError::InvalidNetwork(format!("trip on route {route} goes back in time")));
    }
    Ok(())
}

// Keeps, for every pair of stops, only the transfers no other transfer dominates. The result is
// sorted by origin stop.
fn pareto_filter_transfers(mut transfers: Vec<Transfer>) -> Vec<Transfer> {
    transfers.sort_by_key(|t| (t.from_stop, t.to_stop, t.duration, t.c1));
    let mut kept: Vec<Transfer> = Vec::with_capacity(transfers.len());
    for transfer in transfers {
        let group_start = kept
            .iter()
            .rposition(|t| (t.from_stop, t.to_stop) != (transfer.from_stop, transfer.to_stop))
            .map_or(0, |i| i + 1);
        if !kept[group_start..].iter().any(|t| t.dominates(&transfer)) {
            kept.push(transfer);
        }
    }
    kept
}
