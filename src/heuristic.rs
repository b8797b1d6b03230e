use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use log::debug;

use crate::network::{Duration, RouteIndex, StopIndex};
use crate::transit::{AccessEgress, TransitDataProvider};

const NOT_COMPUTED: i32 = -1;
const UNREACHABLE: i32 = i32::MAX;

/// A lower bound read from [`Heuristics`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LowerBound {
    /// Not (yet) published; must not be used for pruning.
    NotComputed,
    Unreachable,
    Value(i32),
}

impl LowerBound {
    fn from_raw(raw: i32) -> Self {
        match raw {
            NOT_COMPUTED => LowerBound::NotComputed,
            UNREACHABLE => LowerBound::Unreachable,
            value => LowerBound::Value(value),
        }
    }
}

/// Per stop lower bounds on the travel time and number of rides to the destination.
///
/// Computed by a time-independent backward search over minimum segment times. The values are
/// published in one go when the computation finishes, so a concurrent reader sees either
/// nothing or the complete result for a stop.
pub struct Heuristics {
    min_duration: Vec<AtomicI32>,
    min_rides: Vec<AtomicI32>,
    complete: AtomicBool,
}

// Minimum ride time from each position to the next, and dwell at each position.
struct RouteBounds {
    segment: Vec<Duration>,
    dwell: Vec<Duration>,
}

fn route_bounds<T: TransitDataProvider>(transit: &T, route: RouteIndex) -> RouteBounds {
    let timetable = transit.route(route).timetable;
    let num_stops = timetable.pattern.number_of_stops();
    let mut segment = vec![Duration::MAX; num_stops];
    let mut dwell = vec![Duration::MAX; num_stops];
    for trip in 0..timetable.number_of_trips() {
        let schedule = timetable.trip(trip as u32);
        for pos in 0..num_stops as u32 {
            let at = pos as usize;
            dwell[at] = dwell[at].min(schedule.departure(pos) - schedule.arrival(pos));
            if at + 1 < num_stops {
                segment[at] = segment[at].min(schedule.arrival(pos + 1) - schedule.departure(pos));
            }
        }
    }
    RouteBounds { segment, dwell }
}

impl Heuristics {
    pub fn new(number_of_stops: usize) -> Self {
        Self {
            min_duration: (0..number_of_stops).map(|_| AtomicI32::new(NOT_COMPUTED)).collect(),
            min_rides: (0..number_of_stops).map(|_| AtomicI32::new(NOT_COMPUTED)).collect(),
            complete: AtomicBool::new(false),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn min_travel_duration(&self, stop: StopIndex) -> LowerBound {
        self.min_duration
            .get(stop as usize)
            .map_or(LowerBound::NotComputed, |v| LowerBound::from_raw(v.load(Ordering::Acquire)))
    }

    pub fn min_number_of_rides(&self, stop: StopIndex) -> LowerBound {
        self.min_rides
            .get(stop as usize)
            .map_or(LowerBound::NotComputed, |v| LowerBound::from_raw(v.load(Ordering::Acquire)))
    }

    /// The shortest possible trip from any of `access` to the destination, `None` if the
    /// bounds are not computed or nothing is reachable.
    pub fn min_travel_duration_from(&self, access: &[AccessEgress]) -> Option<Duration> {
        access
            .iter()
            .filter_map(|a| match self.min_travel_duration(a.stop()) {
                LowerBound::Value(d) => Some(a.duration() + d),
                _ => None,
            })
            .min()
    }

    /// Runs the backward search from `egress` for at most `max_rounds` rides and publishes
    /// the result. Gives up without publishing anything if `cancel` is set.
    pub fn compute<T: TransitDataProvider>(
        &self,
        transit: &T,
        egress: &[AccessEgress],
        max_rounds: usize,
        cancel: &AtomicBool,
    ) {
        let num_stops = transit.number_of_stops();
        let mut best = vec![UNREACHABLE; num_stops];
        let mut rides = vec![UNREACHABLE; num_stops];
        let mut touched = Vec::new();
        let mut is_touched = vec![false; num_stops];
        let mut bounds: Vec<Option<RouteBounds>> = (0..transit.number_of_routes()).map(|_| None).collect();

        for e in egress {
            let stop = e.stop() as usize;
            if stop >= num_stops || e.duration() < 0 {
                continue;
            }
            if e.duration() < best[stop] {
                best[stop] = e.duration();
            }
            // Rides inside the egress are not priced as boardings, so they do not count here.
            rides[stop] = 0;
            if !is_touched[stop] {
                is_touched[stop] = true;
                touched.push(e.stop());
            }
        }
        relax_transfers(transit, &mut best, &mut rides, &mut touched, &mut is_touched);

        let mut round = 0;
        while !touched.is_empty() && round < max_rounds {
            if cancel.load(Ordering::Relaxed) {
                debug!("Heuristic search cancelled in round {round}.");
                return;
            }
            round += 1;
            let previous = best.clone();
            let routes = transit.route_index_iterator(&touched);
            for &stop in &touched {
                is_touched[stop as usize] = false;
            }
            touched.clear();

            for route in routes {
                let limits = bounds[route as usize].get_or_insert_with(|| route_bounds(transit, route));
                let pattern = transit.route(route).pattern;
                // Minimum time from being on board at the position after the current one.
                let mut on_board_next: Option<Duration> = None;
                for pos in (0..pattern.number_of_stops()).rev() {
                    let stop = pattern.stop_index(pos as u32) as usize;
                    let depart = on_board_next
                        .filter(|_| limits.segment[pos] != Duration::MAX)
                        .map(|on_board| limits.segment[pos] + on_board);
                    if let Some(depart) = depart {
                        if depart < best[stop] {
                            best[stop] = depart;
                            if !is_touched[stop] {
                                is_touched[stop] = true;
                                touched.push(stop as StopIndex);
                            }
                        }
                        if rides[stop] == UNREACHABLE {
                            rides[stop] = round as i32;
                        }
                    }
                    let alight = (previous[stop] != UNREACHABLE).then_some(previous[stop]);
                    let ride_through = depart
                        .filter(|_| limits.dwell[pos] != Duration::MAX)
                        .map(|d| d + limits.dwell[pos]);
                    on_board_next = match (alight, ride_through) {
                        (Some(a), Some(r)) => Some(a.min(r)),
                        (a, r) => a.or(r),
                    };
                }
            }
            relax_transfers(transit, &mut best, &mut rides, &mut touched, &mut is_touched);
        }

        for (stop, (&duration, &num_rides)) in best.iter().zip(&rides).enumerate() {
            self.min_duration[stop].store(duration, Ordering::Release);
            self.min_rides[stop].store(num_rides, Ordering::Release);
        }
        self.complete.store(true, Ordering::Release);
        debug!(
            "Heuristic search finished after {round} rounds, {} of {num_stops} stops reach the destination.",
            best.iter().filter(|&&d| d != UNREACHABLE).count()
        );
    }
}

// Walks backwards over transfers into the touched stops.
fn relax_transfers<T: TransitDataProvider>(
    transit: &T,
    best: &mut [Duration],
    rides: &mut [i32],
    touched: &mut Vec<StopIndex>,
    is_touched: &mut [bool],
) {
    let reached = touched.clone();
    for stop in reached {
        let at = stop as usize;
        for transfer in transit.transfers_to_stop(stop) {
            if transfer.duration < 0 {
                continue;
            }
            let from = transfer.from_stop as usize;
            let candidate = best[at] + transfer.duration;
            if candidate < best[from] {
                best[from] = candidate;
                if !is_touched[from] {
                    is_touched[from] = true;
                    touched.push(transfer.from_stop);
                }
            }
            rides[from] = rides[from].min(rides[at]);
        }
    }
}
