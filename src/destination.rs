use log::trace;

use crate::calculator::TransitCalculator;
use crate::cost::{Cost, C2};
use crate::journey::ArrivalIndex;
use crate::network::{Duration, Timestamp};
use crate::pareto::{ParetoComparator, ParetoSet};
use crate::request::C2DominanceFn;

/// A path reaching the destination, pointing back into the arrival arena.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct DestinationArrival {
    pub previous: ArrivalIndex,
    /// Index of the connection used to reach the destination (egress when searching forward,
    /// access when searching in reverse).
    pub connection: usize,
    pub departure_time: Timestamp,
    pub arrival_time: Timestamp,
    /// `arrival_time` when searching forward, `departure_time` in reverse.
    pub search_arrival_time: Timestamp,
    pub number_of_transfers: u32,
    pub c1: Cost,
    pub c2: C2,
    pub iteration_time: Timestamp,
    pub duration: Duration,
}

pub(crate) struct DestinationComparator {
    calculator: TransitCalculator,
    timetable: bool,
    c1: Option<f64>,
    c2: Option<C2DominanceFn>,
}

impl DestinationComparator {
    pub fn new(
        calculator: TransitCalculator,
        timetable: bool,
        relax_c1: Option<f64>,
        c2: Option<C2DominanceFn>,
    ) -> Self {
        Self { calculator, timetable, c1: relax_c1, c2 }
    }
}

impl ParetoComparator<DestinationArrival> for DestinationComparator {
    fn left_dominance_exist(&self, l: &DestinationArrival, r: &DestinationArrival) -> bool {
        let calc = &self.calculator;
        calc.is_better(l.search_arrival_time, r.search_arrival_time)
            || l.number_of_transfers < r.number_of_transfers
            || if self.timetable {
                // The later iteration departure is better, so every departure is kept.
                calc.is_better(r.iteration_time, l.iteration_time)
            } else {
                l.duration < r.duration
            }
            || self.c1.is_some_and(|relax| (l.c1 as f64) < (r.c1 as f64 * relax).round())
            || self.c2.is_some_and(|dominates| dominates(l.c2, r.c2))
    }
}

/// The pareto front of destination arrivals for all rounds and iterations of one search.
pub(crate) struct DestinationArrivals {
    arrivals: ParetoSet<DestinationArrival, DestinationComparator>,
    accept_c2: Option<Box<dyn Fn(C2) -> bool + Send + Sync>>,
}

impl DestinationArrivals {
    pub fn new(comparator: DestinationComparator) -> Self {
        Self { arrivals: ParetoSet::new(comparator), accept_c2: None }
    }

    /// Only arrivals with a c2 passing `accept` reach the front.
    pub fn with_c2_acceptance(mut self, accept: impl Fn(C2) -> bool + Send + Sync + 'static) -> Self {
        self.accept_c2 = Some(Box::new(accept));
        self
    }

    /// `false` if arrivals with this c2 are never accepted.
    pub fn accepts_c2(&self, c2: C2) -> bool {
        self.accept_c2.as_ref().map_or(true, |accept| accept(c2))
    }

    pub fn add(&mut self, arrival: DestinationArrival) -> bool {
        if !self.accepts_c2(arrival.c2) {
            return false;
        }
        self.arrivals.add_with(arrival, |dropped| {
            trace!("Destination arrival at {} dropped by a better one.", dropped.arrival_time)
        })
    }

    /// `true` if an arrival this good would make it to the front.
    pub fn qualify(&self, candidate: &DestinationArrival) -> bool {
        self.arrivals.qualify(candidate)
    }

    pub fn len(&self) -> usize {
        self.arrivals.len()
    }

    pub fn into_arrivals(self) -> Vec<DestinationArrival> {
        self.arrivals.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrival(arrival_time: Timestamp, transfers: u32, iteration_time: Timestamp, c1: Cost) -> DestinationArrival {
        DestinationArrival {
            previous: 0,
            connection: 0,
            departure_time: iteration_time,
            arrival_time,
            search_arrival_time: arrival_time,
            number_of_transfers: transfers,
            c1,
            c2: 0,
            iteration_time,
            duration: arrival_time - iteration_time,
        }
    }

    fn standard() -> DestinationArrivals {
        DestinationArrivals::new(DestinationComparator::new(TransitCalculator::forward(), false, None, None))
    }

    #[test]
    fn standard_front_keeps_time_transfers_and_duration_tradeoffs() {
        let mut front = standard();
        assert!(front.add(arrival(37_000, 1, 36_000, 0)));
        assert!(front.add(arrival(37_200, 0, 36_000, 0)));
        // Same arrival, departing later so shorter.
        assert!(front.add(arrival(37_000, 1, 36_060, 0)));
        assert_eq!(front.len(), 2);
        // Worse in every criterion.
        assert!(!front.add(arrival(37_300, 1, 36_000, 0)));
        // Cost is not a criterion in the standard profile.
        assert!(!front.add(arrival(37_000, 1, 36_060, -100)));
    }

    #[test]
    fn timetable_view_keeps_every_departure() {
        let comparator = DestinationComparator::new(TransitCalculator::forward(), true, None, None);
        let mut front = DestinationArrivals::new(comparator);
        assert!(front.add(arrival(37_000, 0, 36_060, 0)));
        // Longer trip, but departing later.
        assert!(front.add(arrival(37_900, 0, 36_120, 0)));
        assert_eq!(front.len(), 2);
    }

    #[test]
    fn relaxed_cost_keeps_slightly_more_expensive_arrivals() {
        let strict = DestinationComparator::new(TransitCalculator::forward(), false, Some(1.0), None);
        let mut front = DestinationArrivals::new(strict);
        front.add(arrival(37_000, 0, 36_000, 1_000));
        assert!(!front.add(arrival(37_000, 0, 36_000, 1_050)));

        let relaxed = DestinationComparator::new(TransitCalculator::forward(), false, Some(1.1), None);
        let mut front = DestinationArrivals::new(relaxed);
        front.add(arrival(37_000, 0, 36_000, 1_000));
        assert!(front.add(arrival(37_000, 0, 36_000, 1_050)));
        assert!(!front.add(arrival(37_000, 0, 36_000, 1_100)));
    }

    #[test]
    fn c2_acceptance_filters_before_dominance() {
        let comparator = DestinationComparator::new(TransitCalculator::forward(), false, Some(1.0), None);
        let mut front = DestinationArrivals::new(comparator).with_c2_acceptance(|c2| c2 == 1);
        let mut rejected = arrival(36_500, 0, 36_000, 0);
        rejected.c2 = 0;
        assert!(!front.add(rejected));
        let mut accepted = arrival(37_000, 0, 36_000, 0);
        accepted.c2 = 1;
        assert!(front.add(accepted));
        assert_eq!(front.len(), 1);
    }
}
