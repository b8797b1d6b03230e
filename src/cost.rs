use crate::constrained::TransferConstraint;
use crate::network::{Duration, StopIndex, Timestamp};
use crate::transit::{AccessEgress, TripSchedule};

/// Generalized cost in centi-seconds.
pub type Cost = i32;

/// The second, request specific, criterion: pass-through progress or transit-group set.
pub type C2 = i32;

pub struct RaptorCostConverter;

impl RaptorCostConverter {
    /// Converts seconds (or a reluctance factor) into centi-seconds, rounding to the nearest.
    pub fn to_raptor_cost(value: f64) -> Cost {
        (value * 100.0).round() as Cost
    }

    /// Formats a cost in seconds with thousands separators, e.g. `8_154`.
    pub fn to_string(cost: Cost) -> String {
        let seconds = (cost as f64 / 100.0).round() as i64;
        let digits = seconds.unsigned_abs().to_string();
        let mut text = String::with_capacity(digits.len() + 4);
        if seconds < 0 {
            text.push('-');
        }
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                text.push('_');
            }
            text.push(ch);
        }
        text
    }
}

/// User facing cost parameters, in seconds and reluctance factors.
#[derive(Clone, Debug, PartialEq)]
pub struct CostParams {
    pub board_cost: i32,
    pub transfer_cost: i32,
    pub wait_reluctance: f64,
    /// Indexed by a pattern's transit reluctance index, 1.0 for indices outside the list.
    pub transit_reluctance: Vec<f64>,
    /// Extra cost per stop for transferring there, in seconds.
    pub stop_transfer_cost: Option<Vec<i32>>,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            board_cost: 60,
            transfer_cost: 120,
            wait_reluctance: 1.0,
            transit_reluctance: Vec::new(),
            stop_transfer_cost: None,
        }
    }
}

const DEFAULT_TRANSIT_FACTOR: Cost = 100;

#[derive(Clone, Debug)]
pub struct CostCalculator {
    board_cost_only: Cost,
    board_and_transfer_cost: Cost,
    transfer_cost_only: Cost,
    wait_factor: Cost,
    transit_factors: Vec<Cost>,
    min_transit_factor: Cost,
    stop_transfer_cost: Option<Vec<Cost>>,
    // The largest refund `cost_egress` can give.
    max_stop_transfer_cost: Cost,
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::new(&CostParams::default())
    }
}

impl CostCalculator {
    pub fn new(params: &CostParams) -> Self {
        let transit_factors: Vec<Cost> = params
            .transit_reluctance
            .iter()
            .map(|&reluctance| RaptorCostConverter::to_raptor_cost(reluctance))
            .collect();
        // Patterns outside the reluctance list ride at the default factor.
        let min_transit_factor = transit_factors.iter().copied().fold(DEFAULT_TRANSIT_FACTOR, Cost::min);
        let stop_transfer_cost: Option<Vec<Cost>> = params
            .stop_transfer_cost
            .as_ref()
            .map(|costs| costs.iter().map(|&c| RaptorCostConverter::to_raptor_cost(c as f64)).collect());
        let max_stop_transfer_cost =
            stop_transfer_cost.as_ref().and_then(|costs| costs.iter().copied().max()).unwrap_or(0).max(0);
        let board_cost_only = RaptorCostConverter::to_raptor_cost(params.board_cost as f64);
        let transfer_cost_only = RaptorCostConverter::to_raptor_cost(params.transfer_cost as f64);
        Self {
            board_cost_only,
            board_and_transfer_cost: board_cost_only + transfer_cost_only,
            transfer_cost_only,
            wait_factor: RaptorCostConverter::to_raptor_cost(params.wait_reluctance),
            transit_factors,
            min_transit_factor,
            stop_transfer_cost,
            max_stop_transfer_cost,
        }
    }

    pub fn transit_factor(&self, reluctance_index: usize) -> Cost {
        self.transit_factors.get(reluctance_index).copied().unwrap_or(DEFAULT_TRANSIT_FACTOR)
    }

    fn stop_transfer_cost(&self, stop: StopIndex) -> Cost {
        self.stop_transfer_cost
            .as_ref()
            .and_then(|costs| costs.get(stop as usize).copied())
            .unwrap_or(0)
    }

    /// The cost of waiting for and boarding `trip`.
    ///
    /// A stay-seated transfer is priced as riding, so if slack makes `board_time` earlier
    /// than `prev_arrival_time` the result is negative.
    pub fn boarding_cost(
        &self,
        first_boarding: bool,
        prev_arrival_time: Timestamp,
        board_stop: StopIndex,
        board_time: Timestamp,
        trip: &TripSchedule,
        constraint: Option<TransferConstraint>,
    ) -> Cost {
        let wait_time = board_time - prev_arrival_time;
        match constraint {
            Some(TransferConstraint::StaySeated) => {
                self.transit_factor(trip.pattern().transit_reluctance_index()) * wait_time
            }
            Some(TransferConstraint::Guaranteed) => self.wait_factor * wait_time,
            _ => {
                let mut cost = self.wait_factor * wait_time;
                if first_boarding {
                    cost += self.board_cost_only;
                } else {
                    cost += self.board_and_transfer_cost + self.stop_transfer_cost(board_stop);
                }
                cost
            }
        }
    }

    /// Accumulated cost after riding `trip` for `transit_time` and alighting at `to_stop`.
    pub fn transit_arrival_cost(
        &self,
        board_cost: Cost,
        alight_slack: Duration,
        transit_time: Duration,
        trip: &TripSchedule,
        to_stop: StopIndex,
    ) -> Cost {
        board_cost
            + self.transit_factor(trip.pattern().transit_reluctance_index()) * transit_time
            + self.wait_factor * alight_slack
            + self.stop_transfer_cost(to_stop)
    }

    /// The full cost of an egress leg, including the correction for the stop transfer cost
    /// added when arriving at its stop.
    pub fn cost_egress(&self, egress: &AccessEgress) -> Cost {
        if egress.has_rides() {
            egress.c1() + self.transfer_cost_only
        } else if self.stop_transfer_cost.is_some() {
            egress.c1() - self.stop_transfer_cost(egress.stop())
        } else {
            egress.c1()
        }
    }

    /// A lower bound on the cost of reaching the destination, used for pruning.
    ///
    /// `None` means the destination can be reached without boarding again. Stop transfer
    /// costs are refunded by `cost_egress` at the egress stop, which may not be the stop the
    /// arrival is at, so the largest refund is always subtracted.
    pub fn calculate_remaining_min_cost(&self, min_travel_time: Duration, min_num_transfers: Option<u32>) -> Cost {
        let riding = self.min_transit_factor * min_travel_time - self.max_stop_transfer_cost;
        match min_num_transfers {
            Some(n) => self.board_cost_only + self.board_and_transfer_cost * n as Cost + riding,
            None => riding,
        }
    }

    pub fn wait_cost(&self, seconds: Duration) -> Cost {
        self.wait_factor * seconds
    }

    /// Riding cost relative to an arbitrary point on the trip; only comparable between rides
    /// on the same trip.
    pub fn on_trip_relative_riding_cost(&self, board_time: Timestamp, trip: &TripSchedule) -> Cost {
        -self.transit_factor(trip.pattern().transit_reluctance_index()) * board_time
    }
}
