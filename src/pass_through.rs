use arrayvec::ArrayVec;

use crate::cost::C2;
use crate::error::{RaptorError, RaptorResult};
use crate::network::StopIndex;

/// The most pass-through points a request can have.
pub const MAX_PASS_THROUGH_POINTS: usize = 32;

/// A set of stops of which a path must visit at least one, e.g. the platforms of a station.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassThroughPoint {
    pub name: Box<str>,
    pub stops: Vec<StopIndex>,
}

impl PassThroughPoint {
    pub fn new(name: &str, stops: &[StopIndex]) -> Self {
        Self { name: name.into(), stops: stops.to_vec() }
    }
}

/// Tracks, in c2, how many of an ordered list of pass-through points a path has visited.
///
/// c2 is the number of points visited in order, so visiting a later point first does not count.
#[derive(Clone, Debug)]
pub struct PassThroughPoints {
    num_points: usize,
    // Bit `i` set if the stop belongs to point `i + 1`.
    points_by_stop: Vec<u32>,
    current: ArrayVec<C2, MAX_PASS_THROUGH_POINTS>,
}

impl PassThroughPoints {
    pub fn new(points: &[PassThroughPoint], number_of_stops: usize) -> RaptorResult<Self> {
        if points.len() > MAX_PASS_THROUGH_POINTS {
            return Err(RaptorError::InvalidSearchParameter(format!(
                "at most {MAX_PASS_THROUGH_POINTS} pass-through points are supported"
            )));
        }
        let mut points_by_stop = vec![0u32; number_of_stops];
        for (i, point) in points.iter().enumerate() {
            if point.stops.is_empty() {
                return Err(RaptorError::InvalidSearchParameter(format!(
                    "pass-through point '{}' has no stops",
                    point.name
                )));
            }
            for &stop in &point.stops {
                let mask = points_by_stop.get_mut(stop as usize).ok_or(RaptorError::UnknownStop {
                    stop,
                    num_stops: number_of_stops,
                })?;
                *mask |= 1 << i;
            }
        }
        Ok(Self { num_points: points.len(), points_by_stop, current: ArrayVec::new() })
    }

    /// Checks if `stop` is part of any point, remembering which for [`Self::update_c2_value`].
    pub fn is_pass_through_point(&mut self, stop: StopIndex) -> bool {
        self.current.clear();
        let mask = self.points_by_stop.get(stop as usize).copied().unwrap_or(0);
        for seq in 0..self.num_points {
            if mask & (1 << seq) != 0 {
                self.current.push(seq as C2 + 1);
            }
        }
        !self.current.is_empty()
    }

    /// Calls `update` with the new c2 if the last checked stop is the next point to visit.
    pub fn update_c2_value(&self, c2: C2, update: impl FnOnce(C2)) {
        if self.current.contains(&(c2 + 1)) {
            update(c2 + 1);
        }
    }

    pub fn accept_c2_at_destination(&self, c2: C2) -> bool {
        c2 as usize == self.num_points
    }

    /// More points visited is better.
    pub fn dominance(left: C2, right: C2) -> bool {
        left > right
    }
}

/// Transit-group priority keeps paths using different sets of priority groups. c2 is the set
/// of groups used, and using fewer groups is better.
pub fn transit_group_dominates(left: C2, right: C2) -> bool {
    (left | right) != left
}

/// Adds the group of a boarded pattern to the set in c2.
pub fn merge_transit_group(c2: C2, group: u32) -> C2 {
    c2 | (1 << group.min(31)) as C2
}
