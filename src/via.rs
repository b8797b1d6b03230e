use crate::cost::C2;
use crate::error::{RaptorError, RaptorResult};
use crate::network::{Duration, StopIndex};

/// A location a path must get off at (or walk to) before going on, e.g. any platform of a
/// station. `minimum_wait_time` is spent at the stop before boarding again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViaLocation {
    pub label: Box<str>,
    pub minimum_wait_time: Duration,
    pub stops: Vec<StopIndex>,
}

impl ViaLocation {
    pub fn new(label: &str, stops: &[StopIndex]) -> Self {
        Self { label: label.into(), minimum_wait_time: 0, stops: stops.to_vec() }
    }

    pub fn with_minimum_wait_time(mut self, minimum_wait_time: Duration) -> Self {
        self.minimum_wait_time = minimum_wait_time;
        self
    }
}

/// The stages of a via search. A path is in stage `n` once it has visited the first `n`
/// locations in order; the stage is carried in c2.
#[derive(Clone, Debug)]
pub(crate) struct ViaStages {
    locations: Vec<ViaLocation>,
}

impl ViaStages {
    pub fn new(locations: &[ViaLocation], number_of_stops: usize) -> RaptorResult<Self> {
        for location in locations {
            if location.stops.is_empty() {
                return Err(RaptorError::InvalidSearchParameter(format!(
                    "via location '{}' has no stops",
                    location.label
                )));
            }
            if location.minimum_wait_time < 0 {
                return Err(RaptorError::InvalidSearchParameter(format!(
                    "via location '{}' has a negative minimum wait time",
                    location.label
                )));
            }
            if let Some(&stop) = location.stops.iter().find(|&&stop| stop as usize >= number_of_stops) {
                return Err(RaptorError::UnknownStop { stop, num_stops: number_of_stops });
            }
        }
        Ok(Self { locations: locations.to_vec() })
    }

    /// The minimum wait before leaving `stop` if it completes the stage a path is in.
    pub fn completes_stage(&self, stage: C2, stop: StopIndex) -> Option<Duration> {
        let location = self.locations.get(usize::try_from(stage).ok()?)?;
        location.stops.contains(&stop).then_some(location.minimum_wait_time)
    }

    pub fn accept_c2_at_destination(&self, c2: C2) -> bool {
        c2 as usize == self.locations.len()
    }

    /// A later stage is better.
    pub fn dominance(left: C2, right: C2) -> bool {
        left > right
    }
}
