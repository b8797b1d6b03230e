use crate::journey::JourneyError;
use crate::network::{RouteIndex, StopIndex, StopPosition, TripIndex};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RaptorError {
    #[error("No access paths given, at least one is required.")]
    NoAccessPaths,
    #[error("No egress paths given, at least one is required.")]
    NoEgressPaths,
    #[error("Either the earliest departure time or the latest arrival time must be set.")]
    NoSearchTime,
    #[error("'prefer late arrival' requires the latest arrival time to be set.")]
    PreferLateArrivalWithoutLatestArrival,
    #[error("'prefer late arrival' can not be combined with the timetable view.")]
    PreferLateArrivalWithTimetable,
    #[error("The multi-criteria profile only supports searching forward in time.")]
    MultiCriteriaReverseSearch,
    #[error("Invalid search parameter: {0}")]
    InvalidSearchParameter(String),
    #[error("Access/egress to stop {stop} is outside the network ({num_stops} stops).")]
    UnknownStop { stop: StopIndex, num_stops: usize },
    #[error(
        "More than one constrained transfer from trip {source_trip} at position {source_pos} \
         to trip {target_trip} at position {target_pos} on route {route}."
    )]
    DuplicateConstrainedTransfer {
        route: RouteIndex,
        source_trip: TripIndex,
        source_pos: StopPosition,
        target_trip: TripIndex,
        target_pos: StopPosition,
    },
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),
    #[error(transparent)]
    Journey(#[from] JourneyError),
}

pub type RaptorResult<T> = Result<T, RaptorError>;
