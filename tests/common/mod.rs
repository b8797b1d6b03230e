#![allow(dead_code)]

use raptor::network::{StopIndex, Timestamp};
use raptor::request::RaptorRequestBuilder;
use raptor::{utils, AccessEgress, Network, NetworkBuilder, Path, PathLeg, RaptorProfile, RaptorRequest};

pub fn t(time: &str) -> Timestamp {
    utils::parse_time(time).unwrap()
}

pub fn stops<const N: usize>(builder: &mut NetworkBuilder, names: [&str; N]) -> [StopIndex; N] {
    names.map(|name| builder.add_stop(name))
}

/// Adds a route with one trip per schedule, e.g. `&["10:00 10:10 10:20"]`.
pub fn add_route(builder: &mut NetworkBuilder, name: &str, stops: &[StopIndex], schedules: &[&str]) {
    let route = builder.add_route(name, stops);
    for schedule in schedules {
        builder.add_trip_schedule(route, schedule).unwrap();
    }
}

pub fn stop(network: &Network, name: &str) -> StopIndex {
    network.get_stop_idx(name).unwrap()
}

/// A request walking zero seconds from `from` and to `to`.
pub fn request(network: &Network, profile: RaptorProfile, from: &str, to: &str) -> RaptorRequestBuilder {
    RaptorRequest::builder()
        .profile(profile)
        .add_access(AccessEgress::walk(stop(network, from), 0))
        .add_egress(AccessEgress::walk(stop(network, to), 0))
}

pub fn route_names(path: &Path) -> Vec<&str> {
    path.transit_legs().map(|leg| &*leg.route_name).collect()
}

pub fn transit_times(path: &Path) -> Vec<(Timestamp, Timestamp)> {
    path.transit_legs().map(|leg| (leg.board_time, leg.alight_time)).collect()
}

pub fn number_of_transfer_legs(path: &Path) -> usize {
    path.legs.iter().filter(|leg| matches!(leg, PathLeg::Transfer(_))).count()
}
