mod common;

use common::{add_route, route_names, stop, stops, t, transit_times};
use raptor::network::Duration;
use raptor::request::RaptorRequestBuilder;
use raptor::slack::SlackProvider;
use raptor::via::ViaLocation;
use raptor::{raptor_search, AccessEgress, Network, NetworkBuilder, Path, PathLeg, RaptorProfile, RaptorRequest};

/// A multi-criteria request departing at 10:00, walking `duration` to or from each named stop.
fn via_request(network: &Network, access: &[(&str, Duration)], egress: &[(&str, Duration)]) -> RaptorRequestBuilder {
    let mut builder =
        RaptorRequest::builder().profile(RaptorProfile::MultiCriteria).earliest_departure_time(t("10:00"));
    for &(name, duration) in access {
        builder = builder.add_access(AccessEgress::walk(stop(network, name), duration));
    }
    for &(name, duration) in egress {
        builder = builder.add_egress(AccessEgress::walk(stop(network, name), duration));
    }
    builder
}

fn via(network: &Network, label: &str, names: &[&str]) -> ViaLocation {
    let stops: Vec<_> = names.iter().map(|name| stop(network, name)).collect();
    ViaLocation::new(label, &stops)
}

fn search(network: &Network, request: RaptorRequestBuilder) -> Vec<Path> {
    raptor_search(network, &request.build().unwrap()).unwrap().paths
}

fn egress_stop(path: &Path) -> Option<u32> {
    path.egress_leg().map(|leg| leg.stop)
}

//          A      B      C      D
// R1:    10:02  10:10  10:20  10:30
// R1:    10:12  10:20  10:30  10:40
#[test]
fn trip_is_left_and_reboarded_at_the_via_stop() {
    let mut builder = NetworkBuilder::new();
    let [a, b, c, d] = stops(&mut builder, ["A", "B", "C", "D"]);
    add_route(&mut builder, "R1", &[a, b, c, d], &["10:02 10:10 10:20 10:30", "10:12 10:20 10:30 10:40"]);
    builder.slack_provider(SlackProvider::uniform(60, 0, 0));
    let network = builder.build().unwrap();

    let request = via_request(&network, &[("A", 30)], &[("D", 30)]).add_via_location(via(&network, "C", &["C"]));
    let paths = search(&network, request);

    assert_eq!(paths.len(), 1);
    let path = &paths[0];
    assert_eq!(route_names(path), vec!["R1", "R1"]);
    assert_eq!(transit_times(path), vec![(t("10:02"), t("10:20")), (t("10:30"), t("10:40"))]);
    assert_eq!(path.number_of_transfers, 1);
    assert_eq!(path.c2, Some(1));
}

//          A      B      C      D      E
// R1:    10:02  10:10         10:20  10:30
// R2:                  10:25  10:30  10:40
// D -> C walking 1 minute.
#[test]
fn via_stop_can_be_reached_by_walking() {
    let mut builder = NetworkBuilder::new();
    let [a, b, c, d, e] = stops(&mut builder, ["A", "B", "C", "D", "E"]);
    add_route(&mut builder, "R1", &[a, b, d, e], &["10:02 10:10 10:20 10:30"]);
    add_route(&mut builder, "R2", &[c, d, e], &["10:25 10:30 10:40"]);
    builder.add_transfer(d, c, 60);
    let network = builder.build().unwrap();

    let request = via_request(&network, &[("A", 30)], &[("E", 30)]).add_via_location(via(&network, "C", &["C"]));
    let paths = search(&network, request);

    assert_eq!(paths.len(), 1);
    let path = &paths[0];
    assert_eq!(route_names(path), vec!["R1", "R2"]);
    assert_eq!(transit_times(path), vec![(t("10:02"), t("10:20")), (t("10:25"), t("10:40"))]);
    assert!(path.legs.iter().any(|leg| matches!(leg, PathLeg::Transfer(leg) if leg.to_stop == c)));
}

//          A      B      C      D
// R1:    10:02  10:05  10:10  10:15
#[test]
fn access_straight_to_the_via_stop_needs_no_transfer() {
    let mut builder = NetworkBuilder::new();
    let [a, b, c, d] = stops(&mut builder, ["A", "B", "C", "D"]);
    add_route(&mut builder, "R1", &[a, b, c, d], &["10:02 10:05 10:10 10:15"]);
    let network = builder.build().unwrap();

    let request = via_request(&network, &[("A", 30), ("B", 30), ("C", 30)], &[("D", 30)])
        .add_via_location(via(&network, "B", &["B"]));
    let paths = search(&network, request);

    assert_eq!(paths.len(), 1);
    let path = &paths[0];
    assert_eq!(path.access_leg().map(|leg| leg.stop), Some(b));
    assert_eq!(transit_times(path), vec![(t("10:05"), t("10:15"))]);
    assert_eq!(path.number_of_transfers, 0);
}

//          A      B      C      D
// R1:    10:02  10:05  10:10  10:20
#[test]
fn egress_straight_from_the_via_stop() {
    let mut builder = NetworkBuilder::new();
    let [a, b, c, d] = stops(&mut builder, ["A", "B", "C", "D"]);
    add_route(&mut builder, "R1", &[a, b, c, d], &["10:02 10:05 10:10 10:20"]);
    let network = builder.build().unwrap();

    // Egress at B has not visited C, riding on to D would need an extra transfer at C.
    let request = via_request(&network, &[("A", 30)], &[("B", 30), ("C", 30), ("D", 30)])
        .add_via_location(via(&network, "C", &["C"]));
    let paths = search(&network, request);

    assert_eq!(paths.len(), 1);
    assert_eq!(egress_stop(&paths[0]), Some(c));
    assert_eq!(transit_times(&paths[0]), vec![(t("10:02"), t("10:10"))]);
}

//          A      B      C      D      E      F
// R1:    10:02  10:05  10:10  10:15  10:20  10:25
// R1:    10:12  10:15  10:20  10:25  10:30  10:35
// R1:    10:22  10:25  10:30  10:35  10:40  10:45
#[test]
fn via_locations_are_visited_one_after_the_other() {
    let mut builder = NetworkBuilder::new();
    let [a, b, c, d, e, f] = stops(&mut builder, ["A", "B", "C", "D", "E", "F"]);
    add_route(
        &mut builder,
        "R1",
        &[a, b, c, d, e, f],
        &[
            "10:02 10:05 10:10 10:15 10:20 10:25",
            "10:12 10:15 10:20 10:25 10:30 10:35",
            "10:22 10:25 10:30 10:35 10:40 10:45",
        ],
    );
    builder.slack_provider(SlackProvider::uniform(60, 0, 0));
    let network = builder.build().unwrap();

    let request = via_request(&network, &[("A", 30)], &[("F", 30)])
        .add_via_location(via(&network, "B", &["B"]))
        .add_via_location(via(&network, "D", &["D"]));
    let paths = search(&network, request);

    assert_eq!(paths.len(), 1);
    let path = &paths[0];
    assert_eq!(
        transit_times(path),
        vec![(t("10:02"), t("10:05")), (t("10:15"), t("10:25")), (t("10:35"), t("10:45"))]
    );
    assert_eq!(path.number_of_transfers, 2);
    assert_eq!(path.c2, Some(2));
}

//          A      B      C      B      C      B      C      B      D
// R1:    10:05  10:10  10:15  10:20  10:25  10:30  10:35  10:40  10:45
#[test]
fn circular_line_visits_the_via_stops_in_the_given_order() {
    let mut builder = NetworkBuilder::new();
    let [a, b, c, d] = stops(&mut builder, ["A", "B", "C", "D"]);
    add_route(
        &mut builder,
        "R1",
        &[a, b, c, b, c, b, c, b, d],
        &["10:05 10:10 10:15 10:20 10:25 10:30 10:35 10:40 10:45"],
    );
    builder.slack_provider(SlackProvider::uniform(60, 0, 0));
    let network = builder.build().unwrap();

    let request = via_request(&network, &[("A", 30)], &[("D", 30)])
        .add_via_location(via(&network, "C", &["C"]))
        .add_via_location(via(&network, "B", &["B"]));
    let paths = search(&network, request);

    assert_eq!(paths.len(), 1);
    assert_eq!(
        transit_times(&paths[0]),
        vec![(t("10:05"), t("10:15")), (t("10:25"), t("10:30")), (t("10:40"), t("10:45"))]
    );
}

//          A      B      C
// R1:    10:04         10:15
// R2:           10:05  10:14
#[test]
fn any_stop_of_a_via_location_will_do() {
    let mut builder = NetworkBuilder::new();
    let [a, b, c] = stops(&mut builder, ["A", "B", "C"]);
    add_route(&mut builder, "R1", &[a, c], &["10:04 10:15"]);
    add_route(&mut builder, "R2", &[b, c], &["10:05 10:14"]);
    let network = builder.build().unwrap();

    let request = via_request(&network, &[("A", 30), ("B", 120)], &[("C", 30)])
        .add_via_location(via(&network, "A or B", &["A", "B"]));
    let paths = search(&network, request);

    // R2 is faster, R1 cheaper since it needs less walking.
    assert_eq!(paths.len(), 2);
    assert_eq!(route_names(&paths[0]), vec!["R2"]);
    assert_eq!(route_names(&paths[1]), vec!["R1"]);
    assert!(paths[0].c1 > paths[1].c1);
}

//          A        B          C
// R1:    10:02    10:04
// R2:             10:05:44   10:10
// R2:             10:05:45   10:11
// R2:             10:05:46   10:12
#[test]
fn minimum_wait_time_adds_to_the_transfer_slack() {
    let mut builder = NetworkBuilder::new();
    let [a, b, c] = stops(&mut builder, ["A", "B", "C"]);
    add_route(&mut builder, "R1", &[a, b], &["10:02 10:04"]);
    add_route(&mut builder, "R2", &[b, c], &["10:05:44 10:10", "10:05:45 10:11", "10:05:46 10:12"]);
    builder.slack_provider(SlackProvider::uniform(60, 0, 0));
    let network = builder.build().unwrap();

    let wait = via(&network, "B", &["B"]).with_minimum_wait_time(45);
    let request = via_request(&network, &[("A", 30)], &[("C", 30)]).add_via_location(wait);
    let paths = search(&network, request);

    assert_eq!(paths.len(), 1);
    assert_eq!(transit_times(&paths[0]), vec![(t("10:02"), t("10:04")), (t("10:05:45"), t("10:11"))]);
    let c1: i32 = paths[0].legs.iter().map(PathLeg::c1).sum();
    assert_eq!(paths[0].c1, c1);
}

#[test]
fn without_a_way_through_the_via_stop_there_is_no_path() {
    let mut builder = NetworkBuilder::new();
    let [a, b, c] = stops(&mut builder, ["A", "B", "C"]);
    add_route(&mut builder, "R1", &[a, c], &["10:02 10:10"]);
    add_route(&mut builder, "R2", &[c, b], &["10:20 10:30"]);
    let network = builder.build().unwrap();

    let request = via_request(&network, &[("A", 0)], &[("C", 0)]).add_via_location(via(&network, "B", &["B"]));
    assert!(search(&network, request).is_empty());
}
