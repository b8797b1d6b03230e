use chrono::NaiveTime;
use raptor::network::{Duration, RouteIndex, StopIndex, StopTime, Timestamp};
use raptor::{utils, AccessEgress, Network, NetworkBuilder, RaptorProfile, RaptorRequest};

// Common example data for the demos, tests and benchmarks.

pub const EXAMPLE_GRID_SIZE: usize = 12;
pub const EXAMPLE_SEED: u64 = 7;

pub fn get_example_transfer_time() -> Duration {
    3 * 60 // 3 minutes transfer time.
}

pub fn get_example_start_time() -> Timestamp {
    utils::time_of(NaiveTime::from_hms_opt(8, 30, 0).unwrap())
}

fn stop_at(size: usize, row: usize, col: usize) -> StopIndex {
    (row * size + col) as StopIndex
}

fn add_line(builder: &mut NetworkBuilder, rng: &mut fastrand::Rng, name: &str, stops: &[StopIndex]) -> RouteIndex {
    let route = builder.add_route(name, stops);
    // Every trip of a line runs the same segment times, so trips never overtake.
    let segments: Vec<Duration> = (1..stops.len()).map(|_| rng.i32(90..=240)).collect();
    let dwell = if rng.bool() { 30 } else { 0 };
    let headway = rng.i32(6..=15) * 60;
    let first = 6 * 3600 + rng.i32(0..headway);
    let mut departure = first;
    while departure < 11 * 3600 {
        let mut times = Vec::with_capacity(stops.len());
        let mut time = departure;
        for (i, _) in stops.iter().enumerate() {
            if i > 0 {
                time += segments[i - 1];
            }
            let arrival = time;
            if i > 0 && i + 1 < stops.len() {
                time += dwell;
            }
            times.push(StopTime { arrival_time: arrival, departure_time: time });
        }
        builder.add_trip(route, times);
        departure += headway;
    }
    route
}

/// A `size` x `size` grid of stops with a line along every row and column in both directions
/// and walking transfers to the diagonal neighbours. The same seed gives the same network.
pub fn build_grid_network(size: usize, seed: u64) -> Network {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut builder = NetworkBuilder::new();
    for row in 0..size {
        for col in 0..size {
            builder.add_stop(&format!("S{row}-{col}"));
        }
    }
    for i in 0..size {
        let row: Vec<StopIndex> = (0..size).map(|col| stop_at(size, i, col)).collect();
        let col: Vec<StopIndex> = (0..size).map(|row| stop_at(size, row, i)).collect();
        for (name, mut stops) in [(format!("H{i}"), row), (format!("V{i}"), col)] {
            add_line(&mut builder, &mut rng, &format!("{name} out"), &stops);
            stops.reverse();
            add_line(&mut builder, &mut rng, &format!("{name} back"), &stops);
        }
    }
    let transfer_time = get_example_transfer_time();
    for row in 0..size.saturating_sub(1) {
        for col in 0..size.saturating_sub(1) {
            let (a, b) = (stop_at(size, row, col), stop_at(size, row + 1, col + 1));
            let walk = transfer_time + rng.i32(0..=120);
            builder.add_transfer(a, b, walk);
            builder.add_transfer(b, a, walk);
        }
    }
    builder.build().unwrap()
}

pub fn build_example_network() -> Network {
    build_grid_network(EXAMPLE_GRID_SIZE, EXAMPLE_SEED)
}

pub fn get_example_start_stop_idx(network: &Network) -> StopIndex {
    network.get_stop_idx("S0-0").unwrap_or(0)
}

pub fn get_example_end_stop_idx(network: &Network) -> StopIndex {
    let last = EXAMPLE_GRID_SIZE - 1;
    network.get_stop_idx(&format!("S{last}-{last}")).unwrap_or(0)
}

pub fn get_example_scenario() -> (Network, StopIndex, Timestamp, StopIndex) {
    let network = build_example_network();
    let start = get_example_start_stop_idx(&network);
    let start_time = get_example_start_time();
    let end = get_example_end_stop_idx(&network);
    (network, start, start_time, end)
}

/// A request from `start` to `end` with short walks at both ends.
pub fn build_example_request(
    profile: RaptorProfile,
    start: StopIndex,
    start_time: Timestamp,
    end: StopIndex,
) -> RaptorRequest {
    RaptorRequest::builder()
        .profile(profile)
        .earliest_departure_time(start_time)
        .search_window(30 * 60)
        .add_access(AccessEgress::walk(start, 120))
        .add_egress(AccessEgress::walk(end, 120))
        .build()
        .unwrap()
}

/// `count` requests between random stops of `network`, departing between 7:00 and 9:00.
pub fn random_requests(network: &Network, profile: RaptorProfile, count: usize, seed: u64) -> Vec<RaptorRequest> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let num_stops = network.num_stops() as StopIndex;
    (0..count)
        .map(|_| {
            let start = rng.u32(0..num_stops);
            let end = rng.u32(0..num_stops);
            let start_time = rng.i32(7 * 3600..9 * 3600);
            build_example_request(profile, start, start_time, end)
        })
        .collect()
}
