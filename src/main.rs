use log::info;

use raptor::constrained::TransferConstraint;
use raptor::pass_through::PassThroughPoint;
use raptor::{raptor_search, utils, AccessEgress, NetworkBuilder, RaptorProfile, RaptorRequest};

// A small demo network: two lines meeting at Central, with a guaranteed connection and a
// slower direct bus.
fn build_demo_network() -> Result<raptor::Network, raptor::RaptorError> {
    let mut builder = NetworkBuilder::new();
    let north = builder.add_stop("North");
    let central = builder.add_stop("Central");
    let harbour = builder.add_stop("Harbour");
    let east = builder.add_stop("East");
    let south = builder.add_stop("South");

    let red = builder.add_route("Red", &[north, central, harbour]);
    let red_0800 = builder.add_trip_schedule(red, "8:00 8:10 8:25")?;
    builder.add_trip_schedule(red, "8:30 8:40 8:55")?;

    let blue = builder.add_route("Blue", &[central, east, south]);
    builder.add_trip_schedule(blue, "8:05 8:15 8:25")?;
    let blue_0811 = builder.add_trip_schedule(blue, "8:11 8:21 8:31")?;
    builder.add_trip_schedule(blue, "8:45 8:55 9:05")?;

    let bus = builder.add_route("Bus 90", &[north, east, south]);
    builder.add_trip_schedule(bus, "8:02 8:30 8:50")?;

    builder.add_transfer(harbour, east, 300);
    builder.add_constrained_transfer(red_0800, central, blue_0811, central, TransferConstraint::Guaranteed);
    builder.build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let network = build_demo_network()?;
    let north = network.get_stop_idx("North").ok_or("North is missing")?;
    let east = network.get_stop_idx("East").ok_or("East is missing")?;
    let south = network.get_stop_idx("South").ok_or("South is missing")?;
    let start_time = utils::parse_time("7:55").ok_or("invalid start time")?;

    let standard = RaptorRequest::builder()
        .earliest_departure_time(start_time)
        .search_window(30 * 60)
        .constrained_transfers(true)
        .add_access(AccessEgress::walk(north, 120))
        .add_egress(AccessEgress::walk(south, 60))
        .build()?;
    let response = raptor_search(&network, &standard)?;
    info!("Standard search ran {} iterations.", response.iterations);
    println!("Standard search from North at {}:", utils::get_time_str(start_time));
    for path in &response.paths {
        println!("  {}", path.display(&network));
    }

    let via_east = RaptorRequest::builder()
        .profile(RaptorProfile::MultiCriteria)
        .earliest_departure_time(start_time)
        .search_window(30 * 60)
        .add_access(AccessEgress::walk(north, 120))
        .add_egress(AccessEgress::walk(south, 60))
        .add_pass_through_point(PassThroughPoint::new("East", &[east]))
        .build()?;
    let response = raptor_search(&network, &via_east)?;
    println!("Multi-criteria search passing through East:");
    for path in &response.paths {
        println!("  {}", path.display(&network));
    }

    Ok(())
}
