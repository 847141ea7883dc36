// this file defines load accumulation and the congestion response of road segments.  The
// network-level operations take the network by value and hand back the updated one.

use super::errors::SimError;
use super::paths::{PathMatrix, TimedPath};
use super::road_network::{RoadNetwork, RoadSegment};

// vehicles never crawl slower than the free-flow speed divided by this
static MIN_SPEED_DIVISOR: f64 = 10.;


/// Speed on a segment carrying `passes_count` vehicles: a gaussian decay in the load/capacity
/// ratio, floored at a crawl.
pub fn congested_speed(maxspeed_kmh: f64, passes_count: u32, capacity_vph: f64) -> f64 {
    let ratio = passes_count as f64 / capacity_vph;
    let speed = maxspeed_kmh * (-0.5 * ratio.powi(2)).exp();
    speed.max(maxspeed_kmh / MIN_SPEED_DIVISOR)
}

/// Time in whole seconds (rounded down) to cover `length_km` at `speed_kmh`.
pub fn travel_time_s(length_km: f64, speed_kmh: f64) -> f64 {
    ((length_km / speed_kmh) * 3600.).floor()
}


pub(crate) fn update_speed_time(segment: &mut RoadSegment) {
    let speed = congested_speed(segment.maxspeed_kmh, segment.passes_count,
                                segment.capacity_vph);
    segment.cur_speed_kmh = speed;
    segment.flow_time_s = travel_time_s(segment.length_km, speed);
}

pub(crate) fn reset_segment(segment: &mut RoadSegment) {
    segment.passes_count = 0;
    segment.capacity_occupied = 0.;
    update_speed_time(segment);
}


/// Adds one pass to every segment traversed by `paths`, then recomputes the occupancy ratio of
/// every segment.  When several parallel segments join two consecutive nodes, the first one
/// (key 0) is credited.
pub fn accumulate_paths<'p, I>(mut network: RoadNetwork, paths: I) -> Result<RoadNetwork, SimError>
    where I: IntoIterator<Item = &'p TimedPath>
{
    for timed_path in paths {
        for pair in timed_path.path.windows(2) {
            let segment = network.first_segment_mut(pair[0], pair[1])?;
            segment.passes_count += 1;
        }
    }
    for segment in network.segments_mut() {
        segment.capacity_occupied = segment.passes_count as f64 / segment.capacity_vph;
    }
    Ok(network)
}

/// Accumulates the load of every path in `paths` onto the network.
pub fn accumulate(network: RoadNetwork, paths: &PathMatrix) -> Result<RoadNetwork, SimError> {
    accumulate_paths(network, paths.iter_paths())
}

/// Recomputes the current speed and flow time of every segment from its load.
pub fn recompute_speed_time(mut network: RoadNetwork) -> RoadNetwork {
    for segment in network.segments_mut() {
        update_speed_time(segment);
    }
    network
}
