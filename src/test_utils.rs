use super::geometry::GeoPoint;
use super::road_network::{RoadNetwork, RoadSegment};


/// A road of `num_nodes` nodes with ids 0, 1, ... in a line, each node in the zone with the same
/// number as its id.  Every link is 1 km long, two-way, 60 km/h, capacity 1000.
pub fn line_network(num_nodes: u64) -> RoadNetwork {
    let mut network = RoadNetwork::new();
    for ii in 0..num_nodes {
        network.add_node(ii, GeoPoint::new(0., ii as f64 * 0.01), vec![ii as usize]).unwrap();
    }
    for ii in 1..num_nodes {
        network.add_segment(ii - 1, ii, RoadSegment::new(1., 60., 1000., 1)).unwrap();
        network.add_segment(ii, ii - 1, RoadSegment::new(1., 60., 1000., 1)).unwrap();
    }
    network
}


/// A `width` x `height` grid of two-way streets.  Node (x, y) has id `y * width + x` and belongs
/// to zone `y`, so each row of the grid is a zone.  Links are 1 km long at 60 km/h with the
/// given capacity.
pub fn grid_network(width: u64, height: u64, capacity: f64) -> RoadNetwork {
    let mut network = RoadNetwork::new();
    for yy in 0..height {
        for xx in 0..width {
            let pos = GeoPoint::new(yy as f64 * 0.01, xx as f64 * 0.01);
            network.add_node(yy * width + xx, pos, vec![yy as usize]).unwrap();
        }
    }
    let mut connect = |aa: u64, bb: u64| {
        network.add_segment(aa, bb, RoadSegment::new(1., 60., capacity, 1)).unwrap();
        network.add_segment(bb, aa, RoadSegment::new(1., 60., capacity, 1)).unwrap();
    };
    for yy in 0..height {
        for xx in 0..width {
            let id = yy * width + xx;
            if xx + 1 < width {
                connect(id, id + 1);
            }
            if yy + 1 < height {
                connect(id, id + width);
            }
        }
    }
    network
}
