use rand::Rng;
use rand::seq::SliceRandom;

use super::errors::SimError;
use super::road_network::RoadNetwork;


/// Supplies the origin and destination node of a trip between two zones.
pub trait NodePairSelector {
    fn get_nodes_pair(&mut self, origin_zone: usize, destination_zone: usize)
                      -> Result<(u64, u64), SimError>;
}


/// Draws origin and destination independently and uniformly from the nodes of each zone, with
/// replacement.
pub struct RandomNodePairs<'a, R> {
    network: &'a RoadNetwork,
    rng: R,
}

impl<'a, R: Rng> RandomNodePairs<'a, R> {
    pub fn new(network: &'a RoadNetwork, rng: R) -> RandomNodePairs<'a, R> {
        RandomNodePairs{network, rng}
    }

    fn random_node(&mut self, zone: usize) -> Result<u64, SimError> {
        let network = self.network;
        let idx = network.zone_members(zone).choose(&mut self.rng).
            ok_or(SimError::EmptyZone(zone))?;
        Ok(network.graph()[*idx].id)
    }
}

impl<'a, R: Rng> NodePairSelector for RandomNodePairs<'a, R> {
    fn get_nodes_pair(&mut self, origin_zone: usize, destination_zone: usize)
                      -> Result<(u64, u64), SimError> {
        let origin = self.random_node(origin_zone)?;
        let destination = self.random_node(destination_zone)?;
        Ok((origin, destination))
    }
}


/// Replays recorded (origin, destination) pairs, in order, one per call.  The pairs were recorded
/// for one zone pair; asking for any other zone pair, or replaying a pair whose nodes no longer
/// belong to those zones, is an error.
pub struct FixedNodePairs<'a> {
    network: &'a RoadNetwork,
    recorded_zones: (usize, usize),
    pairs: std::vec::IntoIter<(u64, u64)>,
}

impl<'a> FixedNodePairs<'a> {
    pub fn new(network: &'a RoadNetwork, recorded_zones: (usize, usize), pairs: Vec<(u64, u64)>)
               -> FixedNodePairs<'a> {
        FixedNodePairs {
            network,
            recorded_zones,
            pairs: pairs.into_iter(),
        }
    }
}

impl<'a> NodePairSelector for FixedNodePairs<'a> {
    fn get_nodes_pair(&mut self, origin_zone: usize, destination_zone: usize)
                      -> Result<(u64, u64), SimError> {
        let (recorded_origin, recorded_destination) = self.recorded_zones;
        let (origin, destination) = self.pairs.next().
            ok_or(SimError::ReplayExhausted(recorded_origin, recorded_destination))?;

        let zones_match = (origin_zone, destination_zone) == self.recorded_zones &&
            self.network.node_in_zone(origin, origin_zone) &&
            self.network.node_in_zone(destination, destination_zone);
        if !zones_match {
            return Err(SimError::ReplayMismatch {
                origin,
                destination,
                recorded_origin,
                recorded_destination,
                origin_zone,
                destination_zone,
            });
        }
        Ok((origin, destination))
    }
}
