use rand::Rng;

use super::batches::{BatchFixedPaths, BatchPaths};
use super::errors::SimError;
use super::node_pairs::{FixedNodePairs, NodePairSelector, RandomNodePairs};
use super::paths::{BuiltPaths, TimedPath};
use super::road_network::{RoadNetwork, SearchOutcome, WeightField};


/// Draws node pairs from `selector` and searches for the shortest path between them until
/// `count` paths from `origin_zone` to `destination_zone` have been found.  Draws where both ends
/// are the same node, or where there is no route, are discarded.  Fails once `max_attempts` draws
/// haven't been enough.
pub fn build_paths<S>(network: &RoadNetwork, origin_zone: usize, destination_zone: usize,
                      count: usize, weight: WeightField, selector: &mut S, max_attempts: usize)
                      -> Result<Vec<TimedPath>, SimError>
    where S: NodePairSelector + ?Sized
{
    let mut paths = Vec::with_capacity(count);
    let mut attempts = 0;
    while paths.len() < count {
        if attempts >= max_attempts {
            return Err(SimError::PathsExhausted {
                origin_zone,
                destination_zone,
                requested: count,
                found: paths.len(),
                attempts,
            });
        }
        attempts += 1;

        let (origin, destination) = selector.get_nodes_pair(origin_zone, destination_zone)?;
        match network.shortest_path(origin, destination, weight)? {
            SearchOutcome::Found(path) => paths.push(path),
            SearchOutcome::SameNode | SearchOutcome::Unreachable => (),
        }
    }
    log::debug!("built {} paths from zone {} to zone {} in {} attempts", count, origin_zone,
                destination_zone, attempts);
    Ok(paths)
}


/// A unit of work that a worker can turn into paths on its own.
pub trait PathRequest: Send {
    fn build<R: Rng>(self, network: &RoadNetwork, weight: WeightField, max_attempts: usize,
                     rng: &mut R) -> Result<BuiltPaths, SimError>;
}

impl PathRequest for BatchPaths {
    fn build<R: Rng>(self, network: &RoadNetwork, weight: WeightField, max_attempts: usize,
                     rng: &mut R) -> Result<BuiltPaths, SimError> {
        let mut selector = RandomNodePairs::new(network, rng);
        let paths = build_paths(network, self.origin_zone, self.destination_zone, self.count,
                                weight, &mut selector, max_attempts)?;
        Ok(BuiltPaths {
            origin_zone: self.origin_zone,
            destination_zone: self.destination_zone,
            paths,
        })
    }
}

impl PathRequest for BatchFixedPaths {
    // the recorded endpoints already decide everything, so the rng is unused
    fn build<R: Rng>(self, network: &RoadNetwork, weight: WeightField, max_attempts: usize,
                     _rng: &mut R) -> Result<BuiltPaths, SimError> {
        let BatchFixedPaths { batch, starts_ends } = self;
        let zones = (batch.origin_zone, batch.destination_zone);
        let mut selector = FixedNodePairs::new(network, zones, starts_ends);
        let paths = build_paths(network, batch.origin_zone, batch.destination_zone, batch.count,
                                weight, &mut selector, max_attempts)?;
        Ok(BuiltPaths {
            origin_zone: batch.origin_zone,
            destination_zone: batch.destination_zone,
            paths,
        })
    }
}


/// Builds every unit of a page, in order.
pub fn build_page<B, R>(network: &RoadNetwork, page: Vec<B>, weight: WeightField,
                        max_attempts: usize, rng: &mut R) -> Result<Vec<BuiltPaths>, SimError>
    where B: PathRequest,
          R: Rng,
{
    page.into_iter().map(|request| request.build(network, weight, max_attempts, &mut *rng)).
        collect()
}
