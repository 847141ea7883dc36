// imports of other modules from this crate
mod errors;
pub use errors::SimError;

mod geometry;
pub use geometry::{geodesic_distances, GeoPoint};

mod my_dijkstra;

mod paths;
pub use paths::{BuiltPaths, PathMatrix, TimedPath};

mod road_network;
pub use road_network::{RoadGraph, RoadNetwork, RoadNode, RoadSegment, SearchOutcome,
                       WeightField};

pub mod congestion;

mod node_pairs;
pub use node_pairs::{FixedNodePairs, NodePairSelector, RandomNodePairs};

mod batches;
pub use batches::{plan_from_existing_paths, plan_from_matrix, BatchCursor, BatchFixedPaths,
                  BatchPaths, ExistingPathBatches, MatrixBatches};

mod path_builder;
pub use path_builder::{build_page, build_paths, PathRequest};

mod config_utils;

mod simulation;
pub use simulation::{Demand, SimPhase, SimResults};

mod naive_sim;
pub use naive_sim::{NaiveSimConfig, NaiveSimulation};

mod smarter_sim;
pub use smarter_sim::{calc_batch_size, SmarterSimConfig, SmarterSimulation};

pub mod gravity_model;

pub mod io;

mod scenario;
pub use scenario::{DemandSource, Scenario, Strategy};

#[cfg(test)]
mod test_utils;


/// Defines common elements for all simulator config.
pub trait SimConfig {
    fn get_worker_count(&self) -> usize;
    /// the most node pairs drawn for one unit of work before giving up on it
    fn get_max_attempts(&self) -> usize;
    fn get_seed(&self) -> u64;
    /// if set, only the top-left square of this many zones of a trip matrix is assigned
    fn get_matrix_size(&self) -> Option<usize>;
}
