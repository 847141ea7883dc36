use std::time::Instant;

use itertools::Itertools;
use rand::SeedableRng;
use rand_isaac::Isaac64Rng;
use rayon::prelude::*;
use rayon::ThreadPool;
use yaml_rust::Yaml;

use super::batches::{plan_from_existing_paths, plan_from_matrix};
use super::config_utils;
use super::congestion;
use super::errors::SimError;
use super::naive_sim::{DEFAULT_MAX_ATTEMPTS, DEFAULT_SEED};
use super::path_builder::{build_page, PathRequest};
use super::paths::{BuiltPaths, PathMatrix};
use super::road_network::{RoadNetwork, WeightField};
use super::simulation::{build_thread_pool, BaseSimulation, Demand, SimPhase, SimResults};
use super::SimConfig;


static DEFAULT_RECALC_COUNT: usize = 20;


#[derive(Clone, Debug, PartialEq)]
pub struct SmarterSimConfig {
    pub worker_count: usize,
    /// roughly how many times congestion is recalculated over the run
    pub recalc_count: usize,
    pub max_attempts: usize,
    pub seed: u64,
    pub matrix_size: Option<usize>,
}

impl SmarterSimConfig {
    pub fn from_yaml(yaml_cfg: &Yaml) -> SmarterSimConfig {
        let default = SmarterSimConfig::default();
        SmarterSimConfig {
            worker_count: config_utils::get_yaml_usize(yaml_cfg, "worker_count").
                unwrap_or(default.worker_count),
            recalc_count: config_utils::get_yaml_usize(yaml_cfg, "recalc_count").
                unwrap_or(default.recalc_count),
            max_attempts: config_utils::get_yaml_usize(yaml_cfg, "max_attempts").
                unwrap_or(default.max_attempts),
            seed: config_utils::get_yaml_usize(yaml_cfg, "seed").map(|ss| ss as u64).
                unwrap_or(default.seed),
            matrix_size: config_utils::get_yaml_usize(yaml_cfg, "matrix_size"),
        }
    }
}

impl Default for SmarterSimConfig {
    fn default() -> SmarterSimConfig {
        SmarterSimConfig {
            worker_count: config_utils::default_worker_count(),
            recalc_count: DEFAULT_RECALC_COUNT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            seed: DEFAULT_SEED,
            matrix_size: None,
        }
    }
}

impl SimConfig for SmarterSimConfig {
    fn get_worker_count(&self) -> usize {
        self.worker_count
    }

    fn get_max_attempts(&self) -> usize {
        self.max_attempts
    }

    fn get_seed(&self) -> u64 {
        self.seed
    }

    fn get_matrix_size(&self) -> Option<usize> {
        self.matrix_size
    }
}


/// Page size that gives each worker one page per chunk, with about `recalc_count` chunks in all.
pub fn calc_batch_size(total_paths: usize, recalc_count: usize, worker_count: usize) -> usize {
    let per_recalc = total_paths / recalc_count.max(1);
    (per_recalc / worker_count.max(1)).max(1)
}


/// Assigns demand in chunks of one page per worker.  After each chunk the network is loaded with
/// the chunk's paths and its congestion recomputed, so later chunks route around the load of
/// earlier ones.
pub struct SmarterSimulation {
    base: BaseSimulation,
    cfg: SmarterSimConfig,
}

impl SmarterSimulation {
    pub fn new(network: RoadNetwork, weight: WeightField, cfg: SmarterSimConfig)
               -> Result<SmarterSimulation, SimError> {
        let base = BaseSimulation::new(network, weight, &cfg)?;
        Ok(SmarterSimulation{base, cfg})
    }

    pub fn phase(&self) -> SimPhase {
        self.base.phase()
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.base.network
    }

    pub fn run(mut self, demand: Demand) -> Result<SimResults, SimError> {
        let start_time = Instant::now();
        let demand = self.base.prepare(demand, &self.cfg)?;
        let num_zones = demand.num_zones();
        let pool = build_thread_pool(&self.cfg)?;

        let batch_size = calc_batch_size(demand.total_paths(), self.cfg.recalc_count,
                                         self.cfg.get_worker_count());
        log::info!("Using pages of {} paths", batch_size);
        let (paths, pages_processed, chunks_processed) = match demand {
            Demand::Trips(trip_mat) => {
                let batches = plan_from_matrix(trip_mat, batch_size);
                self.dispatch_chunks(&pool, batches, num_zones)?
            }
            Demand::Replay(old_paths) => {
                let batches = plan_from_existing_paths(old_paths, batch_size);
                self.dispatch_chunks(&pool, batches, num_zones)?
            }
        };

        // the network already carries every chunk's load
        self.base.set_phase(SimPhase::Finalizing);
        let network = std::mem::take(&mut self.base.network);

        self.base.set_phase(SimPhase::Done);
        let elapsed = start_time.elapsed();
        log::info!("Built {} paths in {} pages and {} chunks in {:.3}s", paths.total_paths(),
                   pages_processed, chunks_processed, elapsed.as_secs_f64());
        Ok(SimResults {
            paths,
            network,
            elapsed,
            pages_processed,
            chunks_processed,
        })
    }

    fn dispatch_chunks<I, B>(&mut self, pool: &ThreadPool, batches: I, num_zones: usize)
                             -> Result<(PathMatrix, usize, usize), SimError>
        where I: Iterator<Item = Vec<B>>,
              B: PathRequest,
    {
        let mut all_paths = PathMatrix::new(num_zones);
        let mut pages_processed = 0;
        let mut chunks_processed = 0;

        let chunks = batches.chunks(self.cfg.get_worker_count().max(1));
        for chunk in &chunks {
            self.base.set_phase(SimPhase::Dispatching);
            let seeded: Vec<(Vec<B>, u64)> = chunk.map(|page| (page, self.base.next_page_seed())).
                collect();
            pages_processed += seeded.len();

            let network = &self.base.network;
            let weight = self.base.weight;
            let max_attempts = self.cfg.get_max_attempts();
            let built: Vec<Vec<BuiltPaths>> = pool.install(|| {
                seeded.into_par_iter().
                    map(|(page, seed)| {
                        let mut page_rng = Isaac64Rng::seed_from_u64(seed);
                        build_page(network, page, weight, max_attempts, &mut page_rng)
                    }).
                    collect::<Result<Vec<_>, SimError>>()
            })?;

            // every worker is done with this chunk, so the network can be updated
            let mut chunk_paths = PathMatrix::new(num_zones);
            for built_paths in built.into_iter().flatten() {
                chunk_paths.add_built(built_paths);
            }
            self.base.set_phase(SimPhase::Recalculating);
            let network = std::mem::take(&mut self.base.network);
            let network = congestion::accumulate(network, &chunk_paths)?;
            self.base.network = congestion::recompute_speed_time(network);

            all_paths.merge(chunk_paths);
            chunks_processed += 1;
            log::info!("processed chunk {} ({} pages, {} paths so far)", chunks_processed,
                       pages_processed, all_paths.total_paths());
        }
        Ok((all_paths, pages_processed, chunks_processed))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::prelude::*;
    use yaml_rust::YamlLoader;
    use super::super::geometry::GeoPoint;
    use super::super::naive_sim::{NaiveSimConfig, NaiveSimulation};
    use super::super::road_network::RoadSegment;
    use super::super::test_utils::grid_network;

    fn test_cfg(worker_count: usize, recalc_count: usize) -> SmarterSimConfig {
        SmarterSimConfig {
            worker_count,
            recalc_count,
            ..SmarterSimConfig::default()
        }
    }

    /// Two routes from node 0 (zone 0) to node 3 (zone 1): a fast one through node 1 that
    /// saturates quickly, and a slower one through node 2 with plenty of capacity.
    fn two_route_network() -> RoadNetwork {
        let mut network = RoadNetwork::new();
        let pos = GeoPoint::new(45.5, -73.6);
        network.add_node(0, pos, vec![0]).unwrap();
        network.add_node(1, pos, vec![]).unwrap();
        network.add_node(2, pos, vec![]).unwrap();
        network.add_node(3, pos, vec![1]).unwrap();
        network.add_segment(0, 1, RoadSegment::new(1., 60., 5., 1)).unwrap();
        network.add_segment(1, 3, RoadSegment::new(1., 60., 5., 1)).unwrap();
        network.add_segment(0, 2, RoadSegment::new(1., 40., 1000., 2)).unwrap();
        network.add_segment(2, 3, RoadSegment::new(1., 40., 1000., 2)).unwrap();
        network
    }

    fn count_via(paths: &PathMatrix, node: u64) -> usize {
        paths.iter_paths().filter(|pp| pp.path.contains(&node)).count()
    }

    #[test]
    fn test_calc_batch_size() {
        assert_eq!(calc_batch_size(1000, 20, 4), 12);
        assert_eq!(calc_batch_size(40, 4, 1), 10);
        assert_eq!(calc_batch_size(10, 20, 4), 1);
        assert_eq!(calc_batch_size(0, 20, 4), 1);
        assert_eq!(calc_batch_size(100, 0, 0), 100);
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml_cfg = YamlLoader::load_from_str("recalc_count: 5\nmatrix_size: 3").unwrap();
        let cfg = SmarterSimConfig::from_yaml(&yaml_cfg[0]);
        assert_eq!(cfg.recalc_count, 5);
        assert_eq!(cfg.matrix_size, Some(3));
        assert_eq!(cfg.seed, 100);

        assert_eq!(SmarterSimConfig::default().recalc_count, 20);
    }

    #[test]
    fn test_later_chunks_avoid_congestion() {
        let trip_mat = arr2(&[[0, 40], [0, 0]]);
        let sim = SmarterSimulation::new(two_route_network(), WeightField::FlowTime,
                                         test_cfg(1, 4)).unwrap();
        let results = sim.run(Demand::Trips(trip_mat.view())).unwrap();
        assert_eq!(results.paths.cell_counts(), trip_mat);
        assert_eq!(results.pages_processed, 4);
        assert_eq!(results.chunks_processed, 4);
        // the first chunk saturates the fast route, and the rest go around it
        assert_eq!(count_via(&results.paths, 1), 10);
        assert_eq!(count_via(&results.paths, 2), 30);
        assert_eq!(results.network.segment(0, 1, 0).unwrap().passes_count(), 10);
        assert_eq!(results.network.segment(2, 3, 0).unwrap().passes_count(), 30);

        // without recalculation, everyone takes the fast route
        let sim = NaiveSimulation::new(two_route_network(), WeightField::FlowTime,
                                       NaiveSimConfig::default()).unwrap();
        let results = sim.run(Demand::Trips(trip_mat.view())).unwrap();
        assert_eq!(count_via(&results.paths, 1), 40);
        assert_eq!(results.network.segment(1, 3, 0).unwrap().passes_count(), 40);
    }

    #[test]
    fn test_chunks_hold_a_page_per_worker() {
        let network = grid_network(4, 4, 20.);
        let trip_mat = arr2(&[[0, 9, 9, 9], [9, 0, 9, 9], [9, 9, 0, 9], [9, 9, 9, 0]]);
        let sim = SmarterSimulation::new(network, WeightField::FlowTime, test_cfg(3, 4)).
            unwrap();
        let results = sim.run(Demand::Trips(trip_mat.view())).unwrap();

        // 108 paths in pages of 108 / 4 / 3 = 9, three pages to a chunk
        assert_eq!(results.pages_processed, 12);
        assert_eq!(results.chunks_processed, 4);
        assert_eq!(results.paths.cell_counts(), trip_mat);
        let total_passes: u32 = results.network.segments().iter().
            map(|(_, _, _, seg)| seg.passes_count()).sum();
        let total_hops: usize = results.paths.iter_paths().map(|pp| pp.path.len() - 1).sum();
        assert_eq!(total_passes as usize, total_hops);
    }

    #[test]
    fn test_same_seed_same_run() {
        let trip_mat = arr2(&[[2, 8, 5], [5, 1, 6], [3, 9, 0]]);
        let run = || {
            let sim = SmarterSimulation::new(grid_network(4, 3, 5.), WeightField::FlowTime,
                                             test_cfg(2, 3)).unwrap();
            sim.run(Demand::Trips(trip_mat.view())).unwrap()
        };
        let first = run();
        let second = run();
        assert!(first.paths.matches(&second.paths, 1e-9));
        assert_eq!(first.network.segments(), second.network.segments());
    }

    #[test]
    fn test_replay_runs_in_chunks() {
        let trip_mat = arr2(&[[0, 6, 2], [4, 0, 3], [5, 1, 0]]);
        let sim = SmarterSimulation::new(grid_network(3, 3, 100.), WeightField::Length,
                                         test_cfg(2, 2)).unwrap();
        let first = sim.run(Demand::Trips(trip_mat.view())).unwrap();

        let sim = SmarterSimulation::new(grid_network(3, 3, 100.), WeightField::Length,
                                         test_cfg(2, 2)).unwrap();
        let replayed = sim.run(Demand::Replay(&first.paths)).unwrap();
        // lengths don't change with load, so the same endpoints give the same routes
        assert!(replayed.paths.matches(&first.paths, 1e-9));
        assert_eq!(replayed.chunks_processed, first.chunks_processed);
    }
}
