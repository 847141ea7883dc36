use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rand::Rng;
use rand::SeedableRng;
use rand_isaac::Isaac64Rng;
use rayon::prelude::*;
use rayon::ThreadPool;
use yaml_rust::Yaml;

use super::batches::{plan_from_existing_paths, plan_from_matrix};
use super::config_utils;
use super::congestion;
use super::errors::SimError;
use super::path_builder::{build_page, PathRequest};
use super::paths::{BuiltPaths, PathMatrix};
use super::road_network::{RoadNetwork, WeightField};
use super::simulation::{build_thread_pool, BaseSimulation, Demand, SimPhase, SimResults};
use super::SimConfig;


static DEFAULT_BATCH_SIZE: usize = 1000;
pub(crate) static DEFAULT_MAX_ATTEMPTS: usize = 100_000;
pub(crate) static DEFAULT_SEED: u64 = 100;


#[derive(Clone, Debug, PartialEq)]
pub struct NaiveSimConfig {
    pub worker_count: usize,
    /// the number of paths in each page of work
    pub batch_size: usize,
    pub max_attempts: usize,
    pub seed: u64,
    pub matrix_size: Option<usize>,
}

impl NaiveSimConfig {
    /// Reads the settings present in `yaml_cfg`, falling back to the defaults for the rest.
    pub fn from_yaml(yaml_cfg: &Yaml) -> NaiveSimConfig {
        let default = NaiveSimConfig::default();
        NaiveSimConfig {
            worker_count: config_utils::get_yaml_usize(yaml_cfg, "worker_count").
                unwrap_or(default.worker_count),
            batch_size: config_utils::get_yaml_usize(yaml_cfg, "batch_size").
                unwrap_or(default.batch_size),
            max_attempts: config_utils::get_yaml_usize(yaml_cfg, "max_attempts").
                unwrap_or(default.max_attempts),
            seed: config_utils::get_yaml_usize(yaml_cfg, "seed").map(|ss| ss as u64).
                unwrap_or(default.seed),
            matrix_size: config_utils::get_yaml_usize(yaml_cfg, "matrix_size"),
        }
    }
}

impl Default for NaiveSimConfig {
    fn default() -> NaiveSimConfig {
        NaiveSimConfig {
            worker_count: config_utils::default_worker_count(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            seed: DEFAULT_SEED,
            matrix_size: None,
        }
    }
}

impl SimConfig for NaiveSimConfig {
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


/// Assigns all demand against the free-flow network in one parallel pass, and only loads the
/// network with the resulting paths at the end.
pub struct NaiveSimulation {
    base: BaseSimulation,
    cfg: NaiveSimConfig,
}

impl NaiveSimulation {
    pub fn new(network: RoadNetwork, weight: WeightField, cfg: NaiveSimConfig)
               -> Result<NaiveSimulation, SimError> {
        let base = BaseSimulation::new(network, weight, &cfg)?;
        Ok(NaiveSimulation{base, cfg})
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

        self.base.set_phase(SimPhase::Dispatching);
        let batch_size = self.cfg.batch_size;
        let (paths, pages_processed) = match demand {
            Demand::Trips(trip_mat) => {
                let batches = plan_from_matrix(trip_mat, batch_size);
                self.dispatch(&pool, batches, num_zones)?
            }
            Demand::Replay(old_paths) => {
                let batches = plan_from_existing_paths(old_paths, batch_size);
                self.dispatch(&pool, batches, num_zones)?
            }
        };

        self.base.set_phase(SimPhase::Finalizing);
        let network = std::mem::take(&mut self.base.network);
        let network = congestion::recompute_speed_time(congestion::accumulate(network, &paths)?);

        self.base.set_phase(SimPhase::Done);
        let elapsed = start_time.elapsed();
        log::info!("Built {} paths in {} pages in {:.3}s", paths.total_paths(), pages_processed,
                   elapsed.as_secs_f64());
        Ok(SimResults {
            paths,
            network,
            elapsed,
            pages_processed,
            chunks_processed: 0,
        })
    }

    /// Hands pages to the pool as they're planned, and merges what comes back.
    fn dispatch<I, B>(&mut self, pool: &ThreadPool, batches: I, num_zones: usize)
                      -> Result<(PathMatrix, usize), SimError>
        where I: Iterator<Item = Vec<B>> + Send,
              B: PathRequest,
    {
        let base = &mut self.base;
        let network = &base.network;
        let rng = &mut base.rng;
        let weight = base.weight;
        let max_attempts = self.cfg.get_max_attempts();
        let pages_done = AtomicUsize::new(0);

        let paths = pool.install(|| {
            batches.map(|page| (page, rng.gen::<u64>())).
                par_bridge().
                map(|(page, seed)| {
                    let mut page_rng = Isaac64Rng::seed_from_u64(seed);
                    build_page(network, page, weight, max_attempts, &mut page_rng)
                }).
                try_fold(|| PathMatrix::new(num_zones),
                         |mut acc: PathMatrix, built: Result<Vec<BuiltPaths>, SimError>|
                         -> Result<PathMatrix, SimError> {
                    for built_paths in built? {
                        acc.add_built(built_paths);
                    }
                    let done = pages_done.fetch_add(1, Ordering::Relaxed) + 1;
                    log::info!("processed page {}", done);
                    Ok(acc)
                }).
                try_reduce(|| PathMatrix::new(num_zones),
                           |mut aa: PathMatrix, bb: PathMatrix| -> Result<PathMatrix, SimError> {
                    aa.merge(bb);
                    Ok(aa)
                })
        })?;
        Ok((paths, pages_done.into_inner()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::prelude::*;
    use yaml_rust::YamlLoader;
    use super::super::test_utils::{grid_network, line_network};

    fn test_cfg(worker_count: usize, batch_size: usize) -> NaiveSimConfig {
        NaiveSimConfig {
            worker_count,
            batch_size,
            ..NaiveSimConfig::default()
        }
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml_cfg = YamlLoader::load_from_str("worker_count: 3\nbatch_size: 50\nseed: 7").
            unwrap();
        let cfg = NaiveSimConfig::from_yaml(&yaml_cfg[0]);
        assert_eq!(cfg.worker_count, 3);
        assert_eq!(cfg.batch_size, 50);
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(cfg.matrix_size, None);
    }

    #[test]
    fn test_default_config() {
        let cfg = NaiveSimConfig::default();
        assert_eq!(cfg.batch_size, 1000);
        assert_eq!(cfg.seed, 100);
        assert!(cfg.worker_count >= 1);
    }

    #[test]
    fn test_every_trip_gets_a_path() {
        let network = grid_network(4, 4, 10.);
        let trip_mat = arr2(&[[0, 7, 3, 0], [2, 0, 0, 9], [4, 1, 0, 0], [0, 0, 5, 0]]);
        let sim = NaiveSimulation::new(network, WeightField::FlowTime, test_cfg(3, 4)).unwrap();
        assert_eq!(sim.phase(), SimPhase::Idle);
        let results = sim.run(Demand::Trips(trip_mat.view())).unwrap();

        assert_eq!(results.paths.cell_counts(), trip_mat);
        assert_eq!(results.pages_processed, 8);
        assert_eq!(results.chunks_processed, 0);
        for (ii, jj, cell) in results.paths.iter_cells() {
            for path in cell {
                assert!(results.network.node_in_zone(path.origin().unwrap(), ii));
                assert!(results.network.node_in_zone(path.destination().unwrap(), jj));
            }
        }
    }

    #[test]
    fn test_network_is_loaded_at_the_end() {
        let trip_mat = arr2(&[[0, 0, 30], [0, 0, 0], [0, 0, 0]]);
        let sim = NaiveSimulation::new(line_network(3), WeightField::FlowTime, test_cfg(2, 7)).
            unwrap();
        let results = sim.run(Demand::Trips(trip_mat.view())).unwrap();

        // zones are single nodes, so every path is 0 -> 1 -> 2 at free-flow cost
        assert!(results.paths.cell(0, 2).iter().all(|pp| pp.path == vec![0, 1, 2] &&
                                                       pp.travel_cost == 120.));
        let loaded = results.network.segment(0, 1, 0).unwrap();
        assert_eq!(loaded.passes_count(), 30);
        assert_eq!(loaded.capacity_occupied(), 0.03);
        assert!(loaded.cur_speed_kmh() < 60.);
        assert_eq!(results.network.segment(2, 1, 0).unwrap().passes_count(), 0);
    }

    #[test]
    fn test_same_seed_same_paths() {
        let trip_mat = arr2(&[[3, 8, 2], [5, 0, 6], [1, 9, 4]]);
        let run = |worker_count| {
            let sim = NaiveSimulation::new(grid_network(5, 3, 50.), WeightField::Length,
                                           test_cfg(worker_count, 5)).unwrap();
            sim.run(Demand::Trips(trip_mat.view())).unwrap().paths
        };
        let first = run(1);
        assert!(first.matches(&run(4), 1e-9));
        assert_eq!(first.total_paths(), 38);
    }

    #[test]
    fn test_replay_reproduces_paths() {
        let trip_mat = arr2(&[[0, 6, 2], [4, 0, 3], [5, 1, 0]]);
        let sim = NaiveSimulation::new(grid_network(3, 3, 100.), WeightField::FlowTime,
                                       test_cfg(2, 4)).unwrap();
        let first = sim.run(Demand::Trips(trip_mat.view())).unwrap();

        let sim = NaiveSimulation::new(grid_network(3, 3, 100.), WeightField::FlowTime,
                                       test_cfg(3, 3)).unwrap();
        let replayed = sim.run(Demand::Replay(&first.paths)).unwrap();
        assert!(replayed.paths.matches(&first.paths, 1e-9));
        assert_eq!(replayed.network.segments(), first.network.segments());
    }

    #[test]
    fn test_exhaustion_aborts_run() {
        // zone 1 of a line is a single node, so intra-zone trips can never be built
        let trip_mat = arr2(&[[0, 1], [0, 1]]);
        let cfg = NaiveSimConfig {
            max_attempts: 20,
            ..test_cfg(2, 10)
        };
        let sim = NaiveSimulation::new(line_network(2), WeightField::FlowTime, cfg).unwrap();
        match sim.run(Demand::Trips(trip_mat.view())) {
            Err(SimError::PathsExhausted { origin_zone: 1, destination_zone: 1, .. }) => (),
            other => panic!("unexpected result: {:?}", other.map(|rr| rr.pages_processed)),
        }
    }

    #[test]
    fn test_empty_zone_rejected_before_dispatch() {
        let trip_mat = arr2(&[[0, 0, 0], [0, 0, 0], [0, 0, 0], [1, 0, 0]]);
        let sim = NaiveSimulation::new(line_network(3), WeightField::FlowTime, test_cfg(1, 10)).
            unwrap();
        match sim.run(Demand::Trips(trip_mat.view())) {
            Err(SimError::NonSquareDemand(4, 3)) => (),
            other => panic!("unexpected result: {:?}", other.map(|rr| rr.pages_processed)),
        }

        let trip_mat = arr2(&[[0, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0], [1, 0, 0, 0]]);
        let sim = NaiveSimulation::new(line_network(3), WeightField::FlowTime, test_cfg(1, 10)).
            unwrap();
        match sim.run(Demand::Trips(trip_mat.view())) {
            Err(SimError::EmptyZone(3)) => (),
            other => panic!("unexpected result: {:?}", other.map(|rr| rr.pages_processed)),
        }
    }

    #[test]
    fn test_empty_network_rejected() {
        match NaiveSimulation::new(RoadNetwork::new(), WeightField::FlowTime, test_cfg(1, 10)) {
            Err(SimError::EmptyNetwork) => (),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("empty network accepted"),
        }
    }
}
