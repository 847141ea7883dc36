// this file defines the pieces shared by every assignment strategy: the demand a run is fed, what
// a run reports, and the setup done before any worker starts.
use std::fmt;
use std::time::Duration;

use ndarray::prelude::*;
use rand::Rng;
use rand::SeedableRng;
use rand_isaac::Isaac64Rng;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;

use super::errors::SimError;
use super::paths::PathMatrix;
use super::road_network::{RoadNetwork, WeightField};
use super::SimConfig;


/// What a run has to assign: either a trip count per zone pair, or the paths of an earlier run
/// whose endpoints are to be replayed.
#[derive(Clone, Copy, Debug)]
pub enum Demand<'a> {
    Trips(ArrayView2<'a, u64>),
    Replay(&'a PathMatrix),
}

impl<'a> Demand<'a> {
    pub fn num_zones(&self) -> usize {
        match self {
            Demand::Trips(trip_mat) => trip_mat.nrows(),
            Demand::Replay(paths) => paths.num_zones(),
        }
    }

    pub fn total_paths(&self) -> usize {
        match self {
            Demand::Trips(trip_mat) => trip_mat.iter().map(|vv| *vv as usize).sum(),
            Demand::Replay(paths) => paths.total_paths(),
        }
    }

    /// Restricts the demand to its top-left `matrix_size` zones.  Only trip matrices are
    /// truncated; replayed paths always cover every zone they were recorded for.
    pub fn truncated(self, matrix_size: Option<usize>) -> Result<Demand<'a>, SimError> {
        let trip_mat = match self {
            Demand::Trips(trip_mat) => trip_mat,
            Demand::Replay(_) => {
                if matrix_size.is_some() {
                    log::warn!("matrix_size is ignored when replaying existing paths");
                }
                return Ok(self);
            }
        };

        let (num_rows, num_cols) = trip_mat.dim();
        if num_rows != num_cols {
            return Err(SimError::NonSquareDemand(num_rows, num_cols));
        }
        match matrix_size {
            Some(size) if size > num_rows => Err(SimError::MatrixTooSmall {
                requested: size,
                available: num_rows,
            }),
            Some(size) if size < num_rows => {
                log::warn!("Truncating the {}-zone trip matrix to its first {} zones", num_rows,
                           size);
                Ok(Demand::Trips(trip_mat.slice_move(s![..size, ..size])))
            }
            _ => Ok(self),
        }
    }

    /// Checks that every zone that some demand starts or ends in has nodes to draw from.
    pub fn check_zones(&self, network: &RoadNetwork) -> Result<(), SimError> {
        let num_zones = self.num_zones();
        for ii in 0..num_zones {
            for jj in 0..num_zones {
                let has_demand = match self {
                    Demand::Trips(trip_mat) => trip_mat[[ii, jj]] > 0,
                    Demand::Replay(paths) => !paths.cell(ii, jj).is_empty(),
                };
                if !has_demand {
                    continue;
                }
                for zone in [ii, jj] {
                    if network.zone_members(zone).is_empty() {
                        return Err(SimError::EmptyZone(zone));
                    }
                }
            }
        }
        Ok(())
    }
}


/// The stage a simulation is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimPhase {
    Idle,
    Planning,
    Dispatching,
    Recalculating,
    Finalizing,
    Done,
}

impl fmt::Display for SimPhase {
    fn fmt(&self, ff: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SimPhase::Idle => "idle",
            SimPhase::Planning => "planning",
            SimPhase::Dispatching => "dispatching",
            SimPhase::Recalculating => "recalculating",
            SimPhase::Finalizing => "finalizing",
            SimPhase::Done => "done",
        };
        write!(ff, "{}", name)
    }
}


/// Everything a finished run hands back.
#[derive(Debug)]
pub struct SimResults {
    /// Every path built, by (origin zone, destination zone).
    pub paths: PathMatrix,
    /// The network carrying the load of all the paths, with speeds and flow times updated.
    pub network: RoadNetwork,
    pub elapsed: Duration,
    pub pages_processed: usize,
    /// Congestion recalculations done mid-run.  Always 0 for the naive strategy.
    pub chunks_processed: usize,
}


pub(crate) struct BaseSimulation {
    pub(crate) network: RoadNetwork,
    pub(crate) weight: WeightField,
    pub(crate) rng: Isaac64Rng,
    phase: SimPhase,
}

impl BaseSimulation {
    /// Checks the network can be searched by `weight`, and clears any load it carries.
    pub(crate) fn new<C>(network: RoadNetwork, weight: WeightField, cfg: &C)
                         -> Result<BaseSimulation, SimError>
        where C: SimConfig
    {
        network.validate(weight)?;
        let mut network = network;
        network.reset_passes();
        log::info!("Road network has {} nodes and {} edges; routing by {}", network.node_count(),
                   network.edge_count(), weight);
        Ok(BaseSimulation {
            network,
            weight,
            rng: Isaac64Rng::seed_from_u64(cfg.get_seed()),
            phase: SimPhase::Idle,
        })
    }

    pub(crate) fn phase(&self) -> SimPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: SimPhase) {
        if phase != self.phase {
            log::debug!("{} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }

    /// Draws the seed for the next page's worker rng.  Seeds are drawn in page order on the
    /// calling thread, so a run's results don't depend on how pages are scheduled.
    pub(crate) fn next_page_seed(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Truncates and checks `demand` before planning starts.
    pub(crate) fn prepare<'d, C>(&mut self, demand: Demand<'d>, cfg: &C)
                                 -> Result<Demand<'d>, SimError>
        where C: SimConfig
    {
        self.set_phase(SimPhase::Planning);
        let demand = demand.truncated(cfg.get_matrix_size())?;
        demand.check_zones(&self.network)?;
        log::info!("Assigning {} trips over {} zones", demand.total_paths(), demand.num_zones());
        Ok(demand)
    }
}


/// Builds the pool a run's workers are drawn from, with at least one thread.
pub(crate) fn build_thread_pool<C>(cfg: &C) -> Result<ThreadPool, SimError>
    where C: SimConfig
{
    let pool = ThreadPoolBuilder::new().num_threads(cfg.get_worker_count().max(1)).build()?;
    Ok(pool)
}
