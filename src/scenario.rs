use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::prelude::*;
use yaml_rust::{Yaml, YamlLoader};

use super::config_utils::str_to_absolute_path;
use super::errors::SimError;
use super::gravity_model;
use super::io;
use super::naive_sim::{NaiveSimConfig, NaiveSimulation};
use super::paths::PathMatrix;
use super::road_network::{RoadNetwork, WeightField};
use super::simulation::{Demand, SimResults};
use super::smarter_sim::{SmarterSimConfig, SmarterSimulation};


static PATHS_FILENAME: &str = "paths.csv";
static EDGES_FILENAME: &str = "edges.csv";


#[derive(Clone, Debug, PartialEq)]
pub enum Strategy {
    Naive(NaiveSimConfig),
    Smarter(SmarterSimConfig),
}

impl fmt::Display for Strategy {
    fn fmt(&self, ff: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Strategy::Naive(_) => write!(ff, "naive"),
            Strategy::Smarter(_) => write!(ff, "smarter"),
        }
    }
}


/// Where a scenario's demand came from.
#[derive(Clone, Debug)]
pub enum DemandSource {
    /// a trip matrix, read from a file or generated by the gravity model
    Trips(Array2<u64>),
    /// the paths of an earlier run, to be replayed
    Replay(PathMatrix),
}


/// A complete assignment run described by a yaml config: a road network, its demand, the
/// strategy to assign it with, and where to put the results.
#[derive(Clone, Debug)]
pub struct Scenario {
    pub network: RoadNetwork,
    pub weight: WeightField,
    pub strategy: Strategy,
    pub demand: DemandSource,
    pub output_dir: Option<PathBuf>,
}

impl Scenario {
    /// Loads a scenario from a yaml file.  Dataset paths are relative to the file's directory.
    pub fn from_cfg(config_path: &Path) -> Result<Scenario, Box<dyn Error>> {
        let file_contents = fs::read_to_string(config_path)?;
        let yaml_cfg = YamlLoader::load_from_str(&file_contents)?;
        let yaml_cfg = yaml_cfg.get(0).ok_or("Config file is empty")?;
        let cfg_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

        let strategy = match yaml_cfg["strategy"].as_str().unwrap_or("naive") {
            "naive" => Strategy::Naive(NaiveSimConfig::from_yaml(yaml_cfg)),
            "smarter" => Strategy::Smarter(SmarterSimConfig::from_yaml(yaml_cfg)),
            other => return Err(format!("Unknown strategy '{}'", other).into()),
        };
        let weight = match yaml_cfg["weight"].as_str() {
            Some(name) => name.parse()?,
            None => WeightField::FlowTime,
        };

        let dataset_cfg = &yaml_cfg["dataset"];
        let nodes_path = dataset_path(dataset_cfg, "nodes_path", cfg_dir).
            ok_or("Config has no dataset nodes_path")?;
        let edges_path = dataset_path(dataset_cfg, "edges_path", cfg_dir).
            ok_or("Config has no dataset edges_path")?;
        let network = RoadNetwork::from_csv(&nodes_path, &edges_path)?;

        let demand = if let Some(trips_path) = dataset_path(dataset_cfg, "trips_path", cfg_dir) {
            DemandSource::Trips(io::read_trip_matrix(&trips_path)?)
        } else if let Some(paths_path) = dataset_path(dataset_cfg, "paths_path", cfg_dir) {
            DemandSource::Replay(io::read_path_matrix(&paths_path, None)?)
        } else if let Some(zones_path) = dataset_path(dataset_cfg, "zones_path", cfg_dir) {
            let zones = io::read_zones(&zones_path)?;
            DemandSource::Trips(gravity_model::run_gravity_model(&zones)?)
        } else {
            return Err("Config has no trips_path, paths_path or zones_path".into());
        };

        let output_dir = yaml_cfg["output_dir"].as_str().
            map(|dir| str_to_absolute_path(dir, cfg_dir));

        log::info!("Loaded {} scenario from {}", strategy, config_path.display());
        Ok(Scenario {
            network,
            weight,
            strategy,
            demand,
            output_dir,
        })
    }

    pub fn demand(&self) -> Demand {
        match &self.demand {
            DemandSource::Trips(trip_mat) => Demand::Trips(trip_mat.view()),
            DemandSource::Replay(paths) => Demand::Replay(paths),
        }
    }

    /// Runs the assignment on a copy of the scenario's network.
    pub fn run(&self) -> Result<SimResults, SimError> {
        let network = self.network.clone();
        match &self.strategy {
            Strategy::Naive(cfg) => {
                NaiveSimulation::new(network, self.weight, cfg.clone())?.run(self.demand())
            }
            Strategy::Smarter(cfg) => {
                SmarterSimulation::new(network, self.weight, cfg.clone())?.run(self.demand())
            }
        }
    }

    /// Writes the paths and the loaded edges of `results` to the output directory, if there is
    /// one.  Returns the directory written to.
    pub fn write_outputs(&self, results: &SimResults)
                         -> Result<Option<PathBuf>, Box<dyn Error>> {
        let output_dir = match &self.output_dir {
            Some(dir) => dir,
            None => return Ok(None),
        };
        fs::create_dir_all(output_dir)?;
        io::write_path_matrix(&results.paths, &output_dir.join(PATHS_FILENAME))?;
        io::write_edges_csv(&results.network, &output_dir.join(EDGES_FILENAME))?;
        log::info!("Wrote results to {}", output_dir.display());
        Ok(Some(output_dir.clone()))
    }
}

fn dataset_path(dataset_cfg: &Yaml, key: &str, cfg_dir: &Path) -> Option<PathBuf> {
    dataset_cfg[key].as_str().map(|path_str| str_to_absolute_path(path_str, cfg_dir))
}
