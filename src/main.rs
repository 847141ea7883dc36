use std::path::PathBuf;
use std::process;

use clap::Parser;

use rust_traffic_assignment::Scenario;


/// Assigns the trips of a scenario to routes over its road network.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// yaml file describing the network, the demand and the assignment strategy
    config: PathBuf,
}


fn main () {
    env_logger::init();
    let args = Args::parse();
    let config_path = args.config;

    let scenario = match Scenario::from_cfg(&config_path) {
        Ok(scenario) => scenario,
        Err(why) => {
            log::error!("couldn't load {}: {}", config_path.display(), why);
            process::exit(1);
        }
    };
    let results = match scenario.run() {
        Ok(results) => results,
        Err(why) => {
            log::error!("assignment failed: {}", why);
            process::exit(1);
        }
    };
    println!("assigned {} paths in {:.3}s", results.paths.total_paths(),
             results.elapsed.as_secs_f64());

    match scenario.write_outputs(&results) {
        Ok(Some(dir)) => println!("results written to {}", dir.display()),
        Ok(None) => (),
        Err(why) => {
            log::error!("couldn't write results: {}", why);
            process::exit(1);
        }
    }
}
