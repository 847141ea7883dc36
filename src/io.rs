// this file defines the readers and writers of the csv files a run consumes and produces.
use std::error::Error;
use std::fs::File;
use std::path::Path;

use itertools::Itertools;
use ndarray::prelude::*;

use super::geometry::GeoPoint;
use super::gravity_model::ZoneDemand;
use super::paths::{PathMatrix, TimedPath};
use super::road_network::{parse_id_list, row_field, RoadNetwork, Row};

static PATH_HEADER: [&str; 4] = ["origin_zone", "destination_zone", "travel_cost", "nodes"];
static EDGE_HEADER: [&str; 11] = ["start_node", "end_node", "key", "length (km)",
                                  "maxspeed (km/h)", "capacity (veh/h)", "lanes", "passes_count",
                                  "capacity_occupied", "cur_speed (km/h)", "flow_time (s)"];


/// Reads a trip demand matrix from a csv with one row per origin zone and no header.
pub fn read_trip_matrix(path: &Path) -> Result<Array2<u64>, Box<dyn Error>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_reader(File::open(path)?);
    let mut values = vec![];
    let mut num_rows = 0;
    for result in reader.records() {
        let record = result?;
        for field in record.iter() {
            values.push(field.trim().parse::<u64>()?);
        }
        num_rows += 1;
    }
    let num_cols = if num_rows == 0 { 0 } else { values.len() / num_rows };
    let trip_mat = Array2::from_shape_vec((num_rows, num_cols), values)?;
    log::info!("Read {}x{} trip matrix with {} trips", num_rows, num_cols, trip_mat.sum());
    Ok(trip_mat)
}

/// Writes every path, one per row, with its node ids separated by `;`.
pub fn write_path_matrix(paths: &PathMatrix, path: &Path) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&PATH_HEADER)?;
    for (ii, jj, cell) in paths.iter_cells() {
        for timed_path in cell {
            let nodes = timed_path.path.iter().join(";");
            writer.write_record(&[ii.to_string(), jj.to_string(),
                                  timed_path.travel_cost.to_string(), nodes])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Reads paths written by `write_path_matrix`.  The matrix is sized to the highest zone that
/// appears in the file, unless `num_zones` asks for more.
pub fn read_path_matrix(path: &Path, num_zones: Option<usize>)
                        -> Result<PathMatrix, Box<dyn Error>> {
    let mut reader = csv::Reader::from_reader(File::open(path)?);
    let mut rows = vec![];
    let mut max_zone = None;
    for result in reader.deserialize() {
        let row: Row = result?;
        let origin_zone: usize = row_field(&row, "origin_zone")?.parse()?;
        let destination_zone: usize = row_field(&row, "destination_zone")?.parse()?;
        let timed_path = TimedPath::new(parse_id_list(row_field(&row, "nodes")?)?,
                                        row_field(&row, "travel_cost")?.parse()?);
        max_zone = max_zone.max(Some(origin_zone.max(destination_zone)));
        rows.push((origin_zone, destination_zone, timed_path));
    }

    let found_zones = max_zone.map_or(0, |zz| zz + 1);
    let mut paths = PathMatrix::new(num_zones.unwrap_or(0).max(found_zones));
    for (origin_zone, destination_zone, timed_path) in rows {
        paths.extend_cell(origin_zone, destination_zone, vec![timed_path]);
    }
    log::info!("Read {} paths over {} zones", paths.total_paths(), paths.num_zones());
    Ok(paths)
}

/// Writes every road segment with its physical attributes and its current traffic state.
pub fn write_edges_csv(network: &RoadNetwork, path: &Path) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&EDGE_HEADER)?;
    for (start, end, key, segment) in network.segments() {
        writer.write_record(&[
            start.to_string(),
            end.to_string(),
            key.to_string(),
            segment.length_km().to_string(),
            segment.maxspeed_kmh().to_string(),
            segment.capacity_vph().to_string(),
            segment.lanes().to_string(),
            segment.passes_count().to_string(),
            segment.capacity_occupied().to_string(),
            segment.cur_speed_kmh().to_string(),
            segment.flow_time_s().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads zone productions and attractions for the gravity model, from `name`, `production`,
/// `attraction`, `lat` and `lon` columns.
pub fn read_zones(path: &Path) -> Result<Vec<ZoneDemand>, Box<dyn Error>> {
    let mut reader = csv::Reader::from_reader(File::open(path)?);
    let mut zones = vec![];
    for result in reader.deserialize() {
        let row: Row = result?;
        zones.push(ZoneDemand {
            name: row_field(&row, "name")?.to_string(),
            centroid: GeoPoint::new(row_field(&row, "lat")?.parse()?,
                                    row_field(&row, "lon")?.parse()?),
            production: row_field(&row, "production")?.parse()?,
            attraction: row_field(&row, "attraction")?.parse()?,
        });
    }
    Ok(zones)
}
