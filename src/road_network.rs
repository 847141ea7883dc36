// this file defines a struct to represent a city's street network, with the per-edge traffic
// state used by the assignment.  It's a wrapper around a petgraph graph.
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use std::collections::HashMap;

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use super::congestion;
use super::errors::SimError;
use super::geometry::GeoPoint;
use super::my_dijkstra::dijkstra_with_path;
use super::paths::TimedPath;


pub type RoadGraph = DiGraph<RoadNode, RoadSegment>;

// A convenience type for parsing csv data
pub(crate) type Row = HashMap<String, String>;

static DEFAULT_LANES: u8 = 1;


/// The edge attribute that shortest-path searches minimize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightField {
    /// current congested travel time, in seconds
    FlowTime,
    /// physical length, in meters
    Length,
}

impl FromStr for WeightField {
    type Err = SimError;

    fn from_str(name: &str) -> Result<WeightField, SimError> {
        match name {
            "flow_time (s)" | "flow_time" => Ok(WeightField::FlowTime),
            "length (m)" | "length" => Ok(WeightField::Length),
            _ => Err(SimError::UnknownWeight(String::from(name))),
        }
    }
}

impl fmt::Display for WeightField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WeightField::FlowTime => write!(f, "flow_time (s)"),
            WeightField::Length => write!(f, "length (m)"),
        }
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct RoadNode {
    pub id: u64,
    pub pos: GeoPoint,
    pub zones: Vec<usize>,
}

impl RoadNode {
    pub fn new(id: u64, pos: GeoPoint, zones: Vec<usize>) -> RoadNode {
        RoadNode{id, pos, zones}
    }
}


/// A directed road segment.  The physical attributes are fixed; the traffic state
/// (`passes_count` and everything derived from it) is only written by the `congestion` module.
#[derive(Clone, Debug, PartialEq)]
pub struct RoadSegment {
    pub(crate) length_km: f64,
    pub(crate) maxspeed_kmh: f64,
    pub(crate) capacity_vph: f64,
    pub(crate) lanes: u8,
    pub(crate) passes_count: u32,
    pub(crate) capacity_occupied: f64,
    pub(crate) cur_speed_kmh: f64,
    pub(crate) flow_time_s: f64,
}

impl RoadSegment {
    /// Creates an unloaded segment, whose current speed and flow time are the free-flow ones.
    pub fn new(length_km: f64, maxspeed_kmh: f64, capacity_vph: f64, lanes: u8) -> RoadSegment {
        let mut segment = RoadSegment {
            length_km,
            maxspeed_kmh,
            capacity_vph,
            lanes,
            passes_count: 0,
            capacity_occupied: 0.,
            cur_speed_kmh: maxspeed_kmh,
            flow_time_s: 0.,
        };
        congestion::reset_segment(&mut segment);
        segment
    }

    pub fn length_km(&self) -> f64 {
        self.length_km
    }

    pub fn maxspeed_kmh(&self) -> f64 {
        self.maxspeed_kmh
    }

    pub fn capacity_vph(&self) -> f64 {
        self.capacity_vph
    }

    pub fn lanes(&self) -> u8 {
        self.lanes
    }

    pub fn passes_count(&self) -> u32 {
        self.passes_count
    }

    pub fn capacity_occupied(&self) -> f64 {
        self.capacity_occupied
    }

    pub fn cur_speed_kmh(&self) -> f64 {
        self.cur_speed_kmh
    }

    pub fn flow_time_s(&self) -> f64 {
        self.flow_time_s
    }

    pub fn weight(&self, weight: WeightField) -> f64 {
        match weight {
            WeightField::FlowTime => self.flow_time_s,
            WeightField::Length => self.length_km * 1000.,
        }
    }
}


/// The outcome of one shortest-path draw.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchOutcome {
    Found(TimedPath),
    /// origin and destination were the same node
    SameNode,
    Unreachable,
}


#[derive(Clone, Debug)]
pub struct RoadNetwork {
    graph: RoadGraph,
    node_idxs_by_id: HashMap<u64, NodeIndex>,
    // the nodes that belong to each zone, so sampling never has to scan the whole graph
    zone_nodes: HashMap<usize, Vec<NodeIndex>>,
}

impl RoadNetwork {
    pub fn new() -> RoadNetwork {
        RoadNetwork {
            graph: DiGraph::new(),
            node_idxs_by_id: HashMap::new(),
            zone_nodes: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, id: u64, pos: GeoPoint, zones: Vec<usize>)
                    -> Result<NodeIndex, SimError> {
        if self.node_idxs_by_id.contains_key(&id) {
            return Err(SimError::DuplicateNode(id));
        }
        let mut zones = zones;
        zones.sort_unstable();
        zones.dedup();
        let idx = self.graph.add_node(RoadNode::new(id, pos, zones.clone()));
        for zone in zones {
            self.zone_nodes.entry(zone).or_insert_with(Vec::new).push(idx);
        }
        self.node_idxs_by_id.insert(id, idx);
        Ok(idx)
    }

    /// Adds a segment from `from_id` to `to_id`.  Segments between the same ordered pair of nodes
    /// get increasing parallel-edge keys, in the order they're added.
    pub fn add_segment(&mut self, from_id: u64, to_id: u64, segment: RoadSegment)
                       -> Result<EdgeIndex, SimError> {
        let from_idx = self.node_index(from_id).ok_or(SimError::UnknownNode(from_id))?;
        let to_idx = self.node_index(to_id).ok_or(SimError::UnknownNode(to_id))?;
        Ok(self.graph.add_edge(from_idx, to_idx, segment))
    }

    pub fn graph(&self) -> &RoadGraph {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_index(&self, id: u64) -> Option<NodeIndex> {
        self.node_idxs_by_id.get(&id).copied()
    }

    pub fn node(&self, id: u64) -> Option<&RoadNode> {
        self.node_index(id).map(|idx| &self.graph[idx])
    }

    pub fn zone_members(&self, zone: usize) -> &[NodeIndex] {
        match self.zone_nodes.get(&zone) {
            Some(nodes) => nodes,
            None => &[],
        }
    }

    pub fn node_in_zone(&self, id: u64, zone: usize) -> bool {
        match self.node(id) {
            Some(node) => node.zones.contains(&zone),
            None => false,
        }
    }

    /// The key-0 edge from `from` to `to`: the first one added between them.
    fn first_edge(&self, from: NodeIndex, to: NodeIndex) -> Option<EdgeIndex> {
        self.graph.edges_connecting(from, to).map(|er| er.id()).min()
    }

    /// Returns the segment with parallel-edge key `key` from `from_id` to `to_id`.
    pub fn segment(&self, from_id: u64, to_id: u64, key: usize) -> Option<&RoadSegment> {
        let from_idx = self.node_index(from_id)?;
        let to_idx = self.node_index(to_id)?;
        let mut edge_idxs: Vec<EdgeIndex> =
            self.graph.edges_connecting(from_idx, to_idx).map(|er| er.id()).collect();
        edge_idxs.sort_unstable();
        edge_idxs.get(key).map(|ei| &self.graph[*ei])
    }

    /// Lists every segment as (start node id, end node id, parallel-edge key, segment).
    pub fn segments(&self) -> Vec<(u64, u64, usize, &RoadSegment)> {
        let mut keys: HashMap<(NodeIndex, NodeIndex), usize> = HashMap::new();
        // edge references come out in index order, which is the order they were added
        self.graph.edge_references().map(|er| {
            let key = keys.entry((er.source(), er.target())).or_insert(0);
            let this_key = *key;
            *key += 1;
            (self.graph[er.source()].id, self.graph[er.target()].id, this_key, er.weight())
        }).collect()
    }

    pub(crate) fn segments_mut(&mut self) -> impl Iterator<Item = &mut RoadSegment> {
        self.graph.edge_weights_mut()
    }

    pub(crate) fn first_segment_mut(&mut self, from_id: u64, to_id: u64)
                                    -> Result<&mut RoadSegment, SimError> {
        let from_idx = self.node_index(from_id).ok_or(SimError::UnknownNode(from_id))?;
        let to_idx = self.node_index(to_id).ok_or(SimError::UnknownNode(to_id))?;
        let edge_idx = self.first_edge(from_idx, to_idx).
            ok_or(SimError::MissingEdge(from_id, to_id))?;
        Ok(&mut self.graph[edge_idx])
    }

    /// Sets every segment back to the unloaded, free-flow state.
    pub fn reset_passes(&mut self) {
        for segment in self.segments_mut() {
            congestion::reset_segment(segment);
        }
    }

    /// Checks that the network can be assigned onto with the given weight: it must have edges,
    /// every edge must have a positive length, free-flow speed and capacity, and a finite,
    /// non-negative weight.
    pub fn validate(&self, weight: WeightField) -> Result<(), SimError> {
        if self.graph.edge_count() == 0 {
            return Err(SimError::EmptyNetwork);
        }
        for er in self.graph.edge_references() {
            let segment = er.weight();
            let checks = [
                ("length (km)", segment.length_km),
                ("maxspeed (km/h)", segment.maxspeed_kmh),
                ("capacity (veh/h)", segment.capacity_vph),
            ];
            let bad_attr = checks.iter().find(|(_, value)| !(value.is_finite() && *value > 0.));
            let bad_weight = segment.weight(weight);
            let bad_attr = match bad_attr {
                Some((field, value)) => Some((*field, *value)),
                None if !(bad_weight.is_finite() && bad_weight >= 0.) => {
                    Some(("weight", bad_weight))
                }
                None => None,
            };
            if let Some((field, value)) = bad_attr {
                return Err(SimError::InvalidSegment {
                    from: self.graph[er.source()].id,
                    to: self.graph[er.target()].id,
                    field,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Finds the cheapest route from `from_id` to `to_id` under `weight`.
    pub fn shortest_path(&self, from_id: u64, to_id: u64, weight: WeightField)
                         -> Result<SearchOutcome, SimError> {
        let from_idx = self.node_index(from_id).ok_or(SimError::UnknownNode(from_id))?;
        let to_idx = self.node_index(to_id).ok_or(SimError::UnknownNode(to_id))?;
        if from_idx == to_idx {
            return Ok(SearchOutcome::SameNode);
        }
        let found = dijkstra_with_path(&self.graph, from_idx, to_idx,
                                       |er| er.weight().weight(weight));
        Ok(match found {
            Some((cost, node_idxs)) => {
                let path = node_idxs.iter().map(|idx| self.graph[*idx].id).collect();
                SearchOutcome::Found(TimedPath::new(path, cost))
            }
            None => SearchOutcome::Unreachable,
        })
    }

    /// Loads a network from a node list and an edge list.
    ///
    /// The node csv needs `id`, `lat`, `lon` and `zones` columns, where `zones` holds one or more
    /// zone ids separated by `;`.  The edge csv needs `start_node`, `end_node`, `length (km)`,
    /// `maxspeed (km/h)` and `capacity (veh/h)` columns, and may have a `lanes` column.  Any other
    /// columns are ignored.
    pub fn from_csv(nodes_path: &Path, edges_path: &Path)
                    -> Result<RoadNetwork, Box<dyn Error>> {
        let mut network = RoadNetwork::new();

        let mut reader = csv::Reader::from_reader(File::open(nodes_path)?);
        for result in reader.deserialize() {
            let row: Row = result?;
            let id = row_field(&row, "id")?;
            let zones = parse_id_list::<usize>(row_field(&row, "zones")?)?;
            if zones.is_empty() {
                log::warn!("Node {} has no zone", id);
            }
            let pos = GeoPoint::new(row_field(&row, "lat")?.parse()?,
                                    row_field(&row, "lon")?.parse()?);
            network.add_node(id.parse()?, pos, zones)?;
        }

        let mut reader = csv::Reader::from_reader(File::open(edges_path)?);
        if !reader.headers()?.iter().any(|header| header == "lanes") {
            log::warn!("{} has no lanes column, assuming {} lane per edge", edges_path.display(),
                       DEFAULT_LANES);
        }
        for result in reader.deserialize() {
            let row: Row = result?;
            let lanes = match row.get("lanes") {
                Some(lanes) => lanes.parse::<f64>()? as u8,
                None => DEFAULT_LANES,
            };
            let segment = RoadSegment::new(row_field(&row, "length (km)")?.parse()?,
                                           row_field(&row, "maxspeed (km/h)")?.parse()?,
                                           row_field(&row, "capacity (veh/h)")?.parse()?,
                                           lanes);
            network.add_segment(row_field(&row, "start_node")?.parse()?,
                                row_field(&row, "end_node")?.parse()?, segment)?;
        }
        log::info!("Loaded road network with {} nodes and {} edges", network.node_count(),
                   network.edge_count());

        Ok(network)
    }
}

impl Default for RoadNetwork {
    fn default() -> RoadNetwork {
        RoadNetwork::new()
    }
}


/// Looks up a column of a csv row, failing if the file doesn't have it.
pub(crate) fn row_field<'a>(row: &'a Row, column: &str) -> Result<&'a str, Box<dyn Error>> {
    match row.get(column) {
        Some(value) => Ok(value.as_str()),
        None => Err(format!("missing column '{}'", column).into()),
    }
}

/// Parses a `;`-separated list of ids, ignoring surrounding whitespace and empty entries.
pub fn parse_id_list<T: FromStr>(list: &str) -> Result<Vec<T>, T::Err> {
    list.split(';').map(|ss| ss.trim()).filter(|ss| !ss.is_empty()).map(|ss| ss.parse()).
        collect()
}
