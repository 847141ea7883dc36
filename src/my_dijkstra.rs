use std::collections::hash_map::Entry::{Occupied, Vacant};
use std::collections::{BinaryHeap, HashMap};
use std::cmp::Ordering;

use petgraph::algo::Measure;
use petgraph::graph::NodeIndex;
use petgraph::graph::EdgeReference;
use petgraph::visit::{EdgeRef, VisitMap, Visitable};

use super::road_network::RoadGraph;
use super::road_network::RoadSegment;


/// Single-source, single-target Dijkstra over the road graph.  Based on the implementation in
/// the petgraph library, with early termination at `goal` and predecessor tracking so the
/// route itself can be recovered.
///
/// The function `edge_cost` should return the cost for a particular edge.  Edge costs must be
/// non-negative.  Parallel edges are all relaxed, so the cheapest of them determines the cost.
///
/// Returns the cost of the shortest path and the nodes along it (`start` and `goal` included),
/// or `None` if `goal` can't be reached from `start`.
pub fn dijkstra_with_path<F, K>(
    graph: &RoadGraph,
    start: NodeIndex,
    goal: NodeIndex,
    mut edge_cost: F,
) -> Option<(K, Vec<NodeIndex>)>
where
    F: FnMut(EdgeReference<RoadSegment>) -> K,
    K: Measure + Copy,
{
    let mut visited = graph.visit_map();
    let mut scores = HashMap::new();
    let mut predecessors: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let zero_score = K::default();
    scores.insert(start, zero_score);

    let mut visit_next = BinaryHeap::new();
    visit_next.push(MinScored(zero_score, start));
    while let Some(MinScored(node_score, node)) = visit_next.pop() {
        if visited.is_visited(&node) {
            continue;
        }
        if node == goal {
            return Some((node_score, trace_back(&predecessors, start, goal)));
        }
        for edge in graph.edges(node) {
            let next = edge.target();
            if visited.is_visited(&next) {
                continue;
            }
            let next_score = node_score + edge_cost(edge);
            match scores.entry(next) {
                Occupied(ent) => {
                    if next_score < *ent.get() {
                        *ent.into_mut() = next_score;
                        visit_next.push(MinScored(next_score, next));
                        predecessors.insert(next, node);
                    }
                }
                Vacant(ent) => {
                    ent.insert(next_score);
                    visit_next.push(MinScored(next_score, next));
                    predecessors.insert(next, node);
                }
            }
        }
        visited.visit(node);
    }
    None
}


fn trace_back(predecessors: &HashMap<NodeIndex, NodeIndex>, start: NodeIndex, goal: NodeIndex)
              -> Vec<NodeIndex> {
    let mut path = vec![goal];
    let mut cur = goal;
    while cur != start {
        cur = predecessors[&cur];
        path.push(cur);
    }
    path.reverse();
    path
}


#[derive(Copy, Clone, Debug)]
pub struct MinScored<K, T>(pub K, pub T);

impl<K: PartialOrd, T> PartialEq for MinScored<K, T> {
    #[inline]
    fn eq(&self, other: &MinScored<K, T>) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: PartialOrd, T> Eq for MinScored<K, T> {}

impl<K: PartialOrd, T> PartialOrd for MinScored<K, T> {
    #[inline]
    fn partial_cmp(&self, other: &MinScored<K, T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: PartialOrd, T> Ord for MinScored<K, T> {
    #[inline]
    fn cmp(&self, other: &MinScored<K, T>) -> Ordering {
        let a = &self.0;
        let b = &other.0;
        if a == b {
            Ordering::Equal
        } else if a < b {
            Ordering::Greater
        } else if a > b {
            Ordering::Less
        } else if a.ne(a) && b.ne(b) {
            // these are the NaN cases
            Ordering::Equal
        } else if a.ne(a) {
            // Order NaN less, so that it is last in the MinScore order
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }
}
