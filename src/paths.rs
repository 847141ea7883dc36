use ndarray::prelude::*;


/// One trip's route through the road network: the node ids traversed, in order, and the total
/// cost of the route under the weight it was searched with.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedPath {
    pub path: Vec<u64>,
    pub travel_cost: f64,
}

impl TimedPath {
    pub fn new(path: Vec<u64>, travel_cost: f64) -> TimedPath {
        TimedPath{path, travel_cost}
    }

    pub fn origin(&self) -> Option<u64> {
        self.path.first().copied()
    }

    pub fn destination(&self) -> Option<u64> {
        self.path.last().copied()
    }

    fn same_route(&self, other: &TimedPath, tolerance: f64) -> bool {
        (self.travel_cost - other.travel_cost).abs() < tolerance && self.path == other.path
    }
}


/// The paths built for one unit of work.
#[derive(Clone, Debug)]
pub struct BuiltPaths {
    pub origin_zone: usize,
    pub destination_zone: usize,
    pub paths: Vec<TimedPath>,
}


/// A square zone-by-zone collection of paths.  Cells are only ever appended to, so merging is
/// order-independent; the order of paths within a cell is not meaningful.
#[derive(Clone, Debug, PartialEq)]
pub struct PathMatrix {
    cells: Array2<Vec<TimedPath>>,
}

impl PathMatrix {
    pub fn new(num_zones: usize) -> PathMatrix {
        PathMatrix {
            cells: Array2::from_shape_simple_fn((num_zones, num_zones), Vec::new),
        }
    }

    pub fn num_zones(&self) -> usize {
        self.cells.nrows()
    }

    pub fn cell(&self, origin_zone: usize, destination_zone: usize) -> &[TimedPath] {
        &self.cells[[origin_zone, destination_zone]]
    }

    pub fn extend_cell(&mut self, origin_zone: usize, destination_zone: usize,
                       paths: Vec<TimedPath>) {
        self.cells[[origin_zone, destination_zone]].extend(paths);
    }

    pub fn add_built(&mut self, built: BuiltPaths) {
        self.extend_cell(built.origin_zone, built.destination_zone, built.paths);
    }

    /// Appends every cell of `other` onto the matching cell of this matrix.
    pub fn merge(&mut self, other: PathMatrix) {
        assert_eq!(self.num_zones(), other.num_zones(), "Merging matrices of different sizes!");
        let num_zones = self.num_zones();
        // cells are always built in standard (row-major) layout
        for (flat_idx, paths) in other.cells.into_raw_vec().into_iter().enumerate() {
            if !paths.is_empty() {
                self.extend_cell(flat_idx / num_zones, flat_idx % num_zones, paths);
            }
        }
    }

    pub fn total_paths(&self) -> usize {
        self.cells.iter().map(|cell| cell.len()).sum()
    }

    pub fn iter_paths(&self) -> impl Iterator<Item = &TimedPath> {
        self.cells.iter().flat_map(|cell| cell.iter())
    }

    /// Iterates over (origin zone, destination zone, paths) for every cell, in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (usize, usize, &[TimedPath])> {
        self.cells.indexed_iter().map(|((ii, jj), cell)| (ii, jj, cell.as_slice()))
    }

    /// The number of paths in each cell, as a demand matrix.
    pub fn cell_counts(&self) -> Array2<u64> {
        self.cells.map(|cell| cell.len() as u64)
    }

    /// Checks that both matrices hold the same routes: every cell has the same number of paths,
    /// and each path in either matrix has a counterpart in the other with the same nodes and a
    /// travel cost within `tolerance`.  Order within a cell is ignored.
    pub fn matches(&self, other: &PathMatrix, tolerance: f64) -> bool {
        if self.num_zones() != other.num_zones() {
            return false;
        }
        self.cells.iter().zip(other.cells.iter()).all(|(mine, theirs)| {
            mine.len() == theirs.len() &&
            mine.iter().all(|pp| theirs.iter().any(|qq| pp.same_route(qq, tolerance))) &&
            theirs.iter().all(|qq| mine.iter().any(|pp| qq.same_route(pp, tolerance)))
        })
    }
}
