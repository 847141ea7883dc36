// this file defines the planners that split trip demand into pages of work.  A page holds units
// of (origin zone, destination zone, count) whose counts sum to exactly the batch size; only the
// last page may be smaller.  Cells are walked in row-major order, and a cell that doesn't fit in
// the current page is split across as many pages as needed.  Pages are produced on demand.
use std::cmp::min;

use ndarray::prelude::*;

use super::paths::PathMatrix;


/// A request for `count` paths from `origin_zone` to `destination_zone`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchPaths {
    pub origin_zone: usize,
    pub destination_zone: usize,
    pub count: usize,
}

impl BatchPaths {
    pub fn new(origin_zone: usize, destination_zone: usize, count: usize) -> BatchPaths {
        BatchPaths{origin_zone, destination_zone, count}
    }
}


/// A request that replays recorded endpoints instead of sampling new ones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchFixedPaths {
    pub batch: BatchPaths,
    pub starts_ends: Vec<(u64, u64)>,
}


/// Where a planner stands: the cell being split, and how many of its trips are already planned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchCursor {
    pub row: usize,
    pub col: usize,
    pub taken: usize,
}

impl BatchCursor {
    fn next_cell(&mut self, num_cols: usize) {
        self.taken = 0;
        self.col += 1;
        if self.col == num_cols {
            self.col = 0;
            self.row += 1;
        }
    }
}


/// Fills the next page from the cursor position.  `cell_len` gives the number of trips in a
/// cell; `make_unit` builds a unit from (row, col, offset into the cell, count).
fn fill_page<T, L, U>(cursor: &mut BatchCursor, shape: (usize, usize), batch_size: usize,
                      cell_len: L, mut make_unit: U) -> Option<Vec<T>>
    where L: Fn(usize, usize) -> usize,
          U: FnMut(usize, usize, usize, usize) -> T,
{
    let (num_rows, num_cols) = shape;
    if num_cols == 0 {
        return None;
    }
    let mut page = vec![];
    let mut capacity = batch_size;
    while capacity > 0 && cursor.row < num_rows {
        let cell_total = cell_len(cursor.row, cursor.col);
        let cut = min(capacity, cell_total - cursor.taken);
        if cut > 0 {
            page.push(make_unit(cursor.row, cursor.col, cursor.taken, cut));
            cursor.taken += cut;
            capacity -= cut;
        }
        if cursor.taken == cell_total {
            cursor.next_cell(num_cols);
        }
    }

    if page.is_empty() {
        None
    } else {
        Some(page)
    }
}


/// Pages of work for a trip demand matrix.
#[derive(Clone, Debug)]
pub struct MatrixBatches<'a> {
    trip_mat: ArrayView2<'a, u64>,
    batch_size: usize,
    cursor: BatchCursor,
}

impl<'a> MatrixBatches<'a> {
    pub fn new(trip_mat: ArrayView2<'a, u64>, batch_size: usize) -> MatrixBatches<'a> {
        MatrixBatches::resume(trip_mat, batch_size, BatchCursor::default())
    }

    /// Continues planning from a cursor returned by an earlier planner over the same matrix.
    pub fn resume(trip_mat: ArrayView2<'a, u64>, batch_size: usize, cursor: BatchCursor)
                  -> MatrixBatches<'a> {
        MatrixBatches {
            trip_mat,
            batch_size: batch_size.max(1),
            cursor,
        }
    }

    pub fn cursor(&self) -> BatchCursor {
        self.cursor
    }
}

impl<'a> Iterator for MatrixBatches<'a> {
    type Item = Vec<BatchPaths>;

    fn next(&mut self) -> Option<Vec<BatchPaths>> {
        let trip_mat = self.trip_mat;
        fill_page(&mut self.cursor, trip_mat.dim(), self.batch_size,
                  |ii, jj| trip_mat[[ii, jj]] as usize,
                  |ii, jj, _, count| BatchPaths::new(ii, jj, count))
    }
}


/// Pages of work that replay the endpoints of previously built paths.
#[derive(Clone, Debug)]
pub struct ExistingPathBatches<'a> {
    paths: &'a PathMatrix,
    batch_size: usize,
    cursor: BatchCursor,
}

impl<'a> ExistingPathBatches<'a> {
    pub fn new(paths: &'a PathMatrix, batch_size: usize) -> ExistingPathBatches<'a> {
        ExistingPathBatches::resume(paths, batch_size, BatchCursor::default())
    }

    pub fn resume(paths: &'a PathMatrix, batch_size: usize, cursor: BatchCursor)
                  -> ExistingPathBatches<'a> {
        ExistingPathBatches {
            paths,
            batch_size: batch_size.max(1),
            cursor,
        }
    }

    pub fn cursor(&self) -> BatchCursor {
        self.cursor
    }
}

impl<'a> Iterator for ExistingPathBatches<'a> {
    type Item = Vec<BatchFixedPaths>;

    fn next(&mut self) -> Option<Vec<BatchFixedPaths>> {
        let paths = self.paths;
        let num_zones = paths.num_zones();
        fill_page(&mut self.cursor, (num_zones, num_zones), self.batch_size,
                  |ii, jj| paths.cell(ii, jj).len(),
                  |ii, jj, offset, count| {
                      let starts_ends = paths.cell(ii, jj)[offset..offset + count].iter().
                          filter_map(|pp| pp.origin().zip(pp.destination())).collect();
                      BatchFixedPaths {
                          batch: BatchPaths::new(ii, jj, count),
                          starts_ends,
                      }
                  })
    }
}


/// Plans the pages of work for a trip demand matrix, lazily.
pub fn plan_from_matrix(trip_mat: ArrayView2<u64>, batch_size: usize) -> MatrixBatches {
    MatrixBatches::new(trip_mat, batch_size)
}

/// Plans pages of work that replay the endpoints of `paths`, lazily.
pub fn plan_from_existing_paths(paths: &PathMatrix, batch_size: usize) -> ExistingPathBatches {
    ExistingPathBatches::new(paths, batch_size)
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::super::paths::TimedPath;

    fn triples(page: &[BatchPaths]) -> Vec<(usize, usize, usize)> {
        page.iter().map(|bp| (bp.origin_zone, bp.destination_zone, bp.count)).collect()
    }

    #[test]
    fn test_split_at_page_boundary() {
        let mut trip_mat = Array2::zeros((10, 10));
        let row: [u64; 10] = [0, 151, 47, 169, 16, 87, 98, 744, 10, 45];
        for (jj, vv) in row.iter().enumerate() {
            trip_mat[[0, jj]] = *vv;
        }

        let pages: Vec<Vec<BatchPaths>> = plan_from_matrix(trip_mat.view(), 1000).collect();
        assert_eq!(pages.len(), 2);
        assert_eq!(triples(&pages[0]),
                   vec![(0, 1, 151), (0, 2, 47), (0, 3, 169), (0, 4, 16), (0, 5, 87),
                        (0, 6, 98), (0, 7, 432)]);
        // the rest of the split cell starts the next page, which is the smaller last one
        assert_eq!(triples(&pages[1]), vec![(0, 7, 312), (0, 8, 10), (0, 9, 45)]);
    }

    #[test]
    fn test_pages_are_full_and_deterministic() {
        let trip_mat = arr2(&[[0, 5, 3], [7, 0, 0], [2, 9, 1]]);
        let pages: Vec<Vec<BatchPaths>> = MatrixBatches::new(trip_mat.view(), 4).collect();
        let sizes: Vec<usize> = pages.iter().map(|pp| pp.iter().map(|bp| bp.count).sum()).
            collect();
        assert_eq!(sizes, vec![4, 4, 4, 4, 4, 4, 3]);
        assert_eq!(triples(&pages[0]), vec![(0, 1, 4)]);
        assert_eq!(triples(&pages[1]), vec![(0, 1, 1), (0, 2, 3)]);
        assert_eq!(triples(&pages[2]), vec![(1, 0, 4)]);
        assert_eq!(triples(&pages[3]), vec![(1, 0, 3), (2, 0, 1)]);
        assert_eq!(triples(&pages[4]), vec![(2, 0, 1), (2, 1, 3)]);
        assert_eq!(triples(&pages[5]), vec![(2, 1, 4)]);
        assert_eq!(triples(&pages[6]), vec![(2, 1, 2), (2, 2, 1)]);

        let again: Vec<Vec<BatchPaths>> = MatrixBatches::new(trip_mat.view(), 4).collect();
        assert_eq!(again, pages);
    }

    #[test]
    fn test_empty_demand() {
        let trip_mat: Array2<u64> = Array2::zeros((3, 3));
        assert_eq!(MatrixBatches::new(trip_mat.view(), 10).count(), 0);
        let trip_mat: Array2<u64> = Array2::zeros((0, 0));
        assert_eq!(MatrixBatches::new(trip_mat.view(), 10).count(), 0);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let trip_mat = arr2(&[[0, 2], [1, 0]]);
        let pages: Vec<Vec<BatchPaths>> = MatrixBatches::new(trip_mat.view(), 0).collect();
        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|pp| pp.len() == 1 && pp[0].count == 1));
    }

    #[test]
    fn test_resume_from_cursor() {
        let trip_mat = arr2(&[[0, 5, 3], [7, 0, 0], [2, 9, 1]]);
        let all: Vec<Vec<BatchPaths>> = MatrixBatches::new(trip_mat.view(), 4).collect();

        let mut planner = MatrixBatches::new(trip_mat.view(), 4);
        planner.next();
        planner.next();
        let cursor = planner.cursor();
        let resumed: Vec<Vec<BatchPaths>> =
            MatrixBatches::resume(trip_mat.view(), 4, cursor).collect();
        assert_eq!(resumed, all[2..].to_vec());
    }

    #[test]
    fn test_existing_paths_carry_endpoints() {
        let mut paths = PathMatrix::new(2);
        paths.extend_cell(0, 1, vec![
            TimedPath::new(vec![1, 5, 2], 10.),
            TimedPath::new(vec![3, 4], 10.),
            TimedPath::new(vec![1, 6, 7, 4], 10.),
        ]);
        paths.extend_cell(1, 0, vec![TimedPath::new(vec![4, 1], 10.)]);

        let pages: Vec<Vec<BatchFixedPaths>> = plan_from_existing_paths(&paths, 2).collect();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], vec![BatchFixedPaths {
            batch: BatchPaths::new(0, 1, 2),
            starts_ends: vec![(1, 2), (3, 4)],
        }]);
        // the second page picks the split cell up where the first left off
        assert_eq!(pages[1], vec![
            BatchFixedPaths {
                batch: BatchPaths::new(0, 1, 1),
                starts_ends: vec![(1, 4)],
            },
            BatchFixedPaths {
                batch: BatchPaths::new(1, 0, 1),
                starts_ends: vec![(4, 1)],
            },
        ]);
    }
}
