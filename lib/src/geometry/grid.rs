//! Sparse spatial hash grids for nearby queries.
//!
//! Only occupied cells are stored, so the grids work for any extent. Query
//! results come back in a fixed order: cells row by row, then insertion order
//! within a cell.

use super::{BoundingBox, Point};
use crate::Coord;
use std::collections::HashMap;

type CellKey = (Coord, Coord);

fn cell_of(p: Point, cell_size: Coord) -> CellKey {
    (p.x.div_euclid(cell_size), p.y.div_euclid(cell_size))
}

/// Grid of values located at points.
#[derive(Debug, Clone)]
pub struct SparsePointGrid<T> {
    cell_size: Coord,
    cells: HashMap<CellKey, Vec<(Point, T)>>,
    len: usize,
}

impl<T: Clone> SparsePointGrid<T> {
    /// Create a grid with square cells of `cell_size`.
    pub fn new(cell_size: Coord) -> Self {
        Self {
            cell_size: cell_size.max(1),
            cells: HashMap::new(),
            len: 0,
        }
    }

    pub fn cell_size(&self) -> Coord {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, p: Point, value: T) {
        self.cells.entry(cell_of(p, self.cell_size)).or_default().push((p, value));
        self.len += 1;
    }

    /// Visit every value in the cells within `radius` of `p` until `f`
    /// returns false. Values further than `radius` may be visited too.
    pub fn process_nearby<F>(&self, p: Point, radius: Coord, mut f: F)
    where
        F: FnMut(Point, &T) -> bool,
    {
        let min = cell_of(p - Point::new(radius, radius), self.cell_size);
        let max = cell_of(p + Point::new(radius, radius), self.cell_size);
        for cy in min.1..=max.1 {
            for cx in min.0..=max.0 {
                let Some(cell) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                for (location, value) in cell {
                    if !f(*location, value) {
                        return;
                    }
                }
            }
        }
    }

    /// Values within `radius` of `p`.
    pub fn nearby(&self, p: Point, radius: Coord) -> Vec<(Point, T)> {
        let mut ret = Vec::new();
        let radius_squared = radius as i128 * radius as i128;
        self.process_nearby(p, radius, |location, value| {
            if (location - p).length_squared() <= radius_squared {
                ret.push((location, value.clone()));
            }
            true
        });
        ret
    }
}

/// Grid of values attached to line segments. A segment is stored in every
/// cell its bounding box touches.
#[derive(Debug, Clone)]
pub struct SparseLineGrid<T> {
    cell_size: Coord,
    cells: HashMap<CellKey, Vec<usize>>,
    values: Vec<T>,
}

impl<T: Clone> SparseLineGrid<T> {
    pub fn new(cell_size: Coord) -> Self {
        Self {
            cell_size: cell_size.max(1),
            cells: HashMap::new(),
            values: Vec::new(),
        }
    }

    pub fn insert(&mut self, a: Point, b: Point, value: T) {
        let idx = self.values.len();
        self.values.push(value);
        let bbox = BoundingBox::from_points(&[a, b]);
        let min = cell_of(bbox.min, self.cell_size);
        let max = cell_of(bbox.max, self.cell_size);
        for cy in min.1..=max.1 {
            for cx in min.0..=max.0 {
                self.cells.entry((cx, cy)).or_default().push(idx);
            }
        }
    }

    /// Values of the segments stored in the cells within `radius` of `p`,
    /// each once.
    pub fn nearby(&self, p: Point, radius: Coord) -> Vec<T> {
        let min = cell_of(p - Point::new(radius, radius), self.cell_size);
        let max = cell_of(p + Point::new(radius, radius), self.cell_size);
        let mut indices = Vec::new();
        for cy in min.1..=max.1 {
            for cx in min.0..=max.0 {
                if let Some(cell) = self.cells.get(&(cx, cy)) {
                    indices.extend_from_slice(cell);
                }
            }
        }
        indices.sort_unstable();
        indices.dedup();
        indices.into_iter().map(|idx| self.values[idx].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_grid_nearby() {
        let mut grid = SparsePointGrid::new(100);
        grid.insert(Point::new(10, 10), 'a');
        grid.insert(Point::new(150, 10), 'b');
        grid.insert(Point::new(-40, -40), 'c');
        grid.insert(Point::new(1000, 1000), 'd');
        assert_eq!(grid.len(), 4);

        let mut found: Vec<char> = grid.nearby(Point::zero(), 100).into_iter().map(|(_, v)| v).collect();
        found.sort_unstable();
        assert_eq!(found, vec!['a', 'c']);
    }

    #[test]
    fn test_point_grid_stops_early() {
        let mut grid = SparsePointGrid::new(10);
        for i in 0..5 {
            grid.insert(Point::new(i, 0), i);
        }
        let mut visited = 0;
        grid.process_nearby(Point::zero(), 10, |_, _| {
            visited += 1;
            visited < 2
        });
        assert_eq!(visited, 2);
    }

    #[test]
    fn test_line_grid_finds_long_segment() {
        let mut grid = SparseLineGrid::new(100);
        grid.insert(Point::new(0, 0), Point::new(1000, 0), 1);
        grid.insert(Point::new(0, 500), Point::new(0, 600), 2);
        assert_eq!(grid.nearby(Point::new(550, 20), 30), vec![1]);
        assert_eq!(grid.nearby(Point::new(5, 550), 10), vec![2]);
    }
}
