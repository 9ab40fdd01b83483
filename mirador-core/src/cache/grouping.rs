//! Flood-fill grouping of missing cells into fetchable boxes.

use std::collections::{HashSet, TryReserveError, VecDeque};

use crate::{BoundingBox, GeoCell, Grid};

/// Group 4-adjacent cells and return one cell-aligned box per group.
///
/// Groups are discovered in the order of their first cell in `missing`. Each
/// box spans `[min_index, max_index + 1)` on both axes, so a non-rectangular
/// group yields its bounding rectangle.
pub(crate) fn group_missing_cells(
    grid: &Grid,
    missing: &[GeoCell],
) -> Result<Vec<BoundingBox>, TryReserveError> {
    let mut remaining: HashSet<GeoCell> = HashSet::new();
    remaining.try_reserve(missing.len())?;
    remaining.extend(missing.iter().copied());

    let mut boxes = Vec::new();
    let mut queue = VecDeque::new();
    for &start in missing {
        if !remaining.remove(&start) {
            continue;
        }
        let mut extent = Extent::new(start);
        queue.push_back(start);
        while let Some(cell) = queue.pop_front() {
            extent.include(cell);
            for neighbour in cell.neighbours() {
                if remaining.remove(&neighbour) {
                    queue.try_reserve(1)?;
                    queue.push_back(neighbour);
                }
            }
        }
        boxes.try_reserve(1)?;
        boxes.push(extent.bounds(grid));
    }
    Ok(boxes)
}

struct Extent {
    min_lat: i32,
    max_lat: i32,
    min_lon: i32,
    max_lon: i32,
}

impl Extent {
    const fn new(cell: GeoCell) -> Self {
        Self {
            min_lat: cell.lat_index(),
            max_lat: cell.lat_index(),
            min_lon: cell.lon_index(),
            max_lon: cell.lon_index(),
        }
    }

    fn include(&mut self, cell: GeoCell) {
        self.min_lat = self.min_lat.min(cell.lat_index());
        self.max_lat = self.max_lat.max(cell.lat_index());
        self.min_lon = self.min_lon.min(cell.lon_index());
        self.max_lon = self.max_lon.max(cell.lon_index());
    }

    fn bounds(&self, grid: &Grid) -> BoundingBox {
        grid.index_bounds(
            self.min_lat,
            self.max_lat.saturating_add(1),
            self.min_lon,
            self.max_lon.saturating_add(1),
        )
    }
}
