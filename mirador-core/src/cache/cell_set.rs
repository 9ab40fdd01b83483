//! Insertion-ordered set of cached cells.

use std::collections::{HashSet, TryReserveError, VecDeque};

use crate::GeoCell;

/// Cached cells with O(1) membership and oldest-first iteration.
#[derive(Debug, Default)]
pub(crate) struct CachedCellSet {
    members: HashSet<GeoCell>,
    order: VecDeque<GeoCell>,
}

impl CachedCellSet {
    pub(crate) fn from_cells<I>(cells: I) -> Self
    where
        I: IntoIterator<Item = GeoCell>,
    {
        let mut set = Self::default();
        for cell in cells {
            if set.members.insert(cell) {
                set.order.push_back(cell);
            }
        }
        set
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn contains(&self, cell: &GeoCell) -> bool {
        self.members.contains(cell)
    }

    /// Add cells not already present, keeping existing cells at their
    /// original position. Returns the number of cells added.
    pub(crate) fn try_insert_all(&mut self, cells: &[GeoCell]) -> Result<usize, TryReserveError> {
        self.members.try_reserve(cells.len())?;
        self.order.try_reserve(cells.len())?;
        let mut added = 0;
        for &cell in cells {
            if self.members.insert(cell) {
                self.order.push_back(cell);
                added += 1;
            }
        }
        Ok(added)
    }

    /// Remove the given cells. Returns the number of cells removed.
    pub(crate) fn remove_all(&mut self, cells: &[GeoCell]) -> usize {
        let removed = cells
            .iter()
            .filter(|cell| self.members.remove(cell))
            .count();
        if removed > 0 {
            let members = &self.members;
            self.order.retain(|cell| members.contains(cell));
        }
        removed
    }

    /// Drop the oldest cells until at most `target_len` remain. Returns the
    /// number of cells evicted.
    pub(crate) fn evict_oldest(&mut self, target_len: usize) -> usize {
        let excess = self.order.len().saturating_sub(target_len);
        for cell in self.order.drain(..excess) {
            self.members.remove(&cell);
        }
        excess
    }

    pub(crate) fn clear(&mut self) {
        self.members = HashSet::new();
        self.order = VecDeque::new();
    }

    /// Keys in insertion order, ready for persistence.
    pub(crate) fn keys(&self) -> Vec<String> {
        self.order.iter().map(|cell| cell.key()).collect()
    }
}
