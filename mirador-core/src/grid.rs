//! Fixed-size equirectangular grid over latitude/longitude.
//!
//! The grid is pure arithmetic: a coordinate maps to the cell whose south-west
//! corner is `floor(coord / cell_size) * cell_size`. Cells are addressed by
//! signed integer indices so enumeration never accumulates floating-point
//! error. A request guard refuses to enumerate boxes spanning more than
//! `max_cells_per_request` cells; callers are expected to split larger regions
//! (see [`Grid::partition`]).

use std::{collections::TryReserveError, fmt, num::ParseIntError, ops::Range, str::FromStr};

use thiserror::Error;

use crate::BoundingBox;

/// Default edge length of a grid cell in degrees (roughly 1.1 km).
pub const DEFAULT_CELL_SIZE: f64 = 0.01;

/// Default ceiling on the number of cells a single box may span.
pub const DEFAULT_MAX_CELLS_PER_REQUEST: usize = 100;

/// Smallest accepted cell size. Keeps every index within `i32`.
const MIN_CELL_SIZE: f64 = 1.0e-6;

/// Slack, in cell units, absorbing representation error of decimal degrees.
const INDEX_EPSILON: f64 = 1.0e-9;

const LAT_LIMIT: f64 = 90.0;
const LON_LIMIT: f64 = 180.0;

/// Identifier of one grid cell.
///
/// # Examples
///
/// ```
/// use mirador_core::GeoCell;
///
/// let cell: GeoCell = "460,-7408".parse().expect("valid key");
/// assert_eq!(cell, GeoCell::new(460, -7408));
/// assert_eq!(cell.to_string(), "460,-7408");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeoCell {
    lat_index: i32,
    lon_index: i32,
}

impl GeoCell {
    /// Construct a cell from its indices.
    #[must_use]
    pub const fn new(lat_index: i32, lon_index: i32) -> Self {
        Self {
            lat_index,
            lon_index,
        }
    }

    /// Row index along latitude.
    #[must_use]
    pub const fn lat_index(self) -> i32 {
        self.lat_index
    }

    /// Column index along longitude.
    #[must_use]
    pub const fn lon_index(self) -> i32 {
        self.lon_index
    }

    /// The persisted key, `"{lat_index},{lon_index}"`.
    #[must_use]
    pub fn key(self) -> String {
        self.to_string()
    }

    /// The 4-adjacent neighbours (north, south, east, west).
    pub fn neighbours(self) -> impl Iterator<Item = Self> {
        [(1, 0), (-1, 0), (0, 1), (0, -1)]
            .into_iter()
            .filter_map(move |(d_lat, d_lon)| {
                Some(Self::new(
                    self.lat_index.checked_add(d_lat)?,
                    self.lon_index.checked_add(d_lon)?,
                ))
            })
    }
}

impl fmt::Display for GeoCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat_index, self.lon_index)
    }
}

/// Errors raised when parsing a persisted cell key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeoCellParseError {
    /// The key was not of the form `"lat,lon"`.
    #[error("cell key {key:?} is not of the form \"lat,lon\"")]
    Malformed {
        /// Offending key.
        key: String,
    },
    /// One of the indices was not an integer.
    #[error("cell key {key:?} has a non-integer index: {source}")]
    InvalidIndex {
        /// Offending key.
        key: String,
        /// Underlying integer parsing failure.
        #[source]
        source: ParseIntError,
    },
}

impl FromStr for GeoCell {
    type Err = GeoCellParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s.split_once(',').ok_or_else(|| GeoCellParseError::Malformed {
            key: s.to_owned(),
        })?;
        let parse = |value: &str| {
            value
                .trim()
                .parse::<i32>()
                .map_err(|source| GeoCellParseError::InvalidIndex {
                    key: s.to_owned(),
                    source,
                })
        };
        Ok(Self::new(parse(lat)?, parse(lon)?))
    }
}

/// Errors raised when configuring a [`Grid`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// The cell size was not a finite number at least `min`.
    #[error("cell size must be a finite number of at least {min} degrees, got {cell_size}")]
    InvalidCellSize {
        /// Rejected size.
        cell_size: f64,
        /// Smallest accepted size.
        min: f64,
    },
    /// The per-request ceiling was zero.
    #[error("max_cells_per_request must be positive")]
    ZeroRequestLimit,
}

/// Reasons [`Grid::try_cells_covering`] declines to enumerate a box.
#[derive(Debug, Error)]
pub enum CoverageError {
    /// The box spans more cells than a single request may cover.
    #[error("box spans about {estimate} cells, above the limit of {limit}")]
    TooManyCells {
        /// Estimated number of covering cells.
        estimate: u64,
        /// Configured ceiling.
        limit: usize,
    },
    /// One of the bounds was NaN or infinite.
    #[error("bounding box has non-finite bounds")]
    NonFinite,
    /// The cell list could not be allocated.
    #[error("failed to allocate the covering cell list")]
    Allocation(#[from] TryReserveError),
}

/// Grid geometry and request guard.
///
/// # Examples
///
/// ```
/// use mirador_core::{BoundingBox, Grid};
///
/// let grid = Grid::default();
/// let cells = grid.cells_covering(&BoundingBox::new(4.60, 4.61, -74.08, -74.07));
/// assert_eq!(cells.len(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    cell_size: f64,
    max_cells_per_request: usize,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            max_cells_per_request: DEFAULT_MAX_CELLS_PER_REQUEST,
        }
    }
}

impl Grid {
    /// Build a grid with the given cell size and the default request guard.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidCellSize`] when `cell_size` is not finite or
    /// is smaller than one micro-degree.
    pub fn new(cell_size: f64) -> Result<Self, GridError> {
        if !cell_size.is_finite() || cell_size < MIN_CELL_SIZE {
            return Err(GridError::InvalidCellSize {
                cell_size,
                min: MIN_CELL_SIZE,
            });
        }
        Ok(Self {
            cell_size,
            ..Self::default()
        })
    }

    /// Override the request guard.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ZeroRequestLimit`] when `limit` is zero.
    pub const fn with_max_cells_per_request(mut self, limit: usize) -> Result<Self, GridError> {
        if limit == 0 {
            return Err(GridError::ZeroRequestLimit);
        }
        self.max_cells_per_request = limit;
        Ok(self)
    }

    /// Edge length of a cell in degrees.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Ceiling on the number of cells one box may span.
    #[must_use]
    pub const fn max_cells_per_request(&self) -> usize {
        self.max_cells_per_request
    }

    /// Snap a coordinate down to the nearest grid line.
    #[must_use]
    pub fn align_to_grid(&self, coord: f64) -> f64 {
        f64::from(self.floor_index(coord)) * self.cell_size
    }

    /// The cell containing a point.
    #[must_use]
    pub fn cell_containing(&self, lat: f64, lon: f64) -> GeoCell {
        GeoCell::new(self.floor_index(lat), self.floor_index(lon))
    }

    /// Persisted key of the cell containing a point.
    #[must_use]
    pub fn cell_key(&self, lat: f64, lon: f64) -> String {
        self.cell_containing(lat, lon).key()
    }

    /// Geographic extent of a cell.
    #[must_use]
    pub fn cell_bounds(&self, cell: GeoCell) -> BoundingBox {
        self.index_bounds(
            cell.lat_index(),
            cell.lat_index().saturating_add(1),
            cell.lon_index(),
            cell.lon_index().saturating_add(1),
        )
    }

    /// Box spanning the index ranges `[lat_start, lat_end)` and
    /// `[lon_start, lon_end)`.
    #[must_use]
    pub fn index_bounds(
        &self,
        lat_start: i32,
        lat_end: i32,
        lon_start: i32,
        lon_end: i32,
    ) -> BoundingBox {
        BoundingBox::new(
            f64::from(lat_start) * self.cell_size,
            f64::from(lat_end) * self.cell_size,
            f64::from(lon_start) * self.cell_size,
            f64::from(lon_end) * self.cell_size,
        )
    }

    /// Estimated cell count, `ceil(Δlat / size) * ceil(Δlon / size)`, after
    /// clamping the box to valid coordinates.
    #[must_use]
    pub fn estimate_cell_count(&self, bbox: &BoundingBox) -> u64 {
        let clamped = clamp_to_world(bbox);
        let rows = self.span_in_cells(clamped.max_lat() - clamped.min_lat());
        let cols = self.span_in_cells(clamped.max_lon() - clamped.min_lon());
        rows.saturating_mul(cols)
    }

    /// Whether the request guard lets `bbox` be enumerated.
    #[must_use]
    pub fn accepts(&self, bbox: &BoundingBox) -> bool {
        let limit = u64::try_from(self.max_cells_per_request).unwrap_or(u64::MAX);
        bbox.is_finite() && self.estimate_cell_count(bbox) <= limit
    }

    /// All cells intersecting the box, row-major from the south-west corner.
    ///
    /// Returns an empty list when the box is refused by the request guard or
    /// has non-finite bounds. Use [`Grid::try_cells_covering`] to learn why.
    #[must_use]
    pub fn cells_covering(&self, bbox: &BoundingBox) -> Vec<GeoCell> {
        self.try_cells_covering(bbox).unwrap_or_else(|err| {
            log::debug!("not enumerating cells for {bbox}: {err}");
            Vec::new()
        })
    }

    /// Enumerate covering cells, reporting why enumeration was refused.
    ///
    /// # Errors
    ///
    /// [`CoverageError::NonFinite`] for NaN or infinite bounds,
    /// [`CoverageError::TooManyCells`] when the estimate exceeds the request
    /// guard and [`CoverageError::Allocation`] when the result list cannot be
    /// reserved.
    pub fn try_cells_covering(&self, bbox: &BoundingBox) -> Result<Vec<GeoCell>, CoverageError> {
        if !bbox.is_finite() {
            return Err(CoverageError::NonFinite);
        }
        if !self.accepts(bbox) {
            return Err(CoverageError::TooManyCells {
                estimate: self.estimate_cell_count(bbox),
                limit: self.max_cells_per_request,
            });
        }
        let (rows, cols) = self.index_ranges(bbox);

        let mut cells = Vec::new();
        cells.try_reserve_exact(rows.len().saturating_mul(cols.len()))?;
        for lat_index in rows {
            for lon_index in cols.clone() {
                cells.push(GeoCell::new(lat_index, lon_index));
            }
        }
        Ok(cells)
    }

    /// Split a box into cell-aligned tiles that each pass the request guard.
    ///
    /// Tiles are square blocks of `floor(sqrt(max_cells_per_request))` cells
    /// per side, trimmed at the north and east edges. Returns an empty list
    /// for non-finite boxes. Check [`Grid::partition_len`] first when the box
    /// may be arbitrarily large.
    #[must_use]
    pub fn partition(&self, bbox: &BoundingBox) -> Vec<BoundingBox> {
        if !bbox.is_finite() {
            return Vec::new();
        }
        let side = tile_side(self.max_cells_per_request);
        let (rows, cols) = self.index_ranges(bbox);

        let mut tiles = Vec::new();
        for row in rows.clone().step_by(side) {
            let row_end = row.saturating_add(step(side)).min(rows.end);
            for col in cols.clone().step_by(side) {
                let col_end = col.saturating_add(step(side)).min(cols.end);
                tiles.push(self.index_bounds(row, row_end, col, col_end));
            }
        }
        tiles
    }

    /// Number of tiles [`Grid::partition`] would return, computed without
    /// building them.
    #[must_use]
    pub fn partition_len(&self, bbox: &BoundingBox) -> usize {
        if !bbox.is_finite() {
            return 0;
        }
        let side = tile_side(self.max_cells_per_request);
        let (rows, cols) = self.index_ranges(bbox);
        rows.len()
            .div_ceil(side)
            .saturating_mul(cols.len().div_ceil(side))
    }

    /// Row and column index ranges of the cells intersecting `bbox` after
    /// clamping it to the world.
    fn index_ranges(&self, bbox: &BoundingBox) -> (Range<i32>, Range<i32>) {
        let clamped = clamp_to_world(bbox);
        (
            self.index_range(clamped.min_lat(), clamped.max_lat(), LAT_LIMIT),
            self.index_range(clamped.min_lon(), clamped.max_lon(), LON_LIMIT),
        )
    }

    /// Cells from the one holding `min` up to, but excluding, the grid line at
    /// or above `max`. A degenerate span still covers the cell holding `min`.
    /// Never extends past the grid line at `limit`.
    fn index_range(&self, min: f64, max: f64, limit: f64) -> Range<i32> {
        let world_end = self.ceil_index(limit);
        let end = self.ceil_index(max).min(world_end);
        let start = self.floor_index(min).min(world_end.saturating_sub(1));
        if end <= start {
            start..start.saturating_add(1)
        } else {
            start..end
        }
    }

    fn floor_index(&self, coord: f64) -> i32 {
        to_index((coord / self.cell_size + INDEX_EPSILON).floor())
    }

    fn ceil_index(&self, coord: f64) -> i32 {
        to_index((coord / self.cell_size - INDEX_EPSILON).ceil())
    }

    fn span_in_cells(&self, span: f64) -> u64 {
        let cells = (span / self.cell_size - INDEX_EPSILON).ceil();
        if cells <= 0.0 {
            0
        } else {
            // Bounded by the clamped world extent over MIN_CELL_SIZE.
            cells as u64
        }
    }
}

/// Snap a coordinate to the default grid.
///
/// ```
/// use mirador_core::align_to_grid;
///
/// assert!((align_to_grid(-74.015) - -74.02).abs() < 1.0e-9);
/// ```
#[must_use]
pub fn align_to_grid(coord: f64) -> f64 {
    Grid::default().align_to_grid(coord)
}

/// Key of the default-grid cell containing a point.
#[must_use]
pub fn cell_key(lat: f64, lon: f64) -> String {
    Grid::default().cell_key(lat, lon)
}

fn clamp_to_world(bbox: &BoundingBox) -> BoundingBox {
    BoundingBox::new(
        bbox.min_lat().clamp(-LAT_LIMIT, LAT_LIMIT),
        bbox.max_lat().clamp(-LAT_LIMIT, LAT_LIMIT),
        bbox.min_lon().clamp(-LON_LIMIT, LON_LIMIT),
        bbox.max_lon().clamp(-LON_LIMIT, LON_LIMIT),
    )
}

fn to_index(value: f64) -> i32 {
    // Float-to-int casts saturate; MIN_CELL_SIZE keeps real inputs in range.
    value as i32
}

fn tile_side(max_cells: usize) -> usize {
    max_cells.isqrt().max(1)
}

fn step(side: usize) -> i32 {
    i32::try_from(side).unwrap_or(i32::MAX)
}
