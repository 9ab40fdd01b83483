//! Axis-aligned latitude/longitude rectangles.

use std::{fmt, num::ParseFloatError, str::FromStr};

use geo::{Coord, Rect};
use thiserror::Error;

/// Kilometres covered by one degree of latitude.
const KM_PER_DEGREE: f64 = 111.0;

/// An axis-aligned geographic rectangle in WGS84 degrees.
///
/// Construction normalises the corners so that `min ≤ max` on both axes,
/// mirroring [`Rect::new`]. Boxes crossing the antimeridian are not modelled;
/// callers split such regions into two boxes.
///
/// # Examples
///
/// ```
/// use mirador_core::BoundingBox;
///
/// let bbox = BoundingBox::new(4.60, 4.61, -74.08, -74.07);
/// assert!(bbox.contains(4.605, -74.075));
/// assert!(!bbox.contains(4.62, -74.075));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl BoundingBox {
    /// Construct a box from its latitude and longitude extents.
    ///
    /// Swapped bounds are reordered rather than rejected. NaN bounds are kept
    /// as given so [`BoundingBox::is_finite`] can report them.
    #[must_use]
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        let (min_lat, max_lat) = ordered(min_lat, max_lat);
        let (min_lon, max_lon) = ordered(min_lon, max_lon);
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Southern edge in degrees.
    #[must_use]
    pub const fn min_lat(&self) -> f64 {
        self.min_lat
    }

    /// Northern edge in degrees.
    #[must_use]
    pub const fn max_lat(&self) -> f64 {
        self.max_lat
    }

    /// Western edge in degrees.
    #[must_use]
    pub const fn min_lon(&self) -> f64 {
        self.min_lon
    }

    /// Eastern edge in degrees.
    #[must_use]
    pub const fn max_lon(&self) -> f64 {
        self.max_lon
    }

    /// Whether every bound is a finite number.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        [self.min_lat, self.max_lat, self.min_lon, self.max_lon]
            .iter()
            .all(|value| value.is_finite())
    }

    /// Return `true` when the point lies inside the box. Edges are inclusive.
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }

    /// Return `true` when the boxes share at least one point. Touching edges
    /// count as an intersection.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !(other.max_lat < self.min_lat
            || other.min_lat > self.max_lat
            || other.max_lon < self.min_lon
            || other.min_lon > self.max_lon)
    }

    /// Rectangular intersection of two boxes.
    ///
    /// Returns `None` when the overlap is empty or collapses to a line or a
    /// point, since such a region has nothing to fetch.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let min_lat = self.min_lat.max(other.min_lat);
        let max_lat = self.max_lat.min(other.max_lat);
        let min_lon = self.min_lon.max(other.min_lon);
        let max_lon = self.max_lon.min(other.max_lon);
        if min_lat >= max_lat || min_lon >= max_lon {
            return None;
        }
        Some(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    /// The four corners as `(lat, lon)` pairs: SW, SE, NW, NE.
    #[must_use]
    pub const fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_lat, self.min_lon),
            (self.min_lat, self.max_lon),
            (self.max_lat, self.min_lon),
            (self.max_lat, self.max_lon),
        ]
    }

    /// Approximate surface area in square kilometres using an equirectangular
    /// projection at the box's mid-latitude.
    #[must_use]
    pub fn approximate_area_km2(&self) -> f64 {
        let mid_lat = (self.min_lat + self.max_lat) / 2.0;
        let lat_km = (self.max_lat - self.min_lat) * KM_PER_DEGREE;
        let lon_km = (self.max_lon - self.min_lon) * KM_PER_DEGREE * mid_lat.to_radians().cos();
        lat_km * lon_km
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        Self::new(rect.min().y, rect.max().y, rect.min().x, rect.max().x)
    }
}

impl From<BoundingBox> for Rect<f64> {
    fn from(bbox: BoundingBox) -> Self {
        Self::new(
            Coord {
                x: bbox.min_lon,
                y: bbox.min_lat,
            },
            Coord {
                x: bbox.max_lon,
                y: bbox.max_lat,
            },
        )
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lat, self.max_lat, self.min_lon, self.max_lon
        )
    }
}

/// Errors returned when parsing a [`BoundingBox`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundingBoxParseError {
    /// The input did not contain exactly four comma-separated values.
    #[error("expected min_lat,max_lat,min_lon,max_lon but found {found} value(s)")]
    WrongArity {
        /// Number of values present in the input.
        found: usize,
    },
    /// One of the values was not a number.
    #[error("invalid coordinate {value:?}: {source}")]
    InvalidNumber {
        /// Offending text.
        value: String,
        /// Underlying float parsing failure.
        #[source]
        source: ParseFloatError,
    },
    /// One of the values was NaN or infinite.
    #[error("bounding box coordinates must be finite")]
    NonFinite,
}

impl FromStr for BoundingBox {
    type Err = BoundingBoxParseError;

    /// Parse `"min_lat,max_lat,min_lon,max_lon"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [min_lat, max_lat, min_lon, max_lon] = parts.as_slice() else {
            return Err(BoundingBoxParseError::WrongArity { found: parts.len() });
        };
        let parse = |value: &str| {
            value
                .parse::<f64>()
                .map_err(|source| BoundingBoxParseError::InvalidNumber {
                    value: value.to_owned(),
                    source,
                })
        };
        let bbox = Self::new(
            parse(min_lat)?,
            parse(max_lat)?,
            parse(min_lon)?,
            parse(max_lon)?,
        );
        if !bbox.is_finite() {
            return Err(BoundingBoxParseError::NonFinite);
        }
        Ok(bbox)
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if b < a { (b, a) } else { (a, b) }
}
