//! Overpass JSON response types.
//!
//! See: <https://wiki.openstreetmap.org/wiki/Overpass_API/Output_Formats#JSON>

use std::collections::HashMap;

use serde::Deserialize;

/// Top-level Overpass response.
#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    /// Matched elements. Missing when the query produced nothing.
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
    /// Runtime diagnostics such as a query timeout.
    pub remark: Option<String>,
}

/// A node, way or relation.
#[derive(Debug, Deserialize)]
pub struct OverpassElement {
    /// `node`, `way` or `relation`.
    #[serde(rename = "type")]
    pub kind: String,
    /// OSM id, unique per element type.
    pub id: i64,
    /// Node latitude.
    pub lat: Option<f64>,
    /// Node longitude.
    pub lon: Option<f64>,
    /// Centre of a way or relation, present with `out center`.
    pub center: Option<ElementCenter>,
    /// OSM tags.
    pub tags: Option<HashMap<String, String>>,
}

/// Centre coordinate reported for ways and relations.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ElementCenter {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

impl OverpassElement {
    /// Node position, else the reported centre, as `(lat, lon)`.
    #[must_use]
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => self.center.map(|center| (center.lat, center.lon)),
        }
    }
}
