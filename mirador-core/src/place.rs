//! Places shown on the map.
//!
//! A [`Place`] is a named point with display metadata. Its `kind` is a free
//! string because the geodata provider reports settlements and amenities the
//! app has no dedicated variant for; [`PlaceKind`] covers the tourist
//! categories the map styles specially.

use std::{collections::HashMap, fmt, str::FromStr};

use geo::Coord;

/// OpenStreetMap-style tag map.
pub type Tags = HashMap<String, String>;

/// Source label for places downloaded from the Overpass API.
pub const DEFAULT_SOURCE: &str = "overpass";

/// A place stored locally and drawn on the map.
///
/// `location` uses WGS84 with `x = longitude` and `y = latitude`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Place {
    /// Stable identifier, `osm_{type}_{id}` for Overpass elements.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Category such as `museum`, `city` or an OSM amenity value.
    pub kind: String,
    /// Position of the place.
    pub location: Coord<f64>,
    /// Human-readable summary.
    pub description: Option<String>,
    /// Postal address.
    pub address: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Website URL.
    pub website: Option<String>,
    /// Opening hours in OSM syntax.
    pub opening_hours: Option<String>,
    /// Provider the place came from.
    pub source: String,
    /// Milliseconds since the Unix epoch at download time.
    pub last_updated_ms: i64,
    /// Whether the user starred the place.
    pub is_favorite: bool,
}

impl Place {
    /// Construct a place with no optional metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// use geo::Coord;
    /// use mirador_core::Place;
    ///
    /// let place = Place::new("osm_node_1", "Museo del Oro", "museum", Coord { x: -74.0721, y: 4.6019 });
    /// assert_eq!(place.lat(), 4.6019);
    /// assert_eq!(place.source, "overpass");
    /// ```
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<String>,
        location: Coord<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            location,
            description: None,
            address: None,
            phone: None,
            website: None,
            opening_hours: None,
            source: DEFAULT_SOURCE.to_owned(),
            last_updated_ms: 0,
            is_favorite: false,
        }
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.location.y
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn lon(&self) -> f64 {
        self.location.x
    }

    /// Tourist category, if `kind` names one.
    #[must_use]
    pub fn tourist_kind(&self) -> Option<PlaceKind> {
        self.kind.parse().ok()
    }
}

/// Tourist categories recognised from OSM tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PlaceKind {
    /// `tourism=museum`.
    Museum,
    /// `tourism=monument` or `historic=monument`.
    Monument,
    /// `tourism=attraction`.
    Attraction,
    /// `tourism=artwork`.
    Artwork,
    /// `tourism=viewpoint`.
    Viewpoint,
    /// `leisure=park`.
    Park,
    /// `tourism=gallery`.
    Gallery,
    /// `tourism=zoo`.
    Zoo,
    /// `tourism=theme_park`.
    ThemePark,
    /// `historic=statue`.
    Statue,
    /// `historic=castle`.
    Castle,
    /// `historic=ruins`.
    Ruins,
}

impl PlaceKind {
    /// Every variant in display order.
    pub const ALL: [Self; 12] = [
        Self::Museum,
        Self::Monument,
        Self::Attraction,
        Self::Artwork,
        Self::Viewpoint,
        Self::Park,
        Self::Gallery,
        Self::Zoo,
        Self::ThemePark,
        Self::Statue,
        Self::Castle,
        Self::Ruins,
    ];

    /// Stored identifier, e.g. `theme_park`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Museum => "museum",
            Self::Monument => "monument",
            Self::Attraction => "attraction",
            Self::Artwork => "artwork",
            Self::Viewpoint => "viewpoint",
            Self::Park => "park",
            Self::Gallery => "gallery",
            Self::Zoo => "zoo",
            Self::ThemePark => "theme_park",
            Self::Statue => "statue",
            Self::Castle => "castle",
            Self::Ruins => "ruins",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Museum => "Museum",
            Self::Monument => "Monument",
            Self::Attraction => "Attraction",
            Self::Artwork => "Artwork",
            Self::Viewpoint => "Viewpoint",
            Self::Park => "Park",
            Self::Gallery => "Gallery",
            Self::Zoo => "Zoo",
            Self::ThemePark => "Theme park",
            Self::Statue => "Statue",
            Self::Castle => "Castle",
            Self::Ruins => "Ruins",
        }
    }

    /// Classify OSM tags. `tourism` wins over `leisure`, which wins over
    /// `historic`.
    ///
    /// ```
    /// use mirador_core::{PlaceKind, Tags};
    ///
    /// let tags = Tags::from([("historic".to_owned(), "castle".to_owned())]);
    /// assert_eq!(PlaceKind::from_tags(&tags), Some(PlaceKind::Castle));
    /// ```
    #[must_use]
    pub fn from_tags(tags: &Tags) -> Option<Self> {
        let tag = |key: &str| tags.get(key).map(String::as_str);
        let tourism = match tag("tourism") {
            Some("museum") => Some(Self::Museum),
            Some("monument") => Some(Self::Monument),
            Some("attraction") => Some(Self::Attraction),
            Some("artwork") => Some(Self::Artwork),
            Some("viewpoint") => Some(Self::Viewpoint),
            Some("gallery") => Some(Self::Gallery),
            Some("zoo") => Some(Self::Zoo),
            Some("theme_park") => Some(Self::ThemePark),
            _ => None,
        };
        tourism
            .or_else(|| (tag("leisure") == Some("park")).then_some(Self::Park))
            .or_else(|| match tag("historic") {
                Some("monument") => Some(Self::Monument),
                Some("statue") => Some(Self::Statue),
                Some("castle") => Some(Self::Castle),
                Some("ruins") => Some(Self::Ruins),
                _ => None,
            })
    }
}

impl fmt::Display for PlaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown place kind: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[rstest]
    #[case(&[("tourism", "museum")], Some(PlaceKind::Museum))]
    #[case(&[("tourism", "theme_park")], Some(PlaceKind::ThemePark))]
    #[case(&[("leisure", "park")], Some(PlaceKind::Park))]
    #[case(&[("historic", "monument")], Some(PlaceKind::Monument))]
    #[case(&[("historic", "ruins")], Some(PlaceKind::Ruins))]
    #[case(&[("tourism", "hotel")], None)]
    #[case(&[("amenity", "cafe")], None)]
    fn classifies_tourist_tags(#[case] pairs: &[(&str, &str)], #[case] expected: Option<PlaceKind>) {
        assert_eq!(PlaceKind::from_tags(&tags(pairs)), expected);
    }

    #[rstest]
    fn tourism_takes_precedence_over_historic() {
        let both = tags(&[("tourism", "attraction"), ("historic", "castle")]);
        assert_eq!(PlaceKind::from_tags(&both), Some(PlaceKind::Attraction));
    }

    #[rstest]
    fn kinds_round_trip_through_their_identifier() {
        for kind in PlaceKind::ALL {
            assert_eq!(kind.as_str().parse::<PlaceKind>(), Ok(kind));
        }
        assert!("city".parse::<PlaceKind>().is_err());
    }

    #[rstest]
    fn tourist_kind_reads_the_kind_string() {
        let place = Place::new("osm_node_1", "Mirador", "viewpoint", Coord { x: 0.0, y: 0.0 });
        assert_eq!(place.tourist_kind(), Some(PlaceKind::Viewpoint));
    }
}
