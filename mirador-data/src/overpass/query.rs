//! Overpass QL query builders.
//!
//! Every query asks for JSON and ends with `out center`, so ways and
//! relations come back with a centre coordinate the converter can use.

use mirador_core::BoundingBox;

/// Area above which [`optimal_query`] switches to the light query.
pub const LIGHT_QUERY_THRESHOLD_KM2: f64 = 25.0;

/// Element filters of the full tourist query, in output order.
const TOURIST_FILTERS: &[(&str, &str)] = &[
    ("node", r#"["tourism"="museum"]"#),
    ("way", r#"["tourism"="museum"]"#),
    ("relation", r#"["tourism"="museum"]"#),
    ("node", r#"["tourism"="monument"]"#),
    ("way", r#"["tourism"="monument"]"#),
    ("node", r#"["historic"="monument"]"#),
    ("way", r#"["historic"="monument"]"#),
    ("node", r#"["tourism"="attraction"]"#),
    ("way", r#"["tourism"="attraction"]"#),
    ("node", r#"["tourism"="artwork"]"#),
    ("way", r#"["tourism"="artwork"]"#),
    ("node", r#"["historic"="statue"]"#),
    ("way", r#"["historic"="statue"]"#),
    ("node", r#"["tourism"="viewpoint"]"#),
    ("node", r#"["leisure"="park"]"#),
    ("way", r#"["leisure"="park"]"#),
    ("relation", r#"["leisure"="park"]"#),
    ("node", r#"["tourism"="gallery"]"#),
    ("way", r#"["tourism"="gallery"]"#),
    ("node", r#"["tourism"="zoo"]"#),
    ("way", r#"["tourism"="zoo"]"#),
    ("node", r#"["tourism"="theme_park"]"#),
    ("way", r#"["tourism"="theme_park"]"#),
    ("node", r#"["historic"="castle"]"#),
    ("way", r#"["historic"="castle"]"#),
    ("node", r#"["historic"="ruins"]"#),
    ("way", r#"["historic"="ruins"]"#),
];

/// Node filters of the light query.
const LIGHT_FILTERS: &[&str] = &[
    r#"["tourism"="museum"]"#,
    r#"["tourism"="monument"]"#,
    r#"["tourism"="attraction"]"#,
    r#"["historic"="monument"]"#,
    r#"["leisure"="park"]"#,
];

/// Overpass bounding box filter: `south,west,north,east`.
fn bbox_filter(bbox: &BoundingBox) -> String {
    format!(
        "{},{},{},{}",
        bbox.min_lat(),
        bbox.min_lon(),
        bbox.max_lat(),
        bbox.max_lon()
    )
}

fn union(timeout_secs: u32, statements: impl IntoIterator<Item = String>, out: &str) -> String {
    let mut query = format!("[out:json][timeout:{timeout_secs}];\n(\n");
    for statement in statements {
        query.push_str("  ");
        query.push_str(&statement);
        query.push_str(";\n");
    }
    query.push_str(");\n");
    query.push_str(out);
    query.push(';');
    query
}

/// Escape a name for use inside a quoted Overpass regex.
fn escape_name(name: &str) -> String {
    name.replace('"', "\\\"")
}

/// Every tourist category inside `bbox`, including ways and relations.
///
/// ```
/// use mirador_core::BoundingBox;
/// use mirador_data::overpass::query::tourist_places_query;
///
/// let query = tourist_places_query(&BoundingBox::new(4.60, 4.61, -74.08, -74.07));
/// assert!(query.starts_with("[out:json][timeout:60];"));
/// assert!(query.contains(r#"node["tourism"="museum"](4.6,-74.08,4.61,-74.07);"#));
/// ```
#[must_use]
pub fn tourist_places_query(bbox: &BoundingBox) -> String {
    let area = bbox_filter(bbox);
    union(
        60,
        TOURIST_FILTERS
            .iter()
            .map(|(element, filter)| format!("{element}{filter}({area})")),
        "out center",
    )
}

/// Headline categories inside `bbox`, nodes only.
#[must_use]
pub fn light_tourist_places_query(bbox: &BoundingBox) -> String {
    let area = bbox_filter(bbox);
    union(
        30,
        LIGHT_FILTERS
            .iter()
            .map(|filter| format!("node{filter}({area})")),
        "out center",
    )
}

/// The light query for boxes larger than [`LIGHT_QUERY_THRESHOLD_KM2`], the
/// full query otherwise.
#[must_use]
pub fn optimal_query(bbox: &BoundingBox) -> String {
    if bbox.approximate_area_km2() > LIGHT_QUERY_THRESHOLD_KM2 {
        light_tourist_places_query(bbox)
    } else {
        tourist_places_query(bbox)
    }
}

/// Tourist nodes within `radius_meters` of a point.
#[must_use]
pub fn around_point_query(lat: f64, lon: f64, radius_meters: u32) -> String {
    let around = format!("around:{radius_meters},{lat},{lon}");
    union(
        30,
        [
            format!(
                r#"node["tourism"~"^(museum|monument|attraction|artwork|viewpoint|gallery|zoo|theme_park)$"]({around})"#
            ),
            format!(r#"node["historic"~"^(monument|statue|castle|ruins)$"]({around})"#),
            format!(r#"node["leisure"="park"]({around})"#),
        ],
        "out center",
    )
}

/// Named tourist sites, parks, settlements and amenities anywhere.
#[must_use]
pub fn global_search_query(name: &str, limit: usize) -> String {
    let name = format!(r#"["name"~"{}",i]"#, escape_name(name));
    union(
        30,
        [
            format!(r#"node["tourism"]{name}"#),
            format!(r#"way["tourism"]{name}"#),
            format!(r#"relation["tourism"]{name}"#),
            format!(r#"node["historic"]{name}"#),
            format!(r#"way["historic"]{name}"#),
            format!(r#"node["leisure"="park"]{name}"#),
            format!(r#"way["leisure"="park"]{name}"#),
            format!(r#"node["place"~"^(city|town|village|hamlet)$"]{name}"#),
            format!(r#"node{name}["amenity"]"#),
            format!(r#"way{name}["amenity"]"#),
        ],
        &format!("out center {limit}"),
    )
}

/// Any named element within `radius_meters` of a point.
#[must_use]
pub fn incremental_search_query(
    name: &str,
    lat: f64,
    lon: f64,
    radius_meters: u32,
    limit: usize,
) -> String {
    let name = format!(r#"["name"~"{}",i]"#, escape_name(name));
    let around = format!("around:{radius_meters},{lat},{lon}");
    union(
        30,
        [
            format!("node{name}({around})"),
            format!("way{name}({around})"),
            format!(r#"node["place"]{name}({around})"#),
        ],
        &format!("out center {limit}"),
    )
}
