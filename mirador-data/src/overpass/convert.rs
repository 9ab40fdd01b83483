//! Conversion of Overpass elements into [`Place`] records.

use geo::Coord;
use mirador_core::{Place, PlaceKind, Tags};

use super::response::OverpassElement;

/// Tags consulted for a display name, in order of preference.
const NAME_TAGS: [&str; 3] = ["name", "name:es", "name:en"];

/// Build a place from an element, or `None` when it has no tags, no name or
/// no usable position.
#[must_use]
pub fn element_to_place(element: &OverpassElement, downloaded_at_ms: i64) -> Option<Place> {
    let tags = element.tags.as_ref()?;
    let name = NAME_TAGS.iter().find_map(|key| tags.get(*key))?;
    let (lat, lon) = element.position()?;
    if !(lat.is_finite() && lon.is_finite()) {
        return None;
    }

    let kind = place_kind(tags);
    let mut place = Place::new(
        format!("osm_{}_{}", element.kind, element.id),
        name.clone(),
        kind.clone(),
        Coord { x: lon, y: lat },
    );
    place.description = Some(describe(tags, &kind));
    place.address = address(tags);
    place.phone = first_tag(tags, &["phone", "contact:phone"]);
    place.website = first_tag(tags, &["website", "contact:website"]);
    place.opening_hours = tags.get("opening_hours").cloned();
    place.last_updated_ms = downloaded_at_ms;
    Some(place)
}

fn first_tag(tags: &Tags, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| tags.get(*key)).cloned()
}

/// Tourist category, else settlement type, else amenity, else `shop`, else
/// `place`.
fn place_kind(tags: &Tags) -> String {
    if let Some(kind) = PlaceKind::from_tags(tags) {
        return kind.as_str().to_owned();
    }
    if let Some(place) = tags.get("place") {
        return place.clone();
    }
    if let Some(amenity) = tags.get("amenity") {
        return amenity.clone();
    }
    if tags.contains_key("shop") {
        return "shop".to_owned();
    }
    "place".to_owned()
}

fn kind_label(kind: &str) -> String {
    if let Ok(tourist) = kind.parse::<PlaceKind>() {
        return tourist.label().to_owned();
    }
    match kind {
        "city" => "City".to_owned(),
        "town" => "Town".to_owned(),
        "village" => "Village".to_owned(),
        "hamlet" => "Hamlet".to_owned(),
        other => capitalise(other),
    }
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Kind label followed by whatever descriptive tags are present, joined with
/// `" • "`.
fn describe(tags: &Tags, kind: &str) -> String {
    const DETAILS: [(&str, &str); 7] = [
        ("description", ""),
        ("description:es", ""),
        ("population", "Population: "),
        ("heritage", "Heritage: "),
        ("artist", "Artist: "),
        ("architect", "Architect: "),
        ("start_date", "Year: "),
    ];
    let mut parts = vec![kind_label(kind)];
    parts.extend(DETAILS.iter().filter_map(|(key, prefix)| {
        tags.get(*key).map(|value| format!("{prefix}{value}"))
    }));
    if let Some(elevation) = tags.get("ele") {
        parts.push(format!("Elevation: {elevation} m"));
    }
    parts.join(" • ")
}

/// `street housenumber, city, state, country`, else `addr:full`.
fn address(tags: &Tags) -> Option<String> {
    let street = match (tags.get("addr:street"), tags.get("addr:housenumber")) {
        (Some(street), Some(number)) => Some(format!("{street} {number}")),
        (Some(street), None) => Some(street.clone()),
        (None, number) => number.cloned(),
    };
    let parts: Vec<String> = street
        .into_iter()
        .chain(
            ["addr:city", "addr:state", "addr:country"]
                .iter()
                .filter_map(|key| tags.get(*key).cloned()),
        )
        .collect();
    if parts.is_empty() {
        tags.get("addr:full").cloned()
    } else {
        Some(parts.join(", "))
    }
}
