//! Offline area: a home location plus the radius worth downloading.
//!
//! The area is a circle for containment and distance queries and its
//! bounding rectangle for clipping fetch requests. An area centred exactly on
//! `(0.0, 0.0)` counts as unconfigured, in which case every query fails open:
//! all points are inside and clipping returns its input unchanged.

use std::f64::consts::PI;

use geo::{Distance, Geodesic, Point};
use thiserror::Error;

use crate::{
    BoundingBox,
    settings::{SettingsStore, keys},
};

/// Radius preset for a small city, in metres.
pub const RADIUS_SMALL_CITY: f64 = 5_000.0;
/// Radius preset for a medium city, in metres.
pub const RADIUS_MEDIUM_CITY: f64 = 15_000.0;
/// Radius preset for a large city, in metres.
pub const RADIUS_LARGE_CITY: f64 = 30_000.0;
/// Radius preset for a metropolis, in metres.
pub const RADIUS_METROPOLIS: f64 = 50_000.0;
/// Radius used until one is configured.
pub const DEFAULT_MAX_RADIUS: f64 = RADIUS_MEDIUM_CITY;

const METERS_PER_DEGREE: f64 = 111_000.0;

/// Geodesic distance in metres between two points on the WGS84 ellipsoid.
///
/// ```
/// use mirador_core::distance_meters;
///
/// let one_degree = distance_meters(0.0, 0.0, 1.0, 0.0);
/// assert!((one_degree - 110_574.0).abs() < 1.0);
/// ```
#[must_use]
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Geodesic.distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}

/// Rejected offline area settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OfflineAreaError {
    /// The centre was outside valid WGS84 ranges or not finite.
    #[error("invalid offline centre ({lat}, {lon})")]
    InvalidCenter {
        /// Rejected latitude.
        lat: f64,
        /// Rejected longitude.
        lon: f64,
    },
    /// The radius was not a positive finite number of metres.
    #[error("offline radius must be a positive number of metres, got {meters}")]
    InvalidRadius {
        /// Rejected radius.
        meters: f64,
    },
}

/// Snapshot of the offline area for display.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OfflineAreaInfo {
    /// Centre latitude, `0.0` when unconfigured.
    pub center_lat: f64,
    /// Centre longitude, `0.0` when unconfigured.
    pub center_lon: f64,
    /// Radius in metres.
    pub radius_meters: f64,
    /// Whether a centre has been set.
    pub is_configured: bool,
    /// Area of the circle, `π (r / 1000)^2`.
    pub approximate_area_km2: f64,
}

/// Owner of the offline centre and radius.
///
/// Setters take `&mut self`; share the manager behind a lock when several
/// threads need it.
#[derive(Debug)]
pub struct OfflineAreaManager<S> {
    store: S,
    center_lat: f64,
    center_lon: f64,
    max_radius: f64,
}

impl<S: SettingsStore> OfflineAreaManager<S> {
    /// Restore the area from `store`, falling back to an unconfigured area
    /// with the default radius for missing or unusable values.
    pub fn new(store: S) -> Self {
        let center_lat = load_or(&store, keys::CENTER_LAT, 0.0, |lat| {
            (-90.0..=90.0).contains(&lat)
        });
        let center_lon = load_or(&store, keys::CENTER_LON, 0.0, |lon| {
            (-180.0..=180.0).contains(&lon)
        });
        let max_radius = load_or(&store, keys::MAX_RADIUS, DEFAULT_MAX_RADIUS, |r| r > 0.0);
        Self {
            store,
            center_lat,
            center_lon,
            max_radius,
        }
    }

    /// Set and persist the home location.
    ///
    /// # Errors
    ///
    /// Returns [`OfflineAreaError::InvalidCenter`] for non-finite or
    /// out-of-range coordinates; the previous centre is kept.
    pub fn set_offline_center(&mut self, lat: f64, lon: f64) -> Result<(), OfflineAreaError> {
        if !(lat.is_finite() && lon.is_finite())
            || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lon)
        {
            return Err(OfflineAreaError::InvalidCenter { lat, lon });
        }
        self.center_lat = lat;
        self.center_lon = lon;
        self.persist(keys::CENTER_LAT, lat);
        self.persist(keys::CENTER_LON, lon);
        log::debug!("offline centre set to ({lat}, {lon})");
        Ok(())
    }

    /// Set and persist the radius in metres.
    ///
    /// # Errors
    ///
    /// Returns [`OfflineAreaError::InvalidRadius`] unless `meters` is positive
    /// and finite.
    pub fn set_max_radius(&mut self, meters: f64) -> Result<(), OfflineAreaError> {
        if !meters.is_finite() || meters <= 0.0 {
            return Err(OfflineAreaError::InvalidRadius { meters });
        }
        self.max_radius = meters;
        self.persist(keys::MAX_RADIUS, meters);
        Ok(())
    }

    /// Centre as `(lat, lon)`, `None` when unconfigured.
    pub fn center(&self) -> Option<(f64, f64)> {
        self.is_configured()
            .then_some((self.center_lat, self.center_lon))
    }

    /// Radius in metres.
    pub const fn max_radius(&self) -> f64 {
        self.max_radius
    }

    /// Whether a centre has been set.
    pub fn is_configured(&self) -> bool {
        self.center_lat != 0.0 || self.center_lon != 0.0
    }

    /// Whether a point lies within the radius. Always `true` when
    /// unconfigured.
    pub fn is_within_offline_area(&self, lat: f64, lon: f64) -> bool {
        !self.is_configured() || self.distance_from_center(lat, lon) <= self.max_radius
    }

    /// Whether all four corners of `bbox` lie within the radius.
    ///
    /// Only the corners are tested; a box whose edge bulges past the circle
    /// between corners still counts as inside.
    pub fn is_box_within_offline_area(&self, bbox: &BoundingBox) -> bool {
        bbox.corners()
            .iter()
            .all(|&(lat, lon)| self.is_within_offline_area(lat, lon))
    }

    /// Rectangle enclosing the offline circle, `None` when unconfigured.
    ///
    /// Uses `111 km` per degree and scales longitude by `cos(center_lat)`.
    /// Bounds are clamped to valid coordinates.
    pub fn offline_area_bounds(&self) -> Option<BoundingBox> {
        if !self.is_configured() {
            return None;
        }
        let lat_offset = self.max_radius / METERS_PER_DEGREE;
        let lon_offset = self.max_radius / (METERS_PER_DEGREE * self.center_lat.to_radians().cos());
        Some(BoundingBox::new(
            (self.center_lat - lat_offset).max(-90.0),
            (self.center_lat + lat_offset).min(90.0),
            (self.center_lon - lon_offset).max(-180.0),
            (self.center_lon + lon_offset).min(180.0),
        ))
    }

    /// Restrict `bbox` to the offline rectangle.
    ///
    /// Returns `bbox` unchanged when unconfigured and `None` when the overlap
    /// has no area.
    ///
    /// The rectangle encloses the circle, so a wide result can keep corners
    /// outside the radius.
    pub fn clip_to_offline_area(&self, bbox: &BoundingBox) -> Option<BoundingBox> {
        match self.offline_area_bounds() {
            Some(bounds) => bbox.intersection(&bounds),
            None => Some(*bbox),
        }
    }

    /// Geodesic distance in metres from the centre, `0.0` when unconfigured.
    pub fn distance_from_center(&self, lat: f64, lon: f64) -> f64 {
        if self.is_configured() {
            distance_meters(self.center_lat, self.center_lon, lat, lon)
        } else {
            0.0
        }
    }

    /// Display snapshot of the current configuration.
    pub fn offline_area_info(&self) -> OfflineAreaInfo {
        let radius_km = self.max_radius / 1000.0;
        OfflineAreaInfo {
            center_lat: self.center_lat,
            center_lon: self.center_lon,
            radius_meters: self.max_radius,
            is_configured: self.is_configured(),
            approximate_area_km2: PI * radius_km * radius_km,
        }
    }

    /// Reset to an unconfigured area with the default radius and remove the
    /// persisted values.
    pub fn clear_offline_area(&mut self) {
        self.center_lat = 0.0;
        self.center_lon = 0.0;
        self.max_radius = DEFAULT_MAX_RADIUS;
        for key in [keys::CENTER_LAT, keys::CENTER_LON, keys::MAX_RADIUS] {
            if let Err(err) = self.store.remove(key) {
                log::warn!("failed to remove offline setting {key}: {err}");
            }
        }
    }

    fn persist(&mut self, key: &str, value: f64) {
        if let Err(err) = self.store.store_f64(key, value) {
            log::warn!("failed to persist offline setting {key}: {err}");
        }
    }
}

fn load_or<S, F>(store: &S, key: &str, default: f64, valid: F) -> f64
where
    S: SettingsStore,
    F: Fn(f64) -> bool,
{
    match store.load_f64(key) {
        Ok(Some(value)) if value.is_finite() && valid(value) => value,
        Ok(Some(value)) => {
            log::warn!("ignoring persisted offline setting {key}={value}");
            default
        }
        Ok(None) => default,
        Err(err) => {
            log::warn!("failed to load offline setting {key}: {err}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySettingsStore, test_support::FailingSettingsStore};
    use rstest::{fixture, rstest};

    const BOGOTA: (f64, f64) = (4.7110, -74.0721);

    #[fixture]
    fn bogota() -> OfflineAreaManager<MemorySettingsStore> {
        let mut manager = OfflineAreaManager::new(MemorySettingsStore::default());
        manager
            .set_offline_center(BOGOTA.0, BOGOTA.1)
            .expect("valid centre");
        manager
    }

    #[rstest]
    fn unconfigured_area_fails_open() {
        let manager = OfflineAreaManager::new(MemorySettingsStore::default());
        let anywhere = BoundingBox::new(40.0, 41.0, -3.0, -2.0);
        assert!(!manager.is_configured());
        assert!(manager.is_within_offline_area(40.4, -3.7));
        assert!(manager.is_box_within_offline_area(&anywhere));
        assert_eq!(manager.clip_to_offline_area(&anywhere), Some(anywhere));
        assert_eq!(manager.offline_area_bounds(), None);
        assert_eq!(manager.distance_from_center(40.4, -3.7), 0.0);
        assert_eq!(manager.max_radius(), DEFAULT_MAX_RADIUS);
    }

    #[rstest]
    fn bounds_follow_the_degree_approximation(bogota: OfflineAreaManager<MemorySettingsStore>) {
        let bounds = bogota.offline_area_bounds().expect("configured");
        let lat_offset = 15_000.0 / 111_000.0;
        let lon_offset = 15_000.0 / (111_000.0 * BOGOTA.0.to_radians().cos());
        assert!((bounds.min_lat() - (BOGOTA.0 - lat_offset)).abs() < 1.0e-12);
        assert!((bounds.max_lat() - (BOGOTA.0 + lat_offset)).abs() < 1.0e-12);
        assert!((bounds.min_lon() - (BOGOTA.1 - lon_offset)).abs() < 1.0e-12);
        assert!((bounds.max_lon() - (BOGOTA.1 + lon_offset)).abs() < 1.0e-12);
    }

    #[rstest]
    fn clipping_keeps_the_overlap(bogota: OfflineAreaManager<MemorySettingsStore>) {
        let bounds = bogota.offline_area_bounds().expect("configured");
        let straddling = BoundingBox::new(4.5, 5.0, -74.3, -74.0);
        let clipped = bogota
            .clip_to_offline_area(&straddling)
            .expect("overlap exists");
        assert_eq!(clipped.min_lat(), bounds.min_lat());
        assert_eq!(clipped.max_lat(), bounds.max_lat());
        assert_eq!(clipped.min_lon(), bounds.min_lon());
        assert_eq!(clipped.max_lon(), -74.0);
    }

    #[rstest]
    fn clipped_narrow_strip_has_every_corner_inside(
        bogota: OfflineAreaManager<MemorySettingsStore>,
    ) {
        let strip = BoundingBox::new(4.80, 4.95, -74.075, -74.07);
        assert!(!bogota.is_box_within_offline_area(&strip));
        let clipped = bogota.clip_to_offline_area(&strip).expect("overlap exists");
        assert!(clipped.max_lat() < strip.max_lat());
        assert!(bogota.is_box_within_offline_area(&clipped));
    }

    #[rstest]
    fn clipped_wide_box_can_leave_corners_outside(
        bogota: OfflineAreaManager<MemorySettingsStore>,
    ) {
        let wide = BoundingBox::new(4.80, 4.95, -74.10, -74.05);
        let clipped = bogota.clip_to_offline_area(&wide).expect("overlap exists");
        let (north_lat, west_lon) = (clipped.max_lat(), clipped.min_lon());
        assert!(bogota.distance_from_center(north_lat, west_lon) > DEFAULT_MAX_RADIUS);
        assert!(!bogota.is_box_within_offline_area(&clipped));
    }

    #[rstest]
    fn clipping_a_distant_box_yields_none(bogota: OfflineAreaManager<MemorySettingsStore>) {
        let medellin = BoundingBox::new(6.2, 6.3, -75.6, -75.5);
        assert_eq!(bogota.clip_to_offline_area(&medellin), None);
    }

    #[rstest]
    fn containment_uses_geodesic_distance(bogota: OfflineAreaManager<MemorySettingsStore>) {
        assert!(bogota.is_within_offline_area(BOGOTA.0, BOGOTA.1));
        // About 11 km north.
        assert!(bogota.is_within_offline_area(BOGOTA.0 + 0.1, BOGOTA.1));
        // About 22 km north.
        assert!(!bogota.is_within_offline_area(BOGOTA.0 + 0.2, BOGOTA.1));
    }

    #[rstest]
    fn box_containment_checks_only_corners(bogota: OfflineAreaManager<MemorySettingsStore>) {
        let inner = BoundingBox::new(4.68, 4.74, -74.10, -74.04);
        assert!(bogota.is_box_within_offline_area(&inner));
        let outer = BoundingBox::new(4.5, 4.9, -74.3, -73.9);
        assert!(!bogota.is_box_within_offline_area(&outer));
    }

    #[rstest]
    fn settings_survive_a_restart() {
        let store = MemorySettingsStore::default();
        let mut manager = OfflineAreaManager::new(store.clone());
        manager.set_offline_center(BOGOTA.0, BOGOTA.1).expect("centre");
        manager.set_max_radius(RADIUS_LARGE_CITY).expect("radius");

        let restored = OfflineAreaManager::new(store);
        assert_eq!(restored.center(), Some(BOGOTA));
        assert_eq!(restored.max_radius(), RADIUS_LARGE_CITY);
    }

    #[rstest]
    fn malformed_persisted_values_fall_back_to_defaults() {
        let mut store = MemorySettingsStore::default();
        store.store_f64(keys::MAX_RADIUS, -5.0).expect("seed radius");
        store.store_f64(keys::CENTER_LAT, f64::NAN).expect("seed lat");
        let manager = OfflineAreaManager::new(store);
        assert_eq!(manager.max_radius(), DEFAULT_MAX_RADIUS);
        assert!(!manager.is_configured());
    }

    #[rstest]
    fn clear_resets_and_removes_persisted_keys(
        mut bogota: OfflineAreaManager<MemorySettingsStore>,
    ) {
        bogota.set_max_radius(RADIUS_METROPOLIS).expect("radius");
        let store = bogota.store.clone();
        bogota.clear_offline_area();
        assert!(!bogota.is_configured());
        assert_eq!(bogota.max_radius(), DEFAULT_MAX_RADIUS);
        for key in [keys::CENTER_LAT, keys::CENTER_LON, keys::MAX_RADIUS] {
            assert!(!store.contains_key(key), "{key} still persisted");
        }
    }

    #[rstest]
    fn info_reports_circle_area(bogota: OfflineAreaManager<MemorySettingsStore>) {
        let info = bogota.offline_area_info();
        assert!(info.is_configured);
        assert_eq!(info.radius_meters, DEFAULT_MAX_RADIUS);
        assert!((info.approximate_area_km2 - PI * 225.0).abs() < 1.0e-9);
    }

    #[rstest]
    #[case(f64::NAN, 0.0)]
    #[case(91.0, 0.0)]
    #[case(0.0, -181.0)]
    fn rejects_invalid_centres(#[case] lat: f64, #[case] lon: f64) {
        let mut manager = OfflineAreaManager::new(MemorySettingsStore::default());
        assert!(matches!(
            manager.set_offline_center(lat, lon),
            Err(OfflineAreaError::InvalidCenter { .. })
        ));
        assert!(!manager.is_configured());
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f64::INFINITY)]
    fn rejects_invalid_radii(#[case] meters: f64) {
        let mut manager = OfflineAreaManager::new(MemorySettingsStore::default());
        assert!(manager.set_max_radius(meters).is_err());
        assert_eq!(manager.max_radius(), DEFAULT_MAX_RADIUS);
    }

    #[rstest]
    fn persistence_failures_keep_the_in_memory_value() {
        let mut manager = OfflineAreaManager::new(FailingSettingsStore);
        manager.set_offline_center(BOGOTA.0, BOGOTA.1).expect("centre");
        assert_eq!(manager.center(), Some(BOGOTA));
    }
}
