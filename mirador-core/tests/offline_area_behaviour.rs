//! Behavioural tests for the offline area manager.

use std::cell::RefCell;

use mirador_core::{
    BoundingBox, DEFAULT_MAX_RADIUS, MemorySettingsStore, OfflineAreaManager, RADIUS_METROPOLIS,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

const BOGOTA: (f64, f64) = (4.7110, -74.0721);
const MADRID: (f64, f64) = (40.4168, -3.7038);

fn madrid_viewport() -> BoundingBox {
    BoundingBox::new(40.41, 40.42, -3.71, -3.70)
}

/// World state for offline area scenarios.
#[derive(Debug, Default)]
struct OfflineWorld {
    manager: RefCell<Option<OfflineAreaManager<MemorySettingsStore>>>,
}

impl OfflineWorld {
    fn read<T>(&self, f: impl FnOnce(&OfflineAreaManager<MemorySettingsStore>) -> T) -> T {
        let borrowed = self.manager.borrow();
        f(borrowed.as_ref().expect("manager must be initialised"))
    }

    fn write<T>(&self, f: impl FnOnce(&mut OfflineAreaManager<MemorySettingsStore>) -> T) -> T {
        let mut borrowed = self.manager.borrow_mut();
        f(borrowed.as_mut().expect("manager must be initialised"))
    }
}

#[fixture]
fn world() -> OfflineWorld {
    OfflineWorld::default()
}

#[given("an unconfigured offline area")]
fn unconfigured(world: &OfflineWorld) {
    world
        .manager
        .replace(Some(OfflineAreaManager::new(MemorySettingsStore::default())));
}

#[given("an offline area centred on Bogotá with the default radius")]
fn bogota(world: &OfflineWorld) {
    let mut manager = OfflineAreaManager::new(MemorySettingsStore::default());
    manager
        .set_offline_center(BOGOTA.0, BOGOTA.1)
        .expect("valid centre");
    world.manager.replace(Some(manager));
}

#[when("the radius is set to the metropolis preset")]
fn metropolis(world: &OfflineWorld) {
    world
        .write(|manager| manager.set_max_radius(RADIUS_METROPOLIS))
        .expect("valid radius");
}

#[when("the offline area is cleared")]
fn cleared(world: &OfflineWorld) {
    world.write(OfflineAreaManager::clear_offline_area);
}

#[then("a point in Madrid is within the offline area")]
fn madrid_within(world: &OfflineWorld) {
    assert!(world.read(|manager| manager.is_within_offline_area(MADRID.0, MADRID.1)));
}

#[then("a viewport over Madrid is returned unchanged by clipping")]
fn madrid_unclipped(world: &OfflineWorld) {
    let viewport = madrid_viewport();
    let clipped = world.read(|manager| manager.clip_to_offline_area(&viewport));
    assert_eq!(clipped, Some(viewport));
}

#[then("a point 22 km north of the centre is outside the offline area")]
fn north_outside(world: &OfflineWorld) {
    assert!(!world.read(|manager| manager.is_within_offline_area(BOGOTA.0 + 0.2, BOGOTA.1)));
}

#[then("a point 22 km north of the centre is within the offline area")]
fn north_within(world: &OfflineWorld) {
    assert!(world.read(|manager| manager.is_within_offline_area(BOGOTA.0 + 0.2, BOGOTA.1)));
}

#[then("a viewport straddling the boundary is clipped to the offline bounds")]
fn straddling_clipped(world: &OfflineWorld) {
    world.read(|manager| {
        let bounds = manager.offline_area_bounds().expect("configured area");
        let straddling = BoundingBox::new(4.80, 4.95, -74.075, -74.07);
        let clipped = manager
            .clip_to_offline_area(&straddling)
            .expect("partial overlap");
        assert_eq!(clipped.min_lat(), 4.80);
        assert_eq!(clipped.max_lat(), bounds.max_lat());
        assert_eq!(clipped.min_lon(), -74.075);
        assert_eq!(clipped.max_lon(), -74.07);
        assert!(manager.is_box_within_offline_area(&clipped));
    });
}

#[then("a viewport over Medellín is clipped away entirely")]
fn medellin_clipped_away(world: &OfflineWorld) {
    let medellin = BoundingBox::new(6.20, 6.30, -75.60, -75.50);
    assert_eq!(world.read(|manager| manager.clip_to_offline_area(&medellin)), None);
}

#[then("the offline area is unconfigured with the default radius")]
fn defaults_restored(world: &OfflineWorld) {
    world.read(|manager| {
        assert!(!manager.is_configured());
        assert_eq!(manager.max_radius(), DEFAULT_MAX_RADIUS);
        assert_eq!(manager.offline_area_bounds(), None);
    });
}

#[scenario(path = "tests/features/offline_area.feature", index = 0)]
fn unconfigured_fails_open(world: OfflineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/offline_area.feature", index = 1)]
fn bogota_bounds_requests(world: OfflineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/offline_area.feature", index = 2)]
fn metropolis_widens(world: OfflineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/offline_area.feature", index = 3)]
fn clearing_restores_defaults(world: OfflineWorld) {
    let _ = world;
}
