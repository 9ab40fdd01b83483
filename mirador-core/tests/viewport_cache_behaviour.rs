//! Behavioural tests for the viewport cache.

use std::cell::RefCell;

use mirador_core::{BoundingBox, MemorySettingsStore, ViewportCache};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

const TOLERANCE: f64 = 1.0e-9;

fn city_centre() -> BoundingBox {
    BoundingBox::new(4.60, 4.61, -74.08, -74.07)
}

fn shifted_north() -> BoundingBox {
    BoundingBox::new(4.605, 4.615, -74.08, -74.07)
}

fn whole_degree() -> BoundingBox {
    BoundingBox::new(4.0, 5.0, -75.0, -74.0)
}

/// World state shared by the viewport cache scenarios.
#[derive(Debug, Default)]
struct CacheWorld {
    settings: MemorySettingsStore,
    cache: RefCell<Option<ViewportCache<MemorySettingsStore>>>,
    missing: RefCell<Vec<BoundingBox>>,
}

impl CacheWorld {
    fn with_cache<T>(&self, f: impl FnOnce(&ViewportCache<MemorySettingsStore>) -> T) -> T {
        let borrowed = self.cache.borrow();
        let cache = borrowed.as_ref().expect("cache must be initialised");
        f(cache)
    }
}

#[fixture]
fn world() -> CacheWorld {
    CacheWorld::default()
}

#[given("an empty viewport cache")]
fn empty_cache(world: &CacheWorld) {
    world
        .cache
        .replace(Some(ViewportCache::new(world.settings.clone())));
}

#[when("the city-centre viewport is marked as cached")]
fn mark_city_centre(world: &CacheWorld) {
    world.with_cache(|cache| cache.mark_area_as_cached(&city_centre()));
}

#[when("the shifted viewport is marked as cached")]
fn mark_shifted(world: &CacheWorld) {
    world.with_cache(|cache| cache.mark_area_as_cached(&shifted_north()));
}

#[when("a viewport spanning a whole degree is marked as cached")]
fn mark_whole_degree(world: &CacheWorld) {
    world.with_cache(|cache| cache.mark_area_as_cached(&whole_degree()));
}

#[when("missing areas are requested for the viewport shifted half a cell north")]
fn request_missing(world: &CacheWorld) {
    let missing = world.with_cache(|cache| cache.get_missing_areas(&shifted_north()));
    world.missing.replace(missing);
}

#[when("the viewport cache is reopened from its settings")]
fn reopen(world: &CacheWorld) {
    world
        .cache
        .replace(Some(ViewportCache::new(world.settings.clone())));
}

#[when("the cache is cleared")]
fn clear(world: &CacheWorld) {
    world.with_cache(ViewportCache::clear_cache);
}

#[then("the city-centre viewport is cached")]
fn city_centre_cached(world: &CacheWorld) {
    assert!(world.with_cache(|cache| cache.is_area_cached(&city_centre())));
}

#[then("the city-centre viewport is not cached")]
fn city_centre_not_cached(world: &CacheWorld) {
    assert!(!world.with_cache(|cache| cache.is_area_cached(&city_centre())));
}

#[then("the shifted viewport is cached")]
fn shifted_cached(world: &CacheWorld) {
    assert!(world.with_cache(|cache| cache.is_area_cached(&shifted_north())));
}

#[then("exactly one missing area starting at the northern edge is returned")]
fn one_missing_strip(world: &CacheWorld) {
    let missing = world.missing.borrow();
    assert_eq!(missing.len(), 1, "expected one missing box, got {missing:?}");
    let strip = missing.first().expect("one box present");
    assert!((strip.min_lat() - 4.61).abs() < TOLERANCE, "strip {strip}");
    assert!(strip.max_lat() >= 4.615 - TOLERANCE, "strip {strip}");
    assert!((strip.min_lon() - -74.08).abs() < TOLERANCE, "strip {strip}");
    assert!((strip.max_lon() - -74.07).abs() < TOLERANCE, "strip {strip}");
}

#[then("no missing areas remain for the shifted viewport")]
fn nothing_missing(world: &CacheWorld) {
    assert!(world.with_cache(|cache| cache.get_missing_areas(&shifted_north()).is_empty()));
}

#[then("the cache holds no cells")]
fn no_cells(world: &CacheWorld) {
    assert_eq!(world.with_cache(|cache| cache.cache_stats().cached_cells), 0);
}

#[then("the whole-degree viewport reports no missing areas")]
fn whole_degree_not_missing(world: &CacheWorld) {
    world.with_cache(|cache| {
        assert!(cache.get_missing_areas(&whole_degree()).is_empty());
        assert!(!cache.is_area_cached(&whole_degree()));
    });
}

#[scenario(path = "tests/features/viewport_cache.feature", index = 0)]
fn panning_reveals_one_strip(world: CacheWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/viewport_cache.feature", index = 1)]
fn caching_shifted_viewport(world: CacheWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/viewport_cache.feature", index = 2)]
fn oversized_viewport_refused(world: CacheWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/viewport_cache.feature", index = 3)]
fn cells_survive_restart(world: CacheWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/viewport_cache.feature", index = 4)]
fn clearing_forgets_cells(world: CacheWorld) {
    let _ = world;
}
