//! Data access for the Mirador places map.
//!
//! Responsibilities:
//! - Talk to the Overpass API ([`overpass`]).
//! - Orchestrate viewport downloads against the viewport cache, the offline
//!   area and the local place store ([`repository`]).
//!
//! Boundaries:
//! - Cache geometry and offline-area rules live in `mirador-core`.
//! - Network calls block on an internal runtime; the public API is
//!   synchronous.
//!
//! Invariants:
//! - No global mutable state; every collaborator is injected.

pub mod overpass;
pub mod repository;

pub use overpass::{OverpassBuildError, OverpassFetcher, OverpassFetcherConfig};
pub use repository::{
    CacheInfo, DEFAULT_MAX_PRELOAD_TILES, DownloadReport, PlacesRepository, RepositoryError,
    SyncOutcome,
};
