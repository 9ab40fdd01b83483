//! Remote geodata collaborators.
//!
//! [`PlaceFetcher`] downloads places for a rectangular region or a name
//! search. [`Connectivity`] reports whether the network is worth trying. Both
//! are synchronous so the cache and repository stay usable from plain
//! threads; HTTP implementations block internally.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::{BoundingBox, Place};

/// Errors from [`PlaceFetcher`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Endpoint that timed out.
        url: String,
        /// Timeout that elapsed, in seconds.
        timeout_secs: u64,
    },
    /// The provider answered with a non-success status.
    #[error("request to {url} failed with HTTP {status}: {message}")]
    Http {
        /// Endpoint that failed.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },
    /// The provider could not be reached.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Endpoint that failed.
        url: String,
        /// Error description.
        message: String,
    },
    /// The response body could not be decoded.
    #[error("failed to parse provider response: {message}")]
    Parse {
        /// Error description.
        message: String,
    },
}

/// Name search sent to a [`PlaceFetcher`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceSearch {
    /// Places whose name matches, within `radius_meters` of a point.
    Around {
        /// Case-insensitive name fragment.
        name: String,
        /// Search centre latitude.
        lat: f64,
        /// Search centre longitude.
        lon: f64,
        /// Search radius in metres.
        radius_meters: f64,
        /// Maximum number of results.
        limit: usize,
    },
    /// Places whose name matches, anywhere.
    Global {
        /// Case-insensitive name fragment.
        name: String,
        /// Maximum number of results.
        limit: usize,
    },
}

/// Downloads places from a remote provider.
///
/// # Examples
///
/// ```
/// use mirador_core::{BoundingBox, FetchError, Place, PlaceFetcher, PlaceSearch};
///
/// struct NothingThere;
///
/// impl PlaceFetcher for NothingThere {
///     fn fetch_places(&self, _bbox: &BoundingBox) -> Result<Vec<Place>, FetchError> {
///         Ok(Vec::new())
///     }
///
///     fn search_places(&self, _search: &PlaceSearch) -> Result<Vec<Place>, FetchError> {
///         Ok(Vec::new())
///     }
/// }
///
/// let bbox = BoundingBox::new(4.60, 4.61, -74.08, -74.07);
/// assert!(NothingThere.fetch_places(&bbox)?.is_empty());
/// # Ok::<(), FetchError>(())
/// ```
pub trait PlaceFetcher {
    /// Every place of interest inside `bbox`.
    fn fetch_places(&self, bbox: &BoundingBox) -> Result<Vec<Place>, FetchError>;

    /// Places matching a name search.
    fn search_places(&self, search: &PlaceSearch) -> Result<Vec<Place>, FetchError>;
}

impl<T> PlaceFetcher for &T
where
    T: PlaceFetcher + ?Sized,
{
    fn fetch_places(&self, bbox: &BoundingBox) -> Result<Vec<Place>, FetchError> {
        (**self).fetch_places(bbox)
    }

    fn search_places(&self, search: &PlaceSearch) -> Result<Vec<Place>, FetchError> {
        (**self).search_places(search)
    }
}

impl<T> PlaceFetcher for Box<T>
where
    T: PlaceFetcher + ?Sized,
{
    fn fetch_places(&self, bbox: &BoundingBox) -> Result<Vec<Place>, FetchError> {
        (**self).fetch_places(bbox)
    }

    fn search_places(&self, search: &PlaceSearch) -> Result<Vec<Place>, FetchError> {
        (**self).search_places(search)
    }
}

/// Reports whether network requests should be attempted.
pub trait Connectivity {
    /// `true` when the device believes it is online.
    fn is_online(&self) -> bool;
}

/// Connectivity toggled explicitly by the host application.
///
/// ```
/// use mirador_core::{Connectivity, ConnectivityFlag};
///
/// let flag = ConnectivityFlag::new(true);
/// flag.set_online(false);
/// assert!(!flag.is_online());
/// ```
#[derive(Debug)]
pub struct ConnectivityFlag(AtomicBool);

impl ConnectivityFlag {
    /// Create a flag with an initial state.
    #[must_use]
    pub const fn new(online: bool) -> Self {
        Self(AtomicBool::new(online))
    }

    /// Update the state.
    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::Relaxed);
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl<T> Connectivity for &T
where
    T: Connectivity + ?Sized,
{
    fn is_online(&self) -> bool {
        (**self).is_online()
    }
}
