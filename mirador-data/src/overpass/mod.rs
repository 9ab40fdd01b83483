//! Overpass API integration.
//!
//! [`OverpassFetcher`] implements [`mirador_core::PlaceFetcher`] by posting
//! Overpass QL queries built by [`query`] and converting the returned
//! elements into places.
//!
//! ```no_run
//! use std::time::Duration;
//! use mirador_data::overpass::{OverpassFetcher, OverpassFetcherConfig};
//!
//! let config = OverpassFetcherConfig::new("https://overpass-api.de")
//!     .with_timeout(Duration::from_secs(60))
//!     .with_user_agent("my-app/1.0");
//! let fetcher = OverpassFetcher::with_config(config)?;
//! # Ok::<(), mirador_data::overpass::OverpassBuildError>(())
//! ```

mod convert;
mod fetcher;
pub mod query;
mod response;

pub use convert::element_to_place;
pub use fetcher::{
    DEFAULT_BASE_URL, DEFAULT_USER_AGENT, OverpassBuildError, OverpassFetcher,
    OverpassFetcherConfig,
};
pub use response::{ElementCenter, OverpassElement, OverpassResponse};
