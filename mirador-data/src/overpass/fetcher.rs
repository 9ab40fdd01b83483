//! Blocking [`PlaceFetcher`] backed by the Overpass API.
//!
//! The [`PlaceFetcher`] trait is synchronous so the viewport cache and the
//! repository stay usable from plain threads. [`OverpassFetcher`] bridges to
//! the async `reqwest` client by blocking on a Tokio runtime it owns.

use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use mirador_core::{BoundingBox, FetchError, Place, PlaceFetcher, PlaceSearch};
use reqwest::Client;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use url::Url;

use super::{
    convert::element_to_place,
    query::{global_search_query, incremental_search_query, optimal_query},
    response::OverpassResponse,
};

/// Public Overpass instance used when no endpoint is configured.
pub const DEFAULT_BASE_URL: &str = "https://overpass-api.de";

/// Default user agent for Overpass requests.
pub const DEFAULT_USER_AGENT: &str = "mirador-overpass/0.1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Path of the query endpoint below the base URL.
const INTERPRETER_PATH: &str = "api/interpreter";

/// Errors raised while constructing an [`OverpassFetcher`].
#[derive(Debug, Error)]
pub enum OverpassBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// The base URL could not be parsed.
    #[error("invalid Overpass base URL {url:?}: {source}")]
    InvalidUrl {
        /// Rejected URL.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
}

/// Configuration for [`OverpassFetcher`].
#[derive(Debug, Clone)]
pub struct OverpassFetcherConfig {
    /// Base URL of the Overpass instance, e.g. `"https://overpass-api.de"`.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for OverpassFetcherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl OverpassFetcherConfig {
    /// Configuration for the given base URL with default timeout and agent.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Full URL of the interpreter endpoint.
    fn interpreter_url(&self) -> Result<Url, OverpassBuildError> {
        let invalid = |source| OverpassBuildError::InvalidUrl {
            url: self.base_url.clone(),
            source,
        };
        let mut base = Url::parse(&self.base_url).map_err(invalid)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(INTERPRETER_PATH).map_err(invalid)
    }
}

/// Overpass API client implementing [`PlaceFetcher`].
///
/// # Runtime behaviour
///
/// Outside any Tokio runtime the fetcher blocks on its own current-thread
/// runtime. Inside a multi-threaded runtime it uses that runtime's handle
/// with [`tokio::task::block_in_place`]. Inside a `current_thread` runtime it
/// falls back to its own runtime, which may deadlock if the caller's runtime
/// drives IO this request depends on.
///
/// ```no_run
/// use mirador_core::{BoundingBox, PlaceFetcher};
/// use mirador_data::overpass::OverpassFetcher;
///
/// let fetcher = OverpassFetcher::new("https://overpass-api.de")?;
/// let places = fetcher.fetch_places(&BoundingBox::new(4.60, 4.61, -74.08, -74.07))?;
/// println!("{} places", places.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct OverpassFetcher {
    client: Client,
    endpoint: Url,
    config: OverpassFetcherConfig,
    runtime: Runtime,
}

impl fmt::Debug for OverpassFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverpassFetcher")
            .field("endpoint", &self.endpoint.as_str())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OverpassFetcher {
    /// Create a fetcher with default timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client or Tokio
    /// runtime fails to build.
    pub fn new(base_url: impl Into<String>) -> Result<Self, OverpassBuildError> {
        Self::with_config(OverpassFetcherConfig::new(base_url))
    }

    /// Create a fetcher with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client or Tokio
    /// runtime fails to build.
    pub fn with_config(config: OverpassFetcherConfig) -> Result<Self, OverpassBuildError> {
        let endpoint = config.interpreter_url()?;
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(OverpassBuildError::HttpClient)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(OverpassBuildError::Runtime)?;
        Ok(Self {
            client,
            endpoint,
            config,
            runtime,
        })
    }

    /// Interpreter endpoint queries are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    async fn post_query(&self, query: String) -> Result<OverpassResponse, FetchError> {
        let url = self.endpoint.as_str();
        log::debug!("posting Overpass query to {url}:\n{query}");
        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&[("data", query)])
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(&err, url))?;

        let body: OverpassResponse = response.json().await.map_err(|err| FetchError::Parse {
            message: err.to_string(),
        })?;
        if let Some(remark) = &body.remark {
            log::warn!("Overpass remark: {remark}");
        }
        Ok(body)
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &str) -> FetchError {
        if error.is_timeout() {
            return FetchError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return FetchError::Http {
                url: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        FetchError::Network {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }

    /// Run `query` and convert every usable element.
    fn run(&self, query: String) -> Result<Vec<Place>, FetchError> {
        let future = self.post_query(query);
        let response = match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            _ => self.runtime.block_on(future),
        }?;
        let downloaded_at = now_millis();
        let places: Vec<Place> = response
            .elements
            .iter()
            .filter_map(|element| element_to_place(element, downloaded_at))
            .collect();
        log::debug!(
            "Overpass returned {} elements, {} usable places",
            response.elements.len(),
            places.len()
        );
        Ok(places)
    }
}

impl PlaceFetcher for OverpassFetcher {
    fn fetch_places(&self, bbox: &BoundingBox) -> Result<Vec<Place>, FetchError> {
        self.run(optimal_query(bbox))
    }

    fn search_places(&self, search: &PlaceSearch) -> Result<Vec<Place>, FetchError> {
        let query = match search {
            PlaceSearch::Around {
                name,
                lat,
                lon,
                radius_meters,
                limit,
            } => incremental_search_query(name, *lat, *lon, whole_meters(*radius_meters), *limit),
            PlaceSearch::Global { name, limit } => global_search_query(name, *limit),
        };
        self.run(query)
    }
}

/// Radius rounded to whole metres; negative and NaN radii become zero.
fn whole_meters(radius: f64) -> u32 {
    // Float-to-int `as` saturates.
    radius.round() as u32
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
