//! TMDB v3 API client.
//!
//! Provides a client for The Movie Database with rate limiting, request
//! validation, and response normalization.
//!
//! ### Behavior
//!
//! - **Endpoint**: `https://api.themoviedb.org/3`
//! - **Authentication**: `api_key` query parameter, sent with `language` on every call.
//! - **Rate Limiting**: minimum interval between API calls (50ms default).
//! - **Normalization**: list endpoints become `MediaPage`; people are dropped from multi search.
//! - **Images**: `{image_base_url}/{size}{poster_path}`, fetched without the API key.

pub mod error;
pub mod request;
pub mod response;

pub use error::TmdbError;
pub use request::{MAX_PAGE, MAX_QUERY_CHARS, MediaType, validate_language, validate_page, validate_query};
pub use response::{
    AggregatedResults, Episode, Genre, MediaDetails, MediaPage, MediaSummary, MovieDetails, SeasonDetails,
    SeasonSummary, TvDetails,
};

use async_trait::async_trait;
use cinedex_core::AppConfig;
use cinedex_core::cache::{FetchedImage, ImageSource};
use reqwest::header;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Default base URL for the TMDB API.
const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

const DEFAULT_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "cinedex/0.1";

/// Minimum interval between API requests.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(50);

/// TMDB client configuration.
#[derive(Debug, Clone)]
pub struct TmdbConfig {
    /// API key from CINEDEX_TMDB_API_KEY.
    pub api_key: String,
    /// Base URL (default: https://api.themoviedb.org/3).
    pub base_url: String,
    /// Response language (default: en-US).
    pub language: String,
    /// Request timeout (default: 15s).
    pub timeout: Duration,
    /// User-agent string.
    pub user_agent: String,
    pub image_base_url: String,
    pub poster_size: String,
    pub min_interval: Duration,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            language: "en-US".to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            poster_size: "w342".to_string(),
            min_interval: MIN_REQUEST_INTERVAL,
        }
    }
}

impl TmdbConfig {
    /// Build from application config. Fails when no API key is set.
    pub fn from_app(config: &AppConfig) -> Result<Self, TmdbError> {
        let api_key = config.require_tmdb_api_key().map_err(|_| TmdbError::MissingApiKey)?;

        Ok(Self {
            api_key: api_key.to_string(),
            language: config.language.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            image_base_url: config.image_base_url.trim_end_matches('/').to_string(),
            poster_size: config.poster_size.clone(),
            ..Default::default()
        })
    }
}

/// The catalog operations the rest of the crate needs from TMDB.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Popular movies or shows, one page.
    async fn popular(&self, media: MediaType, page: u32) -> Result<MediaPage, TmdbError>;

    /// Movies and shows matching `query`, one page.
    async fn search_multi(&self, query: &str, page: u32) -> Result<MediaPage, TmdbError>;

    async fn details(&self, media: MediaType, id: i64) -> Result<MediaDetails, TmdbError>;

    async fn season(&self, tv_id: i64, season: u32) -> Result<SeasonDetails, TmdbError>;

    /// Absolute poster URL for a `poster_path`.
    fn poster_url(&self, poster_path: &str) -> String;
}

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(Instant::now().checked_sub(min_interval).unwrap_or_else(Instant::now)),
            min_interval,
        }
    }

    /// Acquire permission to make a request, waiting if necessary.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < self.min_interval {
            tokio::time::sleep(self.min_interval - elapsed).await;
        }
        *last = Instant::now();
    }
}

/// TMDB API client.
#[derive(Debug, Clone)]
pub struct TmdbClient {
    http: reqwest::Client,
    config: TmdbConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl TmdbClient {
    /// Create a new client with the given configuration.
    pub fn new(config: TmdbConfig) -> Result<Self, TmdbError> {
        if config.api_key.trim().is_empty() {
            return Err(TmdbError::MissingApiKey);
        }
        validate_language(&config.language)?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TmdbError::Network(Arc::new(e)))?;

        let rate_limiter = Arc::new(RateLimiter::new(config.min_interval));
        Ok(Self { http, config, rate_limiter })
    }

    pub fn from_app(config: &AppConfig) -> Result<Self, TmdbError> {
        Self::new(TmdbConfig::from_app(config)?)
    }

    pub fn config(&self) -> &TmdbConfig {
        &self.config
    }

    /// GET `{base_url}{path}` with key, language and extra params, decoded as `T`.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T, TmdbError> {
        self.rate_limiter.acquire().await;

        let start = Instant::now();
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        tracing::debug!(path, "requesting TMDB");

        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .query(&[("api_key", self.config.api_key.as_str()), ("language", self.config.language.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(path, status = status.as_u16(), "TMDB response");

        if status == 401 {
            return Err(TmdbError::Auth);
        }

        if status == 404 {
            return Err(TmdbError::NotFound(path.to_string()));
        }

        if status == 429 {
            return Err(TmdbError::RateLimited);
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(TmdbError::Http { status: status.as_u16() });
        }

        let bytes = response.bytes().await?;
        let decoded = serde_json::from_slice(&bytes).map_err(|e| TmdbError::Parse(e.to_string()))?;

        tracing::debug!(path, elapsed = ?start.elapsed(), "TMDB request completed");
        Ok(decoded)
    }
}

#[async_trait]
impl CatalogApi for TmdbClient {
    async fn popular(&self, media: MediaType, page: u32) -> Result<MediaPage, TmdbError> {
        validate_page(page)?;
        let path = format!("/{}/popular", media.as_path());
        let raw = self.get_json(&path, &[("page", page.to_string())]).await?;
        Ok(MediaPage::from_raw(raw, Some(media)))
    }

    async fn search_multi(&self, query: &str, page: u32) -> Result<MediaPage, TmdbError> {
        let query = validate_query(query)?;
        validate_page(page)?;
        let params = [("query", query.to_string()), ("page", page.to_string()), ("include_adult", "false".into())];
        let raw = self.get_json("/search/multi", &params).await?;
        Ok(MediaPage::from_raw(raw, None))
    }

    async fn details(&self, media: MediaType, id: i64) -> Result<MediaDetails, TmdbError> {
        let path = format!("/{}/{id}", media.as_path());
        Ok(match media {
            MediaType::Movie => MediaDetails::Movie(self.get_json(&path, &[]).await?),
            MediaType::Tv => MediaDetails::Tv(self.get_json(&path, &[]).await?),
        })
    }

    async fn season(&self, tv_id: i64, season: u32) -> Result<SeasonDetails, TmdbError> {
        self.get_json(&format!("/tv/{tv_id}/season/{season}"), &[]).await
    }

    fn poster_url(&self, poster_path: &str) -> String {
        let path = if poster_path.starts_with('/') { poster_path.to_string() } else { format!("/{poster_path}") };
        format!("{}/{}{}", self.config.image_base_url, self.config.poster_size, path)
    }
}

#[async_trait]
impl ImageSource for TmdbClient {
    async fn fetch_image(&self, url: &str) -> Result<FetchedImage, cinedex_core::Error> {
        let response = self.http.get(url).send().await.map_err(TmdbError::from)?;

        let status = response.status();
        if status == 404 {
            return Err(TmdbError::NotFound(url.to_string()).into());
        }
        if !status.is_success() {
            return Err(TmdbError::Http { status: status.as_u16() }.into());
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(TmdbError::from)?;

        tracing::debug!(url, bytes = bytes.len(), "fetched image");
        Ok(FetchedImage { bytes, content_type })
    }
}
