//! Cache-through catalog loads.
//!
//! Every load checks the result cache first, calls TMDB on a miss, stores the
//! response and schedules poster preloading. API failures propagate; a cache
//! that cannot be written (quota exhausted even after eviction) only costs the
//! next load a network round trip.

use crate::tmdb::{
    AggregatedResults, CatalogApi, MediaDetails, MediaPage, MediaSummary, MediaType, SeasonDetails, TmdbError,
    validate_page, validate_query,
};
use cinedex_core::cache::{CacheKind, ImageCache, PreloadReport, ResultCache, normalize_term, search_query};
use cinedex_core::AppConfig;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// A loaded value and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Loaded<T> {
    pub value: T,
    pub from_cache: bool,
}

impl<T> Loaded<T> {
    fn cached(value: T) -> Self {
        Self { value, from_cache: true }
    }

    fn fetched(value: T) -> Self {
        Self { value, from_cache: false }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Schedule poster downloads after each load.
    pub preload_images: bool,
    /// Pages merged by `search_all`.
    pub max_search_pages: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self { preload_images: true, max_search_pages: 3 }
    }
}

impl CatalogConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self { preload_images: config.preload_images, max_search_pages: config.max_search_pages.max(1) }
    }
}

/// Catalog service over a TMDB API and the result/image caches.
#[derive(Clone)]
pub struct Catalog {
    api: Arc<dyn CatalogApi>,
    results: ResultCache,
    images: Option<ImageCache>,
    config: CatalogConfig,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("images", &self.images.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn listing_kind(media: MediaType) -> CacheKind {
    match media {
        MediaType::Movie => CacheKind::Movies,
        MediaType::Tv => CacheKind::Tv,
    }
}

impl Catalog {
    pub fn new(
        api: Arc<dyn CatalogApi>, results: ResultCache, images: Option<ImageCache>, config: CatalogConfig,
    ) -> Self {
        Self { api, results, images, config }
    }

    pub fn results(&self) -> &ResultCache {
        &self.results
    }

    pub fn images(&self) -> Option<&ImageCache> {
        self.images.as_ref()
    }

    /// Popular movies or shows, page `page`.
    pub async fn browse(&self, media: MediaType, page: u32) -> Result<Loaded<MediaPage>, TmdbError> {
        validate_page(page)?;
        let kind = listing_kind(media);
        let query = page.to_string();

        let loaded = match self.results.get::<MediaPage>(kind, &query).await {
            Some(cached) => {
                tracing::debug!(%kind, page, "listing served from cache");
                Loaded::cached(cached)
            }
            None => {
                let fetched = self.api.popular(media, page).await?;
                self.store(kind, &query, &fetched).await;
                Loaded::fetched(fetched)
            }
        };

        self.schedule_preload(loaded.value.poster_paths());
        Ok(loaded)
    }

    /// One page of multi search results for `term`.
    pub async fn search(&self, term: &str, page: u32) -> Result<Loaded<MediaPage>, TmdbError> {
        let term = validate_query(term)?;
        validate_page(page)?;
        let query = search_query(term, page);

        let loaded = match self.results.get::<MediaPage>(CacheKind::Search, &query).await {
            Some(cached) => {
                tracing::debug!(term, page, "search page served from cache");
                Loaded::cached(cached)
            }
            None => {
                let fetched = self.api.search_multi(term, page).await?;
                self.store(CacheKind::Search, &query, &fetched).await;
                Loaded::fetched(fetched)
            }
        };

        self.schedule_preload(loaded.value.poster_paths());
        Ok(loaded)
    }

    /// Up to `max_search_pages` pages merged, deduplicated by media type and id.
    ///
    /// The first page failing fails the call. A later page failing returns what
    /// was gathered so far without caching it.
    pub async fn search_all(&self, term: &str) -> Result<Loaded<AggregatedResults>, TmdbError> {
        let term = validate_query(term)?;
        let query = normalize_term(term);

        if let Some(cached) = self.results.get::<AggregatedResults>(CacheKind::Aggregate, &query).await {
            tracing::debug!(term, "aggregated search served from cache");
            self.schedule_preload(poster_paths(&cached.results));
            return Ok(Loaded::cached(cached));
        }

        let first = self.search(term, 1).await?.value;
        let last_page = first.total_pages.min(self.config.max_search_pages);

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        let mut merge = |page: MediaPage| {
            for item in page.results {
                if seen.insert((item.media_type, item.id)) {
                    results.push(item);
                }
            }
        };

        let total_results = first.total_results;
        let mut pages_fetched = 1;
        let mut complete = true;
        merge(first);

        for page in 2..=last_page {
            match self.search(term, page).await {
                Ok(loaded) => {
                    merge(loaded.value);
                    pages_fetched += 1;
                }
                Err(e) => {
                    tracing::warn!(term, page, error = %e, "aggregated search stopped early");
                    complete = false;
                    break;
                }
            }
        }

        let aggregated = AggregatedResults { query, pages_fetched, total_results, results };
        if complete {
            self.store(CacheKind::Aggregate, &aggregated.query, &aggregated).await;
        }

        Ok(Loaded::fetched(aggregated))
    }

    /// Movie or show details.
    pub async fn details(&self, media: MediaType, id: i64) -> Result<Loaded<MediaDetails>, TmdbError> {
        let query = format!("{media}_{id}");

        let loaded = match self.results.get::<MediaDetails>(CacheKind::Detail, &query).await {
            Some(cached) => Loaded::cached(cached),
            None => {
                let fetched = self.api.details(media, id).await?;
                self.store(CacheKind::Detail, &query, &fetched).await;
                Loaded::fetched(fetched)
            }
        };

        self.schedule_preload(loaded.value.poster_path().map(str::to_string).into_iter().collect());
        Ok(loaded)
    }

    /// Episodes of one season of a show.
    pub async fn season(&self, tv_id: i64, season: u32) -> Result<Loaded<SeasonDetails>, TmdbError> {
        let query = format!("{tv_id}_{season}");

        match self.results.get::<SeasonDetails>(CacheKind::Season, &query).await {
            Some(cached) => Ok(Loaded::cached(cached)),
            None => {
                let fetched = self.api.season(tv_id, season).await?;
                self.store(CacheKind::Season, &query, &fetched).await;
                Ok(Loaded::fetched(fetched))
            }
        }
    }

    /// Download posters for `poster_paths` now and wait for the result.
    pub async fn preload_posters(&self, poster_paths: &[String]) -> PreloadReport {
        let Some(images) = &self.images else {
            return PreloadReport::default();
        };
        let urls: Vec<String> = poster_paths.iter().map(|p| self.api.poster_url(p)).collect();
        images.preload(urls).await
    }

    async fn store<T: Serialize>(&self, kind: CacheKind, query: &str, value: &T) {
        if !self.results.put(kind, query, value).await {
            tracing::debug!(%kind, query, "result not cached");
        }
    }

    fn schedule_preload(&self, poster_paths: Vec<String>) {
        if !self.config.preload_images || poster_paths.is_empty() {
            return;
        }
        let Some(images) = self.images.clone() else {
            return;
        };

        let urls: Vec<String> = poster_paths.iter().map(|p| self.api.poster_url(p)).collect();
        tokio::spawn(async move {
            let report = images.preload(urls).await;
            if report.failed > 0 {
                tracing::debug!(failed = report.failed, "some posters could not be preloaded");
            }
        });
    }
}

fn poster_paths(results: &[MediaSummary]) -> Vec<String> {
    results.iter().filter_map(|r| r.poster_path.clone()).collect()
}
