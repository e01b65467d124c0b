//! Paged browsing of one catalog section.
//!
//! Drives the URL state (`?search=...&page=N`), the catalog loads behind it and
//! the scroll offset remembered for each view. Movies and TV shows use the same
//! navigator with a different `MediaType`.

use crate::catalog::Catalog;
use crate::tmdb::{MAX_PAGE, MediaPage, MediaType, TmdbError};
use cinedex_core::{PageState, ScrollMemory};
use serde::Serialize;

/// A rendered page of results.
#[derive(Debug, Clone, Serialize)]
pub struct View {
    pub state: PageState,
    /// Path plus canonical query, e.g. `/tv?search=wire&page=2`.
    pub url: String,
    pub page: MediaPage,
    pub from_cache: bool,
    /// Offset to scroll to; 0 is the top of the page.
    pub scroll_offset: f64,
}

#[derive(Debug)]
pub struct Navigator {
    catalog: Catalog,
    media: MediaType,
    state: PageState,
    scroll: ScrollMemory,
    total_pages: Option<u32>,
}

impl Navigator {
    pub fn new(catalog: Catalog, media: MediaType) -> Self {
        Self { catalog, media, state: PageState::default(), scroll: ScrollMemory::new(), total_pages: None }
    }

    pub fn media(&self) -> MediaType {
        self.media
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn scroll(&self) -> &ScrollMemory {
        &self.scroll
    }

    /// Current location as path plus query.
    pub fn url(&self) -> String {
        self.url_for(&self.state)
    }

    fn url_for(&self, state: &PageState) -> String {
        let path = match self.media {
            MediaType::Movie => "/movies",
            MediaType::Tv => "/tv",
        };
        format!("{path}{}", state.to_url_suffix())
    }

    /// Load the view described by a URL or query string.
    pub async fn open(&mut self, query: &str) -> Result<View, TmdbError> {
        let mut state = PageState::from_query(query);
        state.page = state.page.min(MAX_PAGE);
        self.load(state).await
    }

    /// Remember how far the current view is scrolled.
    pub fn record_scroll(&mut self, offset: f64) {
        let key = self.state.view_key();
        self.scroll.remember(&key, offset);
    }

    /// Advance one page. `None` when already on the last page.
    pub async fn next_page(&mut self) -> Result<Option<View>, TmdbError> {
        let last = self.total_pages.unwrap_or(MAX_PAGE).min(MAX_PAGE);
        if self.state.page >= last {
            tracing::debug!(page = self.state.page, last, "already on last page");
            return Ok(None);
        }
        let next = self.state.with_page(self.state.page + 1);
        self.load(next).await.map(Some)
    }

    /// Go back one page. `None` on page 1.
    pub async fn prev_page(&mut self) -> Result<Option<View>, TmdbError> {
        if self.state.page <= 1 {
            return Ok(None);
        }
        let prev = self.state.with_page(self.state.page - 1);
        self.load(prev).await.map(Some)
    }

    /// Start a search at page 1. A blank term returns to browsing.
    pub async fn search(&mut self, term: &str) -> Result<View, TmdbError> {
        let next = self.state.with_search(term);
        self.load(next).await
    }

    pub async fn clear_search(&mut self) -> Result<View, TmdbError> {
        let next = self.state.clear_search();
        self.load(next).await
    }

    async fn load(&mut self, state: PageState) -> Result<View, TmdbError> {
        let key = state.view_key();
        self.scroll.begin_load(&key);

        let loaded = match &state.search {
            Some(term) => self.catalog.search(term, state.page).await?,
            None => self.catalog.browse(self.media, state.page).await?,
        };

        let scroll_offset = self.scroll.finish_load(&key).unwrap_or(0.0);
        self.total_pages = Some(loaded.value.total_pages);
        self.state = state;

        tracing::debug!(view = %key, from_cache = loaded.from_cache, scroll_offset, "view loaded");
        Ok(View {
            url: self.url_for(&self.state),
            state: self.state.clone(),
            page: loaded.value,
            from_cache: loaded.from_cache,
            scroll_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogConfig;
    use crate::tmdb::{CatalogApi, MediaDetails, MediaSummary, SeasonDetails};
    use async_trait::async_trait;
    use cinedex_core::cache::{CacheTtls, ResultCache};
    use cinedex_core::storage::MemoryStorage;
    use cinedex_core::StorageHandler;
    use std::sync::Arc;

    /// Three pages of anything; searches for "nothing" have no results.
    struct ThreePages;

    fn page_of(media: MediaType, page: u32, total_pages: u32) -> MediaPage {
        let results = (0..total_pages.min(1))
            .map(|i| MediaSummary {
                id: i64::from(page * 10 + i),
                media_type: media,
                title: format!("item {page}"),
                overview: String::new(),
                poster_path: None,
                vote_average: 0.0,
                vote_count: 0,
                release_date: None,
            })
            .collect();
        MediaPage { page, total_pages, total_results: total_pages * 20, results }
    }

    #[async_trait]
    impl CatalogApi for ThreePages {
        async fn popular(&self, media: MediaType, page: u32) -> Result<MediaPage, TmdbError> {
            Ok(page_of(media, page, 3))
        }

        async fn search_multi(&self, query: &str, page: u32) -> Result<MediaPage, TmdbError> {
            if query == "offline" {
                return Err(TmdbError::Timeout);
            }
            let total = if query == "nothing" { 0 } else { 3 };
            Ok(page_of(MediaType::Movie, page, total))
        }

        async fn details(&self, _media: MediaType, id: i64) -> Result<MediaDetails, TmdbError> {
            Err(TmdbError::NotFound(id.to_string()))
        }

        async fn season(&self, tv_id: i64, _season: u32) -> Result<SeasonDetails, TmdbError> {
            Err(TmdbError::NotFound(tv_id.to_string()))
        }

        fn poster_url(&self, poster_path: &str) -> String {
            poster_path.to_string()
        }
    }

    fn navigator(media: MediaType) -> Navigator {
        let handler = StorageHandler::new(Arc::new(MemoryStorage::new(1024 * 1024)), 0.3);
        let results = ResultCache::new(handler, CacheTtls::default());
        let config = CatalogConfig { preload_images: false, max_search_pages: 3 };
        Navigator::new(Catalog::new(Arc::new(ThreePages), results, None, config), media)
    }

    #[tokio::test]
    async fn test_open_parses_url_state() {
        let mut nav = navigator(MediaType::Tv);

        let view = nav.open("https://cinedex.local/tv?page=2").await.unwrap();
        assert_eq!(view.state.page, 2);
        assert_eq!(view.url, "/tv?page=2");
        assert_eq!(view.scroll_offset, 0.0);
        assert!(!view.from_cache);
        assert_eq!(nav.url(), "/tv?page=2");
    }

    #[tokio::test]
    async fn test_open_bad_page_falls_back() {
        let mut nav = navigator(MediaType::Movie);
        let view = nav.open("?page=banana").await.unwrap();
        assert_eq!(view.state.page, 1);
        assert_eq!(view.url, "/movies");

        let view = nav.open("?page=100000").await.unwrap();
        assert_eq!(view.state.page, MAX_PAGE);
    }

    #[tokio::test]
    async fn test_paging_stops_at_bounds() {
        let mut nav = navigator(MediaType::Movie);
        nav.open("").await.unwrap();

        assert!(nav.prev_page().await.unwrap().is_none());
        assert_eq!(nav.next_page().await.unwrap().unwrap().state.page, 2);
        assert_eq!(nav.next_page().await.unwrap().unwrap().state.page, 3);
        assert!(nav.next_page().await.unwrap().is_none());
        assert_eq!(nav.state().page, 3);
        assert_eq!(nav.prev_page().await.unwrap().unwrap().state.page, 2);
    }

    #[tokio::test]
    async fn test_scroll_restored_per_view() {
        let mut nav = navigator(MediaType::Movie);
        nav.open("").await.unwrap();
        nav.record_scroll(640.0);

        let second = nav.next_page().await.unwrap().unwrap();
        assert_eq!(second.scroll_offset, 0.0);
        nav.record_scroll(75.0);

        let back = nav.prev_page().await.unwrap().unwrap();
        assert_eq!(back.scroll_offset, 640.0);
        assert!(back.from_cache);

        let forward = nav.next_page().await.unwrap().unwrap();
        assert_eq!(forward.scroll_offset, 75.0);
    }

    #[tokio::test]
    async fn test_search_resets_page_and_has_own_scroll() {
        let mut nav = navigator(MediaType::Movie);
        nav.open("?page=3").await.unwrap();
        nav.record_scroll(900.0);

        let view = nav.search("Blade Runner").await.unwrap();
        assert_eq!(view.state.page, 1);
        assert_eq!(view.url, "/movies?search=Blade+Runner");
        assert_eq!(view.scroll_offset, 0.0);
        assert_eq!(nav.state().view_key(), "blade runner_1");

        let view = nav.clear_search().await.unwrap();
        assert_eq!(view.url, "/movies");
        assert!(!view.state.is_search());
    }

    #[tokio::test]
    async fn test_empty_search_has_no_next_page() {
        let mut nav = navigator(MediaType::Movie);
        let view = nav.search("nothing").await.unwrap();
        assert!(view.page.results.is_empty());
        assert!(nav.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_state() {
        let mut nav = navigator(MediaType::Movie);
        nav.open("?page=2").await.unwrap();

        assert!(matches!(nav.search("offline").await, Err(TmdbError::Timeout)));
        assert_eq!(nav.url(), "/movies?page=2");
    }
}
