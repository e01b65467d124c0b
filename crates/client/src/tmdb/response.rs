//! TMDB response types and normalization.

use super::request::{MAX_PAGE, MediaType};
use serde::{Deserialize, Serialize};

/// Raw paginated envelope shared by list and search endpoints.
#[derive(Debug, Deserialize)]
pub struct RawPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<RawMedia>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
}

/// Raw list item. Movies use `title`/`release_date`, shows `name`/`first_air_date`.
#[derive(Debug, Deserialize)]
pub struct RawMedia {
    pub id: i64,
    #[serde(default)]
    pub media_type: Option<String>,
    pub title: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub overview: String,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: i64,
}

/// Normalized list item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub id: i64,
    pub media_type: MediaType,
    pub title: String,
    pub overview: String,
    pub poster_path: Option<String>,
    pub vote_average: f64,
    pub vote_count: i64,
    pub release_date: Option<String>,
}

impl MediaSummary {
    /// Release year, if the date is present.
    pub fn year(&self) -> Option<&str> {
        self.release_date.as_deref().and_then(|d| d.get(..4))
    }
}

impl RawMedia {
    /// Normalize, inferring the media type from the endpoint when the item
    /// does not carry one. People (and anything else) yield `None`.
    pub fn normalize(self, fallback: Option<MediaType>) -> Option<MediaSummary> {
        let media_type = match self.media_type.as_deref() {
            Some("movie") => MediaType::Movie,
            Some("tv") => MediaType::Tv,
            Some(_) => return None,
            None => fallback?,
        };

        let (title, release_date) = match media_type {
            MediaType::Movie => (self.title.or(self.name), self.release_date),
            MediaType::Tv => (self.name.or(self.title), self.first_air_date),
        };

        Some(MediaSummary {
            id: self.id,
            media_type,
            title: title.unwrap_or_default(),
            overview: self.overview,
            poster_path: self.poster_path.filter(|p| !p.is_empty()),
            vote_average: self.vote_average,
            vote_count: self.vote_count,
            release_date: release_date.filter(|d| !d.is_empty()),
        })
    }
}

/// One page of normalized results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPage {
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u32,
    pub results: Vec<MediaSummary>,
}

impl MediaPage {
    pub fn from_raw(raw: RawPage, fallback: Option<MediaType>) -> Self {
        Self {
            page: raw.page.max(1),
            total_pages: raw.total_pages.min(MAX_PAGE),
            total_results: raw.total_results,
            results: raw.results.into_iter().filter_map(|r| r.normalize(fallback)).collect(),
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Poster paths of every result that has one.
    pub fn poster_paths(&self) -> Vec<String> {
        self.results.iter().filter_map(|r| r.poster_path.clone()).collect()
    }
}

/// Results of several search pages merged and deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResults {
    pub query: String,
    pub pages_fetched: u32,
    pub total_results: u32,
    pub results: Vec<MediaSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    pub tagline: Option<String>,
    pub runtime: Option<u32>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    pub release_date: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: i64,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub season_number: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub episode_count: u32,
    pub air_date: Option<String>,
    pub poster_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvDetails {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub overview: String,
    pub tagline: Option<String>,
    #[serde(default)]
    pub number_of_seasons: u32,
    #[serde(default)]
    pub number_of_episodes: u32,
    #[serde(default)]
    pub seasons: Vec<SeasonSummary>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    pub first_air_date: Option<String>,
    pub last_air_date: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: i64,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
}

/// Details page for either section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "media_type", rename_all = "lowercase")]
pub enum MediaDetails {
    Movie(MovieDetails),
    Tv(TvDetails),
}

impl MediaDetails {
    pub fn title(&self) -> &str {
        match self {
            MediaDetails::Movie(m) => &m.title,
            MediaDetails::Tv(t) => &t.name,
        }
    }

    pub fn poster_path(&self) -> Option<&str> {
        match self {
            MediaDetails::Movie(m) => m.poster_path.as_deref(),
            MediaDetails::Tv(t) => t.poster_path.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub episode_number: u32,
    #[serde(default)]
    pub season_number: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub overview: String,
    pub air_date: Option<String>,
    pub runtime: Option<u32>,
    #[serde(default)]
    pub vote_average: f64,
    pub still_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonDetails {
    pub season_number: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub overview: String,
    pub air_date: Option<String>,
    pub poster_path: Option<String>,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTI_FIXTURE: &str = r#"{
        "page": 1,
        "total_pages": 812,
        "total_results": 16221,
        "results": [
            {"id": 603, "media_type": "movie", "title": "The Matrix", "overview": "Neo.",
             "poster_path": "/f89U3ADr1oiB1s9GkdPOEpXUk5H.jpg", "release_date": "1999-03-30",
             "vote_average": 8.2, "vote_count": 25000},
            {"id": 6384, "media_type": "person", "name": "Keanu Reeves"},
            {"id": 1396, "media_type": "tv", "name": "Breaking Bad", "first_air_date": "2008-01-20",
             "poster_path": "", "vote_average": 8.9}
        ]
    }"#;

    #[test]
    fn test_normalize_multi_search() {
        let raw: RawPage = serde_json::from_str(MULTI_FIXTURE).unwrap();
        let page = MediaPage::from_raw(raw, None);

        assert_eq!(page.total_pages, 500);
        assert_eq!(page.results.len(), 2);

        let movie = &page.results[0];
        assert_eq!(movie.media_type, MediaType::Movie);
        assert_eq!(movie.title, "The Matrix");
        assert_eq!(movie.year(), Some("1999"));

        let show = &page.results[1];
        assert_eq!(show.media_type, MediaType::Tv);
        assert_eq!(show.title, "Breaking Bad");
        assert_eq!(show.release_date.as_deref(), Some("2008-01-20"));
        assert!(show.poster_path.is_none());
        assert_eq!(show.vote_count, 0);

        assert_eq!(page.poster_paths(), vec!["/f89U3ADr1oiB1s9GkdPOEpXUk5H.jpg".to_string()]);
    }

    #[test]
    fn test_year_of_malformed_dates() {
        let summary = |date: &str| MediaSummary {
            id: 1,
            media_type: MediaType::Movie,
            title: "x".into(),
            overview: String::new(),
            poster_path: None,
            vote_average: 0.0,
            vote_count: 0,
            release_date: Some(date.into()),
        };
        assert_eq!(summary("199\u{e9}-01-01").year(), None);
        assert_eq!(summary("199").year(), None);
        assert_eq!(summary("2024").year(), Some("2024"));
    }

    #[test]
    fn test_listing_uses_endpoint_media_type() {
        let json = r#"{"page": 2, "total_pages": 3, "total_results": 60,
            "results": [{"id": 1, "name": "Show", "first_air_date": "2020-05-01"}]}"#;
        let page = MediaPage::from_raw(serde_json::from_str(json).unwrap(), Some(MediaType::Tv));

        assert_eq!(page.results[0].media_type, MediaType::Tv);
        assert!(page.has_next());
    }

    #[test]
    fn test_untyped_item_without_fallback_is_dropped() {
        let json = r#"{"results": [{"id": 1, "title": "X"}]}"#;
        let page = MediaPage::from_raw(serde_json::from_str(json).unwrap(), None);
        assert!(page.results.is_empty());
        assert_eq!(page.page, 1);
        assert!(!page.has_next());
    }

    #[test]
    fn test_details_tagged_serialization() {
        let json = r#"{"id": 1396, "name": "Breaking Bad", "number_of_seasons": 5,
            "seasons": [{"season_number": 1, "name": "Season 1", "episode_count": 7}]}"#;
        let tv: TvDetails = serde_json::from_str(json).unwrap();
        let details = MediaDetails::Tv(tv);

        let encoded = serde_json::to_value(&details).unwrap();
        assert_eq!(encoded["media_type"], "tv");
        assert_eq!(details.title(), "Breaking Bad");
        assert!(details.poster_path().is_none());
    }

    #[test]
    fn test_season_episodes() {
        let json = r#"{"season_number": 2, "name": "Season 2", "episodes": [
            {"id": 62092, "episode_number": 1, "season_number": 2, "name": "Seven Thirty-Seven",
             "air_date": "2009-03-08", "runtime": 47, "vote_average": 8.1}
        ]}"#;
        let season: SeasonDetails = serde_json::from_str(json).unwrap();
        assert_eq!(season.episodes.len(), 1);
        assert_eq!(season.episodes[0].runtime, Some(47));
        assert!(season.episodes[0].still_path.is_none());
    }
}
