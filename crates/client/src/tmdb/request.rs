//! TMDB request types and validation.

use super::TmdbError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

/// Highest page TMDB will serve for any paginated endpoint.
pub const MAX_PAGE: u32 = 500;

/// Longest search term accepted.
pub const MAX_QUERY_CHARS: usize = 200;

static LANGUAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[A-Z]{2})?$").expect("valid regex"));

/// Catalog section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    /// Path segment used by TMDB (`movie` / `tv`).
    pub fn as_path(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_path())
    }
}

impl FromStr for MediaType {
    type Err = TmdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" | "movies" | "film" => Ok(MediaType::Movie),
            "tv" | "show" | "shows" | "series" => Ok(MediaType::Tv),
            other => Err(TmdbError::InvalidQuery(format!("unknown media type: {other}"))),
        }
    }
}

/// Validate a page number against TMDB's range.
pub fn validate_page(page: u32) -> Result<(), TmdbError> {
    if (1..=MAX_PAGE).contains(&page) { Ok(()) } else { Err(TmdbError::InvalidPage(page)) }
}

/// Validate and trim a search term.
pub fn validate_query(query: &str) -> Result<&str, TmdbError> {
    let trimmed = query.trim();

    if trimmed.is_empty() {
        return Err(TmdbError::InvalidQuery("query cannot be empty".to_string()));
    }

    let chars = trimmed.chars().count();
    if chars > MAX_QUERY_CHARS {
        return Err(TmdbError::InvalidQuery(format!("query too long: {chars} chars (max {MAX_QUERY_CHARS})")));
    }

    Ok(trimmed)
}

/// Validate a language tag (`en`, `en-US`).
pub fn validate_language(language: &str) -> Result<(), TmdbError> {
    if LANGUAGE_RE.is_match(language) { Ok(()) } else { Err(TmdbError::InvalidLanguage(language.to_string())) }
}
