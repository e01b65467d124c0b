//! Pagination and search state mirrored in a URL query string.
//!
//! `?page=3&search=alien` <-> `PageState { page: 3, search: Some("alien") }`.
//! Anything unparsable falls back to the defaults instead of failing, the way
//! a hand-edited address bar should behave.

use crate::cache::normalize_term;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

const PAGE_PARAM: &str = "page";
const SEARCH_PARAM: &str = "search";
const SEARCH_ALIASES: &[&str] = &[SEARCH_PARAM, "query", "q"];

/// View key used when no search is active.
pub const BROWSE_KEY: &str = "browse";

/// Current page and optional search term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    pub page: u32,
    pub search: Option<String>,
}

impl Default for PageState {
    fn default() -> Self {
        Self { page: 1, search: None }
    }
}

impl PageState {
    /// Parse from a query string, a `?`-prefixed query, or a full URL.
    pub fn from_query(input: &str) -> Self {
        let query = match input.split_once('?') {
            Some((_, query)) => query,
            None if input.contains('=') => input,
            None => "",
        };
        let query = query.split('#').next().unwrap_or_default();

        let mut state = Self::default();
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            if name == PAGE_PARAM {
                state.page = parse_page(&value);
            } else if SEARCH_ALIASES.contains(&name.as_ref()) && state.search.is_none() {
                state.search = clean_search(&value);
            }
        }
        state
    }

    /// Canonical query string without the leading `?`; empty for the default state.
    pub fn to_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        if let Some(search) = &self.search {
            serializer.append_pair(SEARCH_PARAM, search);
        }
        if self.page > 1 {
            serializer.append_pair(PAGE_PARAM, &self.page.to_string());
        }
        serializer.finish()
    }

    /// `?query` form, or an empty string for the default state.
    pub fn to_url_suffix(&self) -> String {
        let query = self.to_query();
        if query.is_empty() { query } else { format!("?{query}") }
    }

    pub fn with_page(&self, page: u32) -> Self {
        Self { page: page.max(1), search: self.search.clone() }
    }

    /// Switch to a new search term. Always resets to page 1.
    pub fn with_search(&self, term: &str) -> Self {
        Self { page: 1, search: clean_search(term) }
    }

    pub fn clear_search(&self) -> Self {
        Self { page: 1, search: None }
    }

    pub fn is_search(&self) -> bool {
        self.search.is_some()
    }

    /// Identity of the rendered page: `{searchTerm-or-"browse"}_{page}`.
    pub fn view_key(&self) -> String {
        let scope = self.search.as_deref().map(normalize_term).unwrap_or_else(|| BROWSE_KEY.to_string());
        format!("{scope}_{}", self.page)
    }
}

fn parse_page(raw: &str) -> u32 {
    raw.trim().parse::<u32>().ok().filter(|p| *p > 0).unwrap_or(1)
}

fn clean_search(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = PageState::from_query("");
        assert_eq!(state, PageState::default());
        assert_eq!(state.to_query(), "");
        assert_eq!(state.view_key(), "browse_1");
    }

    #[test]
    fn test_parse_full_url() {
        let state = PageState::from_query("https://cinedex.local/tv?page=4&search=the%20wire#top");
        assert_eq!(state.page, 4);
        assert_eq!(state.search.as_deref(), Some("the wire"));
    }

    #[test]
    fn test_parse_bare_and_prefixed_query() {
        assert_eq!(PageState::from_query("?page=2").page, 2);
        assert_eq!(PageState::from_query("page=3&q=dune").search.as_deref(), Some("dune"));
        assert_eq!(PageState::from_query("/movies").page, 1);
    }

    #[test]
    fn test_invalid_page_falls_back_to_one() {
        assert_eq!(PageState::from_query("?page=0").page, 1);
        assert_eq!(PageState::from_query("?page=-2").page, 1);
        assert_eq!(PageState::from_query("?page=abc").page, 1);
        assert_eq!(PageState::from_query("?page=").page, 1);
    }

    #[test]
    fn test_blank_search_is_none() {
        assert!(PageState::from_query("?search=%20%20").search.is_none());
    }

    #[test]
    fn test_canonical_query() {
        let state = PageState { page: 2, search: Some("star wars".into()) };
        assert_eq!(state.to_query(), "search=star+wars&page=2");
        assert_eq!(state.to_url_suffix(), "?search=star+wars&page=2");
        assert_eq!(PageState::from_query(&state.to_url_suffix()), state);

        assert_eq!(PageState { page: 1, search: Some("x".into()) }.to_query(), "search=x");
    }

    #[test]
    fn test_transitions() {
        let state = PageState::default().with_page(5);
        assert_eq!(state.page, 5);

        let searching = state.with_search("  Alien ");
        assert_eq!(searching, PageState { page: 1, search: Some("Alien".into()) });
        assert_eq!(searching.with_page(0).page, 1);
        assert_eq!(searching.with_page(3).view_key(), "alien_3");

        assert_eq!(searching.clear_search(), PageState::default());
        assert!(!state.with_search("").is_search());
    }
}
