//! Cache key layout.
//!
//! Keys are `{kind}_{query-or-page}`. Search terms are normalized first so
//! that `"  The Matrix "` and `"the matrix"` share an entry.

use serde::Serialize;

/// Category of a cached value. The prefix doubles as the eviction scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    /// Popular movies listing, keyed by page.
    Movies,
    /// Popular TV listing, keyed by page.
    Tv,
    /// One page of search results, keyed by term and page.
    Search,
    /// Several search pages merged, keyed by term.
    Aggregate,
    /// Movie or show details, keyed by media type and id.
    Detail,
    /// Season episode listing, keyed by show id and season number.
    Season,
    /// Base64 poster image, keyed by image URL.
    Image,
}

impl CacheKind {
    pub const ALL: [CacheKind; 7] = [
        CacheKind::Movies,
        CacheKind::Tv,
        CacheKind::Search,
        CacheKind::Aggregate,
        CacheKind::Detail,
        CacheKind::Season,
        CacheKind::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Movies => "movies",
            CacheKind::Tv => "tv",
            CacheKind::Search => "search",
            CacheKind::Aggregate => "aggregate",
            CacheKind::Detail => "detail",
            CacheKind::Season => "season",
            CacheKind::Image => "image",
        }
    }

    /// Key prefix including the separator, e.g. `movies_`.
    pub fn prefix(&self) -> String {
        format!("{}_", self.as_str())
    }

    /// Full storage key for a query or page.
    pub fn key(&self, query: &str) -> String {
        format!("{}_{}", self.as_str(), query)
    }
}

impl std::fmt::Display for CacheKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a search term: trim, lowercase, collapse inner whitespace.
pub fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Query part of a single search page entry.
pub fn search_query(term: &str, page: u32) -> String {
    format!("{}_{}", normalize_term(term), page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(CacheKind::Movies.key("3"), "movies_3");
        assert_eq!(CacheKind::Aggregate.key("dune"), "aggregate_dune");
        assert_eq!(CacheKind::Image.prefix(), "image_");
    }

    #[test]
    fn test_prefixes_are_disjoint() {
        for a in CacheKind::ALL {
            for b in CacheKind::ALL {
                if a != b {
                    assert!(!a.prefix().starts_with(&b.prefix()), "{a} overlaps {b}");
                }
            }
        }
    }

    #[test]
    fn test_normalize_term() {
        assert_eq!(normalize_term("  The   Matrix "), "the matrix");
        assert_eq!(normalize_term(""), "");
    }

    #[test]
    fn test_search_query_includes_page() {
        assert_eq!(search_query("Blade Runner", 2), "blade runner_2");
        assert_eq!(CacheKind::Search.key(&search_query("Blade Runner", 2)), "search_blade runner_2");
    }
}
