//! TMDB client error types.

use std::sync::Arc;

/// Errors from the TMDB API client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TmdbError {
    /// No API key configured.
    #[error("missing API key: CINEDEX_TMDB_API_KEY not set")]
    MissingApiKey,

    /// Page outside TMDB's accepted range.
    #[error("invalid page {0}: must be 1-500")]
    InvalidPage(u32),

    /// Invalid search query.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Language code not in `xx` or `xx-YY` form.
    #[error("invalid language: {0}")]
    InvalidLanguage(String),

    /// Authentication failed (invalid API key).
    #[error("authentication failed: invalid API key")]
    Auth,

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limited by TMDB.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    Http { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for TmdbError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { TmdbError::Timeout } else { TmdbError::Network(Arc::new(err)) }
    }
}

impl From<TmdbError> for cinedex_core::Error {
    fn from(err: TmdbError) -> Self {
        match err {
            TmdbError::InvalidPage(_) | TmdbError::InvalidQuery(_) | TmdbError::InvalidLanguage(_) => {
                cinedex_core::Error::InvalidInput(err.to_string())
            }
            other => cinedex_core::Error::ImageFetch(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TmdbError::MissingApiKey;
        assert!(err.to_string().contains("API key"));

        let err = TmdbError::InvalidQuery("empty".to_string());
        assert!(err.to_string().contains("invalid query"));

        let err = TmdbError::Http { status: 502 };
        assert_eq!(err.to_string(), "HTTP error: 502");
    }

    #[test]
    fn test_core_error_conversion() {
        let err: cinedex_core::Error = TmdbError::InvalidPage(0).into();
        assert!(matches!(err, cinedex_core::Error::InvalidInput(_)));

        let err: cinedex_core::Error = TmdbError::NotFound("/x.jpg".into()).into();
        assert!(matches!(err, cinedex_core::Error::ImageFetch(_)));
    }
}
