//! Client code for cinedex.
//!
//! This crate provides the TMDB HTTP client, the cache-through catalog
//! service, and the navigator that ties URL state and scroll memory to
//! catalog loads. Shared by the CLI and any other front end.

pub mod catalog;
pub mod navigator;
pub mod tmdb;

pub use catalog::{Catalog, CatalogConfig, Loaded};
pub use navigator::{Navigator, View};
pub use tmdb::{CatalogApi, MediaDetails, MediaPage, MediaSummary, MediaType, TmdbClient, TmdbConfig, TmdbError};
