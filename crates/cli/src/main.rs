//! cinedex command-line entry point.
//!
//! Browses and searches the TMDB catalog through the local cache. Results go
//! to stdout (plain table or `--json`); logging goes to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cinedex_client::{Catalog, CatalogConfig, MediaType, Navigator, TmdbClient};
use cinedex_core::cache::{ImageCache, ImageSource};
use cinedex_core::{AppConfig, MemoryStorage, ResultCache, SqliteStorage, Storage, StorageHandler};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod output;

use output::Output;

/// Browse movies and TV shows from TMDB with a local cache.
#[derive(Parser, Debug)]
#[command(name = "cinedex", version, about)]
struct Cli {
    /// Print JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    /// Keep the cache in memory for this run only
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// TOML config file (overrides CINEDEX_CONFIG_FILE)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Popular movies or shows
    Browse {
        /// `movie` or `tv`
        media: MediaType,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Open a view from a URL or query string such as `?search=alien&page=2`
    Open {
        query: String,
        #[arg(long, default_value = "movie")]
        media: MediaType,
    },

    /// Search movies and shows
    Search {
        term: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Merge the first few result pages into one list
        #[arg(long, conflicts_with = "page")]
        all: bool,
    },

    /// Details of one movie or show
    Show { media: MediaType, id: i64 },

    /// Episodes of a season
    Episodes { tv_id: i64, season: u32 },

    /// Inspect or maintain the local cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Entry counts per kind and storage usage
    Stats,
    /// Remove expired entries
    Purge,
    /// Remove everything
    Clear,
}

fn init_tracing(json: bool) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn open_storage(config: &AppConfig, ephemeral: bool) -> Result<Arc<dyn Storage>> {
    if ephemeral {
        return Ok(Arc::new(MemoryStorage::new(config.storage_quota_bytes)));
    }
    let storage = SqliteStorage::open(&config.db_path, config.storage_quota_bytes)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))?;
    Ok(Arc::new(storage))
}

/// Catalog for one-shot commands. Posters are preloaded inline instead of in
/// a background task, which would not outlive the process.
fn build_catalog(config: &AppConfig, handler: StorageHandler, results: ResultCache) -> Result<Catalog> {
    let client = Arc::new(TmdbClient::from_app(config).context("TMDB client unavailable")?);
    let source: Arc<dyn ImageSource> = client.clone();
    let images = ImageCache::new(handler, source, config.image_cache_config());

    let catalog_config = CatalogConfig { preload_images: false, ..CatalogConfig::from_app(config) };
    Ok(Catalog::new(client, results, Some(images), catalog_config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("failed to load configuration")?;

    let storage = open_storage(&config, cli.ephemeral).await?;
    let handler = StorageHandler::new(storage, config.eviction_fraction);
    let results = ResultCache::new(handler.clone(), config.cache_ttls());
    let mut out = Output::new(cli.json);

    let preload = config.preload_images;
    let catalog = || build_catalog(&config, handler.clone(), results.clone());

    match cli.command {
        Command::Browse { media, page } => {
            let catalog = catalog()?;
            let loaded = catalog.browse(media, page).await?;
            if preload {
                catalog.preload_posters(&loaded.value.poster_paths()).await;
            }
            out.page(&loaded.value, loaded.from_cache)?;
        }
        Command::Open { query, media } => {
            let catalog = catalog()?;
            let mut navigator = Navigator::new(catalog.clone(), media);
            let view = navigator.open(&query).await?;
            if preload {
                catalog.preload_posters(&view.page.poster_paths()).await;
            }
            out.view(&view)?;
        }
        Command::Search { term, page, all } => {
            let catalog = catalog()?;
            if all {
                let loaded = catalog.search_all(&term).await?;
                if preload {
                    let paths: Vec<String> =
                        loaded.value.results.iter().filter_map(|r| r.poster_path.clone()).collect();
                    catalog.preload_posters(&paths).await;
                }
                out.aggregated(&loaded.value, loaded.from_cache)?;
            } else {
                let loaded = catalog.search(&term, page).await?;
                if preload {
                    catalog.preload_posters(&loaded.value.poster_paths()).await;
                }
                out.page(&loaded.value, loaded.from_cache)?;
            }
        }
        Command::Show { media, id } => {
            let catalog = catalog()?;
            let loaded = catalog.details(media, id).await?;
            if preload && let Some(path) = loaded.value.poster_path() {
                catalog.preload_posters(&[path.to_string()]).await;
            }
            out.details(&loaded.value, loaded.from_cache)?;
        }
        Command::Episodes { tv_id, season } => {
            let loaded = catalog()?.season(tv_id, season).await?;
            out.season(&loaded.value, loaded.from_cache)?;
        }
        Command::Cache { action } => run_cache(&action, &results, &mut out).await?,
    }

    Ok(())
}

async fn run_cache(action: &CacheAction, results: &ResultCache, out: &mut Output) -> Result<()> {
    match action {
        CacheAction::Stats => {
            let stats = results.stats().await;
            out.stats(&stats)?;
        }
        CacheAction::Purge => {
            let purged = results.purge_expired().await;
            out.message(&serde_json::json!({ "purged": purged }), &format!("purged {purged} expired entries"))?;
        }
        CacheAction::Clear => {
            results.handler().clear().await.context("failed to clear cache")?;
            out.message(&serde_json::json!({ "cleared": true }), "cache cleared")?;
        }
    }
    Ok(())
}
