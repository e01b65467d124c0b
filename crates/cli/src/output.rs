//! Plain-table and JSON rendering of command results.

use std::io::{self, Write};

use anyhow::Result;
use cinedex_client::tmdb::{AggregatedResults, SeasonDetails};
use cinedex_client::{MediaDetails, MediaPage, MediaSummary, View};
use cinedex_core::cache::CacheStats;
use serde::Serialize;

pub struct Output {
    json: bool,
    writer: Box<dyn Write>,
}

#[derive(Serialize)]
struct WithSource<'a, T> {
    from_cache: bool,
    #[serde(flatten)]
    value: &'a T,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json, writer: Box::new(io::stdout()) }
    }

    #[cfg(test)]
    fn with_writer<W: Write + 'static>(json: bool, writer: W) -> Self {
        Self { json, writer: Box::new(writer) }
    }

    fn emit_json<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(self.writer, "{json}")?;
        Ok(())
    }

    fn sourced<T: Serialize>(&mut self, value: &T, from_cache: bool) -> Result<()> {
        self.emit_json(&WithSource { from_cache, value })
    }

    fn source_line(&mut self, from_cache: bool) -> Result<()> {
        writeln!(self.writer, "({})", if from_cache { "cached" } else { "fetched" })?;
        Ok(())
    }

    fn rows(&mut self, results: &[MediaSummary]) -> Result<()> {
        if results.is_empty() {
            writeln!(self.writer, "no results")?;
            return Ok(());
        }
        writeln!(self.writer, "{:>9}  {:<5}  {:<4}  {:>6}  TITLE", "ID", "TYPE", "YEAR", "RATING")?;
        for item in results {
            writeln!(
                self.writer,
                "{:>9}  {:<5}  {:<4}  {:>6.1}  {}",
                item.id,
                item.media_type.as_path(),
                item.year().unwrap_or("-"),
                item.vote_average,
                item.title
            )?;
        }
        Ok(())
    }

    pub fn page(&mut self, page: &MediaPage, from_cache: bool) -> Result<()> {
        if self.json {
            return self.sourced(page, from_cache);
        }
        self.rows(&page.results)?;
        writeln!(self.writer, "page {} of {} ({} results)", page.page, page.total_pages, page.total_results)?;
        if page.has_next() {
            writeln!(self.writer, "more: --page {}", page.page + 1)?;
        }
        self.source_line(from_cache)
    }

    pub fn view(&mut self, view: &View) -> Result<()> {
        if self.json {
            return self.emit_json(view);
        }
        writeln!(self.writer, "{}", view.url)?;
        self.page(&view.page, view.from_cache)?;
        if view.scroll_offset > 0.0 {
            writeln!(self.writer, "scroll to {:.0}", view.scroll_offset)?;
        }
        Ok(())
    }

    pub fn aggregated(&mut self, results: &AggregatedResults, from_cache: bool) -> Result<()> {
        if self.json {
            return self.sourced(results, from_cache);
        }
        self.rows(&results.results)?;
        writeln!(
            self.writer,
            "{} unique results from {} page(s), {} total",
            results.results.len(),
            results.pages_fetched,
            results.total_results
        )?;
        self.source_line(from_cache)
    }

    pub fn details(&mut self, details: &MediaDetails, from_cache: bool) -> Result<()> {
        if self.json {
            return self.emit_json(&serde_json::json!({ "from_cache": from_cache, "details": details }));
        }
        match details {
            MediaDetails::Movie(movie) => {
                writeln!(self.writer, "{} ({})", movie.title, movie.release_date.as_deref().unwrap_or("unreleased"))?;
                if let Some(runtime) = movie.runtime {
                    writeln!(self.writer, "runtime: {runtime} min")?;
                }
                writeln!(self.writer, "rating: {:.1} ({} votes)", movie.vote_average, movie.vote_count)?;
                self.genres(movie.genres.iter().map(|g| g.name.as_str()))?;
                writeln!(self.writer, "\n{}", movie.overview)?;
            }
            MediaDetails::Tv(show) => {
                writeln!(self.writer, "{} ({})", show.name, show.first_air_date.as_deref().unwrap_or("unaired"))?;
                writeln!(self.writer, "{} seasons, {} episodes", show.number_of_seasons, show.number_of_episodes)?;
                writeln!(self.writer, "rating: {:.1} ({} votes)", show.vote_average, show.vote_count)?;
                self.genres(show.genres.iter().map(|g| g.name.as_str()))?;
                writeln!(self.writer, "\n{}", show.overview)?;
                for season in &show.seasons {
                    writeln!(
                        self.writer,
                        "  S{:02}  {} ({} episodes)",
                        season.season_number, season.name, season.episode_count
                    )?;
                }
            }
        }
        self.source_line(from_cache)
    }

    fn genres<'a>(&mut self, names: impl Iterator<Item = &'a str>) -> Result<()> {
        let names: Vec<&str> = names.collect();
        if !names.is_empty() {
            writeln!(self.writer, "genres: {}", names.join(", "))?;
        }
        Ok(())
    }

    pub fn season(&mut self, season: &SeasonDetails, from_cache: bool) -> Result<()> {
        if self.json {
            return self.sourced(season, from_cache);
        }
        writeln!(self.writer, "{}", season.name)?;
        for episode in &season.episodes {
            writeln!(
                self.writer,
                "  E{:02}  {:<10}  {}",
                episode.episode_number,
                episode.air_date.as_deref().unwrap_or("-"),
                episode.name
            )?;
        }
        self.source_line(from_cache)
    }

    pub fn stats(&mut self, stats: &CacheStats) -> Result<()> {
        if self.json {
            return self.emit_json(stats);
        }
        for count in &stats.per_kind {
            writeln!(self.writer, "{:<10} {}", count.kind.as_str(), count.entries)?;
        }
        writeln!(self.writer, "{:<10} {}", "total", stats.total_entries())?;
        if let Some(usage) = stats.usage {
            writeln!(
                self.writer,
                "used {} of {} bytes, {} free ({} keys)",
                usage.used_bytes,
                usage.quota_bytes,
                usage.available_bytes(),
                usage.entries
            )?;
        }
        Ok(())
    }

    /// A JSON body in `--json` mode, otherwise a one-line message.
    pub fn message(&mut self, json: &serde_json::Value, text: &str) -> Result<()> {
        if self.json {
            return self.emit_json(json);
        }
        writeln!(self.writer, "{text}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinedex_client::MediaType;
    use cinedex_core::storage::StorageUsage;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn sample_page() -> MediaPage {
        MediaPage {
            page: 1,
            total_pages: 2,
            total_results: 21,
            results: vec![MediaSummary {
                id: 78,
                media_type: MediaType::Movie,
                title: "Blade Runner".into(),
                overview: String::new(),
                poster_path: None,
                vote_average: 7.9,
                vote_count: 14000,
                release_date: Some("1982-06-25".into()),
            }],
        }
    }

    #[test]
    fn test_table_output() {
        let buffer = Buffer::default();
        let mut out = Output::with_writer(false, buffer.clone());
        out.page(&sample_page(), true).unwrap();

        let text = buffer.contents();
        assert!(text.contains("Blade Runner"));
        assert!(text.contains("1982"));
        assert!(text.contains("page 1 of 2"));
        assert!(text.contains("more: --page 2"));
        assert!(text.contains("(cached)"));
    }

    #[test]
    fn test_last_page_has_no_more_hint() {
        let buffer = Buffer::default();
        let mut out = Output::with_writer(false, buffer.clone());
        out.page(&MediaPage { page: 2, ..sample_page() }, false).unwrap();
        assert!(!buffer.contents().contains("more:"));
    }

    #[test]
    fn test_stats_report_free_bytes() {
        let buffer = Buffer::default();
        let mut out = Output::with_writer(false, buffer.clone());
        let stats = CacheStats {
            per_kind: vec![],
            usage: Some(StorageUsage { used_bytes: 6_000, quota_bytes: 5_000, entries: 3 }),
        };
        out.stats(&stats).unwrap();
        assert!(buffer.contents().contains("used 6000 of 5000 bytes, 0 free (3 keys)"));
    }

    #[test]
    fn test_json_output_flattens_value() {
        let buffer = Buffer::default();
        let mut out = Output::with_writer(true, buffer.clone());
        out.page(&sample_page(), false).unwrap();

        let value: serde_json::Value = serde_json::from_str(&buffer.contents()).unwrap();
        assert_eq!(value["from_cache"], false);
        assert_eq!(value["total_pages"], 2);
        assert_eq!(value["results"][0]["media_type"], "movie");
    }

    #[test]
    fn test_empty_results() {
        let buffer = Buffer::default();
        let mut out = Output::with_writer(false, buffer.clone());
        let page = MediaPage { page: 1, total_pages: 0, total_results: 0, results: vec![] };
        out.page(&page, false).unwrap();
        assert!(buffer.contents().starts_with("no results"));
    }
}
