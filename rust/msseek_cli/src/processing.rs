use super::config::{
    AnalysisConfig,
    OutputConfig,
};
use crate::errors::CliError;
use indicatif::{
    ProgressIterator,
    ProgressStyle,
};
use msseek::data_sources::read_library_file;
use msseek::{
    Engine,
    LibraryInfo,
    SearchResult,
    Spectrum,
};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Debug, Clone)]
pub struct Query {
    pub label: String,
    pub spectrum: Spectrum,
}

/// One line of `results.csv`.
#[derive(Debug, Serialize)]
pub struct ResultRow<'a> {
    pub query: &'a str,
    pub rank: usize,
    pub name: &'a str,
    pub cas: String,
    pub match_factor: u16,
    pub reverse_match_factor: u16,
    pub hit_prob: f64,
    pub spec_loc: u32,
    pub lib_idx: usize,
    pub library: &'a str,
}

#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub num_queries: usize,
    pub num_failed: usize,
    pub num_hits: usize,
}

/// Reads every entry of a library-formatted file as a query.
///
/// Entries that fail to parse or have no signal are skipped with a warning.
pub fn load_queries(path: &Path) -> Result<Vec<Query>, CliError> {
    let st = Instant::now();
    let mut queries = Vec::new();
    for (i, entry) in read_library_file(path)?.enumerate() {
        match entry {
            Ok(record) if record.mass_spec.has_signal() => queries.push(Query {
                label: record.name,
                spectrum: record.mass_spec,
            }),
            Ok(record) => warn!("Skipping query {} ('{}'): no peaks with signal", i, record.name),
            Err(e) => warn!("Skipping query {}: {}", i, e),
        }
    }
    info!(
        "Loaded {} queries from {} in {:?}",
        queries.len(),
        path.display(),
        st.elapsed()
    );
    Ok(queries)
}

pub fn main_loop(
    engine: &dyn Engine,
    queries: &[Query],
    analysis: &AnalysisConfig,
    libraries: &[LibraryInfo],
    output: &OutputConfig,
) -> Result<RunSummary, CliError> {
    let start = Instant::now();
    let mut summary = RunSummary::default();

    let out_path = output.directory.join("results.csv");
    let mut writer = csv::Writer::from_path(&out_path).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(out_path.to_string_lossy().to_string()),
    })?;

    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .map_err(|e| CliError::Config {
        source: e.to_string(),
    })?;

    for chunk in queries
        .chunks(analysis.chunk_size)
        .progress_with_style(style)
    {
        for query in chunk {
            summary.num_queries += 1;
            // Each search is parallel over library candidates
            let hits = match engine.search(&query.spectrum, analysis.mode, analysis.n_hits) {
                Ok(hits) => hits,
                Err(e) => {
                    warn!("Query '{}' failed: {}", query.label, e);
                    summary.num_failed += 1;
                    continue;
                }
            };
            if let Some(best) = hits.first() {
                debug!("Best hit for '{}': {}", query.label, best);
            }
            summary.num_hits += hits.len();
            write_hits(&mut writer, &query.label, &hits, libraries)?;
        }
    }
    writer.flush()?;

    let elapsed = start.elapsed();
    let throughput = summary.num_queries as f64 / elapsed.as_secs_f64();
    info!(
        "Searched {} queries ({} failed) in {:?}, throughput: {:#.1}/s, wrote {} hits to {}",
        summary.num_queries,
        summary.num_failed,
        elapsed,
        throughput,
        summary.num_hits,
        out_path.display()
    );
    Ok(summary)
}

pub fn write_hits<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    label: &str,
    hits: &[SearchResult],
    libraries: &[LibraryInfo],
) -> Result<(), CliError> {
    for (rank, hit) in hits.iter().enumerate() {
        let library = libraries
            .iter()
            .find(|lib| lib.index == hit.lib_idx)
            .map(|lib| lib.name.as_str())
            .unwrap_or("");
        writer.serialize(ResultRow {
            query: label,
            rank: rank + 1,
            name: &hit.name,
            cas: hit.cas.to_string(),
            match_factor: hit.match_factor,
            reverse_match_factor: hit.reverse_match_factor,
            hit_prob: hit.hit_prob,
            spec_loc: hit.spec_loc,
            lib_idx: hit.lib_idx,
            library,
        })?;
    }
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let file = std::fs::File::create(path).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(path.to_string_lossy().to_string()),
    })?;
    serde_json::to_writer_pretty(file, value).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(path.to_string_lossy().to_string()),
    })
}
