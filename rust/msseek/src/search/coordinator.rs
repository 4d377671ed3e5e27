//! Multi-library search sessions.
//!
//! A [`SearchCoordinator`] owns its libraries. Loading needs `&mut self` and
//! searching only `&self`, so once the coordinator is shared (for example in
//! an `Arc`) the library set is frozen for every search that reads it.

use super::cancel::CancellationToken;
use super::library::{
    Library,
    LoadReport,
};
use crate::config::SearchConfig;
use crate::data_sources::speclib::read_library_file;
use crate::errors::{
    MsSeekError,
    Result,
};
use crate::models::{
    CasNumber,
    ReferenceRecord,
    SearchResult,
    Spectrum,
};
use crate::scoring::accumulator::HitAccumulator;
use crate::scoring::ranking::hit_probabilities;
use crate::scoring::{
    ScoredCandidate,
    SearchTimings,
    SimilarityScorer,
    WeightedSpectrum,
    rank_candidates,
};
use crate::utils::lib_name_from_path;
use serde::{
    Deserialize,
    Serialize,
};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

#[cfg(not(feature = "serial_scoring"))]
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Only records sharing a major peak with the query are scored.
    #[default]
    Quick,
    /// Every record of every library is scored.
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryInfo {
    pub index: usize,
    pub name: String,
    pub num_records: usize,
}

/// Returned by the `load_library*` methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryHandle {
    pub lib_idx: usize,
    pub name: String,
    pub report: LoadReport,
}

#[derive(Debug, Default)]
pub struct SearchCoordinator {
    config: SearchConfig,
    scorer: SimilarityScorer,
    libraries: Vec<Library>,
}

impl SearchCoordinator {
    pub fn new(config: SearchConfig) -> Self {
        let scorer = SimilarityScorer::new(config.scoring.clone());
        Self {
            config,
            scorer,
            libraries: Vec::new(),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Adds an in-memory library. It gets the next `lib_idx`.
    pub fn load_library(
        &mut self,
        name: impl Into<String>,
        records: Vec<ReferenceRecord>,
    ) -> LibraryHandle {
        self.load_library_entries(name, records.into_iter().map(Ok))
    }

    /// Adds a library from entries that may have failed to parse.
    ///
    /// Failed entries are reported in the handle and skipped.
    pub fn load_library_entries<I>(&mut self, name: impl Into<String>, entries: I) -> LibraryHandle
    where
        I: IntoIterator<Item = Result<ReferenceRecord>>,
    {
        let lib_idx = self.libraries.len();
        let (library, report) = Library::load(
            name,
            lib_idx,
            entries,
            self.scorer.clone(),
            self.config.index.clone(),
        );
        let handle = LibraryHandle {
            lib_idx,
            name: library.name().to_string(),
            report,
        };
        self.libraries.push(library);
        handle
    }

    /// Reads a library file (any supported format) and adds it.
    ///
    /// The library is named after the final component of the path.
    pub fn load_library_file(&mut self, path: impl AsRef<Path>) -> Result<LibraryHandle> {
        let path = path.as_ref();
        let entries = read_library_file(path)?;
        let name = lib_name_from_path(&path.to_string_lossy());
        Ok(self.load_library_entries(name, entries))
    }

    pub fn library(&self, lib_idx: usize) -> Option<&Library> {
        self.libraries.get(lib_idx)
    }

    fn library_or_not_found(&self, lib_idx: usize) -> Result<&Library> {
        self.libraries.get(lib_idx).ok_or(MsSeekError::NotFound {
            lib_idx,
            spec_loc: None,
        })
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.libraries.is_empty() {
            return Err(MsSeekError::LibraryNotLoaded);
        }
        Ok(())
    }

    fn prepare_query(&self, query: &Spectrum) -> Result<WeightedSpectrum> {
        let prepared = self
            .scorer
            .prepare(query)
            .map_err(|e| MsSeekError::InvalidQuery {
                context: e.to_string(),
            })?;
        if prepared.is_empty() {
            return Err(MsSeekError::InvalidQuery {
                context: "query has no scorable peaks".into(),
            });
        }
        Ok(prepared)
    }

    fn score_batch(
        &self,
        query: &WeightedSpectrum,
        batch: &[(usize, usize)],
        cancel: Option<&CancellationToken>,
    ) -> Option<(Vec<ScoredCandidate>, std::time::Duration)> {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return None;
        }
        let start = Instant::now();
        let hits = batch
            .iter()
            .filter_map(|&(lib_idx, position)| {
                let reference = self.libraries[lib_idx].prepared_at(position);
                let scores = self.scorer.score(query, reference);
                // Records without a single shared peak are not hits.
                (scores.matched_peaks > 0).then_some(ScoredCandidate {
                    lib_idx,
                    position,
                    scores,
                })
            })
            .collect();
        Some((hits, start.elapsed()))
    }

    /// (lib_idx, position) pairs to score, in library order.
    fn select_candidates(
        &self,
        prepared: &WeightedSpectrum,
        mode: SearchMode,
    ) -> Vec<(usize, usize)> {
        self.libraries
            .iter()
            .flat_map(|lib| {
                let positions = match mode {
                    SearchMode::Quick => lib.candidate_positions(prepared),
                    SearchMode::Full => (0..lib.len()).collect(),
                };
                positions.into_iter().map(move |p| (lib.lib_idx(), p))
            })
            .collect()
    }

    /// A single skipped batch fails the whole search.
    fn collect_hits(
        accumulated: HitAccumulator,
        timings: &mut SearchTimings,
    ) -> Result<Vec<ScoredCandidate>> {
        if accumulated.cancelled {
            debug!("Search cancelled after scoring {:?}", accumulated.scoring_time);
            return Err(MsSeekError::Cancelled);
        }
        timings.scoring = accumulated.scoring_time;
        Ok(accumulated.hits)
    }

    fn search_candidates(
        &self,
        query: &Spectrum,
        mode: SearchMode,
        n_hits: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<(Vec<ScoredCandidate>, SearchTimings)> {
        self.ensure_loaded()?;
        let mut timings = SearchTimings::default();

        let start = Instant::now();
        let prepared = self.prepare_query(query)?;
        let candidates = self.select_candidates(&prepared, mode);
        timings.candidate_selection = start.elapsed();
        timings.num_candidates = candidates.len();

        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(MsSeekError::Cancelled);
        }

        let batch_size = self.config.batch_size.max(1);

        #[cfg(not(feature = "serial_scoring"))]
        let accumulated: HitAccumulator = candidates
            .par_chunks(batch_size)
            .map(|batch| self.score_batch(&prepared, batch, cancel))
            .collect();

        #[cfg(feature = "serial_scoring")]
        let accumulated: HitAccumulator = candidates
            .chunks(batch_size)
            .map(|batch| self.score_batch(&prepared, batch, cancel))
            .collect();

        let hits = Self::collect_hits(accumulated, &mut timings)?;

        let start = Instant::now();
        let ranked = rank_candidates(hits, n_hits);
        timings.ranking = start.elapsed();

        debug!(
            "{:?} search scored {} candidates, kept {} hits: {:?}",
            mode,
            timings.num_candidates,
            ranked.len(),
            timings
        );
        Ok((ranked, timings))
    }

    fn to_results(&self, ranked: &[ScoredCandidate]) -> Vec<SearchResult> {
        let probabilities = hit_probabilities(ranked);
        ranked
            .iter()
            .zip(probabilities)
            .map(|(hit, hit_prob)| {
                let record = self.libraries[hit.lib_idx].record_at(hit.position);
                let mut result =
                    SearchResult::from_reference(record, hit.scores.forward, hit.scores.reverse);
                result.hit_prob = hit_prob;
                result
            })
            .collect()
    }

    /// Like [`SearchCoordinator::search`], also returning stage timings.
    pub fn search_timed(
        &self,
        query: &Spectrum,
        mode: SearchMode,
        n_hits: usize,
    ) -> Result<(Vec<SearchResult>, SearchTimings)> {
        let (ranked, timings) = self.search_candidates(query, mode, n_hits, None)?;
        Ok((self.to_results(&ranked), timings))
    }

    /// Ranks library records against the query and returns up to `n_hits`.
    ///
    /// Fails with [`MsSeekError::LibraryNotLoaded`] when no library has been
    /// loaded and [`MsSeekError::InvalidQuery`] when the query has no peaks
    /// with signal.
    pub fn search(
        &self,
        query: &Spectrum,
        mode: SearchMode,
        n_hits: usize,
    ) -> Result<Vec<SearchResult>> {
        let (results, _) = self.search_timed(query, mode, n_hits)?;
        Ok(results)
    }

    /// Same as [`SearchCoordinator::search`], checking `cancel` before every
    /// candidate batch.
    pub fn search_with_cancel(
        &self,
        query: &Spectrum,
        mode: SearchMode,
        n_hits: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        let (ranked, _) = self.search_candidates(query, mode, n_hits, Some(cancel))?;
        Ok(self.to_results(&ranked))
    }

    pub fn spectrum_search(&self, query: &Spectrum, n_hits: usize) -> Result<Vec<SearchResult>> {
        self.search(query, SearchMode::Quick, n_hits)
    }

    pub fn full_spectrum_search(
        &self,
        query: &Spectrum,
        n_hits: usize,
    ) -> Result<Vec<SearchResult>> {
        self.search(query, SearchMode::Full, n_hits)
    }

    /// Full search that also resolves the reference record of every hit.
    pub fn full_search_with_ref_data(
        &self,
        query: &Spectrum,
        n_hits: usize,
    ) -> Result<Vec<(SearchResult, ReferenceRecord)>> {
        self.full_spectrum_search(query, n_hits)?
            .into_iter()
            .map(|hit| {
                let record = self.get_reference(hit.lib_idx, hit.spec_loc)?;
                Ok((hit, record))
            })
            .collect()
    }

    /// Every record, across all libraries, with the given CAS number.
    ///
    /// Hits carry zero match factors. The unknown sentinels (`---`, `0-0-0`)
    /// match nothing.
    pub fn cas_search(&self, cas: &str) -> Result<Vec<SearchResult>> {
        self.ensure_loaded()?;
        let wanted = CasNumber::parse(cas).map_err(|e| MsSeekError::InvalidQuery {
            context: e.to_string(),
        })?;
        if !wanted.is_known() {
            return Ok(Vec::new());
        }
        let hits = self
            .libraries
            .iter()
            .flat_map(|lib| lib.records().iter())
            .filter(|record| record.cas == wanted)
            .map(|record| SearchResult::from_reference(record, 0, 0))
            .collect();
        Ok(hits)
    }

    pub fn get_reference(&self, lib_idx: usize, spec_loc: u32) -> Result<ReferenceRecord> {
        self.ensure_loaded()?;
        self.library_or_not_found(lib_idx)?
            .get(spec_loc)
            .cloned()
    }

    /// Indices of the loaded libraries, in load order.
    pub fn get_active_libs(&self) -> Vec<usize> {
        self.libraries.iter().map(|lib| lib.lib_idx()).collect()
    }

    /// Names of the loaded libraries, in load order.
    pub fn get_lib_paths(&self) -> Vec<String> {
        self.libraries
            .iter()
            .map(|lib| lib.name().to_string())
            .collect()
    }

    pub fn list_libraries(&self) -> Vec<LibraryInfo> {
        self.libraries
            .iter()
            .map(|lib| LibraryInfo {
                index: lib.lib_idx(),
                name: lib.name().to_string(),
                num_records: lib.len(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, cas: &str, peaks: &[(f64, f64)]) -> ReferenceRecord {
        ReferenceRecord::new(
            name,
            CasNumber::parse(cas).unwrap(),
            0,
            Spectrum::from_peaks(peaks.iter().copied()).unwrap(),
        )
    }

    fn coordinator() -> SearchCoordinator {
        let mut coord = SearchCoordinator::default();
        coord.load_library(
            "first.msp",
            vec![
                record("BENZENE", "71-43-2", &[(78.0, 999.0), (77.0, 200.0), (51.0, 150.0)]),
                record("TOLUENE", "108-88-3", &[(91.0, 999.0), (92.0, 600.0), (65.0, 100.0)]),
            ],
        );
        coord.load_library(
            "second.msp",
            vec![record("BENZENE", "71-43-2", &[(78.0, 999.0), (77.0, 200.0), (51.0, 150.0)])],
        );
        coord
    }

    #[test]
    fn test_requires_library() {
        let coord = SearchCoordinator::default();
        let query = Spectrum::sample();
        assert!(matches!(
            coord.spectrum_search(&query, 5),
            Err(MsSeekError::LibraryNotLoaded)
        ));
        assert!(matches!(
            coord.cas_search("71-43-2"),
            Err(MsSeekError::LibraryNotLoaded)
        ));
        assert!(matches!(
            coord.get_reference(0, 0),
            Err(MsSeekError::LibraryNotLoaded)
        ));
    }

    #[test]
    fn test_silent_query_is_invalid() {
        let coord = coordinator();
        let silent = Spectrum::from_peaks(vec![(78.0, 0.0)]).unwrap();
        assert!(matches!(
            coord.full_spectrum_search(&silent, 5),
            Err(MsSeekError::InvalidQuery { .. })
        ));
        assert!(matches!(
            coord.full_spectrum_search(&Spectrum::default(), 5),
            Err(MsSeekError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_exact_ties_keep_library_order() {
        let coord = coordinator();
        let query =
            Spectrum::from_peaks(vec![(78.0, 999.0), (77.0, 200.0), (51.0, 150.0)]).unwrap();
        let hits = coord.full_spectrum_search(&query, 5).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].lib_idx, 0);
        assert_eq!(hits[1].lib_idx, 1);
        assert_eq!(hits[0].match_factor, 1000);
        assert_eq!(hits[1].match_factor, 1000);
        assert!((hits[0].hit_prob - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_cancelled_search() {
        let coord = coordinator();
        let token = CancellationToken::new();
        token.cancel();
        let query = Spectrum::from_peaks(vec![(78.0, 999.0)]).unwrap();
        assert!(matches!(
            coord.search_with_cancel(&query, SearchMode::Full, 5, &token),
            Err(MsSeekError::Cancelled)
        ));

        let fresh = CancellationToken::new();
        assert_eq!(
            coord
                .search_with_cancel(&query, SearchMode::Full, 5, &fresh)
                .unwrap(),
            coord.full_spectrum_search(&query, 5).unwrap()
        );
    }

    #[test]
    fn test_cancel_between_batches() {
        let mut coord = SearchCoordinator::new(SearchConfig {
            batch_size: 1,
            ..Default::default()
        });
        coord.load_library(
            "first.msp",
            vec![
                record("BENZENE", "71-43-2", &[(78.0, 999.0), (77.0, 200.0)]),
                record("TOLUENE", "108-88-3", &[(91.0, 999.0), (92.0, 600.0)]),
            ],
        );
        coord.load_library(
            "second.msp",
            vec![record("BENZENE", "71-43-2", &[(78.0, 999.0), (77.0, 200.0)])],
        );
        let query = Spectrum::from_peaks(vec![(78.0, 999.0)]).unwrap();
        let prepared = coord.prepare_query(&query).unwrap();
        let candidates = coord.select_candidates(&prepared, SearchMode::Full);
        assert_eq!(candidates, vec![(0, 0), (0, 1), (1, 0)]);

        // The token flips once the first batch has been scored
        let token = CancellationToken::new();
        let accumulated: HitAccumulator = candidates
            .chunks(coord.config.batch_size)
            .map(|batch| {
                let scored = coord.score_batch(&prepared, batch, Some(&token));
                token.cancel();
                scored
            })
            .collect();
        assert!(accumulated.cancelled);
        assert_eq!(accumulated.hits.len(), 1);
        assert_eq!((accumulated.hits[0].lib_idx, accumulated.hits[0].position), (0, 0));

        let mut timings = SearchTimings::default();
        assert!(matches!(
            SearchCoordinator::collect_hits(accumulated, &mut timings),
            Err(MsSeekError::Cancelled)
        ));
    }

    #[test]
    fn test_search_timings_count_candidates() {
        let coord = coordinator();
        let query = Spectrum::from_peaks(vec![(91.0, 999.0), (92.0, 600.0)]).unwrap();
        let (full, full_timings) = coord.search_timed(&query, SearchMode::Full, 5).unwrap();
        assert_eq!(full_timings.num_candidates, 3);
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].name, "TOLUENE");

        let (quick, quick_timings) = coord.search_timed(&query, SearchMode::Quick, 5).unwrap();
        assert!(quick_timings.num_candidates <= full_timings.num_candidates);
        assert_eq!(quick, full);
    }

    #[test]
    fn test_introspection() {
        let coord = coordinator();
        assert_eq!(coord.get_active_libs(), vec![0, 1]);
        assert_eq!(coord.get_lib_paths(), vec!["first.msp", "second.msp"]);
        let infos = coord.list_libraries();
        assert_eq!(infos[0].num_records, 2);
        assert_eq!(infos[1].name, "second.msp");
    }

    #[test]
    fn test_unknown_library_index() {
        let coord = coordinator();
        assert!(matches!(
            coord.get_reference(9, 0),
            Err(MsSeekError::NotFound {
                lib_idx: 9,
                spec_loc: None
            })
        ));
    }
}
