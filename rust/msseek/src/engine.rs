//! The capabilities shared by the in-process and remote search engines.

use crate::errors::Result;
use crate::models::{
    ReferenceRecord,
    SearchResult,
    Spectrum,
};
use crate::search::{
    LibraryInfo,
    SearchCoordinator,
    SearchMode,
};

/// A library search engine.
///
/// [`SearchCoordinator`] searches in-process, [`crate::remote::RemoteEngine`]
/// forwards every call to a `msseek_rts` daemon. Callers choose one when they
/// construct it; code written against `&dyn Engine` works with both.
pub trait Engine {
    fn search(&self, query: &Spectrum, mode: SearchMode, n_hits: usize)
    -> Result<Vec<SearchResult>>;

    /// Full search returning the reference record of every hit.
    fn search_with_ref_data(
        &self,
        query: &Spectrum,
        n_hits: usize,
    ) -> Result<Vec<(SearchResult, ReferenceRecord)>>;

    fn cas_search(&self, cas: &str) -> Result<Vec<SearchResult>>;

    fn get_reference(&self, lib_idx: usize, spec_loc: u32) -> Result<ReferenceRecord>;

    fn list_libraries(&self) -> Result<Vec<LibraryInfo>>;

    fn spectrum_search(&self, query: &Spectrum, n_hits: usize) -> Result<Vec<SearchResult>> {
        self.search(query, SearchMode::Quick, n_hits)
    }

    fn full_spectrum_search(&self, query: &Spectrum, n_hits: usize) -> Result<Vec<SearchResult>> {
        self.search(query, SearchMode::Full, n_hits)
    }
}

impl Engine for SearchCoordinator {
    fn search(
        &self,
        query: &Spectrum,
        mode: SearchMode,
        n_hits: usize,
    ) -> Result<Vec<SearchResult>> {
        SearchCoordinator::search(self, query, mode, n_hits)
    }

    fn search_with_ref_data(
        &self,
        query: &Spectrum,
        n_hits: usize,
    ) -> Result<Vec<(SearchResult, ReferenceRecord)>> {
        self.full_search_with_ref_data(query, n_hits)
    }

    fn cas_search(&self, cas: &str) -> Result<Vec<SearchResult>> {
        SearchCoordinator::cas_search(self, cas)
    }

    fn get_reference(&self, lib_idx: usize, spec_loc: u32) -> Result<ReferenceRecord> {
        SearchCoordinator::get_reference(self, lib_idx, spec_loc)
    }

    fn list_libraries(&self) -> Result<Vec<LibraryInfo>> {
        Ok(SearchCoordinator::list_libraries(self))
    }
}
