//! Mass spectral library search.
//!
//! Reference libraries are loaded into a [`SearchCoordinator`], which ranks
//! their records against query spectra using a weighted cosine similarity
//! on nominal masses. The same operations are available from another process
//! through [`remote::RemoteEngine`], both behind the [`Engine`] trait.
//!
//! ```
//! use msseek::{CasNumber, ReferenceRecord, SearchCoordinator, Spectrum};
//!
//! let mut coordinator = SearchCoordinator::default();
//! let spectrum = Spectrum::from_peaks(vec![(43.0, 999.0), (58.0, 300.0)]).unwrap();
//! let record = ReferenceRecord::new("ACETONE", CasNumber::parse("67-64-1").unwrap(), 58, spectrum.clone());
//! coordinator.load_library("mainlib", vec![record]);
//!
//! let hits = coordinator.full_spectrum_search(&spectrum, 5).unwrap();
//! assert_eq!(hits[0].name, "ACETONE");
//! assert_eq!(hits[0].match_factor, 1000);
//! ```

pub mod config;
pub mod data_sources;
pub mod engine;
pub mod errors;
pub mod models;
pub mod remote;
pub mod scoring;
pub mod search;
pub mod utils;

pub use config::{
    IndexConfig,
    ScoringConfig,
    SearchConfig,
};
pub use engine::Engine;
pub use errors::{
    MsSeekError,
    Result,
};
pub use models::{
    CasNumber,
    Peak,
    ReferenceRecord,
    SearchResult,
    Spectrum,
};
pub use search::{
    CancellationToken,
    LibraryHandle,
    LibraryInfo,
    LoadReport,
    SearchCoordinator,
    SearchMode,
};
