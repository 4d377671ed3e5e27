use msseek::errors::ErrorKind;
use msseek::{
    CasNumber,
    IndexConfig,
    MsSeekError,
    ReferenceRecord,
    SearchConfig,
    SearchCoordinator,
    SearchMode,
    Spectrum,
};

fn spectrum(pairs: &[(f64, f64)]) -> Spectrum {
    Spectrum::from_peaks(pairs.iter().copied()).unwrap()
}

fn nitropyrene() -> ReferenceRecord {
    ReferenceRecord::new(
        "1-NITROPYRENE",
        CasNumber::parse("5522-43-0").unwrap(),
        247,
        spectrum(&[
            (51.0, 27.0),
            (74.0, 60.0),
            (187.0, 240.0),
            (189.0, 310.0),
            (200.0, 280.0),
            (201.0, 999.0),
            (217.0, 490.0),
            (247.0, 820.0),
        ]),
    )
    .with_formula("C16H9NO2")
}

fn dinitrophenol() -> ReferenceRecord {
    ReferenceRecord::new(
        "2,4-DINITROPHENOL",
        CasNumber::parse("51-28-5").unwrap(),
        184,
        spectrum(&[
            (51.0, 500.0),
            (53.0, 999.0),
            (63.0, 185.0),
            (79.0, 222.0),
            (91.0, 555.0),
            (107.0, 270.0),
            (154.0, 180.0),
            (184.0, 500.0),
        ]),
    )
    .with_formula("C6H4N2O5")
}

fn two_library_coordinator() -> SearchCoordinator {
    let mut coordinator = SearchCoordinator::default();
    let first = coordinator.load_library("nitropyrene", vec![nitropyrene()]);
    let second = coordinator.load_library("dinitrophenol", vec![dinitrophenol()]);
    assert_eq!(first.lib_idx, 0);
    assert_eq!(second.lib_idx, 1);
    coordinator
}

/// Small deterministic generator so fixtures do not need a rand dependency.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn spectrum(&mut self, n_peaks: usize) -> Spectrum {
        let pairs: Vec<(f64, f64)> = (0..n_peaks)
            .map(|_| {
                let mass = 30 + self.next() % 270;
                let intensity = 1 + self.next() % 999;
                (mass as f64, intensity as f64)
            })
            .collect();
        Spectrum::from_peaks(pairs).unwrap()
    }
}

fn synthetic_library(seed: u64, size: usize) -> Vec<ReferenceRecord> {
    let mut rng = Lcg(seed);
    (0..size)
        .map(|i| {
            let n_peaks = 5 + (rng.next() % 20) as usize;
            ReferenceRecord::new(
                format!("COMPOUND_{}", i),
                CasNumber::Unknown,
                0,
                rng.spectrum(n_peaks),
            )
        })
        .collect()
}

#[test]
fn test_single_peak_query_across_two_libraries() {
    let coordinator = two_library_coordinator();
    let query = spectrum(&[(51.0, 27.0)]);
    let hits = coordinator.full_spectrum_search(&query, 5).unwrap();

    assert_eq!(hits.len(), 2);
    for hit in hits.iter() {
        let expected_lib = match hit.name.as_str() {
            "1-NITROPYRENE" => 0,
            "2,4-DINITROPHENOL" => 1,
            other => panic!("Unexpected hit {}", other),
        };
        assert_eq!(hit.lib_idx, expected_lib);
        // Every peak of the query is in both references
        assert_eq!(hit.reverse_match_factor, 1000);
    }
    assert!(hits[0].match_factor >= hits[1].match_factor);
    let total_prob: f64 = hits.iter().map(|h| h.hit_prob).sum();
    assert!((total_prob - 1.0).abs() < 1e-9);

    let again = coordinator.full_spectrum_search(&query, 5).unwrap();
    assert_eq!(hits, again);
}

#[test]
fn test_n_hits_truncates_after_ranking() {
    let coordinator = two_library_coordinator();
    let query = spectrum(&[(51.0, 27.0)]);
    let all = coordinator.full_spectrum_search(&query, 5).unwrap();
    let one = coordinator.full_spectrum_search(&query, 1).unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].name, all[0].name);
    assert_eq!(one[0].hit_prob, 1.0);
    assert!(coordinator.full_spectrum_search(&query, 0).unwrap().is_empty());
}

#[test]
fn test_self_match_is_top_hit() {
    let coordinator = two_library_coordinator();
    let hits = coordinator
        .full_spectrum_search(&dinitrophenol().mass_spec, 5)
        .unwrap();
    assert_eq!(hits[0].name, "2,4-DINITROPHENOL");
    assert_eq!(hits[0].match_factor, 1000);
    assert_eq!(hits[0].reverse_match_factor, 1000);
}

#[test]
fn test_cas_search() {
    let coordinator = two_library_coordinator();
    let hits = coordinator.cas_search("51-28-5").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "2,4-DINITROPHENOL");
    assert_eq!(hits[0].lib_idx, 1);

    assert!(coordinator.cas_search("0-0-0").unwrap().is_empty());
    assert!(coordinator.cas_search("---").unwrap().is_empty());
    assert!(coordinator.cas_search("7732-18-5").unwrap().is_empty());
    assert_eq!(
        coordinator.cas_search("51-28-4").unwrap_err().kind(),
        ErrorKind::InvalidQuery
    );
}

#[test]
fn test_get_reference() {
    let coordinator = two_library_coordinator();
    let hits = coordinator
        .full_spectrum_search(&spectrum(&[(201.0, 999.0)]), 5)
        .unwrap();
    assert_eq!(hits.len(), 1);
    let record = coordinator
        .get_reference(hits[0].lib_idx, hits[0].spec_loc)
        .unwrap();
    assert_eq!(record.name, "1-NITROPYRENE");
    assert_eq!(record.formula, "C16H9NO2");

    assert!(matches!(
        coordinator.get_reference(0, 12345),
        Err(MsSeekError::NotFound {
            lib_idx: 0,
            spec_loc: Some(12345)
        })
    ));
}

#[test]
fn test_full_search_with_ref_data() {
    let coordinator = two_library_coordinator();
    let pairs = coordinator
        .full_search_with_ref_data(&spectrum(&[(51.0, 27.0)]), 5)
        .unwrap();
    assert_eq!(pairs.len(), 2);
    for (hit, record) in pairs.iter() {
        assert_eq!(hit.name, record.name);
        assert_eq!(hit.cas, record.cas);
        assert_eq!(hit.lib_idx, record.lib_idx);
        assert_eq!(hit.spec_loc, record.spec_loc);
    }
}

#[test]
fn test_full_search_recall_dominates_quick_search() {
    let mut coordinator = SearchCoordinator::new(SearchConfig {
        index: IndexConfig {
            index_peaks: 3,
            candidate_floor: 5,
        },
        ..Default::default()
    });
    coordinator.load_library("synthetic_a", synthetic_library(7, 400));
    coordinator.load_library("synthetic_b", synthetic_library(11, 400));

    let mut rng = Lcg(99);
    for _ in 0..20 {
        let query = rng.spectrum(8);
        let quick = coordinator.spectrum_search(&query, 10).unwrap();
        let full = coordinator.full_spectrum_search(&query, 10).unwrap();
        assert!(full.len() >= quick.len());
        for (q, f) in quick.iter().zip(full.iter()) {
            assert!(f.match_factor >= q.match_factor);
        }
    }

    // A planted record is found by both modes
    let planted = coordinator.library(1).unwrap().records()[123].clone();
    let quick = coordinator.spectrum_search(&planted.mass_spec, 3).unwrap();
    let full = coordinator.full_spectrum_search(&planted.mass_spec, 3).unwrap();
    assert_eq!(quick[0].name, planted.name);
    assert_eq!(full[0].name, planted.name);
    assert_eq!(full[0].lib_idx, 1);
    assert_eq!(full[0].match_factor, 1000);
}

#[test]
fn test_results_do_not_depend_on_batch_size() {
    let records = synthetic_library(3, 300);
    let query = Lcg(5).spectrum(10);

    let mut reference = None;
    for batch_size in [1, 7, 64, 512, 10_000] {
        let mut coordinator = SearchCoordinator::new(SearchConfig {
            batch_size,
            ..Default::default()
        });
        coordinator.load_library("synthetic", records.clone());
        let hits = coordinator.search(&query, SearchMode::Full, 25).unwrap();
        match &reference {
            None => reference = Some(hits),
            Some(expected) => assert_eq!(&hits, expected, "batch size {}", batch_size),
        }
    }
}

#[test]
fn test_errors_before_loading() {
    let coordinator = SearchCoordinator::default();
    assert!(matches!(
        coordinator.full_spectrum_search(&spectrum(&[(51.0, 27.0)]), 5),
        Err(MsSeekError::LibraryNotLoaded)
    ));
    assert!(coordinator.get_active_libs().is_empty());
    assert!(coordinator.list_libraries().is_empty());
}
