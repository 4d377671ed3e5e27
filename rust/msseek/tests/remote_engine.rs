use msseek::errors::ErrorKind;
use msseek::remote::{
    Backoff,
    RemoteEngine,
    RetryPolicy,
    serve_connection,
};
use msseek::{
    CasNumber,
    Engine,
    MsSeekError,
    ReferenceRecord,
    SearchCoordinator,
    SearchMode,
    SearchResult,
    Spectrum,
};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::{
    Duration,
    Instant,
};

fn coordinator() -> SearchCoordinator {
    let mut coordinator = SearchCoordinator::default();
    coordinator.load_library(
        "mainlib",
        vec![
            ReferenceRecord::sample(),
            ReferenceRecord::new(
                "ACETONE",
                CasNumber::parse("67-64-1").unwrap(),
                58,
                Spectrum::from_peaks(vec![(43.0, 999.0), (58.0, 300.0)]).unwrap(),
            ),
        ],
    );
    coordinator.load_library(
        r"C:\NIST\replib",
        vec![ReferenceRecord::new(
            "BUTANONE",
            CasNumber::parse("78-93-3").unwrap(),
            72,
            Spectrum::from_peaks(vec![(43.0, 999.0), (72.0, 250.0), (57.0, 60.0)]).unwrap(),
        )],
    );
    coordinator
}

/// Serves every connection on its own thread, like the daemon does.
fn spawn_server(coordinator: Arc<SearchCoordinator>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            let coordinator = Arc::clone(&coordinator);
            std::thread::spawn(move || {
                let _ = serve_connection(stream, coordinator.as_ref());
            });
        }
    });
    addr
}

/// JSON float parsing may move `hit_prob` by an ulp, everything else is exact.
fn assert_same_hits(expected: &[SearchResult], actual: &[SearchResult]) {
    assert_eq!(expected.len(), actual.len());
    for (e, a) in expected.iter().zip(actual.iter()) {
        assert_eq!(e.name, a.name);
        assert_eq!(e.cas, a.cas);
        assert_eq!(e.match_factor, a.match_factor);
        assert_eq!(e.reverse_match_factor, a.reverse_match_factor);
        assert_eq!((e.lib_idx, e.spec_loc), (a.lib_idx, a.spec_loc));
        assert!((e.hit_prob - a.hit_prob).abs() < 1e-12);
    }
}

fn quick_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 20,
        backoff: Backoff::Fixed(Duration::from_millis(50)),
        deadline: Some(Duration::from_secs(10)),
        io_timeout: Some(Duration::from_secs(5)),
    }
}

#[test]
fn test_remote_engine_matches_local_engine() {
    let local = Arc::new(coordinator());
    let addr = spawn_server(Arc::clone(&local));
    let remote = RemoteEngine::connect(addr, &quick_policy()).unwrap();

    let engines: [&dyn Engine; 2] = [local.as_ref(), &remote];
    let query = Spectrum::from_peaks(vec![(43.0, 999.0), (58.0, 280.0)]).unwrap();

    let local_hits = engines[0].search(&query, SearchMode::Full, 5).unwrap();
    let remote_hits = engines[1].search(&query, SearchMode::Full, 5).unwrap();
    assert_same_hits(&local_hits, &remote_hits);
    assert_eq!(remote_hits[0].name, "ACETONE");

    assert_same_hits(
        &engines[0].spectrum_search(&query, 5).unwrap(),
        &engines[1].spectrum_search(&query, 5).unwrap(),
    );

    let with_ref = engines[1].search_with_ref_data(&query, 2).unwrap();
    assert_eq!(with_ref.len(), 2);
    assert_eq!(with_ref[0].0.name, with_ref[0].1.name);

    let cas_hits = engines[1].cas_search("78-93-3").unwrap();
    assert_eq!(cas_hits.len(), 1);
    assert_eq!(cas_hits[0].lib_idx, 1);
    assert!(engines[1].cas_search("---").unwrap().is_empty());

    let record = engines[1]
        .get_reference(cas_hits[0].lib_idx, cas_hits[0].spec_loc)
        .unwrap();
    assert_eq!(record.name, "BUTANONE");
    assert_eq!(record.mw, 72);

    let libraries = engines[1].list_libraries().unwrap();
    assert_eq!(libraries.len(), 2);
    assert_eq!(libraries[1].name, r"C:\NIST\replib");
}

#[test]
fn test_remote_errors_keep_their_kind() {
    let addr = spawn_server(Arc::new(coordinator()));
    let remote = RemoteEngine::connect(addr, &quick_policy()).unwrap();

    assert!(matches!(
        remote.get_reference(0, 999),
        Err(MsSeekError::NotFound {
            lib_idx: 0,
            spec_loc: Some(999)
        })
    ));
    assert!(matches!(
        remote.get_reference(5, 0),
        Err(MsSeekError::NotFound {
            lib_idx: 5,
            spec_loc: None
        })
    ));

    let silent = Spectrum::from_peaks(vec![(43.0, 0.0)]).unwrap();
    assert_eq!(
        remote
            .full_spectrum_search(&silent, 5)
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidQuery
    );

    // The connection survives failed requests
    assert_eq!(remote.list_libraries().unwrap().len(), 2);
}

#[test]
fn test_empty_daemon_reports_library_not_loaded() {
    let addr = spawn_server(Arc::new(SearchCoordinator::default()));
    let remote = RemoteEngine::connect(addr, &quick_policy()).unwrap();
    assert!(matches!(
        remote.cas_search("67-64-1"),
        Err(MsSeekError::LibraryNotLoaded)
    ));
    assert!(remote.list_libraries().unwrap().is_empty());
}

#[test]
fn test_connect_waits_for_late_daemon() {
    // Reserve a port, release it, and only start listening after a delay.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let server_addr = addr.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        let listener = TcpListener::bind(&server_addr).unwrap();
        let coordinator = coordinator();
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            let _ = serve_connection(stream, &coordinator);
        }
    });

    let remote = RemoteEngine::connect(addr, &quick_policy()).unwrap();
    assert_eq!(remote.list_libraries().unwrap().len(), 2);
}

#[test]
fn test_silent_daemon_hits_the_deadline() {
    // Accepts connections and holds them open without ever answering.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    std::thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming() {
            held.push(stream);
        }
    });

    let policy = RetryPolicy {
        max_attempts: 1000,
        backoff: Backoff::Fixed(Duration::from_millis(10)),
        deadline: Some(Duration::from_millis(300)),
        io_timeout: Some(Duration::from_secs(30)),
    };
    let start = Instant::now();
    let result = RemoteEngine::connect(addr, &policy);
    assert!(matches!(result, Err(MsSeekError::Timeout { .. })));
    assert!(start.elapsed() < Duration::from_secs(5));
}
