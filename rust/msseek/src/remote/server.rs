use super::protocol::{
    READY,
    RemoteError,
    Request,
    Response,
};
use crate::engine::Engine;
use crate::errors::{
    ErrorKind,
    MsSeekError,
    Result,
};
use serde::Serialize;
use std::io::{
    BufRead,
    BufReader,
    Write,
};
use std::net::TcpStream;
use std::time::Instant;
use tracing::{
    debug,
    warn,
};

fn respond<T: Serialize>(result: Result<T>) -> Response {
    match result {
        Ok(data) => Response::success(&data),
        Err(e) => Response::Error(RemoteError::from(&e)),
    }
}

/// Runs one request against an engine.
pub fn handle_request<E: Engine + ?Sized>(engine: &E, request: Request) -> Response {
    match request {
        Request::Ping => Response::success(&READY),
        Request::Search {
            query,
            mode,
            n_hits,
        } => respond(engine.search(&query, mode, n_hits)),
        Request::SearchWithRefData { query, n_hits } => {
            respond(engine.search_with_ref_data(&query, n_hits))
        }
        Request::CasSearch { cas } => respond(engine.cas_search(&cas)),
        Request::GetReference { lib_idx, spec_loc } => {
            respond(engine.get_reference(lib_idx, spec_loc))
        }
        Request::ListLibraries => respond(engine.list_libraries()),
    }
}

/// Parses and runs one request line. Malformed lines become error responses.
pub fn handle_line<E: Engine + ?Sized>(engine: &E, line: &str) -> Response {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => handle_request(engine, request),
        Err(e) => Response::Error(RemoteError {
            kind: ErrorKind::Parse,
            message: format!("Invalid request: {}", e),
            lib_idx: None,
            spec_loc: None,
        }),
    }
}

/// Answers requests on `stream` until the peer closes it.
pub fn serve_connection<E: Engine + ?Sized>(stream: TcpStream, engine: &E) -> Result<()> {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown peer".into());
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            debug!("{} disconnected", peer);
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        let start = Instant::now();
        let response = handle_line(engine, &line);
        if let Response::Error(e) = &response {
            warn!("Request from {} failed: {:?} {}", peer, e.kind, e.message);
        }
        debug!("Request from {} took {:?}", peer, start.elapsed());

        let mut out = serde_json::to_string(&response).map_err(MsSeekError::from)?;
        out.push('\n');
        writer.write_all(out.as_bytes())?;
        writer.flush()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CasNumber,
        ReferenceRecord,
        Spectrum,
    };
    use crate::search::SearchCoordinator;

    fn coordinator() -> SearchCoordinator {
        let mut coord = SearchCoordinator::default();
        coord.load_library(
            "lib.msp",
            vec![ReferenceRecord::new(
                "ACETONE",
                CasNumber::parse("67-64-1").unwrap(),
                58,
                Spectrum::from_peaks(vec![(43.0, 999.0), (58.0, 300.0)]).unwrap(),
            )],
        );
        coord
    }

    #[test]
    fn test_handle_line() {
        let coord = coordinator();
        assert_eq!(
            handle_line(&coord, r#"{"type": "ping"}"#),
            Response::Success(serde_json::json!("ready"))
        );

        let found = handle_line(&coord, r#"{"type": "cas_search", "cas": "67-64-1"}"#);
        match found {
            Response::Success(data) => assert_eq!(data[0]["name"], "ACETONE"),
            other => panic!("Expected success, got {:?}", other),
        }

        match handle_line(&coord, r#"{"type": "get_reference", "lib_idx": 0, "spec_loc": 3}"#) {
            Response::Error(e) => assert_eq!(e.kind, ErrorKind::NotFound),
            other => panic!("Expected an error, got {:?}", other),
        }

        match handle_line(&coord, "this is not json") {
            Response::Error(e) => assert_eq!(e.kind, ErrorKind::Parse),
            other => panic!("Expected an error, got {:?}", other),
        }
    }
}
