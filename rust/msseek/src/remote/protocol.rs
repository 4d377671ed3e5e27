//! Newline-delimited JSON messages exchanged with `msseek_rts`.
//!
//! Every request is a single JSON object on one line, tagged by `type`:
//!
//! ```json
//! {"type": "search", "query": {"mass_list": [51.0], "intensity_list": [27.0]}, "mode": "full", "n_hits": 5}
//! ```
//!
//! Every response is one line too, either
//! `{"status": "success", "data": ...}` or
//! `{"status": "error", "data": {"kind": "not_found", "message": "...", ...}}`.

use crate::errors::{
    ErrorKind,
    MsSeekError,
};
use crate::models::Spectrum;
use crate::search::SearchMode;
use serde::{
    Deserialize,
    Serialize,
};

/// Answer to a [`Request::Ping`] once the daemon can serve searches.
pub const READY: &str = "ready";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Search {
        query: Spectrum,
        #[serde(default)]
        mode: SearchMode,
        n_hits: usize,
    },
    SearchWithRefData {
        query: Spectrum,
        n_hits: usize,
    },
    CasSearch {
        cas: String,
    },
    GetReference {
        lib_idx: usize,
        spec_loc: u32,
    },
    ListLibraries,
}

impl Request {
    pub fn sample() -> Self {
        Request::Search {
            query: Spectrum::sample(),
            mode: SearchMode::Quick,
            n_hits: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Response {
    Success(serde_json::Value),
    Error(RemoteError),
}

impl Response {
    pub fn success<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Response::Success(value),
            Err(e) => Response::Error(RemoteError::from(&MsSeekError::from(e))),
        }
    }
}

/// Serializable form of an [`MsSeekError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lib_idx: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_loc: Option<u32>,
}

impl From<&MsSeekError> for RemoteError {
    fn from(e: &MsSeekError) -> Self {
        let (lib_idx, spec_loc) = match e {
            MsSeekError::NotFound { lib_idx, spec_loc } => (Some(*lib_idx), *spec_loc),
            _ => (None, None),
        };
        let message = match e {
            MsSeekError::InvalidSpectrum { context }
            | MsSeekError::EmptySpectrum { context }
            | MsSeekError::InvalidQuery { context } => context.clone(),
            MsSeekError::Remote { msg, .. } => msg.clone(),
            other => other.to_string(),
        };
        RemoteError {
            kind: e.kind(),
            message,
            lib_idx,
            spec_loc,
        }
    }
}

impl From<RemoteError> for MsSeekError {
    fn from(e: RemoteError) -> Self {
        match e.kind {
            ErrorKind::InvalidSpectrum => MsSeekError::InvalidSpectrum { context: e.message },
            ErrorKind::EmptySpectrum => MsSeekError::EmptySpectrum { context: e.message },
            ErrorKind::InvalidQuery => MsSeekError::InvalidQuery { context: e.message },
            ErrorKind::LibraryNotLoaded => MsSeekError::LibraryNotLoaded,
            ErrorKind::Cancelled => MsSeekError::Cancelled,
            ErrorKind::NotFound if e.lib_idx.is_some() => MsSeekError::NotFound {
                lib_idx: e.lib_idx.unwrap_or_default(),
                spec_loc: e.spec_loc,
            },
            kind => MsSeekError::Remote {
                kind,
                msg: e.message,
            },
        }
    }
}
