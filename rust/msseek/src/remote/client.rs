use super::protocol::{
    READY,
    Request,
    Response,
};
use crate::engine::Engine;
use crate::errors::{
    MsSeekError,
    Result,
};
use crate::models::{
    ReferenceRecord,
    SearchResult,
    Spectrum,
};
use crate::search::{
    LibraryInfo,
    SearchMode,
};
use serde::de::DeserializeOwned;
use std::io::{
    BufRead,
    BufReader,
    Write,
};
use std::net::{
    TcpStream,
    ToSocketAddrs,
};
use std::sync::Mutex;
use std::time::{
    Duration,
    Instant,
};
use tracing::{
    debug,
    info,
};

/// Long enough for a full search of a large library.
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);
const MIN_SOCKET_TIMEOUT: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    /// `initial * factor^attempt`, capped at `max`.
    Exponential {
        initial: Duration,
        factor: f64,
        max: Duration,
    },
}

/// Bounded retries for reaching a daemon that may still be starting.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Gives up once this much time has passed, even with attempts left.
    pub deadline: Option<Duration>,
    /// Bound on connecting and on each read or write of a request.
    ///
    /// While connecting it is further cut down to what is left of `deadline`.
    pub io_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    /// 240 attempts half a second apart, about two minutes.
    fn default() -> Self {
        Self {
            max_attempts: 240,
            backoff: Backoff::Fixed(Duration::from_millis(500)),
            deadline: None,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Fixed(Duration::ZERO),
            deadline: None,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
        }
    }

    /// Socket timeout for an attempt started `elapsed` after the first one.
    pub fn attempt_timeout(&self, elapsed: Duration) -> Option<Duration> {
        let remaining = self
            .deadline
            .map(|deadline| deadline.saturating_sub(elapsed));
        let timeout = match (self.io_timeout, remaining) {
            (Some(io), Some(left)) => Some(io.min(left)),
            (io, left) => io.or(left),
        };
        // Zero is rejected by the socket setters
        timeout.map(|t| t.max(MIN_SOCKET_TIMEOUT))
    }

    /// Wait after the zero-based `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential {
                initial,
                factor,
                max,
            } => {
                let scaled = initial.as_secs_f64() * factor.powi(attempt as i32);
                if !scaled.is_finite() || scaled >= max.as_secs_f64() {
                    max
                } else {
                    Duration::from_secs_f64(scaled.max(0.0))
                }
            }
        }
    }

    /// Runs `op` until it succeeds, attempts run out, or the deadline passes.
    ///
    /// Exhausting the policy yields [`MsSeekError::Timeout`] carrying the
    /// last failure.
    pub fn retry<T>(&self, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let mut attempts = 0;
        loop {
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            attempts += 1;

            let delay = self.delay_for(attempts - 1);
            let out_of_attempts = attempts >= self.max_attempts.max(1);
            let out_of_time = self
                .deadline
                .is_some_and(|deadline| start.elapsed() + delay > deadline);
            if out_of_attempts || out_of_time {
                return Err(MsSeekError::Timeout {
                    attempts,
                    context: format!("{}: {}", what, err),
                });
            }
            debug!("{} failed (attempt {}): {}, retrying in {:?}", what, attempts, err, delay);
            std::thread::sleep(delay);
        }
    }
}

struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

/// Unix reports an expired socket timeout as `WouldBlock`, Windows as `TimedOut`.
fn io_error(e: std::io::Error) -> MsSeekError {
    let source = match e.kind() {
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("daemon did not answer in time ({})", e),
        ),
        _ => e,
    };
    MsSeekError::Io { source, path: None }
}

impl Connection {
    fn open(addr: &str, timeout: Option<Duration>) -> Result<Self> {
        let writer = match timeout {
            Some(timeout) => Self::connect_timeout(addr, timeout)?,
            None => TcpStream::connect(addr).map_err(io_error)?,
        };
        writer.set_nodelay(true)?;
        writer.set_read_timeout(timeout)?;
        writer.set_write_timeout(timeout)?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(Self { reader, writer })
    }

    fn connect_timeout(addr: &str, timeout: Duration) -> Result<TcpStream> {
        let mut last_err = None;
        for socket_addr in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&socket_addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(io_error(last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} did not resolve to any address", addr),
            )
        })))
    }

    fn round_trip(&mut self, request: &Request) -> Result<Response> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).map_err(io_error)?;
        self.writer.flush().map_err(io_error)?;

        let mut response = String::new();
        if self.reader.read_line(&mut response).map_err(io_error)? == 0 {
            return Err(MsSeekError::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "daemon closed the connection",
                ),
                path: None,
            });
        }
        Ok(serde_json::from_str(&response)?)
    }
}

/// [`Engine`] backed by a `msseek_rts` daemon.
///
/// Requests on one engine are serialized over a single connection. A broken
/// or timed out connection is dropped and the next request reconnects once.
pub struct RemoteEngine {
    addr: String,
    io_timeout: Option<Duration>,
    connection: Mutex<Option<Connection>>,
}

impl RemoteEngine {
    /// Connects and waits until the daemon answers pings with `ready`.
    pub fn connect(addr: impl Into<String>, policy: &RetryPolicy) -> Result<Self> {
        let addr = addr.into();
        let start = Instant::now();
        let connection = policy.retry(&format!("Connecting to {}", addr), || {
            let timeout = policy.attempt_timeout(start.elapsed());
            let mut connection = Connection::open(&addr, timeout)?;
            match connection.round_trip(&Request::Ping)? {
                Response::Success(serde_json::Value::String(status)) if status == READY => {
                    Ok(connection)
                }
                Response::Success(other) => Err(MsSeekError::ParseError {
                    msg: format!("daemon is not ready yet ({})", other),
                }),
                Response::Error(e) => Err(e.into()),
            }
        })?;
        // Later requests get the full io timeout, not what was left of the deadline
        connection.writer.set_read_timeout(policy.io_timeout)?;
        connection.writer.set_write_timeout(policy.io_timeout)?;
        info!("Connected to search daemon at {}", addr);
        Ok(Self {
            addr,
            io_timeout: policy.io_timeout,
            connection: Mutex::new(Some(connection)),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn call<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let mut guard = self
            .connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut connection = match guard.take() {
            Some(connection) => connection,
            None => Connection::open(&self.addr, self.io_timeout)?,
        };
        let response = connection.round_trip(&request)?;
        *guard = Some(connection);

        match response {
            Response::Success(data) => Ok(serde_json::from_value(data)?),
            Response::Error(e) => Err(e.into()),
        }
    }
}

impl Engine for RemoteEngine {
    fn search(
        &self,
        query: &Spectrum,
        mode: SearchMode,
        n_hits: usize,
    ) -> Result<Vec<SearchResult>> {
        self.call(Request::Search {
            query: query.clone(),
            mode,
            n_hits,
        })
    }

    fn search_with_ref_data(
        &self,
        query: &Spectrum,
        n_hits: usize,
    ) -> Result<Vec<(SearchResult, ReferenceRecord)>> {
        self.call(Request::SearchWithRefData {
            query: query.clone(),
            n_hits,
        })
    }

    fn cas_search(&self, cas: &str) -> Result<Vec<SearchResult>> {
        self.call(Request::CasSearch {
            cas: cas.to_string(),
        })
    }

    fn get_reference(&self, lib_idx: usize, spec_loc: u32) -> Result<ReferenceRecord> {
        self.call(Request::GetReference { lib_idx, spec_loc })
    }

    fn list_libraries(&self) -> Result<Vec<LibraryInfo>> {
        self.call(Request::ListLibraries)
    }
}
