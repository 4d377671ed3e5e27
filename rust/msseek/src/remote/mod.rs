//! Talking to a search engine that lives in another process.

mod client;
pub mod protocol;
mod server;

pub use client::{
    Backoff,
    RemoteEngine,
    RetryPolicy,
};
pub use protocol::{
    RemoteError,
    Request,
    Response,
};
pub use server::{
    handle_line,
    handle_request,
    serve_connection,
};
