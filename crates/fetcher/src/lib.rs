//! Asynchronous resource retrieval for the PurC-RS HVML interpreter.
//!
//! A [`FetcherSession`] lives on the interpreter thread and hands out
//! request tickets. The synchronous path resolves and reads the resource
//! in place; the asynchronous path performs the same work on a worker
//! thread and delivers the response in phases — progress, `Header`,
//! `Data`, `Finish` — through the caller's runloop. Failure and
//! cancellation deliver exactly one `Error` phase, even when a cancel
//! races completion.
//!
//! Only the `file:` backend is built in; the backend seam is a trait so a
//! remote (IPC) backend can slot in beside it.

#![warn(rustdoc::missing_crate_level_docs)]

/// Fetcher error types and response codes
pub mod error;
/// URI rewriting against the session base URL
pub mod uri;
/// The local `file:` backend
pub mod local;
/// The session, request tickets and async delivery
pub mod fetcher;

pub use error::{FetcherError, FetcherResult, RESP_CODE_USER_CANCEL, RESP_CODE_USER_STOP};
pub use fetcher::{
    FetcherBackend, FetcherSession, ProgressTracker, RequestMethod, RequestTicket, RespHeader,
    RespPhase, ResponseHandler,
};
pub use local::LocalBackend;
pub use uri::build_uri;
