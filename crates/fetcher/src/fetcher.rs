//! The fetcher session: request tickets and phased async delivery.
//!
//! The session lives on the interpreter thread. Async requests run on a
//! worker thread per request; the worker pushes completions into a shared
//! queue and taps a notify pipe that the session monitors on its runloop,
//! so every handler and tracker callback fires on the session's own
//! thread. Pending requests are taken out of the registry before their
//! callbacks run, which makes the callbacks free to start or cancel
//! requests themselves.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use purc_core::url::BrokenDownUrl;
use purc_runloop::{IoEventMask, MonitorHandle, RunLoop};

use crate::error::{FetcherError, FetcherResult};
use crate::local::{error_header, LocalBackend};
use crate::uri::build_uri;

/// The progress reported before any data moves.
pub const INITIAL_PROGRESS: f64 = 0.1;
/// The progress reported once the payload is complete.
pub const FINAL_PROGRESS: f64 = 1.0;

/// Request method. `via LOAD` maps to `Get`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RequestMethod {
    /// Retrieve the resource
    Get,
    /// Submit the params to the resource
    Post,
    /// Remove the resource
    Delete,
}

impl RequestMethod {
    /// Parses a `via` verb, case-insensitively.
    pub fn from_verb(verb: &str) -> Option<Self> {
        if verb.eq_ignore_ascii_case("GET") || verb.eq_ignore_ascii_case("LOAD") {
            Some(RequestMethod::Get)
        } else if verb.eq_ignore_ascii_case("POST") {
            Some(RequestMethod::Post)
        } else if verb.eq_ignore_ascii_case("DELETE") {
            Some(RequestMethod::Delete)
        } else {
            None
        }
    }
}

/// The status header delivered with every response phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RespHeader {
    /// HTTP-style status, or a negative user code
    pub ret_code: i32,
    /// Inferred mime type, when known
    pub mime_type: Option<String>,
    /// Size of the payload in bytes
    pub sz_resp: usize,
}

/// The phase of a response callback.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RespPhase {
    /// Status header available
    Header,
    /// Payload bytes available
    Data,
    /// Successful completion; terminal
    Finish,
    /// Failure or cancellation; terminal
    Error,
}

/// Receives the phases of one async request.
pub type ResponseHandler = Box<dyn FnMut(&RequestTicket, RespPhase, &RespHeader, Option<&[u8]>)>;

/// Receives progress in `[0, 1]` for one async request.
pub type ProgressTracker = Box<dyn FnMut(&RequestTicket, f64)>;

/// A fetcher backend. Implementations run on worker threads.
pub trait FetcherBackend: Send + Sync {
    /// Whether this backend serves the URI.
    fn accepts(&self, uri: &BrokenDownUrl) -> bool;

    /// Fetches the resource, polling `cancelled` and `deadline` between
    /// chunks.
    fn fetch(
        &self,
        uri: &str,
        method: RequestMethod,
        params: Option<&str>,
        cancelled: &AtomicBool,
        deadline: Option<Instant>,
    ) -> FetcherResult<(RespHeader, Vec<u8>)>;
}

/// The observable identity of one request, valid from the first callback
/// to the terminal one.
#[derive(Clone)]
pub struct RequestTicket {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl RequestTicket {
    /// The request id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True once the request has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl PartialEq for RequestTicket {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::fmt::Debug for RequestTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request#{}", self.id)
    }
}

enum Completion {
    Progress {
        request: u64,
        progress: f64,
    },
    Outcome {
        request: u64,
        result: Result<(RespHeader, Vec<u8>), FetcherError>,
    },
}

struct PendingRequest {
    ticket: RequestTicket,
    handler: ResponseHandler,
    tracker: Option<ProgressTracker>,
}

struct SessionInner {
    runloop: RunLoop,
    base_url: RefCell<Option<String>>,
    working_dir: RefCell<PathBuf>,
    backends: Vec<Arc<dyn FetcherBackend>>,
    completions: Arc<Mutex<Vec<Completion>>>,
    notify_read_fd: RawFd,
    notify_write_fd: RawFd,
    pending: RefCell<HashMap<u64, PendingRequest>>,
    next_id: Cell<u64>,
    monitor: Cell<Option<MonitorHandle>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            self.runloop.remove_fd_monitor(monitor);
        }
        unsafe {
            libc::close(self.notify_read_fd);
            libc::close(self.notify_write_fd);
        }
    }
}

/// A fetcher session bound to one runloop.
pub struct FetcherSession {
    inner: Rc<SessionInner>,
}

impl FetcherSession {
    /// Creates a session on `runloop` with the local backend installed.
    pub fn new(runloop: &RunLoop) -> FetcherResult<FetcherSession> {
        let mut fds = [0 as RawFd; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if rc != 0 {
            return Err(FetcherError::from(std::io::Error::last_os_error()));
        }
        for fd in fds {
            unsafe {
                let flags = libc::fcntl(fd, libc::F_GETFL);
                libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
            }
        }

        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let inner = Rc::new(SessionInner {
            runloop: runloop.clone(),
            base_url: RefCell::new(None),
            working_dir: RefCell::new(working_dir),
            backends: vec![Arc::new(LocalBackend::new())],
            completions: Arc::new(Mutex::new(Vec::new())),
            notify_read_fd: fds[0],
            notify_write_fd: fds[1],
            pending: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
            monitor: Cell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        let monitor = runloop.add_fd_monitor(fds[0], IoEventMask::IN, move |fd, _events| {
            drain_notify_pipe(fd);
            match weak.upgrade() {
                Some(inner) => {
                    deliver_completions(&inner);
                    true
                }
                None => false,
            }
        });
        inner.monitor.set(Some(monitor));

        Ok(FetcherSession { inner })
    }

    /// Sets the base URL used to rewrite relative request URIs. Returns
    /// the stored form.
    pub fn set_base_url(&self, base: &str) -> String {
        let stored = base.trim().to_string();
        *self.inner.base_url.borrow_mut() = Some(stored.clone());
        stored
    }

    /// The base URL, if one was set.
    pub fn base_url(&self) -> Option<String> {
        self.inner.base_url.borrow().clone()
    }

    /// Overrides the working directory used for bare `file:` bases.
    pub fn set_working_dir(&self, dir: PathBuf) {
        *self.inner.working_dir.borrow_mut() = dir;
    }

    /// Resolves a request URI against the session base.
    pub fn resolve_uri(&self, target: &str) -> String {
        build_uri(
            self.inner.base_url.borrow().as_deref(),
            target,
            &self.inner.working_dir.borrow(),
        )
    }

    /// Fetches a resource synchronously.
    pub fn request_sync(
        &self,
        target: &str,
        method: RequestMethod,
        params: Option<&str>,
        timeout_secs: u32,
    ) -> FetcherResult<(RespHeader, Vec<u8>)> {
        let uri = self.resolve_uri(target);
        let backend = self.backend_for(&uri)?;
        let cancelled = AtomicBool::new(false);
        let deadline = deadline_for(timeout_secs);
        backend.fetch(&uri, method, params, &cancelled, deadline)
    }

    /// Starts an async fetch. On success the handler sees `Header`,
    /// `Data` and `Finish`; on failure or cancellation it sees exactly
    /// one `Error`.
    pub fn request_async(
        &self,
        target: &str,
        method: RequestMethod,
        params: Option<String>,
        timeout_secs: u32,
        handler: ResponseHandler,
        tracker: Option<ProgressTracker>,
    ) -> FetcherResult<RequestTicket> {
        let uri = self.resolve_uri(target);
        let backend = self.backend_for(&uri)?;

        let id = self.inner.next_id.get() + 1;
        self.inner.next_id.set(id);
        let ticket = RequestTicket {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
        };

        self.inner.pending.borrow_mut().insert(
            id,
            PendingRequest {
                ticket: ticket.clone(),
                handler,
                tracker,
            },
        );

        let completions = Arc::clone(&self.inner.completions);
        let cancelled = Arc::clone(&ticket.cancelled);
        let notify_fd = self.inner.notify_write_fd;
        let runloop_handle = self.inner.runloop.handle();
        let deadline = deadline_for(timeout_secs);

        std::thread::spawn(move || {
            completions.lock().push(Completion::Progress {
                request: id,
                progress: INITIAL_PROGRESS,
            });
            notify(notify_fd);

            let result = backend.fetch(&uri, method, params.as_deref(), &cancelled, deadline);

            {
                let mut queue = completions.lock();
                if result.is_ok() {
                    queue.push(Completion::Progress {
                        request: id,
                        progress: FINAL_PROGRESS,
                    });
                }
                queue.push(Completion::Outcome {
                    request: id,
                    result,
                });
            }
            notify(notify_fd);
            runloop_handle.wakeup();
        });

        Ok(ticket)
    }

    /// Cancels a pending async request. The handler receives a single
    /// `Error` phase with the user-cancel code; a racing completion is
    /// suppressed.
    pub fn cancel_async(&self, ticket: &RequestTicket) {
        ticket.cancelled.store(true, Ordering::SeqCst);

        let taken = self.inner.pending.borrow_mut().remove(&ticket.id);
        if let Some(mut pending) = taken {
            let header = error_header(&FetcherError::Cancelled);
            (pending.handler)(&pending.ticket, RespPhase::Error, &header, None);
        }
    }

    /// Number of requests still awaiting a terminal phase.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    fn backend_for(&self, uri: &str) -> FetcherResult<Arc<dyn FetcherBackend>> {
        let broken =
            BrokenDownUrl::break_down(uri).map_err(|_| FetcherError::invalid_uri(uri))?;
        self.inner
            .backends
            .iter()
            .find(|backend| backend.accepts(&broken))
            .cloned()
            .ok_or_else(|| FetcherError::unsupported_scheme(uri))
    }
}

fn deadline_for(timeout_secs: u32) -> Option<Instant> {
    if timeout_secs == 0 {
        None
    } else {
        Some(Instant::now() + std::time::Duration::from_secs(timeout_secs as u64))
    }
}

fn notify(fd: RawFd) {
    let byte = [1u8];
    unsafe {
        libc::write(fd, byte.as_ptr() as *const libc::c_void, 1);
    }
}

fn drain_notify_pipe(fd: RawFd) {
    let mut buf = [0u8; 64];
    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n <= 0 {
            break;
        }
    }
}

fn deliver_completions(inner: &Rc<SessionInner>) {
    let batch: Vec<Completion> = std::mem::take(&mut *inner.completions.lock());

    for completion in batch {
        match completion {
            Completion::Progress { request, progress } => {
                let taken = inner.pending.borrow_mut().remove(&request);
                let Some(mut pending) = taken else {
                    continue;
                };
                if let Some(tracker) = pending.tracker.as_mut() {
                    tracker(&pending.ticket, progress);
                }
                inner.pending.borrow_mut().insert(request, pending);
            }
            Completion::Outcome { request, result } => {
                let taken = inner.pending.borrow_mut().remove(&request);
                let Some(mut pending) = taken else {
                    // already cancelled; the terminal Error went out then
                    continue;
                };

                match result {
                    Ok((header, body)) => {
                        (pending.handler)(&pending.ticket, RespPhase::Header, &header, None);
                        (pending.handler)(
                            &pending.ticket,
                            RespPhase::Data,
                            &header,
                            Some(&body),
                        );
                        (pending.handler)(&pending.ticket, RespPhase::Finish, &header, None);
                    }
                    Err(error) => {
                        let header = error_header(&error);
                        (pending.handler)(&pending.ticket, RespPhase::Error, &header, None);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc as StdRc;

    struct TempPath(PathBuf);

    impl Drop for TempPath {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn write_temp(content: &str) -> TempPath {
        use std::sync::atomic::AtomicU32;
        static SEQ: AtomicU32 = AtomicU32::new(0);
        let path = std::env::temp_dir().join(format!(
            "purc-session-fetch-{}-{}.json",
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed),
        ));
        std::fs::write(&path, content).expect("temp file written");
        TempPath(path)
    }

    fn run_until<F: Fn() -> bool>(runloop: &RunLoop, done: F) {
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "fetcher test timed out");
            runloop.turn();
        }
    }

    #[test]
    fn test_sync_fetch() {
        let runloop = RunLoop::current();
        let session = FetcherSession::new(&runloop).unwrap();

        let file = write_temp("{\"k\": 1}");
        let uri = format!("file://{}", file.0.display());
        let (header, body) = session
            .request_sync(&uri, RequestMethod::Get, None, 0)
            .unwrap();
        assert_eq!(header.ret_code, 200);
        assert_eq!(body, b"{\"k\": 1}");
    }

    #[test]
    fn test_async_phases_in_order() {
        let runloop = RunLoop::current();
        let session = FetcherSession::new(&runloop).unwrap();

        let file = write_temp("[1,2,3]");
        let uri = format!("file://{}", file.0.display());

        let phases: StdRc<StdRefCell<Vec<RespPhase>>> = StdRc::new(StdRefCell::new(Vec::new()));
        let progress: StdRc<StdRefCell<Vec<f64>>> = StdRc::new(StdRefCell::new(Vec::new()));

        let phase_sink = StdRc::clone(&phases);
        let progress_sink = StdRc::clone(&progress);
        session
            .request_async(
                &uri,
                RequestMethod::Get,
                None,
                0,
                Box::new(move |_ticket, phase, header, body| {
                    if phase == RespPhase::Data {
                        assert_eq!(body, Some(&b"[1,2,3]"[..]));
                    }
                    assert_eq!(header.ret_code, 200);
                    phase_sink.borrow_mut().push(phase);
                }),
                Some(Box::new(move |_ticket, p| {
                    progress_sink.borrow_mut().push(p);
                })),
            )
            .unwrap();

        run_until(&runloop, || {
            phases.borrow().last() == Some(&RespPhase::Finish)
        });

        assert_eq!(
            *phases.borrow(),
            vec![RespPhase::Header, RespPhase::Data, RespPhase::Finish]
        );
        let progress = progress.borrow();
        assert_eq!(progress.first(), Some(&INITIAL_PROGRESS));
        assert_eq!(progress.last(), Some(&FINAL_PROGRESS));
        assert_eq!(session.pending_requests(), 0);
    }

    #[test]
    fn test_async_missing_file_single_error() {
        let runloop = RunLoop::current();
        let session = FetcherSession::new(&runloop).unwrap();

        let phases: StdRc<StdRefCell<Vec<(RespPhase, i32)>>> =
            StdRc::new(StdRefCell::new(Vec::new()));
        let sink = StdRc::clone(&phases);
        session
            .request_async(
                "file:///no/such/file.json",
                RequestMethod::Get,
                None,
                0,
                Box::new(move |_ticket, phase, header, _body| {
                    sink.borrow_mut().push((phase, header.ret_code));
                }),
                None,
            )
            .unwrap();

        run_until(&runloop, || !phases.borrow().is_empty());
        assert_eq!(*phases.borrow(), vec![(RespPhase::Error, 404)]);
    }

    #[test]
    fn test_cancel_delivers_exactly_one_error() {
        let runloop = RunLoop::current();
        let session = FetcherSession::new(&runloop).unwrap();

        let file = write_temp("body");
        let uri = format!("file://{}", file.0.display());

        let phases: StdRc<StdRefCell<Vec<(RespPhase, i32)>>> =
            StdRc::new(StdRefCell::new(Vec::new()));
        let sink = StdRc::clone(&phases);
        let ticket = session
            .request_async(
                &uri,
                RequestMethod::Get,
                None,
                0,
                Box::new(move |_ticket, phase, header, _body| {
                    sink.borrow_mut().push((phase, header.ret_code));
                }),
                None,
            )
            .unwrap();

        session.cancel_async(&ticket);
        assert!(ticket.is_cancelled());

        // give the worker time to race; only the cancel error may surface
        let deadline = Instant::now() + std::time::Duration::from_millis(200);
        while Instant::now() < deadline {
            runloop.turn();
        }

        assert_eq!(
            *phases.borrow(),
            vec![(RespPhase::Error, crate::error::RESP_CODE_USER_CANCEL)]
        );
        assert_eq!(session.pending_requests(), 0);
    }

    #[test]
    fn test_unsupported_scheme_rejected_up_front() {
        let runloop = RunLoop::current();
        let session = FetcherSession::new(&runloop).unwrap();
        let result = session.request_sync("gopher://x/y", RequestMethod::Get, None, 0);
        assert!(matches!(result, Err(FetcherError::UnsupportedScheme { .. })));
    }
}
