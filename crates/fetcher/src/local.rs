//! The local `file:` backend.
//!
//! The synchronous path opens the file and returns its contents with a
//! `(200, mime, size)` header. Reads go chunk by chunk so a cancelled or
//! timed-out request stops promptly even on very large files.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use purc_core::url::{self, BrokenDownUrl};

use crate::error::{FetcherError, FetcherResult, RESP_CODE_USER_CANCEL};
use crate::fetcher::{FetcherBackend, RequestMethod, RespHeader};

const READ_CHUNK: usize = 64 * 1024;

struct MimeType {
    ext: &'static str,
    mime: &'static str,
}

const MIME_TYPES: &[MimeType] = &[
    MimeType { ext: ".hvml", mime: "text/hvml" },
    MimeType { ext: ".html", mime: "text/html" },
    MimeType { ext: ".json", mime: "application/json" },
    MimeType { ext: ".xml", mime: "application/xml" },
    MimeType { ext: ".tar", mime: "application/x-tar" },
    MimeType { ext: ".sh", mime: "application/x-sh" },
    MimeType { ext: ".txt", mime: "text/plain" },
    MimeType { ext: ".jpg", mime: "image/jpeg" },
    MimeType { ext: ".jpeg", mime: "image/jpeg" },
    MimeType { ext: ".png", mime: "image/png" },
    MimeType { ext: ".mp3", mime: "audio/mpeg" },
    MimeType { ext: ".mp4", mime: "video/mp4" },
];

const UNKNOWN_MIME: &str = "unknown";

fn mime_of(path: &str) -> &'static str {
    let Some(dot) = path.rfind('.') else {
        return UNKNOWN_MIME;
    };
    let ext = &path[dot..];
    MIME_TYPES
        .iter()
        .find(|entry| entry.ext == ext)
        .map(|entry| entry.mime)
        .unwrap_or(UNKNOWN_MIME)
}

/// The built-in backend serving `file:` URIs.
#[derive(Default)]
pub struct LocalBackend;

impl LocalBackend {
    /// Creates the backend.
    pub fn new() -> Self {
        LocalBackend
    }
}

impl FetcherBackend for LocalBackend {
    fn accepts(&self, uri: &BrokenDownUrl) -> bool {
        uri.is_local_file()
    }

    fn fetch(
        &self,
        uri: &str,
        _method: RequestMethod,
        _params: Option<&str>,
        cancelled: &AtomicBool,
        deadline: Option<Instant>,
    ) -> FetcherResult<(RespHeader, Vec<u8>)> {
        let broken = BrokenDownUrl::break_down(uri)
            .map_err(|_| FetcherError::invalid_uri(uri))?;
        if !broken.is_local_file() {
            return Err(FetcherError::unsupported_scheme(uri));
        }

        let raw_path = broken
            .path
            .as_deref()
            .ok_or_else(|| FetcherError::invalid_uri(uri))?;
        let path = url::path_decode(raw_path).map_err(|_| FetcherError::invalid_uri(uri))?;

        let mut file = std::fs::File::open(&path).map_err(|_| FetcherError::not_found(uri))?;
        let size = file
            .metadata()
            .map(|meta| meta.len() as usize)
            .unwrap_or(0);

        let mut body = Vec::with_capacity(size.min(READ_CHUNK));
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if cancelled.load(Ordering::SeqCst) {
                return Err(FetcherError::Cancelled);
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(FetcherError::timeout(0));
                }
            }

            let n = file.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }

        Ok((
            RespHeader {
                ret_code: 200,
                mime_type: Some(mime_of(&path).to_string()),
                sz_resp: size,
            },
            body,
        ))
    }
}

/// Builds the error header reported for a failed or cancelled request.
pub(crate) fn error_header(error: &FetcherError) -> RespHeader {
    let ret_code = match error {
        FetcherError::Cancelled => RESP_CODE_USER_CANCEL,
        FetcherError::NotFound { .. } => 404,
        FetcherError::Timeout { .. } => 408,
        FetcherError::UnsupportedScheme { .. } | FetcherError::InvalidUri { .. } => 400,
        FetcherError::Io { .. } => 500,
    };
    RespHeader {
        ret_code,
        mime_type: None,
        sz_resp: 0,
    }
}
