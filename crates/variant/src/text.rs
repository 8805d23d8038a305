//! Storage for string and byte-sequence payloads.
//!
//! Both kinds come in three modes: a small inline buffer, an owned heap
//! buffer, and a borrowed static buffer. Strings additionally cache their
//! code-point count; a `None` count marks bytes that were stored without
//! encoding validation and turned out not to be UTF-8.

use purc_core::error::{CoreError, CoreResult};
use purc_core::utf8;

/// Payloads at most this long are stored inline.
pub const INLINE_CAPACITY: usize = 16;

/// Backing storage for string variants. Byte length excludes the trailing
/// NUL; [`TextStore::byte_size`] adds it back, matching the C string
/// convention the rest of the runtime counts in.
#[derive(Clone)]
pub enum TextStore {
    /// Small payload packed into the cell
    Inline {
        /// The bytes; only the first `len` are meaningful
        buf: [u8; INLINE_CAPACITY],
        /// Used prefix of `buf`
        len: u8,
        /// Cached code-point count; `None` if not valid UTF-8
        chars: Option<u32>,
    },
    /// Heap-allocated payload
    Owned {
        /// The bytes
        bytes: Box<[u8]>,
        /// Cached code-point count; `None` if not valid UTF-8
        chars: Option<u32>,
    },
    /// Borrowed payload that outlives the process
    Static {
        /// The bytes
        bytes: &'static [u8],
        /// Cached code-point count; `None` if not valid UTF-8
        chars: Option<u32>,
    },
}

impl TextStore {
    /// Stores a known-valid string.
    pub fn new(s: &str) -> Self {
        let chars = Some(utf8::char_count(s) as u32);
        Self::from_bytes(s.as_bytes(), chars)
    }

    /// Stores raw bytes, failing with `BadEncoding` if they are not valid
    /// UTF-8.
    pub fn new_checked(bytes: &[u8]) -> CoreResult<Self> {
        let chars = utf8::check_utf8(bytes)? as u32;
        Ok(Self::from_bytes(bytes, Some(chars)))
    }

    /// Stores raw bytes without validation. Invalid UTF-8 is kept but the
    /// character count is marked unknown and `as_str` will refuse it.
    pub fn new_unchecked(bytes: &[u8]) -> Self {
        let chars = utf8::check_utf8(bytes).ok().map(|n| n as u32);
        Self::from_bytes(bytes, chars)
    }

    /// Borrows a static string without copying.
    pub fn new_static(s: &'static str) -> Self {
        TextStore::Static {
            bytes: s.as_bytes(),
            chars: Some(utf8::char_count(s) as u32),
        }
    }

    fn from_bytes(bytes: &[u8], chars: Option<u32>) -> Self {
        if bytes.len() <= INLINE_CAPACITY {
            let mut buf = [0u8; INLINE_CAPACITY];
            buf[..bytes.len()].copy_from_slice(bytes);
            TextStore::Inline {
                buf,
                len: bytes.len() as u8,
                chars,
            }
        } else {
            TextStore::Owned {
                bytes: bytes.to_vec().into_boxed_slice(),
                chars,
            }
        }
    }

    /// The stored bytes, without the implied trailing NUL.
    pub fn bytes(&self) -> &[u8] {
        match self {
            TextStore::Inline { buf, len, .. } => &buf[..*len as usize],
            TextStore::Owned { bytes, .. } => bytes,
            TextStore::Static { bytes, .. } => bytes,
        }
    }

    /// Byte length including the trailing NUL.
    pub fn byte_size(&self) -> usize {
        self.bytes().len() + 1
    }

    /// Cached code-point count; `None` for invalid UTF-8.
    pub fn char_count(&self) -> Option<usize> {
        match self {
            TextStore::Inline { chars, .. }
            | TextStore::Owned { chars, .. }
            | TextStore::Static { chars, .. } => chars.map(|n| n as usize),
        }
    }

    /// The payload as `&str`, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        if self.char_count().is_some() {
            // char_count is only cached for payloads that validated
            Some(unsafe { std::str::from_utf8_unchecked(self.bytes()) })
        } else {
            None
        }
    }

    /// Fails with `BadEncoding` when the payload is not valid UTF-8.
    pub fn require_str(&self) -> CoreResult<&str> {
        self.as_str()
            .ok_or_else(|| CoreError::bad_encoding(0))
    }
}

/// Backing storage for byte-sequence variants. No NUL convention applies.
#[derive(Clone)]
pub enum ByteStore {
    /// Small payload packed into the cell
    Inline {
        /// The bytes; only the first `len` are meaningful
        buf: [u8; INLINE_CAPACITY],
        /// Used prefix of `buf`
        len: u8,
    },
    /// Heap-allocated payload
    Owned(Box<[u8]>),
    /// Borrowed payload that outlives the process
    Static(&'static [u8]),
}

impl ByteStore {
    /// Copies `bytes` into inline or owned storage.
    pub fn new(bytes: &[u8]) -> Self {
        if bytes.len() <= INLINE_CAPACITY {
            let mut buf = [0u8; INLINE_CAPACITY];
            buf[..bytes.len()].copy_from_slice(bytes);
            ByteStore::Inline {
                buf,
                len: bytes.len() as u8,
            }
        } else {
            ByteStore::Owned(bytes.to_vec().into_boxed_slice())
        }
    }

    /// Borrows a static payload without copying.
    pub fn new_static(bytes: &'static [u8]) -> Self {
        ByteStore::Static(bytes)
    }

    /// The stored bytes.
    pub fn bytes(&self) -> &[u8] {
        match self {
            ByteStore::Inline { buf, len } => &buf[..*len as usize],
            ByteStore::Owned(bytes) => bytes,
            ByteStore::Static(bytes) => bytes,
        }
    }

    /// The payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    /// True if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}
