//! Core infrastructure for the PurC-RS HVML interpreter.
//!
//! This crate provides the pieces every other crate in the workspace leans
//! on: the closed set of error codes, the bucketed atom (interned string)
//! table, UTF-8 validation helpers, URL decomposition and assembly,
//! punycode for IDN hostnames, and the `hvml+run` URI scheme used to
//! address coroutines and channels.

#![warn(rustdoc::missing_crate_level_docs)]

/// Error codes and result handling
pub mod error;
/// Bucketed string interner producing integer atoms
pub mod atom;
/// UTF-8 validation and code-point counting
pub mod utf8;
/// URL decomposition, assembly and RFC 3986 path encoding
pub mod url;
/// Punycode (RFC 3492) encoding for IDN hostnames
pub mod punycode;
/// The `hvml+run` URI scheme for coroutines and channels
pub mod hvml_uri;

pub use atom::{Atom, BUCKET_DEFAULT, BUCKET_EXCEPT, BUCKET_RDR, BUCKET_USER};
pub use error::{CoreError, CoreResult, ParseErrorInfo};
pub use hvml_uri::{HvmlResourceKind, HvmlUri};
pub use url::BrokenDownUrl;
