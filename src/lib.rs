//! # PurC-RS
//!
//! An HVML interpreter runtime in Rust.
//!
//! HVML is a programmable markup language: programs are trees of
//! elements like `<init>`, `<iterate>` and `<request>` whose execution
//! is driven by a cooperative scheduler. This workspace implements the
//! runtime underneath such programs:
//!
//! - **purc-variant** — the tagged, reference-counted dynamic value
//!   system with container semantics
//! - **purc-core** — error codes, the bucketed atom table, UTF-8/URL
//!   helpers and the `hvml+run` URI scheme
//! - **purc-runloop** — a single-threaded cooperative runloop with fd
//!   monitors and interval timers
//! - **purc-fetcher** — asynchronous resource retrieval with phased
//!   delivery, progress tracking and cancellation
//! - **purc-interpreter** — coroutines, stack frames, element handlers,
//!   observers and event dispatch
//!
//! ## Example
//!
//! ```rust,no_run
//! use purc_rs::interpreter::{Document, ElementBuilder, Expr, Instance};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // <hvml><init as="x" with="[1, 2, 3]"/></hvml>
//! let program = ElementBuilder::new("hvml")
//!     .child(
//!         ElementBuilder::new("init")
//!             .attr("as", Expr::str("x"))
//!             .attr("with", Expr::json("[1, 2, 3]"))
//!             .build(),
//!     )
//!     .build();
//!
//! let instance = Instance::new("cn.fmsoft.hvml.sample", "main")?;
//! let doc = Document::new(program);
//! let cid = instance.schedule_coroutine(doc.clone(), None);
//! instance.run_until_done(Duration::from_secs(5));
//!
//! assert_eq!(doc.variable("x").unwrap().array_size()?, 3);
//! # Ok(())
//! # }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

/// Core infrastructure: errors, atoms, UTF-8, URLs
pub use purc_core as core;
/// The variant value system
pub use purc_variant as variant;
/// The cooperative runloop
pub use purc_runloop as runloop;
/// The async resource fetcher
pub use purc_fetcher as fetcher;
/// The interpreter runtime
pub use purc_interpreter as interpreter;

pub use purc_core::{Atom, CoreError, CoreResult};
pub use purc_interpreter::{Document, ElementBuilder, Expr, Instance};
pub use purc_variant::Variant;
