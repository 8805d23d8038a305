//! Tagged, reference-counted dynamic values for the PurC-RS HVML
//! interpreter.
//!
//! A [`Variant`] is a cheap handle to a heap cell holding one of the HVML
//! value kinds: the shared singletons (null, undefined, booleans), the
//! numeric family, strings and byte sequences with three storage modes,
//! atom strings and exceptions, dynamic getter/setter pairs, native
//! entities with an ops table, and the four containers (array, object,
//! set, tuple).
//!
//! Cloning a variant increments its reference count; dropping the last
//! handle releases the cell, recursively releasing container children
//! through an iterative worklist so deeply nested data cannot overflow
//! the stack. Every live cell is tracked by the per-thread heap, which
//! also owns the singletons and exposes leak statistics for tests.

#![warn(rustdoc::missing_crate_level_docs)]

/// The variant handle, tag set, constructors and conversions
pub mod variant;
/// String and byte-sequence storage (inline / owned / static)
pub mod text;
/// Array, object and tuple operations
pub mod container;
/// Uniqueness sets keyed by sub-fields or whole-value equality
pub mod set;
/// Dynamic getter/setter pairs and native entity ops tables
pub mod native;
/// Per-thread heap: singletons, live-cell statistics, deferred teardown
pub mod heap;
/// Conversions between variants and JSON
pub mod json;

pub use native::{DynamicFn, DynamicVal, NativeMethod, NativeOps, NativeVal};
pub use purc_core::{CoreError, CoreResult};
pub use set::SetData;
pub use text::{ByteStore, TextStore};
pub use variant::{Variant, VariantType};
