//! The variant value: a tagged, reference-counted dynamic value.
//!
//! [`Variant`] is a handle; cloning it shares the underlying cell and
//! bumps the reference count, dropping the last handle releases the cell.
//! Containers hold strong references to their children and release them
//! through the heap's deferred worklist.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use purc_core::atom::{self, Atom};
use purc_core::error::{CoreError, CoreResult};

use crate::heap;
use crate::native::{DynamicFn, DynamicVal, NativeOps, NativeVal};
use crate::set::SetData;
use crate::text::{ByteStore, TextStore};

/// The tag of a variant value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariantType {
    /// The undefined singleton
    Undefined,
    /// The null singleton
    Null,
    /// A boolean singleton
    Boolean,
    /// An exception atom
    Exception,
    /// A double-precision number
    Number,
    /// A signed 64-bit integer
    LongInt,
    /// An unsigned 64-bit integer
    ULongInt,
    /// An extended-precision number
    LongDouble,
    /// An interned string
    AtomString,
    /// A UTF-8 string
    String,
    /// An opaque byte sequence
    ByteSeq,
    /// A getter/setter pair
    Dynamic,
    /// A native entity with an ops table
    Native,
    /// An insertion-ordered map with unique string keys
    Object,
    /// An indexed sequence
    Array,
    /// A uniqueness collection
    Set,
    /// A fixed-size sequence
    Tuple,
}

impl VariantType {
    /// The lowercase type name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            VariantType::Undefined => "undefined",
            VariantType::Null => "null",
            VariantType::Boolean => "boolean",
            VariantType::Exception => "exception",
            VariantType::Number => "number",
            VariantType::LongInt => "longint",
            VariantType::ULongInt => "ulongint",
            VariantType::LongDouble => "longdouble",
            VariantType::AtomString => "atomstring",
            VariantType::String => "string",
            VariantType::ByteSeq => "bsequence",
            VariantType::Dynamic => "dynamic",
            VariantType::Native => "native",
            VariantType::Object => "object",
            VariantType::Array => "array",
            VariantType::Set => "set",
            VariantType::Tuple => "tuple",
        }
    }
}

impl std::fmt::Display for VariantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) enum VariantData {
    Undefined,
    Null,
    Boolean(bool),
    Exception(Atom),
    Number(f64),
    LongInt(i64),
    ULongInt(u64),
    LongDouble(f64),
    AtomString(Atom),
    String(TextStore),
    ByteSeq(ByteStore),
    Dynamic(DynamicVal),
    Native(NativeVal),
    Object(RefCell<IndexMap<String, Variant>>),
    Array(RefCell<Vec<Variant>>),
    Set(RefCell<SetData>),
    Tuple(RefCell<Vec<Variant>>),
}

pub(crate) struct VariantCell {
    pub(crate) data: VariantData,
    counted: bool,
}

impl Drop for VariantCell {
    fn drop(&mut self) {
        if self.counted {
            heap::cell_dropped();
        }

        match &mut self.data {
            VariantData::Native(native) => {
                native.ops.on_release(native.entity.as_ref());
            }
            VariantData::Array(items) | VariantData::Tuple(items) => {
                heap::dispose(items.get_mut().drain(..).collect());
            }
            VariantData::Object(map) => {
                heap::dispose(map.get_mut().drain(..).map(|(_, v)| v).collect());
            }
            VariantData::Set(set) => {
                heap::dispose(set.get_mut().drain_records());
            }
            _ => {}
        }
    }
}

/// A reference-counted dynamic value.
#[derive(Clone)]
pub struct Variant {
    pub(crate) cell: Rc<VariantCell>,
}

impl Variant {
    fn from_data(data: VariantData) -> Variant {
        heap::cell_created();
        Variant {
            cell: Rc::new(VariantCell {
                data,
                counted: true,
            }),
        }
    }

    pub(crate) fn new_singleton_null() -> Variant {
        Variant {
            cell: Rc::new(VariantCell {
                data: VariantData::Null,
                counted: false,
            }),
        }
    }

    pub(crate) fn new_singleton_undefined() -> Variant {
        Variant {
            cell: Rc::new(VariantCell {
                data: VariantData::Undefined,
                counted: false,
            }),
        }
    }

    pub(crate) fn new_singleton_boolean(value: bool) -> Variant {
        Variant {
            cell: Rc::new(VariantCell {
                data: VariantData::Boolean(value),
                counted: false,
            }),
        }
    }

    /// The shared null singleton.
    pub fn null() -> Variant {
        heap::singleton_null()
    }

    /// The shared undefined singleton.
    pub fn undefined() -> Variant {
        heap::singleton_undefined()
    }

    /// One of the shared boolean singletons.
    pub fn boolean(value: bool) -> Variant {
        heap::singleton_boolean(value)
    }

    /// Creates a number variant.
    pub fn number(value: f64) -> Variant {
        Variant::from_data(VariantData::Number(value))
    }

    /// Creates a signed 64-bit integer variant.
    pub fn longint(value: i64) -> Variant {
        Variant::from_data(VariantData::LongInt(value))
    }

    /// Creates an unsigned 64-bit integer variant.
    pub fn ulongint(value: u64) -> Variant {
        Variant::from_data(VariantData::ULongInt(value))
    }

    /// Creates an extended-precision number variant.
    pub fn longdouble(value: f64) -> Variant {
        Variant::from_data(VariantData::LongDouble(value))
    }

    /// Creates a string variant from a known-valid string.
    pub fn string(s: &str) -> Variant {
        Variant::from_data(VariantData::String(TextStore::new(s)))
    }

    /// Creates a string variant from raw bytes, validating the encoding.
    pub fn string_checked(bytes: &[u8]) -> CoreResult<Variant> {
        Ok(Variant::from_data(VariantData::String(
            TextStore::new_checked(bytes)?,
        )))
    }

    /// Creates a string variant from raw bytes without validation.
    pub fn string_unchecked(bytes: &[u8]) -> Variant {
        Variant::from_data(VariantData::String(TextStore::new_unchecked(bytes)))
    }

    /// Creates a string variant borrowing a static string.
    pub fn string_static(s: &'static str) -> Variant {
        Variant::from_data(VariantData::String(TextStore::new_static(s)))
    }

    /// Creates an atom-string variant.
    pub fn atom_string(atom: Atom) -> Variant {
        Variant::from_data(VariantData::AtomString(atom))
    }

    /// Creates an exception variant from an except-bucket atom.
    pub fn exception(atom: Atom) -> Variant {
        Variant::from_data(VariantData::Exception(atom))
    }

    /// Creates a byte-sequence variant.
    pub fn byte_seq(bytes: &[u8]) -> Variant {
        Variant::from_data(VariantData::ByteSeq(ByteStore::new(bytes)))
    }

    /// Creates a byte-sequence variant borrowing static bytes.
    pub fn byte_seq_static(bytes: &'static [u8]) -> Variant {
        Variant::from_data(VariantData::ByteSeq(ByteStore::new_static(bytes)))
    }

    /// Creates a dynamic variant from a getter and an optional setter.
    pub fn dynamic(getter: DynamicFn, setter: Option<DynamicFn>) -> Variant {
        Variant::from_data(VariantData::Dynamic(DynamicVal::new(getter, setter)))
    }

    /// Creates a native variant from an entity and its ops table.
    pub fn native(entity: Rc<dyn Any>, ops: Rc<dyn NativeOps>) -> Variant {
        Variant::from_data(VariantData::Native(NativeVal::new(entity, ops)))
    }

    /// Creates an array variant.
    pub fn array(items: Vec<Variant>) -> Variant {
        Variant::from_data(VariantData::Array(RefCell::new(items)))
    }

    /// Creates an empty object variant.
    pub fn object() -> Variant {
        Variant::from_data(VariantData::Object(RefCell::new(IndexMap::new())))
    }

    /// Creates an object variant from key/value pairs. Later duplicates
    /// overwrite earlier ones.
    pub fn object_from<I>(pairs: I) -> Variant
    where
        I: IntoIterator<Item = (String, Variant)>,
    {
        Variant::from_data(VariantData::Object(RefCell::new(
            pairs.into_iter().collect(),
        )))
    }

    /// Creates a tuple variant of fixed size.
    pub fn tuple(items: Vec<Variant>) -> Variant {
        Variant::from_data(VariantData::Tuple(RefCell::new(items)))
    }

    /// Creates an empty set. `unique_by` is a space-separated list of key
    /// field names; `None` or an empty spec means whole-value equality.
    pub fn set(unique_by: Option<&str>, caseless: bool) -> Variant {
        Variant::from_data(VariantData::Set(RefCell::new(SetData::new(
            unique_by, caseless,
        ))))
    }

    /// Builds a set from the members of a linear container, dropping
    /// duplicates under the set's uniqueness rule.
    pub fn set_from_container(
        source: &Variant,
        unique_by: Option<&str>,
        caseless: bool,
    ) -> CoreResult<Variant> {
        let set = Variant::set(unique_by, caseless);
        for member in source.members()? {
            set.set_add(member, false)?;
        }
        Ok(set)
    }

    /// The tag of this variant.
    pub fn variant_type(&self) -> VariantType {
        match &self.cell.data {
            VariantData::Undefined => VariantType::Undefined,
            VariantData::Null => VariantType::Null,
            VariantData::Boolean(_) => VariantType::Boolean,
            VariantData::Exception(_) => VariantType::Exception,
            VariantData::Number(_) => VariantType::Number,
            VariantData::LongInt(_) => VariantType::LongInt,
            VariantData::ULongInt(_) => VariantType::ULongInt,
            VariantData::LongDouble(_) => VariantType::LongDouble,
            VariantData::AtomString(_) => VariantType::AtomString,
            VariantData::String(_) => VariantType::String,
            VariantData::ByteSeq(_) => VariantType::ByteSeq,
            VariantData::Dynamic(_) => VariantType::Dynamic,
            VariantData::Native(_) => VariantType::Native,
            VariantData::Object(_) => VariantType::Object,
            VariantData::Array(_) => VariantType::Array,
            VariantData::Set(_) => VariantType::Set,
            VariantData::Tuple(_) => VariantType::Tuple,
        }
    }

    /// Current reference count of the underlying cell.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.cell)
    }

    /// Explicit alias of `clone`, mirroring the ref/unref contract.
    pub fn ref_clone(&self) -> Variant {
        self.clone()
    }

    /// True if both handles share one cell.
    pub fn ptr_eq(&self, other: &Variant) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    /// True for the undefined singleton.
    pub fn is_undefined(&self) -> bool {
        matches!(self.cell.data, VariantData::Undefined)
    }

    /// True for the null singleton.
    pub fn is_null(&self) -> bool {
        matches!(self.cell.data, VariantData::Null)
    }

    /// True for string, atom-string and exception variants.
    pub fn is_string(&self) -> bool {
        matches!(
            self.cell.data,
            VariantData::String(_) | VariantData::AtomString(_) | VariantData::Exception(_)
        )
    }

    /// True for exception variants.
    pub fn is_except_atom(&self) -> bool {
        matches!(self.cell.data, VariantData::Exception(_))
    }

    /// True for object variants.
    pub fn is_object(&self) -> bool {
        matches!(self.cell.data, VariantData::Object(_))
    }

    /// True for array variants.
    pub fn is_array(&self) -> bool {
        matches!(self.cell.data, VariantData::Array(_))
    }

    /// True for set variants.
    pub fn is_set(&self) -> bool {
        matches!(self.cell.data, VariantData::Set(_))
    }

    /// True for tuple variants.
    pub fn is_tuple(&self) -> bool {
        matches!(self.cell.data, VariantData::Tuple(_))
    }

    /// True for native variants.
    pub fn is_native(&self) -> bool {
        matches!(self.cell.data, VariantData::Native(_))
    }

    /// The boolean payload, if this is a boolean.
    pub fn as_boolean(&self) -> Option<bool> {
        match self.cell.data {
            VariantData::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// The numeric payload of a number variant.
    pub fn as_number(&self) -> Option<f64> {
        match self.cell.data {
            VariantData::Number(n) | VariantData::LongDouble(n) => Some(n),
            VariantData::LongInt(n) => Some(n as f64),
            VariantData::ULongInt(n) => Some(n as f64),
            _ => None,
        }
    }

    /// The signed integer payload, if this is a longint.
    pub fn as_longint(&self) -> Option<i64> {
        match self.cell.data {
            VariantData::LongInt(n) => Some(n),
            _ => None,
        }
    }

    /// The unsigned integer payload, if this is a ulongint.
    pub fn as_ulongint(&self) -> Option<u64> {
        match self.cell.data {
            VariantData::ULongInt(n) => Some(n),
            _ => None,
        }
    }

    /// The atom behind an atom-string or exception variant.
    pub fn as_atom(&self) -> Option<Atom> {
        match self.cell.data {
            VariantData::AtomString(a) | VariantData::Exception(a) => Some(a),
            _ => None,
        }
    }

    /// The dynamic payload, if this is a dynamic variant.
    pub fn dynamic_val(&self) -> Option<&DynamicVal> {
        match &self.cell.data {
            VariantData::Dynamic(d) => Some(d),
            _ => None,
        }
    }

    /// The native payload, if this is a native variant.
    pub fn native_val(&self) -> Option<&NativeVal> {
        match &self.cell.data {
            VariantData::Native(n) => Some(n),
            _ => None,
        }
    }

    /// The string payload. Atom strings and exceptions resolve through the
    /// atom table; raw strings that failed validation return `None`.
    pub fn get_string(&self) -> Option<&str> {
        match &self.cell.data {
            VariantData::String(store) => store.as_str(),
            VariantData::AtomString(a) | VariantData::Exception(a) => atom::to_string(*a),
            _ => None,
        }
    }

    /// The string payload or a `WrongDataType` error.
    pub fn require_string(&self) -> CoreResult<&str> {
        self.get_string().ok_or_else(|| {
            CoreError::wrong_data_type("string", self.variant_type().as_str())
        })
    }

    /// Byte length of a string including its trailing NUL.
    pub fn string_bytes(&self) -> Option<usize> {
        match &self.cell.data {
            VariantData::String(store) => Some(store.byte_size()),
            VariantData::AtomString(a) | VariantData::Exception(a) => {
                atom::to_string(*a).map(|s| s.len() + 1)
            }
            _ => None,
        }
    }

    /// Cached code-point count of a string.
    pub fn string_chars(&self) -> Option<usize> {
        match &self.cell.data {
            VariantData::String(store) => store.char_count(),
            VariantData::AtomString(a) | VariantData::Exception(a) => {
                atom::to_string(*a).map(purc_core::utf8::char_count)
            }
            _ => None,
        }
    }

    /// The raw bytes of a string or byte sequence. String payloads are
    /// returned without the implied trailing NUL.
    pub fn get_bytes(&self) -> Option<&[u8]> {
        match &self.cell.data {
            VariantData::String(store) => Some(store.bytes()),
            VariantData::ByteSeq(store) => Some(store.bytes()),
            VariantData::AtomString(a) | VariantData::Exception(a) => {
                atom::to_string(*a).map(str::as_bytes)
            }
            _ => None,
        }
    }

    /// Coerces the variant to a boolean the way conditionals do.
    pub fn booleanize(&self) -> bool {
        match &self.cell.data {
            VariantData::Undefined | VariantData::Null => false,
            VariantData::Boolean(b) => *b,
            VariantData::Number(n) | VariantData::LongDouble(n) => *n != 0.0,
            VariantData::LongInt(n) => *n != 0,
            VariantData::ULongInt(n) => *n != 0,
            VariantData::Exception(_) => true,
            VariantData::AtomString(a) => atom::to_string(*a).is_some_and(|s| !s.is_empty()),
            VariantData::String(store) => !store.bytes().is_empty(),
            VariantData::ByteSeq(store) => !store.is_empty(),
            VariantData::Dynamic(_) | VariantData::Native(_) => true,
            VariantData::Object(map) => !map.borrow().is_empty(),
            VariantData::Array(items) | VariantData::Tuple(items) => !items.borrow().is_empty(),
            VariantData::Set(set) => set.borrow().len() != 0,
        }
    }

    /// Coerces the variant to a number the way arithmetic does. Values
    /// with no numeric reading yield 0.
    pub fn numberize(&self) -> f64 {
        match &self.cell.data {
            VariantData::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            VariantData::Number(n) | VariantData::LongDouble(n) => *n,
            VariantData::LongInt(n) => *n as f64,
            VariantData::ULongInt(n) => *n as f64,
            VariantData::String(store) => store
                .as_str()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .unwrap_or(0.0),
            VariantData::AtomString(a) => atom::to_string(*a)
                .and_then(|s| s.trim().parse::<f64>().ok())
                .unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Deep equality. Containers compare member-wise, cycle-safe.
    pub fn is_equal_to(&self, other: &Variant) -> bool {
        self.equal_with(other, false)
    }

    /// Deep equality with optional caseless string comparison.
    pub fn equal_with(&self, other: &Variant, caseless: bool) -> bool {
        let mut visited = Vec::new();
        equals_inner(self, other, caseless, &mut visited)
    }
}

fn equals_inner(
    a: &Variant,
    b: &Variant,
    caseless: bool,
    visited: &mut Vec<(*const VariantCell, *const VariantCell)>,
) -> bool {
    if a.ptr_eq(b) {
        return true;
    }

    let pair = (
        Rc::as_ptr(&a.cell),
        Rc::as_ptr(&b.cell),
    );
    if visited.contains(&pair) {
        return true;
    }

    // strings compare across string-like kinds
    if let (Some(sa), Some(sb)) = (a.get_string(), b.get_string()) {
        return if caseless {
            sa.eq_ignore_ascii_case(sb)
        } else {
            sa == sb
        };
    }

    // numbers compare numerically across the numeric family
    let numeric = |v: &Variant| {
        matches!(
            v.variant_type(),
            VariantType::Number
                | VariantType::LongInt
                | VariantType::ULongInt
                | VariantType::LongDouble
        )
    };
    if numeric(a) && numeric(b) {
        return a.numberize() == b.numberize();
    }

    match (&a.cell.data, &b.cell.data) {
        (VariantData::Undefined, VariantData::Undefined) => true,
        (VariantData::Null, VariantData::Null) => true,
        (VariantData::Boolean(x), VariantData::Boolean(y)) => x == y,
        // strings that failed validation still compare by bytes
        (VariantData::String(x), VariantData::String(y)) => x.bytes() == y.bytes(),
        (VariantData::ByteSeq(x), VariantData::ByteSeq(y)) => x.bytes() == y.bytes(),
        (VariantData::Dynamic(_), VariantData::Dynamic(_))
        | (VariantData::Native(_), VariantData::Native(_)) => false,
        (VariantData::Array(x), VariantData::Array(y))
        | (VariantData::Tuple(x), VariantData::Tuple(y)) => {
            visited.push(pair);
            let x = x.borrow();
            let y = y.borrow();
            let equal = x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|(xa, ya)| equals_inner(xa, ya, caseless, visited));
            visited.pop();
            equal
        }
        (VariantData::Object(x), VariantData::Object(y)) => {
            visited.push(pair);
            let x = x.borrow();
            let y = y.borrow();
            let equal = x.len() == y.len()
                && x.iter().all(|(key, xa)| {
                    y.get(key)
                        .is_some_and(|ya| equals_inner(xa, ya, caseless, visited))
                });
            visited.pop();
            equal
        }
        (VariantData::Set(x), VariantData::Set(y)) => {
            visited.push(pair);
            let x = x.borrow();
            let y = y.borrow();
            let equal = x.len() == y.len()
                && x.records().iter().all(|xa| {
                    y.records()
                        .iter()
                        .any(|ya| equals_inner(xa, ya, caseless, visited))
                });
            visited.pop();
            equal
        }
        _ => false,
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal_to(other)
    }
}

impl std::fmt::Debug for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.cell.data {
            VariantData::Undefined => f.write_str("undefined"),
            VariantData::Null => f.write_str("null"),
            VariantData::Boolean(b) => write!(f, "{b}"),
            VariantData::Exception(a) => write!(f, "exception({a})"),
            VariantData::Number(n) => write!(f, "{n}"),
            VariantData::LongInt(n) => write!(f, "{n}L"),
            VariantData::ULongInt(n) => write!(f, "{n}UL"),
            VariantData::LongDouble(n) => write!(f, "{n}FL"),
            VariantData::AtomString(a) => write!(f, "atom({a})"),
            VariantData::String(s) => write!(f, "{:?}", s.as_str().unwrap_or("<bad-utf8>")),
            VariantData::ByteSeq(b) => write!(f, "bx{} bytes", b.len()),
            VariantData::Dynamic(_) => f.write_str("<dynamic>"),
            VariantData::Native(_) => f.write_str("<native>"),
            VariantData::Object(map) => {
                write!(f, "object({} entries)", map.borrow().len())
            }
            VariantData::Array(items) => write!(f, "array({} items)", items.borrow().len()),
            VariantData::Set(set) => write!(f, "set({} records)", set.borrow().len()),
            VariantData::Tuple(items) => write!(f, "tuple({} items)", items.borrow().len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap;

    #[test]
    fn test_ref_count_protocol() {
        let value = Variant::string("counted");
        assert_eq!(value.ref_count(), 1);

        let alias = value.ref_clone();
        assert_eq!(value.ref_count(), 2);

        drop(alias);
        assert_eq!(value.ref_count(), 1);
    }

    #[test]
    fn test_no_leak_no_double_free() {
        let before = heap::used_variants();

        let undefined = Variant::undefined();
        let another = Variant::undefined();
        drop(another);
        assert!(!undefined.is_null());
        drop(undefined);

        assert_eq!(heap::used_variants(), before);
    }

    #[test]
    fn test_string_metrics() {
        let value = Variant::string_checked("zh中文".as_bytes()).unwrap();
        assert_eq!(value.string_chars(), Some(4));
        assert_eq!(value.string_bytes(), Some(9));
        assert_eq!(value.get_string(), Some("zh中文"));

        assert!(matches!(
            Variant::string_checked(b"\xff"),
            Err(CoreError::BadEncoding { .. })
        ));
    }

    #[test]
    fn test_atom_string_lookup() {
        let atom = Atom::from_str("atom-backed");
        let value = Variant::atom_string(atom);
        assert_eq!(value.get_string(), Some("atom-backed"));
        assert_eq!(value.string_bytes(), Some("atom-backed".len() + 1));
        assert!(!value.is_except_atom());

        let exc = Variant::exception(CoreError::bad_name("x").except_atom());
        assert!(exc.is_except_atom());
        assert_eq!(exc.get_string(), Some("BadName"));
    }

    #[test]
    fn test_get_bytes_accepts_both() {
        let string = Variant::string("abc");
        let bytes = Variant::byte_seq(b"abc");
        assert_eq!(string.get_bytes(), Some(&b"abc"[..]));
        assert_eq!(bytes.get_bytes(), Some(&b"abc"[..]));
        assert_eq!(Variant::number(1.0).get_bytes(), None);
    }

    #[test]
    fn test_booleanize() {
        assert!(!Variant::null().booleanize());
        assert!(!Variant::undefined().booleanize());
        assert!(!Variant::string("").booleanize());
        assert!(Variant::string("x").booleanize());
        assert!(!Variant::number(0.0).booleanize());
        assert!(Variant::longint(-1).booleanize());
        assert!(!Variant::array(vec![]).booleanize());
        assert!(Variant::array(vec![Variant::null()]).booleanize());
    }

    #[test]
    fn test_numeric_cross_type_equality() {
        assert!(Variant::number(42.0).is_equal_to(&Variant::longint(42)));
        assert!(Variant::ulongint(7).is_equal_to(&Variant::number(7.0)));
        assert!(!Variant::number(42.5).is_equal_to(&Variant::longint(42)));
    }

    #[test]
    fn test_deep_equality() {
        let a = Variant::array(vec![Variant::longint(1), Variant::string("two")]);
        let b = Variant::array(vec![Variant::longint(1), Variant::string("two")]);
        let c = Variant::array(vec![Variant::longint(1), Variant::string("three")]);
        assert!(a.is_equal_to(&b));
        assert!(!a.is_equal_to(&c));
    }

    #[test]
    fn test_cyclic_equality_terminates() {
        let a = Variant::array(vec![]);
        a.array_append(a.clone()).unwrap();
        let b = Variant::array(vec![]);
        b.array_append(b.clone()).unwrap();
        assert!(a.is_equal_to(&b));

        // break the cycles so the heap drains
        a.container_clear().unwrap();
        b.container_clear().unwrap();
    }

    #[test]
    fn test_caseless_strings() {
        let a = Variant::string("HVML");
        let b = Variant::string("hvml");
        assert!(!a.is_equal_to(&b));
        assert!(a.equal_with(&b, true));
    }
}
