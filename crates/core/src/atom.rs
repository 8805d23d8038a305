//! Bucketed string interner.
//!
//! An atom is a non-zero `u32` encoding `(bucket << 28) | seq`. Buckets
//! keep separate string universes from colliding: exception names interned
//! in [`BUCKET_EXCEPT`] never alias HVML keywords interned in
//! [`BUCKET_DEFAULT`]. Interning is idempotent per bucket; removal
//! invalidates the id, and a later intern of the same text yields a fresh
//! one.
//!
//! The whole table sits behind one process-wide read/write lock. Readers
//! hold the read lock only across the map lookup. Interned text is moved
//! into leaked block storage, so the `&'static str` handed back outlives
//! every reader of the table.

use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Number of bits encoding the bucket.
const BUCKET_BITS: u32 = 4;
/// Number of bits encoding the per-bucket sequence id.
const SEQ_BITS: u32 = 32 - BUCKET_BITS;
/// Number of buckets.
pub const BUCKETS_NR: usize = 1 << BUCKET_BITS;

/// The default bucket, used for HVML keywords and general strings.
pub const BUCKET_DEFAULT: u8 = 0;
/// The bucket reserved for user-defined tokens.
pub const BUCKET_USER: u8 = 1;
/// The bucket reserved for exception names.
pub const BUCKET_EXCEPT: u8 = 2;
/// The bucket reserved for renderer verbs.
pub const BUCKET_RDR: u8 = 3;

/// Size of a bump block for interned text.
const STRING_BLOCK_SIZE: usize = 4096;

/// An interned string id. The zero value means "no atom".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Atom(u32);

impl Atom {
    /// The null atom.
    pub const fn null() -> Self {
        Atom(0)
    }

    /// Returns true if this is the null atom.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The raw encoded value.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Rebuilds an atom from a raw value previously obtained with
    /// [`Atom::raw`]. The value is not checked against the table.
    pub fn from_raw(raw: u32) -> Atom {
        Atom(raw)
    }

    /// The bucket this atom was interned in.
    pub fn bucket(self) -> u8 {
        (self.0 >> SEQ_BITS) as u8
    }

    /// The per-bucket sequence id.
    pub fn sequence(self) -> u32 {
        self.0 & ((1 << SEQ_BITS) - 1)
    }

    /// Interns `s` in `bucket`, copying the text. Idempotent until the
    /// string is removed.
    pub fn from_string(bucket: u8, s: &str) -> Atom {
        let mut table = TABLE.write();
        if let Some(raw) = table.bucket(bucket).map.get(s) {
            return Atom(*raw);
        }
        let text = table.arena.intern(s);
        table.insert(bucket, text)
    }

    /// Interns `s` in the default bucket.
    pub fn from_str(s: &str) -> Atom {
        Self::from_string(BUCKET_DEFAULT, s)
    }

    /// Interns a static string without copying it.
    pub fn from_static_str(bucket: u8, s: &'static str) -> Atom {
        let mut table = TABLE.write();
        if let Some(raw) = table.bucket(bucket).map.get(s) {
            return Atom(*raw);
        }
        table.insert(bucket, s)
    }

    /// Looks up `s` in `bucket` without creating an atom.
    pub fn try_string(bucket: u8, s: &str) -> Option<Atom> {
        let table = TABLE.read();
        table.bucket(bucket).map.get(s).copied().map(Atom)
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match to_string(*self) {
            Some(s) => f.write_str(s),
            None => write!(f, "atom#{}", self.0),
        }
    }
}

/// Resolves an atom back to its string. Returns `None` for the null atom
/// and for atoms whose string has been removed.
pub fn to_string(atom: Atom) -> Option<&'static str> {
    if atom.is_null() {
        return None;
    }

    let table = TABLE.read();
    let bucket = table.bucket(atom.bucket());
    bucket
        .quarks
        .get(atom.sequence() as usize)
        .copied()
        .flatten()
}

/// Removes `s` from `bucket`, invalidating its atom. Returns true if the
/// string was interned.
pub fn remove_string(bucket: u8, s: &str) -> bool {
    let mut table = TABLE.write();
    let bucket = table.bucket_mut(bucket);
    match bucket.map.remove(s) {
        Some(raw) => {
            let seq = (raw & ((1 << SEQ_BITS) - 1)) as usize;
            if let Some(slot) = bucket.quarks.get_mut(seq) {
                *slot = None;
            }
            true
        }
        None => false,
    }
}

struct Bucket {
    /// string -> raw atom value
    map: HashMap<&'static str, u32>,
    /// seq -> string; slot 0 stays empty, removal clears the slot
    quarks: Vec<Option<&'static str>>,
    seq: u32,
}

impl Bucket {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            quarks: vec![None],
            seq: 1,
        }
    }
}

struct BumpArena {
    block: *mut u8,
    offset: usize,
}

// The arena only hands out disjoint slices of leaked blocks; the raw
// pointer is confined behind the table lock.
unsafe impl Send for BumpArena {}
unsafe impl Sync for BumpArena {}

impl BumpArena {
    const fn new() -> Self {
        Self {
            block: std::ptr::null_mut(),
            offset: 0,
        }
    }

    /// Moves `s` into storage that lives for the rest of the process.
    /// Strings longer than half a block get their own allocation so the
    /// blocks stay at least half full.
    fn intern(&mut self, s: &str) -> &'static str {
        let len = s.len();
        if len > STRING_BLOCK_SIZE / 2 {
            return Box::leak(s.to_owned().into_boxed_str());
        }

        if self.block.is_null() || STRING_BLOCK_SIZE - self.offset < len {
            let block: Box<[u8]> = vec![0u8; STRING_BLOCK_SIZE].into_boxed_slice();
            self.block = Box::leak(block).as_mut_ptr();
            self.offset = 0;
        }

        unsafe {
            let dst = self.block.add(self.offset);
            std::ptr::copy_nonoverlapping(s.as_ptr(), dst, len);
            self.offset += len;
            std::str::from_utf8_unchecked(std::slice::from_raw_parts(dst, len))
        }
    }
}

struct AtomTable {
    buckets: Vec<Bucket>,
    arena: BumpArena,
}

impl AtomTable {
    fn new() -> Self {
        Self {
            buckets: (0..BUCKETS_NR).map(|_| Bucket::new()).collect(),
            arena: BumpArena::new(),
        }
    }

    fn bucket(&self, bucket: u8) -> &Bucket {
        assert!((bucket as usize) < BUCKETS_NR, "atom bucket out of range");
        &self.buckets[bucket as usize]
    }

    fn bucket_mut(&mut self, bucket: u8) -> &mut Bucket {
        assert!((bucket as usize) < BUCKETS_NR, "atom bucket out of range");
        &mut self.buckets[bucket as usize]
    }

    /// Records `text` under the next sequence id of `bucket_id`. The
    /// caller has already checked the map for an existing entry.
    fn insert(&mut self, bucket_id: u8, text: &'static str) -> Atom {
        let bucket = self.bucket_mut(bucket_id);
        let seq = bucket.seq;
        assert!(seq < (1 << SEQ_BITS), "atom sequence space exhausted");

        let raw = ((bucket_id as u32) << SEQ_BITS) | seq;
        bucket.quarks.push(Some(text));
        bucket.map.insert(text, raw);
        bucket.seq += 1;

        Atom(raw)
    }
}

static TABLE: Lazy<RwLock<AtomTable>> = Lazy::new(|| RwLock::new(AtomTable::new()));
