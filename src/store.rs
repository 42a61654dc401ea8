// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    binio::{BinStream, BinaryRead, BinaryWrite},
    coding::{DecodeError, Encode, EncodeError},
    file::{rewrite_atomic, FILE_ID},
    Config, Fingerprint, Record,
};
use std::path::Path;

/// Default number of hash slots (largest prime below 2^16)
pub const DEFAULT_HASH_RADIX: u32 = 65_521;

/// Largest accepted number of hash slots
///
/// Slots are allocated up front, so this bounds the memory of an empty store.
pub const MAX_HASH_RADIX: u32 = 1 << 20;

/// Position of a bucket in insertion order
type BucketId = usize;

/// Storage cell of a record
struct Bucket {
    /// Kept separately so chains stay walkable after the record is wiped
    key: Fingerprint,

    /// `None` once wiped (tombstone)
    record: Option<Record>,

    /// Next bucket in the same hash slot
    next: Option<BucketId>,
}

/// Reason a record was rejected by [`Store::insert`]
///
/// The rejected record is handed back to the caller.
#[derive(Debug)]
pub enum InsertError {
    /// Every hash slot is taken
    Full(Record),

    /// A live record with the same key exists
    Duplicate(Record),

    /// The record could not be written to disk
    Invalid(Record, EncodeError),
}

impl InsertError {
    /// Returns the rejected record.
    #[must_use]
    pub fn into_record(self) -> Record {
        match self {
            Self::Full(record) | Self::Duplicate(record) | Self::Invalid(record, _) => record,
        }
    }

    /// Returns the rejected record.
    #[must_use]
    pub fn record(&self) -> &Record {
        match self {
            Self::Full(record) | Self::Duplicate(record) | Self::Invalid(record, _) => record,
        }
    }
}

impl std::fmt::Display for InsertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full(record) => write!(f, "InsertError(Full: {})", record.key()),
            Self::Duplicate(record) => write!(f, "InsertError(Duplicate: {})", record.key()),
            Self::Invalid(record, e) => write!(f, "InsertError(Invalid: {}, {e})", record.key()),
        }
    }
}

impl std::error::Error for InsertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Invalid(_, e) => Some(e),
            Self::Full(_) | Self::Duplicate(_) => None,
        }
    }
}

/// A view of one bucket, as seen when iterating in insertion order
#[derive(Copy, Clone, Debug)]
pub struct BucketRef<'a> {
    index: usize,
    key: Fingerprint,
    record: Option<&'a Record>,
}

impl<'a> BucketRef<'a> {
    /// Insertion index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Key the bucket was created for.
    #[must_use]
    pub fn key(&self) -> Fingerprint {
        self.key
    }

    /// The record, or `None` if it has been wiped.
    #[must_use]
    pub fn record(&self) -> Option<&'a Record> {
        self.record
    }

    /// Returns `true` if the record has been wiped.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.record.is_none()
    }
}

/// Fingerprint-keyed record store
///
/// Records are kept in insertion order, and additionally chained into
/// a fixed number of hash slots for lookups by key.
///
/// Wiping a record leaves a tombstone in its place, so insertion indices
/// stay dense and stable. Tombstones are dropped when the store is saved.
///
/// The store has a cursor pointing at one position in insertion order,
/// which is moved by lookups and navigation, and read by [`Store::get_record`].
///
/// # Examples
///
/// ```
/// # use modinfo_db::{Config, FileType, Fingerprint, Record};
/// # let folder = tempfile::tempdir()?;
/// let mut store = Config::new(folder.path().join("modinfo.db")).open()?;
///
/// let key = Fingerprint::from_bytes(b"module content");
/// store.insert(Record::song_info(key, FileType::UNDEFINED, "Sample", "Tester"))?;
/// store.save()?;
///
/// let store = Config::new(folder.path().join("modinfo.db")).open()?;
/// assert_eq!(1, store.len());
/// # Ok::<(), modinfo_db::Error>(())
/// ```
pub struct Store {
    config: Config,

    /// Arena, indexed by insertion index
    buckets: Vec<Bucket>,

    /// Chain heads, indexed by hash slot
    slots: Box<[Option<BucketId>]>,

    /// Number of non-wiped records
    live: usize,

    cursor: usize,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.config.path)
            .field("len", &self.live)
            .field("slot_count", &self.buckets.len())
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Creates an empty store, without touching the file system.
    ///
    /// The hash radix of the config is clamped to `1..=MAX_HASH_RADIX`.
    #[must_use]
    pub fn new(mut config: Config) -> Self {
        config.hash_radix = config.hash_radix.clamp(1, MAX_HASH_RADIX);

        let slots = vec![None; config.hash_radix as usize].into_boxed_slice();

        Self {
            config,
            buckets: Vec::new(),
            slots,
            live: 0,
            cursor: 0,
        }
    }

    /// Returns the config the store was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of live (non-wiped) records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if there are no live records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of buckets, including tombstones.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.buckets.len()
    }

    /// Maximum number of buckets.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Current cursor position (insertion index).
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn find(&self, key: &Fingerprint) -> Option<BucketId> {
        let mut next = self.slots.get(key.slot(self.config.hash_radix)).copied().flatten();

        while let Some(id) = next {
            let bucket = self.buckets.get(id)?;

            if bucket.record.is_some() && bucket.key == *key {
                return Some(id);
            }

            next = bucket.next;
        }

        None
    }

    /// Returns `true` if a live record with the given key exists.
    #[must_use]
    pub fn contains_key(&self, key: &Fingerprint) -> bool {
        self.find(key).is_some()
    }

    /// Moves the cursor to the live record with the given key.
    ///
    /// Returns `false` and leaves the cursor where it is if there is none.
    pub fn lookup(&mut self, key: &Fingerprint) -> bool {
        match self.find(key) {
            Some(id) => {
                self.cursor = id;
                true
            }
            None => false,
        }
    }

    /// Looks up the record with the given key, moving the cursor to it.
    pub fn search(&mut self, key: &Fingerprint) -> Option<&Record> {
        if self.lookup(key) {
            self.get_record()
        } else {
            None
        }
    }

    /// Inserts a record.
    ///
    /// The record is appended in insertion order, and to the end of its hash chain.
    ///
    /// # Errors
    ///
    /// Will return `Err` (handing the record back) if the record cannot be
    /// written to disk, the store is full, or a live record with the same key exists.
    pub fn insert(&mut self, record: Record) -> Result<(), InsertError> {
        if let Err(e) = record.validate() {
            return Err(InsertError::Invalid(record, e));
        }

        if self.buckets.len() >= self.slots.len() {
            return Err(InsertError::Full(record));
        }

        let key = record.key();

        if self.contains_key(&key) {
            return Err(InsertError::Duplicate(record));
        }

        let id = self.buckets.len();

        self.buckets.push(Bucket {
            key,
            record: Some(record),
            next: None,
        });
        self.live += 1;

        let slot = key.slot(self.config.hash_radix);

        // NOTE: slot < hash_radix == slots.len()
        #[allow(clippy::indexing_slicing)]
        let head = &mut self.slots[slot];

        match *head {
            None => *head = Some(id),
            Some(mut tail) => {
                while let Some(next) = self.buckets.get(tail).and_then(|b| b.next) {
                    tail = next;
                }

                if let Some(bucket) = self.buckets.get_mut(tail) {
                    bucket.next = Some(id);
                }
            }
        }

        Ok(())
    }

    /// Wipes the live record with the given key, moving the cursor to it.
    ///
    /// Returns the wiped record, or `None` if there was no such record.
    pub fn wipe(&mut self, key: &Fingerprint) -> Option<Record> {
        if self.lookup(key) {
            self.wipe_current()
        } else {
            None
        }
    }

    /// Wipes the record under the cursor.
    ///
    /// Wiping a tombstone does nothing and returns `None`.
    pub fn wipe_current(&mut self) -> Option<Record> {
        let bucket = self.buckets.get_mut(self.cursor)?;
        let record = bucket.record.take()?;

        self.live -= 1;
        log::trace!("Wiped record {} at index {}", bucket.key, self.cursor);

        Some(record)
    }

    /// Returns the record under the cursor.
    ///
    /// Returns `None` if the store has no buckets, or the record has been wiped.
    #[must_use]
    pub fn get_record(&self) -> Option<&Record> {
        self.buckets.get(self.cursor)?.record.as_ref()
    }

    /// Mutable access to the record under the cursor.
    pub fn get_record_mut(&mut self) -> Option<&mut Record> {
        self.buckets.get_mut(self.cursor)?.record.as_mut()
    }

    /// Returns `true` if the bucket under the cursor is a tombstone.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.buckets
            .get(self.cursor)
            .is_some_and(|b| b.record.is_none())
    }

    /// Moves the cursor to the next bucket.
    ///
    /// Returns `false` if the cursor is at the last bucket.
    pub fn go_forward(&mut self) -> bool {
        if self.cursor + 1 < self.buckets.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Moves the cursor to the previous bucket.
    ///
    /// Returns `false` if the cursor is at the first bucket.
    pub fn go_backward(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    /// Moves the cursor to the first bucket.
    pub fn goto_begin(&mut self) {
        if !self.buckets.is_empty() {
            self.cursor = 0;
        }
    }

    /// Moves the cursor to the last bucket.
    pub fn goto_end(&mut self) {
        if let Some(last) = self.buckets.len().checked_sub(1) {
            self.cursor = last;
        }
    }

    /// Iterates over all buckets in insertion order, including tombstones.
    pub fn buckets(&self) -> impl DoubleEndedIterator<Item = BucketRef<'_>> + '_ {
        self.buckets
            .iter()
            .enumerate()
            .map(|(index, bucket)| BucketRef {
                index,
                key: bucket.key,
                record: bucket.record.as_ref(),
            })
    }

    /// Iterates over all live records in insertion order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Record> + '_ {
        self.buckets.iter().filter_map(|b| b.record.as_ref())
    }

    /// Writes all live records.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn encode_into<W: BinaryWrite>(&self, writer: &mut W) -> Result<(), EncodeError> {
        let count = u32::try_from(self.live).map_err(|_| EncodeError::LengthOverflow(self.live))?;

        writer.write_string(FILE_ID)?;
        writer.write_dword(count)?;

        for record in self.iter() {
            record.encode_into(writer)?;
        }

        Ok(())
    }

    /// Reads records and inserts them into the store.
    ///
    /// All records are parsed before any is inserted, so the store is left
    /// untouched if the input is malformed. Records of unknown kinds are skipped,
    /// as are records the store rejects.
    ///
    /// Returns the number of inserted records.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the input is not a store file.
    pub fn decode_from<R: BinaryRead>(&mut self, reader: &mut R) -> Result<usize, DecodeError> {
        let mut id = [0; FILE_ID.len()];
        reader.read_raw(&mut id)?;

        if id != FILE_ID {
            return Err(DecodeError::InvalidHeader("FileId"));
        }

        let count = reader.read_dword()?;

        let mut records = Vec::new();

        for _ in 0..count {
            if let Some(record) = Record::decode_from(reader)? {
                records.push(record);
            }
        }

        let skipped = count as usize - records.len();
        if skipped > 0 {
            log::debug!("Skipped {skipped} record(s) of unknown kind");
        }

        let mut inserted = 0;

        for record in records {
            match self.insert(record) {
                Ok(()) => inserted += 1,
                Err(e) => log::warn!("Dropping record while loading: {e}"),
            }
        }

        Ok(inserted)
    }

    pub(crate) fn load_from_file(&mut self, file: std::fs::File, path: &Path) -> crate::Result<usize> {
        let reader = std::io::BufReader::new(file);
        let mut stream = BinStream::new(reader, self.config.byte_order);

        let inserted = self.decode_from(&mut stream)?;
        log::debug!("Loaded {inserted} record(s) from {path:?}");

        Ok(inserted)
    }

    /// Loads records from a store file, adding them to the ones already in the store.
    ///
    /// Returns the number of inserted records.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the file is not a store file.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> crate::Result<usize> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        self.load_from_file(file, path)
    }

    /// Writes all live records to the configured path.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn save(&self) -> crate::Result<()> {
        self.save_to(&self.config.path)
    }

    /// Writes all live records to a file, replacing it atomically.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let path = path.as_ref();

        let mut stream = BinStream::new(Vec::new(), self.config.byte_order);
        self.encode_into(&mut stream)?;

        rewrite_atomic(path, &stream.into_inner())?;
        log::debug!("Saved {} record(s) to {path:?}", self.live);

        Ok(())
    }
}
