// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A small embedded metadata store, keyed by file content.
//!
//! ##### About
//!
//! This crate exports a [`Store`] that maps the *content* of a file to auxiliary
//! information about it (song title and author, replay clock speed, ...).
//!
//! Files are identified by a [`Fingerprint`]: a CRC16 and a CRC32 computed over
//! the full file content in one pass. Two files with equal fingerprints are
//! considered the same file, regardless of their names or location.
//!
//! Records are held in memory, indexed both by insertion order and by a hash of
//! their fingerprint, and persisted as a whole to a single flat file.
//! Wiped records become tombstones until the next save.
//!
//! ##### File format
//!
//! The store file starts with a fixed identifier and a record count, followed by
//! self-describing records. Every record declares the size of its payload, so
//! readers skip record kinds they do not know instead of failing.
//!
//! # Examples
//!
//! ```
//! use modinfo_db::{Config, FileType, Fingerprint, Payload, Record};
//! # let folder = tempfile::tempdir()?;
//! # let path = folder.path().join("modinfo.db");
//!
//! let mut store = Config::new(&path).open()?;
//!
//! let key = Fingerprint::from_bytes(b"the content of some module file");
//!
//! if store.search(&key).is_none() {
//!     store.insert(Record::clock_speed(key, FileType::UNDEFINED, 1_193_180.0))?;
//!     store.save()?;
//! }
//!
//! let mut store = Config::new(&path).open()?;
//! let record = store.search(&key).expect("should exist");
//! assert_eq!(&Payload::ClockSpeed { clock: 1_193_180.0 }, record.payload());
//! # Ok::<(), modinfo_db::Error>(())
//! ```

#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]
#![warn(clippy::redundant_feature_names)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

#[doc(hidden)]
pub mod binio;

#[doc(hidden)]
pub mod coding;

/// Configuration
pub mod config;

mod error;

#[doc(hidden)]
pub mod file;

mod file_type;
mod fingerprint;
mod path;
mod record;
mod store;

pub use {
    binio::ByteOrder,
    config::Config,
    error::{Error, Result},
    file_type::FileType,
    fingerprint::{Fingerprint, FingerprintHasher, ParseFingerprintError},
    record::{Payload, Record, RecordKind},
    store::{BucketRef, InsertError, Store, DEFAULT_HASH_RADIX, MAX_HASH_RADIX},
};

#[doc(hidden)]
#[must_use]
#[allow(missing_docs, clippy::missing_errors_doc, clippy::unwrap_used)]
pub fn get_tmp_folder() -> tempfile::TempDir {
    if let Ok(p) = std::env::var("MODINFO_TMP_FOLDER") {
        tempfile::tempdir_in(p)
    } else {
        tempfile::tempdir()
    }
    .unwrap()
}
