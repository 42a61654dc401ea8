// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    binio::ByteOrder, file::DEFAULT_FILE_NAME, path::absolute_path, store::{DEFAULT_HASH_RADIX, MAX_HASH_RADIX},
    Store,
};
use std::path::{Path, PathBuf};

/// Store configuration builder
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Path of the store file
    #[doc(hidden)]
    pub path: PathBuf,

    /// Byte order of multi-byte fields in the store file
    pub byte_order: ByteOrder,

    /// Number of hash slots, which also caps the number of records
    pub hash_radix: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: absolute_path(Path::new(DEFAULT_FILE_NAME)),
            byte_order: ByteOrder::native(),
            hash_radix: DEFAULT_HASH_RADIX,
        }
    }
}

impl Config {
    /// Initializes a new config
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: absolute_path(path.as_ref()),
            ..Default::default()
        }
    }

    /// Sets the byte order used to read and write the store file.
    ///
    /// Defaults to the byte order of the host.
    #[must_use]
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    /// Sets the number of hash slots.
    ///
    /// The store can never hold more records (including deleted ones)
    /// than it has slots. Should be prime.
    ///
    /// All slots are allocated when the store is created, so the value is
    /// clamped to `1..=MAX_HASH_RADIX` (2^20).
    ///
    /// Defaults to 65521.
    #[must_use]
    pub fn hash_radix(mut self, radix: u32) -> Self {
        let clamped = radix.clamp(1, MAX_HASH_RADIX);

        if clamped != radix {
            log::warn!("Hash radix {radix} out of range, using {clamped}");
        }

        self.hash_radix = clamped;
        self
    }

    /// Opens a store using the config.
    ///
    /// If the store file does not exist yet, the store starts out empty.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the file is not a store file.
    pub fn open(self) -> crate::Result<Store> {
        let path = self.path.clone();
        let mut store = Store::new(self);

        match std::fs::File::open(&path) {
            Ok(file) => {
                store.load_from_file(file, &path)?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No store file at {path:?}, starting empty");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(store)
    }
}
