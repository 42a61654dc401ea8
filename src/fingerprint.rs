// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    binio::{BinaryRead, BinaryWrite},
    coding::{Decode, DecodeError, Encode, EncodeError},
};
use std::{io::Read, path::Path};

const MAGIC16: u16 = 0xA001;
const MAGIC32: u32 = 0xEDB8_8320;

/// Content fingerprint of a file
///
/// A pair of a 16-bit and a 32-bit cyclic redundancy checksum,
/// both computed over the full content of a file.
/// Two fingerprints are equal iff both checksums are equal.
///
/// # Examples
///
/// ```
/// # use modinfo_db::Fingerprint;
/// let key = Fingerprint::from_bytes(b"123456789");
/// assert_eq!(0xBB3D, key.crc16());
/// assert_eq!(0xCBF4_3926, key.crc32());
/// assert_eq!("bb3d:cbf43926", key.to_string());
/// ```
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Fingerprint {
    crc16: u16,
    crc32: u32,
}

impl Fingerprint {
    /// Number of bytes a fingerprint occupies on disk.
    pub const ENCODED_LEN: u64 = 2 + 4;

    /// Creates a fingerprint from raw checksum values.
    #[must_use]
    pub const fn new(crc16: u16, crc32: u32) -> Self {
        Self { crc16, crc32 }
    }

    /// Fingerprints a byte slice.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = FingerprintHasher::new();
        hasher.update(bytes);
        hasher.finish()
    }

    /// Fingerprints everything a reader yields, until it is exhausted.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn from_reader<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut hasher = FingerprintHasher::new();
        std::io::copy(reader, &mut hasher)?;
        Ok(hasher.finish())
    }

    /// Fingerprints the content of a file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file cannot be opened or read.
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(&mut std::io::BufReader::new(file))
    }

    /// Returns the 16-bit checksum.
    #[must_use]
    pub const fn crc16(&self) -> u16 {
        self.crc16
    }

    /// Returns the 32-bit checksum.
    #[must_use]
    pub const fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Maps the fingerprint onto one of `radix` hash slots.
    #[must_use]
    pub(crate) fn slot(&self, radix: u32) -> usize {
        let sum = u64::from(self.crc32) + u64::from(self.crc16);

        #[allow(clippy::cast_possible_truncation)]
        {
            (sum % u64::from(radix)) as usize
        }
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}:{:08x}", self.crc16, self.crc32)
    }
}

/// Error returned when parsing a fingerprint string fails
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParseFingerprintError(String);

impl std::fmt::Display for ParseFingerprintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid fingerprint {:?}, expected CRC16:CRC32 in hex", self.0)
    }
}

impl std::error::Error for ParseFingerprintError {}

impl std::str::FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseFingerprintError(s.to_owned());

        let (crc16, crc32) = s.split_once(':').ok_or_else(err)?;
        let crc16 = u16::from_str_radix(crc16, 16).map_err(|_| err())?;
        let crc32 = u32::from_str_radix(crc32, 16).map_err(|_| err())?;

        Ok(Self::new(crc16, crc32))
    }
}

impl Encode for Fingerprint {
    fn encode_into<W: BinaryWrite>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_word(self.crc16)?;
        writer.write_dword(self.crc32)?;
        Ok(())
    }
}

impl Decode for Fingerprint {
    fn decode_from<R: BinaryRead>(reader: &mut R) -> Result<Self, DecodeError> {
        let crc16 = reader.read_word()?;
        let crc32 = reader.read_dword()?;
        Ok(Self::new(crc16, crc32))
    }
}

/// Incremental fingerprint computation
///
/// Both checksums are advanced in lockstep, one bit at a time,
/// least significant bit of each byte first.
#[derive(Clone, Debug)]
pub struct FingerprintHasher {
    crc16: u16,
    crc32: u32,
}

impl Default for FingerprintHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintHasher {
    /// Creates a hasher in its initial state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            crc16: 0,
            crc32: !0,
        }
    }

    /// Feeds bytes into both accumulators.
    pub fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let mut byte = byte;

            for _ in 0..8 {
                if (self.crc16 ^ u16::from(byte)) & 1 == 1 {
                    self.crc16 = (self.crc16 >> 1) ^ MAGIC16;
                } else {
                    self.crc16 >>= 1;
                }

                if (self.crc32 ^ u32::from(byte)) & 1 == 1 {
                    self.crc32 = (self.crc32 >> 1) ^ MAGIC32;
                } else {
                    self.crc32 >>= 1;
                }

                byte >>= 1;
            }
        }
    }

    /// Returns the fingerprint of all bytes fed so far.
    #[must_use]
    pub const fn finish(&self) -> Fingerprint {
        Fingerprint::new(self.crc16, !self.crc32)
    }
}

impl std::io::Write for FingerprintHasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
