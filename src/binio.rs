// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Byte-order aware binary streams
//!
//! Reading and writing are two independent capabilities ([`BinaryRead`], [`BinaryWrite`]).
//! [`BinStream`] implements whichever of them its inner stream supports.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Scan buffer size used when reading delimited strings
pub const STRING_SCAN_SIZE: usize = 256;

/// Byte order of multi-byte integers and floats
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ByteOrder {
    /// Least significant byte first
    Little,

    /// Most significant byte first
    Big,
}

impl ByteOrder {
    /// Returns the byte order of the host.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

impl std::fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Little => "little-endian",
                Self::Big => "big-endian",
            }
        )
    }
}

/// Sequential typed reads
pub trait BinaryRead {
    /// Reads a single byte.
    fn read_byte(&mut self) -> std::io::Result<u8>;

    /// Reads a 16-bit word.
    fn read_word(&mut self) -> std::io::Result<u16>;

    /// Reads a 32-bit double word.
    fn read_dword(&mut self) -> std::io::Result<u32>;

    /// Reads a 32-bit IEEE float.
    fn read_float(&mut self) -> std::io::Result<f32>;

    /// Reads exactly `buf.len()` bytes.
    fn read_raw(&mut self, buf: &mut [u8]) -> std::io::Result<()>;

    /// Advances the stream by `amount` bytes.
    fn skip(&mut self, amount: u64) -> std::io::Result<()>;

    /// Reads bytes up to (and consuming) `delim`.
    ///
    /// The delimiter is not part of the returned bytes.
    /// Bytes are scanned in chunks of [`STRING_SCAN_SIZE`],
    /// so fields longer than one chunk are concatenated.
    fn read_string(&mut self, delim: u8) -> std::io::Result<Vec<u8>> {
        let mut result = Vec::new();
        let mut chunk = Vec::with_capacity(STRING_SCAN_SIZE);

        loop {
            chunk.clear();

            let mut found = false;

            while chunk.len() < STRING_SCAN_SIZE {
                let byte = self.read_byte()?;

                if byte == delim {
                    found = true;
                    break;
                }

                chunk.push(byte);
            }

            result.extend_from_slice(&chunk);

            if found {
                return Ok(result);
            }
        }
    }
}

/// Sequential typed writes
pub trait BinaryWrite {
    /// Writes a single byte.
    fn write_byte(&mut self, byte: u8) -> std::io::Result<()>;

    /// Writes a 16-bit word.
    fn write_word(&mut self, word: u16) -> std::io::Result<()>;

    /// Writes a 32-bit double word.
    fn write_dword(&mut self, dword: u32) -> std::io::Result<()>;

    /// Writes a 32-bit IEEE float.
    fn write_float(&mut self, value: f32) -> std::io::Result<()>;

    /// Writes raw bytes, without any terminator.
    fn write_string(&mut self, bytes: &[u8]) -> std::io::Result<()>;
}

/// A binary stream over some byte source or sink
pub struct BinStream<S> {
    inner: S,
    order: ByteOrder,
}

impl<S> BinStream<S> {
    /// Wraps a stream.
    pub fn new(inner: S, order: ByteOrder) -> Self {
        Self { inner, order }
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Read> BinaryRead for BinStream<S> {
    fn read_byte(&mut self) -> std::io::Result<u8> {
        self.inner.read_u8()
    }

    fn read_word(&mut self) -> std::io::Result<u16> {
        match self.order {
            ByteOrder::Little => self.inner.read_u16::<LittleEndian>(),
            ByteOrder::Big => self.inner.read_u16::<BigEndian>(),
        }
    }

    fn read_dword(&mut self) -> std::io::Result<u32> {
        match self.order {
            ByteOrder::Little => self.inner.read_u32::<LittleEndian>(),
            ByteOrder::Big => self.inner.read_u32::<BigEndian>(),
        }
    }

    fn read_float(&mut self) -> std::io::Result<f32> {
        match self.order {
            ByteOrder::Little => self.inner.read_f32::<LittleEndian>(),
            ByteOrder::Big => self.inner.read_f32::<BigEndian>(),
        }
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        self.inner.read_exact(buf)
    }

    fn skip(&mut self, amount: u64) -> std::io::Result<()> {
        let skipped = std::io::copy(&mut (&mut self.inner).take(amount), &mut std::io::sink())?;

        if skipped == amount {
            Ok(())
        } else {
            Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof))
        }
    }
}

impl<S: Write> BinaryWrite for BinStream<S> {
    fn write_byte(&mut self, byte: u8) -> std::io::Result<()> {
        self.inner.write_u8(byte)
    }

    fn write_word(&mut self, word: u16) -> std::io::Result<()> {
        match self.order {
            ByteOrder::Little => self.inner.write_u16::<LittleEndian>(word),
            ByteOrder::Big => self.inner.write_u16::<BigEndian>(word),
        }
    }

    fn write_dword(&mut self, dword: u32) -> std::io::Result<()> {
        match self.order {
            ByteOrder::Little => self.inner.write_u32::<LittleEndian>(dword),
            ByteOrder::Big => self.inner.write_u32::<BigEndian>(dword),
        }
    }

    fn write_float(&mut self, value: f32) -> std::io::Result<()> {
        match self.order {
            ByteOrder::Little => self.inner.write_f32::<LittleEndian>(value),
            ByteOrder::Big => self.inner.write_f32::<BigEndian>(value),
        }
    }

    fn write_string(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(bytes)
    }
}
