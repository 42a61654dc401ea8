// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::binio::{BinStream, BinaryRead, BinaryWrite, ByteOrder};

/// Error during serialization
#[derive(Debug)]
pub enum EncodeError {
    /// I/O error
    Io(std::io::Error),

    /// A length does not fit into its 32-bit wire field
    LengthOverflow(usize),

    /// A NUL-terminated field contains a NUL byte
    EmbeddedNul(&'static str),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "EncodeError(Io: {e})"),
            Self::LengthOverflow(len) => write!(f, "EncodeError(LengthOverflow: {len})"),
            Self::EmbeddedNul(field) => write!(f, "EncodeError(EmbeddedNul: {field})"),
        }
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::LengthOverflow(_) | Self::EmbeddedNul(_) => None,
        }
    }
}

/// Error during deserialization
#[derive(Debug)]
pub enum DecodeError {
    /// I/O error
    Io(std::io::Error),

    /// Invalid file header
    InvalidHeader(&'static str),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DecodeError({})",
            match self {
                Self::Io(e) => e.to_string(),
                e => format!("{e:?}"),
            }
        )
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::InvalidHeader(_) => None,
        }
    }
}

/// Trait to serialize stuff
pub trait Encode {
    /// Serializes into writer.
    fn encode_into<W: BinaryWrite>(&self, writer: &mut W) -> Result<(), EncodeError>;

    /// Serializes into vector, using the given byte order.
    #[allow(unused)]
    fn encode_into_vec(&self, order: ByteOrder) -> Result<Vec<u8>, EncodeError> {
        let mut stream = BinStream::new(vec![], order);
        self.encode_into(&mut stream)?;
        Ok(stream.into_inner())
    }
}

/// Trait to deserialize stuff
pub trait Decode {
    /// Deserializes from reader.
    fn decode_from<R: BinaryRead>(reader: &mut R) -> Result<Self, DecodeError>
    where
        Self: Sized;
}
