// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    binio::{BinaryRead, BinaryWrite},
    coding::{Decode, DecodeError, Encode, EncodeError},
    FileType, Fingerprint,
};

/// Width of the on-disk file type field
const FILE_TYPE_LEN: u64 = 2;

/// Kind of a record, persisted as a single byte
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RecordKind {
    /// No payload
    Plain,

    /// Song title and author
    SongInfo,

    /// Replay clock speed
    ClockSpeed,
}

impl RecordKind {
    /// All kinds known to this version of the store.
    pub const ALL: [Self; 3] = [Self::Plain, Self::SongInfo, Self::ClockSpeed];
}

impl TryFrom<u8> for RecordKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Plain),
            1 => Ok(Self::SongInfo),
            2 => Ok(Self::ClockSpeed),
            _ => Err(()),
        }
    }
}

impl From<RecordKind> for u8 {
    fn from(value: RecordKind) -> Self {
        match value {
            RecordKind::Plain => 0,
            RecordKind::SongInfo => 1,
            RecordKind::ClockSpeed => 2,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Plain => "plain",
                Self::SongInfo => "song-info",
                Self::ClockSpeed => "clock-speed",
            }
        )
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "plain" => Ok(Self::Plain),
            "1" | "song-info" | "songinfo" | "info" => Ok(Self::SongInfo),
            "2" | "clock-speed" | "clockspeed" | "clock" => Ok(Self::ClockSpeed),
            _ => Err(format!("unknown record kind: {s:?}")),
        }
    }
}

/// Kind-specific part of a record
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// No payload
    Plain,

    /// Song title and author
    ///
    /// Both are raw byte strings without a NUL byte. Files in the wild mostly
    /// use 8-bit code pages, so no particular encoding is assumed.
    SongInfo {
        /// Song title
        title: Vec<u8>,

        /// Song author
        author: Vec<u8>,
    },

    /// Replay clock speed
    ClockSpeed {
        /// Clock in Hz
        clock: f32,
    },
}

impl Payload {
    /// Creates the empty payload of a kind.
    #[must_use]
    pub fn empty(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Plain => Self::Plain,
            RecordKind::SongInfo => Self::SongInfo {
                title: Vec::new(),
                author: Vec::new(),
            },
            RecordKind::ClockSpeed => Self::ClockSpeed { clock: 0.0 },
        }
    }

    /// Returns the kind of this payload.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Plain => RecordKind::Plain,
            Self::SongInfo { .. } => RecordKind::SongInfo,
            Self::ClockSpeed { .. } => RecordKind::ClockSpeed,
        }
    }

    /// Number of payload bytes written to disk.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the payload does not fit the 32-bit size field.
    pub fn encoded_len(&self) -> Result<u32, EncodeError> {
        let len = match self {
            Self::Plain => 0,
            // NOTE: +2 for the terminators
            Self::SongInfo { title, author } => title.len() + author.len() + 2,
            Self::ClockSpeed { .. } => std::mem::size_of::<f32>(),
        };

        u32::try_from(len).map_err(|_| EncodeError::LengthOverflow(len))
    }

    /// Checks that the payload can be written to disk.
    ///
    /// # Errors
    ///
    /// Will return `Err` if a text field contains a NUL byte,
    /// or the payload does not fit the 32-bit size field.
    pub fn validate(&self) -> Result<(), EncodeError> {
        if let Self::SongInfo { title, author } = self {
            check_terminable("title", title)?;
            check_terminable("author", author)?;
        }

        self.encoded_len().map(|_| ())
    }

    fn encode_into<W: BinaryWrite>(&self, writer: &mut W) -> Result<(), EncodeError> {
        match self {
            Self::Plain => {}
            Self::SongInfo { title, author } => {
                write_terminated(writer, "title", title)?;
                write_terminated(writer, "author", author)?;
            }
            Self::ClockSpeed { clock } => {
                writer.write_float(*clock)?;
            }
        }

        Ok(())
    }

    fn decode_from<R: BinaryRead>(kind: RecordKind, reader: &mut R) -> Result<Self, DecodeError> {
        Ok(match kind {
            RecordKind::Plain => Self::Plain,
            RecordKind::SongInfo => {
                let title = reader.read_string(0)?;
                let author = reader.read_string(0)?;
                Self::SongInfo { title, author }
            }
            RecordKind::ClockSpeed => Self::ClockSpeed {
                clock: reader.read_float()?,
            },
        })
    }
}

fn check_terminable(field: &'static str, value: &[u8]) -> Result<(), EncodeError> {
    if value.contains(&0) {
        Err(EncodeError::EmbeddedNul(field))
    } else {
        Ok(())
    }
}

fn write_terminated<W: BinaryWrite>(
    writer: &mut W,
    field: &'static str,
    value: &[u8],
) -> Result<(), EncodeError> {
    check_terminable(field, value)?;

    writer.write_string(value)?;
    writer.write_byte(0)?;

    Ok(())
}

/// A metadata entry, keyed by the fingerprint of the file it describes
///
/// On disk, every record starts with the same header:
///
/// ```text
/// [kind; 1 byte] [payload size; 4 bytes] [crc16; 2 bytes] [crc32; 4 bytes] [file type; 2 bytes] [payload]
/// ```
///
/// The payload size lets readers skip over records of kinds they do not know.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    key: Fingerprint,
    file_type: FileType,
    payload: Payload,
}

impl Record {
    /// Creates a record.
    #[must_use]
    pub fn new(key: Fingerprint, file_type: FileType, payload: Payload) -> Self {
        Self {
            key,
            file_type,
            payload,
        }
    }

    /// Creates an empty record of the given kind.
    #[must_use]
    pub fn with_kind(kind: RecordKind, key: Fingerprint) -> Self {
        Self::new(key, FileType::UNDEFINED, Payload::empty(kind))
    }

    /// Creates an empty record from a raw kind tag.
    ///
    /// Returns `None` if the tag is unknown.
    #[must_use]
    pub fn from_tag(tag: u8, key: Fingerprint) -> Option<Self> {
        RecordKind::try_from(tag)
            .ok()
            .map(|kind| Self::with_kind(kind, key))
    }

    /// Creates a song info record.
    #[must_use]
    pub fn song_info<T: Into<Vec<u8>>, A: Into<Vec<u8>>>(
        key: Fingerprint,
        file_type: FileType,
        title: T,
        author: A,
    ) -> Self {
        Self::new(
            key,
            file_type,
            Payload::SongInfo {
                title: title.into(),
                author: author.into(),
            },
        )
    }

    /// Creates a clock speed record.
    #[must_use]
    pub fn clock_speed(key: Fingerprint, file_type: FileType, clock: f32) -> Self {
        Self::new(key, file_type, Payload::ClockSpeed { clock })
    }

    /// Fingerprint of the described file.
    #[must_use]
    pub fn key(&self) -> Fingerprint {
        self.key
    }

    /// Audio format classification.
    #[must_use]
    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// Sets the audio format classification.
    pub fn set_file_type(&mut self, file_type: FileType) {
        self.file_type = file_type;
    }

    /// Kind of the record.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.payload.kind()
    }

    /// Kind-specific payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Replaces the payload, possibly changing the record kind.
    ///
    /// The key cannot be changed once a record exists, only its data.
    ///
    /// # Errors
    ///
    /// Will return `Err` (leaving the record untouched) if the payload
    /// cannot be written to disk, see [`Payload::validate`].
    pub fn set_payload(&mut self, payload: Payload) -> Result<(), EncodeError> {
        payload.validate()?;
        self.payload = payload;
        Ok(())
    }

    /// Checks that the record can be written to disk.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the payload cannot be written, see [`Payload::validate`].
    pub fn validate(&self) -> Result<(), EncodeError> {
        self.payload.validate()
    }

    /// Reads one record.
    ///
    /// Returns `Ok(None)` if the record kind is unknown;
    /// in that case the record has been skipped using its declared size.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs or the record is malformed.
    pub fn decode_from<R: BinaryRead>(reader: &mut R) -> Result<Option<Self>, DecodeError> {
        let tag = reader.read_byte()?;
        let size = reader.read_dword()?;

        let Ok(kind) = RecordKind::try_from(tag) else {
            log::debug!("Skipping record of unknown kind {tag} ({size} payload bytes)");
            reader.skip(u64::from(size) + Fingerprint::ENCODED_LEN + FILE_TYPE_LEN)?;
            return Ok(None);
        };

        let key = Fingerprint::decode_from(reader)?;
        let file_type = FileType::from_raw(reader.read_word()?);
        let payload = Payload::decode_from(kind, reader)?;

        let consumed = payload
            .encoded_len()
            .map_err(|_| DecodeError::InvalidHeader("RecordSize"))?;

        if consumed > size {
            return Err(DecodeError::InvalidHeader("RecordSize"));
        }

        if consumed < size {
            // Written by a newer version that extended this kind
            log::trace!(
                "Skipping {} trailing payload bytes of {kind} record {key}",
                size - consumed
            );
            reader.skip(u64::from(size - consumed))?;
        }

        Ok(Some(Self::new(key, file_type, payload)))
    }
}

impl Encode for Record {
    fn encode_into<W: BinaryWrite>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_byte(self.kind().into())?;
        writer.write_dword(self.payload.encoded_len()?)?;
        self.key.encode_into(writer)?;
        writer.write_word(self.file_type.into_raw())?;
        self.payload.encode_into(writer)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::binio::{BinStream, ByteOrder};
    use std::io::Cursor;
    use test_log::test;

    const KEY: Fingerprint = Fingerprint::new(0x1234, 0xDEAD_BEEF);

    fn decode(bytes: Vec<u8>, order: ByteOrder) -> Result<Option<Record>, DecodeError> {
        Record::decode_from(&mut BinStream::new(Cursor::new(bytes), order))
    }

    #[test]
    fn record_kind_tags() {
        for kind in RecordKind::ALL {
            assert_eq!(Ok(kind), RecordKind::try_from(u8::from(kind)));
        }
        assert_eq!(Err(()), RecordKind::try_from(3));
        assert_eq!(Err(()), RecordKind::try_from(255));
    }

    #[test]
    fn record_from_tag() {
        let record = Record::from_tag(1, KEY).unwrap();
        assert_eq!(RecordKind::SongInfo, record.kind());
        assert_eq!(KEY, record.key());
        assert!(record.file_type().is_undefined());

        assert!(Record::from_tag(7, KEY).is_none());
    }

    #[test]
    fn record_song_info_layout() -> crate::Result<()> {
        let record = Record::song_info(KEY, FileType::from_raw(5), "ab", "c");
        let bytes = record.encode_into_vec(ByteOrder::Big)?;

        #[rustfmt::skip]
        let expected = vec![
            1,
            0, 0, 0, 5,
            0x12, 0x34,
            0xDE, 0xAD, 0xBE, 0xEF,
            0, 5,
            b'a', b'b', 0,
            b'c', 0,
        ];
        assert_eq!(expected, bytes);

        assert_eq!(Some(record), decode(bytes, ByteOrder::Big)?);

        Ok(())
    }

    #[test]
    fn record_clock_speed_layout() -> crate::Result<()> {
        let record = Record::clock_speed(KEY, FileType::UNDEFINED, 1.0);
        let bytes = record.encode_into_vec(ByteOrder::Little)?;

        #[rustfmt::skip]
        let expected = vec![
            2,
            4, 0, 0, 0,
            0x34, 0x12,
            0xEF, 0xBE, 0xAD, 0xDE,
            0, 0,
            0x00, 0x00, 0x80, 0x3F,
        ];
        assert_eq!(expected, bytes);

        assert_eq!(Some(record), decode(bytes, ByteOrder::Little)?);

        Ok(())
    }

    #[test]
    fn record_plain_has_no_payload() -> crate::Result<()> {
        let record = Record::with_kind(RecordKind::Plain, KEY);
        assert_eq!(0, record.payload().encoded_len()?);

        let bytes = record.encode_into_vec(ByteOrder::Big)?;
        assert_eq!(13, bytes.len());
        assert_eq!(Some(record), decode(bytes, ByteOrder::Big)?);

        Ok(())
    }

    #[test]
    fn record_declared_size_matches_payload() -> crate::Result<()> {
        let records = [
            Record::with_kind(RecordKind::Plain, KEY),
            Record::song_info(KEY, FileType::UNDEFINED, "", ""),
            Record::song_info(KEY, FileType::UNDEFINED, "Sample", "Tester"),
            Record::song_info(KEY, FileType::UNDEFINED, "é".repeat(300), "x"),
            Record::clock_speed(KEY, FileType::UNDEFINED, 1_193_180.0),
        ];

        for record in records {
            let bytes = record.encode_into_vec(ByteOrder::Little)?;
            let declared = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
            assert_eq!(bytes.len() - 13, declared as usize);
        }

        Ok(())
    }

    #[test]
    fn record_unknown_kind_is_skipped() -> crate::Result<()> {
        #[rustfmt::skip]
        let mut bytes = vec![
            9,
            0, 0, 0, 3,
            0xAA, 0xAA,
            0xBB, 0xBB, 0xBB, 0xBB,
            0, 1,
            b'x', b'y', b'z',
        ];
        let next = Record::song_info(KEY, FileType::UNDEFINED, "Sample", "Tester");
        bytes.extend(next.encode_into_vec(ByteOrder::Big)?);

        let mut reader = BinStream::new(Cursor::new(bytes), ByteOrder::Big);
        assert_eq!(None, Record::decode_from(&mut reader)?);
        assert_eq!(Some(next), Record::decode_from(&mut reader)?);
        assert!(reader.read_byte().is_err());

        Ok(())
    }

    #[test]
    fn record_known_kind_with_trailing_bytes() -> crate::Result<()> {
        #[rustfmt::skip]
        let bytes = vec![
            0,
            0, 0, 0, 2,
            0x12, 0x34,
            0xDE, 0xAD, 0xBE, 0xEF,
            0, 0,
            0xFF, 0xFF,
            2,
        ];

        let mut reader = BinStream::new(Cursor::new(bytes), ByteOrder::Big);
        assert_eq!(
            Some(Record::with_kind(RecordKind::Plain, KEY)),
            Record::decode_from(&mut reader)?,
        );
        assert_eq!(2, reader.read_byte()?);

        Ok(())
    }

    #[test]
    fn record_payload_overrunning_declared_size() {
        #[rustfmt::skip]
        let bytes = vec![
            1,
            0, 0, 0, 1,
            0x12, 0x34,
            0xDE, 0xAD, 0xBE, 0xEF,
            0, 0,
            b'a', 0,
            b'b', 0,
        ];

        assert!(matches!(
            decode(bytes, ByteOrder::Big),
            Err(DecodeError::InvalidHeader("RecordSize")),
        ));
    }

    #[test]
    fn record_truncated() {
        let record = Record::song_info(KEY, FileType::UNDEFINED, "Sample", "Tester");
        let mut bytes = record.encode_into_vec(ByteOrder::Big).unwrap();
        bytes.truncate(bytes.len() - 1);

        assert!(matches!(
            decode(bytes, ByteOrder::Big),
            Err(DecodeError::Io(_)),
        ));
    }

    #[test]
    fn record_non_utf8_text_roundtrip() -> crate::Result<()> {
        #[rustfmt::skip]
        let bytes = vec![
            1,
            0, 0, 0, 7,
            0x12, 0x34,
            0xDE, 0xAD, 0xBE, 0xEF,
            0, 0,
            b'C', b'a', b'f', 0xE9, 0,
            b'X', 0,
        ];

        let record = decode(bytes.clone(), ByteOrder::Big)?.unwrap();
        assert_eq!(
            &Payload::SongInfo {
                title: b"Caf\xE9".to_vec(),
                author: b"X".to_vec(),
            },
            record.payload(),
        );
        assert_eq!(bytes, record.encode_into_vec(ByteOrder::Big)?);

        Ok(())
    }

    #[test]
    fn record_embedded_nul_is_rejected() {
        let record = Record::song_info(KEY, FileType::UNDEFINED, "a\0b", "c");
        assert!(matches!(
            record.validate(),
            Err(EncodeError::EmbeddedNul("title")),
        ));
        assert!(matches!(
            record.encode_into_vec(ByteOrder::Big),
            Err(EncodeError::EmbeddedNul("title")),
        ));

        let record = Record::song_info(KEY, FileType::UNDEFINED, "a", "\0");
        assert!(matches!(
            record.validate(),
            Err(EncodeError::EmbeddedNul("author")),
        ));

        assert!(Record::song_info(KEY, FileType::UNDEFINED, "a", "b").validate().is_ok());
        assert!(Record::with_kind(RecordKind::Plain, KEY).validate().is_ok());
    }

    #[test]
    fn record_set_payload() {
        let mut record = Record::with_kind(RecordKind::Plain, KEY);

        record
            .set_payload(Payload::ClockSpeed { clock: 50.0 })
            .unwrap();
        assert_eq!(RecordKind::ClockSpeed, record.kind());

        let bad = Payload::SongInfo {
            title: b"x".to_vec(),
            author: b"y\0".to_vec(),
        };
        assert!(matches!(
            record.set_payload(bad),
            Err(EncodeError::EmbeddedNul("author")),
        ));
        assert_eq!(&Payload::ClockSpeed { clock: 50.0 }, record.payload());
    }

    #[test]
    fn record_kind_parse() {
        assert_eq!(Ok(RecordKind::SongInfo), "1".parse());
        assert_eq!(Ok(RecordKind::ClockSpeed), "Clock-Speed".parse());
        assert_eq!(Ok(RecordKind::Plain), " plain ".parse());
        assert!("3".parse::<RecordKind>().is_err());
    }
}
