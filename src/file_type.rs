// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Classification of the audio format a record describes
///
/// The set of formats is defined by the player using the store,
/// so unknown values are carried through verbatim.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct FileType(u16);

impl FileType {
    /// No classification
    pub const UNDEFINED: Self = Self(0);

    /// Wraps a raw classification value.
    #[must_use]
    pub const fn from_raw(value: u16) -> Self {
        Self(value)
    }

    /// Returns the raw 16-bit value.
    #[must_use]
    pub const fn into_raw(self) -> u16 {
        self.0
    }

    /// Returns `true` if no classification is set.
    #[must_use]
    pub const fn is_undefined(self) -> bool {
        self.0 == Self::UNDEFINED.0
    }
}

impl From<u16> for FileType {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<FileType> for u16 {
    fn from(value: FileType) -> Self {
        value.0
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_undefined() {
            write!(f, "undefined")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
