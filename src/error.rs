//! Error types for building, querying and decoding frozen dictionaries.

use thiserror::Error;

/// Errors that abort a dictionary build. Construction is all-or-nothing.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A key contains U+0000, which is reserved as the end-of-key sentinel.
    #[error("key {key:?} contains U+0000, which is reserved as the end-of-key marker")]
    SentinelInKey { key: String },

    /// A real child transition resolved to a code that is not strictly positive.
    #[error("code unit {unit:#06x} under state {state} has no usable code")]
    InvalidCode { unit: u16, state: usize },

    /// Base search gave up after trying `probes` candidates.
    #[error("no free base found for state {state} after {probes} probes")]
    ProbeLimitExceeded { state: usize, probes: usize },

    /// A slot index no longer fits the i32 base/check encoding.
    #[error("slot {slot} exceeds the addressable range of the double array")]
    CapacityExceeded { slot: usize },
}

/// Errors from indexed access into a [`Dictionary`](crate::Dictionary).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("key not found")]
    KeyNotFound,

    /// The automaton resolved an index past the end of the value array, which
    /// means the automaton and values were paired from different builds.
    #[error("resolved index {index} is out of bounds for {len} values")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// Errors while decoding a frozen blob.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    #[error("blob truncated: need {needed} bytes at offset {offset}, have {len}")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("corrupt blob: {0}")]
    Corrupt(String),

    #[error("value payload: {0}")]
    Values(#[from] serde_json::Error),
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
pub type FormatResult<T> = std::result::Result<T, FormatError>;
