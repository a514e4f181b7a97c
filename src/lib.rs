//! Compact, read-only string dictionaries backed by a double-array trie.
//!
//! Keys are staged in a [`DictionaryBuilder`], sorted once, and laid out as a
//! pair of `base`/`check` arrays plus a two-mask code table. Lookup walks one
//! array transition per UTF-16 code unit. The finished [`Dictionary`] is
//! immutable and can be written to and read back from a versioned
//! little-endian blob.
//!
//! ```
//! use frozendict::DictionaryBuilder;
//!
//! let mut builder = DictionaryBuilder::new();
//! builder.add("cat", 1);
//! builder.add("car", 2);
//! let dict = builder.build().unwrap();
//! assert_eq!(dict.get("car"), Some(&2));
//! assert!(!dict.contains("ca"));
//! ```

pub mod builder;
pub mod codes;
pub mod dict;
pub mod double_array;
pub mod error;
pub mod frozen;
mod slots;
pub mod trie;

pub use builder::{BuildOptions, BuildStats, Normalization, DEFAULT_MAX_PROBE};
pub use codes::{CodeTable, CodeTableBuilder};
pub use dict::{Dictionary, DictionaryBuilder};
pub use double_array::DoubleArray;
pub use error::{BuildError, FormatError, LookupError};
