//! Character-to-code table for double-array transitions.
//!
//! Instead of a 65536-entry table, the alphabet is described by two masks:
//! bits that are set in every observed code unit and bits that are clear in
//! every observed code unit. A unit is in the alphabet iff it agrees with both
//! masks, and its code is its remaining variable bits plus `CODE_OFFSET`.
//! Code 0 is never produced (it would not move the state) and code 1 belongs
//! to the end-of-key sentinel.
use serde::{Deserialize, Serialize};

/// End-of-key marker appended to every key.
pub const SENTINEL: u16 = 0;

/// Code reserved for [`SENTINEL`].
pub const TERMINATE_CODE: u32 = 1;

const CODE_OFFSET: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTable {
    always_one: u16,
    always_zero: u16,
}

impl CodeTable {
    pub fn from_masks(always_one: u16, always_zero: u16) -> Self {
        CodeTable {
            always_one,
            always_zero,
        }
    }

    pub fn always_one(&self) -> u16 {
        self.always_one
    }

    pub fn always_zero(&self) -> u16 {
        self.always_zero
    }

    /// Code for `unit`, or `None` when it lies outside the observed alphabet.
    #[inline]
    pub fn get(&self, unit: u16) -> Option<u32> {
        if unit == SENTINEL {
            return Some(TERMINATE_CODE);
        }
        if unit & self.always_one != self.always_one || unit & self.always_zero != 0 {
            return None;
        }
        Some((unit & self.variable_bits()) as u32 + CODE_OFFSET)
    }

    /// Same as [`get`](Self::get) with the integer contract: -1 for invalid.
    pub fn code(&self, unit: u16) -> i32 {
        self.get(unit).map_or(-1, |c| c as i32)
    }

    /// Largest code any in-alphabet unit can receive.
    pub fn max_code(&self) -> u32 {
        self.variable_bits() as u32 + CODE_OFFSET
    }

    #[inline]
    fn variable_bits(&self) -> u16 {
        !self.always_one & !self.always_zero
    }
}

/// Accumulates the alphabet masks over every key before the build.
#[derive(Debug, Clone)]
pub struct CodeTableBuilder {
    always_one: u16,
    always_zero: u16,
}

impl Default for CodeTableBuilder {
    fn default() -> Self {
        CodeTableBuilder {
            always_one: u16::MAX,
            always_zero: u16::MAX,
        }
    }
}

impl CodeTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str) {
        for unit in key.encode_utf16() {
            self.always_one &= unit;
            self.always_zero &= !unit;
        }
    }

    pub fn build(&self) -> CodeTable {
        CodeTable::from_masks(self.always_one, self.always_zero)
    }
}
