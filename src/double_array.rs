//! Read-only double-array automaton mapping keys to value indices.
//!
//! O(1) per code unit: transition t = base[s] + code, valid if check[t] == s.
//! Terminal states (reached through the end-of-key sentinel) store the
//! negated value index in `base`.
use serde::{Deserialize, Serialize};

use crate::codes::{CodeTable, SENTINEL, TERMINATE_CODE};
use crate::error::{FormatError, FormatResult};
use crate::frozen;

/// Start state. Slot 0 is reserved and never a valid state.
pub const ROOT_STATE: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDoubleArray")]
pub struct DoubleArray {
    base: Vec<i32>,
    check: Vec<i32>,
    codes: CodeTable,
}

/// Unchecked serde form, validated on the way in.
#[derive(Deserialize)]
struct RawDoubleArray {
    base: Vec<i32>,
    check: Vec<i32>,
    codes: CodeTable,
}

impl TryFrom<RawDoubleArray> for DoubleArray {
    type Error = FormatError;

    fn try_from(raw: RawDoubleArray) -> FormatResult<Self> {
        // serialized arrays are always written at equal length
        if raw.base.len() != raw.check.len() {
            return Err(FormatError::Corrupt(format!(
                "base has {} slots, check has {}",
                raw.base.len(),
                raw.check.len()
            )));
        }
        DoubleArray::from_parts(raw.base, raw.check, raw.codes)
    }
}

impl DoubleArray {
    /// Pairs raw arrays with their code table. The shorter array is zero-padded
    /// so both have the same length.
    pub fn from_parts(
        mut base: Vec<i32>,
        mut check: Vec<i32>,
        codes: CodeTable,
    ) -> FormatResult<Self> {
        let len = base.len().max(check.len());
        base.resize(len, 0);
        check.resize(len, 0);
        if len <= ROOT_STATE {
            return Err(FormatError::Corrupt(format!(
                "double array needs at least {} slots, got {}",
                ROOT_STATE + 1,
                len
            )));
        }
        if check[ROOT_STATE] != ROOT_STATE as i32 {
            return Err(FormatError::Corrupt(format!(
                "start state check is {}, expected {}",
                check[ROOT_STATE], ROOT_STATE
            )));
        }
        Ok(DoubleArray { base, check, codes })
    }

    pub(crate) fn from_raw(base: Vec<i32>, check: Vec<i32>, codes: CodeTable) -> Self {
        debug_assert_eq!(base.len(), check.len());
        DoubleArray { base, check, codes }
    }

    /// Next state from `state` on `unit`, if that transition exists.
    #[inline(always)]
    pub fn transit(&self, state: usize, unit: u16) -> Option<usize> {
        if unlikely(state < ROOT_STATE) {
            return None;
        }
        let code = self.codes.get(unit)?;
        let base = *self.base.get(state)?;
        let next = usize::try_from(base.checked_add(code as i32)?).ok()?;
        if unlikely(next >= self.check.len()) {
            return None;
        }
        if self.check[next] != state as i32 {
            return None;
        }
        Some(next)
    }

    /// Value index stored for `key`.
    pub fn find(&self, key: &str) -> Option<usize> {
        let mut state = ROOT_STATE;
        for unit in key.encode_utf16() {
            state = self.transit(state, unit)?;
        }
        state = self.transit(state, SENTINEL)?;
        let goal = self.base[state];
        if goal <= 0 {
            Some(goal.unsigned_abs() as usize)
        } else {
            None
        }
    }

    /// [`find`](Self::find) with -1 for an absent key.
    pub fn find_raw(&self, key: &str) -> i32 {
        self.find(key).map_or(-1, |i| i as i32)
    }

    /// Largest value index stored in a terminal state, `None` if no key is
    /// stored.
    pub fn max_value_index(&self) -> Option<usize> {
        (ROOT_STATE..self.check.len())
            .filter_map(|state| {
                let parent = usize::try_from(self.check[state]).ok().filter(|&p| p != 0)?;
                let parent_base = *self.base.get(parent)?;
                // terminal states are the sentinel children
                if parent_base.checked_add(TERMINATE_CODE as i32)? != state as i32 {
                    return None;
                }
                let goal = self.base[state];
                (goal <= 0).then(|| goal.unsigned_abs() as usize)
            })
            .max()
    }

    pub fn base(&self) -> &[i32] {
        &self.base
    }

    pub fn check(&self) -> &[i32] {
        &self.check
    }

    pub fn codes(&self) -> &CodeTable {
        &self.codes
    }

    /// Slot count, including the reserved slot 0.
    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    pub fn used_slots(&self) -> usize {
        self.check.iter().filter(|&&c| c != 0).count()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(frozen::ARRAY_HEADER + self.len() * 8);
        frozen::write_array(&mut out, self);
        out
    }

    pub fn from_bytes(data: &[u8]) -> FormatResult<Self> {
        let mut reader = frozen::Reader::new(data);
        let array = frozen::read_array(&mut reader)?;
        reader.finish()?;
        Ok(array)
    }
}

#[cold]
#[inline(never)]
fn unlikely(b: bool) -> bool {
    b
}
