//! Lays a [`Trie`] out as a double array.
//!
//! Nodes are visited in pre-order. Each node with children gets the smallest
//! base (at or above its current one) whose child slots `base + code` are all
//! free, then each child is assigned its slot and `check[slot]` is set to the
//! parent. Terminal leaves store the negated value index in `base`.
//!
//! If a child slot turns out to be taken at assignment time the parent is
//! relocated: a fresh base is found, every already-placed child is moved along
//! with its `base`, and every `check` entry pointing at a moved slot is
//! re-pointed before the old slot is cleared.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use unicode_normalization::{is_nfc, UnicodeNormalization};

use crate::codes::CodeTable;
use crate::double_array::{DoubleArray, ROOT_STATE};
use crate::error::{BuildError, BuildResult};
use crate::slots::Slots;
use crate::trie::{Node, NodeId, Trie};

/// Default cap on candidate bases tried for a single state.
pub const DEFAULT_MAX_PROBE: usize = 1 << 24;

const SLOW_PROBE_THRESHOLD: usize = 1 << 16;

/// Key normalisation applied on insertion and on every query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Normalization {
    #[default]
    None,
    /// Unicode canonical composition.
    Nfc,
}

impl Normalization {
    pub fn apply<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match self {
            Normalization::None => Cow::Borrowed(key),
            Normalization::Nfc if is_nfc(key) => Cow::Borrowed(key),
            Normalization::Nfc => Cow::Owned(key.nfc().collect()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Candidate bases tried per state before the build fails.
    pub max_probe: usize,
    pub normalization: Normalization,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            max_probe: DEFAULT_MAX_PROBE,
            normalization: Normalization::None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub keys: usize,
    pub trie_nodes: usize,
    pub slots: usize,
    pub used_slots: usize,
    pub relocations: usize,
}

/// Builds the double array for `trie` in one pass.
pub fn build_double_array(
    trie: &Trie,
    codes: CodeTable,
    max_probe: usize,
) -> BuildResult<(DoubleArray, BuildStats)> {
    let mut builder = ArrayBuilder::new(trie, codes, max_probe);
    builder.place_all()?;
    Ok(builder.finish())
}

pub(crate) struct ArrayBuilder<'t> {
    trie: &'t Trie,
    codes: CodeTable,
    base: Slots,
    check: Slots,
    /// State assigned to each trie node, indexed by `NodeId`; 0 = unassigned.
    states: Vec<usize>,
    /// Lowest slot with `check == 0`, slot 0 excluded.
    first_free: usize,
    max_probe: usize,
    relocations: usize,
}

impl<'t> ArrayBuilder<'t> {
    pub fn new(trie: &'t Trie, codes: CodeTable, max_probe: usize) -> Self {
        let mut states = vec![0; trie.node_count()];
        states[NodeId::ROOT.index()] = ROOT_STATE;
        ArrayBuilder {
            trie,
            codes,
            // the root starts at base 1 and marks its own slot as used
            base: Slots::from_vec(vec![0, 1]),
            check: Slots::from_vec(vec![0, ROOT_STATE as i32]),
            states,
            first_free: 2,
            max_probe,
            relocations: 0,
        }
    }

    pub fn place_all(&mut self) -> BuildResult<()> {
        let trie = self.trie;
        for (id, node) in trie.preorder() {
            let state = self.states[id.index()];
            debug_assert_ne!(state, 0, "pre-order visits parents first");

            if let Some(index) = node.terminal() {
                let index = i32::try_from(index)
                    .map_err(|_| BuildError::CapacityExceeded { slot: state })?;
                self.base.set(state, -index);
                continue;
            }
            if node.children().is_empty() {
                // only the root of an empty trie
                continue;
            }
            self.place_children(state, node)?;
        }
        Ok(())
    }

    pub fn finish(self) -> (DoubleArray, BuildStats) {
        let len = self.base.len().max(self.check.len());
        let base = self.base.into_vec(len);
        let check = self.check.into_vec(len);
        let stats = BuildStats {
            keys: self.trie.len(),
            trie_nodes: self.trie.node_count(),
            slots: len,
            used_slots: check.iter().filter(|&&c| c != 0).count(),
            relocations: self.relocations,
        };
        debug!(
            keys = stats.keys,
            trie_nodes = stats.trie_nodes,
            slots = stats.slots,
            used_slots = stats.used_slots,
            relocations = stats.relocations,
            max_code = self.codes.max_code(),
            "double array built"
        );
        (DoubleArray::from_raw(base, check, self.codes), stats)
    }

    fn place_children(&mut self, state: usize, node: &Node) -> BuildResult<()> {
        let children = self.child_codes(state, node)?;
        let start = self.base.get(state).max(0) as usize;
        let base = self.find_base(state, &children, start)?;
        self.base.set(state, base as i32);

        for &(child, code) in &children {
            let next = base + code;
            if self.check.get(next) != 0 {
                return self.relocate(state, &children);
            }
            self.states[child.index()] = next;
            self.occupy(next, state);
        }
        Ok(())
    }

    fn child_codes(&self, state: usize, node: &Node) -> BuildResult<Vec<(NodeId, usize)>> {
        node.children()
            .iter()
            .map(|&(unit, child)| match self.codes.get(unit) {
                Some(code) if code > 0 => Ok((child, code as usize)),
                _ => Err(BuildError::InvalidCode { unit, state }),
            })
            .collect()
    }

    /// Smallest base `>= start` whose child slots are all free.
    fn find_base(
        &self,
        state: usize,
        children: &[(NodeId, usize)],
        start: usize,
    ) -> BuildResult<usize> {
        let min_code = children.iter().map(|&(_, c)| c).min().unwrap_or(1);
        let max_code = children.iter().map(|&(_, c)| c).max().unwrap_or(1);
        // every slot below first_free is taken, so base + min_code cannot be
        let mut base = start.max(self.first_free.saturating_sub(min_code));
        let mut probes = 0usize;

        'outer: loop {
            if probes > self.max_probe {
                return Err(BuildError::ProbeLimitExceeded { state, probes });
            }
            for &(_, code) in children {
                if self.check.get(base + code) != 0 {
                    base += 1;
                    probes += 1;
                    continue 'outer;
                }
            }
            break;
        }

        if base + max_code > i32::MAX as usize {
            return Err(BuildError::CapacityExceeded {
                slot: base + max_code,
            });
        }
        if probes >= SLOW_PROBE_THRESHOLD {
            warn!(state, probes, base, "slow base search");
        }
        Ok(base)
    }

    /// Moves the children of `state` to a new base.
    pub(crate) fn relocate(
        &mut self,
        state: usize,
        children: &[(NodeId, usize)],
    ) -> BuildResult<()> {
        let trie = self.trie;
        let old_base = self.base.get(state).max(0) as usize;
        let new_base = self.find_base(state, children, old_base)?;

        for &(child, code) in children {
            let old = old_base + code;
            let new = new_base + code;
            let owned =
                self.states[child.index()] == old && self.check.get(old) == state as i32;

            self.states[child.index()] = new;
            self.occupy(new, state);
            if !owned {
                continue;
            }

            self.base.set(new, self.base.get(old));
            // grandchildren already placed still name the old slot as parent
            for &(_, grandchild) in trie.node(child).children() {
                let slot = self.states[grandchild.index()];
                if slot != 0 && self.check.get(slot) == old as i32 {
                    self.check.set(slot, new as i32);
                }
            }
            self.base.set(old, 0);
            self.release(old);
        }

        self.base.set(state, new_base as i32);
        self.relocations += 1;
        trace!(state, old_base, new_base, "relocated children");
        Ok(())
    }

    fn occupy(&mut self, slot: usize, parent: usize) {
        self.check.set(slot, parent as i32);
        while self.check.get(self.first_free) != 0 {
            self.first_free += 1;
        }
    }

    fn release(&mut self, slot: usize) {
        self.check.set(slot, 0);
        self.first_free = self.first_free.min(slot);
    }
}
