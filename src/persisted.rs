use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::LayoutKey;
use crate::arena::NodeArena;
use crate::key::{KeyMap, KeySet};

/// Child positions that must be emitted per container because a persisted key lives below
/// them.
#[derive(Clone, Debug, Default)]
pub(crate) struct PersistedIndices {
    roots: Vec<usize>,
    by_parent: KeyMap<usize, Vec<usize>>,
}

impl PersistedIndices {
    /// Walks every persisted key up its parent chain, recording the child position to keep at
    /// each ancestor. `seed(parent)` pre-populates a container's entry the first time it is
    /// touched (tables seed rows with their sticky cells).
    pub(crate) fn build<K: LayoutKey>(
        arena: &NodeArena<K>,
        keys: &KeySet<K>,
        seed: &dyn Fn(usize) -> Vec<usize>,
    ) -> Self {
        let mut out = Self::default();
        for key in keys {
            let Some(mut cur) = arena.index_of(key) else {
                continue;
            };
            loop {
                let node = arena.node(cur);
                match node.parent {
                    Some(p) => {
                        out.by_parent
                            .entry(p)
                            .or_insert_with(|| seed(p))
                            .push(node.position);
                        cur = p;
                    }
                    None => {
                        out.roots.push(node.position);
                        break;
                    }
                }
            }
        }
        out.roots.sort_unstable();
        out.roots.dedup();
        for positions in out.by_parent.values_mut() {
            positions.sort_unstable();
            positions.dedup();
        }
        out
    }

    pub(crate) fn positions(&self, parent: Option<usize>) -> Option<&[usize]> {
        match parent {
            Some(p) => self.by_parent.get(&p).map(Vec::as_slice),
            None => (!self.roots.is_empty()).then_some(self.roots.as_slice()),
        }
    }
}

/// The persisted-key set last handed to a layout and its derived index table.
#[derive(Clone, Debug)]
pub(crate) struct PersistedState<K: LayoutKey> {
    keys: Option<Arc<KeySet<K>>>,
    indices: PersistedIndices,
}

impl<K: LayoutKey> Default for PersistedState<K> {
    fn default() -> Self {
        Self {
            keys: None,
            indices: PersistedIndices::default(),
        }
    }
}

impl<K: LayoutKey> PersistedState<K> {
    /// Stores a new key set. The table is only rebuilt when the set's identity changed.
    pub(crate) fn set_keys(
        &mut self,
        keys: Option<Arc<KeySet<K>>>,
        arena: &NodeArena<K>,
        seed: &dyn Fn(usize) -> Vec<usize>,
    ) {
        let unchanged = match (&self.keys, &keys) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }
        self.keys = keys;
        self.rebuild(arena, seed);
    }

    /// Recomputes positions against a freshly built arena.
    pub(crate) fn rebuild(&mut self, arena: &NodeArena<K>, seed: &dyn Fn(usize) -> Vec<usize>) {
        self.indices = match &self.keys {
            Some(keys) if !keys.is_empty() => PersistedIndices::build(arena, keys, seed),
            _ => PersistedIndices::default(),
        };
        vtrace!(
            keys = self.keys.as_ref().map_or(0, |k| k.len()),
            "persisted indices rebuilt"
        );
    }

    pub(crate) fn positions(&self, parent: Option<usize>) -> Option<&[usize]> {
        self.indices.positions(parent)
    }
}
