use alloc::vec::Vec;

use crate::key::KeyMap;
use crate::{LayoutInfo, LayoutKey, Rect};

/// A laid-out node: its geometry plus links into the arena.
#[derive(Clone, Debug)]
pub(crate) struct LayoutNode<K> {
    pub(crate) info: LayoutInfo<K>,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    /// Position among the parent's children (or among the roots).
    pub(crate) position: usize,
}

/// Dense storage for one layout pass.
///
/// Nodes are pushed in document (pre-)order, so arena order doubles as collection order.
#[derive(Clone, Debug)]
pub(crate) struct NodeArena<K: LayoutKey> {
    nodes: Vec<LayoutNode<K>>,
    by_key: KeyMap<K, usize>,
    roots: Vec<usize>,
}

impl<K: LayoutKey> Default for NodeArena<K> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            by_key: KeyMap::default(),
            roots: Vec::new(),
        }
    }
}

impl<K: LayoutKey> NodeArena<K> {
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.by_key.clear();
        self.roots.clear();
    }

    /// Adds a node under `parent`. The first node pushed for a key owns the key lookup (skeleton
    /// clones share their source key).
    pub(crate) fn push(&mut self, parent: Option<usize>, mut info: LayoutInfo<K>) -> usize {
        let idx = self.nodes.len();
        info.parent_key = parent.map(|p| self.nodes[p].info.key.clone());
        let position = match parent {
            Some(p) => {
                let siblings = &mut self.nodes[p].children;
                siblings.push(idx);
                siblings.len() - 1
            }
            None => {
                self.roots.push(idx);
                self.roots.len() - 1
            }
        };
        self.by_key.entry(info.key.clone()).or_insert(idx);
        self.nodes.push(LayoutNode {
            info,
            parent,
            children: Vec::new(),
            position,
        });
        idx
    }

    pub(crate) fn node(&self, idx: usize) -> &LayoutNode<K> {
        &self.nodes[idx]
    }

    pub(crate) fn node_mut(&mut self, idx: usize) -> &mut LayoutNode<K> {
        &mut self.nodes[idx]
    }

    pub(crate) fn info(&self, idx: usize) -> &LayoutInfo<K> {
        &self.nodes[idx].info
    }

    pub(crate) fn rect(&self, idx: usize) -> Rect {
        self.nodes[idx].info.rect
    }

    pub(crate) fn index_of(&self, key: &K) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    pub(crate) fn info_for(&self, key: &K) -> Option<&LayoutInfo<K>> {
        self.index_of(key).map(|i| &self.nodes[i].info)
    }

    pub(crate) fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Children of `parent`, or the roots for `None`.
    pub(crate) fn children_of(&self, parent: Option<usize>) -> &[usize] {
        match parent {
            Some(p) => &self.nodes[p].children,
            None => &self.roots,
        }
    }

    /// Moves a node and all of its descendants.
    pub(crate) fn offset_subtree(&mut self, idx: usize, dx: f64, dy: f64) {
        let mut stack = alloc::vec![idx];
        while let Some(i) = stack.pop() {
            let node = &mut self.nodes[i];
            node.info.rect.x += dx;
            node.info.rect.y += dy;
            stack.extend_from_slice(&node.children);
        }
    }

    /// Changes the height of a node stacked vertically inside its parent and reflows what
    /// follows: later siblings shift, every ancestor grows, and so on up to the root.
    ///
    /// Returns the height delta seen at the root level.
    pub(crate) fn resize_height(&mut self, idx: usize, height: f64) -> f64 {
        let delta = height - self.nodes[idx].info.rect.height;
        if delta == 0.0 {
            return 0.0;
        }
        self.nodes[idx].info.rect.height = height;
        let mut cur = idx;
        loop {
            let parent = self.nodes[cur].parent;
            let position = self.nodes[cur].position;
            let following: Vec<usize> = self.children_of(parent)[position + 1..].to_vec();
            for s in following {
                self.offset_subtree(s, 0.0, delta);
            }
            match parent {
                Some(p) => {
                    self.nodes[p].info.rect.height += delta;
                    cur = p;
                }
                None => break,
            }
        }
        delta
    }

    /// Keys of the nodes matching `pred` between `from` and `to` (inclusive), in document order.
    pub(crate) fn keys_between(
        &self,
        from: &K,
        to: &K,
        pred: impl Fn(&LayoutInfo<K>) -> bool,
    ) -> Vec<K> {
        let (Some(a), Some(b)) = (self.index_of(from), self.index_of(to)) else {
            return Vec::new();
        };
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        self.nodes[start..=end]
            .iter()
            .filter(|n| pred(&n.info))
            .map(|n| n.info.key.clone())
            .collect()
    }
}
