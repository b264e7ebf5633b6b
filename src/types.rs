use crate::Rect;

/// Opaque reference to caller-side content, passed through untouched.
pub type ContentId = u64;

/// Kind of a collection node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeType {
    Item,
    Header,
    HeaderRow,
    RowGroup,
    Section,
    Column,
    Cell,
    Placeholder,
    Skeleton,
    Loader,
}

/// Computed geometry and metadata for one collection node.
///
/// Layouts hand these out as snapshots: a changed dimension produces a new value, it is never
/// patched in place behind a caller's back.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayoutInfo<K> {
    pub key: K,
    pub node_type: NodeType,
    /// Rect in content coordinates.
    pub rect: Rect,
    pub parent_key: Option<K>,
    pub z_index: i32,
    pub is_sticky: bool,
    /// `true` until a real measurement replaced the estimated size.
    pub estimated_size: bool,
    /// Position within a run of skeleton placeholders; zero for regular nodes.
    pub repeat_index: u32,
    pub content: Option<ContentId>,
}

impl<K> LayoutInfo<K> {
    pub fn new(node_type: NodeType, key: K, rect: Rect) -> Self {
        Self {
            key,
            node_type,
            rect,
            parent_key: None,
            z_index: 0,
            is_sticky: false,
            estimated_size: false,
            repeat_index: 0,
            content: None,
        }
    }

    /// Returns a copy with a different rect.
    pub fn with_rect(&self, rect: Rect) -> Self
    where
        K: Clone,
    {
        Self {
            rect,
            ..self.clone()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DropPosition {
    Before,
    After,
    On,
}

/// Semantic drop location resolved from a pointer position.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DropTarget<K> {
    Root,
    Item {
        key: K,
        drop_position: DropPosition,
    },
}

impl<K> DropTarget<K> {
    pub fn item(key: K, drop_position: DropPosition) -> Self {
        Self::Item { key, drop_position }
    }
}

/// Per-update input from the driver.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayoutContext {
    /// Current viewport in content coordinates.
    pub visible_rect: Rect,
    /// Forces a rebuild even if the collection and options are unchanged.
    pub size_changed: bool,
}

impl LayoutContext {
    pub fn new(visible_rect: Rect) -> Self {
        Self {
            visible_rect,
            size_changed: false,
        }
    }

    pub fn with_size_changed(mut self, size_changed: bool) -> Self {
        self.size_changed = size_changed;
        self
    }
}
