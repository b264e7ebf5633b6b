use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::key::KeySet;
use crate::{
    DropTarget, GridLayout, LayoutContext, LayoutInfo, LayoutKey, ListLayout, Rect,
    SharedCollection, Size, TableLayout,
};

/// The layout strategies a [`crate::Virtualizer`] can drive.
///
/// All three share the same query surface; table-only operations (column widths, resizing)
/// live on [`TableLayout`] and are reached through [`Layout::as_table`].
pub enum Layout<K: LayoutKey> {
    List(ListLayout<K>),
    Grid(GridLayout<K>),
    Table(TableLayout<K>),
}

macro_rules! dispatch {
    ($self:expr, $layout:ident => $body:expr) => {
        match $self {
            Layout::List($layout) => $body,
            Layout::Grid($layout) => $body,
            Layout::Table($layout) => $body,
        }
    };
}

impl<K: LayoutKey> Layout<K> {
    /// Lays out `collection`; a no-op when nothing geometry-relevant changed.
    pub fn update(&mut self, collection: &SharedCollection<K>, ctx: LayoutContext) -> bool {
        dispatch!(self, l => l.update(collection, ctx))
    }

    pub fn set_persisted_keys(&mut self, keys: Option<Arc<KeySet<K>>>) {
        dispatch!(self, l => l.set_persisted_keys(keys))
    }

    pub fn for_each_visible_layout_info(&self, rect: Rect, f: impl FnMut(&LayoutInfo<K>)) {
        dispatch!(self, l => l.for_each_visible_layout_info(rect, f))
    }

    pub fn collect_visible_layout_infos(&self, rect: Rect, out: &mut Vec<LayoutInfo<K>>) {
        dispatch!(self, l => l.collect_visible_layout_infos(rect, out))
    }

    pub fn visible_layout_infos(&self, rect: Rect) -> Vec<LayoutInfo<K>> {
        dispatch!(self, l => l.visible_layout_infos(rect))
    }

    pub fn layout_info(&self, key: &K) -> Option<&LayoutInfo<K>> {
        dispatch!(self, l => l.layout_info(key))
    }

    pub fn content_size(&self) -> Size {
        dispatch!(self, l => l.content_size())
    }

    pub fn update_item_size(&mut self, key: &K, size: Size) -> bool {
        dispatch!(self, l => l.update_item_size(key, size))
    }

    pub fn key_right_of(&self, key: &K) -> Option<K> {
        dispatch!(self, l => l.key_right_of(key))
    }

    pub fn key_left_of(&self, key: &K) -> Option<K> {
        dispatch!(self, l => l.key_left_of(key))
    }

    pub fn key_range(&self, from: &K, to: &K) -> Vec<K> {
        dispatch!(self, l => l.key_range(from, to))
    }

    pub fn drop_target_from_point(
        &self,
        x: f64,
        y: f64,
        is_valid: impl FnMut(&DropTarget<K>) -> bool,
    ) -> DropTarget<K> {
        dispatch!(self, l => l.drop_target_from_point(x, y, is_valid))
    }

    pub fn drop_indicator_rect(&self, target: &DropTarget<K>) -> Option<Rect> {
        dispatch!(self, l => l.drop_indicator_rect(target))
    }

    pub fn as_table(&self) -> Option<&TableLayout<K>> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut TableLayout<K>> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl<K: LayoutKey> From<ListLayout<K>> for Layout<K> {
    fn from(layout: ListLayout<K>) -> Self {
        Self::List(layout)
    }
}

impl<K: LayoutKey> From<GridLayout<K>> for Layout<K> {
    fn from(layout: GridLayout<K>) -> Self {
        Self::Grid(layout)
    }
}

impl<K: LayoutKey> From<TableLayout<K>> for Layout<K> {
    fn from(layout: TableLayout<K>) -> Self {
        Self::Table(layout)
    }
}
