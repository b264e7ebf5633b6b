use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::key::{KeyMap, KeySet};
use crate::{DropTarget, Layout, LayoutContext, LayoutInfo, LayoutKey, Rect, SharedCollection, Size};

/// Drives a [`Layout`] from viewport and collection changes.
///
/// This type is UI-agnostic:
/// - It holds the current collection snapshot, viewport rect (content coordinates) and the
///   persisted-key set.
/// - Your adapter calls [`update`](Self::update) whenever one of them changes, then queries
///   [`for_each_visible_layout_info`](Self::for_each_visible_layout_info) to decide what to
///   render, and reports measurements through [`update_item_size`](Self::update_item_size).
pub struct Virtualizer<K: LayoutKey> {
    layout: Layout<K>,
    collection: Option<SharedCollection<K>>,
    visible_rect: Rect,
    persisted_keys: Option<Arc<KeySet<K>>>,
    force_rebuild: bool,
}

impl<K: LayoutKey> Virtualizer<K> {
    pub fn new(layout: impl Into<Layout<K>>) -> Self {
        Self {
            layout: layout.into(),
            collection: None,
            visible_rect: Rect::default(),
            persisted_keys: None,
            force_rebuild: false,
        }
    }

    pub fn layout(&self) -> &Layout<K> {
        &self.layout
    }

    /// Mutable access for option changes; the next update picks them up.
    pub fn layout_mut(&mut self) -> &mut Layout<K> {
        &mut self.layout
    }

    /// Swaps the layout strategy. The next update rebuilds from scratch.
    pub fn set_layout(&mut self, layout: impl Into<Layout<K>>) {
        self.layout = layout.into();
        self.force_rebuild = true;
        vdebug!("Virtualizer::set_layout");
        self.relayout(false);
    }

    pub fn collection(&self) -> Option<&SharedCollection<K>> {
        self.collection.as_ref()
    }

    pub fn visible_rect(&self) -> Rect {
        self.visible_rect
    }

    /// Hands a new collection snapshot and viewport to the layout.
    ///
    /// Returns whether the layout rebuilt. Passing the same `Arc` and an unchanged viewport
    /// size is a no-op.
    pub fn update(
        &mut self,
        collection: SharedCollection<K>,
        visible_rect: Rect,
        size_changed: bool,
    ) -> bool {
        self.collection = Some(collection);
        self.visible_rect = visible_rect;
        self.relayout(size_changed)
    }

    /// Moves or resizes the viewport. Scrolling alone never rebuilds.
    pub fn set_visible_rect(&mut self, visible_rect: Rect) -> bool {
        if self.visible_rect == visible_rect {
            return false;
        }
        self.visible_rect = visible_rect;
        self.relayout(false)
    }

    fn relayout(&mut self, size_changed: bool) -> bool {
        let Some(collection) = &self.collection else {
            return false;
        };
        let ctx = LayoutContext::new(self.visible_rect)
            .with_size_changed(size_changed || core::mem::take(&mut self.force_rebuild));
        let rebuilt = self.layout.update(collection, ctx);
        self.layout.set_persisted_keys(self.persisted_keys.clone());
        rebuilt
    }

    /// Replaces the keys kept in every query result (focused, selected, dragged items).
    pub fn set_persisted_keys(&mut self, keys: Option<Arc<KeySet<K>>>) {
        self.persisted_keys = keys;
        self.layout.set_persisted_keys(self.persisted_keys.clone());
    }

    pub fn persisted_keys(&self) -> Option<&Arc<KeySet<K>>> {
        self.persisted_keys.as_ref()
    }

    pub fn is_persisted_key(&self, key: &K) -> bool {
        self.persisted_keys.as_ref().is_some_and(|k| k.contains(key))
    }

    pub fn for_each_visible_layout_info(&self, rect: Rect, f: impl FnMut(&LayoutInfo<K>)) {
        self.layout.for_each_visible_layout_info(rect, f);
    }

    pub fn collect_visible_layout_infos(&self, rect: Rect, out: &mut Vec<LayoutInfo<K>>) {
        self.layout.collect_visible_layout_infos(rect, out);
    }

    pub fn visible_layout_infos(&self, rect: Rect) -> Vec<LayoutInfo<K>> {
        self.layout.visible_layout_infos(rect)
    }

    pub fn layout_info(&self, key: &K) -> Option<&LayoutInfo<K>> {
        self.layout.layout_info(key)
    }

    pub fn content_size(&self) -> Size {
        self.layout.content_size()
    }

    pub fn update_item_size(&mut self, key: &K, size: Size) -> bool {
        self.layout.update_item_size(key, size)
    }

    pub fn key_right_of(&self, key: &K) -> Option<K> {
        self.layout.key_right_of(key)
    }

    pub fn key_left_of(&self, key: &K) -> Option<K> {
        self.layout.key_left_of(key)
    }

    pub fn key_range(&self, from: &K, to: &K) -> Vec<K> {
        self.layout.key_range(from, to)
    }

    /// `x`/`y` are relative to the viewport.
    pub fn drop_target_from_point(
        &self,
        x: f64,
        y: f64,
        is_valid: impl FnMut(&DropTarget<K>) -> bool,
    ) -> DropTarget<K> {
        self.layout.drop_target_from_point(x, y, is_valid)
    }

    pub fn drop_indicator_rect(&self, target: &DropTarget<K>) -> Option<Rect> {
        self.layout.drop_indicator_rect(target)
    }

    /// Resizes a table column and relayouts. `None` for non-table layouts and columns that do
    /// not allow resizing.
    pub fn resize_column(&mut self, key: &K, width: f64) -> Option<KeyMap<K, f64>> {
        let widths = self.layout.as_table_mut()?.resize_column(key, width)?;
        self.relayout(false);
        Some(widths)
    }
}
