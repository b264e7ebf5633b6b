use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::arena::NodeArena;
use crate::cache::LayoutCache;
use crate::drop::{indicator_rect, probe_band, resolve_row_drop};
use crate::emitter::IndexEmitter;
use crate::key::KeySet;
use crate::range::{Axis, visible_range};
use crate::{
    Collection, DropTarget, LayoutContext, LayoutInfo, LayoutKey, ListLayoutOptions, Node,
    NodeType, Point, Rect, SharedCollection, Size,
};

/// Running state of one top-to-bottom build.
#[derive(Clone, Copy, Debug)]
struct BuildContext {
    x: f64,
    y: f64,
    width: f64,
    viewport: Rect,
    /// Height of the most recently placed row; skeleton rows repeat it.
    last_estimate: f64,
}

/// Vertical list of items, optionally grouped into one level of sections with sticky headings.
///
/// Rows get `row_height` when it is fixed, otherwise an estimate that is replaced once
/// [`ListLayout::update_item_size`] reports the real height. A trailing `Loader` node is always
/// part of the visible set.
pub struct ListLayout<K: LayoutKey> {
    options: ListLayoutOptions,
    cache: LayoutCache<K>,
}

impl<K: LayoutKey> Default for ListLayout<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: LayoutKey> ListLayout<K> {
    pub fn new() -> Self {
        Self::with_options(ListLayoutOptions::default())
    }

    pub fn with_options(options: ListLayoutOptions) -> Self {
        Self {
            options,
            cache: LayoutCache::default(),
        }
    }

    pub fn options(&self) -> &ListLayoutOptions {
        &self.options
    }

    /// Replaces the options. The next [`update`](Self::update) rebuilds if they differ.
    pub fn set_options(&mut self, options: ListLayoutOptions) {
        if self.options != options {
            self.options = options;
            self.cache.mark_dirty();
        }
    }

    /// Lays out `collection` for the viewport in `ctx`. Returns whether the tree was rebuilt.
    pub fn update(&mut self, collection: &SharedCollection<K>, ctx: LayoutContext) -> bool {
        let Some(reason) = self.cache.prepare(collection, &ctx) else {
            return false;
        };
        let mut arena = self.cache.begin(collection);
        arena.clear();

        let padding = self.options.padding();
        let gap = self.options.gap();
        let viewport = ctx.visible_rect;
        let mut bc = BuildContext {
            x: padding,
            y: padding,
            width: (viewport.width - 2.0 * padding).max(0.0),
            viewport,
            last_estimate: self.options.row_height_for(None).0,
        };

        let c: &dyn Collection<K> = collection.as_ref();
        let sole = c.root_keys().len() == 1;
        let mut placed = false;
        for node in c.iter() {
            if placed {
                bc.y += gap;
            }
            self.build_node(c, &mut arena, &mut bc, None, node, sole);
            placed = true;
        }

        self.cache.arena = arena;
        self.cache
            .persisted
            .rebuild(&self.cache.arena, &|_: usize| Vec::new());
        self.cache
            .finish("ListLayout", reason, viewport.width, bc.y + padding);
        true
    }

    fn build_node(
        &self,
        c: &dyn Collection<K>,
        arena: &mut NodeArena<K>,
        bc: &mut BuildContext,
        parent: Option<usize>,
        node: &Node<K>,
        sole: bool,
    ) {
        match node.node_type {
            NodeType::Section if parent.is_none() => self.build_section(c, arena, bc, node),
            NodeType::Item | NodeType::Placeholder => self.build_row(arena, bc, parent, node),
            NodeType::Header => self.build_heading(arena, bc, parent, node),
            NodeType::Loader => self.build_loader(arena, bc, parent, node, sole),
            NodeType::Skeleton => self.build_skeleton(arena, bc, parent, node),
            _ => contract_violation!("ListLayout", node),
        }
    }

    fn build_section(
        &self,
        c: &dyn Collection<K>,
        arena: &mut NodeArena<K>,
        bc: &mut BuildContext,
        node: &Node<K>,
    ) {
        let gap = self.options.gap();
        let start = bc.y;
        let mut info = LayoutInfo::new(
            NodeType::Section,
            node.key.clone(),
            Rect::new(bc.x, start, bc.width, 0.0),
        );
        info.content = node.content;
        let idx = arena.push(None, info);

        let mut placed = false;
        for child in c.children(&node.key) {
            if placed {
                bc.y += gap;
            }
            self.build_node(c, arena, bc, Some(idx), child, false);
            placed = true;
        }
        arena.node_mut(idx).info.rect.height = bc.y - start;
    }

    fn build_row(
        &self,
        arena: &mut NodeArena<K>,
        bc: &mut BuildContext,
        parent: Option<usize>,
        node: &Node<K>,
    ) {
        let (height, estimated) = self
            .options
            .row_height_for(self.cache.measured(&node.key, bc.width));
        bc.last_estimate = height;
        let mut info = LayoutInfo::new(
            node.node_type,
            node.key.clone(),
            Rect::new(bc.x, bc.y, bc.width, height),
        );
        info.estimated_size = estimated;
        info.content = node.content;
        arena.push(parent, info);
        bc.y += height;
    }

    fn build_heading(
        &self,
        arena: &mut NodeArena<K>,
        bc: &mut BuildContext,
        parent: Option<usize>,
        node: &Node<K>,
    ) {
        let (height, estimated) = self
            .options
            .heading_height_for(self.cache.measured(&node.key, bc.width));
        let mut info = LayoutInfo::new(
            NodeType::Header,
            node.key.clone(),
            Rect::new(bc.x, bc.y, bc.width, height),
        );
        // Section headings stick to the top of the viewport while their section scrolls.
        if parent.is_some() {
            info.is_sticky = true;
            info.z_index = 1;
        }
        info.estimated_size = estimated;
        info.content = node.content;
        arena.push(parent, info);
        bc.y += height;
    }

    fn build_loader(
        &self,
        arena: &mut NodeArena<K>,
        bc: &mut BuildContext,
        parent: Option<usize>,
        node: &Node<K>,
        sole: bool,
    ) {
        let loader_height = self.options.loader_height.max(0.0);
        let height = if sole {
            (bc.viewport.height - 2.0 * self.options.padding()).max(loader_height)
        } else {
            loader_height
        };
        let mut info = LayoutInfo::new(
            NodeType::Loader,
            node.key.clone(),
            Rect::new(bc.x, bc.y, bc.width, height),
        );
        info.content = node.content;
        arena.push(parent, info);
        bc.y += height;
    }

    fn build_skeleton(
        &self,
        arena: &mut NodeArena<K>,
        bc: &mut BuildContext,
        parent: Option<usize>,
        node: &Node<K>,
    ) {
        let gap = self.options.gap();
        let height = bc.last_estimate.max(0.0);
        let bottom = bc.viewport.max_y();
        let mut repeat = 0u32;
        loop {
            let mut info = LayoutInfo::new(
                NodeType::Skeleton,
                node.key.clone(),
                Rect::new(bc.x, bc.y, bc.width, height),
            );
            info.estimated_size = true;
            info.repeat_index = repeat;
            info.content = node.content;
            arena.push(parent, info);
            bc.y += height;
            repeat += 1;
            if height + gap <= 0.0 || bc.y + gap >= bottom {
                break;
            }
            bc.y += gap;
        }
    }

    /// Replaces the persisted-key set. The index table is only rebuilt when the `Arc` changes.
    pub fn set_persisted_keys(&mut self, keys: Option<Arc<KeySet<K>>>) {
        self.cache
            .persisted
            .set_keys(keys, &self.cache.arena, &|_: usize| Vec::new());
    }

    /// Calls `f` for every node intersecting `rect`, every persisted node and a trailing
    /// loader, parents before children, in document order.
    pub fn for_each_visible_layout_info(&self, rect: Rect, mut f: impl FnMut(&LayoutInfo<K>)) {
        self.visit(None, &rect, &mut f);
    }

    fn visit(&self, parent: Option<usize>, rect: &Rect, f: &mut dyn FnMut(&LayoutInfo<K>)) {
        let arena = &self.cache.arena;
        let children = arena.children_of(parent);
        let Some(&last_idx) = children.last() else {
            return;
        };
        let range = visible_range(children, |c| arena.rect(c), Axis::Y, rect.y, rect.max_y());
        let persisted = self.cache.persisted.positions(parent).unwrap_or(&[]);
        let heading = parent
            .filter(|_| arena.info(children[0]).node_type == NodeType::Header)
            .map(|_| 0);
        let last = children.len() - 1;
        let loader = (arena.info(last_idx).node_type == NodeType::Loader).then_some(last);

        let mut emit = |pos: usize| {
            let idx = children[pos];
            let info = arena.info(idx);
            let forced = heading == Some(pos)
                || loader == Some(pos)
                || persisted.binary_search(&pos).is_ok();
            if forced || info.rect.intersects(rect) {
                f(info);
                if !arena.node(idx).children.is_empty() {
                    self.visit(Some(idx), rect, &mut *f);
                }
            }
        };
        IndexEmitter::new(children.len(), &mut emit).emit_merged(
            range,
            heading
                .into_iter()
                .chain(persisted.iter().copied())
                .chain(loader),
        );
    }

    pub fn collect_visible_layout_infos(&self, rect: Rect, out: &mut Vec<LayoutInfo<K>>) {
        out.clear();
        self.for_each_visible_layout_info(rect, |info| out.push(info.clone()));
    }

    pub fn visible_layout_infos(&self, rect: Rect) -> Vec<LayoutInfo<K>> {
        let mut out = Vec::new();
        self.collect_visible_layout_infos(rect, &mut out);
        out
    }

    pub fn layout_info(&self, key: &K) -> Option<&LayoutInfo<K>> {
        self.cache.arena.info_for(key)
    }

    pub fn content_size(&self) -> Size {
        self.cache.content_size()
    }

    /// Reconciles a measured size with the current geometry.
    ///
    /// Only rows and headings whose height is not fixed accept measurements. Later siblings
    /// shift by the height delta and the enclosing section grows with them. Returns whether
    /// the node changed.
    pub fn update_item_size(&mut self, key: &K, size: Size) -> bool {
        let Some(idx) = self.cache.arena.index_of(key) else {
            return false;
        };
        let info = self.cache.arena.info(idx);
        let accepts = matches!(
            info.node_type,
            NodeType::Item | NodeType::Placeholder | NodeType::Header
        );
        if !accepts || (!info.estimated_size && !self.cache.has_measurement(key)) {
            return false;
        }
        let height = size.height.max(0.0);
        let width = info.rect.width;
        let was_estimated = info.estimated_size;
        self.cache.record_measurement(key, height, width);
        self.cache.arena.node_mut(idx).info.estimated_size = false;
        let delta = self.cache.arena.resize_height(idx, height);
        self.cache.grow_content(delta);
        delta != 0.0 || was_estimated
    }

    /// No horizontal neighbours in a single-column list.
    pub fn key_right_of(&self, _key: &K) -> Option<K> {
        None
    }

    pub fn key_left_of(&self, _key: &K) -> Option<K> {
        None
    }

    /// Item keys between `from` and `to` (inclusive) in document order.
    pub fn key_range(&self, from: &K, to: &K) -> Vec<K> {
        self.cache
            .arena
            .keys_between(from, to, |info| info.node_type == NodeType::Item)
    }

    /// Resolves a viewport-relative point into a drop target on the nearest row.
    pub fn drop_target_from_point(
        &self,
        x: f64,
        y: f64,
        mut is_valid: impl FnMut(&DropTarget<K>) -> bool,
    ) -> DropTarget<K> {
        let vr = self.cache.visible_rect();
        let point = Point::new(x + vr.x, y + vr.y);
        let band = probe_band(point.y, self.options.gap(), self.content_size().width);
        let mut rows = Vec::new();
        self.for_each_visible_layout_info(band, |info| {
            if info.node_type == NodeType::Item && info.rect.intersects(&band) {
                rows.push(info.clone());
            }
        });
        resolve_row_drop(rows.iter(), point, &mut is_valid)
    }

    /// Rect the renderer should reserve for the drop indicator of `target`.
    pub fn drop_indicator_rect(&self, target: &DropTarget<K>) -> Option<Rect> {
        let DropTarget::Item { key, drop_position } = target else {
            return None;
        };
        let info = self.layout_info(key)?;
        Some(indicator_rect(
            &info.rect,
            *drop_position,
            self.options.drop_indicator_thickness,
            false,
        ))
    }
}
