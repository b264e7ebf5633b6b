use alloc::sync::Arc;

use crate::arena::NodeArena;
use crate::geometry::abs_diff;
use crate::key::KeyMap;
use crate::persisted::PersistedState;
use crate::{LayoutContext, LayoutKey, Rect, SharedCollection, Size};

/// Measurements taken at a width this close to the current one are treated as exact.
const WIDTH_TOLERANCE: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LayoutPhase {
    Idle,
    Building,
    Built,
}

/// Why a pass rebuilds the tree instead of reusing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RebuildReason {
    FirstPass,
    CollectionChanged,
    OptionsChanged,
    SizeChanged,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Measurement {
    height: f64,
    width: f64,
}

/// State shared by every layout: the built arena, the inputs it was built from, measured
/// sizes and the persisted-key table.
pub(crate) struct LayoutCache<K: LayoutKey> {
    collection: Option<SharedCollection<K>>,
    visible_rect: Rect,
    built_size: Option<Size>,
    phase: LayoutPhase,
    options_dirty: bool,
    pub(crate) arena: NodeArena<K>,
    measured: KeyMap<K, Measurement>,
    pub(crate) persisted: PersistedState<K>,
    content_size: Size,
    laid_out_height: f64,
}

impl<K: LayoutKey> Default for LayoutCache<K> {
    fn default() -> Self {
        Self {
            collection: None,
            visible_rect: Rect::default(),
            built_size: None,
            phase: LayoutPhase::Idle,
            options_dirty: false,
            arena: NodeArena::default(),
            measured: KeyMap::default(),
            persisted: PersistedState::default(),
            content_size: Size::default(),
            laid_out_height: 0.0,
        }
    }
}

impl<K: LayoutKey> LayoutCache<K> {
    pub(crate) fn visible_rect(&self) -> Rect {
        self.visible_rect
    }

    pub(crate) fn content_size(&self) -> Size {
        self.content_size
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.options_dirty = true;
    }

    /// Records the viewport and decides whether this pass has to rebuild.
    pub(crate) fn prepare(
        &mut self,
        collection: &SharedCollection<K>,
        ctx: &LayoutContext,
    ) -> Option<RebuildReason> {
        self.visible_rect = ctx.visible_rect;
        let reason = match &self.collection {
            _ if self.phase != LayoutPhase::Built => Some(RebuildReason::FirstPass),
            Some(prev) if !Arc::ptr_eq(prev, collection) => Some(RebuildReason::CollectionChanged),
            None => Some(RebuildReason::CollectionChanged),
            Some(_) if self.options_dirty => Some(RebuildReason::OptionsChanged),
            Some(_) if ctx.size_changed || self.built_size != Some(ctx.visible_rect.size()) => {
                Some(RebuildReason::SizeChanged)
            }
            Some(_) => None,
        };
        if reason.is_none() {
            vtrace!(x = ctx.visible_rect.x, y = ctx.visible_rect.y, "layout update: no-op");
        }
        reason
    }

    /// Whether the last built pass used this exact collection.
    pub(crate) fn is_same_collection(&self, collection: &SharedCollection<K>) -> bool {
        self.collection
            .as_ref()
            .is_some_and(|prev| Arc::ptr_eq(prev, collection))
    }

    /// Enters the building phase and hands back the previous arena.
    pub(crate) fn begin(&mut self, collection: &SharedCollection<K>) -> NodeArena<K> {
        debug_assert!(self.phase != LayoutPhase::Building, "layout pass re-entered");
        self.phase = LayoutPhase::Building;
        self.collection = Some(Arc::clone(collection));
        self.options_dirty = false;
        core::mem::take(&mut self.arena)
    }

    /// Leaves the building phase. Content height never drops below the viewport height.
    pub(crate) fn finish(
        &mut self,
        layout: &'static str,
        reason: RebuildReason,
        width: f64,
        laid_out_height: f64,
    ) {
        self.laid_out_height = laid_out_height.max(0.0);
        self.content_size = Size::new(
            width.max(self.visible_rect.width).max(0.0),
            self.laid_out_height.max(self.visible_rect.height),
        );
        self.built_size = Some(self.visible_rect.size());
        let arena = &self.arena;
        self.measured.retain(|key, _| arena.index_of(key).is_some());
        self.phase = LayoutPhase::Built;
        vdebug!(
            layout,
            reason = ?reason,
            nodes = self.arena.len(),
            width = self.content_size.width,
            height = self.content_size.height,
            "layout rebuilt"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = (layout, reason);
    }

    /// Applies a height change that happened after the pass finished.
    pub(crate) fn grow_content(&mut self, delta: f64) {
        self.laid_out_height = (self.laid_out_height + delta).max(0.0);
        self.content_size.height = self.laid_out_height.max(self.visible_rect.height);
    }

    /// Measured height for `key` and whether it still counts as an estimate.
    ///
    /// A measurement taken at a different width is only a hint for the new width.
    pub(crate) fn measured(&self, key: &K, width: f64) -> Option<(f64, bool)> {
        self.measured
            .get(key)
            .map(|m| (m.height, abs_diff(m.width, width) > WIDTH_TOLERANCE))
    }

    pub(crate) fn has_measurement(&self, key: &K) -> bool {
        self.measured.contains_key(key)
    }

    pub(crate) fn record_measurement(&mut self, key: &K, height: f64, width: f64) {
        vtrace!(key = ?key, height, width, "measured size recorded");
        self.measured
            .insert(key.clone(), Measurement { height, width });
    }
}
